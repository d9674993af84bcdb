//! Request builder emitter.
//!
//! For each operation this renders a class with a single
//! `build(http_req, input:)` method that sets the HTTP method, expands the
//! URI template, appends query and header bindings, and hands body
//! serialization to the protocol delegate. Transitive shapes reachable from
//! the operation input get top-level builder classes with a `build(input)`
//! entry.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, MemberShape, Operation, StructureOrUnion},
    HasIdentity, ShapeID,
};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, HttpTrait, Ix, Resolved, ResolvedShape, TimestampFormat},
    symbol::Category,
    visitor::{self, ShapeVisitor},
    writer::RubyWriter,
    Error, Result,
};

lazy_static! {
    static ref GREEDY_LABEL_RE: Regex = Regex::new(r"\{([a-zA-Z0-9_]+)\+\}").unwrap();
    static ref LABEL_RE: Regex = Regex::new(r"\{([a-zA-Z0-9_]+)\}").unwrap();
}

/// One `{name}` or `{name+}` placeholder in a URI template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UriLabel {
    pub name: String,
    pub greedy: bool,
}

/// A parsed `@http` URI template: the path, its labels, and any static
/// query string after `?`.
#[derive(Clone, Debug)]
pub struct UriTemplate {
    pub path: String,
    pub static_query: Option<String>,
    pub labels: Vec<UriLabel>,
}

impl UriTemplate {
    pub fn parse(uri: &str) -> UriTemplate {
        let (path, static_query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        let mut labels = Vec::new();
        for capture in GREEDY_LABEL_RE.captures_iter(&path) {
            labels.push(UriLabel {
                name: capture[1].to_string(),
                greedy: true,
            });
        }
        for capture in LABEL_RE.captures_iter(&path) {
            labels.push(UriLabel {
                name: capture[1].to_string(),
                greedy: false,
            });
        }
        UriTemplate {
            path,
            static_query,
            labels,
        }
    }

    /// The path as a Ruby `format` string with `%<name>s` references.
    pub fn format_string(&self) -> String {
        let path = GREEDY_LABEL_RE.replace_all(&self.path, "%<$1>s");
        LABEL_RE.replace_all(&path, "%<$1>s").to_string()
    }
}

/// Body and member serialization hooks a protocol supplies to the builder
/// emitter.
pub trait BuilderDelegate {
    /// Serialize a lone `httpPayload` member as the request body.
    fn render_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        payload: &MemberShape,
    ) -> Result<()>;

    /// Serialize the unbound members of the input as the request body.
    fn render_no_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        input: &StructureOrUnion,
    ) -> Result<()>;

    /// Body of a structure builder: populate `data` from `input`.
    fn render_structure_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()>;

    /// Body of the element loop in a list/set builder.
    fn render_list_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()>;

    /// Body of the entry loop in a map builder.
    fn render_map_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        map: &MapShape,
    ) -> Result<()>;

    /// One `when` arm of a union builder.
    fn render_union_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        union_id: &ShapeID,
        member: &MemberShape,
    ) -> Result<()>;
}

pub struct BuilderGenerator<'a, D: BuilderDelegate> {
    ctx: &'a GenerationContext<'a>,
    delegate: &'a D,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
}

impl<'a, D: BuilderDelegate> BuilderGenerator<'a, D> {
    pub fn new(ctx: &'a GenerationContext<'a>, delegate: &'a D) -> Self {
        Self {
            ctx,
            delegate,
            writer: RubyWriter::new(),
            generated: BTreeSet::new(),
        }
    }

    pub fn render(mut self) -> Result<()> {
        file_preamble(&mut self.writer);
        self.writer.write("require 'base64'");
        self.writer.write("require 'cgi'");
        self.writer.blank();
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Builders");

        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            self.render_operation(op)?;
            self.generated.insert(op.0.clone());
            let input_id = expect_input(op)?;
            for shape in model::walk_shapes(self.ctx.model, input_id)? {
                if self.generated.insert(shape.id.clone()) {
                    visitor::accept(&mut self, &shape)?;
                }
            }
        }

        self.writer.close_block("end").close_block("end");
        let text = self.writer.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("builders"), text)
    }

    fn render_operation(&mut self, op: &Ix<'_, Operation>) -> Result<()> {
        let Ix(op_id, op_traits, _) = op;
        let input_id = expect_input(op)?;
        let Ix(_, _, input) = model::expect_structure(self.ctx.model, input_id)?;
        self.generated.insert(input_id.clone());

        let http: HttpTrait = model::get_trait(op_traits, model::http_trait())?.ok_or_else(|| {
            Error::ModelIntegrity(format!("operation {} is missing the http trait", op_id))
        })?;
        let symbol = self.ctx.symbols.symbol(op_id, Category::Builder)?;

        self.writer
            .blank()
            .write(format!("# Operation Builder for {}", op_id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(http_req, input:)")
            .write(format!("http_req.http_method = '{}'", http.method));
        self.render_uri(&http, input)?;
        self.render_query(input)?;
        self.render_headers(input)?;
        self.render_prefix_headers(input)?;
        self.render_body(input)?;
        self.writer.close_block("end").close_block("end");
        Ok(())
    }

    fn render_uri(&mut self, http: &HttpTrait, input: &StructureOrUnion) -> Result<()> {
        let template = UriTemplate::parse(&http.uri);

        if let Some(static_query) = &template.static_query {
            self.writer
                .open_block(format!("CGI.parse('{}').each do |k, v|", static_query))
                .write("v.each { |q_v| http_req.append_query_param(k, q_v) }")
                .close_block("end");
        }

        if template.labels.is_empty() {
            self.writer
                .write(format!("http_req.append_path('{}')", template.path));
            return Ok(());
        }

        let members: Vec<&MemberShape> = input
            .members()
            .filter(|m| model::has_trait(m.traits(), model::http_label_trait()))
            .collect();
        for member in members.iter() {
            let name = self.ctx.symbols.member_name(member);
            self.writer.write(format!(
                "raise Harbor::HTTP::LabelBindingError, 'label :{} cannot be nil or empty' if input[:{}].to_s.empty?",
                name, name
            ));
        }

        self.writer.open_block("http_req.append_path(format(");
        self.writer
            .write(format!("'{}',", template.format_string()));
        let last = template.labels.len() - 1;
        for (i, label) in template.labels.iter().enumerate() {
            let member = members
                .iter()
                .find(|m| m.id().to_string() == label.name)
                .ok_or_else(|| {
                    Error::ModelIntegrity(format!(
                        "uri label {{{}}} has no matching httpLabel member",
                        label.name
                    ))
                })?;
            let value = self.label_value(member)?;
            let arg = if label.greedy {
                format!(
                    "{}: ({}).split('/').map {{ |s| Harbor::HTTP.uri_escape(s) }}.join('/')",
                    label.name, value
                )
            } else {
                format!("{}: Harbor::HTTP.uri_escape({})", label.name, value)
            };
            let eol = if i == last { "" } else { "," };
            self.writer.write(format!("{}{}", arg, eol));
        }
        self.writer.close_block("))");
        Ok(())
    }

    /// The Ruby expression for a label member's string form.
    fn label_value(&self, member: &MemberShape) -> Result<String> {
        let name = self.ctx.symbols.member_name(member);
        let getter = format!("input[:{}]", name);
        let target = model::resolve(self.ctx.model, member.target())?;
        if let Resolved::Simple(atelier_core::model::shapes::Simple::Timestamp) = &target.kind {
            let format = model::timestamp_format(member, target.traits, TimestampFormat::DateTime)?;
            return Ok(match format {
                TimestampFormat::EpochSeconds => {
                    format!("Harbor::TimeHelper.to_epoch_seconds({}).to_i.to_s", getter)
                }
                TimestampFormat::HttpDate => {
                    format!("Harbor::TimeHelper.to_http_date({})", getter)
                }
                TimestampFormat::DateTime => {
                    format!("Harbor::TimeHelper.to_date_time({})", getter)
                }
            });
        }
        Ok(format!("{}.to_s", getter))
    }

    fn render_query(&mut self, input: &StructureOrUnion) -> Result<()> {
        for member in input.members() {
            if let Some(query_name) =
                model::string_trait(member.traits(), model::http_query_trait())
            {
                let getter = format!("input[:{}]", self.ctx.symbols.member_name(member));
                let name_expr = format!("'{}'", query_name);
                self.render_query_value(member, member.target(), &name_expr, &getter)?;
            }
        }
        for member in input.members() {
            if !model::has_trait(member.traits(), model::http_query_params_trait()) {
                continue;
            }
            let target = model::resolve(self.ctx.model, member.target())?;
            let map = match target.kind {
                Resolved::Map(map) => map,
                _ => {
                    return Err(Error::ModelIntegrity(format!(
                        "httpQueryParams member {} must target a map",
                        member.id()
                    )))
                }
            };
            let getter = format!("input[:{}]", self.ctx.symbols.member_name(member));
            self.writer
                .open_block(format!("unless {}.nil? || {}.empty?", getter, getter))
                .open_block(format!("{}.each do |k, v|", getter));
            self.render_query_value(map.value(), map.value().target(), "k", "v")?;
            self.writer.close_block("end").close_block("end");
        }
        Ok(())
    }

    fn render_query_value(
        &mut self,
        member: &MemberShape,
        target_id: &ShapeID,
        name_expr: &str,
        getter: &str,
    ) -> Result<()> {
        let target = model::resolve(self.ctx.model, target_id)?;
        match &target.kind {
            Resolved::Simple(atelier_core::model::shapes::Simple::Timestamp) => {
                let format =
                    model::timestamp_format(member, target.traits, TimestampFormat::DateTime)?;
                let value = match format {
                    TimestampFormat::EpochSeconds => {
                        format!("Harbor::TimeHelper.to_epoch_seconds({}).to_i", getter)
                    }
                    TimestampFormat::HttpDate => {
                        format!("Harbor::TimeHelper.to_http_date({})", getter)
                    }
                    TimestampFormat::DateTime => {
                        format!("Harbor::TimeHelper.to_date_time({})", getter)
                    }
                };
                self.writer.write(format!(
                    "http_req.append_query_param({}, {}) unless {}.nil?",
                    name_expr, value, getter
                ));
            }
            Resolved::List(list) | Resolved::Set(list) => {
                self.writer
                    .open_block(format!("unless {}.nil? || {}.empty?", getter, getter))
                    .open_block(format!("{}.each do |value|", getter));
                self.render_query_value(list.member(), list.member().target(), name_expr, "value")?;
                self.writer.close_block("end").close_block("end");
            }
            // maps, structures, and unions have no query serialization
            Resolved::Map(_) | Resolved::Structure(_) | Resolved::Union(_) => {}
            _ => {
                self.writer.write(format!(
                    "http_req.append_query_param({}, {}.to_s) unless {}.nil?",
                    name_expr, getter, getter
                ));
            }
        }
        Ok(())
    }

    fn render_headers(&mut self, input: &StructureOrUnion) -> Result<()> {
        for member in input.members() {
            if let Some(header_name) =
                model::string_trait(member.traits(), model::http_header_trait())
            {
                let getter = format!("input[:{}]", self.ctx.symbols.member_name(member));
                let setter = format!("http_req.headers['{}'] = ", header_name);
                self.render_header_value(member, member.target(), &setter, &getter)?;
            }
        }
        Ok(())
    }

    fn render_header_value(
        &mut self,
        member: &MemberShape,
        target_id: &ShapeID,
        setter: &str,
        getter: &str,
    ) -> Result<()> {
        use atelier_core::model::shapes::Simple;
        let target = model::resolve(self.ctx.model, target_id)?;
        match &target.kind {
            Resolved::Simple(Simple::String) => {
                let media_type = model::has_trait(member.traits(), model::media_type_trait())
                    || model::has_trait(target.traits, model::media_type_trait());
                if media_type {
                    // strings with a media type are base64 encoded in headers
                    self.writer.write(format!(
                        "{}Base64::encode64({}).strip unless {}.nil? || {}.empty?",
                        setter, getter, getter, getter
                    ));
                } else {
                    self.writer.write(format!(
                        "{}{} unless {}.nil? || {}.empty?",
                        setter, getter, getter, getter
                    ));
                }
            }
            Resolved::Simple(Simple::Timestamp) => {
                let format =
                    model::timestamp_format(member, target.traits, TimestampFormat::HttpDate)?;
                let value = match format {
                    TimestampFormat::EpochSeconds => {
                        format!("Harbor::TimeHelper.to_epoch_seconds({}).to_i", getter)
                    }
                    TimestampFormat::HttpDate => {
                        format!("Harbor::TimeHelper.to_http_date({})", getter)
                    }
                    TimestampFormat::DateTime => {
                        format!("Harbor::TimeHelper.to_date_time({})", getter)
                    }
                };
                self.writer
                    .write(format!("{}{} unless {}.nil?", setter, value, getter));
            }
            Resolved::List(list) | Resolved::Set(list) => {
                let is_set = matches!(&target.kind, Resolved::Set(_));
                self.writer
                    .open_block(format!("unless {}.nil? || {}.empty?", getter, getter))
                    .write(format!("{}{}", setter, getter))
                    .indent();
                if is_set {
                    self.writer.write(".to_a");
                }
                self.writer.write(".compact");
                self.render_header_list_element(list.member())?;
                self.writer.write(".join(', ')").dedent().close_block("end");
            }
            // maps, structures, and unions have no header serialization
            Resolved::Map(_) | Resolved::Structure(_) | Resolved::Union(_) => {}
            _ => {
                self.writer.write(format!(
                    "{}{}.to_s unless {}.nil?",
                    setter, getter, getter
                ));
            }
        }
        Ok(())
    }

    /// `.map` line converting each list element to its header string form.
    /// Elements containing commas or quotes are quoted and escaped.
    fn render_header_list_element(&mut self, member: &MemberShape) -> Result<()> {
        use atelier_core::model::shapes::Simple;
        let target = model::resolve(self.ctx.model, member.target())?;
        match &target.kind {
            Resolved::Simple(Simple::String) => {
                self.writer.write(
                    r##".map { |s| (s.include?('"') || s.include?(',')) ? "\"#{s.gsub('"', '\"')}\"" : s }"##,
                );
            }
            Resolved::Simple(Simple::Timestamp) => {
                let format =
                    model::timestamp_format(member, target.traits, TimestampFormat::HttpDate)?;
                let line = match format {
                    TimestampFormat::EpochSeconds => {
                        ".map { |s| Harbor::TimeHelper.to_epoch_seconds(s) }"
                    }
                    TimestampFormat::HttpDate => ".map { |s| Harbor::TimeHelper.to_http_date(s) }",
                    TimestampFormat::DateTime => ".map { |s| Harbor::TimeHelper.to_date_time(s) }",
                };
                self.writer.write(line);
            }
            _ => {
                self.writer.write(".map { |s| s.to_s }");
            }
        }
        Ok(())
    }

    fn render_prefix_headers(&mut self, input: &StructureOrUnion) -> Result<()> {
        for member in input.members() {
            let prefix = match model::string_trait(member.traits(), model::http_prefix_headers_trait())
            {
                Some(prefix) => prefix,
                None => continue,
            };
            let target = model::resolve(self.ctx.model, member.target())?;
            let map = match target.kind {
                Resolved::Map(map) => map,
                _ => {
                    return Err(Error::ModelIntegrity(format!(
                        "httpPrefixHeaders member {} must target a map",
                        member.id()
                    )))
                }
            };
            let getter = format!("input[:{}]", self.ctx.symbols.member_name(member));
            let setter = format!("http_req.headers[\"{}#{{key}}\"] = ", prefix);
            self.writer
                .open_block(format!("unless {}.nil? || {}.empty?", getter, getter))
                .open_block(format!("{}.each do |key, value|", getter));
            self.render_header_value(map.value(), map.value().target(), &setter, "value")?;
            self.writer.close_block("end").close_block("end");
        }
        Ok(())
    }

    fn render_body(&mut self, input: &StructureOrUnion) -> Result<()> {
        let has_body_member = input.members().any(|m| !has_http_binding(m));
        if !has_body_member {
            return Ok(());
        }
        let payload: Option<&MemberShape> = input
            .members()
            .find(|m| model::has_trait(m.traits(), model::http_payload_trait()));
        match payload {
            Some(member) => self
                .delegate
                .render_payload_body(&mut self.writer, self.ctx, member),
            None => self
                .delegate
                .render_no_payload_body(&mut self.writer, self.ctx, input),
        }
    }
}

/// True if the member is bound somewhere other than the body.
pub(crate) fn has_http_binding(member: &MemberShape) -> bool {
    let traits = member.traits();
    model::has_trait(traits, model::http_label_trait())
        || model::has_trait(traits, model::http_query_trait())
        || model::has_trait(traits, model::http_query_params_trait())
        || model::has_trait(traits, model::http_header_trait())
        || model::has_trait(traits, model::http_prefix_headers_trait())
}

fn expect_input<'a>(op: &Ix<'a, Operation>) -> Result<&'a ShapeID> {
    op.2.input().as_ref().ok_or_else(|| {
        Error::ModelIntegrity(format!("operation {} is missing an input structure", op.0))
    })
}

impl<'a, D: BuilderDelegate> ShapeVisitor for BuilderGenerator<'a, D> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Builder)?;
        self.writer
            .blank()
            .write(format!("# Structure Builder for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(input)");
        self.delegate
            .render_structure_members(&mut self.writer, self.ctx, structure)?;
        self.writer
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Builder)?;
        self.writer
            .blank()
            .write(format!("# List Builder for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(input)")
            .write("data = []")
            .open_block("input.each do |element|");
        self.delegate
            .render_list_member(&mut self.writer, self.ctx, shape, list)?;
        self.writer
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Builder)?;
        self.writer
            .blank()
            .write(format!("# Set Builder for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(input)")
            .write("data = Set.new")
            .open_block("input.each do |element|");
        self.delegate
            .render_list_member(&mut self.writer, self.ctx, shape, set)?;
        self.writer
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &MapShape) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Builder)?;
        self.writer
            .blank()
            .write(format!("# Map Builder for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(input)")
            .write("data = {}")
            .open_block("input.each do |key, value|");
        self.delegate
            .render_map_member(&mut self.writer, self.ctx, shape, map)?;
        self.writer
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn union(&mut self, shape: &ResolvedShape<'_>, union: &StructureOrUnion) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Builder)?;
        self.writer
            .blank()
            .write(format!("# Union Builder for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.build(input)")
            .write("data = {}")
            .write("case input");
        for member in union.members() {
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            self.writer
                .write(format!("when Types::{}::{}", symbol.name, member_class))
                .indent();
            self.delegate
                .render_union_member(&mut self.writer, self.ctx, &shape.id, member)?;
            self.writer.dedent();
        }
        self.writer
            .open_block("else")
            .write(format!(
                "raise ArgumentError,\n\"Expected input to be one of the subclasses of Types::{}\"",
                symbol.name
            ))
            .close_block("end")
            .blank()
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_uri() {
        let template = UriTemplate::parse("/things");
        assert_eq!(template.path, "/things");
        assert!(template.static_query.is_none());
        assert!(template.labels.is_empty());
    }

    #[test]
    fn parses_labels_and_static_query() {
        let template = UriTemplate::parse("/things/{id}/parts?sort=asc");
        assert_eq!(template.path, "/things/{id}/parts");
        assert_eq!(template.static_query.as_deref(), Some("sort=asc"));
        assert_eq!(
            template.labels,
            vec![UriLabel {
                name: "id".to_string(),
                greedy: false
            }]
        );
        assert_eq!(template.format_string(), "/things/%<id>s/parts");
    }

    #[test]
    fn parses_greedy_labels() {
        let template = UriTemplate::parse("/files/{path+}");
        assert_eq!(
            template.labels,
            vec![UriLabel {
                name: "path".to_string(),
                greedy: true
            }]
        );
        assert_eq!(template.format_string(), "/files/%<path>s");
    }
}
