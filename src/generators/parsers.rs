//! Response parser emitter.
//!
//! For each operation this renders a class with a `parse(http_resp)` method
//! that reads bound headers, prefix headers, and the response status into
//! the output type, then hands body deserialization to the protocol
//! delegate. Error shapes declared on operations get `parse(http_resp)`
//! classes of their own; other transitive shapes parse from decoded body
//! maps.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, MemberShape, Operation, Simple, StructureOrUnion},
    HasIdentity, ShapeID,
};

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, Ix, Resolved, ResolvedShape, TimestampFormat},
    symbol::Category,
    visitor::{self, ShapeVisitor},
    writer::RubyWriter,
    Result,
};

/// Body deserialization hooks a protocol supplies to the parser emitter.
pub trait ParserDelegate {
    /// Parse the body of an operation or error response into `data` from the
    /// members without another http binding.
    fn render_body_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &StructureOrUnion,
    ) -> Result<()>;

    /// Parse a lone `httpPayload` member from the response body.
    fn render_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        payload: &MemberShape,
    ) -> Result<()>;

    /// Body of a structure parser: populate `data` from `map`.
    fn render_structure_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()>;

    /// The element expression of a list/set parser loop.
    fn render_list_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()>;

    /// The entry expression of a map parser loop.
    fn render_map_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        map: &MapShape,
    ) -> Result<()>;

    /// Whole `parse(map)` body of a union parser.
    fn render_union_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        union_id: &ShapeID,
        union: &StructureOrUnion,
    ) -> Result<()>;
}

/// True if the member is bound to the response outside the body.
pub(crate) fn has_response_binding(member: &MemberShape) -> bool {
    let traits = member.traits();
    model::has_trait(traits, model::http_header_trait())
        || model::has_trait(traits, model::http_prefix_headers_trait())
        || model::has_trait(traits, model::http_response_code_trait())
}

pub struct ParserGenerator<'a, D: ParserDelegate> {
    ctx: &'a GenerationContext<'a>,
    delegate: &'a D,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
    error_shapes: BTreeSet<ShapeID>,
}

impl<'a, D: ParserDelegate> ParserGenerator<'a, D> {
    pub fn new(ctx: &'a GenerationContext<'a>, delegate: &'a D) -> Self {
        Self {
            ctx,
            delegate,
            writer: RubyWriter::new(),
            generated: BTreeSet::new(),
            error_shapes: BTreeSet::new(),
        }
    }

    pub fn render(mut self) -> Result<()> {
        file_preamble(&mut self.writer);
        self.writer.write("require 'base64'");
        self.writer.write("require 'time'");
        self.writer.blank();
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Parsers");

        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            for error_id in op.2.errors() {
                self.error_shapes.insert(error_id.clone());
            }
        }

        for op in operations.iter() {
            self.render_operation(op)?;
            self.generated.insert(op.0.clone());
            if let Some(output_id) = op.2.output() {
                self.generated.insert(output_id.clone());
                for shape in model::walk_shapes(self.ctx.model, output_id)? {
                    if !self.error_shapes.contains(&shape.id)
                        && self.generated.insert(shape.id.clone())
                    {
                        visitor::accept(&mut self, &shape)?;
                    }
                }
            }
            // errors, in the order declared on the operation
            for error_id in op.2.errors() {
                if self.generated.insert(error_id.clone()) {
                    self.render_error(error_id)?;
                    for shape in model::walk_shapes(self.ctx.model, error_id)? {
                        if !self.error_shapes.contains(&shape.id)
                            && self.generated.insert(shape.id.clone())
                        {
                            visitor::accept(&mut self, &shape)?;
                        }
                    }
                }
            }
        }

        self.writer.close_block("end").close_block("end");
        let text = self.writer.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("parsers"), text)
    }

    fn render_operation(&mut self, op: &Ix<'_, Operation>) -> Result<()> {
        let Ix(op_id, _, operation) = op;
        let symbol = self.ctx.symbols.symbol(op_id, Category::Parser)?;
        self.writer
            .blank()
            .write(format!("# Operation Parser for {}", op_id.shape_name()))
            .open_block(format!("class {}", symbol.name));

        match operation.output() {
            Some(output_id) => {
                let Ix(_, _, output) = model::expect_structure(self.ctx.model, output_id)?;
                let type_symbol = self.ctx.symbols.symbol(output_id, Category::Type)?;
                self.writer.open_block("def self.parse(http_resp)");
                self.writer
                    .write(format!("data = Types::{}.new", type_symbol.name));
                self.render_response_bindings(output)?;
                self.writer.write("data").close_block("end");
            }
            None => {
                self.writer
                    .open_block("def self.parse(_http_resp)")
                    .write("nil")
                    .close_block("end");
            }
        }
        self.writer.close_block("end");
        Ok(())
    }

    fn render_error(&mut self, error_id: &ShapeID) -> Result<()> {
        let Ix(_, _, strukt) = model::expect_structure(self.ctx.model, error_id)?;
        let symbol = self.ctx.symbols.symbol(error_id, Category::Parser)?;
        let type_symbol = self.ctx.symbols.symbol(error_id, Category::Type)?;
        self.writer
            .blank()
            .write(format!("# Error Parser for {}", error_id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.parse(http_resp)")
            .write(format!("data = Types::{}.new", type_symbol.name));
        self.render_response_bindings(strukt)?;
        self.writer
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    /// Headers, prefix headers, status code, then the body.
    fn render_response_bindings(&mut self, shape: &StructureOrUnion) -> Result<()> {
        for member in shape.members() {
            if model::has_trait(member.traits(), model::http_response_code_trait()) {
                let name = self.ctx.symbols.member_name(member);
                self.writer.write(format!("data.{} = http_resp.status", name));
            }
        }
        for member in shape.members() {
            if let Some(header_name) =
                model::string_trait(member.traits(), model::http_header_trait())
            {
                self.render_header_member(member, &header_name)?;
            }
        }
        for member in shape.members() {
            if let Some(prefix) =
                model::string_trait(member.traits(), model::http_prefix_headers_trait())
            {
                let name = self.ctx.symbols.member_name(member);
                self.writer
                    .write(format!("data.{} = {{}}", name))
                    .open_block("http_resp.headers.each do |key, value|")
                    .write(format!(
                        "data.{}[key.delete_prefix('{}')] = value if key.start_with?('{}')",
                        name, prefix, prefix
                    ))
                    .close_block("end");
            }
        }

        let payload: Option<&MemberShape> = shape
            .members()
            .find(|m| model::has_trait(m.traits(), model::http_payload_trait()));
        match payload {
            Some(member) => {
                self.delegate
                    .render_payload_body(&mut self.writer, self.ctx, member)?;
            }
            None => {
                let has_body_member = shape.members().any(|m| !has_response_binding(m));
                if has_body_member {
                    self.delegate
                        .render_body_members(&mut self.writer, self.ctx, shape)?;
                }
            }
        }
        Ok(())
    }

    fn render_header_member(&mut self, member: &MemberShape, header_name: &str) -> Result<()> {
        let name = self.ctx.symbols.member_name(member);
        let getter = format!("http_resp.headers['{}']", header_name);
        let target = model::resolve(self.ctx.model, member.target())?;
        match &target.kind {
            Resolved::List(list) | Resolved::Set(list) => {
                let element = self.header_element_expr(list.member())?;
                self.writer.write(format!(
                    "data.{} = Harbor::HTTP.split_header_list({}).map {{ |s| {} }} if {}",
                    name, getter, element, getter
                ));
            }
            _ => {
                let expr = self.header_scalar_expr(member, &target, &getter)?;
                if expr == getter {
                    self.writer.write(format!("data.{} = {}", name, getter));
                } else {
                    self.writer
                        .write(format!("data.{} = {} if {}", name, expr, getter));
                }
            }
        }
        Ok(())
    }

    /// Expression converting a raw header string `v` to the member's kind.
    fn header_scalar_expr(
        &self,
        member: &MemberShape,
        target: &ResolvedShape<'_>,
        v: &str,
    ) -> Result<String> {
        Ok(match &target.kind {
            Resolved::Simple(Simple::String) => {
                let media_type = model::has_trait(member.traits(), model::media_type_trait())
                    || model::has_trait(target.traits, model::media_type_trait());
                if media_type {
                    format!("Base64::decode64({}).strip", v)
                } else {
                    v.to_string()
                }
            }
            Resolved::Simple(Simple::Byte | Simple::Short | Simple::Integer | Simple::Long) => {
                format!("{}.to_i", v)
            }
            Resolved::Simple(Simple::Float | Simple::Double) => format!("{}.to_f", v),
            Resolved::Simple(Simple::Boolean) => format!("{} == 'true'", v),
            Resolved::Simple(Simple::Timestamp) => {
                let format =
                    model::timestamp_format(member, target.traits, TimestampFormat::HttpDate)?;
                match format {
                    TimestampFormat::EpochSeconds => format!("Time.at({}.to_i)", v),
                    _ => format!("Time.parse({})", v),
                }
            }
            _ => v.to_string(),
        })
    }

    fn header_element_expr(&self, member: &MemberShape) -> Result<String> {
        let target = model::resolve(self.ctx.model, member.target())?;
        self.header_scalar_expr(member, &target, "s")
    }
}

impl<'a, D: ParserDelegate> ShapeVisitor for ParserGenerator<'a, D> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Parser)?;
        let type_symbol = self.ctx.symbols.symbol(&shape.id, Category::Type)?;
        self.writer
            .blank()
            .write(format!("# Structure Parser for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.parse(map)")
            .write(format!("data = Types::{}.new", type_symbol.name));
        self.delegate
            .render_structure_members(&mut self.writer, self.ctx, structure)?;
        self.writer
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, list, "List")
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, set, "Set")
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &MapShape) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Parser)?;
        self.writer
            .blank()
            .write(format!("# Map Parser for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.parse(map)")
            .write("data = {}")
            .open_block("map.each do |key, value|");
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
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Parser)?;
        self.writer
            .blank()
            .write(format!("# Union Parser for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.parse(map)");
        self.delegate
            .render_union_body(&mut self.writer, self.ctx, &shape.id, union)?;
        self.writer.close_block("end").close_block("end");
        Ok(())
    }
}

impl<'a, D: ParserDelegate> ParserGenerator<'a, D> {
    fn render_list_like(
        &mut self,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
        label: &str,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Parser)?;
        self.writer
            .blank()
            .write(format!("# {} Parser for {}", label, shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.parse(list)")
            .write("data = []")
            .open_block("list.each do |value|");
        self.delegate
            .render_list_member(&mut self.writer, self.ctx, shape, list)?;
        self.writer
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}
