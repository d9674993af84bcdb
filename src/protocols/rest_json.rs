//! JSON-over-HTTP protocol generator.
//!
//! Bodies are JSON objects keyed by the modeled member names; blobs are
//! base64, timestamps default to epoch seconds in the body. Errors are
//! discriminated by the `x-error-code` header, falling back to the body's
//! `__type` field.

use std::str::FromStr;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, MemberShape, Operation, Simple, StructureOrUnion},
    HasIdentity, Identifier, NamespaceID, ShapeID,
};
use lazy_static::lazy_static;

use crate::{
    gen::GenerationContext,
    generators::{
        builders::{has_http_binding, BuilderDelegate, BuilderGenerator},
        errors::{ErrorsDelegate, ErrorsGenerator},
        parsers::{has_response_binding, ParserDelegate, ParserGenerator},
        stubs::{render_streaming_stub, StubDelegate, StubsGenerator},
    },
    model::{self, HttpTrait, Ix, Resolved, ResolvedShape, TimestampFormat},
    protocol::ProtocolGenerator,
    writer::RubyWriter,
    Error, Result,
};

lazy_static! {
    static ref REST_JSON_PROTOCOL_ID: ShapeID = ShapeID::new(
        NamespaceID::new_unchecked("harbor.protocols"),
        Identifier::from_str("restJson").unwrap(),
        None
    );
}

/// The trait id services carry to select this protocol.
pub fn protocol_id() -> &'static ShapeID {
    &REST_JSON_PROTOCOL_ID
}

#[derive(Default)]
pub struct RestJsonGenerator {}

impl ProtocolGenerator for RestJsonGenerator {
    fn protocol_id(&self) -> &ShapeID {
        protocol_id()
    }

    fn generate_builders(&self, ctx: &GenerationContext<'_>) -> Result<()> {
        BuilderGenerator::new(ctx, &JsonBuilders).render()
    }

    fn generate_parsers(&self, ctx: &GenerationContext<'_>) -> Result<()> {
        ParserGenerator::new(ctx, &JsonParsers).render()
    }

    fn generate_stubs(&self, ctx: &GenerationContext<'_>) -> Result<()> {
        StubsGenerator::new(ctx, &JsonStubs).render()
    }

    fn generate_errors(&self, ctx: &GenerationContext<'_>) -> Result<()> {
        ErrorsGenerator::new(ctx, &JsonErrors).render()
    }
}

/// Ruby expression serializing one member value into the JSON body.
fn build_value_expr(
    ctx: &GenerationContext<'_>,
    member: &MemberShape,
    getter: &str,
) -> Result<String> {
    let target = model::resolve(ctx.model, member.target())?;
    Ok(match &target.kind {
        Resolved::Simple(Simple::Blob) => format!("Base64::encode64({}).strip", getter),
        Resolved::Simple(Simple::Timestamp) => {
            let format =
                model::timestamp_format(member, target.traits, TimestampFormat::EpochSeconds)?;
            match format {
                TimestampFormat::EpochSeconds => {
                    format!("Harbor::TimeHelper.to_epoch_seconds({}).to_i", getter)
                }
                TimestampFormat::HttpDate => format!("Harbor::TimeHelper.to_http_date({})", getter),
                TimestampFormat::DateTime => format!("Harbor::TimeHelper.to_date_time({})", getter),
            }
        }
        Resolved::List(_)
        | Resolved::Set(_)
        | Resolved::Map(_)
        | Resolved::Structure(_)
        | Resolved::Union(_) => {
            let name = ctx.symbols.shape_name(&target.id)?;
            format!("Builders::{}.build({})", name, getter)
        }
        _ => getter.to_string(),
    })
}

/// Ruby expression deserializing one member value from a decoded JSON map.
fn parse_value_expr(
    ctx: &GenerationContext<'_>,
    member: &MemberShape,
    getter: &str,
) -> Result<String> {
    let target = model::resolve(ctx.model, member.target())?;
    Ok(match &target.kind {
        Resolved::Simple(Simple::Blob) => format!("Base64::decode64({})", getter),
        Resolved::Simple(Simple::Timestamp) => {
            let format =
                model::timestamp_format(member, target.traits, TimestampFormat::EpochSeconds)?;
            match format {
                TimestampFormat::EpochSeconds => format!("Time.at({}.to_i)", getter),
                _ => format!("Time.parse({})", getter),
            }
        }
        Resolved::List(_)
        | Resolved::Set(_)
        | Resolved::Map(_)
        | Resolved::Structure(_)
        | Resolved::Union(_) => {
            let name = ctx.symbols.shape_name(&target.id)?;
            format!("Parsers::{}.parse({})", name, getter)
        }
        _ => getter.to_string(),
    })
}

/// Content type for a blob or string payload member.
fn payload_content_type(
    member: &MemberShape,
    target: &ResolvedShape<'_>,
    fallback: &str,
) -> String {
    model::string_trait(member.traits(), model::media_type_trait())
        .or_else(|| model::string_trait(target.traits, model::media_type_trait()))
        .unwrap_or_else(|| fallback.to_string())
}

struct JsonBuilders;

impl BuilderDelegate for JsonBuilders {
    fn render_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        payload: &MemberShape,
    ) -> Result<()> {
        let name = ctx.symbols.member_name(payload);
        let getter = format!("input[:{}]", name);
        if model::is_streaming(ctx.model, payload) {
            w.write(format!("http_req.body = {}", getter));
            return Ok(());
        }
        let target = model::resolve(ctx.model, payload.target())?;
        match &target.kind {
            Resolved::Structure(_) | Resolved::Union(_) => {
                let shape_name = ctx.symbols.shape_name(&target.id)?;
                w.write("http_req.headers['Content-Type'] = 'application/json'")
                    .write(format!(
                        "data = Builders::{}.build({}) unless {}.nil?",
                        shape_name, getter, getter
                    ))
                    .write("http_req.body = StringIO.new(Harbor::JSON.dump(data || {}))");
            }
            Resolved::Simple(Simple::Blob) => {
                let content_type = payload_content_type(payload, &target, "application/octet-stream");
                w.write(format!(
                    "http_req.headers['Content-Type'] = '{}'",
                    content_type
                ))
                .write(format!("http_req.body = StringIO.new({}.to_s)", getter));
            }
            Resolved::Simple(Simple::String) => {
                let content_type = payload_content_type(payload, &target, "text/plain");
                w.write(format!(
                    "http_req.headers['Content-Type'] = '{}'",
                    content_type
                ))
                .write(format!("http_req.body = StringIO.new({}.to_s)", getter));
            }
            _ => {
                let expr = build_value_expr(ctx, payload, &getter)?;
                w.write("http_req.headers['Content-Type'] = 'application/json'")
                    .write(format!(
                        "http_req.body = StringIO.new(Harbor::JSON.dump({}))",
                        expr
                    ));
            }
        }
        Ok(())
    }

    fn render_no_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        input: &StructureOrUnion,
    ) -> Result<()> {
        w.write("http_req.headers['Content-Type'] = 'application/json'");
        w.write("data = {}");
        for member in input.members().filter(|m| !has_http_binding(m)) {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("input[:{}]", name);
            let expr = build_value_expr(ctx, member, &getter)?;
            w.write(format!(
                "data['{}'] = {} unless {}.nil?",
                wire, expr, getter
            ));
        }
        w.write("http_req.body = StringIO.new(Harbor::JSON.dump(data))");
        Ok(())
    }

    fn render_structure_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()> {
        w.write("data = {}");
        for member in strukt.members() {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("input[:{}]", name);
            let expr = build_value_expr(ctx, member, &getter)?;
            w.write(format!(
                "data['{}'] = {} unless {}.nil?",
                wire, expr, getter
            ));
        }
        Ok(())
    }

    fn render_list_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()> {
        let expr = build_value_expr(ctx, list.member(), "element")?;
        if model::has_trait(shape.traits, model::sparse_trait()) {
            w.write(format!("data << (element.nil? ? nil : {})", expr));
        } else {
            w.write(format!("data << {} unless element.nil?", expr));
        }
        Ok(())
    }

    fn render_map_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        map: &MapShape,
    ) -> Result<()> {
        let expr = build_value_expr(ctx, map.value(), "value")?;
        if model::has_trait(shape.traits, model::sparse_trait()) {
            w.write(format!("data[key] = value.nil? ? nil : {}", expr));
        } else {
            w.write(format!("data[key] = {} unless value.nil?", expr));
        }
        Ok(())
    }

    fn render_union_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        _union_id: &ShapeID,
        member: &MemberShape,
    ) -> Result<()> {
        let wire = member.id().to_string();
        let expr = build_value_expr(ctx, member, "input.__getobj__")?;
        w.write(format!("data['{}'] = {}", wire, expr));
        Ok(())
    }
}

struct JsonParsers;

impl ParserDelegate for JsonParsers {
    fn render_body_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &StructureOrUnion,
    ) -> Result<()> {
        w.write("map = Harbor::JSON.load(http_resp.body)");
        for member in shape.members().filter(|m| !has_response_binding(m)) {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("map['{}']", wire);
            let expr = parse_value_expr(ctx, member, &getter)?;
            if expr == getter {
                w.write(format!("data.{} = {}", name, getter));
            } else {
                w.write(format!(
                    "data.{} = {} unless {}.nil?",
                    name, expr, getter
                ));
            }
        }
        Ok(())
    }

    fn render_payload_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        payload: &MemberShape,
    ) -> Result<()> {
        let name = ctx.symbols.member_name(payload);
        if model::is_streaming(ctx.model, payload) {
            w.write(format!("data.{} = http_resp.body", name));
            return Ok(());
        }
        let target = model::resolve(ctx.model, payload.target())?;
        match &target.kind {
            Resolved::Structure(_) | Resolved::Union(_) => {
                let shape_name = ctx.symbols.shape_name(&target.id)?;
                w.write(format!(
                    "data.{} = Parsers::{}.parse(Harbor::JSON.load(http_resp.body))",
                    name, shape_name
                ));
            }
            Resolved::Simple(Simple::Blob) | Resolved::Simple(Simple::String) => {
                w.write(format!("data.{} = http_resp.body.read", name));
            }
            _ => {
                w.write(format!(
                    "data.{} = Harbor::JSON.load(http_resp.body)",
                    name
                ));
            }
        }
        Ok(())
    }

    fn render_structure_members(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()> {
        for member in strukt.members() {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("map['{}']", wire);
            let expr = parse_value_expr(ctx, member, &getter)?;
            if expr == getter {
                w.write(format!("data.{} = {}", name, getter));
            } else {
                w.write(format!(
                    "data.{} = {} unless {}.nil?",
                    name, expr, getter
                ));
            }
        }
        Ok(())
    }

    fn render_list_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()> {
        let expr = parse_value_expr(ctx, list.member(), "value")?;
        // sparse lists preserve nulls, others filter them
        if model::has_trait(shape.traits, model::sparse_trait()) {
            w.write(format!("data << (value.nil? ? nil : {})", expr));
        } else {
            w.write(format!("data << {} unless value.nil?", expr));
        }
        Ok(())
    }

    fn render_map_member(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        map: &MapShape,
    ) -> Result<()> {
        let expr = parse_value_expr(ctx, map.value(), "value")?;
        if model::has_trait(shape.traits, model::sparse_trait()) {
            w.write(format!("data[key] = value.nil? ? nil : {}", expr));
        } else {
            w.write(format!("data[key] = {} unless value.nil?", expr));
        }
        Ok(())
    }

    fn render_union_body(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        union_id: &ShapeID,
        union: &StructureOrUnion,
    ) -> Result<()> {
        let union_name = ctx.symbols.shape_name(union_id)?;
        w.write("key, value = map.flatten");
        w.write("case key");
        for member in union.members() {
            let wire = member.id().to_string();
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            let expr = parse_value_expr(ctx, member, "value")?;
            w.write(format!("when '{}'", wire))
                .indent()
                .write(format!("Types::{}::{}.new({})", union_name, member_class, expr))
                .dedent();
        }
        w.open_block("else")
            .write(format!(
                "Types::{}::Unknown.new({{name: key, value: value}})",
                union_name
            ))
            .close_block("end");
        Ok(())
    }
}

struct JsonStubs;

impl StubDelegate for JsonStubs {
    fn render_operation_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        op: &Ix<'_, Operation>,
        output: Option<&StructureOrUnion>,
    ) -> Result<()> {
        let Ix(op_id, op_traits, _) = op;
        let http: HttpTrait = model::get_trait(op_traits, model::http_trait())?.ok_or_else(|| {
            Error::ModelIntegrity(format!("operation {} is missing the http trait", op_id))
        })?;
        w.open_block("def self.stub(http_resp, stub:)");
        w.write(format!("http_resp.status = {}", http.code));
        let output = match output {
            Some(output) => output,
            None => {
                w.close_block("end");
                return Ok(());
            }
        };
        let streaming = output
            .members()
            .any(|m| model::is_streaming(ctx.model, m));
        if streaming {
            render_streaming_stub(w, ctx, output)?;
            w.close_block("end");
            return Ok(());
        }
        w.write("http_resp.headers['Content-Type'] = 'application/json'");
        w.write("data = {}");
        for member in output.members().filter(|m| !has_response_binding(m)) {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("stub[:{}]", name);
            let expr = stub_value_expr(ctx, member, &getter)?;
            w.write(format!(
                "data['{}'] = {} unless {}.nil?",
                wire, expr, getter
            ));
        }
        w.write("http_resp.body = StringIO.new(Harbor::JSON.dump(data))");
        w.close_block("end");
        Ok(())
    }

    fn render_structure_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()> {
        w.open_block("def self.stub(stub = {})");
        w.write("stub ||= {}");
        w.write("data = {}");
        for member in strukt.members() {
            let wire = member.id().to_string();
            let name = ctx.symbols.member_name(member);
            let getter = format!("stub[:{}]", name);
            let expr = stub_value_expr(ctx, member, &getter)?;
            w.write(format!(
                "data['{}'] = {} unless {}.nil?",
                wire, expr, getter
            ));
        }
        w.write("data");
        w.close_block("end");
        Ok(())
    }

    fn render_list_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        _shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()> {
        let expr = stub_value_expr(ctx, list.member(), "element")?;
        w.open_block("def self.stub(stub = [])")
            .write("stub ||= []")
            .write("data = []")
            .open_block("stub.each do |element|")
            .write(format!("data << {}", expr))
            .close_block("end")
            .write("data")
            .close_block("end");
        Ok(())
    }

    fn render_map_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        map: &MapShape,
    ) -> Result<()> {
        let expr = stub_value_expr(ctx, map.value(), "value")?;
        w.open_block("def self.stub(stub = {})")
            .write("stub ||= {}")
            .write("data = {}")
            .open_block("stub.each do |key, value|")
            .write(format!("data[key] = {}", expr))
            .close_block("end")
            .write("data")
            .close_block("end");
        Ok(())
    }

    fn render_union_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        union_id: &ShapeID,
        union: &StructureOrUnion,
    ) -> Result<()> {
        let union_name = ctx.symbols.shape_name(union_id)?;
        w.open_block("def self.stub(stub = {})");
        w.write("data = {}");
        w.write("case stub");
        for member in union.members() {
            let wire = member.id().to_string();
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            let expr = stub_value_expr(ctx, member, "stub.__getobj__")?;
            w.write(format!("when Types::{}::{}", union_name, member_class))
                .indent()
                .write(format!("data['{}'] = {}", wire, expr))
                .dedent();
        }
        w.write("end");
        w.write("data");
        w.close_block("end");
        Ok(())
    }
}

/// Ruby expression serializing one stub member value into the JSON body.
fn stub_value_expr(
    ctx: &GenerationContext<'_>,
    member: &MemberShape,
    getter: &str,
) -> Result<String> {
    let target = model::resolve(ctx.model, member.target())?;
    Ok(match &target.kind {
        Resolved::Simple(Simple::Blob) => format!("Base64::encode64({}).strip", getter),
        Resolved::Simple(Simple::Timestamp) => {
            format!("Harbor::TimeHelper.to_epoch_seconds({}).to_i", getter)
        }
        Resolved::List(_)
        | Resolved::Set(_)
        | Resolved::Map(_)
        | Resolved::Structure(_)
        | Resolved::Union(_) => {
            let name = ctx.symbols.shape_name(&target.id)?;
            format!("Stubs::{}.stub({})", name, getter)
        }
        _ => getter.to_string(),
    })
}

struct JsonErrors;

impl ErrorsDelegate for JsonErrors {
    fn render_error_code(&self, w: &mut RubyWriter, _ctx: &GenerationContext<'_>) -> Result<()> {
        w.write("code = http_resp.headers['x-error-code']")
            .write("return code if code")
            .open_block("begin")
            .write("map = Harbor::JSON.load(http_resp.body)")
            .write("map['__type'].to_s.split('#').last")
            .close_block("rescue Harbor::JSON::ParseError")
            .indent()
            .write("nil")
            .dedent()
            .write("end");
        Ok(())
    }
}
