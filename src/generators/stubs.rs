//! Response stub emitter.
//!
//! Every shape reachable from an operation output gets a class with a
//! `default(visited)` method returning a plausible non-empty value, and
//! operations get a `stub(http_resp, stub:)` that materializes a response
//! from a user-supplied stub map. Cycles short-circuit to nil through the
//! `visited` list.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, MemberShape, Operation, Simple, StructureOrUnion},
    HasIdentity, ShapeID,
};

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, Ix, Resolved, ResolvedShape},
    symbol::Category,
    visitor::{self, ShapeVisitor},
    writer::RubyWriter,
    Result,
};

/// Per-kind `stub` method hooks a protocol supplies to the stub emitter.
/// The class skeleton and `default(visited)` are rendered by the emitter.
pub trait StubDelegate {
    fn render_operation_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        op: &Ix<'_, Operation>,
        output: Option<&StructureOrUnion>,
    ) -> Result<()>;

    fn render_structure_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        strukt: &StructureOrUnion,
    ) -> Result<()>;

    fn render_list_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
    ) -> Result<()>;

    fn render_map_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        map: &MapShape,
    ) -> Result<()>;

    fn render_union_stub_method(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        union_id: &ShapeID,
        union: &StructureOrUnion,
    ) -> Result<()>;
}

/// Copy a streaming stub member into the response body. Used by protocol
/// delegates for operations with streaming payloads.
pub(crate) fn render_streaming_stub(
    w: &mut RubyWriter,
    ctx: &GenerationContext<'_>,
    output: &StructureOrUnion,
) -> Result<()> {
    if let Some(member) = output
        .members()
        .find(|m| model::is_streaming(ctx.model, m))
    {
        let name = ctx.symbols.member_name(member);
        w.write(format!("IO.copy_stream(stub[:{}], http_resp.body)", name));
    }
    Ok(())
}

pub struct StubsGenerator<'a, D: StubDelegate> {
    ctx: &'a GenerationContext<'a>,
    delegate: &'a D,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
}

impl<'a, D: StubDelegate> StubsGenerator<'a, D> {
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
        self.writer.write("require 'stringio'");
        self.writer.blank();
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Stubs");

        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            self.render_operation(op)?;
            self.generated.insert(op.0.clone());
            if let Some(output_id) = op.2.output() {
                self.generated.insert(output_id.clone());
                for shape in model::walk_shapes(self.ctx.model, output_id)? {
                    if self.generated.insert(shape.id.clone()) {
                        visitor::accept(&mut self, &shape)?;
                    }
                }
            }
        }

        self.writer.close_block("end").close_block("end");
        let text = self.writer.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("stubs"), text)
    }

    // The output shape is combined with the operation stubber: its defaults
    // become the operation's `default` and the delegate renders `stub`.
    fn render_operation(&mut self, op: &Ix<'_, Operation>) -> Result<()> {
        let Ix(op_id, _, operation) = op;
        let symbol = self.ctx.symbols.symbol(op_id, Category::Stub)?;
        let output = match operation.output() {
            Some(output_id) => {
                Some(model::expect_structure(self.ctx.model, output_id)?)
            }
            None => None,
        };

        self.writer
            .blank()
            .write(format!("# Operation Stubber for {}", op_id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        match &output {
            Some(Ix(_, _, strukt)) => self.render_member_defaults(strukt)?,
            None => {
                self.writer.write("{}");
            }
        }
        self.writer.close_block("end").blank();
        self.delegate.render_operation_stub_method(
            &mut self.writer,
            self.ctx,
            op,
            output.as_ref().map(|Ix(_, _, strukt)| *strukt),
        )?;
        self.writer.close_block("end");
        Ok(())
    }

    fn render_member_defaults(&mut self, shape: &StructureOrUnion) -> Result<()> {
        self.writer.open_block("{");
        for member in shape.members() {
            let name = self.ctx.symbols.member_name(member);
            let setter = format!("{}: ", name);
            self.render_member_default(member, &setter, ",")?;
        }
        self.writer.close_block("}");
        Ok(())
    }

    fn render_member_default(
        &mut self,
        member: &MemberShape,
        data_setter: &str,
        eol: &str,
    ) -> Result<()> {
        let member_name = self.ctx.symbols.member_name(member);
        let target = model::resolve(self.ctx.model, member.target())?;
        let value = match &target.kind {
            Resolved::Simple(Simple::String) | Resolved::Simple(Simple::Blob) => {
                format!("'{}'", member_name)
            }
            Resolved::Simple(
                Simple::Byte | Simple::Short | Simple::Integer | Simple::Long | Simple::BigInteger,
            ) => "1".to_string(),
            Resolved::Simple(Simple::Float | Simple::Double | Simple::BigDecimal) => {
                "1.0".to_string()
            }
            Resolved::Simple(Simple::Boolean) => "false".to_string(),
            Resolved::Simple(Simple::Timestamp) => "Time.now".to_string(),
            Resolved::Simple(Simple::Document) => {
                if model::is_prelude(&target.id) {
                    "nil".to_string()
                } else {
                    let name = self.ctx.symbols.shape_name(&target.id)?;
                    format!("Stubs::{}.default(visited)", name)
                }
            }
            Resolved::List(_)
            | Resolved::Set(_)
            | Resolved::Map(_)
            | Resolved::Structure(_)
            | Resolved::Union(_) => {
                let name = self.ctx.symbols.shape_name(&target.id)?;
                format!("Stubs::{}.default(visited)", name)
            }
            _ => "nil".to_string(),
        };
        self.writer
            .write(format!("{}{}{}", data_setter, value, eol));
        Ok(())
    }

    /// Cycle guard shared by every shape class `default`.
    fn render_visited_guard(&mut self, name: &str) {
        self.writer
            .write(format!("return nil if visited.include?('{}')", name))
            .write(format!("visited = visited + ['{}']", name));
    }
}

impl<'a, D: StubDelegate> ShapeVisitor for StubsGenerator<'a, D> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn simple(&mut self, shape: &ResolvedShape<'_>, simple: &Simple) -> Result<()> {
        // document shapes declared in the model get a stub class; other
        // simple declarations stub through their member defaults
        if !matches!(simple, Simple::Document) {
            return Ok(());
        }
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Stub)?;
        self.writer
            .blank()
            .write(format!("# Document Type Stubber for {}", symbol.name))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        self.render_visited_guard(&symbol.name);
        self.writer
            .write(format!("{{ '{}' => [0, 1, 2] }}", symbol.name))
            .close_block("end")
            .blank()
            .open_block("def self.stub(stub = {})")
            .write("stub")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Stub)?;
        self.writer
            .blank()
            .write(format!("# Structure Stubber for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        self.render_visited_guard(&symbol.name);
        self.render_member_defaults(structure)?;
        self.writer.close_block("end").blank();
        self.delegate
            .render_structure_stub_method(&mut self.writer, self.ctx, structure)?;
        self.writer.close_block("end");
        Ok(())
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, list, "List")
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, set, "Set")
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &MapShape) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Stub)?;
        self.writer
            .blank()
            .write(format!("# Map Stubber for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        self.render_visited_guard(&symbol.name);
        self.writer.open_block("{");
        self.render_member_default(map.value(), "test_key: ", "")?;
        self.writer.close_block("}").close_block("end").blank();
        self.delegate
            .render_map_stub_method(&mut self.writer, self.ctx, map)?;
        self.writer.close_block("end");
        Ok(())
    }

    fn union(&mut self, shape: &ResolvedShape<'_>, union: &StructureOrUnion) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Stub)?;
        self.writer
            .blank()
            .write(format!("# Union Stubber for {}", shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        self.render_visited_guard(&symbol.name);
        self.writer.open_block("{");
        if let Some(member) = union.members().next() {
            let name = self.ctx.symbols.member_name(member);
            let setter = format!("{}: ", name);
            self.render_member_default(member, &setter, ",")?;
        }
        self.writer.close_block("}").close_block("end").blank();
        self.delegate
            .render_union_stub_method(&mut self.writer, self.ctx, &shape.id, union)?;
        self.writer.close_block("end");
        Ok(())
    }
}

impl<'a, D: StubDelegate> StubsGenerator<'a, D> {
    fn render_list_like(
        &mut self,
        shape: &ResolvedShape<'_>,
        list: &ListOrSet,
        label: &str,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Stub)?;
        self.writer
            .blank()
            .write(format!("# {} Stubber for {}", label, shape.id.shape_name()))
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.default(visited=[])");
        self.render_visited_guard(&symbol.name);
        self.writer.open_block("[");
        self.render_member_default(list.member(), "", "")?;
        self.writer.close_block("]").close_block("end").blank();
        self.delegate
            .render_list_stub_method(&mut self.writer, self.ctx, shape, list)?;
        self.writer.close_block("end");
        Ok(())
    }
}
