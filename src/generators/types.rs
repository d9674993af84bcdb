//! Modeled type emitter.
//!
//! Structures become `::Struct` records, unions become delegator subclasses
//! with an `Unknown` variant, and enum strings become modules of frozen
//! string constants.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, Simple, StructureOrUnion},
    HasIdentity, ShapeID,
};

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, EnumValue, Resolved, ResolvedShape},
    symbol::Category,
    visitor::{self, ShapeVisitor},
    writer::RubyWriter,
    Result,
};

pub fn render(ctx: &GenerationContext<'_>) -> Result<()> {
    let generator = TypesGenerator {
        ctx,
        writer: RubyWriter::new(),
        generated: BTreeSet::new(),
    };
    generator.render()
}

struct TypesGenerator<'a> {
    ctx: &'a GenerationContext<'a>,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
}

impl<'a> TypesGenerator<'a> {
    fn render(mut self) -> Result<()> {
        file_preamble(&mut self.writer);
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Types");

        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            let mut roots: Vec<&ShapeID> = Vec::new();
            roots.extend(op.2.input());
            roots.extend(op.2.output());
            roots.extend(op.2.errors());
            for root in roots {
                for shape in model::walk_shapes(self.ctx.model, root)? {
                    if self.generated.insert(shape.id.clone()) {
                        visitor::accept(&mut self, &shape)?;
                    }
                }
            }
        }

        self.writer.close_block("end").close_block("end");
        let text = self.writer.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("types"), text)
    }

    fn write_doc(&mut self, traits: &atelier_core::model::shapes::AppliedTraits) {
        if let Some(doc) = model::documentation(traits) {
            for line in doc.lines() {
                self.writer.write(format!("# {}", line));
            }
        }
    }
}

impl<'a> ShapeVisitor for TypesGenerator<'a> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn simple(&mut self, shape: &ResolvedShape<'_>, simple: &Simple) -> Result<()> {
        if !matches!(simple, Simple::String) {
            return Ok(());
        }
        let values: Option<Vec<EnumValue>> =
            model::get_trait(shape.traits, model::enum_trait())?;
        let values = match values {
            Some(values) => values,
            None => return Ok(()),
        };
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Type)?;
        self.writer.blank();
        self.write_doc(shape.traits);
        self.writer
            .write(format!("# Enum constants for {}", shape.id.shape_name()))
            .open_block(format!("module {}", symbol.name));
        let last = values.len().saturating_sub(1);
        for (i, value) in values.iter().enumerate() {
            if let Some(doc) = &value.documentation {
                for line in doc.lines() {
                    self.writer.write(format!("# {}", line));
                }
            }
            let constant = self
                .ctx
                .symbols
                .enum_constant(value.name.as_deref(), &value.value);
            self.writer
                .write(format!("{} = '{}'", constant, value.value));
            if i != last {
                self.writer.blank();
            }
        }
        self.writer.close_block("end");
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Type)?;
        let members: Vec<String> = structure
            .members()
            .map(|m| self.ctx.symbols.member_name(m))
            .collect();
        self.writer.blank();
        self.write_doc(shape.traits);
        if members.is_empty() {
            self.writer
                .open_block(format!("class {}", symbol.name))
                .write("include Harbor::Structure")
                .close_block("end");
            return Ok(());
        }
        self.writer
            .open_block(format!("{} = ::Struct.new(", symbol.name));
        for member in members.iter() {
            self.writer.write(format!(":{},", member));
        }
        self.writer.write("keyword_init: true");
        self.writer
            .close_block(") do")
            .indent()
            .write("include Harbor::Structure")
            .dedent()
            .write("end");
        Ok(())
    }

    fn union(&mut self, shape: &ResolvedShape<'_>, union: &StructureOrUnion) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Type)?;
        self.writer.blank();
        self.write_doc(shape.traits);
        self.writer
            .open_block(format!("class {} < Harbor::Union", symbol.name));
        let mut first = true;
        for member in union.members() {
            if !first {
                self.writer.blank();
            }
            first = false;
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            let accessor = self.ctx.symbols.member_name(member);
            self.write_doc(member.traits());
            self.writer
                .open_block(format!("class {} < {}", member_class, symbol.name))
                .open_block("def to_h")
                .write(format!("{{ {}: super(__getobj__) }}", accessor))
                .close_block("end")
                .close_block("end");
        }
        if !first {
            self.writer.blank();
        }
        self.writer
            .write("# Handles unknown future members")
            .open_block(format!("class Unknown < {}", symbol.name))
            .open_block("def to_h")
            .write("{ unknown: super(__getobj__) }")
            .close_block("end")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}
