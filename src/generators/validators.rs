//! Input validator emitter.
//!
//! `Validators` classes check caller input against the modeled shapes:
//! member types, required-ness, and IO-likeness of streaming members,
//! raising with a dotted context path on failure.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, MemberShape, Simple, StructureOrUnion},
    HasIdentity, ShapeID,
};

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, Resolved, ResolvedShape},
    symbol::Category,
    visitor::{self, ShapeVisitor},
    writer::RubyWriter,
    Result,
};

pub fn render(ctx: &GenerationContext<'_>) -> Result<()> {
    let generator = ValidatorsGenerator {
        ctx,
        writer: RubyWriter::new(),
        generated: BTreeSet::new(),
    };
    generator.render()
}

struct ValidatorsGenerator<'a> {
    ctx: &'a GenerationContext<'a>,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
}

impl<'a> ValidatorsGenerator<'a> {
    fn render(mut self) -> Result<()> {
        file_preamble(&mut self.writer);
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Validators");

        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            if let Some(input_id) = op.2.input() {
                for shape in model::walk_shapes(self.ctx.model, input_id)? {
                    if self.generated.insert(shape.id.clone()) {
                        visitor::accept(&mut self, &shape)?;
                    }
                }
            }
        }

        self.writer.close_block("end").close_block("end");
        let text = self.writer.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("validators"), text)
    }

    /// Validation lines for one value against a member's target.
    fn render_value_validation(
        &mut self,
        member: &MemberShape,
        getter: &str,
        context: &str,
    ) -> Result<()> {
        if model::is_streaming(self.ctx.model, member) {
            self.writer.write(format!(
                "Harbor::Validator.validate_responds_to!({}, :read, :rewind, context: \"{}\")",
                getter, context
            ));
            return Ok(());
        }
        let target = model::resolve(self.ctx.model, member.target())?;
        match &target.kind {
            Resolved::Simple(simple) => {
                if let Some(classes) = ruby_classes(simple) {
                    self.writer.write(format!(
                        "Harbor::Validator.validate_types!({}, {}, context: \"{}\")",
                        getter, classes, context
                    ));
                }
            }
            Resolved::List(_)
            | Resolved::Set(_)
            | Resolved::Map(_)
            | Resolved::Structure(_)
            | Resolved::Union(_) => {
                let name = self.ctx.symbols.shape_name(&target.id)?;
                self.writer.write(format!(
                    "{}.validate!({}, context: \"{}\") unless {}.nil?",
                    name, getter, context, getter
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// The Ruby classes a simple kind validates against; None skips the check.
fn ruby_classes(simple: &Simple) -> Option<&'static str> {
    match simple {
        Simple::String | Simple::Blob => Some("::String"),
        Simple::Boolean => Some("::TrueClass, ::FalseClass"),
        Simple::Byte | Simple::Short | Simple::Integer | Simple::Long | Simple::BigInteger => {
            Some("::Integer")
        }
        Simple::Float | Simple::Double | Simple::BigDecimal => Some("::Float"),
        Simple::Timestamp => Some("::Time"),
        Simple::Document => None,
    }
}

impl<'a> ShapeVisitor for ValidatorsGenerator<'a> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Validator)?;
        self.writer
            .blank()
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.validate!(input, context:)")
            .write(format!(
                "Harbor::Validator.validate_types!(input, Types::{}, context: context)",
                symbol.name
            ));
        for member in structure.members() {
            let name = self.ctx.symbols.member_name(member);
            let getter = format!("input[:{}]", name);
            let context = format!("#{{context}}[:{}]", name);
            if model::has_trait(member.traits(), model::required_trait()) {
                self.writer.write(format!(
                    "Harbor::Validator.validate_required!({}, context: \"{}\")",
                    getter, context
                ));
            }
            self.render_value_validation(member, &getter, &context)?;
        }
        self.writer.close_block("end").close_block("end");
        Ok(())
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, list)
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, set)
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &MapShape) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Validator)?;
        self.writer
            .blank()
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.validate!(input, context:)")
            .write("Harbor::Validator.validate_types!(input, ::Hash, context: context)")
            .open_block("input.each do |key, value|")
            .write(
                "Harbor::Validator.validate_types!(key, ::String, ::Symbol, context: \"#{context}.keys\")",
            );
        self.render_value_validation(map.value(), "value", "#{context}[#{key}]")?;
        self.writer
            .close_block("end")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn union(&mut self, shape: &ResolvedShape<'_>, union: &StructureOrUnion) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Validator)?;
        self.writer
            .blank()
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.validate!(input, context:)")
            .write("case input");
        for member in union.members() {
            let name = self.ctx.symbols.member_name(member);
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            self.writer
                .write(format!("when Types::{}::{}", symbol.name, member_class))
                .indent();
            let context = format!("#{{context}}[:{}]", name);
            self.render_value_validation(member, "input.__getobj__", &context)?;
            self.writer.dedent();
        }
        self.writer
            .open_block("else")
            .write(format!(
                "raise ArgumentError, \"Expected #{{context}} to be a union member of Types::{}, got #{{input.class}}.\"",
                symbol.name
            ))
            .close_block("end")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}

impl<'a> ValidatorsGenerator<'a> {
    fn render_list_like(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Validator)?;
        self.writer
            .blank()
            .open_block(format!("class {}", symbol.name))
            .open_block("def self.validate!(input, context:)")
            .write("Harbor::Validator.validate_types!(input, ::Array, context: context)")
            .open_block("input.each_with_index do |element, index|");
        self.render_value_validation(list.member(), "element", "#{context}[#{index}]")?;
        self.writer
            .close_block("end")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}
