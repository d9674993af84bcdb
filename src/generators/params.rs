//! Input normalizer emitter.
//!
//! `Params` modules turn loosely-typed caller hashes into the strict
//! `Types` records, recursing through complex members and carrying a dotted
//! context path for error reporting.

use std::collections::BTreeSet;

use atelier_core::model::{
    shapes::{HasTraits, ListOrSet, Map as MapShape, StructureOrUnion},
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
    let generator = ParamsGenerator {
        ctx,
        writer: RubyWriter::new(),
        generated: BTreeSet::new(),
    };
    generator.render()
}

struct ParamsGenerator<'a> {
    ctx: &'a GenerationContext<'a>,
    writer: RubyWriter,
    generated: BTreeSet<ShapeID>,
}

impl<'a> ParamsGenerator<'a> {
    fn render(mut self) -> Result<()> {
        file_preamble(&mut self.writer);
        self.writer.write("require 'securerandom'");
        self.writer.blank();
        self.writer
            .open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Params");

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
        self.ctx.write_file(self.ctx.lib_file("params"), text)
    }

    /// Expression converting one params value to its typed form.
    fn build_expr(&self, target_id: &ShapeID, value: &str, context: &str) -> Result<String> {
        let target = model::resolve(self.ctx.model, target_id)?;
        Ok(match &target.kind {
            Resolved::List(_)
            | Resolved::Set(_)
            | Resolved::Map(_)
            | Resolved::Structure(_)
            | Resolved::Union(_) => {
                let name = self.ctx.symbols.shape_name(&target.id)?;
                format!("{}.build({}, context: \"{}\")", name, value, context)
            }
            _ => value.to_string(),
        })
    }
}

impl<'a> ShapeVisitor for ParamsGenerator<'a> {
    type Output = ();

    fn default_shape(&mut self, _shape: &ResolvedShape<'_>) -> Result<()> {
        Ok(())
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Params)?;
        self.writer
            .blank()
            .open_block(format!("module {}", symbol.name))
            .open_block("def self.build(params, context: '')")
            .write(format!(
                "Harbor::Validator.validate_types!(params, ::Hash, Types::{}, context: context)",
                symbol.name
            ))
            .write(format!("type = Types::{}.new", symbol.name));
        for member in structure.members() {
            let name = self.ctx.symbols.member_name(member);
            let getter = format!("params[:{}]", name);
            let context = format!("#{{context}}[:{}]", name);
            if model::has_trait(member.traits(), model::idempotency_token_trait()) {
                self.writer.write(format!(
                    "type.{} = {} || ::SecureRandom.uuid",
                    name, getter
                ));
                continue;
            }
            let expr = self.build_expr(member.target(), &getter, &context)?;
            if expr == getter {
                self.writer.write(format!("type.{} = {}", name, getter));
            } else {
                self.writer.write(format!(
                    "type.{} = {} unless {}.nil?",
                    name, expr, getter
                ));
            }
        }
        self.writer
            .write("type")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, list)
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<()> {
        self.render_list_like(shape, set)
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &MapShape) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Params)?;
        let expr = self.build_expr(map.value().target(), "value", "#{context}[#{key}]")?;
        self.writer
            .blank()
            .open_block(format!("module {}", symbol.name))
            .open_block("def self.build(params, context: '')")
            .write("Harbor::Validator.validate_types!(params, ::Hash, context: context)")
            .write("data = {}")
            .open_block("params.each do |key, value|")
            .write(format!("data[key] = {}", expr))
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }

    fn union(&mut self, shape: &ResolvedShape<'_>, union: &StructureOrUnion) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Params)?;
        self.writer
            .blank()
            .open_block(format!("module {}", symbol.name))
            .open_block("def self.build(params, context: '')")
            .write(format!(
                "return params if params.is_a?(Types::{})",
                symbol.name
            ))
            .write(format!(
                "Harbor::Validator.validate_types!(params, ::Hash, Types::{}, context: context)",
                symbol.name
            ))
            .open_block("unless params.size == 1")
            .write(format!(
                "raise ArgumentError,\n\"Expected #{{context}} to have exactly one member, got: #{{params}}\""
            ))
            .close_block("end")
            .write("key, value = params.flatten")
            .write("case key");
        let accessors: Vec<String> = union
            .members()
            .map(|m| format!(":{}", self.ctx.symbols.member_name(m)))
            .collect();
        for member in union.members() {
            let name = self.ctx.symbols.member_name(member);
            let member_class = crate::strings::to_pascal_case(&member.id().to_string());
            let context = format!("#{{context}}[:{}]", name);
            let expr = self.build_expr(member.target(), "value", &context)?;
            self.writer
                .write(format!("when :{}", name))
                .indent()
                .write(format!(
                    "Types::{}::{}.new({})",
                    symbol.name, member_class, expr
                ))
                .dedent();
        }
        self.writer
            .open_block("else")
            .write(format!(
                "raise ArgumentError, \"Expected #{{context}} to have one of {} set\"",
                accessors.join(", ")
            ))
            .close_block("end")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}

impl<'a> ParamsGenerator<'a> {
    fn render_list_like(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<()> {
        let symbol = self.ctx.symbols.symbol(&shape.id, Category::Params)?;
        let expr = self.build_expr(list.member().target(), "element", "#{context}[#{index}]")?;
        self.writer
            .blank()
            .open_block(format!("module {}", symbol.name))
            .open_block("def self.build(params, context: '')")
            .write("Harbor::Validator.validate_types!(params, ::Array, context: context)")
            .write("data = []")
            .open_block("params.each_with_index do |element, index|")
            .write(format!("data << {}", expr))
            .close_block("end")
            .write("data")
            .close_block("end")
            .close_block("end");
        Ok(())
    }
}
