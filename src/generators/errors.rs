//! Error class emitter.
//!
//! Every shape declared as an operation error becomes a class under the
//! `Errors` module, inheriting `ApiClientError` or `ApiServiceError` from
//! the `error` trait's fault. The protocol supplies the `error_code`
//! resolver used to map a response to one of these classes.

use std::collections::BTreeMap;

use atelier_core::model::ShapeID;

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    model::{self, ErrorFault},
    symbol::Category,
    writer::RubyWriter,
    Result,
};

/// Protocol hook rendering the body of `Errors.error_code(http_resp)`.
pub trait ErrorsDelegate {
    fn render_error_code(&self, w: &mut RubyWriter, ctx: &GenerationContext<'_>) -> Result<()>;
}

pub struct ErrorsGenerator<'a, D: ErrorsDelegate> {
    ctx: &'a GenerationContext<'a>,
    delegate: &'a D,
}

impl<'a, D: ErrorsDelegate> ErrorsGenerator<'a, D> {
    pub fn new(ctx: &'a GenerationContext<'a>, delegate: &'a D) -> Self {
        Self { ctx, delegate }
    }

    pub fn render(self) -> Result<()> {
        let mut w = RubyWriter::new();
        file_preamble(&mut w);
        w.open_block(format!("module {}", self.ctx.settings.module))
            .open_block("module Errors");

        w.write("# Base class for all errors returned by this service")
            .write("class ApiError < Harbor::HTTP::ApiError; end")
            .blank()
            .write("# Base class for all errors returned where the client is at fault")
            .write("class ApiClientError < ApiError; end")
            .blank()
            .write("# Base class for all errors returned where the server is at fault")
            .write("class ApiServiceError < ApiError; end")
            .blank()
            .write("# Maps an error response to the name of a modeled error")
            .open_block("def self.error_code(http_resp)");
        self.delegate.render_error_code(&mut w, self.ctx)?;
        w.close_block("end");

        for (_, error_id) in self.error_shapes()? {
            self.render_error_class(&mut w, &error_id)?;
        }

        w.close_block("end").close_block("end");
        let text = w.finalize()?;
        self.ctx.write_file(self.ctx.lib_file("errors"), text)
    }

    /// All errors declared across the service's operations, keyed by
    /// emitted name for deterministic ordering.
    fn error_shapes(&self) -> Result<BTreeMap<String, ShapeID>> {
        let mut out = BTreeMap::new();
        let operations = model::top_down_operations(self.ctx.model, &self.ctx.service_id)?;
        for op in operations.iter() {
            for error_id in op.2.errors() {
                let name = self.ctx.symbols.shape_name(error_id)?;
                out.insert(name, error_id.clone());
            }
        }
        Ok(out)
    }

    fn render_error_class(&self, w: &mut RubyWriter, error_id: &ShapeID) -> Result<()> {
        let model::Ix(_, traits, _) = model::expect_structure(self.ctx.model, error_id)?;
        let symbol = self.ctx.symbols.symbol(error_id, Category::Error)?;
        let fault = model::get_trait::<ErrorFault>(traits, model::error_trait())?;
        let base = match fault {
            Some(ErrorFault::Server) => "ApiServiceError",
            _ => "ApiClientError",
        };
        w.blank();
        if let Some(doc) = model::documentation(traits) {
            for line in doc.lines() {
                w.write(format!("# {}", line));
            }
        }
        w.open_block(format!("class {} < {}", symbol.name, base))
            .open_block("def initialize(http_resp:, **kwargs)")
            .write(format!("@data = Parsers::{}.parse(http_resp)", symbol.name))
            .write("super(http_resp: http_resp, **kwargs)")
            .close_block("end")
            .blank()
            .write(format!("# @return [Types::{}]", symbol.name))
            .write("attr_reader :data")
            .close_block("end");
        Ok(())
    }
}
