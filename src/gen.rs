//! Generation orchestrator.
//!
//! One [`Generator`] run walks a single service: it validates the model,
//! resolves the protocol generator from the service's protocol trait, runs
//! every emitter exactly once, composes the middleware stack, and returns
//! the file manifest for the caller to flush.

use std::cell::RefCell;

use atelier_core::model::{Model, ShapeID};
use tracing::{debug, info};

use crate::{
    config::GenSettings,
    generators,
    manifest::FileManifest,
    middleware::{Middleware, MiddlewareStack},
    model,
    protocol::{self, ProtocolGenerator},
    symbol::SymbolProvider,
    validate, Result,
};

/// Shared state every emitter reads: the model, the settings, the service
/// being generated, the symbol provider, and the manifest sink.
pub struct GenerationContext<'a> {
    pub model: &'a Model,
    pub settings: &'a GenSettings,
    pub service_id: ShapeID,
    pub symbols: SymbolProvider<'a>,
    pub manifest: RefCell<FileManifest>,
}

impl<'a> GenerationContext<'a> {
    /// Record a generated file.
    pub fn write_file(&self, path: impl AsRef<std::path::Path>, content: String) -> Result<()> {
        debug!("writing {}", path.as_ref().display());
        self.manifest.borrow_mut().write_file(path, content)
    }

    /// `<gem>/lib/<gem>/<stem>.rb`
    pub fn lib_file(&self, stem: &str) -> String {
        format!(
            "{}/lib/{}/{}.rb",
            self.settings.gem, self.settings.gem, stem
        )
    }
}

pub struct Generator {
    protocols: Vec<Box<dyn ProtocolGenerator>>,
    user_middleware: Vec<Middleware>,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            protocols: vec![Box::new(
                crate::protocols::rest_json::RestJsonGenerator::default(),
            )],
            user_middleware: Vec::new(),
        }
    }
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional protocol generator.
    pub fn add_protocol(&mut self, protocol: Box<dyn ProtocolGenerator>) -> &mut Self {
        self.protocols.push(protocol);
        self
    }

    /// Register middleware appended after transport defaults and protocol
    /// contributions.
    pub fn add_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.user_middleware.push(middleware);
        self
    }

    /// Run a full generation and return the manifest of emitted files.
    pub fn generate(&self, model: &Model, settings: &GenSettings) -> Result<FileManifest> {
        let service_id = settings.service_id()?;
        validate::validate(model, &service_id)?;

        let ctx = GenerationContext {
            model,
            settings,
            service_id: service_id.clone(),
            symbols: SymbolProvider::new(model, &settings.module, &settings.gem),
            manifest: RefCell::new(FileManifest::new()),
        };

        let model::Ix(_, service_traits, _) = model::expect_service(model, &service_id)?;
        let protocol = protocol::resolve(service_traits, &self.protocols)?;
        info!(
            "generating {} for service {} with protocol {}",
            settings.gem,
            service_id,
            protocol.protocol_id()
        );

        let transport = protocol.application_transport();
        let mut stack = MiddlewareStack::new();
        transport.apply_default_middleware(&ctx, &mut stack)?;
        protocol.modify_client_middleware(&mut stack, &ctx)?;
        for record in self.user_middleware.iter() {
            stack.register(record.clone());
        }

        protocol.generate_builders(&ctx)?;
        protocol.generate_parsers(&ctx)?;
        protocol.generate_stubs(&ctx)?;
        protocol.generate_errors(&ctx)?;
        generators::types::render(&ctx)?;
        generators::params::render(&ctx)?;
        generators::validators::render(&ctx)?;

        let additional_config = protocol.additional_client_config(&ctx);
        generators::client::render(&ctx, &transport, &stack, &additional_config)?;

        let mut sidecars = protocol.write_additional_files(&ctx)?;
        for record in stack.records().iter() {
            sidecars.extend(record.write_extra_files(&ctx)?);
        }
        sidecars.sort();
        sidecars.dedup();
        generators::module_file::render(&ctx, &sidecars)?;

        let manifest = ctx.manifest.into_inner();
        info!("generated {} files", manifest.len());
        Ok(manifest)
    }
}
