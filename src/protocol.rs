//! The pluggable contract every wire protocol implements.

use atelier_core::model::{shapes::AppliedTraits, ShapeID};

use crate::{
    gen::GenerationContext,
    middleware::MiddlewareStack,
    transport::{ApplicationTransport, ClientConfig},
    Error, Result,
};

/// A protocol generator maps the model onto a concrete wire format. The
/// orchestrator calls each `generate_*` method exactly once per run; each
/// writes one output file through the context's manifest.
pub trait ProtocolGenerator {
    /// The trait id this generator is selected by. A service declares its
    /// protocol by carrying this trait.
    fn protocol_id(&self) -> &ShapeID;

    /// The application transport the emitted client is wired with.
    fn application_transport(&self) -> ApplicationTransport {
        ApplicationTransport::default_http()
    }

    /// Emit request builders (`builders.rb`): one class per operation with a
    /// `build(http_req, input:)` method, plus transitive shape builders.
    fn generate_builders(&self, ctx: &GenerationContext<'_>) -> Result<()>;

    /// Emit response parsers (`parsers.rb`): one class per operation with a
    /// `parse(http_resp)` method, plus transitive shape and error parsers.
    fn generate_parsers(&self, ctx: &GenerationContext<'_>) -> Result<()>;

    /// Emit response stubs (`stubs.rb`): per-shape `default(visited)` and
    /// per-operation `stub(http_resp, stub:)`.
    fn generate_stubs(&self, ctx: &GenerationContext<'_>) -> Result<()>;

    /// Emit error classes (`errors.rb`) and the protocol's `error_code`
    /// resolver.
    fn generate_errors(&self, ctx: &GenerationContext<'_>) -> Result<()>;

    /// Hook to add or replace client middleware beyond the transport
    /// defaults.
    fn modify_client_middleware(
        &self,
        _stack: &mut MiddlewareStack,
        _ctx: &GenerationContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Additional (non-middleware) config exposed by the emitted client.
    fn additional_client_config(&self, _ctx: &GenerationContext<'_>) -> Vec<ClientConfig> {
        Vec::new()
    }

    /// Write protocol sidecar files; returns their relative require paths.
    fn write_additional_files(&self, _ctx: &GenerationContext<'_>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Match the service's protocol trait against the registered generators.
pub fn resolve<'a>(
    service_traits: &AppliedTraits,
    registered: &'a [Box<dyn ProtocolGenerator>],
) -> Result<&'a dyn ProtocolGenerator> {
    for generator in registered.iter() {
        if service_traits.contains_key(generator.protocol_id()) {
            return Ok(generator.as_ref());
        }
    }
    let known: Vec<String> = registered
        .iter()
        .map(|g| g.protocol_id().to_string())
        .collect();
    Err(Error::UnsupportedProtocol(format!(
        "service declares none of [{}]",
        known.join(", ")
    )))
}
