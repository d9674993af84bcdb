//! Application transport model: the HTTP fragments and default middleware
//! the emitted client is wired with.

use std::sync::Arc;

use atelier_core::model::{shapes::HasTraits, Model, ShapeID};

use crate::{
    gen::GenerationContext,
    middleware::{Middleware, MiddlewareStack, MiddlewareStackStep},
    model::{self, HttpTrait},
    symbol::Category,
    ParamMap, Result,
};

/// One configuration key exposed by the emitted Config class.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    name: String,
    ruby_type: String,
    default_value: Option<String>,
    initialization: Option<String>,
    documentation: Option<String>,
    allow_operation_override: bool,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>, ruby_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ruby_type: ruby_type.into(),
            default_value: None,
            initialization: None,
            documentation: None,
            allow_operation_override: false,
        }
    }

    /// Ruby literal used when the caller does not supply the option.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Full custom initialization line, overriding the default
    /// `options.fetch` rendering.
    pub fn initialization(mut self, line: impl Into<String>) -> Self {
        self.initialization = Some(line.into());
        self
    }

    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    /// Allow per-operation `options` to override the configured value.
    pub fn operation_override(mut self) -> Self {
        self.allow_operation_override = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ruby_type(&self) -> &str {
        &self.ruby_type
    }

    pub fn default(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn allows_operation_override(&self) -> bool {
        self.allow_operation_override
    }

    /// Ruby expression reading this key inside the emitted client.
    pub fn render_get_value(&self) -> String {
        format!("@config.{}", self.name)
    }

    /// Ruby line initializing this key inside the emitted Config class.
    pub fn render_initialization(&self) -> String {
        if let Some(line) = &self.initialization {
            return line.clone();
        }
        match &self.default_value {
            Some(default) => format!("@{} = options.fetch(:{}, {})", self.name, self.name, default),
            None => format!("@{} = options[:{}]", self.name, self.name),
        }
    }
}

pub type FragmentRender = Arc<dyn for<'a> Fn(&GenerationContext<'a>) -> String>;

/// A constructor fragment rendered into the emitted client, together with
/// the config keys it reads.
#[derive(Clone)]
pub struct ClientFragment {
    configs: Vec<ClientConfig>,
    render: FragmentRender,
}

impl ClientFragment {
    pub fn new<F>(render: F) -> Self
    where
        F: for<'a> Fn(&GenerationContext<'a>) -> String + 'static,
    {
        Self {
            configs: Vec::new(),
            render: Arc::new(render),
        }
    }

    pub fn add_config(mut self, config: ClientConfig) -> Self {
        self.configs.push(config);
        self
    }

    pub fn configs(&self) -> &[ClientConfig] {
        &self.configs
    }

    pub fn render(&self, ctx: &GenerationContext<'_>) -> String {
        (self.render)(ctx)
    }
}

pub type DefaultMiddleware =
    Arc<dyn for<'a> Fn(&GenerationContext<'a>) -> Result<Vec<Middleware>>>;

/// An application transport: request/response/client construction plus the
/// default middleware attached to every operation.
#[derive(Clone)]
pub struct ApplicationTransport {
    name: String,
    request: ClientFragment,
    response: ClientFragment,
    client: ClientFragment,
    default_middleware: DefaultMiddleware,
}

impl ApplicationTransport {
    pub fn new(
        name: impl Into<String>,
        request: ClientFragment,
        response: ClientFragment,
        client: ClientFragment,
        default_middleware: DefaultMiddleware,
    ) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            client,
            default_middleware,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_http(&self) -> bool {
        self.name.starts_with("http")
    }

    pub fn request(&self) -> &ClientFragment {
        &self.request
    }

    pub fn response(&self) -> &ClientFragment {
        &self.response
    }

    pub fn client(&self) -> &ClientFragment {
        &self.client
    }

    /// Register this transport's default middleware into `stack`.
    pub fn apply_default_middleware(
        &self,
        ctx: &GenerationContext<'_>,
        stack: &mut MiddlewareStack,
    ) -> Result<()> {
        for record in (self.default_middleware)(ctx)? {
            stack.register(record);
        }
        Ok(())
    }

    /// Config keys contributed by the transport fragments.
    pub fn client_config(&self) -> Vec<&ClientConfig> {
        let mut out = Vec::new();
        out.extend(self.request.configs());
        out.extend(self.response.configs());
        out.extend(self.client.configs());
        out
    }

    /// The default HTTP transport: request from the `endpoint` config, a
    /// streaming-capable response, a wire-traceable client, and the
    /// Validate/Build/ContentLength/ContentMD5/Parse middleware.
    pub fn default_http() -> Self {
        let endpoint = ClientConfig::new("endpoint", "String")
            .documentation("Endpoint of the service")
            .operation_override();

        let request = ClientFragment::new(|_ctx| {
            "Harbor::HTTP::Request.new(url: options.fetch(:endpoint, @config.endpoint))".to_string()
        })
        .add_config(endpoint);

        let response = ClientFragment::new(|_ctx| {
            "Harbor::HTTP::Response.new(body: output_stream(options, &block))".to_string()
        });

        let wire_trace = ClientConfig::new("http_wire_trace", "Boolean")
            .default_value("false")
            .documentation("Enable debug wire trace on http requests.");
        let log_level = ClientConfig::new("log_level", "Symbol")
            .default_value(":info")
            .documentation("Default log level to use");
        let logger = ClientConfig::new("logger", "Logger")
            .initialization("@logger = options.fetch(:logger, Logger.new($stdout, level: @log_level))")
            .documentation("Logger to use for output");

        let client = ClientFragment::new(|_ctx| {
            "Harbor::HTTP::Client.new(logger: @config.logger, http_wire_trace: @config.http_wire_trace)"
                .to_string()
        })
        .add_config(wire_trace)
        .add_config(log_level)
        .add_config(logger);

        ApplicationTransport::new(
            "http",
            request,
            response,
            client,
            Arc::new(default_http_middleware),
        )
    }
}

fn default_http_middleware(_ctx: &GenerationContext<'_>) -> Result<Vec<Middleware>> {
    let mut middleware = Vec::new();

    let validate_input = ClientConfig::new("validate_input", "Boolean")
        .default_value("true")
        .documentation("When `true`, request parameters are validated using the modeled shapes.");
    middleware.push(
        Middleware::builder("Harbor::Middleware::Validate")
            .step(MiddlewareStackStep::Initialize)
            .add_config(validate_input)
            .operation_params(|ctx, operation| {
                let model::Ix(_, _, op) =
                    model::get_operation(ctx.model, &ctx.service_id, operation)?;
                let input = op.input().as_ref().ok_or_else(|| {
                    crate::Error::ModelIntegrity(format!("operation {} has no input", operation))
                })?;
                let symbol = ctx.symbols.symbol(input, Category::Validator)?;
                let mut params = ParamMap::new();
                params.insert(
                    "validator".to_string(),
                    format!("Validators::{}", symbol.name),
                );
                Ok(params)
            })
            .build()?,
    );

    middleware.push(
        Middleware::builder("Harbor::Middleware::Build")
            .step(MiddlewareStackStep::Serialize)
            .operation_params(|ctx, operation| {
                let symbol = ctx.symbols.symbol(operation, Category::Builder)?;
                let mut params = ParamMap::new();
                params.insert("builder".to_string(), format!("Builders::{}", symbol.name));
                Ok(params)
            })
            .build()?,
    );

    middleware.push(
        Middleware::builder("Harbor::HTTP::Middleware::ContentLength")
            .step(MiddlewareStackStep::Build)
            .operation_predicate(|model, service, operation| {
                !input_has_streaming_payload(model, service, operation)
            })
            .build()?,
    );

    middleware.push(
        Middleware::builder("Harbor::HTTP::Middleware::ContentMD5")
            .step(MiddlewareStackStep::Build)
            .operation_predicate(|model, service, operation| {
                model::get_operation(model, service, operation)
                    .map(|model::Ix(_, traits, _)| {
                        model::has_trait(traits, model::http_checksum_required_trait())
                    })
                    .unwrap_or(false)
            })
            .build()?,
    );

    middleware.push(
        Middleware::builder("Harbor::Middleware::Parse")
            .step(MiddlewareStackStep::Deserialize)
            .operation_params(|ctx, operation| {
                let model::Ix(_, op_traits, op) =
                    model::get_operation(ctx.model, &ctx.service_id, operation)?;
                let symbol = ctx.symbols.symbol(operation, Category::Parser)?;
                let http: HttpTrait = model::get_trait(op_traits, model::http_trait())?
                    .ok_or_else(|| {
                        crate::Error::ModelIntegrity(format!(
                            "operation {} is missing the http trait",
                            operation
                        ))
                    })?;
                let mut errors = Vec::new();
                for error_id in op.errors() {
                    let error_symbol = ctx.symbols.symbol(error_id, Category::Error)?;
                    errors.push(format!("Errors::{}", error_symbol.name));
                }
                let mut params = ParamMap::new();
                params.insert(
                    "data_parser".to_string(),
                    format!("Parsers::{}", symbol.name),
                );
                params.insert(
                    "error_parser".to_string(),
                    format!(
                        "Harbor::HTTP::ErrorParser.new(error_module: Errors, error_code_fn: Errors.method(:error_code), success_status_code: {}, errors: [{}])",
                        http.code,
                        errors.join(", ")
                    ),
                );
                Ok(params)
            })
            .build()?,
    );

    Ok(middleware)
}

/// true if the operation's input has a member that is both the payload and
/// streaming; ContentLength cannot be computed for those requests.
fn input_has_streaming_payload(model: &Model, service: &ShapeID, operation: &ShapeID) -> bool {
    let op = match model::get_operation(model, service, operation) {
        Ok(model::Ix(_, _, op)) => op,
        Err(_) => return false,
    };
    let input = match op.input() {
        Some(input) => input,
        None => return false,
    };
    let strukt = match model::expect_structure(model, input) {
        Ok(model::Ix(_, _, strukt)) => strukt,
        Err(_) => return false,
    };
    strukt.members().any(|m| {
        model::has_trait(m.traits(), model::http_payload_trait()) && model::is_streaming(model, m)
    })
}
