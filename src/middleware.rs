//! Middleware records and the per-service middleware stack.
//!
//! A [`Middleware`] describes one unit of per-request logic in the emitted
//! client: the runtime class that implements it, the pipeline step it
//! attaches to, its ordering within that step, the predicates that decide
//! which services/operations include it, and the parameters rendered into
//! the `stack.use` call.

use std::sync::Arc;

use atelier_core::model::{Model, ShapeID};

use crate::{
    gen::GenerationContext, transport::ClientConfig, writer::RubyWriter, Error, ParamMap, Result,
};

/// Pipeline steps of the emitted middleware stack, in canonical order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MiddlewareStackStep {
    Initialize,
    Serialize,
    Build,
    Finalize,
    Deserialize,
}

impl MiddlewareStackStep {
    pub const ALL: [MiddlewareStackStep; 5] = [
        MiddlewareStackStep::Initialize,
        MiddlewareStackStep::Serialize,
        MiddlewareStackStep::Build,
        MiddlewareStackStep::Finalize,
        MiddlewareStackStep::Deserialize,
    ];
}

pub type ServicePredicate = Arc<dyn Fn(&Model, &ShapeID) -> bool>;
pub type OperationPredicate = Arc<dyn Fn(&Model, &ShapeID, &ShapeID) -> bool>;
pub type OperationParams = Arc<dyn for<'a> Fn(&GenerationContext<'a>, &ShapeID) -> Result<ParamMap>>;
pub type RenderHook =
    Arc<dyn for<'a> Fn(&mut RubyWriter, &Middleware, &GenerationContext<'a>, &ShapeID) -> Result<()>>;
pub type ExtraFiles = Arc<dyn for<'a> Fn(&GenerationContext<'a>) -> Result<Vec<String>>>;

/// One middleware record. Built through [`Middleware::builder`]; immutable
/// afterwards.
#[derive(Clone)]
pub struct Middleware {
    klass: String,
    step: MiddlewareStackStep,
    order: i8,
    client_config: Vec<ClientConfig>,
    additional_params: ParamMap,
    operation_params: Option<OperationParams>,
    service_predicate: Option<ServicePredicate>,
    operation_predicate: Option<OperationPredicate>,
    render: Option<RenderHook>,
    extra_files: Option<ExtraFiles>,
}

impl Middleware {
    pub fn builder(klass: impl Into<String>) -> MiddlewareBuilder {
        MiddlewareBuilder {
            klass: klass.into(),
            step: None,
            order: 0,
            client_config: Vec::new(),
            additional_params: ParamMap::new(),
            operation_params: None,
            service_predicate: None,
            operation_predicate: None,
            render: None,
            extra_files: None,
        }
    }

    pub fn klass(&self) -> &str {
        &self.klass
    }

    pub fn step(&self) -> MiddlewareStackStep {
        self.step
    }

    pub fn order(&self) -> i8 {
        self.order
    }

    pub fn client_config(&self) -> &[ClientConfig] {
        &self.client_config
    }

    /// true if this middleware applies to the service
    pub fn include_for_service(&self, model: &Model, service: &ShapeID) -> bool {
        match &self.service_predicate {
            Some(predicate) => predicate(model, service),
            None => true,
        }
    }

    /// true if this middleware applies to the operation
    pub fn include_for_operation(&self, model: &Model, service: &ShapeID, operation: &ShapeID) -> bool {
        match &self.operation_predicate {
            Some(predicate) => predicate(model, service, operation),
            None => true,
        }
    }

    /// All parameters for an operation's `stack.use` call: static params,
    /// per-operation params, and config-backed params, in key order.
    pub fn params(&self, ctx: &GenerationContext<'_>, operation: &ShapeID) -> Result<ParamMap> {
        let mut params = self.additional_params.clone();
        if let Some(producer) = &self.operation_params {
            params.extend(producer(ctx, operation)?);
        }
        for config in self.client_config.iter() {
            params.insert(config.name().to_string(), config.render_get_value());
        }
        Ok(params)
    }

    /// Render the addition of this middleware to an operation's stack.
    pub fn render_add(
        &self,
        w: &mut RubyWriter,
        ctx: &GenerationContext<'_>,
        operation: &ShapeID,
    ) -> Result<()> {
        if let Some(hook) = &self.render {
            let hook = Arc::clone(hook);
            return hook(w, self, ctx, operation);
        }
        let params = self.params(ctx, operation)?;
        if params.is_empty() {
            w.write(format!("stack.use({})", self.klass));
        } else {
            w.open_block(format!("stack.use({},", self.klass));
            let last = params.len() - 1;
            for (i, (key, value)) in params.iter().enumerate() {
                let eol = if i == last { "" } else { "," };
                w.write(format!("{}: {}{}", key, value, eol));
            }
            w.close_block(")");
        }
        Ok(())
    }

    /// Write sidecar files this middleware needs; returns their relative
    /// require paths.
    pub fn write_extra_files(&self, ctx: &GenerationContext<'_>) -> Result<Vec<String>> {
        match &self.extra_files {
            Some(producer) => producer(ctx),
            None => Ok(Vec::new()),
        }
    }
}

pub struct MiddlewareBuilder {
    klass: String,
    step: Option<MiddlewareStackStep>,
    order: i8,
    client_config: Vec<ClientConfig>,
    additional_params: ParamMap,
    operation_params: Option<OperationParams>,
    service_predicate: Option<ServicePredicate>,
    operation_predicate: Option<OperationPredicate>,
    render: Option<RenderHook>,
    extra_files: Option<ExtraFiles>,
}

impl MiddlewareBuilder {
    /// The pipeline step this middleware attaches to. Required.
    pub fn step(mut self, step: MiddlewareStackStep) -> Self {
        self.step = Some(step);
        self
    }

    /// Order within the step; smaller runs earlier, ties break by
    /// registration order.
    pub fn order(mut self, order: i8) -> Self {
        self.order = order;
        self
    }

    /// Config key the emitted client must expose for this middleware.
    pub fn add_config(mut self, config: ClientConfig) -> Self {
        self.client_config.push(config);
        self
    }

    /// Static parameter merged into the `stack.use` call.
    pub fn add_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_params.insert(name.into(), value.into());
        self
    }

    /// Producer of per-operation parameters.
    pub fn operation_params<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&GenerationContext<'a>, &ShapeID) -> Result<ParamMap> + 'static,
    {
        self.operation_params = Some(Arc::new(f));
        self
    }

    pub fn service_predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, &ShapeID) -> bool + 'static,
    {
        self.service_predicate = Some(Arc::new(f));
        self
    }

    pub fn operation_predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, &ShapeID, &ShapeID) -> bool + 'static,
    {
        self.operation_predicate = Some(Arc::new(f));
        self
    }

    /// Restrict to the named operations.
    pub fn applies_only_to_operations(self, names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        self.operation_predicate(move |_, _, operation| {
            names.iter().any(|n| n == &operation.shape_name().to_string())
        })
    }

    /// Replace the default `stack.use` rendering.
    pub fn render<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&mut RubyWriter, &Middleware, &GenerationContext<'a>, &ShapeID) -> Result<()>
            + 'static,
    {
        self.render = Some(Arc::new(f));
        self
    }

    /// Producer of sidecar files required by this middleware.
    pub fn extra_files<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&GenerationContext<'a>) -> Result<Vec<String>> + 'static,
    {
        self.extra_files = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Middleware> {
        let step = self
            .step
            .ok_or_else(|| Error::MiddlewareBuilder(format!("step (for {})", self.klass)))?;
        Ok(Middleware {
            klass: self.klass,
            step,
            order: self.order,
            client_config: self.client_config,
            additional_params: self.additional_params,
            operation_params: self.operation_params,
            service_predicate: self.service_predicate,
            operation_predicate: self.operation_predicate,
            render: self.render,
            extra_files: self.extra_files,
        })
    }
}

/// Ordered collection of middleware for a service. Registration order is
/// remembered and used to break order ties within a step.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    records: Vec<Middleware>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, middleware: Middleware) {
        self.records.push(middleware);
    }

    /// Drop every record with the given runtime class.
    pub fn remove(&mut self, klass: &str) {
        self.records.retain(|m| m.klass() != klass);
    }

    pub fn records(&self) -> &[Middleware] {
        &self.records
    }

    /// Records that apply to `operation`, in emission order: step by step in
    /// canonical order, sorted within a step by `order` then registration.
    pub fn resolve<'a>(
        &'a self,
        model: &Model,
        service: &ShapeID,
        operation: &ShapeID,
    ) -> Vec<&'a Middleware> {
        let mut resolved = Vec::new();
        for step in MiddlewareStackStep::ALL.iter() {
            let mut in_step: Vec<&Middleware> = self
                .records
                .iter()
                .filter(|m| m.step() == *step)
                .filter(|m| m.include_for_service(model, service))
                .filter(|m| m.include_for_operation(model, service, operation))
                .collect();
            // stable sort keeps registration order for equal `order` values
            in_step.sort_by_key(|m| m.order());
            resolved.extend(in_step);
        }
        resolved
    }

    /// Every config key contributed by registered middleware, first
    /// occurrence wins.
    pub fn client_config(&self) -> Vec<&ClientConfig> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for record in self.records.iter() {
            for config in record.client_config() {
                if seen.insert(config.name().to_string()) {
                    out.push(config);
                }
            }
        }
        out
    }
}
