//! Client and Config class emitter.
//!
//! The client exposes one method per operation. Each method normalizes the
//! caller's params, assembles the middleware stack resolved for that
//! operation, runs it with a request/response context built from the
//! transport fragments, and raises `resp.error` on failure.

use crate::{
    gen::GenerationContext,
    generators::file_preamble,
    middleware::MiddlewareStack,
    model::{self, Ix},
    symbol::Category,
    transport::{ApplicationTransport, ClientConfig},
    writer::RubyWriter,
    Result,
};

pub fn render(
    ctx: &GenerationContext<'_>,
    transport: &ApplicationTransport,
    stack: &MiddlewareStack,
    additional_config: &[ClientConfig],
) -> Result<()> {
    render_client(ctx, transport, stack)?;
    render_config(ctx, transport, stack, additional_config)
}

fn render_client(
    ctx: &GenerationContext<'_>,
    transport: &ApplicationTransport,
    stack: &MiddlewareStack,
) -> Result<()> {
    let mut w = RubyWriter::new();
    file_preamble(&mut w);
    w.write("require 'stringio'");
    w.blank();
    w.open_block(format!("module {}", ctx.settings.module));

    let model::Ix(service_id, service_traits, _) =
        model::expect_service(ctx.model, &ctx.service_id)?;
    match model::documentation(service_traits) {
        Some(doc) => {
            for line in doc.lines() {
                w.write(format!("# {}", line));
            }
        }
        None => {
            w.write(format!("# An API client for {}", service_id.shape_name()));
        }
    }
    w.write("# See {#initialize} for a full list of supported configuration options");
    w.open_block("class Client");
    w.write("include Harbor::ClientStubs");
    w.blank();

    w.write("# @param [Config] config")
        .write("#   Configuration options for the client.")
        .open_block("def initialize(config = Config.new, options = {})")
        .write("@config = config")
        .write(format!("@client = {}", transport.client().render(ctx)));
    w.close_block("end");

    let operations = model::top_down_operations(ctx.model, &ctx.service_id)?;
    for op in operations.iter() {
        render_operation_method(ctx, &mut w, transport, stack, op)?;
    }

    w.blank()
        .write("private")
        .blank()
        .open_block("def output_stream(options = {}, &block)")
        .write("return options[:output_stream] if options[:output_stream]")
        .write("return Harbor::BlockIO.new(block) if block")
        .write("StringIO.new")
        .close_block("end");

    w.close_block("end").close_block("end");
    let text = w.finalize()?;
    ctx.write_file(ctx.lib_file("client"), text)
}

fn render_operation_method(
    ctx: &GenerationContext<'_>,
    w: &mut RubyWriter,
    transport: &ApplicationTransport,
    stack: &MiddlewareStack,
    op: &Ix<'_, atelier_core::model::shapes::Operation>,
) -> Result<()> {
    let Ix(op_id, op_traits, operation) = op;
    let method_name = ctx
        .symbols
        .member_name_str(&op_id.shape_name().to_string());

    w.blank();
    if let Some(doc) = model::documentation(op_traits) {
        for line in doc.lines() {
            w.write(format!("# {}", line));
        }
    }
    w.write("# @param [Hash] params")
        .write("#   Request parameters for this operation.")
        .write("# @param [Hash] options")
        .write("#   Request option overrides.");
    if let Some(output_id) = operation.output() {
        let output_symbol = ctx.symbols.symbol(output_id, Category::Type)?;
        w.write(format!("# @return [Types::{}]", output_symbol.name));
    }
    w.open_block(format!(
        "def {}(params = {{}}, options = {{}}, &block)",
        method_name
    ));
    w.write("stack = Harbor::MiddlewareStack.new");
    if let Some(input_id) = operation.input() {
        let input_symbol = ctx.symbols.symbol(input_id, Category::Params)?;
        w.write(format!(
            "input = Params::{}.build(params, context: 'params')",
            input_symbol.name
        ));
    } else {
        w.write("input = params");
    }

    for record in stack.resolve(ctx.model, &ctx.service_id, op_id) {
        record.render_add(w, ctx, op_id)?;
    }

    w.open_block("resp = stack.run(")
        .write("input: input,")
        .open_block("context: Harbor::Context.new(")
        .write(format!("request: {},", transport.request().render(ctx)))
        .write(format!("response: {},", transport.response().render(ctx)))
        .write("client: @client,")
        .write("params: params,")
        .write("logger: @config.logger,")
        .write(format!("operation_name: :{}", method_name))
        .close_block(")")
        .close_block(")");
    w.write("raise resp.error if resp.error");
    w.write("resp");
    w.close_block("end");
    Ok(())
}

fn render_config(
    ctx: &GenerationContext<'_>,
    transport: &ApplicationTransport,
    stack: &MiddlewareStack,
    additional_config: &[ClientConfig],
) -> Result<()> {
    // transport fragments first, then middleware, then protocol additions;
    // the first contribution of a key wins
    let mut seen = std::collections::BTreeSet::new();
    let mut configs: Vec<&ClientConfig> = Vec::new();
    for config in transport
        .client_config()
        .into_iter()
        .chain(stack.client_config())
        .chain(additional_config.iter())
    {
        if seen.insert(config.name().to_string()) {
            configs.push(config);
        }
    }

    let mut w = RubyWriter::new();
    file_preamble(&mut w);
    w.write("require 'logger'");
    w.blank();
    w.open_block(format!("module {}", ctx.settings.module));
    w.write("# Configuration for {Client}.");
    w.open_block("class Config");

    for config in configs.iter() {
        let default = match config.default() {
            Some(default) => format!(" ({})", default),
            None => String::new(),
        };
        w.write(format!(
            "# @option options [{}] :{}{}",
            config.ruby_type(),
            config.name(),
            default
        ));
        if let Some(doc) = config.doc() {
            for line in doc.lines() {
                w.write(format!("#   {}", line));
            }
        }
        if config.allows_operation_override() {
            w.write("#   May be overridden per operation through request options.");
        }
    }
    w.open_block("def initialize(options = {})");
    for config in configs.iter() {
        w.write(config.render_initialization());
    }
    w.close_block("end");
    w.blank();

    let names: Vec<String> = configs.iter().map(|c| format!(":{}", c.name())).collect();
    w.write(format!("attr_accessor {}", names.join(", ")));
    w.close_block("end").close_block("end");

    let text = w.finalize()?;
    ctx.write_file(ctx.lib_file("config"), text)
}
