//! Gem entrypoint and gemspec emitter.
//!
//! These are the only templated files; everything else goes through the
//! code writer.

use serde_json::json;

use crate::{gen::GenerationContext, render::Renderer, Result};

const ENTRYPOINT_TEMPLATE: &str = "\
# frozen_string_literal: true

# This file was code generated from a Smithy model. Manual edits will be lost.

require 'harbor'

{{#each requires}}
require_relative '{{this}}'
{{/each}}

module {{module}}
  VERSION = '{{version}}'
end
";

const GEMSPEC_TEMPLATE: &str = "\
Gem::Specification.new do |spec|
  spec.name          = '{{gem}}'
  spec.version       = '{{version}}'
  spec.authors       = ['Harbor']
  spec.summary       = 'Generated client for {{module}}'
  spec.files         = Dir['lib/**/*.rb']

  spec.add_runtime_dependency 'harbor', '~> 1'
end
";

/// Write `lib/<gem>.rb` requiring every emitted file (plus middleware
/// sidecars) in load order, and the gemspec.
pub fn render(ctx: &GenerationContext<'_>, sidecars: &[String]) -> Result<()> {
    let gem = &ctx.settings.gem;
    let mut requires: Vec<String> = ["types", "errors", "params", "validators", "builders", "parsers", "stubs"]
        .iter()
        .map(|stem| format!("{}/{}", gem, stem))
        .collect();
    for sidecar in sidecars.iter() {
        requires.push(format!("{}/{}", gem, sidecar.trim_end_matches(".rb")));
    }
    requires.push(format!("{}/config", gem));
    requires.push(format!("{}/client", gem));

    let renderer = Renderer::default();
    let data = json!({
        "module": ctx.settings.module,
        "gem": gem,
        "version": ctx.settings.gem_version,
        "requires": requires,
    });

    let entrypoint = renderer.render_template(ENTRYPOINT_TEMPLATE, &data)?;
    ctx.write_file(format!("{}/lib/{}.rb", gem, gem), entrypoint)?;

    let gemspec = renderer.render_template(GEMSPEC_TEMPLATE, &data)?;
    ctx.write_file(format!("{}/{}.gemspec", gem, gem), gemspec)
}
