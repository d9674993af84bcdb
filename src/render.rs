//! Template rendering for non-code sidecar files (gemspec, entrypoint).
//! All Ruby code files are produced by the code writer, never by templates.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError};
use serde::Serialize;

use crate::{strings, Result};

/// Handlebars processor for sidecar file generation. Output is written
/// verbatim (no HTML escaping) and the `to_snake_case` / `to_pascal_case`
/// helpers are available in every template.
pub struct Renderer<'gen> {
    hb: Handlebars<'gen>,
}

impl<'gen> Default for Renderer<'gen> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'gen> Renderer<'gen> {
    pub fn new() -> Self {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        hb.register_helper(
            "to_snake_case",
            Box::new(case_helper("to_snake_case", strings::to_snake_case)),
        );
        hb.register_helper(
            "to_pascal_case",
            Box::new(case_helper("to_pascal_case", strings::to_pascal_case)),
        );
        Self { hb }
    }

    /// Register a named template for later [`Renderer::render`] calls.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.hb.register_template_string(name, source)?;
        Ok(())
    }

    /// Render template `source` directly, without registering it.
    pub fn render_template<T: Serialize>(&self, source: &str, data: &T) -> Result<String> {
        Ok(self.hb.render_template(source, data)?)
    }

    /// Render a previously registered template.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.hb.render(name, data)?)
    }
}

/// A helper applying `convert` to its single string argument.
fn case_helper(
    tag: &'static str,
    convert: fn(&str) -> String,
) -> impl Fn(&Helper, &Handlebars, &Context, &mut RenderContext, &mut dyn Output) -> HelperResult
       + Send
       + Sync {
    move |h, _reg, _ctx, _rc, out| {
        let value = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| RenderError::new(format!("{} expects a string argument", tag)))?;
        out.write(&convert(value))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_with_case_helpers() {
        let renderer = Renderer::default();
        let out = renderer
            .render_template(
                "gem '{{to_snake_case name}}' # {{to_pascal_case name}}",
                &serde_json::json!({ "name": "SampleService" }),
            )
            .unwrap();
        assert_eq!(out, "gem 'sample_service' # SampleService");
    }

    #[test]
    fn named_templates_render_after_registration() {
        let mut renderer = Renderer::new();
        renderer.add_template("greeting", "hello {{name}}").unwrap();
        let out = renderer
            .render("greeting", &serde_json::json!({ "name": "harbor" }))
            .unwrap();
        assert_eq!(out, "hello harbor");
    }
}
