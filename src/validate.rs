//! Model validation run before any emitter.
//!
//! Fatal problems (missing shapes, unbound uri labels, operations without
//! the http trait) abort generation; softer modeling issues go to the
//! diagnostic sink.

use atelier_core::model::{shapes::HasTraits, HasIdentity, Model, ShapeID};

use crate::{
    error::print_warning,
    generators::builders::UriTemplate,
    model::{self, HttpTrait, Ix},
    Error, Result,
};

pub(crate) fn validate(model: &Model, service_id: &ShapeID) -> Result<()> {
    model::expect_service(model, service_id)?;
    let operations = model::top_down_operations(model, service_id)?;
    for op in operations.iter() {
        let Ix(op_id, op_traits, operation) = op;
        let http: HttpTrait =
            model::get_trait(op_traits, model::http_trait())?.ok_or_else(|| {
                Error::ModelIntegrity(format!("operation {} is missing the http trait", op_id))
            })?;

        let input_id = operation.input().as_ref().ok_or_else(|| {
            Error::ModelIntegrity(format!(
                "operation {} is missing an input structure",
                op_id
            ))
        })?;
        let Ix(_, _, input) = model::expect_structure(model, input_id)?;
        if let Some(output_id) = operation.output() {
            model::expect_structure(model, output_id)?;
        }
        for error_id in operation.errors() {
            let Ix(_, traits, _) = model::expect_structure(model, error_id)?;
            if !model::has_trait(traits, model::error_trait()) {
                return Err(Error::ModelIntegrity(format!(
                    "{} is declared as an error of {} but carries no error trait",
                    error_id, op_id
                )));
            }
        }

        let template = UriTemplate::parse(&http.uri);
        for label in template.labels.iter() {
            let bound = input.members().any(|m| {
                m.id().to_string() == label.name
                    && model::has_trait(m.traits(), model::http_label_trait())
            });
            if !bound {
                return Err(Error::ModelIntegrity(format!(
                    "uri label {{{}}} of {} has no matching httpLabel member",
                    label.name, op_id
                )));
            }
        }
        for member in input.members() {
            if !model::has_trait(member.traits(), model::http_label_trait()) {
                continue;
            }
            let name = member.id().to_string();
            if !template.labels.iter().any(|l| l.name == name) {
                return Err(Error::ModelIntegrity(format!(
                    "httpLabel member {} of {} does not appear in uri {}",
                    name, op_id, http.uri
                )));
            }
            if !model::has_trait(member.traits(), model::required_trait()) {
                print_warning(&format!(
                    "label member {} of {} should be marked required",
                    name, op_id
                ));
            }
        }
    }
    Ok(())
}
