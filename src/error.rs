use std::string::ToString;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("missing input file: {0}")]
    MissingFile(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("smithy error: {0}")]
    Model(String),

    #[error("invalid model: {0}")]
    ModelIntegrity(String),

    #[error("identifier {0} has an unsupported model shape: {1}")]
    UnsupportedShape(String, String),

    #[error("service {0} contains unknown operation: {1}")]
    OperationNotFound(String, String),

    #[error("no protocol generator registered for: {0}")]
    UnsupportedProtocol(String),

    #[error("code writer finished with unbalanced blocks: {0}")]
    UnbalancedBlock(String),

    #[error("conflicting write to manifest path: {0}")]
    ManifestConflict(String),

    #[error("middleware record is missing required field: {0}")]
    MiddlewareBuilder(String),

    #[error("handlebars error: {0}")]
    Handlebars(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e.to_string())
    }
}

impl From<handlebars::TemplateError> for Error {
    fn from(e: handlebars::TemplateError) -> Error {
        Error::Handlebars(e.to_string())
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(e: handlebars::RenderError) -> Error {
        Error::Handlebars(e.to_string())
    }
}

impl From<atelier_core::error::Error> for Error {
    fn from(e: atelier_core::error::Error) -> Error {
        Error::Model(e.to_string())
    }
}

/// Write a codegen diagnostic to stderr. These are warnings the user should
/// see even when tracing output is filtered out.
pub fn print_warning(msg: &str) {
    eprintln!("Warning: {}", msg);
}
