#![forbid(unsafe_code)]

mod error;
pub use error::{print_warning, Error, Result};

pub mod config;
pub mod gen;
pub mod generators;
mod loader;
pub mod manifest;
pub mod middleware;
pub mod model;
pub mod protocol;
pub mod protocols;
pub mod render;
pub mod symbol;
pub mod transport;
pub(crate) mod validate;
pub mod visitor;
pub mod writer;

pub use gen::{GenerationContext, Generator};
pub use loader::sources_to_model;

// re-export
pub use bytes::Bytes;

// common types used in this crate
pub(crate) type JsonValue = serde_json::Value;
pub(crate) type ParamMap = std::collections::BTreeMap<String, String>;

pub(crate) mod strings {
    /// re-export inflector string conversions
    pub use inflector::cases::{pascalcase::to_pascal_case, snakecase::to_snake_case};
}
