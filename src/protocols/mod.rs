//! Concrete wire protocol generators.

pub mod rest_json;
