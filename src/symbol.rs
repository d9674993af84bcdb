//! Deterministic mapping from shape ids to emitted Ruby names.
//!
//! Names are stable across runs with the same input: the provider is
//! stateless apart from a memoization cache keyed by shape id.

use std::{cell::RefCell, collections::HashMap};

use atelier_core::model::{
    shapes::{MemberShape, ShapeKind},
    HasIdentity, Model, ShapeID,
};

use crate::{
    strings::{to_pascal_case, to_snake_case},
    Result,
};

/// Ruby reserved words that cannot be used as member accessors.
const RESERVED_WORDS: &[&str] = &[
    "alias", "and", "begin", "break", "case", "class", "def", "defined", "do", "else", "elsif",
    "end", "ensure", "false", "for", "if", "in", "module", "next", "nil", "not", "or", "redo",
    "rescue", "retry", "return", "self", "super", "then", "true", "undef", "unless", "until",
    "when", "while", "yield",
];

/// The emitter category a symbol is requested for. Category selects the
/// emitted namespace and file, never the unqualified name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Category {
    Type,
    Builder,
    Parser,
    Stub,
    Error,
    Params,
    Validator,
}

impl Category {
    fn namespace(&self) -> &'static str {
        match self {
            Category::Type => "Types",
            Category::Builder => "Builders",
            Category::Parser => "Parsers",
            Category::Stub => "Stubs",
            Category::Error => "Errors",
            Category::Params => "Params",
            Category::Validator => "Validators",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            Category::Type => "types",
            Category::Builder => "builders",
            Category::Parser => "parsers",
            Category::Stub => "stubs",
            Category::Error => "errors",
            Category::Params => "params",
            Category::Validator => "validators",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmittedSymbol {
    /// unqualified Ruby class name, e.g. `GetThingInput`
    pub name: String,
    /// enclosing Ruby namespace, e.g. `Sample::Types`
    pub namespace: String,
    /// file the class is emitted into, relative to the output root
    pub file_path: String,
}

impl EmittedSymbol {
    /// fully qualified name, e.g. `Sample::Types::GetThingInput`
    pub fn qualified(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }
}

pub struct SymbolProvider<'model> {
    model: &'model Model,
    module: String,
    gem: String,
    cache: RefCell<HashMap<ShapeID, String>>,
}

impl<'model> SymbolProvider<'model> {
    pub fn new(model: &'model Model, module: &str, gem: &str) -> Self {
        Self {
            model,
            module: module.to_string(),
            gem: gem.to_string(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The emitted symbol for a shape within an emitter category.
    pub fn symbol(&self, id: &ShapeID, category: Category) -> Result<EmittedSymbol> {
        let name = self.shape_name(id)?;
        Ok(EmittedSymbol {
            name,
            namespace: format!("{}::{}", self.module, category.namespace()),
            file_path: format!("{}/lib/{}/{}.rb", self.gem, self.gem, category.file_stem()),
        })
    }

    /// The unqualified Ruby class name for a shape.
    pub fn shape_name(&self, id: &ShapeID) -> Result<String> {
        if let Some(name) = self.cache.borrow().get(id) {
            return Ok(name.clone());
        }
        let base = to_pascal_case(&id.shape_name().to_string());
        let name = if base.starts_with(|c: char| c.is_ascii_digit()) {
            format!("{}{}", self.digit_prefix(id), base)
        } else {
            base
        };
        self.cache.borrow_mut().insert(id.clone(), name.clone());
        Ok(name)
    }

    /// Prefix token applied to shape names that begin with a digit.
    fn digit_prefix(&self, id: &ShapeID) -> &'static str {
        match self.model.shape(id).map(|s| s.body()) {
            Some(ShapeKind::Operation(_)) => "Operation____",
            Some(ShapeKind::Union(_)) => "Union____",
            Some(ShapeKind::List(_)) => "List____",
            Some(ShapeKind::Set(_)) => "Set____",
            Some(ShapeKind::Map(_)) => "Map____",
            _ => "Struct____",
        }
    }

    /// The Ruby accessor name for a member: snake_case, with reserved words
    /// suffixed by an underscore.
    pub fn member_name(&self, member: &MemberShape) -> String {
        escape_member(&member.id().to_string())
    }

    /// Like [`SymbolProvider::member_name`] for a raw member name string.
    pub fn member_name_str(&self, name: &str) -> String {
        escape_member(name)
    }

    /// Ruby constant name for an enum entry. The constant's *value* is the
    /// modeled string verbatim; this derives only the constant identifier.
    pub fn enum_constant(&self, name: Option<&str>, value: &str) -> String {
        let source = name.unwrap_or(value);
        let mut out = String::with_capacity(source.len());
        for c in source.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push('_');
            }
        }
        if out.starts_with(|c: char| c.is_ascii_digit()) {
            out.insert(0, '_');
        }
        out
    }
}

fn escape_member(name: &str) -> String {
    let snake = to_snake_case(name);
    if RESERVED_WORDS.contains(&snake.as_str()) {
        format!("{}_", snake)
    } else {
        snake
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn member_names_are_snake_cased_and_escaped() {
        assert_eq!(escape_member("memberName"), "member_name");
        assert_eq!(escape_member("HTTPStatus"), "http_status");
        assert_eq!(escape_member("end"), "end_");
        assert_eq!(escape_member("class"), "class_");
    }

    #[test]
    fn enum_constants_are_sanitized() {
        let model = Model::new(atelier_core::Version::V10);
        let provider = SymbolProvider::new(&model, "Sample", "sample");
        assert_eq!(provider.enum_constant(Some("Available"), "x"), "AVAILABLE");
        assert_eq!(provider.enum_constant(None, "t2.micro"), "T2_MICRO");
        assert_eq!(provider.enum_constant(None, "0-low"), "_0_LOW");
    }

    #[test]
    fn symbol_category_selects_namespace_and_file() {
        let model = Model::new(atelier_core::Version::V10);
        let provider = SymbolProvider::new(&model, "Sample", "sample");
        let id = ShapeID::from_str("example.sample#GetThingInput").unwrap();
        let symbol = provider.symbol(&id, Category::Builder).unwrap();
        assert_eq!(symbol.name, "GetThingInput");
        assert_eq!(symbol.namespace, "Sample::Builders");
        assert_eq!(symbol.file_path, "sample/lib/sample/builders.rb");
        assert_eq!(symbol.qualified(), "Sample::Builders::GetThingInput");
        // memoized name is stable
        let again = provider.symbol(&id, Category::Type).unwrap();
        assert_eq!(again.name, "GetThingInput");
        assert_eq!(again.namespace, "Sample::Types");
    }
}
