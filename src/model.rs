//! Smithy model helpers
//! - interned ids for the traits the generator understands
//! - shape lookup, rooted traversal, and sorted service operations
//! - typed access to trait values (member values win over target values)

use std::{collections::BTreeSet, str::FromStr};

use atelier_core::{
    model::{
        shapes::{AppliedTraits, HasTraits, MemberShape, Operation, Service, ShapeKind, Simple},
        values::{Number, Value},
        HasIdentity, Identifier, Model, ShapeID,
    },
    prelude::{
        prelude_namespace_id, SHAPE_BIGDECIMAL, SHAPE_BIGINTEGER, SHAPE_BLOB, SHAPE_BOOLEAN,
        SHAPE_BYTE, SHAPE_DOCUMENT, SHAPE_DOUBLE, SHAPE_FLOAT, SHAPE_INTEGER, SHAPE_LONG,
        SHAPE_PRIMITIVEBOOLEAN, SHAPE_PRIMITIVEBYTE, SHAPE_PRIMITIVEDOUBLE, SHAPE_PRIMITIVEFLOAT,
        SHAPE_PRIMITIVEINTEGER, SHAPE_PRIMITIVELONG, SHAPE_PRIMITIVESHORT, SHAPE_SHORT,
        SHAPE_STRING, SHAPE_TIMESTAMP,
    },
};
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{error::Error, JsonValue, Result};

fn prelude_trait_id(name: &str) -> ShapeID {
    ShapeID::new(
        prelude_namespace_id().clone(),
        Identifier::from_str(name).unwrap(),
        None,
    )
}

lazy_static! {
    static ref TRAIT_HTTP_ID: ShapeID = prelude_trait_id("http");
    static ref TRAIT_HTTP_LABEL_ID: ShapeID = prelude_trait_id("httpLabel");
    static ref TRAIT_HTTP_QUERY_ID: ShapeID = prelude_trait_id("httpQuery");
    static ref TRAIT_HTTP_QUERY_PARAMS_ID: ShapeID = prelude_trait_id("httpQueryParams");
    static ref TRAIT_HTTP_HEADER_ID: ShapeID = prelude_trait_id("httpHeader");
    static ref TRAIT_HTTP_PREFIX_HEADERS_ID: ShapeID = prelude_trait_id("httpPrefixHeaders");
    static ref TRAIT_HTTP_PAYLOAD_ID: ShapeID = prelude_trait_id("httpPayload");
    static ref TRAIT_HTTP_RESPONSE_CODE_ID: ShapeID = prelude_trait_id("httpResponseCode");
    static ref TRAIT_HTTP_CHECKSUM_REQUIRED_ID: ShapeID = prelude_trait_id("httpChecksumRequired");
    static ref TRAIT_ERROR_ID: ShapeID = prelude_trait_id("error");
    static ref TRAIT_REQUIRED_ID: ShapeID = prelude_trait_id("required");
    static ref TRAIT_ENUM_ID: ShapeID = prelude_trait_id("enum");
    static ref TRAIT_SPARSE_ID: ShapeID = prelude_trait_id("sparse");
    static ref TRAIT_STREAMING_ID: ShapeID = prelude_trait_id("streaming");
    static ref TRAIT_MEDIA_TYPE_ID: ShapeID = prelude_trait_id("mediaType");
    static ref TRAIT_TIMESTAMP_FORMAT_ID: ShapeID = prelude_trait_id("timestampFormat");
    static ref TRAIT_IDEMPOTENCY_TOKEN_ID: ShapeID = prelude_trait_id("idempotencyToken");
    static ref TRAIT_ENDPOINT_ID: ShapeID = prelude_trait_id("endpoint");
    static ref TRAIT_HOST_LABEL_ID: ShapeID = prelude_trait_id("hostLabel");
    static ref TRAIT_DOCUMENTATION_ID: ShapeID = prelude_trait_id("documentation");
    static ref EMPTY_TRAITS: AppliedTraits = AppliedTraits::default();
}

pub fn http_trait() -> &'static ShapeID {
    &TRAIT_HTTP_ID
}
pub fn http_label_trait() -> &'static ShapeID {
    &TRAIT_HTTP_LABEL_ID
}
pub fn http_query_trait() -> &'static ShapeID {
    &TRAIT_HTTP_QUERY_ID
}
pub fn http_query_params_trait() -> &'static ShapeID {
    &TRAIT_HTTP_QUERY_PARAMS_ID
}
pub fn http_header_trait() -> &'static ShapeID {
    &TRAIT_HTTP_HEADER_ID
}
pub fn http_prefix_headers_trait() -> &'static ShapeID {
    &TRAIT_HTTP_PREFIX_HEADERS_ID
}
pub fn http_payload_trait() -> &'static ShapeID {
    &TRAIT_HTTP_PAYLOAD_ID
}
pub fn http_response_code_trait() -> &'static ShapeID {
    &TRAIT_HTTP_RESPONSE_CODE_ID
}
pub fn http_checksum_required_trait() -> &'static ShapeID {
    &TRAIT_HTTP_CHECKSUM_REQUIRED_ID
}
pub fn error_trait() -> &'static ShapeID {
    &TRAIT_ERROR_ID
}
pub fn required_trait() -> &'static ShapeID {
    &TRAIT_REQUIRED_ID
}
pub fn enum_trait() -> &'static ShapeID {
    &TRAIT_ENUM_ID
}
pub fn sparse_trait() -> &'static ShapeID {
    &TRAIT_SPARSE_ID
}
pub fn streaming_trait() -> &'static ShapeID {
    &TRAIT_STREAMING_ID
}
pub fn media_type_trait() -> &'static ShapeID {
    &TRAIT_MEDIA_TYPE_ID
}
pub fn timestamp_format_trait() -> &'static ShapeID {
    &TRAIT_TIMESTAMP_FORMAT_ID
}
pub fn idempotency_token_trait() -> &'static ShapeID {
    &TRAIT_IDEMPOTENCY_TOKEN_ID
}
pub fn endpoint_trait() -> &'static ShapeID {
    &TRAIT_ENDPOINT_ID
}
pub fn host_label_trait() -> &'static ShapeID {
    &TRAIT_HOST_LABEL_ID
}
pub fn documentation_trait() -> &'static ShapeID {
    &TRAIT_DOCUMENTATION_ID
}

#[allow(dead_code)]
pub enum CommentKind {
    Inner,
    Documentation,
}

/// A shape with its id and applied traits
pub struct Ix<'model, K>(
    pub &'model ShapeID,
    pub &'model AppliedTraits,
    pub &'model K,
);

/// The resolved kind of a shape target. Prelude targets (smithy.api#String
/// and friends) resolve to a Simple kind without a model entry.
pub enum Resolved<'model> {
    Simple(Simple),
    List(&'model atelier_core::model::shapes::ListOrSet),
    Set(&'model atelier_core::model::shapes::ListOrSet),
    Map(&'model atelier_core::model::shapes::Map),
    Structure(&'model atelier_core::model::shapes::StructureOrUnion),
    Union(&'model atelier_core::model::shapes::StructureOrUnion),
    Service(&'model Service),
    Operation(&'model Operation),
}

pub struct ResolvedShape<'model> {
    pub id: ShapeID,
    pub traits: &'model AppliedTraits,
    pub kind: Resolved<'model>,
}

/// Map a prelude shape name to its simple kind.
fn prelude_simple(name: &str) -> Option<Simple> {
    match name {
        SHAPE_BLOB => Some(Simple::Blob),
        SHAPE_BOOLEAN | SHAPE_PRIMITIVEBOOLEAN => Some(Simple::Boolean),
        SHAPE_STRING => Some(Simple::String),
        SHAPE_BYTE | SHAPE_PRIMITIVEBYTE => Some(Simple::Byte),
        SHAPE_SHORT | SHAPE_PRIMITIVESHORT => Some(Simple::Short),
        SHAPE_INTEGER | SHAPE_PRIMITIVEINTEGER => Some(Simple::Integer),
        SHAPE_LONG | SHAPE_PRIMITIVELONG => Some(Simple::Long),
        SHAPE_FLOAT | SHAPE_PRIMITIVEFLOAT => Some(Simple::Float),
        SHAPE_DOUBLE | SHAPE_PRIMITIVEDOUBLE => Some(Simple::Double),
        SHAPE_BIGINTEGER => Some(Simple::BigInteger),
        SHAPE_BIGDECIMAL => Some(Simple::BigDecimal),
        SHAPE_TIMESTAMP => Some(Simple::Timestamp),
        SHAPE_DOCUMENT => Some(Simple::Document),
        _ => None,
    }
}

/// Resolve a shape id to its kind and traits, or fail with an integrity error.
pub fn resolve<'model>(model: &'model Model, id: &ShapeID) -> Result<ResolvedShape<'model>> {
    if id.namespace() == prelude_namespace_id() {
        if let Some(simple) = prelude_simple(&id.shape_name().to_string()) {
            return Ok(ResolvedShape {
                id: id.clone(),
                traits: &EMPTY_TRAITS,
                kind: Resolved::Simple(simple),
            });
        }
    }
    let shape = model
        .shape(id)
        .ok_or_else(|| Error::ModelIntegrity(format!("shape not found: {}", id)))?;
    let kind = match shape.body() {
        ShapeKind::Simple(simple) => Resolved::Simple(simple.clone()),
        ShapeKind::List(list) => Resolved::List(list),
        ShapeKind::Set(set) => Resolved::Set(set),
        ShapeKind::Map(map) => Resolved::Map(map),
        ShapeKind::Structure(strukt) => Resolved::Structure(strukt),
        ShapeKind::Union(union) => Resolved::Union(union),
        ShapeKind::Service(service) => Resolved::Service(service),
        ShapeKind::Operation(op) => Resolved::Operation(op),
        ShapeKind::Resource(_) => {
            return Err(Error::UnsupportedShape(
                id.to_string(),
                "resource".to_string(),
            ))
        }
        ShapeKind::Unresolved => {
            return Err(Error::ModelIntegrity(format!("unresolved shape: {}", id)))
        }
    };
    Ok(ResolvedShape {
        id: id.clone(),
        traits: shape.traits(),
        kind,
    })
}

/// Find the service shape, or fail.
pub fn expect_service<'model>(
    model: &'model Model,
    service_id: &ShapeID,
) -> Result<Ix<'model, Service>> {
    match model.shape(service_id) {
        Some(shape) => match shape.body() {
            ShapeKind::Service(service) => Ok(Ix(shape.id(), shape.traits(), service)),
            _ => Err(Error::ModelIntegrity(format!(
                "{} is not a service shape",
                service_id
            ))),
        },
        None => Err(Error::ModelIntegrity(format!(
            "service not found: {}",
            service_id
        ))),
    }
}

/// Find a structure shape, or fail. Operation inputs and outputs must be structures.
pub fn expect_structure<'model>(
    model: &'model Model,
    id: &ShapeID,
) -> Result<Ix<'model, atelier_core::model::shapes::StructureOrUnion>> {
    match model.shape(id) {
        Some(shape) => match shape.body() {
            ShapeKind::Structure(strukt) => Ok(Ix(shape.id(), shape.traits(), strukt)),
            _ => Err(Error::ModelIntegrity(format!(
                "{} is not a structure shape",
                id
            ))),
        },
        None => Err(Error::ModelIntegrity(format!("shape not found: {}", id))),
    }
}

/// Look up an operation shape within a service.
pub fn get_operation<'model>(
    model: &'model Model,
    service_id: &ShapeID,
    operation_id: &ShapeID,
) -> Result<Ix<'model, Operation>> {
    match model.shape(operation_id) {
        Some(shape) => match shape.body() {
            ShapeKind::Operation(op) => Ok(Ix(shape.id(), shape.traits(), op)),
            _ => Err(Error::OperationNotFound(
                service_id.to_string(),
                operation_id.to_string(),
            )),
        },
        None => Err(Error::OperationNotFound(
            service_id.to_string(),
            operation_id.to_string(),
        )),
    }
}

/// The service's operations, sorted by shape name for deterministic emission.
pub fn top_down_operations<'model>(
    model: &'model Model,
    service_id: &ShapeID,
) -> Result<Vec<Ix<'model, Operation>>> {
    let Ix(_, _, service) = expect_service(model, service_id)?;
    let mut operations = Vec::new();
    for op_id in service.operations() {
        operations.push(get_operation(model, service_id, op_id)?);
    }
    operations.sort_by_key(|ix| ix.0.shape_name().to_string());
    Ok(operations)
}

/// Depth-first walk of every model shape reachable from `root`, visiting each
/// id once in member order. Prelude targets are not yielded.
pub fn walk_shapes<'model>(
    model: &'model Model,
    root: &ShapeID,
) -> Result<Vec<ResolvedShape<'model>>> {
    let mut visited = BTreeSet::new();
    let mut out = Vec::new();
    walk_into(model, root, &mut visited, &mut out)?;
    Ok(out)
}

fn walk_into<'model>(
    model: &'model Model,
    id: &ShapeID,
    visited: &mut BTreeSet<ShapeID>,
    out: &mut Vec<ResolvedShape<'model>>,
) -> Result<()> {
    if id.namespace() == prelude_namespace_id() {
        return Ok(());
    }
    if !visited.insert(id.clone()) {
        return Ok(());
    }
    let resolved = resolve(model, id)?;
    let neighbors: Vec<ShapeID> = match &resolved.kind {
        Resolved::List(list) | Resolved::Set(list) => vec![list.member().target().clone()],
        Resolved::Map(map) => vec![map.key().target().clone(), map.value().target().clone()],
        Resolved::Structure(strukt) | Resolved::Union(strukt) => {
            strukt.members().map(|m| m.target().clone()).collect()
        }
        Resolved::Operation(op) => {
            let mut ids = Vec::new();
            if let Some(input) = op.input() {
                ids.push(input.clone());
            }
            if let Some(output) = op.output() {
                ids.push(output.clone());
            }
            ids.extend(op.errors().cloned());
            ids
        }
        Resolved::Simple(_) | Resolved::Service(_) => Vec::new(),
    };
    out.push(resolved);
    for neighbor in neighbors.iter() {
        walk_into(model, neighbor, visited, out)?;
    }
    Ok(())
}

pub fn has_trait(traits: &AppliedTraits, id: &ShapeID) -> bool {
    traits.contains_key(id)
}

/// Typed access to a trait's structured value.
pub fn get_trait<T: DeserializeOwned>(traits: &AppliedTraits, id: &ShapeID) -> Result<Option<T>> {
    match traits.get(id) {
        Some(Some(value)) => {
            let parsed = serde_json::from_value(value_to_json(value))
                .map_err(|e| Error::Model(format!("invalid value for trait {}: {}", id, e)))?;
            Ok(Some(parsed))
        }
        Some(None) => serde_json::from_value(JsonValue::Null)
            .map(Some)
            .map_err(|e| Error::Model(format!("invalid value for trait {}: {}", id, e))),
        None => Ok(None),
    }
}

/// A trait's value as a plain string, if present.
pub fn string_trait(traits: &AppliedTraits, id: &ShapeID) -> Option<String> {
    match traits.get(id) {
        Some(Some(Value::String(s))) => Some(s.clone()),
        _ => None,
    }
}

/// Documentation text attached to a shape or member.
pub fn documentation(traits: &AppliedTraits) -> Option<String> {
    string_trait(traits, documentation_trait())
}

/// Convert an atelier node value to json
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Number(n) => match n {
            Number::Integer(i) => JsonValue::from(*i),
            Number::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
        },
        Value::Array(values) => JsonValue::Array(values.iter().map(value_to_json).collect()),
        Value::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        _ => JsonValue::Null,
    }
}

/// `@http` trait value
#[derive(Clone, Debug, Deserialize)]
pub struct HttpTrait {
    pub method: String,
    pub uri: String,
    #[serde(default = "default_status_code")]
    pub code: u16,
}

fn default_status_code() -> u16 {
    200
}

/// `@error` trait value
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFault {
    Client,
    Server,
}

/// `@timestampFormat` trait value
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    EpochSeconds,
    HttpDate,
    DateTime,
}

/// One `@enum` trait entry
#[derive(Clone, Debug, Deserialize)]
pub struct EnumValue {
    pub value: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

/// `@endpoint` trait value
#[derive(Clone, Debug, Deserialize)]
pub struct EndpointTrait {
    #[serde(rename = "hostPrefix")]
    pub host_prefix: String,
}

/// Resolve a member's timestamp format: the member's trait wins, then the
/// target shape's trait, then the location default.
pub fn timestamp_format(
    member: &MemberShape,
    target_traits: &AppliedTraits,
    default: TimestampFormat,
) -> Result<TimestampFormat> {
    if let Some(format) = get_trait::<TimestampFormat>(member.traits(), timestamp_format_trait())? {
        return Ok(format);
    }
    if let Some(format) = get_trait::<TimestampFormat>(target_traits, timestamp_format_trait())? {
        return Ok(format);
    }
    Ok(default)
}

/// True if the shape id is in the smithy prelude namespace.
pub fn is_prelude(id: &ShapeID) -> bool {
    id.namespace() == prelude_namespace_id()
}

/// True if the member or its target carries `@streaming`.
pub fn is_streaming(model: &Model, member: &MemberShape) -> bool {
    if has_trait(member.traits(), streaming_trait()) {
        return true;
    }
    match resolve(model, member.target()) {
        Ok(target) => has_trait(target.traits, streaming_trait()),
        Err(_) => false,
    }
}
