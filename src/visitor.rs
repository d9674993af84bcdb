//! Double-dispatch over shape kinds.
//!
//! Emitters implement [`ShapeVisitor`] with a handler per kind they care
//! about; everything else falls through to `default_shape`. Recursion over
//! member targets is the emitter's responsibility (they track a visited set
//! so cyclic shapes terminate).

use atelier_core::model::shapes::{ListOrSet, Map, Operation, Service, Simple, StructureOrUnion};

use crate::{
    model::{Resolved, ResolvedShape},
    Result,
};

#[allow(unused_variables)]
pub trait ShapeVisitor {
    type Output;

    /// Fallback for any kind without a dedicated handler.
    fn default_shape(&mut self, shape: &ResolvedShape<'_>) -> Result<Self::Output>;

    fn simple(&mut self, shape: &ResolvedShape<'_>, simple: &Simple) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn list(&mut self, shape: &ResolvedShape<'_>, list: &ListOrSet) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn set(&mut self, shape: &ResolvedShape<'_>, set: &ListOrSet) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn map(&mut self, shape: &ResolvedShape<'_>, map: &Map) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn structure(
        &mut self,
        shape: &ResolvedShape<'_>,
        structure: &StructureOrUnion,
    ) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn union(
        &mut self,
        shape: &ResolvedShape<'_>,
        union: &StructureOrUnion,
    ) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn operation(&mut self, shape: &ResolvedShape<'_>, op: &Operation) -> Result<Self::Output> {
        self.default_shape(shape)
    }

    fn service(&mut self, shape: &ResolvedShape<'_>, service: &Service) -> Result<Self::Output> {
        self.default_shape(shape)
    }
}

/// Route a resolved shape to the visitor method for its kind.
pub fn accept<V: ShapeVisitor>(visitor: &mut V, shape: &ResolvedShape<'_>) -> Result<V::Output> {
    match &shape.kind {
        Resolved::Simple(simple) => visitor.simple(shape, simple),
        Resolved::List(list) => visitor.list(shape, list),
        Resolved::Set(set) => visitor.set(shape, set),
        Resolved::Map(map) => visitor.map(shape, map),
        Resolved::Structure(structure) => visitor.structure(shape, structure),
        Resolved::Union(union) => visitor.union(shape, union),
        Resolved::Operation(op) => visitor.operation(shape, op),
        Resolved::Service(service) => visitor.service(shape, service),
    }
}
