#![forbid(unsafe_code)]

//! Semantic core for a library of external-interface type declarations
//! ("stubs"): a structural type model, first-match overload resolution
//! with union fallback on genuine ambiguity, and a widening engine for
//! the mutable-generic contracts the stubs declare.
//!
//! The graph is built once by [`load_modules`] and is immutable after:
//! every query is a pure, lock-free function of its inputs.

mod loader;
mod stdlib;

pub use loader::{load_modules, LoadError, LoadReport, ModuleFailure, StubSource};
pub use stdlib::bundled_sources;

pub use veneer_core::{
    compat, join, lower_module, resolve_construction, resolve_function, resolve_method,
    resolve_or_unknown, widen, ClassStub, Entry, ErrorKind, Kwargs, LowerError, Member,
    ModuleStub, NameResolver, NoExternals, Overload, Param, ParamKind, RecordShape, Resolution,
    ResolveError, Signature, StubGraph, TypeExpr, UnknownTypeReference,
};
pub use veneer_parse::{parse_module, ParseError};
