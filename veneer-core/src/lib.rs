#![forbid(unsafe_code)]

mod error;
mod graph;
mod lower;
mod resolve;
mod types;
mod widen;

pub use error::{LowerError, ResolveError, UnknownTypeReference};
pub use graph::{
    ClassStub, Entry, ErrorKind, Member, ModuleStub, Overload, Param, ParamKind, RecordShape,
    Signature, StubGraph,
};
pub use lower::{lower_module, NameResolver, NoExternals};
pub use resolve::{
    resolve_construction, resolve_function, resolve_method, resolve_or_unknown, Kwargs, Resolution,
};
pub use types::{compat, join, TypeExpr};
pub use widen::widen;
