#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;
use veneer_ast::Span;

use crate::types::TypeExpr;

/// A referenced name could not be resolved through local declarations or
/// the supplied resolver. Fatal to the containing module's load.
#[derive(Debug, Error, Diagnostic)]
#[error("unknown type reference '{name}'")]
#[diagnostic(code(veneer::unresolved))]
pub struct UnknownTypeReference {
    pub name: String,
    #[label]
    pub span: Option<Span>,
}

impl UnknownTypeReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: None,
        }
    }

    pub fn at(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span: Some(span),
        }
    }
}

/// Failure while lowering a parsed module into the stub graph.
#[derive(Debug, Error, Diagnostic)]
pub enum LowerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unresolved(#[from] UnknownTypeReference),

    /// A declaration violates a graph invariant (e.g. a duplicate symbol,
    /// or a rebind outside a method body).
    #[error("invalid stub declaration: {message}")]
    #[diagnostic(code(veneer::lower))]
    Invalid {
        message: String,
        #[label]
        span: Span,
    },
}

impl LowerError {
    pub(crate) fn invalid(message: impl Into<String>, span: Span) -> Self {
        LowerError::Invalid {
            message: message.into(),
            span,
        }
    }
}

fn fmt_types(types: &[TypeExpr]) -> String {
    types
        .iter()
        .map(|t| t.display())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolution-time failure. `NoMatchingOverload` is recoverable — callers
/// typically substitute `?` for the result and continue. `WideningCycle`
/// indicates a stub authoring bug and must be surfaced.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("no matching overload for '{symbol}' with arguments ({})", fmt_types(.actual))]
    #[diagnostic(code(veneer::no_overload))]
    NoMatchingOverload {
        symbol: String,
        actual: Vec<TypeExpr>,
    },

    #[error("self-rebind of '{symbol}' does not reach a fixed point in one widening step")]
    #[diagnostic(code(veneer::widening_cycle))]
    WideningCycle { symbol: String },
}

impl ResolveError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ResolveError::NoMatchingOverload { .. })
    }
}
