#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;
use veneer_ast::Span;

#[derive(Debug, Error, Diagnostic)]
#[error("stub syntax error: {message}")]
#[diagnostic(code(veneer::parse))]
pub struct ParseError {
    pub message: String,
    #[label]
    pub span: Span,
}
