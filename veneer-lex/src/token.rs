#![forbid(unsafe_code)]

use veneer_ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwDef,
    KwClass,
    KwRecord,
    KwType,
    KwRaise,

    // Operators / punctuation
    Arrow,
    Becomes,
    Ellipsis,
    Colon,
    Eq,
    Comma,
    Dot,
    Star,
    StarStar,
    Question,

    LParen,
    RParen,
    LBracket,
    RBracket,

    /// `# type:` trailer; the annotation's tokens follow it on the line.
    TypeComment,

    Newline,
    Indent,
    Dedent,
    Eof,

    Ident(String),
}
