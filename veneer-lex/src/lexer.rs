#![forbid(unsafe_code)]

use logos::Logos;
use miette::Diagnostic;
use thiserror::Error;
use veneer_ast::{span_between, Span};

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(veneer::lex))]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \f\r]+")]
enum RawToken {
    #[token("def")]
    KwDef,
    #[token("class")]
    KwClass,
    #[token("record")]
    KwRecord,
    #[token("type")]
    KwType,
    #[token("raise")]
    KwRaise,

    #[token("->")]
    Arrow,
    #[token(":=")]
    Becomes,
    #[token("...")]
    Ellipsis,

    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("**")]
    StarStar,
    #[token("*")]
    Star,
    #[token("?")]
    Question,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn raw_kind(raw: RawToken) -> TokenKind {
    match raw {
        RawToken::KwDef => TokenKind::KwDef,
        RawToken::KwClass => TokenKind::KwClass,
        RawToken::KwRecord => TokenKind::KwRecord,
        RawToken::KwType => TokenKind::KwType,
        RawToken::KwRaise => TokenKind::KwRaise,
        RawToken::Arrow => TokenKind::Arrow,
        RawToken::Becomes => TokenKind::Becomes,
        RawToken::Ellipsis => TokenKind::Ellipsis,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Eq => TokenKind::Eq,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Dot => TokenKind::Dot,
        RawToken::StarStar => TokenKind::StarStar,
        RawToken::Star => TokenKind::Star,
        RawToken::Question => TokenKind::Question,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::Ident(s) => TokenKind::Ident(s),
    }
}

/// Split a code line at its comment, if any.
///
/// A `# type: T` trailer is significant (constants carry their type there);
/// everything else after `#` is discarded. Returns the code part and, for a
/// type trailer, the annotation text with its offset inside `code`.
fn split_comment(code: &str) -> (&str, Option<(&str, usize)>) {
    let Some(hash) = code.find('#') else {
        return (code, None);
    };
    let after = &code[hash + 1..];
    let trimmed = after.trim_start();
    if let Some(rest) = trimmed.strip_prefix("type:") {
        let ws = after.len() - trimmed.len();
        let annotation = rest.trim_start();
        let off = hash + 1 + ws + "type:".len() + (rest.len() - annotation.len());
        (&code[..hash], Some((annotation, off)))
    } else {
        (&code[..hash], None)
    }
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut indent_stack: Vec<usize> = vec![0];

        // Track absolute byte offsets.
        let mut line_start = 0usize;

        for line in self.src.split_inclusive('\n') {
            let line_end = line_start + line.len();

            let mut content = line;
            if content.ends_with('\n') {
                content = &content[..content.len() - 1];
            }

            // Blank lines carry no tokens and no indentation.
            if content.trim().is_empty() {
                line_start = line_end;
                continue;
            }

            if content.as_bytes().iter().any(|b| *b == b'\t') {
                return Err(LexError {
                    message: "tabs are not allowed; use spaces".to_string(),
                    span: span_between(line_start, line_end),
                });
            }

            let leading_spaces = content
                .as_bytes()
                .iter()
                .take_while(|b| **b == b' ')
                .count();

            let code_full = &content[leading_spaces..];
            let (code, type_comment) = split_comment(code_full);
            if code.trim().is_empty() && type_comment.is_none() {
                // Comment-only line.
                line_start = line_end;
                continue;
            }

            let current_indent = *indent_stack.last().unwrap_or(&0);
            if leading_spaces > current_indent {
                indent_stack.push(leading_spaces);
                tokens.push(Token {
                    kind: TokenKind::Indent,
                    span: span_between(line_start, line_start + leading_spaces),
                });
            } else if leading_spaces < current_indent {
                while let Some(&top) = indent_stack.last() {
                    if leading_spaces == top {
                        break;
                    }
                    indent_stack.pop();
                    tokens.push(Token {
                        kind: TokenKind::Dedent,
                        span: span_between(line_start, line_start + leading_spaces),
                    });
                }
                if *indent_stack.last().unwrap_or(&usize::MAX) != leading_spaces {
                    return Err(LexError {
                        message: "inconsistent indentation".to_string(),
                        span: span_between(line_start, line_end),
                    });
                }
            }

            let code_base = line_start + leading_spaces;
            self.lex_fragment(code, code_base, &mut tokens)?;

            if let Some((annotation, off)) = type_comment {
                tokens.push(Token {
                    kind: TokenKind::TypeComment,
                    span: span_between(code_base + off, code_base + off),
                });
                self.lex_fragment(annotation, code_base + off, &mut tokens)?;
            }

            // End of logical line.
            tokens.push(Token {
                kind: TokenKind::Newline,
                span: span_between(line_end, line_end),
            });

            line_start = line_end;
        }

        // Close open indents.
        while indent_stack.len() > 1 {
            indent_stack.pop();
            tokens.push(Token {
                kind: TokenKind::Dedent,
                span: span_between(self.src.len(), self.src.len()),
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: span_between(self.src.len(), self.src.len()),
        });

        Ok(tokens)
    }

    fn lex_fragment(
        &self,
        fragment: &str,
        base: usize,
        tokens: &mut Vec<Token>,
    ) -> Result<(), LexError> {
        let mut lex = RawToken::lexer(fragment);
        while let Some(raw) = lex.next() {
            let span_in_line = lex.span();
            let abs_start = base + span_in_line.start;
            let abs_end = base + span_in_line.end;
            match raw {
                Ok(raw) => tokens.push(Token {
                    kind: raw_kind(raw),
                    span: span_between(abs_start, abs_end),
                }),
                Err(_) => {
                    return Err(LexError {
                        message: "unexpected token".to_string(),
                        span: span_between(abs_start, abs_end),
                    });
                }
            }
        }
        Ok(())
    }
}
