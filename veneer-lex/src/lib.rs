#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_def_line() {
        let got = kinds("def sleep(secs: float) -> NoneType\n");
        assert_eq!(
            got,
            vec![
                TokenKind::KwDef,
                TokenKind::Ident("sleep".to_string()),
                TokenKind::LParen,
                TokenKind::Ident("secs".to_string()),
                TokenKind::Colon,
                TokenKind::Ident("float".to_string()),
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Ident("NoneType".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_indent_dedent_around_body() {
        let got = kinds("def f() -> int:\n    raise ValueError()\ndef g() -> int\n");
        let indents = got
            .iter()
            .filter(|k| matches!(k, TokenKind::Indent))
            .count();
        let dedents = got
            .iter()
            .filter(|k| matches!(k, TokenKind::Dedent))
            .count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
        assert!(got.contains(&TokenKind::KwRaise));
    }

    #[test]
    fn lex_type_comment_trailer() {
        let got = kinds("timezone = ...  # type: int\n");
        assert_eq!(
            got,
            vec![
                TokenKind::Ident("timezone".to_string()),
                TokenKind::Eq,
                TokenKind::Ellipsis,
                TokenKind::TypeComment,
                TokenKind::Ident("int".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_plain_comment_is_dropped() {
        let got = kinds("# provenance header\ndef f() -> int  # trailing\n");
        assert!(!got.iter().any(|k| matches!(k, TokenKind::TypeComment)));
        assert_eq!(
            got.iter()
                .filter(|k| matches!(k, TokenKind::Ident(_)))
                .count(),
            2
        );
    }

    #[test]
    fn lex_rebind_line() {
        let got = kinds("self := defaultdict[nothing, DV]\n");
        assert!(got.contains(&TokenKind::Becomes));
        assert!(got.contains(&TokenKind::LBracket));
    }

    #[test]
    fn lex_star_params() {
        let got = kinds("def f(*args: ?, **kwargs: ?) -> int\n");
        assert!(got.contains(&TokenKind::Star));
        assert!(got.contains(&TokenKind::StarStar));
        assert_eq!(
            got.iter()
                .filter(|k| matches!(k, TokenKind::Question))
                .count(),
            2
        );
    }

    #[test]
    fn lex_rejects_tabs() {
        let err = Lexer::new("def f() -> int:\n\traise E()\n").lex().unwrap_err();
        assert!(err.message.contains("tabs"));
    }

    #[test]
    fn lex_rejects_inconsistent_indentation() {
        let err = Lexer::new("class C:\n    def f() -> int\n  def g() -> int\n")
            .lex()
            .unwrap_err();
        assert!(err.message.contains("indentation"));
    }
}
