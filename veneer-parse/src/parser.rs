#![forbid(unsafe_code)]

use veneer_ast::{
    span_between, AliasDecl, ClassDecl, ConstDecl, FieldDecl, FuncDecl, Ident, Item, MemberDecl,
    ParamDecl, ParamStyle, RebindDecl, RecordDecl, Span, Spanned, TypeRef,
};
use veneer_lex::{Token, TokenKind};

use crate::error::ParseError;

fn join_spans(a: Span, b: Span) -> Span {
    let start = a.offset();
    let end = b.offset() + b.len();
    span_between(start, end)
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.idx)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.idx + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.idx)
            .map(|t| t.span)
            .unwrap_or_else(|| span_between(0, 0))
    }

    fn bump(&mut self) -> Span {
        let span = self.span();
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        span
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if *self.peek() == kind {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Span, ParseError> {
        if *self.peek() == kind {
            Ok(self.bump())
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn ident(&mut self, what: &str) -> Result<Ident, ParseError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let span = self.bump();
                Ok(Spanned::new(span, name))
            }
            _ => Err(self.err(format!("expected {what}"))),
        }
    }

    fn err(&self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.span(),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(TokenKind::Newline) {}
    }

    pub fn parse_items(&mut self) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::KwClass => items.push(Item::Class(self.parse_class()?)),
                TokenKind::KwRecord => items.push(Item::Record(self.parse_record()?)),
                TokenKind::KwType => items.push(Item::Alias(self.parse_alias()?)),
                TokenKind::KwDef => items.push(Item::Func(self.parse_func()?)),
                TokenKind::Ident(_) => items.push(Item::Const(self.parse_const()?)),
                TokenKind::Indent => {
                    return Err(self.err("unexpected indentation at top level".to_string()));
                }
                _ => return Err(self.err("expected a declaration".to_string())),
            }
        }
        Ok(items)
    }

    fn parse_const(&mut self) -> Result<ConstDecl, ParseError> {
        let name = self.ident("constant name")?;
        self.expect(TokenKind::Eq, "`=` after constant name")?;
        self.expect(TokenKind::Ellipsis, "`...` placeholder value")?;
        self.expect(TokenKind::TypeComment, "a `# type:` annotation")?;
        let ty = self.parse_typeref()?;
        self.expect(TokenKind::Newline, "end of line")?;
        let span = join_spans(name.span, ty.span());
        Ok(ConstDecl { span, name, ty })
    }

    fn parse_alias(&mut self) -> Result<AliasDecl, ParseError> {
        let start = self.bump();
        let name = self.ident("alias name")?;
        self.expect(TokenKind::Eq, "`=` after alias name")?;
        let ty = self.parse_typeref()?;
        self.expect(TokenKind::Newline, "end of line")?;
        let span = join_spans(start, ty.span());
        Ok(AliasDecl { span, name, ty })
    }

    fn parse_record(&mut self) -> Result<RecordDecl, ParseError> {
        let start = self.bump();
        let name = self.ident("record name")?;
        self.expect(TokenKind::LParen, "`(` before record fields")?;
        let mut fields = Vec::new();
        if !self.eat(TokenKind::RParen) {
            loop {
                fields.push(self.parse_field_inline()?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen, "`)` after record fields")?;
                break;
            }
        }
        let end = self.expect(TokenKind::Newline, "end of line")?;
        Ok(RecordDecl {
            span: join_spans(start, end),
            name,
            fields,
        })
    }

    fn parse_field_inline(&mut self) -> Result<FieldDecl, ParseError> {
        let name = self.ident("field name")?;
        self.expect(TokenKind::Colon, "`:` after field name")?;
        let ty = self.parse_typeref()?;
        let span = join_spans(name.span, ty.span());
        Ok(FieldDecl { span, name, ty })
    }

    fn parse_class(&mut self) -> Result<ClassDecl, ParseError> {
        let start = self.bump();
        let name = self.ident("class name")?;

        let mut type_params = Vec::new();
        if self.eat(TokenKind::LBracket) {
            loop {
                type_params.push(self.ident("type parameter")?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RBracket, "`]` after type parameters")?;
                break;
            }
        }

        let mut bases = Vec::new();
        if self.eat(TokenKind::LParen) {
            if !self.eat(TokenKind::RParen) {
                loop {
                    bases.push(self.parse_typeref()?);
                    if self.eat(TokenKind::Comma) {
                        continue;
                    }
                    self.expect(TokenKind::RParen, "`)` after base types")?;
                    break;
                }
            }
        }

        self.expect(TokenKind::Colon, "`:` after class header")?;

        let mut members = Vec::new();
        let end;
        if self.eat(TokenKind::Ellipsis) {
            // `class C: ...` — empty body.
            end = self.expect(TokenKind::Newline, "end of line")?;
        } else {
            self.expect(TokenKind::Newline, "end of line")?;
            self.expect(TokenKind::Indent, "an indented class body")?;
            loop {
                match self.peek() {
                    TokenKind::Dedent => break,
                    TokenKind::KwDef => members.push(MemberDecl::Func(self.parse_func()?)),
                    TokenKind::Ellipsis => {
                        self.bump();
                        self.expect(TokenKind::Newline, "end of line")?;
                    }
                    TokenKind::Ident(_) => {
                        let field = self.parse_field_inline()?;
                        self.expect(TokenKind::Newline, "end of line")?;
                        members.push(MemberDecl::Field(field));
                    }
                    _ => return Err(self.err("expected a member declaration".to_string())),
                }
            }
            end = self.expect(TokenKind::Dedent, "end of class body")?;
        }

        Ok(ClassDecl {
            span: join_spans(start, end),
            name,
            type_params,
            bases,
            members,
        })
    }

    fn parse_func(&mut self) -> Result<FuncDecl, ParseError> {
        let start = self.bump();
        let name = self.ident("function name")?;
        self.expect(TokenKind::LParen, "`(` before parameters")?;

        let mut params = Vec::new();
        if !self.eat(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen, "`)` after parameters")?;
                break;
            }
        }

        self.expect(TokenKind::Arrow, "`->` and a return type")?;
        let ret = self.parse_typeref()?;

        let mut raises = Vec::new();
        let mut rebind: Option<RebindDecl> = None;
        let end;
        if self.eat(TokenKind::Colon) {
            if self.eat(TokenKind::Ellipsis) {
                // `def f(...) -> T: ...` — empty body.
                end = self.expect(TokenKind::Newline, "end of line")?;
            } else {
                self.expect(TokenKind::Newline, "end of line")?;
                self.expect(TokenKind::Indent, "an indented body")?;
                loop {
                    match self.peek() {
                        TokenKind::Dedent => break,
                        TokenKind::KwRaise => {
                            self.bump();
                            let exc = self.parse_typeref()?;
                            self.expect(TokenKind::LParen, "`()` after exception type")?;
                            self.expect(TokenKind::RParen, "`()` after exception type")?;
                            self.expect(TokenKind::Newline, "end of line")?;
                            raises.push(exc);
                        }
                        TokenKind::Ellipsis => {
                            self.bump();
                            self.expect(TokenKind::Newline, "end of line")?;
                        }
                        TokenKind::Ident(target) => {
                            let target = target.clone();
                            let target_span = self.bump();
                            self.expect(TokenKind::Becomes, "`:=` in a rebind line")?;
                            if target != "self" {
                                return Err(ParseError {
                                    message: "rebind must target the receiver `self`"
                                        .to_string(),
                                    span: target_span,
                                });
                            }
                            let ty = self.parse_typeref()?;
                            self.expect(TokenKind::Newline, "end of line")?;
                            let span = join_spans(target_span, ty.span());
                            if rebind.is_some() {
                                return Err(ParseError {
                                    message: "a signature may declare at most one self-rebind"
                                        .to_string(),
                                    span,
                                });
                            }
                            rebind = Some(RebindDecl { span, ty });
                        }
                        _ => {
                            return Err(
                                self.err("expected `raise` or a self-rebind line".to_string())
                            );
                        }
                    }
                }
                end = self.expect(TokenKind::Dedent, "end of body")?;
            }
        } else {
            end = self.expect(TokenKind::Newline, "end of line")?;
        }

        Ok(FuncDecl {
            span: join_spans(start, end),
            name,
            params,
            ret,
            raises,
            rebind,
        })
    }

    fn parse_param(&mut self) -> Result<ParamDecl, ParseError> {
        let style_span = self.span();
        let style = if self.eat(TokenKind::StarStar) {
            ParamStyle::KeywordVariadic
        } else if self.eat(TokenKind::Star) {
            ParamStyle::Variadic
        } else {
            ParamStyle::Positional
        };

        let name = self.ident("parameter name")?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_typeref()?)
        } else {
            None
        };
        let has_default = if self.eat(TokenKind::Eq) {
            self.expect(TokenKind::Ellipsis, "`...` default marker")?;
            true
        } else {
            false
        };

        let span = match &ty {
            Some(t) => join_spans(style_span, t.span()),
            None => join_spans(style_span, name.span),
        };
        Ok(ParamDecl {
            span,
            name,
            ty,
            has_default,
            style,
        })
    }

    fn parse_typeref(&mut self) -> Result<TypeRef, ParseError> {
        match self.peek().clone() {
            TokenKind::Question => {
                let span = self.bump();
                Ok(TypeRef::Name {
                    span,
                    name: "?".to_string(),
                    args: Vec::new(),
                })
            }
            TokenKind::Ellipsis => {
                let span = self.bump();
                Ok(TypeRef::Ellipsis { span })
            }
            TokenKind::Ident(_) => {
                let first = self.ident("type name")?;
                let mut name = first.node;
                let mut span = first.span;
                while self.eat(TokenKind::Dot) {
                    let seg = self.ident("name after `.`")?;
                    name.push('.');
                    name.push_str(&seg.node);
                    span = join_spans(span, seg.span);
                }

                if name == "Callable"
                    && *self.peek() == TokenKind::LBracket
                    && *self.peek_at(1) == TokenKind::LBracket
                {
                    return self.parse_callable(span);
                }

                let mut args = Vec::new();
                if self.eat(TokenKind::LBracket) {
                    if !self.eat(TokenKind::RBracket) {
                        loop {
                            args.push(self.parse_typeref()?);
                            if self.eat(TokenKind::Comma) {
                                continue;
                            }
                            let end =
                                self.expect(TokenKind::RBracket, "`]` after type arguments")?;
                            span = join_spans(span, end);
                            break;
                        }
                    }
                }
                Ok(TypeRef::Name { span, name, args })
            }
            _ => Err(self.err("expected a type".to_string())),
        }
    }

    /// `Callable[[p1, p2], ret]`
    fn parse_callable(&mut self, start: Span) -> Result<TypeRef, ParseError> {
        self.expect(TokenKind::LBracket, "`[` after Callable")?;
        self.expect(TokenKind::LBracket, "`[` before parameter types")?;
        let mut params = Vec::new();
        if !self.eat(TokenKind::RBracket) {
            loop {
                params.push(self.parse_typeref()?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RBracket, "`]` after parameter types")?;
                break;
            }
        }
        self.expect(TokenKind::Comma, "`,` before the result type")?;
        let ret = self.parse_typeref()?;
        let end = self.expect(TokenKind::RBracket, "`]` closing Callable")?;
        Ok(TypeRef::Callable {
            span: join_spans(start, end),
            params,
            ret: Box::new(ret),
        })
    }
}
