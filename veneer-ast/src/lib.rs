#![forbid(unsafe_code)]

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

/// A parsed stub module: the ordered declarations of one source file.
///
/// `provenance` is the leading comment block of the file, retained as
/// non-functional metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub provenance: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Class(ClassDecl),
    Record(RecordDecl),
    Func(FuncDecl),
    Const(ConstDecl),
    Alias(AliasDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub span: Span,
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub bases: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MemberDecl {
    Func(FuncDecl),
    Field(FieldDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeRef,
}

/// A generated fixed-field base type: named positional fields plus a
/// field-by-field construction contract, both synthesized during lowering.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordDecl {
    pub span: Span,
    pub name: Ident,
    pub fields: Vec<FieldDecl>,
}

/// One `def` line plus its body annotations. Same-name defs form an
/// overload; grouping happens during lowering, not here.
#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<ParamDecl>,
    pub ret: TypeRef,
    pub raises: Vec<TypeRef>,
    pub rebind: Option<RebindDecl>,
}

/// `self := Type[...]` — the declared post-call type of the receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct RebindDecl {
    pub span: Span,
    pub ty: TypeRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamStyle {
    Positional,
    /// `*name` catch-all.
    Variadic,
    /// `**name` catch-all.
    KeywordVariadic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub span: Span,
    pub name: Ident,
    pub ty: Option<TypeRef>,
    /// `= ...` default marker.
    pub has_default: bool,
    pub style: ParamStyle,
}

/// `name = ...  # type: T`
#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeRef,
}

/// `type Name = T`
#[derive(Clone, Debug, PartialEq)]
pub struct AliasDecl {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeRef,
}

/// Syntactic type reference. `Union`, `Optional`, `Tuple` and the
/// `Any`/`nothing` spellings stay plain `Name`s here; classification is the
/// lowering pass's job.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
    Name {
        span: Span,
        name: String,
        args: Vec<TypeRef>,
    },
    Callable {
        span: Span,
        params: Vec<TypeRef>,
        ret: Box<TypeRef>,
    },
    /// `...` in a type position (only legal as a default marker).
    Ellipsis { span: Span },
}

impl TypeRef {
    pub fn span(&self) -> Span {
        match self {
            TypeRef::Name { span, .. } => *span,
            TypeRef::Callable { span, .. } => *span,
            TypeRef::Ellipsis { span } => *span,
        }
    }
}
