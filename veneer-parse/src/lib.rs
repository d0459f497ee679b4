#![forbid(unsafe_code)]

mod error;
mod parser;

pub use error::ParseError;
pub use parser::Parser;

use veneer_lex::Lexer;

/// Leading `#` comment block of a stub file, kept as provenance metadata.
/// A `# type:` trailer is never part of it.
fn leading_provenance(src: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in src.lines() {
        let trimmed = line.trim_start();
        if let Some(body) = trimmed.strip_prefix('#') {
            let body = body.trim();
            if body.starts_with("type:") {
                break;
            }
            lines.push(body.to_string());
        } else if trimmed.is_empty() && lines.is_empty() {
            continue;
        } else {
            break;
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

pub fn parse_module(name: &str, src: &str) -> Result<veneer_ast::Module, ParseError> {
    let provenance = leading_provenance(src);
    let tokens = Lexer::new(src).lex().map_err(|e| ParseError {
        message: e.message,
        span: e.span,
    })?;
    let mut parser = Parser::new(&tokens);
    let items = parser.parse_items()?;
    Ok(veneer_ast::Module {
        name: name.to_string(),
        provenance,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_ast::{Item, MemberDecl, ParamStyle, TypeRef};

    #[test]
    fn parse_plain_function() {
        let m = parse_module("time", "def sleep(secs: float) -> NoneType\n").expect("parse");
        assert_eq!(m.items.len(), 1);
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.name.node, "sleep");
        assert_eq!(f.params.len(), 1);
        assert!(f.raises.is_empty());
        assert!(f.rebind.is_none());
    }

    #[test]
    fn parse_function_with_raises() {
        let src = "def mktime(t: Union[struct_time, tuple]) -> float:\n    raise OverflowError()\n    raise ValueError()\n";
        let m = parse_module("time", src).expect("parse");
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.raises.len(), 2);
    }

    #[test]
    fn parse_class_with_rebind() {
        let src = "class defaultdict[K, V](dict[K, V]):\n    def __init__(self) -> NoneType:\n        self := defaultdict[nothing, nothing]\n";
        let m = parse_module("collections", src).expect("parse");
        let Item::Class(c) = &m.items[0] else {
            panic!("expected a class");
        };
        assert_eq!(c.type_params.len(), 2);
        assert_eq!(c.bases.len(), 1);
        let MemberDecl::Func(init) = &c.members[0] else {
            panic!("expected a method");
        };
        assert!(init.rebind.is_some());
    }

    #[test]
    fn parse_rejects_second_rebind() {
        let src = "class d[K]:\n    def f(self) -> NoneType:\n        self := d[K]\n        self := d[K]\n";
        let err = parse_module("m", src).expect_err("expected parse error");
        assert!(err.message.contains("at most one self-rebind"));
    }

    #[test]
    fn parse_rejects_rebind_of_non_receiver() {
        let src = "class d[K]:\n    def f(self, x: K) -> NoneType:\n        x := d[K]\n";
        let err = parse_module("m", src).expect_err("expected parse error");
        assert!(err.message.contains("receiver"));
    }

    #[test]
    fn parse_constant_with_type_comment() {
        let m = parse_module("time", "timezone = ...  # type: int\n").expect("parse");
        let Item::Const(c) = &m.items[0] else {
            panic!("expected a constant");
        };
        assert_eq!(c.name.node, "timezone");
        assert!(matches!(&c.ty, TypeRef::Name { name, .. } if name == "int"));
    }

    #[test]
    fn parse_constant_without_annotation_fails() {
        let err = parse_module("time", "timezone = ...\n").expect_err("expected parse error");
        assert!(err.message.contains("# type:"));
    }

    #[test]
    fn parse_record_decl() {
        let m = parse_module("time", "record pair(first: int, second: str)\n").expect("parse");
        let Item::Record(r) = &m.items[0] else {
            panic!("expected a record");
        };
        assert_eq!(r.fields.len(), 2);
        assert_eq!(r.fields[1].name.node, "second");
    }

    #[test]
    fn parse_callable_type() {
        let src = "def apply(f: Callable[[int, str], bool]) -> bool\n";
        let m = parse_module("m", src).expect("parse");
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        let Some(TypeRef::Callable { params, ret, .. }) = &f.params[0].ty else {
            panic!("expected a callable annotation");
        };
        assert_eq!(params.len(), 2);
        assert!(matches!(&**ret, TypeRef::Name { name, .. } if name == "bool"));
    }

    #[test]
    fn parse_variadic_params() {
        let src = "def f(a: int, *args: ?, **kwargs: ?) -> int\n";
        let m = parse_module("m", src).expect("parse");
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.params[1].style, ParamStyle::Variadic);
        assert_eq!(f.params[2].style, ParamStyle::KeywordVariadic);
    }

    #[test]
    fn parse_default_marker() {
        let src = "def localtime(secs: float = ...) -> struct_time\n";
        let m = parse_module("time", src).expect("parse");
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        assert!(f.params[0].has_default);
    }

    #[test]
    fn parse_empty_class_body() {
        let m = parse_module("builtins", "class int: ...\n").expect("parse");
        let Item::Class(c) = &m.items[0] else {
            panic!("expected a class");
        };
        assert!(c.members.is_empty());
    }

    #[test]
    fn parse_alias() {
        let m = parse_module("m", "type Names = list[str]\n").expect("parse");
        let Item::Alias(a) = &m.items[0] else {
            panic!("expected an alias");
        };
        assert_eq!(a.name.node, "Names");
    }

    #[test]
    fn provenance_header_is_retained() {
        let src = "# Stub declarations for the time module.\n# Reduced to the checked surface.\n\ndef time() -> float\n";
        let m = parse_module("time", src).expect("parse");
        let prov = m.provenance.expect("provenance");
        assert!(prov.contains("time module"));
        assert!(prov.contains("checked surface"));
    }

    #[test]
    fn dotted_type_names() {
        let src = "def f(t: time.struct_time) -> float\n";
        let m = parse_module("m", src).expect("parse");
        let Item::Func(f) = &m.items[0] else {
            panic!("expected a function");
        };
        assert!(
            matches!(&f.params[0].ty, Some(TypeRef::Name { name, .. }) if name == "time.struct_time")
        );
    }
}
