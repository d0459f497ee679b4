use veneer_core::{
    lower_module, resolve_construction, Kwargs, Member, NoExternals, StubGraph, TypeExpr,
};
use veneer_parse::parse_module;

const TIMELIKE: &str = "\
class int: ...
class tuple: ...
record stamp_base(year: int, month: int, day: int)
class stamp(stamp_base):
    def __init__(self, t: tuple) -> NoneType
record plain(x: int, y: int)
";

fn graph(src: &str) -> StubGraph {
    let parsed = parse_module("m", src).expect("parse");
    let lowered = lower_module(&parsed, &NoExternals).expect("lower");
    let mut graph = StubGraph::new();
    graph.insert_module(lowered);
    graph
}

fn int() -> TypeExpr {
    TypeExpr::nominal("int")
}

#[test]
fn declared_override_replaces_the_generated_contract() {
    let g = graph(TIMELIKE);
    // The override accepts a tuple...
    let got = resolve_construction(
        &g,
        "m",
        "stamp",
        &[TypeExpr::nominal("tuple")],
        &Kwargs::new(),
    )
    .expect("override construction");
    assert_eq!(got.result, TypeExpr::nominal("stamp"));

    // ...and the generated field-by-field contract is unreachable.
    let err = resolve_construction(&g, "m", "stamp", &[int(), int(), int()], &Kwargs::new())
        .expect_err("generated contract must be unreachable");
    assert!(err.is_recoverable());
}

#[test]
fn record_without_override_uses_the_generated_contract() {
    let g = graph(TIMELIKE);
    resolve_construction(&g, "m", "plain", &[int(), int()], &Kwargs::new())
        .expect("field-by-field construction");
    let err = resolve_construction(&g, "m", "plain", &[int()], &Kwargs::new())
        .expect_err("missing field");
    assert!(err.is_recoverable());
}

#[test]
fn field_accessors_are_inherited_past_the_override() {
    let g = graph(TIMELIKE);
    let member = g.member("m", "stamp", "year").expect("inherited accessor");
    assert_eq!(member, &Member::Field(int()));
}

#[test]
fn derived_class_without_override_uses_the_record_constructor() {
    let src = "\
class int: ...
record base(x: int)
class derived(base): ...
";
    let g = graph(src);
    resolve_construction(&g, "m", "derived", &[int()], &Kwargs::new())
        .expect("generated construction through the base");
}
