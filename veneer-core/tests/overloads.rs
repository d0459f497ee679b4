use veneer_core::{
    lower_module, resolve_function, resolve_or_unknown, Kwargs, NoExternals, ResolveError,
    StubGraph, TypeExpr,
};
use veneer_parse::parse_module;

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
fn disjoint_overloads_resolve_first_match() {
    let g = graph(
        "class int: ...\nclass str: ...\ndef f(x: int) -> int\ndef f(x: str) -> str\n",
    );
    let got = resolve_function(&g, "m", "f", &[int()], &Kwargs::new()).expect("resolve");
    assert_eq!(got.result, int());
    assert!(got.self_rebind.is_none());
}

#[test]
fn overlapping_overloads_join_their_results() {
    // An int satisfies both branches (ints promote to float); neither is
    // strictly more specific, so the result is the union of both.
    let g = graph(
        "class int: ...\nclass float: ...\nclass str: ...\ndef g(x: int) -> int\ndef g(x: float) -> str\n",
    );
    let got = resolve_function(&g, "m", "g", &[int()], &Kwargs::new()).expect("resolve");
    assert_eq!(
        got.result,
        TypeExpr::union([int(), TypeExpr::nominal("str")])
    );
}

#[test]
fn missing_overload_is_recoverable_and_degrades_to_unknown() {
    let g = graph("class int: ...\ndef f(x: int) -> int\n");
    let err = resolve_function(&g, "m", "f", &[TypeExpr::Tuple(vec![])], &Kwargs::new())
        .expect_err("expected no match");
    assert!(err.is_recoverable());
    assert!(matches!(err, ResolveError::NoMatchingOverload { .. }));

    let degraded = resolve_or_unknown(resolve_function(
        &g,
        "m",
        "f",
        &[TypeExpr::Tuple(vec![])],
        &Kwargs::new(),
    ))
    .expect("degraded");
    assert_eq!(degraded.result, TypeExpr::Unknown);
}

#[test]
fn keyword_catch_all_absorbs_unknown_keywords() {
    let g = graph("class int: ...\ndef h(x: int, **rest: ?) -> int\n");
    let kwargs: Kwargs = [("color".to_string(), TypeExpr::nominal("int"))]
        .into_iter()
        .collect();
    resolve_function(&g, "m", "h", &[int()], &kwargs).expect("keyword catch-all");
}

#[test]
fn excess_positionals_without_catch_all_do_not_match() {
    let g = graph("class int: ...\ndef f(x: int) -> int\n");
    let err = resolve_function(&g, "m", "f", &[int(), int()], &Kwargs::new())
        .expect_err("expected no match");
    assert!(err.is_recoverable());
}

#[test]
fn declared_errors_are_surfaced_without_being_raised() {
    let g = graph(
        "class str: ...\nclass int: ...\nclass ValueError: ...\nclass MemoryError: ...\ndef parse(s: str, format: str = ...) -> int:\n    raise ValueError()\n    raise MemoryError()\n",
    );
    let got =
        resolve_function(&g, "m", "parse", &[TypeExpr::nominal("str")], &Kwargs::new())
            .expect("resolve");
    let kinds: Vec<&str> = got.declared_errors.iter().map(|k| k.as_str()).collect();
    assert_eq!(kinds, vec!["MemoryError", "ValueError"]);
    assert_eq!(got.result, int());
}

#[test]
fn resolution_is_deterministic_across_queries() {
    let g = graph(
        "class int: ...\nclass float: ...\nclass str: ...\ndef g(x: int) -> int\ndef g(x: float) -> str\n",
    );
    let first = resolve_function(&g, "m", "g", &[int()], &Kwargs::new()).expect("resolve");
    let second = resolve_function(&g, "m", "g", &[int()], &Kwargs::new()).expect("resolve");
    assert_eq!(first, second);
}
