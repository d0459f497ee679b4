#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;
use crate::graph::{ClassStub, Entry, ErrorKind, Member, Overload, ParamKind, Signature, StubGraph};
use crate::types::{compat, join, TypeExpr};
use crate::widen::{substitute, widen};

/// Keyword arguments at a call site, by parameter name.
pub type Kwargs = BTreeMap<String, TypeExpr>;

/// Output of a resolved call query.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub result: TypeExpr,
    /// Post-call receiver type when the matched signature declares one.
    pub self_rebind: Option<TypeExpr>,
    /// Declared failure kinds of the contributing signatures.
    pub declared_errors: BTreeSet<ErrorKind>,
}

/// Accumulate type-variable bindings from matching `actual` against
/// `declared`. Repeated bindings of one variable are joined. An `Unknown`
/// actual binds nothing: it carries no evidence.
fn bind_vars(declared: &TypeExpr, actual: &TypeExpr, bindings: &mut BTreeMap<String, TypeExpr>) {
    match (declared, actual) {
        (_, TypeExpr::Unknown) => {}
        (TypeExpr::Var(name), _) => {
            bindings
                .entry(name.clone())
                .and_modify(|bound| *bound = join(bound, actual))
                .or_insert_with(|| actual.clone());
        }
        (
            TypeExpr::Nominal { name: dn, args: da },
            TypeExpr::Nominal { name: an, args: aa },
        ) if dn == an && da.len() == aa.len() => {
            for (d, a) in da.iter().zip(aa) {
                bind_vars(d, a, bindings);
            }
        }
        (TypeExpr::Tuple(d), TypeExpr::Tuple(a)) if d.len() == a.len() => {
            for (d, a) in d.iter().zip(a) {
                bind_vars(d, a, bindings);
            }
        }
        (
            TypeExpr::Callable {
                params: dp,
                result: dr,
            },
            TypeExpr::Callable {
                params: ap,
                result: ar,
            },
        ) if dp.len() == ap.len() => {
            for (d, a) in dp.iter().zip(ap) {
                bind_vars(d, a, bindings);
            }
            bind_vars(dr, ar, bindings);
        }
        (TypeExpr::Union(members), _) => {
            // Bind through the first member the actual can flow into.
            for member in members {
                if compat(actual, member) {
                    bind_vars(member, actual, bindings);
                    break;
                }
            }
        }
        _ => {}
    }
}

/// Match one signature against the call site. Returns the accumulated
/// type-variable bindings on success.
fn match_signature(
    sig: &Signature,
    args: &[TypeExpr],
    kwargs: &Kwargs,
) -> Option<BTreeMap<String, TypeExpr>> {
    let mut bindings = BTreeMap::new();
    let mut next_pos = 0usize;
    let mut used_kw: BTreeSet<&str> = BTreeSet::new();
    let mut variadic: Option<&crate::graph::Param> = None;
    let mut kw_variadic: Option<&crate::graph::Param> = None;

    for param in &sig.params {
        match param.kind {
            ParamKind::Required => {
                let actual = if next_pos < args.len() {
                    next_pos += 1;
                    &args[next_pos - 1]
                } else if let Some(found) = kwargs.get(&param.name) {
                    used_kw.insert(param.name.as_str());
                    found
                } else {
                    return None;
                };
                if !compat(actual, &param.ty) {
                    return None;
                }
                bind_vars(&param.ty, actual, &mut bindings);
            }
            ParamKind::Optional => {
                let actual = if next_pos < args.len() {
                    next_pos += 1;
                    Some(&args[next_pos - 1])
                } else if let Some(found) = kwargs.get(&param.name) {
                    used_kw.insert(param.name.as_str());
                    Some(found)
                } else {
                    None
                };
                if let Some(actual) = actual {
                    if !compat(actual, &param.ty) {
                        return None;
                    }
                    bind_vars(&param.ty, actual, &mut bindings);
                }
            }
            ParamKind::Variadic => variadic = Some(param),
            ParamKind::KeywordVariadic => kw_variadic = Some(param),
        }
    }

    // Excess arguments are absorbed only by a declared catch-all.
    if next_pos < args.len() {
        let catch_all = variadic?;
        for actual in &args[next_pos..] {
            if !compat(actual, &catch_all.ty) {
                return None;
            }
            bind_vars(&catch_all.ty, actual, &mut bindings);
        }
    }
    for (name, actual) in kwargs {
        if used_kw.contains(name.as_str()) {
            continue;
        }
        let catch_all = kw_variadic?;
        if !compat(actual, &catch_all.ty) {
            return None;
        }
        bind_vars(&catch_all.ty, actual, &mut bindings);
    }

    Some(bindings)
}

/// Does every value of `sub` flow into `sup`? Unlike plain `compat`, a
/// union on the left must flow member by member — one overlapping member
/// is not enough.
fn flows_entirely(sub: &TypeExpr, sup: &TypeExpr) -> bool {
    match sub {
        TypeExpr::Union(members) => members.iter().all(|m| flows_entirely(m, sup)),
        _ => compat(sub, sup),
    }
}

/// Is `a` strictly more specific than `b`? Pairwise parameter comparison:
/// every parameter of `a` flows into `b`'s and at least one does not flow
/// back. Signatures of different shape are incomparable.
fn strictly_more_specific(a: &Signature, b: &Signature) -> bool {
    if a.params.len() != b.params.len() {
        return false;
    }
    let mut tighter = false;
    for (pa, pb) in a.params.iter().zip(&b.params) {
        if !flows_entirely(&pa.ty, &pb.ty) {
            return false;
        }
        if !flows_entirely(&pb.ty, &pa.ty) {
            tighter = true;
        }
    }
    tighter
}

fn substituted_result(sig: &Signature, bindings: &BTreeMap<String, TypeExpr>) -> TypeExpr {
    substitute(&sig.result, bindings, &|_| TypeExpr::Unknown)
}

/// Receiver-aware context for method and construction queries.
struct ClassContext<'a> {
    class: &'a ClassStub,
    receiver: Option<&'a TypeExpr>,
}

fn resolve_overload(
    symbol: &str,
    overload: &Overload,
    class_ctx: Option<&ClassContext<'_>>,
    args: &[TypeExpr],
    kwargs: &Kwargs,
) -> Result<Resolution, ResolveError> {
    let mut matched: Vec<(&Signature, BTreeMap<String, TypeExpr>)> = Vec::new();
    for sig in &overload.signatures {
        if let Some(bindings) = match_signature(sig, args, kwargs) {
            matched.push((sig, bindings));
        }
    }

    let Some((primary, primary_bindings)) = matched.first() else {
        return Err(ResolveError::NoMatchingOverload {
            symbol: symbol.to_string(),
            actual: args.to_vec(),
        });
    };

    // First match in declaration order is the primary; later matches that
    // are not strictly more specific model genuine dispatch ambiguity and
    // contribute via join.
    let mut result = substituted_result(primary, primary_bindings);
    let mut declared_errors = primary.raises.clone();
    for (sig, bindings) in matched.iter().skip(1) {
        if strictly_more_specific(sig, primary) {
            continue;
        }
        result = join(&result, &substituted_result(sig, bindings));
        declared_errors.extend(sig.raises.iter().cloned());
    }

    let self_rebind = match (&primary.self_rebind, class_ctx) {
        (Some(template), Some(ctx)) => Some(widen(
            symbol,
            template,
            &primary.type_params,
            &ctx.class.type_params,
            ctx.receiver,
            primary_bindings,
        )?),
        _ => None,
    };

    Ok(Resolution {
        result,
        self_rebind,
        declared_errors,
    })
}

/// Resolve a call to a module-level function.
pub fn resolve_function(
    graph: &StubGraph,
    module: &str,
    name: &str,
    args: &[TypeExpr],
    kwargs: &Kwargs,
) -> Result<Resolution, ResolveError> {
    let symbol = format!("{module}.{name}");
    match graph.lookup(module, name) {
        Ok(Entry::Function(overload)) => resolve_overload(&symbol, overload, None, args, kwargs),
        _ => Err(ResolveError::NoMatchingOverload {
            symbol,
            actual: args.to_vec(),
        }),
    }
}

/// Resolve a method call. `args[0]` is the receiver's actual type; its
/// generic instantiation is what a mutating match widens against.
pub fn resolve_method(
    graph: &StubGraph,
    module: &str,
    class: &str,
    member: &str,
    args: &[TypeExpr],
    kwargs: &Kwargs,
) -> Result<Resolution, ResolveError> {
    let symbol = format!("{module}.{class}.{member}");
    let no_match = || ResolveError::NoMatchingOverload {
        symbol: symbol.clone(),
        actual: args.to_vec(),
    };
    let stub = graph.class_anywhere(module, class).ok_or_else(no_match)?;
    let Some(Member::Overload(overload)) = graph.member(module, class, member) else {
        return Err(no_match());
    };
    let ctx = ClassContext {
        class: stub,
        receiver: args.first(),
    };
    resolve_overload(&symbol, overload, Some(&ctx), args, kwargs)
}

/// Resolve a construction query on a class.
///
/// `args` are the constructor arguments without the receiver; a bare
/// receiver is prepended here. On a class whose sole base is a generated
/// record, a declared construction override entirely replaces the
/// generated field-by-field contract — they are never merged.
pub fn resolve_construction(
    graph: &StubGraph,
    module: &str,
    class: &str,
    args: &[TypeExpr],
    kwargs: &Kwargs,
) -> Result<Resolution, ResolveError> {
    let symbol = format!("{module}.{class}");
    let no_match = || ResolveError::NoMatchingOverload {
        symbol: symbol.clone(),
        actual: args.to_vec(),
    };
    let stub = graph.class_anywhere(module, class).ok_or_else(no_match)?;

    let own_init = match stub.members.get("__init__") {
        Some(Member::Overload(o)) => Some(o),
        _ => None,
    };
    let record_base = record_base(graph, module, stub);

    let overload = match (own_init, record_base) {
        // Construction override: the generated contract is unreachable.
        (Some(own), Some(_)) => own,
        (None, Some(base)) => match base.members.get("__init__") {
            Some(Member::Overload(o)) => o,
            _ => return Err(no_match()),
        },
        (Some(own), None) => own,
        (None, None) => match graph.member(module, class, "__init__") {
            Some(Member::Overload(o)) => o,
            _ => return Err(no_match()),
        },
    };

    // There is no instance yet: the receiver is the wildcard, so the
    // constructor's `self` parameter matches whichever class in the base
    // walk declared it.
    let receiver = TypeExpr::Unknown;
    let mut full_args = Vec::with_capacity(args.len() + 1);
    full_args.push(receiver.clone());
    full_args.extend(args.iter().cloned());

    let ctx = ClassContext {
        class: stub,
        receiver: Some(&receiver),
    };
    let resolved = resolve_overload(&symbol, overload, Some(&ctx), &full_args, kwargs)?;

    // The constructed instance is the rebound receiver when the matched
    // signature declares one, the bare class otherwise.
    let instance = resolved
        .self_rebind
        .clone()
        .unwrap_or_else(|| TypeExpr::nominal(stub.name.clone()));
    Ok(Resolution {
        result: instance.clone(),
        self_rebind: Some(instance),
        declared_errors: resolved.declared_errors,
    })
}

/// The generated record base of `stub`, when it is the sole base.
fn record_base<'a>(
    graph: &'a StubGraph,
    module: &str,
    stub: &ClassStub,
) -> Option<&'a ClassStub> {
    if stub.bases.len() != 1 {
        return None;
    }
    let TypeExpr::Nominal { name, .. } = &stub.bases[0] else {
        return None;
    };
    let base = graph.class_anywhere(module, name)?;
    base.record.as_ref().map(|_| base)
}

/// The documented caller idiom: degrade a missing overload to `?` and
/// continue; widening faults stay fatal.
pub fn resolve_or_unknown(
    resolved: Result<Resolution, ResolveError>,
) -> Result<Resolution, ResolveError> {
    match resolved {
        Err(ResolveError::NoMatchingOverload { .. }) => Ok(Resolution {
            result: TypeExpr::Unknown,
            self_rebind: None,
            declared_errors: BTreeSet::new(),
        }),
        other => other,
    }
}
