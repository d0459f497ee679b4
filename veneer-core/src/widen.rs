#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::error::ResolveError;
use crate::types::{join, TypeExpr};

/// Replace type variables in `template`. Bound variables take their
/// binding; unbound ones take `fallback(name)`. Unions are rebuilt so the
/// member set stays canonical after substitution.
pub(crate) fn substitute(
    template: &TypeExpr,
    bindings: &BTreeMap<String, TypeExpr>,
    fallback: &dyn Fn(&str) -> TypeExpr,
) -> TypeExpr {
    match template {
        TypeExpr::Var(name) => bindings
            .get(name)
            .cloned()
            .unwrap_or_else(|| fallback(name)),
        TypeExpr::Nominal { name, args } => TypeExpr::Nominal {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| substitute(a, bindings, fallback))
                .collect(),
        },
        TypeExpr::Tuple(elems) => TypeExpr::Tuple(
            elems
                .iter()
                .map(|e| substitute(e, bindings, fallback))
                .collect(),
        ),
        TypeExpr::Callable { params, result } => TypeExpr::Callable {
            params: params
                .iter()
                .map(|p| substitute(p, bindings, fallback))
                .collect(),
            result: Box::new(substitute(result, bindings, fallback)),
        },
        TypeExpr::Union(members) => TypeExpr::union(
            members
                .iter()
                .map(|m| substitute(m, bindings, fallback)),
        ),
        other => other.clone(),
    }
}

fn apply_once(
    template: &TypeExpr,
    sig_type_params: &[String],
    bindings: &BTreeMap<String, TypeExpr>,
    prior_args: &[TypeExpr],
) -> TypeExpr {
    // An unbound class variable means the receiver had no prior
    // instantiation there; an unbound signature variable means the call
    // site supplied no evidence.
    let fallback = |name: &str| {
        if sig_type_params.iter().any(|p| p == name) {
            TypeExpr::Unknown
        } else {
            TypeExpr::Bottom
        }
    };
    let substituted = substitute(template, bindings, &fallback);
    match substituted {
        TypeExpr::Nominal { name, args }
            if !prior_args.is_empty() && args.len() == prior_args.len() =>
        {
            let widened = args
                .iter()
                .zip(prior_args)
                .map(|(fresh, prior)| join(fresh, prior))
                .collect();
            TypeExpr::Nominal {
                name,
                args: widened,
            }
        }
        other => other,
    }
}

/// Compute the post-call receiver type declared by a self-rebind template.
///
/// Class variables substitute from the receiver's prior instantiation,
/// signature variables from call-site bindings; each substituted argument
/// is then joined with the corresponding prior argument. Widening is
/// single-step by contract: re-applying the step with the widened receiver
/// as prior must be a fixed point, otherwise the declaration is rejected.
pub fn widen(
    symbol: &str,
    template: &TypeExpr,
    sig_type_params: &[String],
    class_type_params: &[String],
    receiver: Option<&TypeExpr>,
    bindings: &BTreeMap<String, TypeExpr>,
) -> Result<TypeExpr, ResolveError> {
    let prior_args: &[TypeExpr] = match receiver {
        Some(TypeExpr::Nominal { args, .. }) if !args.is_empty() => args,
        _ => &[],
    };

    let widened = apply_once(template, sig_type_params, bindings, prior_args);

    // Fixed-point trial: treat the widened receiver as the new prior.
    let widened_args: Vec<TypeExpr> = match &widened {
        TypeExpr::Nominal { args, .. } => args.clone(),
        _ => Vec::new(),
    };
    let mut rebound = bindings.clone();
    for (i, param) in class_type_params.iter().enumerate() {
        if let Some(arg) = widened_args.get(i) {
            rebound.insert(param.clone(), arg.clone());
        }
    }
    let again = apply_once(template, sig_type_params, &rebound, &widened_args);
    if again != widened {
        return Err(ResolveError::WideningCycle {
            symbol: symbol.to_string(),
        });
    }

    // Monotonicity holds by construction of the join step.
    debug_assert!(prior_args.iter().zip(&widened_args).all(|(prior, now)| {
        now.includes(prior)
    }));

    Ok(widened)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, TypeExpr)]) -> BTreeMap<String, TypeExpr> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn dd(k: TypeExpr, v: TypeExpr) -> TypeExpr {
        TypeExpr::applied("defaultdict", vec![k, v])
    }

    #[test]
    fn construction_without_prior_takes_the_template() {
        // self := defaultdict[nothing, DV], DV bound to int by the factory.
        let template = dd(TypeExpr::Bottom, TypeExpr::Var("DV".to_string()));
        let got = widen(
            "defaultdict.__init__",
            &template,
            &["DV".to_string()],
            &["K".to_string(), "V".to_string()],
            Some(&TypeExpr::nominal("defaultdict")),
            &bindings(&[("DV", TypeExpr::nominal("int"))]),
        )
        .expect("widen");
        assert_eq!(got, dd(TypeExpr::Bottom, TypeExpr::nominal("int")));
    }

    #[test]
    fn unbound_signature_variable_degrades_to_unknown() {
        let template = dd(TypeExpr::Bottom, TypeExpr::Var("DV".to_string()));
        let got = widen(
            "defaultdict.__init__",
            &template,
            &["DV".to_string()],
            &["K".to_string(), "V".to_string()],
            None,
            &bindings(&[]),
        )
        .expect("widen");
        assert_eq!(got, dd(TypeExpr::Bottom, TypeExpr::Unknown));
    }

    #[test]
    fn keyed_access_widens_against_prior() {
        // self := defaultdict[Union[K, K2], V] on a defaultdict[nothing, nothing]
        // receiver indexed with a str key.
        let template = dd(
            TypeExpr::union([
                TypeExpr::Var("K".to_string()),
                TypeExpr::Var("K2".to_string()),
            ]),
            TypeExpr::Var("V".to_string()),
        );
        let receiver = dd(TypeExpr::Bottom, TypeExpr::Bottom);
        let got = widen(
            "defaultdict.__getitem__",
            &template,
            &["K2".to_string()],
            &["K".to_string(), "V".to_string()],
            Some(&receiver),
            &bindings(&[
                ("K", TypeExpr::Bottom),
                ("V", TypeExpr::Bottom),
                ("K2", TypeExpr::nominal("str")),
            ]),
        )
        .expect("widen");
        assert_eq!(
            got,
            dd(
                TypeExpr::union([TypeExpr::Bottom, TypeExpr::nominal("str")]),
                TypeExpr::Bottom,
            )
        );
    }

    #[test]
    fn widening_result_includes_prior_arguments() {
        let template = dd(
            TypeExpr::union([
                TypeExpr::Var("K".to_string()),
                TypeExpr::Var("K2".to_string()),
            ]),
            TypeExpr::Var("V".to_string()),
        );
        let prior_key = TypeExpr::union([TypeExpr::nominal("int"), TypeExpr::nominal("bytes")]);
        let receiver = dd(prior_key.clone(), TypeExpr::Bottom);
        let got = widen(
            "defaultdict.__getitem__",
            &template,
            &["K2".to_string()],
            &["K".to_string(), "V".to_string()],
            Some(&receiver),
            &bindings(&[
                ("K", prior_key.clone()),
                ("V", TypeExpr::Bottom),
                ("K2", TypeExpr::nominal("str")),
            ]),
        )
        .expect("widen");
        let TypeExpr::Nominal { args, .. } = &got else {
            panic!("expected a nominal receiver");
        };
        assert!(args[0].includes(&prior_key));
        assert!(args[0].includes(&TypeExpr::nominal("str")));
    }

    #[test]
    fn nested_class_variable_is_a_widening_cycle() {
        // self := defaultdict[list[K], V] grows on every application.
        let template = dd(
            TypeExpr::applied("list", vec![TypeExpr::Var("K".to_string())]),
            TypeExpr::Var("V".to_string()),
        );
        let receiver = dd(TypeExpr::Bottom, TypeExpr::Bottom);
        let err = widen(
            "defaultdict.bad",
            &template,
            &[],
            &["K".to_string(), "V".to_string()],
            Some(&receiver),
            &bindings(&[("K", TypeExpr::Bottom), ("V", TypeExpr::Bottom)]),
        )
        .expect_err("expected a widening cycle");
        assert!(matches!(err, ResolveError::WideningCycle { .. }));
    }
}
