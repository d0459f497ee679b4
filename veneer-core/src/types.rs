#![forbid(unsafe_code)]

use std::collections::BTreeSet;

/// Structural type expression.
///
/// Union members live in a `BTreeSet`, so deduplication and member order are
/// canonical and plain `==` is structural equality — which is what makes
/// `join` commutative and idempotent under derived equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeExpr {
    /// The `?`/`Any` wildcard: compatible with everything in both positions.
    Unknown,
    /// The empty type `nothing`: no observed instances yet. Valid only as a
    /// supplied actual, never as a declared requirement.
    Bottom,
    /// Class- or signature-scoped type variable.
    Var(String),
    /// Named application, e.g. `dict[K, V]`. An empty argument list is the
    /// "raw" form and stands for unknown arguments.
    Nominal { name: String, args: Vec<TypeExpr> },
    Tuple(Vec<TypeExpr>),
    Callable {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
    },
    Union(BTreeSet<TypeExpr>),
    /// Default-value marker in parameter lists; not a type.
    Ellipsis,
}

/// Bases whose type arguments are never reachable via mutation; their
/// arguments match covariantly. Everything else is treated as mutable and
/// matches invariantly.
const READ_ONLY_BASES: &[&str] = &["tuple", "frozenset"];

/// The subject library's implicit numeric tower: an actual on the left
/// satisfies a declared requirement on the right.
const NUMERIC_WIDENINGS: &[(&str, &str)] = &[
    ("bool", "int"),
    ("bool", "float"),
    ("bool", "complex"),
    ("int", "float"),
    ("int", "complex"),
    ("float", "complex"),
];

impl TypeExpr {
    pub fn nominal(name: impl Into<String>) -> Self {
        TypeExpr::Nominal {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn applied(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Nominal {
            name: name.into(),
            args,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        TypeExpr::Var(name.into())
    }

    pub fn none_type() -> Self {
        TypeExpr::nominal("NoneType")
    }

    /// `Optional[T]` is sugar for `Union[T, NoneType]`.
    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::union([inner, TypeExpr::none_type()])
    }

    /// Structural union: flattens nested unions and deduplicates members.
    /// Any `Unknown` member absorbs the whole union; a single member is
    /// unwrapped; no members is `nothing`. `Bottom` is an ordinary member
    /// and is never simplified away.
    pub fn union<I>(members: I) -> Self
    where
        I: IntoIterator<Item = TypeExpr>,
    {
        let mut set = BTreeSet::new();
        for member in members {
            match member {
                TypeExpr::Unknown => return TypeExpr::Unknown,
                TypeExpr::Union(inner) => {
                    for t in inner {
                        if t == TypeExpr::Unknown {
                            return TypeExpr::Unknown;
                        }
                        set.insert(t);
                    }
                }
                other => {
                    set.insert(other);
                }
            }
        }
        if set.len() == 1 {
            return set.pop_first().unwrap_or(TypeExpr::Bottom);
        }
        if set.is_empty() {
            return TypeExpr::Bottom;
        }
        TypeExpr::Union(set)
    }

    /// Does `self` structurally include `other`? Exactly the lattice
    /// ordering induced by `join`.
    pub fn includes(&self, other: &TypeExpr) -> bool {
        join(self, other) == *self
    }

    pub fn display(&self) -> String {
        fn list(items: &[TypeExpr]) -> String {
            items
                .iter()
                .map(|t| t.display())
                .collect::<Vec<_>>()
                .join(", ")
        }
        match self {
            TypeExpr::Nominal { name, args } => {
                if args.is_empty() {
                    name.clone()
                } else {
                    format!("{name}[{}]", list(args))
                }
            }
            TypeExpr::Union(members) => {
                let shown = members
                    .iter()
                    .map(|t| t.display())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Union[{shown}]")
            }
            TypeExpr::Tuple(elems) => format!("Tuple[{}]", list(elems)),
            TypeExpr::Callable { params, result } => {
                format!("Callable[[{}], {}]", list(params), result.display())
            }
            TypeExpr::Var(name) => name.clone(),
            TypeExpr::Unknown => "?".to_string(),
            TypeExpr::Bottom => "nothing".to_string(),
            TypeExpr::Ellipsis => "...".to_string(),
        }
    }
}

/// Lattice join: structural union of the two sides.
pub fn join(a: &TypeExpr, b: &TypeExpr) -> TypeExpr {
    TypeExpr::union([a.clone(), b.clone()])
}

/// The compatibility relation used for argument matching: may a value of
/// type `actual` flow into a position declared as `declared`?
pub fn compat(actual: &TypeExpr, declared: &TypeExpr) -> bool {
    match (actual, declared) {
        (TypeExpr::Unknown, _) | (_, TypeExpr::Unknown) => true,
        (TypeExpr::Ellipsis, _) | (_, TypeExpr::Ellipsis) => false,

        // An unconstrained variable matches in either position; the
        // binding it induces is the resolver's job. This must come before
        // the `nothing` rules: invariant argument checks compare both
        // directions, and a `nothing`-instantiated receiver still matches
        // its declared `self` parameters.
        (TypeExpr::Var(_), _) | (_, TypeExpr::Var(_)) => true,

        // `nothing` flows anywhere but is never itself a requirement a
        // real value can satisfy.
        (TypeExpr::Bottom, _) => true,
        (_, TypeExpr::Bottom) => false,

        // A union actual is "one of these at runtime": any member may flow.
        (TypeExpr::Union(members), _) => members.iter().any(|m| compat(m, declared)),
        (_, TypeExpr::Union(members)) => members.iter().any(|m| compat(actual, m)),

        (TypeExpr::Tuple(a), TypeExpr::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| compat(x, y))
        }
        // A structural tuple satisfies the nominal `tuple` requirement.
        (TypeExpr::Tuple(elems), TypeExpr::Nominal { name, args }) if name == "tuple" => {
            args.is_empty()
                || (args.len() == 1 && elems.iter().all(|e| compat(e, &args[0])))
        }

        (
            TypeExpr::Callable {
                params: ap,
                result: ar,
            },
            TypeExpr::Callable {
                params: dp,
                result: dr,
            },
        ) => {
            ap.len() == dp.len()
                && dp.iter().zip(ap).all(|(d, a)| compat(d, a))
                && compat(ar, dr)
        }
        // A structural callable satisfies a bare `Callable` requirement.
        (TypeExpr::Callable { .. }, TypeExpr::Nominal { name, args })
            if name == "Callable" && args.is_empty() =>
        {
            true
        }

        (
            TypeExpr::Nominal { name: an, args: aa },
            TypeExpr::Nominal { name: dn, args: da },
        ) => {
            if an != dn {
                return NUMERIC_WIDENINGS.contains(&(an.as_str(), dn.as_str()));
            }
            // The raw form stands for unknown arguments.
            if aa.is_empty() || da.is_empty() {
                return true;
            }
            if aa.len() != da.len() {
                return false;
            }
            let covariant = READ_ONLY_BASES.contains(&an.as_str());
            aa.iter().zip(da).all(|(a, d)| {
                if *d == TypeExpr::Unknown {
                    true
                } else if covariant {
                    compat(a, d)
                } else {
                    // Reachable via mutation: invariant.
                    compat(a, d) && compat(d, a)
                }
            })
        }

        _ => false,
    }
}
