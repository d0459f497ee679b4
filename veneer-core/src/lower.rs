#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use veneer_ast as ast;

use crate::error::{LowerError, UnknownTypeReference};
use crate::graph::{
    ClassStub, Entry, ErrorKind, Member, ModuleStub, Overload, Param, ParamKind, RecordShape,
    Signature,
};
use crate::types::TypeExpr;

/// Resolves type names that are not declared in the module being lowered —
/// the seam to other modules and to the embedding analyzer.
pub trait NameResolver: Sync {
    fn resolve(&self, name: &str) -> Option<TypeExpr>;
}

/// Resolver for self-contained modules: knows nothing.
pub struct NoExternals;

impl NameResolver for NoExternals {
    fn resolve(&self, _name: &str) -> Option<TypeExpr> {
        None
    }
}

/// Short all-caps spellings (`K`, `V`, `T`, `DV`, `K2`) are type variables
/// when they resolve to nothing else.
fn looks_like_type_var(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 3
        && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

struct ModuleEnv<'a> {
    local_classes: BTreeSet<String>,
    aliases: BTreeMap<String, TypeExpr>,
    resolver: &'a dyn NameResolver,
}

/// Variable scope for one signature (or other type position).
struct TypeScope<'a> {
    class_params: &'a [String],
    /// Signature-scoped variables in first-use order.
    locals: Vec<String>,
}

impl<'a> TypeScope<'a> {
    fn new(class_params: &'a [String]) -> Self {
        Self {
            class_params,
            locals: Vec::new(),
        }
    }
}

fn lower_type(
    ty: &ast::TypeRef,
    env: &ModuleEnv<'_>,
    scope: &mut TypeScope<'_>,
) -> Result<TypeExpr, LowerError> {
    match ty {
        ast::TypeRef::Ellipsis { .. } => Ok(TypeExpr::Ellipsis),
        ast::TypeRef::Callable { params, ret, .. } => Ok(TypeExpr::Callable {
            params: params
                .iter()
                .map(|p| lower_type(p, env, scope))
                .collect::<Result<_, _>>()?,
            result: Box::new(lower_type(ret, env, scope)?),
        }),
        ast::TypeRef::Name { span, name, args } => {
            let lower_args = |scope: &mut TypeScope<'_>| {
                args.iter()
                    .map(|a| lower_type(a, env, scope))
                    .collect::<Result<Vec<_>, _>>()
            };
            match name.as_str() {
                "?" | "Any" => Ok(TypeExpr::Unknown),
                "nothing" => Ok(TypeExpr::Bottom),
                "None" | "NoneType" => Ok(TypeExpr::none_type()),
                "Union" => Ok(TypeExpr::union(lower_args(scope)?)),
                "Optional" => {
                    let mut lowered = lower_args(scope)?;
                    if lowered.len() != 1 {
                        return Err(LowerError::invalid(
                            "Optional takes exactly one argument",
                            *span,
                        ));
                    }
                    Ok(TypeExpr::optional(lowered.remove(0)))
                }
                "Tuple" => {
                    if args.is_empty() {
                        Ok(TypeExpr::nominal("tuple"))
                    } else {
                        Ok(TypeExpr::Tuple(lower_args(scope)?))
                    }
                }
                _ => {
                    if scope.class_params.iter().any(|p| p == name) {
                        if !args.is_empty() {
                            return Err(LowerError::invalid(
                                format!("type parameter '{name}' cannot take arguments"),
                                *span,
                            ));
                        }
                        return Ok(TypeExpr::Var(name.clone()));
                    }
                    if env.local_classes.contains(name) {
                        return Ok(TypeExpr::Nominal {
                            name: name.clone(),
                            args: lower_args(scope)?,
                        });
                    }
                    if let Some(aliased) = env.aliases.get(name) {
                        if !args.is_empty() {
                            return Err(LowerError::invalid(
                                format!("alias '{name}' does not take arguments"),
                                *span,
                            ));
                        }
                        return Ok(aliased.clone());
                    }
                    if looks_like_type_var(name) {
                        if !scope.locals.iter().any(|v| v == name) {
                            scope.locals.push(name.clone());
                        }
                        return Ok(TypeExpr::Var(name.clone()));
                    }
                    match env.resolver.resolve(name) {
                        Some(TypeExpr::Nominal {
                            name: resolved,
                            args: resolved_args,
                        }) if resolved_args.is_empty() => Ok(TypeExpr::Nominal {
                            name: resolved,
                            args: lower_args(scope)?,
                        }),
                        Some(other) => {
                            if args.is_empty() {
                                Ok(other)
                            } else {
                                Err(LowerError::invalid(
                                    format!("'{name}' does not take type arguments"),
                                    *span,
                                ))
                            }
                        }
                        None => Err(UnknownTypeReference::at(name.clone(), *span).into()),
                    }
                }
            }
        }
    }
}

fn self_type(class: &str, class_params: &[String]) -> TypeExpr {
    if class_params.is_empty() {
        TypeExpr::nominal(class)
    } else {
        TypeExpr::applied(
            class,
            class_params
                .iter()
                .map(|p| TypeExpr::Var(p.clone()))
                .collect(),
        )
    }
}

fn lower_signature(
    func: &ast::FuncDecl,
    env: &ModuleEnv<'_>,
    class: Option<(&str, &[String])>,
) -> Result<Signature, LowerError> {
    let class_params: &[String] = class.map(|(_, p)| p).unwrap_or(&[]);
    let mut scope = TypeScope::new(class_params);

    let mut params = Vec::with_capacity(func.params.len());
    for (i, p) in func.params.iter().enumerate() {
        let ty = match &p.ty {
            Some(annotated) => lower_type(annotated, env, &mut scope)?,
            None => match class {
                Some((name, cp)) if i == 0 && p.name.node == "self" => self_type(name, cp),
                _ => TypeExpr::Unknown,
            },
        };
        let kind = match p.style {
            ast::ParamStyle::Variadic => ParamKind::Variadic,
            ast::ParamStyle::KeywordVariadic => ParamKind::KeywordVariadic,
            ast::ParamStyle::Positional if p.has_default => ParamKind::Optional,
            ast::ParamStyle::Positional => ParamKind::Required,
        };
        params.push(Param {
            name: p.name.node.clone(),
            ty,
            kind,
        });
    }

    let result = lower_type(&func.ret, env, &mut scope)?;

    let mut raises = BTreeSet::new();
    for exc in &func.raises {
        match lower_type(exc, env, &mut scope)? {
            TypeExpr::Nominal { name, .. } => {
                raises.insert(ErrorKind::new(name));
            }
            _ => {
                return Err(LowerError::invalid(
                    "raise requires a class reference",
                    exc.span(),
                ));
            }
        }
    }

    let self_rebind = match &func.rebind {
        Some(rebind) => {
            let is_method = class.is_some()
                && func
                    .params
                    .first()
                    .is_some_and(|p| p.name.node == "self");
            if !is_method {
                return Err(LowerError::invalid(
                    "self-rebind requires a method with a `self` receiver",
                    rebind.span,
                ));
            }
            Some(lower_type(&rebind.ty, env, &mut scope)?)
        }
        None => None,
    };

    Ok(Signature {
        type_params: scope.locals,
        params,
        result,
        self_rebind,
        raises,
    })
}

/// Group same-name `def`s into overloads, preserving declaration order of
/// both the symbols and their signatures.
fn group_overloads(
    funcs: Vec<(String, Signature)>,
) -> Vec<(String, Overload)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, Vec<Signature>> = BTreeMap::new();
    for (name, sig) in funcs {
        if !grouped.contains_key(&name) {
            order.push(name.clone());
        }
        grouped.entry(name).or_default().push(sig);
    }
    order
        .into_iter()
        .map(|name| {
            let signatures = grouped.remove(&name).unwrap_or_default();
            (
                name.clone(),
                Overload { name, signatures },
            )
        })
        .collect()
}

fn lower_class(decl: &ast::ClassDecl, env: &ModuleEnv<'_>) -> Result<ClassStub, LowerError> {
    let mut seen = BTreeSet::new();
    for p in &decl.type_params {
        if !seen.insert(p.node.clone()) {
            return Err(LowerError::invalid(
                format!("duplicate type parameter '{}'", p.node),
                p.span,
            ));
        }
    }
    let class_params: Vec<String> = decl.type_params.iter().map(|p| p.node.clone()).collect();

    let mut base_scope = TypeScope::new(&class_params);
    let bases = decl
        .bases
        .iter()
        .map(|b| lower_type(b, env, &mut base_scope))
        .collect::<Result<Vec<_>, _>>()?;

    let mut members: BTreeMap<String, Member> = BTreeMap::new();
    let mut funcs: Vec<(String, Signature)> = Vec::new();
    for member in &decl.members {
        match member {
            ast::MemberDecl::Field(field) => {
                let mut scope = TypeScope::new(&class_params);
                let ty = lower_type(&field.ty, env, &mut scope)?;
                if members
                    .insert(field.name.node.clone(), Member::Field(ty))
                    .is_some()
                {
                    return Err(LowerError::invalid(
                        format!("duplicate member '{}'", field.name.node),
                        field.span,
                    ));
                }
            }
            ast::MemberDecl::Func(func) => {
                let sig =
                    lower_signature(func, env, Some((&decl.name.node, &class_params)))?;
                funcs.push((func.name.node.clone(), sig));
            }
        }
    }
    for (name, overload) in group_overloads(funcs) {
        if members
            .insert(name.clone(), Member::Overload(overload))
            .is_some()
        {
            return Err(LowerError::invalid(
                format!("member '{name}' declared as both field and method"),
                decl.span,
            ));
        }
    }

    Ok(ClassStub {
        name: decl.name.node.clone(),
        type_params: class_params,
        bases,
        members,
        record: None,
    })
}

/// Expand a `record` declaration into its generated base class: a
/// field-by-field construction signature plus one accessor per field.
fn lower_record(decl: &ast::RecordDecl, env: &ModuleEnv<'_>) -> Result<ClassStub, LowerError> {
    let mut fields = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        let mut scope = TypeScope::new(&[]);
        let ty = lower_type(&field.ty, env, &mut scope)?;
        fields.push((field.name.node.clone(), ty));
    }

    let mut ctor_params = vec![Param::required("self", TypeExpr::nominal(decl.name.node.clone()))];
    ctor_params.extend(
        fields
            .iter()
            .map(|(name, ty)| Param::required(name.clone(), ty.clone())),
    );
    let ctor = Overload {
        name: "__init__".to_string(),
        signatures: vec![Signature::new(ctor_params, TypeExpr::none_type())],
    };

    let mut members: BTreeMap<String, Member> = fields
        .iter()
        .map(|(name, ty)| (name.clone(), Member::Field(ty.clone())))
        .collect();
    members.insert("__init__".to_string(), Member::Overload(ctor));

    Ok(ClassStub {
        name: decl.name.node.clone(),
        type_params: Vec::new(),
        bases: Vec::new(),
        members,
        record: Some(RecordShape { fields }),
    })
}

pub fn lower_module(
    module: &ast::Module,
    resolver: &dyn NameResolver,
) -> Result<ModuleStub, LowerError> {
    // Pass 1: names of locally declared classes and records.
    let mut local_classes = BTreeSet::new();
    for item in &module.items {
        let declared = match item {
            ast::Item::Class(c) => Some((&c.name.node, c.span)),
            ast::Item::Record(r) => Some((&r.name.node, r.span)),
            _ => None,
        };
        if let Some((name, span)) = declared {
            if !local_classes.insert(name.clone()) {
                return Err(LowerError::invalid(
                    format!("duplicate declaration of '{name}'"),
                    span,
                ));
            }
        }
    }

    let mut env = ModuleEnv {
        local_classes,
        aliases: BTreeMap::new(),
        resolver,
    };

    // Pass 2: aliases in declaration order; each may reference classes and
    // earlier aliases.
    for item in &module.items {
        if let ast::Item::Alias(alias) = item {
            let mut scope = TypeScope::new(&[]);
            let lowered = lower_type(&alias.ty, &env, &mut scope)?;
            if env.aliases.insert(alias.name.node.clone(), lowered).is_some() {
                return Err(LowerError::invalid(
                    format!("duplicate alias '{}'", alias.name.node),
                    alias.span,
                ));
            }
        }
    }

    // Pass 3: lower every declaration.
    let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
    let mut funcs: Vec<(String, Signature)> = Vec::new();
    let insert = |entries: &mut BTreeMap<String, Entry>,
                      name: String,
                      entry: Entry,
                      span: veneer_ast::Span|
     -> Result<(), LowerError> {
        if entries.insert(name.clone(), entry).is_some() {
            return Err(LowerError::invalid(
                format!("duplicate declaration of '{name}'"),
                span,
            ));
        }
        Ok(())
    };

    for item in &module.items {
        match item {
            ast::Item::Class(decl) => {
                let class = lower_class(decl, &env)?;
                insert(&mut entries, class.name.clone(), Entry::Class(class), decl.span)?;
            }
            ast::Item::Record(decl) => {
                let class = lower_record(decl, &env)?;
                insert(&mut entries, class.name.clone(), Entry::Class(class), decl.span)?;
            }
            ast::Item::Func(decl) => {
                let sig = lower_signature(decl, &env, None)?;
                funcs.push((decl.name.node.clone(), sig));
            }
            ast::Item::Const(decl) => {
                let mut scope = TypeScope::new(&[]);
                let ty = lower_type(&decl.ty, &env, &mut scope)?;
                insert(
                    &mut entries,
                    decl.name.node.clone(),
                    Entry::Constant(ty),
                    decl.span,
                )?;
            }
            ast::Item::Alias(decl) => {
                let lowered = env.aliases.get(&decl.name.node).cloned().unwrap_or(
                    TypeExpr::Unknown,
                );
                insert(
                    &mut entries,
                    decl.name.node.clone(),
                    Entry::Alias(lowered),
                    decl.span,
                )?;
            }
        }
    }
    for (name, overload) in group_overloads(funcs) {
        let span = module
            .items
            .iter()
            .find_map(|item| match item {
                ast::Item::Func(f) if f.name.node == name => Some(f.span),
                _ => None,
            })
            .unwrap_or_else(|| veneer_ast::span(0, 0));
        insert(&mut entries, name, Entry::Function(overload), span)?;
    }

    // Pass 4: a class over a generated record base may override construction
    // with at most one signature.
    for entry in entries.values() {
        let Entry::Class(class) = entry else {
            continue;
        };
        if class.record.is_some() || class.bases.len() != 1 {
            continue;
        }
        let TypeExpr::Nominal { name: base, .. } = &class.bases[0] else {
            continue;
        };
        let base_is_record = matches!(
            entries.get(base),
            Some(Entry::Class(b)) if b.record.is_some()
        );
        if !base_is_record {
            continue;
        }
        if let Some(Member::Overload(ctor)) = class.members.get("__init__") {
            if ctor.signatures.len() > 1 {
                return Err(LowerError::invalid(
                    format!(
                        "record-derived class '{}' may declare at most one construction override",
                        class.name
                    ),
                    veneer_ast::span(0, 0),
                ));
            }
        }
    }

    Ok(ModuleStub {
        name: module.name.clone(),
        provenance: module.provenance.clone(),
        entries,
    })
}
