#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use miette::Diagnostic;
use rayon::prelude::*;
use thiserror::Error;

use veneer_core::{lower_module, LowerError, ModuleStub, NameResolver, StubGraph, TypeExpr};
use veneer_parse::{parse_module, ParseError};

/// One stub source handed to the loader: module name plus file text.
#[derive(Clone, Debug)]
pub struct StubSource {
    pub module: String,
    pub text: String,
}

impl StubSource {
    pub fn new(module: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            text: text.into(),
        }
    }
}

/// Why one module failed to load. Either way the failure is isolated to
/// that module; the rest of the batch loads normally.
#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lower(#[from] LowerError),
}

#[derive(Debug)]
pub struct ModuleFailure {
    pub module: String,
    pub error: LoadError,
}

#[derive(Debug)]
pub struct LoadReport {
    pub graph: StubGraph,
    pub failures: Vec<ModuleFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Cross-module name table built from everything that parsed: class and
/// record names per module. Canonical nominal names are the declared
/// (unqualified) names; the stub corpus keeps them distinct.
struct SymbolTable {
    classes: BTreeMap<String, BTreeSet<String>>,
}

impl SymbolTable {
    fn build(modules: &[veneer_ast::Module]) -> Self {
        let mut classes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for module in modules {
            let names = classes.entry(module.name.clone()).or_default();
            for item in &module.items {
                match item {
                    veneer_ast::Item::Class(c) => {
                        names.insert(c.name.node.clone());
                    }
                    veneer_ast::Item::Record(r) => {
                        names.insert(r.name.node.clone());
                    }
                    _ => {}
                }
            }
        }
        Self { classes }
    }

    fn module_declares(&self, module: &str, name: &str) -> bool {
        self.classes
            .get(module)
            .is_some_and(|names| names.contains(name))
    }
}

impl NameResolver for SymbolTable {
    fn resolve(&self, name: &str) -> Option<TypeExpr> {
        if let Some((module, symbol)) = name.rsplit_once('.') {
            if self.module_declares(module, symbol) {
                return Some(TypeExpr::nominal(symbol));
            }
            return None;
        }
        if self.module_declares("builtins", name) {
            return Some(TypeExpr::nominal(name));
        }
        self.classes
            .values()
            .any(|names| names.contains(name))
            .then(|| TypeExpr::nominal(name))
    }
}

/// Load a batch of stub sources into one frozen graph.
///
/// Parsing and lowering are independent per module and run in parallel;
/// failures are collected per module and never block the rest of the
/// batch. The returned graph is immutable: hand it out freely to
/// concurrent readers.
pub fn load_modules(sources: &[StubSource]) -> LoadReport {
    let parsed: Vec<Result<veneer_ast::Module, ModuleFailure>> = sources
        .par_iter()
        .map(|source| {
            parse_module(&source.module, &source.text).map_err(|e| ModuleFailure {
                module: source.module.clone(),
                error: e.into(),
            })
        })
        .collect();

    let mut failures = Vec::new();
    let mut modules = Vec::new();
    for result in parsed {
        match result {
            Ok(module) => modules.push(module),
            Err(failure) => failures.push(failure),
        }
    }

    let table = SymbolTable::build(&modules);
    let lowered: Vec<Result<ModuleStub, ModuleFailure>> = modules
        .par_iter()
        .map(|module| {
            lower_module(module, &table).map_err(|e| ModuleFailure {
                module: module.name.clone(),
                error: e.into(),
            })
        })
        .collect();

    let mut graph = StubGraph::new();
    for result in lowered {
        match result {
            Ok(module) => graph.insert_module(module),
            Err(failure) => failures.push(failure),
        }
    }
    LoadReport { graph, failures }
}
