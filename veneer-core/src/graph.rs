#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use crate::error::UnknownTypeReference;
use crate::types::TypeExpr;

/// Declarable failure kind attached to a signature (e.g. `ValueError`).
/// Purely descriptive metadata: the core never raises these itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorKind(String);

impl ErrorKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    /// Declared with a `...` default; may be omitted at the call site.
    Optional,
    /// `*args` catch-all for excess positional arguments.
    Variadic,
    /// `**kwargs` catch-all for excess keyword arguments.
    KeywordVariadic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub kind: ParamKind,
}

impl Param {
    pub fn required(name: impl Into<String>, ty: TypeExpr) -> Self {
        Param {
            name: name.into(),
            ty,
            kind: ParamKind::Required,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// Signature-scoped type variables in first-use order. Receiver-class
    /// variables are not listed here; they are bound from the receiver's
    /// prior instantiation.
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub result: TypeExpr,
    /// The declared post-call receiver type of a mutating operation.
    pub self_rebind: Option<TypeExpr>,
    pub raises: BTreeSet<ErrorKind>,
}

impl Signature {
    pub fn new(params: Vec<Param>, result: TypeExpr) -> Self {
        Signature {
            type_params: Vec::new(),
            params,
            result,
            self_rebind: None,
            raises: BTreeSet::new(),
        }
    }
}

/// Ordered alternative signatures for one symbol. Order is significant:
/// resolution walks the list front to back.
#[derive(Clone, Debug, PartialEq)]
pub struct Overload {
    pub name: String,
    pub signatures: Vec<Signature>,
}

/// Fixed named positional fields of a generated record base.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordShape {
    pub fields: Vec<(String, TypeExpr)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Overload(Overload),
    Field(TypeExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassStub {
    pub name: String,
    pub type_params: Vec<String>,
    pub bases: Vec<TypeExpr>,
    pub members: BTreeMap<String, Member>,
    /// Present when this class is itself a generated record base.
    pub record: Option<RecordShape>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Class(ClassStub),
    Function(Overload),
    Constant(TypeExpr),
    Alias(TypeExpr),
}

/// One loaded stub module. Constructed once by lowering, immutable after.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleStub {
    pub name: String,
    pub provenance: Option<String>,
    pub entries: BTreeMap<String, Entry>,
}

/// The frozen set of loaded modules. Single writer at load time; any number
/// of concurrent readers afterwards — every query below is a pure function.
#[derive(Clone, Debug, Default)]
pub struct StubGraph {
    modules: BTreeMap<String, ModuleStub>,
}

impl StubGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load-time only; the graph is frozen once handed to readers.
    pub fn insert_module(&mut self, module: ModuleStub) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn module(&self, name: &str) -> Option<&ModuleStub> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleStub> {
        self.modules.values()
    }

    pub fn lookup(&self, module: &str, symbol: &str) -> Result<&Entry, UnknownTypeReference> {
        self.modules
            .get(module)
            .and_then(|m| m.entries.get(symbol))
            .ok_or_else(|| UnknownTypeReference::named(format!("{module}.{symbol}")))
    }

    pub fn class(&self, module: &str, name: &str) -> Option<&ClassStub> {
        match self.modules.get(module)?.entries.get(name)? {
            Entry::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Find a class by declared name, preferring `prefer_module`, then
    /// `builtins`, then any module in deterministic order.
    pub fn class_anywhere(&self, prefer_module: &str, name: &str) -> Option<&ClassStub> {
        if let Some(c) = self.class(prefer_module, name) {
            return Some(c);
        }
        if let Some(c) = self.class("builtins", name) {
            return Some(c);
        }
        self.modules
            .keys()
            .find_map(|m| self.class(m, name))
    }

    /// Member lookup walking base references, first match wins. This is how
    /// generated-record field accessors are inherited.
    pub fn member(&self, module: &str, class: &str, member: &str) -> Option<&Member> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut pending: Vec<String> = vec![class.to_string()];
        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(stub) = self.class_anywhere(module, &name) else {
                continue;
            };
            if let Some(found) = stub.members.get(member) {
                return Some(found);
            }
            for base in stub.bases.iter().rev() {
                if let TypeExpr::Nominal { name, .. } = base {
                    pending.push(name.clone());
                }
            }
        }
        None
    }
}
