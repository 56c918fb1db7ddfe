//! The call being made: target interface, method, alias and arguments.
//!
//! An [`Invocation`] arrives half-populated from the codec and is enriched by
//! the restore step (session defaults, legacy id mapping, class and method
//! resolution) before it is dispatched.

use crate::ports::Session;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved description of one callable method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    /// Parameter type names, used only to tell overloads apart
    pub param_types: Vec<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, param_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_types: param_types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Why a method could not be resolved on an interface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MethodLookupError {
    #[error("no such method {method} in {interface}")]
    NoSuchMethod { interface: String, method: String },
    #[error("method {method} of {interface} is overloaded")]
    Overloaded { interface: String, method: String },
}

/// Resolved interface: the method table of a service contract
#[derive(Debug, Clone, Default)]
pub struct InterfaceDescriptor {
    name: String,
    methods: HashMap<String, Vec<Arc<MethodDescriptor>>>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Builder: declare a method
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods
            .entry(method.name.clone())
            .or_default()
            .push(Arc::new(method));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a method by name. Overloaded names are ambiguous on the wire
    /// and therefore rejected.
    pub fn public_method(&self, name: &str) -> Result<Arc<MethodDescriptor>, MethodLookupError> {
        match self.methods.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(MethodLookupError::NoSuchMethod {
                interface: self.name.clone(),
                method: name.to_string(),
            }),
            Some([method]) => Ok(Arc::clone(method)),
            Some(_) => Err(MethodLookupError::Overloaded {
                interface: self.name.clone(),
                method: name.to_string(),
            }),
        }
    }
}

/// Per-request call description
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub class_name: String,
    pub method_name: String,
    pub alias: String,
    /// Resolved interface, filled lazily during restore
    pub class: Option<Arc<InterfaceDescriptor>>,
    /// Resolved method, filled lazily during restore
    pub method: Option<Arc<MethodDescriptor>>,
    pub args: Vec<serde_json::Value>,
}

impl Invocation {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            alias: alias.into(),
            ..Self::default()
        }
    }

    /// Builder: set call arguments
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Fill identity fields the client omitted because the session already
    /// carries them.
    pub fn apply(&mut self, session: Option<&dyn Session>) {
        let Some(session) = session else {
            return;
        };
        if self.class_name.is_empty() {
            if let Some(name) = session.interface_name() {
                self.class_name = name;
            }
        }
        if self.alias.is_empty() {
            if let Some(alias) = session.alias() {
                self.alias = alias;
            }
        }
    }
}
