//! Per-call expansion state.

use std::collections::{BTreeMap, HashSet};

use cmdscope_policy::AllowlistResolution;

use crate::error::{ExpandError, ExpandResult};

/// Maximum number of nested variable expansions.
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Ordered set of variable names currently being expanded.
#[derive(Debug, Clone, Default)]
pub struct ResolutionChain {
    order: Vec<String>,
    members: HashSet<String>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    /// Push `name`; returns false if it is already on the chain.
    pub fn push(&mut self, name: &str) -> bool {
        if !self.members.insert(name.to_string()) {
            return false;
        }
        self.order.push(name.to_string());
        true
    }

    pub fn pop(&mut self) -> Option<String> {
        let name = self.order.pop()?;
        self.members.remove(&name);
        Some(name)
    }

    /// Innermost name being expanded.
    pub fn top(&self) -> Option<&str> {
        self.order.last().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The chain with `name` appended, closing the cycle.
    pub fn cycle_with(&self, name: &str) -> Vec<String> {
        let mut chain = self.order.clone();
        chain.push(name.to_string());
        chain
    }
}

/// Read-only view of the process environment filtered by an allowlist.
#[derive(Debug, Clone, Copy)]
pub struct ExternalEnv<'a> {
    vars: &'a BTreeMap<String, String>,
    allowlist: &'a AllowlistResolution,
}

impl<'a> ExternalEnv<'a> {
    pub fn new(vars: &'a BTreeMap<String, String>, allowlist: &'a AllowlistResolution) -> Self {
        Self { vars, allowlist }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowlist.is_allowed(name)
    }

    /// Raw value, regardless of the allowlist.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn allowlist(&self) -> &'a AllowlistResolution {
        self.allowlist
    }
}

/// State carried through one top-level expansion.
///
/// Only the chain and depth change during expansion, and both are restored
/// when each nested expansion returns.
#[derive(Debug, Clone)]
pub struct ExpansionContext<'a> {
    scope: String,
    field: String,
    chain: ResolutionChain,
    depth: usize,
    external: Option<ExternalEnv<'a>>,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            field: String::new(),
            chain: ResolutionChain::new(),
            depth: 0,
            external: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Enable fallback to the process environment.
    pub fn with_external(mut self, external: ExternalEnv<'a>) -> Self {
        self.external = Some(external);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn chain(&self) -> &ResolutionChain {
        &self.chain
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn external(&self) -> Option<ExternalEnv<'a>> {
        self.external
    }

    /// Start expanding `name`. Every successful `enter` must be paired with
    /// a [`leave`](Self::leave).
    pub fn enter(&mut self, name: &str) -> ExpandResult<()> {
        if self.chain.contains(name) {
            return Err(ExpandError::CircularReference {
                chain: self.chain.cycle_with(name),
            });
        }
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(ExpandError::MaxRecursionDepthExceeded {
                name: name.to_string(),
                limit: MAX_RECURSION_DEPTH,
            });
        }
        self.chain.push(name);
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        if self.chain.pop().is_some() {
            self.depth -= 1;
        }
    }
}
