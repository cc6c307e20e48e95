// src/material.rs
//! Named surface materials and the pairwise contact rule table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Surface material id. Only meaningful as a key into [`MaterialRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Friction / restitution applied when two materials touch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactRule {
    pub friction: f32,
    pub restitution: f32,
}

impl ContactRule {
    pub const fn new(friction: f32, restitution: f32) -> Self {
        Self { friction, restitution }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.friction.is_finite() && self.friction >= 0.0) {
            return Err(Error::config(format!("friction must be >= 0, got {}", self.friction)));
        }
        if !(self.restitution.is_finite() && (0.0..=1.0).contains(&self.restitution)) {
            return Err(Error::config(format!(
                "restitution must be within [0, 1], got {}",
                self.restitution
            )));
        }
        Ok(())
    }
}

impl Default for ContactRule {
    fn default() -> Self {
        Self::new(0.1, 0.7)
    }
}

#[inline(always)]
fn pair_key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Material names plus explicit rules for unordered pairs.
#[derive(Debug, Clone)]
pub struct MaterialRegistry {
    names: Vec<String>,
    by_name: HashMap<String, MaterialId>,
    rules: HashMap<(MaterialId, MaterialId), ContactRule>,
    default_rule: ContactRule,
}

impl MaterialRegistry {
    pub const DEFAULT_NAME: &'static str = "default";

    /// Creates a registry with the `default` material pre-registered.
    pub fn new(default_rule: ContactRule) -> Self {
        let mut registry = Self {
            names: Vec::new(),
            by_name: HashMap::new(),
            rules: HashMap::new(),
            default_rule,
        };
        registry.register(Self::DEFAULT_NAME);
        registry
    }

    #[inline]
    pub fn default_material(&self) -> MaterialId {
        MaterialId(0)
    }

    #[inline]
    pub fn default_rule(&self) -> ContactRule {
        self.default_rule
    }

    /// Registering an existing name returns its id.
    pub fn register(&mut self, name: &str) -> MaterialId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = MaterialId(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: MaterialId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Adds or replaces the rule for the unordered pair `{a, b}`.
    pub fn add_rule(&mut self, a: MaterialId, b: MaterialId, rule: ContactRule) -> Result<()> {
        rule.validate()?;
        for id in [a, b] {
            if self.name(id).is_none() {
                return Err(Error::config(format!("unknown material id {}", id.0)));
            }
        }
        self.rules.insert(pair_key(a, b), rule);
        Ok(())
    }

    /// Explicit rule for the pair, else the default rule. Symmetric.
    #[inline]
    pub fn resolve(&self, a: MaterialId, b: MaterialId) -> ContactRule {
        self.rules.get(&pair_key(a, b)).copied().unwrap_or(self.default_rule)
    }

    pub fn ids(&self) -> impl Iterator<Item = MaterialId> + '_ {
        (0..self.names.len() as u32).map(MaterialId)
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new(ContactRule::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MaterialRegistry {
        let mut registry = MaterialRegistry::default();
        let concrete = registry.register("concrete");
        let plastic = registry.register("plastic");
        let rubber = registry.register("rubber");
        registry.add_rule(concrete, plastic, ContactRule::new(0.1, 0.7)).unwrap();
        registry.add_rule(rubber, concrete, ContactRule::new(0.9, 0.95)).unwrap();
        registry
    }

    #[test]
    fn test_resolve_is_symmetric() {
        let registry = registry();
        for a in registry.ids() {
            for b in registry.ids() {
                assert_eq!(registry.resolve(a, b), registry.resolve(b, a));
            }
        }
    }

    #[test]
    fn test_falls_back_to_default_rule() {
        let mut registry = MaterialRegistry::new(ContactRule::new(0.3, 0.2));
        let ice = registry.register("ice");
        let default = registry.default_material();
        assert_eq!(registry.resolve(ice, default), ContactRule::new(0.3, 0.2));
        assert_eq!(registry.resolve(ice, ice), ContactRule::new(0.3, 0.2));
    }

    #[test]
    fn test_explicit_rule_wins() {
        let registry = registry();
        let rubber = registry.lookup("rubber").unwrap();
        let concrete = registry.lookup("concrete").unwrap();
        assert_eq!(registry.resolve(concrete, rubber), ContactRule::new(0.9, 0.95));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = MaterialRegistry::default();
        let a = registry.register("steel");
        let b = registry.register("steel");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("default"), Some(registry.default_material()));
    }

    #[test]
    fn test_rejects_bad_rules() {
        let mut registry = MaterialRegistry::default();
        let d = registry.default_material();
        assert!(registry.add_rule(d, d, ContactRule::new(-1.0, 0.5)).is_err());
        assert!(registry.add_rule(d, d, ContactRule::new(0.5, 1.5)).is_err());
        assert!(registry.add_rule(d, MaterialId(42), ContactRule::default()).is_err());
    }
}
