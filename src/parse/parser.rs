use std::collections::HashMap;

use crate::RuleDefinition;

/// Rules and constants in declaration order, keyed by unique name.
///
/// The output of parsing (or of [`GrammarBuilder`](crate::GrammarBuilder)),
/// and the input to compilation.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<RuleDefinition>,
    index: HashMap<String, usize>,
}

impl RuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Returns it back if the name is already taken.
    pub fn insert(&mut self, rule: RuleDefinition) -> Result<(), RuleDefinition> {
        if self.index.contains_key(&rule.name) {
            return Err(rule);
        }
        self.index.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RuleDefinition> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn into_rules(self) -> Vec<RuleDefinition> {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantValue, RuleBody};

    fn constant(name: &str) -> RuleDefinition {
        RuleDefinition {
            name: name.into(),
            body: RuleBody::Constant(ConstantValue::Bool(true)),
        }
    }

    #[test]
    fn insert_keeps_declaration_order() {
        let mut table = RuleTable::new();
        table.insert(constant("b")).unwrap();
        table.insert(constant("a")).unwrap();
        let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(table.contains("a"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = RuleTable::new();
        table.insert(constant("a")).unwrap();
        let rejected = table.insert(constant("a")).unwrap_err();
        assert_eq!(rejected.name, "a");
        assert_eq!(table.len(), 1);
    }
}
