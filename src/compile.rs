use std::collections::HashMap;

use crate::parse::RuleTable;
use crate::types::{
    CompiledAlternative, CompiledBody, CompiledRule, CompiledSegment, CompiledSlot, Target,
};
use crate::{
    Alternative, CompileError, CompileOptions, CompiledGrammar, ConstantValue, RuleBody,
    RuleDefinition, RuleHandle, ScalarKind, Segment, UnresolvedReference,
};

pub(crate) fn compile(
    table: RuleTable,
    options: &CompileOptions,
) -> Result<CompiledGrammar, CompileError> {
    let rules = table.into_rules();
    check_alternatives(&rules)?;

    let rule_indices: HashMap<String, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), i))
        .collect();

    let constants = ConstantResolver::new(&rules, &rule_indices).resolve_all()?;

    let mut unresolved = Vec::new();
    let mut compiled = Vec::with_capacity(rules.len());
    for (rule, constant) in rules.iter().zip(constants) {
        let body = match (&rule.body, constant) {
            (_, Some(text)) => CompiledBody::Constant(text),
            (RuleBody::Alternatives(alts), None) => CompiledBody::Alternatives(
                alts.iter()
                    .map(|alt| {
                        compile_alternative(alt, &rule.name, &rule_indices, options, &mut unresolved)
                    })
                    .collect::<Result<_, _>>()?,
            ),
            (RuleBody::Constant(_), None) => CompiledBody::Constant(String::new()),
        };
        compiled.push(CompiledRule {
            name: rule.name.clone(),
            body,
        });
    }

    if !unresolved.is_empty() {
        return Err(CompileError::UnresolvedRuleReference {
            references: unresolved,
        });
    }

    let recursive = find_recursive(&compiled);
    tracing::debug!(
        rules = compiled.len(),
        recursive = recursive.iter().filter(|r| **r).count(),
        "compiled grammar"
    );

    Ok(CompiledGrammar {
        rules: compiled,
        rule_indices,
        recursive,
    })
}

fn check_alternatives(rules: &[RuleDefinition]) -> Result<(), CompileError> {
    for rule in rules {
        if let RuleBody::Alternatives(alts) = &rule.body
            && alts.is_empty()
        {
            return Err(CompileError::EmptyRule {
                name: rule.name.clone(),
            });
        }
    }
    Ok(())
}

fn compile_alternative(
    alt: &Alternative,
    rule_name: &str,
    rule_indices: &HashMap<String, usize>,
    options: &CompileOptions,
    unresolved: &mut Vec<UnresolvedReference>,
) -> Result<CompiledAlternative, CompileError> {
    let mut segments: Vec<CompiledSegment> = Vec::with_capacity(alt.segments.len());
    for segment in &alt.segments {
        match segment {
            Segment::Literal(text) if text.is_empty() => {}
            Segment::Literal(text) => {
                if let Some(CompiledSegment::Literal(prev)) = segments.last_mut() {
                    prev.push_str(text);
                } else {
                    segments.push(CompiledSegment::Literal(text.clone()));
                }
            }
            Segment::Placeholder(p) => {
                // Rule names shadow primitive kinds.
                let target = if let Some(&idx) = rule_indices.get(&p.target) {
                    Target::Rule(RuleHandle(idx))
                } else if let Some(kind) = ScalarKind::inline(&p.target) {
                    Target::Primitive(kind.map_err(|source| CompileError::InvalidRegex {
                        rule: rule_name.to_owned(),
                        pattern: p.target.clone(),
                        source,
                    })?)
                } else if let Some(kind) = options.primitive(&p.target) {
                    Target::Primitive(kind.clone())
                } else {
                    unresolved.push(UnresolvedReference {
                        rule: rule_name.to_owned(),
                        placeholder: p.name.clone().unwrap_or_else(|| format!("<{}>", p.target)),
                        target: p.target.clone(),
                    });
                    continue;
                };
                segments.push(CompiledSegment::Slot(CompiledSlot {
                    name: p.name.clone(),
                    target,
                    modifier: p.modifier.clone(),
                }));
            }
        }
    }
    Ok(CompiledAlternative { segments })
}

// -- Constants --------------------------------------------------------------

/// Resolves `define` values to text, following references between constants.
///
/// References are followed with an explicit stack, so long chains of
/// `define` references cannot exhaust the native stack.
struct ConstantResolver<'a> {
    rules: &'a [RuleDefinition],
    rule_indices: &'a HashMap<String, usize>,
    resolved: Vec<Option<String>>,
    in_stack: Vec<bool>,
    stack: Vec<usize>,
}

impl<'a> ConstantResolver<'a> {
    fn new(rules: &'a [RuleDefinition], rule_indices: &'a HashMap<String, usize>) -> Self {
        Self {
            rules,
            rule_indices,
            resolved: vec![None; rules.len()],
            in_stack: vec![false; rules.len()],
            stack: Vec::new(),
        }
    }

    /// One entry per rule: `Some(text)` for constants, `None` otherwise.
    fn resolve_all(mut self) -> Result<Vec<Option<String>>, CompileError> {
        let rules = self.rules;
        for (i, rule) in rules.iter().enumerate() {
            if rule.is_constant() {
                self.resolve(i)?;
            }
        }
        Ok(self.resolved)
    }

    fn resolve(&mut self, root: usize) -> Result<(), CompileError> {
        if self.resolved[root].is_some() {
            return Ok(());
        }
        let rules = self.rules;
        self.push(root);
        while let Some(&idx) = self.stack.last() {
            let RuleBody::Constant(value) = &rules[idx].body else {
                self.finish(idx, String::new());
                continue;
            };
            match self.pending_ref(value, &rules[idx].name)? {
                Some(dep) if self.in_stack[dep] => {
                    let pos = self.stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut path: Vec<String> = self.stack[pos..]
                        .iter()
                        .map(|&n| rules[n].name.clone())
                        .collect();
                    path.push(rules[dep].name.clone());
                    return Err(CompileError::CyclicConstant { path });
                }
                Some(dep) => self.push(dep),
                None => {
                    let text = self.value_text(value);
                    self.finish(idx, text);
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, idx: usize) {
        self.in_stack[idx] = true;
        self.stack.push(idx);
    }

    fn finish(&mut self, idx: usize, text: String) {
        self.stack.pop();
        self.in_stack[idx] = false;
        self.resolved[idx] = Some(text);
    }

    /// The first constant referenced by `value` that is not resolved yet.
    fn pending_ref(
        &self,
        value: &ConstantValue,
        owner: &str,
    ) -> Result<Option<usize>, CompileError> {
        match value {
            ConstantValue::List(items) => {
                for item in items {
                    if let Some(dep) = self.pending_ref(item, owner)? {
                        return Ok(Some(dep));
                    }
                }
                Ok(None)
            }
            ConstantValue::Ref(name) => match self.rule_indices.get(name) {
                Some(&idx) if self.rules[idx].is_constant() => {
                    Ok(self.resolved[idx].is_none().then_some(idx))
                }
                _ => Err(CompileError::UndefinedConstant {
                    constant: owner.to_owned(),
                    reference: name.clone(),
                }),
            },
            _ => Ok(None),
        }
    }

    /// Text of a value whose references are all resolved.
    fn value_text(&self, value: &ConstantValue) -> String {
        match value {
            ConstantValue::Char(c) => c.to_string(),
            ConstantValue::String(s) | ConstantValue::Int(s) | ConstantValue::Float(s) => s.clone(),
            ConstantValue::Bool(b) => b.to_string(),
            ConstantValue::List(items) => items
                .iter()
                .map(|item| self.value_text(item))
                .collect::<Vec<_>>()
                .join(", "),
            ConstantValue::Ref(name) => self
                .rule_indices
                .get(name)
                .and_then(|&idx| self.resolved[idx].clone())
                .unwrap_or_default(),
        }
    }
}

// -- Recursion analysis -----------------------------------------------------

pub(crate) fn rule_refs(rule: &CompiledRule) -> Vec<usize> {
    let mut refs = Vec::new();
    if let CompiledBody::Alternatives(alts) = &rule.body {
        for alt in alts {
            for segment in &alt.segments {
                if let CompiledSegment::Slot(CompiledSlot {
                    target: Target::Rule(handle),
                    ..
                }) = segment
                    && !refs.contains(&handle.0)
                {
                    refs.push(handle.0);
                }
            }
        }
    }
    refs
}

/// Marks every rule that can reach itself through placeholder references.
/// Recursive rules are valid; this only reports them.
pub(crate) fn find_recursive(rules: &[CompiledRule]) -> Vec<bool> {
    let adj: Vec<Vec<usize>> = rules.iter().map(rule_refs).collect();
    (0..rules.len())
        .map(|start| {
            if adj[start].is_empty() {
                return false;
            }
            let mut seen = vec![false; rules.len()];
            let mut stack: Vec<usize> = adj[start].clone();
            while let Some(node) = stack.pop() {
                if node == start {
                    return true;
                }
                if !seen[node] {
                    seen[node] = true;
                    stack.extend(&adj[node]);
                }
            }
            false
        })
        .collect()
}
