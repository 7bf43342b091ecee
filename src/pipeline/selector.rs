//! Hierarchy selection
//!
//! The selector maps an operation context to one registered hierarchy
//! through an ordered table of declarative rules. Rules are evaluated in
//! registration order and the first match wins; when nothing matches the
//! default hierarchy is used. Selection is a pure function of the context
//! and the rule table.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::Context;
use super::errors::{PipelineError, PipelineResult};
use super::hierarchy::Hierarchy;

/// Declarative predicate over context attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    /// Matches every context
    Always,
    /// Operation type equals the value
    OperationIs(String),
    /// Actor role equals the value
    RoleIs(String),
    /// Actor role is one of the values
    RoleIn(Vec<String>),
    /// Resource identifier matches the regular expression
    ResourceMatches(String),
    /// Named parameter equals the value
    ParamEquals { key: String, value: Value },
    /// Named parameter is present
    ParamPresent(String),
    /// Every condition matches
    All(Vec<RuleCondition>),
    /// At least one condition matches
    Any(Vec<RuleCondition>),
    /// The condition does not match
    Not(Box<RuleCondition>),
}

impl RuleCondition {
    /// Compile regular expressions once, at configuration time
    fn compile(&self) -> Result<CompiledCondition, regex::Error> {
        Ok(match self {
            RuleCondition::Always => CompiledCondition::Always,
            RuleCondition::OperationIs(op) => CompiledCondition::OperationIs(op.clone()),
            RuleCondition::RoleIs(role) => CompiledCondition::RoleIs(role.clone()),
            RuleCondition::RoleIn(roles) => CompiledCondition::RoleIn(roles.clone()),
            RuleCondition::ResourceMatches(pattern) => {
                CompiledCondition::ResourceMatches(Regex::new(pattern)?)
            }
            RuleCondition::ParamEquals { key, value } => CompiledCondition::ParamEquals {
                key: key.clone(),
                value: value.clone(),
            },
            RuleCondition::ParamPresent(key) => CompiledCondition::ParamPresent(key.clone()),
            RuleCondition::All(conditions) => CompiledCondition::All(
                conditions
                    .iter()
                    .map(RuleCondition::compile)
                    .collect::<Result<_, _>>()?,
            ),
            RuleCondition::Any(conditions) => CompiledCondition::Any(
                conditions
                    .iter()
                    .map(RuleCondition::compile)
                    .collect::<Result<_, _>>()?,
            ),
            RuleCondition::Not(inner) => CompiledCondition::Not(Box::new(inner.compile()?)),
        })
    }
}

#[derive(Debug, Clone)]
enum CompiledCondition {
    Always,
    OperationIs(String),
    RoleIs(String),
    RoleIn(Vec<String>),
    ResourceMatches(Regex),
    ParamEquals { key: String, value: Value },
    ParamPresent(String),
    All(Vec<CompiledCondition>),
    Any(Vec<CompiledCondition>),
    Not(Box<CompiledCondition>),
}

impl CompiledCondition {
    fn matches(&self, ctx: &Context) -> bool {
        match self {
            CompiledCondition::Always => true,
            CompiledCondition::OperationIs(op) => ctx.operation_type == *op,
            CompiledCondition::RoleIs(role) => ctx.actor_role == *role,
            CompiledCondition::RoleIn(roles) => roles.iter().any(|r| *r == ctx.actor_role),
            CompiledCondition::ResourceMatches(re) => re.is_match(&ctx.resource),
            CompiledCondition::ParamEquals { key, value } => ctx.param(key) == Some(value),
            CompiledCondition::ParamPresent(key) => ctx.param(key).is_some(),
            CompiledCondition::All(conditions) => conditions.iter().all(|c| c.matches(ctx)),
            CompiledCondition::Any(conditions) => conditions.iter().any(|c| c.matches(ctx)),
            CompiledCondition::Not(inner) => !inner.matches(ctx),
        }
    }
}

/// Registered hierarchies by name.
///
/// The set of names is fixed once built. Each slot holds an immutable
/// hierarchy that can only be replaced as a whole; readers clone the `Arc`
/// and never observe a partially updated value.
///
/// The per-slot lock only guards the pointer swap and is held just long
/// enough to clone the `Arc`. Evaluation runs on the cloned value without
/// any lock.
#[derive(Debug, Default)]
pub struct HierarchyTable {
    slots: HashMap<String, RwLock<Arc<Hierarchy>>>,
}

impl HierarchyTable {
    pub fn new(hierarchies: Vec<Hierarchy>) -> PipelineResult<Self> {
        let mut slots = HashMap::with_capacity(hierarchies.len());
        for hierarchy in hierarchies {
            let name = hierarchy.name().to_string();
            if slots.contains_key(&name) {
                return Err(PipelineError::DuplicateHierarchy(name));
            }
            slots.insert(name, RwLock::new(Arc::new(hierarchy)));
        }
        Ok(Self { slots })
    }

    /// Current value of a hierarchy
    pub fn get(&self, name: &str) -> Option<Arc<Hierarchy>> {
        self.slots.get(name).map(|slot| {
            let current = slot.read().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&current)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Swap in a new value for an already registered hierarchy.
    ///
    /// Returns the value it replaced.
    pub fn replace(&self, hierarchy: Hierarchy) -> PipelineResult<Arc<Hierarchy>> {
        let slot = self
            .slots
            .get(hierarchy.name())
            .ok_or_else(|| PipelineError::UnknownHierarchy(hierarchy.name().to_string()))?;

        let mut current = slot.write().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::replace(&mut *current, Arc::new(hierarchy)))
    }
}

/// A single selector rule
#[derive(Debug, Clone)]
pub struct SelectorRule {
    hierarchy: String,
    condition: RuleCondition,
    compiled: CompiledCondition,
}

impl SelectorRule {
    pub fn hierarchy(&self) -> &str {
        &self.hierarchy
    }

    pub fn condition(&self) -> &RuleCondition {
        &self.condition
    }
}

/// Maps contexts to registered hierarchies
#[derive(Debug)]
pub struct Selector {
    rules: Vec<SelectorRule>,
    default: Option<String>,
    table: Arc<HierarchyTable>,
}

impl Selector {
    /// Create a selector with no rules and no default
    pub fn new(table: Arc<HierarchyTable>) -> Self {
        Self {
            rules: Vec::new(),
            default: None,
            table,
        }
    }

    /// Append a rule; earlier rules take precedence
    pub fn add_rule(
        &mut self,
        hierarchy: impl Into<String>,
        condition: RuleCondition,
    ) -> PipelineResult<()> {
        let hierarchy = hierarchy.into();
        if !self.table.contains(&hierarchy) {
            return Err(PipelineError::UnknownHierarchy(hierarchy));
        }

        let compiled = condition.compile().map_err(|e| PipelineError::InvalidRule {
            hierarchy: hierarchy.clone(),
            reason: e.to_string(),
        })?;

        self.rules.push(SelectorRule {
            hierarchy,
            condition,
            compiled,
        });
        Ok(())
    }

    /// Designate the fallback hierarchy
    pub fn set_default(&mut self, hierarchy: impl Into<String>) -> PipelineResult<()> {
        let hierarchy = hierarchy.into();
        if !self.table.contains(&hierarchy) {
            return Err(PipelineError::UnknownHierarchy(hierarchy));
        }
        self.default = Some(hierarchy);
        Ok(())
    }

    pub fn default_hierarchy(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn rules(&self) -> &[SelectorRule] {
        &self.rules
    }

    pub fn table(&self) -> &Arc<HierarchyTable> {
        &self.table
    }

    /// Name of the hierarchy selected for `ctx`
    pub fn select_name(&self, ctx: &Context) -> PipelineResult<&str> {
        self.rules
            .iter()
            .find(|rule| rule.compiled.matches(ctx))
            .map(|rule| rule.hierarchy.as_str())
            .or(self.default.as_deref())
            .ok_or(PipelineError::NoHierarchySelected)
    }

    /// Hierarchy selected for `ctx`
    pub fn select(&self, ctx: &Context) -> PipelineResult<Arc<Hierarchy>> {
        let name = self.select_name(ctx)?;
        self.table
            .get(name)
            .ok_or_else(|| PipelineError::UnknownHierarchy(name.to_string()))
    }
}
