//! Pattern filter
//!
//! Static deny-list scanner applied to untrusted source before execution.
//!
//! Matching is substring/regex based, not AST based: it cannot tell
//! `import os` inside a string literal from the executable statement, and
//! it cannot catch dynamically constructed calls. That limitation is part
//! of the behavioral contract; the filter is a fast-reject heuristic, not
//! the security boundary. The rlimit layer in [`crate::exec`] sits beneath
//! it, and anything stronger (namespaces, seccomp) must be layered below.

pub mod rules;

pub use rules::{default_rules, DenyPattern, DenyRule};

use crate::config::types::Result;
use rules::CompiledRule;

/// Outcome of one filter scan.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Pass,
    Reject {
        /// Human-readable reason naming the blocked construct
        reason: String,
        /// The pattern text that matched
        pattern: String,
    },
}

impl FilterDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, FilterDecision::Pass)
    }
}

/// Deny-list scanner. Holds an immutable, injected rule set; `check` is a
/// pure function of (source, rules).
#[derive(Debug, Clone)]
pub struct PatternFilter {
    rules: Vec<CompiledRule>,
}

impl PatternFilter {
    /// Build a filter from an explicit rule set. Regex rules are compiled
    /// here so a bad pattern fails at startup, not per request.
    pub fn new(rules: Vec<DenyRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Filter with the built-in deny set.
    pub fn with_defaults() -> Self {
        // The built-in set contains no regex rules; compilation cannot fail.
        Self::new(default_rules()).expect("built-in deny rules must compile")
    }

    pub fn rules(&self) -> impl Iterator<Item = &DenyRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Scan source against the rule set. First match in declaration order
    /// wins; the scan short-circuits on it.
    pub fn check(&self, source: &str) -> FilterDecision {
        let lowered = source.to_lowercase();
        for compiled in &self.rules {
            if compiled.matches(&lowered) {
                return FilterDecision::Reject {
                    reason: compiled.rule.reason.clone(),
                    pattern: compiled.rule.pattern_text().to_string(),
                };
            }
        }
        FilterDecision::Pass
    }
}
