use crate::config::types::{Result, SandboxError};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One matchable deny pattern: a literal substring or an anchored regex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DenyPattern {
    /// Case-insensitive substring match (pattern stored lower-case)
    Literal(String),
    /// Regular expression, matched against the lower-cased source
    Regex(String),
}

/// A single blocked pattern with a human-readable rejection reason.
///
/// The rule set is static: loaded once at startup, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenyRule {
    pub pattern: DenyPattern,
    pub reason: String,
}

impl DenyRule {
    pub fn literal(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: DenyPattern::Literal(pattern.to_lowercase()),
            reason: reason.to_string(),
        }
    }

    pub fn regex(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: DenyPattern::Regex(pattern.to_string()),
            reason: reason.to_string(),
        }
    }

    /// Display form of the matched pattern for rejection messages.
    pub fn pattern_text(&self) -> &str {
        match &self.pattern {
            DenyPattern::Literal(s) => s,
            DenyPattern::Regex(s) => s,
        }
    }
}

/// A deny rule with its regex (if any) pre-compiled at filter construction.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub rule: DenyRule,
    pub regex: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: DenyRule) -> Result<Self> {
        let regex = match &rule.pattern {
            DenyPattern::Literal(_) => None,
            DenyPattern::Regex(pattern) => Some(Regex::new(pattern).map_err(|e| {
                SandboxError::DenyRule(format!("invalid regex '{}': {}", pattern, e))
            })?),
        };
        Ok(Self { rule, regex })
    }

    /// Match against the already lower-cased source.
    pub fn matches(&self, lowered: &str) -> bool {
        match (&self.rule.pattern, &self.regex) {
            (DenyPattern::Literal(needle), _) => lowered.contains(needle.as_str()),
            (DenyPattern::Regex(_), Some(re)) => re.is_match(lowered),
            (DenyPattern::Regex(_), None) => false,
        }
    }
}

/// Built-in deny set. Covers process/OS interaction, dynamic evaluation,
/// filesystem access, interactive input, and raw network primitives.
pub fn default_rules() -> Vec<DenyRule> {
    vec![
        DenyRule::literal("import os", "process/OS interaction"),
        DenyRule::literal("import subprocess", "process/OS interaction"),
        DenyRule::literal("import sys", "process/OS interaction"),
        DenyRule::literal("__import__", "dynamic import"),
        DenyRule::literal("eval(", "dynamic code evaluation"),
        DenyRule::literal("exec(", "dynamic code evaluation"),
        DenyRule::literal("compile(", "dynamic code evaluation"),
        DenyRule::literal("open(", "filesystem access"),
        DenyRule::literal("file(", "filesystem access"),
        DenyRule::literal("input(", "interactive input"),
        DenyRule::literal("raw_input(", "interactive input"),
        DenyRule::literal("socket", "network access"),
        DenyRule::literal("urllib", "network access"),
        DenyRule::literal("requests", "network access"),
        DenyRule::literal("http", "network access"),
        DenyRule::literal("rm -rf", "shell command"),
        DenyRule::literal("sudo", "shell command"),
        DenyRule::literal("chmod", "shell command"),
        DenyRule::literal("chown", "shell command"),
    ]
}
