//! Whitelist rule definitions and loading.

use std::path::Path;

use regex::bytes::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading the rule list.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read whitelist {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse whitelist: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("whitelist rule has an empty header name")]
    EmptyName,

    #[error("invalid value pattern for header {name:?}: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// One entry of the whitelist file as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Header field name.
    #[serde(alias = "Key", alias = "key", alias = "Name")]
    pub name: String,

    /// Regular expression the header value must match; empty means any value.
    #[serde(default, alias = "Val", alias = "val", alias = "Value")]
    pub value: Option<String>,
}

/// A compiled whitelist rule.
#[derive(Debug, Clone)]
pub struct WhitelistRule {
    name: String,
    pattern: Option<Regex>,
}

impl WhitelistRule {
    /// Compiles a rule, anchoring the value pattern between the field name
    /// and the header colon/space grammar.
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Result<Self, RuleError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RuleError::EmptyName);
        }

        let pattern = match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                let source = format!(
                    r"^(?i:{}):[\t ]?(?:{})[\t ]?$",
                    regex::escape(&name),
                    value
                );
                let regex = Regex::new(&source).map_err(|source| RuleError::Pattern {
                    name: name.clone(),
                    source,
                })?;
                Some(regex)
            }
            None => None,
        };
        Ok(Self { name, pattern })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `line` (a syntactically valid header line) satisfies this rule.
    pub fn matches(&self, line: &[u8]) -> bool {
        let name_matches = crate::http::headers::field_name(line)
            .is_some_and(|n| n.eq_ignore_ascii_case(self.name.as_bytes()));
        if !name_matches {
            return false;
        }
        match &self.pattern {
            Some(pattern) => pattern.is_match(line),
            None => true,
        }
    }
}

impl TryFrom<RuleConfig> for WhitelistRule {
    type Error = RuleError;

    fn try_from(config: RuleConfig) -> Result<Self, Self::Error> {
        WhitelistRule::new(config.name, config.value.as_deref())
    }
}

/// Parses and compiles a JSON rule list.
pub fn parse_rules(json: &str) -> Result<Vec<WhitelistRule>, RuleError> {
    let configs: Vec<RuleConfig> = serde_json::from_str(json)?;
    configs.into_iter().map(WhitelistRule::try_from).collect()
}

/// Loads and compiles the rule list from a JSON file.
pub fn load_rules(path: &Path) -> Result<Vec<WhitelistRule>, RuleError> {
    let content = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_rules(&content)
}
