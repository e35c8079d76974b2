use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use serde::Deserialize;

use super::moi::MessageFilter;
use crate::dataset::Layer;
use crate::error::{LabelError, Result};
use crate::types::Config;

const DEFAULT_INTERVAL_MS: f64 = 1.0;
const DEFAULT_THRESHOLD: usize = 5;
const UNNAMED_RULE: &str = "<unnamed>";

/// Relational operator of a context rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Comparator {
    #[default]
    Greater,
    Less,
    Equal,
    GreaterOrEqual,
    LessOrEqual,
}

impl Comparator {
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Greater => value > threshold,
            Comparator::Less => value < threshold,
            Comparator::Equal => value == threshold,
            Comparator::GreaterOrEqual => value >= threshold,
            Comparator::LessOrEqual => value <= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::Equal => "==",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
        }
    }
}

impl FromStr for Comparator {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Comparator::Greater),
            "<" => Ok(Comparator::Less),
            "==" => Ok(Comparator::Equal),
            ">=" => Ok(Comparator::GreaterOrEqual),
            "<=" => Ok(Comparator::LessOrEqual),
            other => Err(LabelError::InvalidParameter(format!(
                "unknown comparator '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Comparator {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata attached to a rule
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleMetadata {
    pub severity: String,
    pub layer: String,
    pub description: String,
}

/// Parameters of a burst-detection rule
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalParams {
    /// Maximum inter-arrival gap, in seconds
    pub interval: f64,
    pub threshold: usize,
}

impl Config for IntervalParams {
    fn validate(&self) -> Result<()> {
        if !self.interval.is_finite() || self.interval <= 0.0 {
            return Err(LabelError::InvalidParameter(
                "interval_ms must be positive".into(),
            ));
        }
        if self.threshold == 0 {
            return Err(LabelError::InvalidParameter(
                "threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters of a context (state) rule
#[derive(Debug, Clone, PartialEq)]
pub struct ContextParams {
    pub pgn: u32,
    pub sa: Option<u8>,
    pub offset: usize,
    pub length: usize,
    pub scale: f64,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Config for ContextParams {
    fn validate(&self) -> Result<()> {
        if self.length == 0 || self.length > 8 {
            return Err(LabelError::InvalidParameter(
                "context length must be between 1 and 8 bytes".into(),
            ));
        }
        if !self.scale.is_finite() || !self.threshold.is_finite() {
            return Err(LabelError::InvalidParameter(
                "context scale and threshold must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// `rule`: every message of interest is labeled
    Content,
    /// `irule`: bursts of messages with short inter-arrival times
    Interval(IntervalParams),
    /// `crule`: messages seen while a context signal satisfies a condition
    Context(ContextParams),
}

impl RuleKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Content => "rule",
            RuleKind::Interval(_) => "irule",
            RuleKind::Context(_) => "crule",
        }
    }
}

/// A validated labeling rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub label: Option<String>,
    pub semantics: String,
    pub metadata: RuleMetadata,
    pub moi: MessageFilter,
    pub kind: RuleKind,
}

impl Rule {
    /// Layer declared in the metadata, if it names a known one
    pub fn layer(&self) -> Option<Layer> {
        self.metadata.layer.parse().ok()
    }

    /// Lower-cased severity
    pub fn severity(&self) -> String {
        self.metadata.severity.trim().to_ascii_lowercase()
    }
}

impl Config for Rule {
    fn validate(&self) -> Result<()> {
        let result = match &self.kind {
            RuleKind::Content => Ok(()),
            RuleKind::Interval(params) => params.validate(),
            RuleKind::Context(params) => params.validate(),
        };
        result.map_err(|e| match e {
            LabelError::InvalidParameter(reason) => LabelError::invalid_rule(&self.name, reason),
            other => other,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Option<Vec<RuleSpec>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextSpec {
    pgn: Option<u32>,
    sa: Option<u8>,
    offset: Option<usize>,
    length: Option<usize>,
    scale: Option<f64>,
    comparator: Option<Comparator>,
    threshold: Option<f64>,
}

// Rule as written in YAML, before the type-specific fields are checked
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuleSpec {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    label: Option<String>,
    semantics: Option<String>,
    metadata: Option<RuleMetadata>,
    moi: Option<MessageFilter>,
    interval_ms: Option<f64>,
    threshold: Option<usize>,
    context: Option<ContextSpec>,
}

impl RuleSpec {
    /// Returns `Ok(None)` for rules that are skipped with a warning
    fn into_rule(self) -> Result<Option<Rule>> {
        let name = self.name.unwrap_or_else(|| UNNAMED_RULE.to_string());
        let kind_name = self.kind.unwrap_or_default();
        let moi = self.moi.unwrap_or_default();

        let kind = match kind_name.as_str() {
            "rule" => RuleKind::Content,
            "irule" => RuleKind::Interval(IntervalParams {
                interval: self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS) / 1000.0,
                threshold: self.threshold.unwrap_or(DEFAULT_THRESHOLD),
            }),
            "crule" => {
                let ctx = self.context.unwrap_or_default();
                let pgn = match (moi.pgn, ctx.pgn) {
                    (Some(_), Some(pgn)) => pgn,
                    _ => {
                        warn!(
                            "Skipping context rule '{}': moi.pgn and context.pgn are required",
                            name
                        );
                        return Ok(None);
                    }
                };
                RuleKind::Context(ContextParams {
                    pgn,
                    sa: ctx.sa,
                    offset: ctx.offset.unwrap_or(0),
                    length: ctx.length.unwrap_or(1),
                    scale: ctx.scale.unwrap_or(1.0),
                    comparator: ctx.comparator.unwrap_or_default(),
                    threshold: ctx.threshold.unwrap_or(0.0),
                })
            }
            other => {
                warn!("Unknown rule type '{}' in rule '{}'", other, name);
                return Ok(None);
            }
        };

        let rule = Rule {
            name,
            label: self.label,
            semantics: self.semantics.unwrap_or_default().trim().to_string(),
            metadata: self.metadata.unwrap_or_default(),
            moi,
            kind,
        };
        rule.validate()?;
        Ok(Some(rule))
    }
}

/// Parses a YAML rule document. An empty document holds no rules.
pub fn parse_rules(yaml: &str) -> Result<Vec<Rule>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: Option<RuleFile> = serde_yaml::from_str(yaml)?;
    let specs = file.and_then(|f| f.rules).unwrap_or_default();

    let mut rules = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(rule) = spec.into_rule()? {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// Loads rules from a YAML file
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<Rule>> {
    let text = fs::read_to_string(path)?;
    parse_rules(&text)
}
