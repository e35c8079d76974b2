//! Rule-based labeling of decoded J1939 traffic.
//!
//! Every captured message starts out labeled [`NORMAL_LABEL`]. Rules loaded
//! from a YAML file then mark messages of interest as anomalous:
//!
//! - `rule`  (usage semantics): content/scope match on the message fields
//! - `irule` (temporal semantics): bursts with short inter-arrival times
//! - `crule` (state semantics): messages seen while a context signal,
//!   decoded from another PGN, satisfies a comparison
//!
//! When several rules fire on one message all of their names are kept, and
//! the highest-severity rule decides the label and provenance columns.
//!
//! # Examples
//!
//! ```yaml
//! rules:
//!   - name: tsc1_flood
//!     type: irule
//!     label: dos
//!     semantics: temporal
//!     interval_ms: 2
//!     threshold: 10
//!     moi: { pgn: 0 }
//!     metadata: { severity: high, layer: network }
//! ```

pub mod engine;
pub mod moi;
pub mod output;
pub mod rules;
pub mod summary;

#[cfg(test)]
mod tests;

pub use engine::{Hit, Labeler, RuleEvaluator};
pub use moi::MessageFilter;
pub use rules::{load_rules, parse_rules, Comparator, Rule, RuleKind};
pub use summary::Summary;

use crate::dataset::LayerSet;
use crate::error::{LabelError, Result};
use crate::network::j1939::J1939Message;
use crate::types::{CanId, Config, Frame, FrameData, Timestamp};

/// Label carried by messages no rule fired on
pub const NORMAL_LABEL: &str = "normal";

/// Label used when a firing rule does not name one
pub const DEFAULT_ANOMALY_LABEL: &str = "anomalous";

/// Severity levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Severity> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    /// Rank used to pick the primary rule; unknown severities rank lowest
    pub fn rank(s: &str) -> i8 {
        match Severity::parse(s) {
            Some(sev) => sev as i8,
            None => -1,
        }
    }
}

/// One message of the capture together with its labeling provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Timestamp,
    pub iface: String,
    pub can_id: CanId,
    pub data: FrameData,
    pub pgn: u32,
    pub priority: u8,
    pub destination: Option<u8>,
    pub source: u8,
    pub label: String,
    pub rule_name: String,
    pub rule_type: String,
    pub semantics: String,
    pub rule_severity: String,
    pub rule_layer: String,
    pub rule_description: String,
    pub context_pgn: Option<u32>,
    pub context_value: Option<f64>,
}

impl Record {
    pub fn from_message(can_id: CanId, msg: J1939Message) -> Self {
        Self {
            timestamp: msg.timestamp,
            iface: msg.interface,
            can_id,
            data: msg.data,
            pgn: msg.address.pgn,
            priority: msg.address.priority,
            destination: msg.address.destination,
            source: msg.address.source,
            label: NORMAL_LABEL.to_string(),
            rule_name: String::new(),
            rule_type: String::new(),
            semantics: String::new(),
            rule_severity: String::new(),
            rule_layer: String::new(),
            rule_description: String::new(),
            context_pgn: None,
            context_value: None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.label == NORMAL_LABEL
    }

    /// Names of every rule that fired on this record
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rule_name.split('|').filter(|n| !n.is_empty())
    }

    /// Payload as upper-case hex without separators
    pub fn data_hex(&self) -> String {
        self.data.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl From<Frame> for Record {
    fn from(frame: Frame) -> Self {
        let can_id = frame.id;
        Record::from_message(can_id, J1939Message::from(frame))
    }
}

/// Decodes captured frames into unlabeled records
pub fn records_from_frames(frames: Vec<Frame>) -> Vec<Record> {
    frames.into_iter().map(Record::from).collect()
}

/// Records that `rule` fired on `record`.
///
/// Rule names accumulate; the label and provenance columns follow the rule
/// with the highest severity, ties going to the later rule.
pub fn annotate(record: &mut Record, rule: &Rule, context_value: Option<f64>, default_label: &str) {
    if !record.rule_name.is_empty() {
        record.rule_name.push('|');
    }
    record.rule_name.push_str(&rule.name);

    let severity = rule.severity();
    if Severity::rank(&severity) >= Severity::rank(&record.rule_severity) {
        record.label = rule
            .label
            .clone()
            .unwrap_or_else(|| default_label.to_string());
        record.rule_type = rule.kind.type_name().to_string();
        record.semantics = rule.semantics.clone();
        record.rule_severity = severity;
        record.rule_layer = rule.metadata.layer.clone();
        record.rule_description = rule.metadata.description.clone();
    }

    if let Some(value) = context_value {
        record.context_value = Some(value);
        if let RuleKind::Context(params) = &rule.kind {
            record.context_pgn = Some(params.pgn);
        }
    }
}

/// Labeler settings
#[derive(Debug, Clone)]
pub struct LabelerConfig {
    /// Only rules of these layers are applied
    pub layers: LayerSet,
    pub default_label: String,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            layers: LayerSet::all(),
            default_label: DEFAULT_ANOMALY_LABEL.to_string(),
        }
    }
}

impl Config for LabelerConfig {
    fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(LabelError::InvalidParameter("no layers selected".into()));
        }
        if self.default_label.trim().is_empty() || self.default_label == NORMAL_LABEL {
            return Err(LabelError::InvalidParameter(format!(
                "default label '{}' is not usable for anomalies",
                self.default_label
            )));
        }
        Ok(())
    }
}
