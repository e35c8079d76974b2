use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};

use super::moi::MessageFilter;
use super::rules::{load_rules, ContextParams, IntervalParams, Rule, RuleKind};
use super::{annotate, LabelerConfig, Record};
use crate::error::Result;
use crate::types::{CanId, Config, Timestamp};

/// A record a rule fired on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    /// Context signal value that made a state rule fire
    pub context_value: Option<f64>,
}

impl Hit {
    fn plain(index: usize) -> Self {
        Self {
            index,
            context_value: None,
        }
    }
}

/// Evaluation strategy of a rule type
pub trait RuleEvaluator {
    /// Returns the hits among `records`, ordered by record index
    fn evaluate(&self, moi: &MessageFilter, records: &[Record]) -> Vec<Hit>;
}

/// Content rule: every message of interest is a hit
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentMatch;

impl RuleEvaluator for ContentMatch {
    fn evaluate(&self, moi: &MessageFilter, records: &[Record]) -> Vec<Hit> {
        moi.select(records).into_iter().map(Hit::plain).collect()
    }
}

impl RuleEvaluator for IntervalParams {
    fn evaluate(&self, moi: &MessageFilter, records: &[Record]) -> Vec<Hit> {
        let mut groups: BTreeMap<CanId, Vec<usize>> = BTreeMap::new();
        for index in moi.select(records) {
            groups.entry(records[index].can_id).or_default().push(index);
        }

        let mut is_hit = vec![false; records.len()];
        for (_, mut indices) in groups {
            indices.sort_by(|a, b| records[*a].timestamp.total_cmp(&records[*b].timestamp));

            // Current window is indices[start..=pos]
            let mut start = 0;
            for pos in 1..indices.len() {
                let gap = records[indices[pos]].timestamp - records[indices[pos - 1]].timestamp;
                if gap > self.interval {
                    start = pos;
                    continue;
                }
                let len = pos - start + 1;
                if len == self.threshold.max(2) {
                    for &index in &indices[start..=pos] {
                        is_hit[index] = true;
                    }
                } else if len > self.threshold {
                    is_hit[indices[pos]] = true;
                }
            }
        }

        is_hit
            .iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .map(|(index, _)| Hit::plain(index))
            .collect()
    }
}

impl ContextParams {
    /// Little-endian field value scaled to engineering units.
    ///
    /// Bytes past the end of the payload are absent, so a truncated field
    /// decodes from the bytes present and a missing one decodes as 0.
    pub fn decode(&self, data: &[u8]) -> f64 {
        let bytes = data.get(self.offset..).unwrap_or(&[]);
        let raw = bytes
            .iter()
            .take(self.length)
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        raw as f64 * self.scale
    }

    /// Context values sorted by time; for equal timestamps the later record wins
    fn timeline(&self, records: &[Record]) -> Vec<(Timestamp, f64)> {
        let mut values: Vec<(Timestamp, f64)> = records
            .iter()
            .filter(|r| r.pgn == self.pgn && self.sa.map_or(true, |sa| r.source == sa))
            .map(|r| (r.timestamp, self.decode(&r.data)))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut timeline: Vec<(Timestamp, f64)> = Vec::with_capacity(values.len());
        for (ts, value) in values {
            match timeline.last_mut() {
                Some(last) if last.0 == ts => last.1 = value,
                _ => timeline.push((ts, value)),
            }
        }
        timeline
    }
}

impl RuleEvaluator for ContextParams {
    fn evaluate(&self, moi: &MessageFilter, records: &[Record]) -> Vec<Hit> {
        let timeline = self.timeline(records);
        if timeline.is_empty() {
            info!("No context values found for PGN {}", self.pgn);
            return Vec::new();
        }

        moi.select(records)
            .into_iter()
            .filter_map(|index| {
                let ts = records[index].timestamp;
                let at_or_before = timeline.partition_point(|(t, _)| *t <= ts);
                let (_, value) = *timeline.get(at_or_before.checked_sub(1)?)?;
                self.comparator
                    .compare(value, self.threshold)
                    .then_some(Hit {
                        index,
                        context_value: Some(value),
                    })
            })
            .collect()
    }
}

impl Rule {
    pub fn evaluate(&self, records: &[Record]) -> Vec<Hit> {
        match &self.kind {
            RuleKind::Content => ContentMatch.evaluate(&self.moi, records),
            RuleKind::Interval(params) => params.evaluate(&self.moi, records),
            RuleKind::Context(params) => params.evaluate(&self.moi, records),
        }
    }
}

/// Applies an ordered rule set to decoded records
#[derive(Debug, Clone)]
pub struct Labeler {
    config: LabelerConfig,
    rules: Vec<Rule>,
}

impl Labeler {
    pub fn new(config: LabelerConfig, rules: Vec<Rule>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rules })
    }

    pub fn from_rules_file<P: AsRef<Path>>(config: LabelerConfig, path: P) -> Result<Self> {
        let rules = load_rules(path)?;
        Self::new(config, rules)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn config(&self) -> &LabelerConfig {
        &self.config
    }

    /// Rules outside the selected layers are skipped; rules without a known
    /// layer only run when every layer is selected.
    fn is_selected(&self, rule: &Rule) -> bool {
        match rule.layer() {
            Some(layer) => self.config.layers.includes(layer),
            None => self.config.layers.is_all(),
        }
    }

    /// Runs every selected rule in order and returns the number of annotations made
    pub fn apply(&self, records: &mut [Record]) -> usize {
        let mut annotations = 0;
        for rule in &self.rules {
            if !self.is_selected(rule) {
                debug!(
                    "Skipping rule {} (layer '{}' not selected)",
                    rule.name, rule.metadata.layer
                );
                continue;
            }

            info!("Applying rule: {} ({})", rule.name, rule.kind.type_name());
            let hits = rule.evaluate(records);
            debug!("Rule {} fired on {} messages", rule.name, hits.len());

            for hit in &hits {
                annotate(
                    &mut records[hit.index],
                    rule,
                    hit.context_value,
                    &self.config.default_label,
                );
            }
            annotations += hits.len();
        }
        annotations
    }
}
