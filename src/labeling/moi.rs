use serde::Deserialize;

use super::Record;

/// Message-of-interest filter. Every key that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub pgn: Option<u32>,
    pub sa: Option<u8>,
    /// Never matches broadcast (PDU2) messages
    pub da: Option<u8>,
    pub priority_min: Option<u8>,
    pub priority_max: Option<u8>,
}

impl MessageFilter {
    pub fn is_empty(&self) -> bool {
        *self == MessageFilter::default()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(pgn) = self.pgn {
            if record.pgn != pgn {
                return false;
            }
        }
        if let Some(sa) = self.sa {
            if record.source != sa {
                return false;
            }
        }
        if let Some(da) = self.da {
            if record.destination != Some(da) {
                return false;
            }
        }
        if let Some(min) = self.priority_min {
            if record.priority < min {
                return false;
            }
        }
        if let Some(max) = self.priority_max {
            if record.priority > max {
                return false;
            }
        }
        true
    }

    /// Indices of the matching records, in log order
    pub fn select(&self, records: &[Record]) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.matches(r))
            .map(|(i, _)| i)
            .collect()
    }
}
