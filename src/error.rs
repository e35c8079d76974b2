use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    // Input errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    // Rule file errors
    #[error("rule file error: {0}")]
    Rules(#[from] serde_yaml::Error),
    #[error("invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    // Output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Generic errors
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl LabelError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        LabelError::Parse {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_rule(name: &str, reason: impl Into<String>) -> Self {
        LabelError::InvalidRule {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;
