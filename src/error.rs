// Metrologist Error Types

use thiserror::Error;

use crate::config::MetricKind;

#[derive(Error, Debug)]
pub enum MetrologistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine exited with {}", exit_description(.code))]
    EngineExit { code: Option<i32> },

    #[error("Frame {frame} out of range for scene {scene}, variant '{distorted_id}', {metric} ({length} slots)")]
    OutOfRange {
        scene: usize,
        distorted_id: String,
        metric: MetricKind,
        frame: usize,
        length: usize,
    },

    #[error("Scene not found: {0}")]
    UnknownScene(usize),

    #[error("Distorted variant '{distorted_id}' not found in scene {scene}")]
    UnknownVariant { scene: usize, distorted_id: String },

    #[error("{0}")]
    Other(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl MetrologistError {
    /// Range and lookup failures caused by an engine reporting a key the job does not have.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            MetrologistError::OutOfRange { .. }
                | MetrologistError::UnknownScene(_)
                | MetrologistError::UnknownVariant { .. }
        )
    }
}

impl From<anyhow::Error> for MetrologistError {
    fn from(err: anyhow::Error) -> Self {
        MetrologistError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetrologistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_message_includes_code() {
        let err = MetrologistError::EngineExit { code: Some(3) };
        assert_eq!(err.to_string(), "Engine exited with code 3");

        let err = MetrologistError::EngineExit { code: None };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_contract_violation_classification() {
        assert!(MetrologistError::UnknownScene(4).is_contract_violation());
        assert!(!MetrologistError::Protocol("bad".into()).is_contract_violation());
    }
}
