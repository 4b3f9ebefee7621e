// Engine stdout protocol
// One record per line. `SCORE: {json}` reports a scored frame; anything else is diagnostics.

use serde::{Deserialize, Serialize};

use crate::config::MetricKind;
use crate::constants::SCORE_PREFIX;
use crate::error::MetrologistError;
use crate::score::FrameScore;

/// One frame's score as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreArrival {
    pub scene: usize,
    pub distorted_id: String,
    /// Offset within the scene, not the global frame number
    pub frame: usize,
    pub metric: MetricKind,
    pub score: FrameScore,
}

/// Classification of one engine output line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    Score(ScoreArrival),
    Diagnostic(String),
    /// A SCORE line whose payload could not be decoded. Recoverable.
    Malformed { line: String, error: String },
}

impl EngineLine {
    pub fn into_protocol_error(self) -> Option<MetrologistError> {
        match self {
            EngineLine::Malformed { line, error } => {
                Some(MetrologistError::Protocol(format!("{} in line: {}", error, line)))
            }
            _ => None,
        }
    }
}

/// Classify a single line. Never fails; malformed payloads come back as `Malformed`.
pub fn parse_line(line: &str) -> EngineLine {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(payload) = line.strip_prefix(SCORE_PREFIX) else {
        return EngineLine::Diagnostic(line.to_string());
    };

    match serde_json::from_str::<ScoreArrival>(payload.trim()) {
        Ok(arrival) => EngineLine::Score(arrival),
        Err(e) => EngineLine::Malformed {
            line: line.to_string(),
            error: e.to_string(),
        },
    }
}

/// Render an arrival the way the engine prints it. Used by fake engines in tests and demos.
pub fn format_score_line(arrival: &ScoreArrival) -> serde_json::Result<String> {
    Ok(format!("{} {}", SCORE_PREFIX, serde_json::to_string(arrival)?))
}
