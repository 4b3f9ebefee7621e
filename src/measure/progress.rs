// Job progress snapshot for observers

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::status::StatusKind;

/// Frame and slot counts of a job at one point in time.
/// `completed`/`remaining` count frames of fully scored variants; the slot
/// counts track individual (frame, metric) scores and drive `percent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub status: StatusKind,
    pub completed: usize,
    pub remaining: usize,
    pub filled_slots: usize,
    pub total_slots: usize,
    pub percent: f64,
}

impl Progress {
    pub fn new(status: StatusKind, filled_slots: usize, total_slots: usize) -> Self {
        let total_safe = total_slots.max(1);
        let percent = (filled_slots as f64 / total_safe as f64) * 100.0;
        Self {
            status,
            completed: 0,
            remaining: 0,
            filled_slots,
            total_slots,
            percent: percent.min(100.0),
        }
    }

    pub fn from_config(config: &Configuration, status: StatusKind) -> Self {
        let frames = config.frames_scored();
        Self {
            completed: frames.completed,
            remaining: frames.remaining,
            ..Self::new(status, config.filled_slots(), config.total_frames())
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
