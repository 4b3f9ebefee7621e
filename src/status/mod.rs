// Job status values and the append-only status event log

pub mod event_log;
pub mod replica;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MetricKind;
use crate::protocol::ScoreArrival;
use crate::score::{FrameScore, ScoreValue};

pub use event_log::{StatusLog, Topic};
pub use replica::JobReplica;

/// Discriminant of a [`State`], used for narrow subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Idle,
    Running,
    Scoring,
    Done,
    Canceled,
    Error,
}

impl StatusKind {
    /// Done, Canceled and Error end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusKind::Done | StatusKind::Canceled | StatusKind::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Idle => "idle",
            StatusKind::Running => "running",
            StatusKind::Scoring => "scoring",
            StatusKind::Done => "done",
            StatusKind::Canceled => "canceled",
            StatusKind::Error => "error",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame scored while the job is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringEvent {
    pub scene_index: usize,
    pub distorted_id: String,
    pub metric: MetricKind,
    pub frame_index: usize,
    pub score: ScoreValue,
}

impl ScoringEvent {
    pub fn to_arrival(&self, time: DateTime<Utc>) -> ScoreArrival {
        ScoreArrival {
            scene: self.scene_index,
            distorted_id: self.distorted_id.clone(),
            frame: self.frame_index,
            metric: self.metric,
            score: FrameScore::new(time, self.score.clone()),
        }
    }
}

impl From<&ScoreArrival> for ScoringEvent {
    fn from(arrival: &ScoreArrival) -> Self {
        Self {
            scene_index: arrival.scene,
            distorted_id: arrival.distorted_id.clone(),
            metric: arrival.metric,
            frame_index: arrival.frame,
            score: arrival.score.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum State {
    Idle,
    Running,
    Scoring(ScoringEvent),
    Done,
    Canceled,
    Error { cause: String },
}

impl State {
    pub fn kind(&self) -> StatusKind {
        match self {
            State::Idle => StatusKind::Idle,
            State::Running => StatusKind::Running,
            State::Scoring(_) => StatusKind::Scoring,
            State::Done => StatusKind::Done,
            State::Canceled => StatusKind::Canceled,
            State::Error { .. } => StatusKind::Error,
        }
    }
}

/// A timestamped [`State`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub state: State,
}

impl Status {
    pub fn new(state: State) -> Self {
        Self::at(Utc::now(), state)
    }

    pub fn at(time: DateTime<Utc>, state: State) -> Self {
        Self { time, state }
    }

    pub fn kind(&self) -> StatusKind {
        self.state.kind()
    }

    /// The score arrival carried by a Scoring status.
    pub fn arrival(&self) -> Option<ScoreArrival> {
        match &self.state {
            State::Scoring(event) => Some(event.to_arrival(self.time)),
            _ => None,
        }
    }
}
