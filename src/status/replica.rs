// Observer-side copy of a job, kept current from the status stream
//
// Start from a snapshot of the configuration and feed it every status received on a
// subscription. Queries run against the replica, never against the supervisor's job.

use std::sync::mpsc::Receiver;

use super::{Status, StatusKind};
use crate::config::Configuration;
use crate::error::Result;
use crate::measure::Progress;
use crate::score::Reallocation;
use crate::stats::{self, framerate, FramerateMode, StatisticsReport};

#[derive(Debug, Clone)]
pub struct JobReplica {
    config: Configuration,
    policy: Reallocation,
    last_kind: StatusKind,
    applied: usize,
}

impl JobReplica {
    pub fn new(config: Configuration) -> Self {
        Self::with_policy(config, Reallocation::default())
    }

    /// Use the same reallocation policy as the supervisor being observed.
    pub fn with_policy(config: Configuration, policy: Reallocation) -> Self {
        Self {
            config,
            policy,
            last_kind: StatusKind::Idle,
            applied: 0,
        }
    }

    /// Apply one status. Scoring statuses fill the replica's score matrix.
    pub fn apply(&mut self, status: &Status) -> Result<()> {
        self.last_kind = status.kind();
        self.applied += 1;
        match status.arrival() {
            Some(arrival) => self.config.record_arrival(&arrival, self.policy),
            None => Ok(()),
        }
    }

    /// Apply everything currently waiting on the channel without blocking.
    /// Statuses the replica cannot place are logged and skipped.
    pub fn drain(&mut self, rx: &Receiver<Status>) -> usize {
        let mut count = 0;
        for status in rx.try_iter() {
            if let Err(e) = self.apply(&status) {
                log::warn!("Replica skipped {} status: {}", status.kind(), e);
            }
            count += 1;
        }
        count
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn last_kind(&self) -> StatusKind {
        self.last_kind
    }

    pub fn is_finished(&self) -> bool {
        self.last_kind.is_terminal()
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn statistics(&self) -> StatisticsReport {
        stats::calculate(&self.config)
    }

    pub fn framerate(&self, mode: FramerateMode) -> Option<f64> {
        framerate::estimate(&self.config, None, mode)
    }

    pub fn progress(&self) -> Progress {
        Progress::from_config(&self.config, self.last_kind)
    }
}
