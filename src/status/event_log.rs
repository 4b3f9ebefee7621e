// Status event log with broad and narrow fan-out
//
// Every append is timestamped, delivered to observers and retained. Delivery goes
// first to observers registered on Topic::Any, then to those on the status's own
// kind, each group in registration order. Channel subscribers receive owned copies, so readers on other
// threads never hold a reference into the log.

use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};

use super::{State, Status, StatusKind};
use crate::config::Configuration;

/// Subscription filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Any,
    Kind(StatusKind),
}

impl Topic {
    pub fn matches(&self, kind: StatusKind) -> bool {
        match self {
            Topic::Any => true,
            Topic::Kind(k) => *k == kind,
        }
    }
}

type Listener = Box<dyn FnMut(&Status) + Send>;

enum Observer {
    Callback(Listener),
    Channel(Sender<Status>),
}

pub struct StatusLog {
    entries: Vec<Status>,
    observers: Vec<(Topic, Observer)>,
}

impl StatusLog {
    /// A log holding a single Idle entry stamped now.
    pub fn new() -> Self {
        Self::with_entries(vec![Status::new(State::Idle)])
    }

    /// Resume from retained history. An empty history starts with Idle.
    pub fn with_entries(entries: Vec<Status>) -> Self {
        let entries = if entries.is_empty() {
            vec![Status::new(State::Idle)]
        } else {
            entries
        };
        Self { entries, observers: Vec::new() }
    }

    /// Idle followed by one Scoring entry per score already in the job, oldest first.
    pub fn from_configuration(config: &Configuration) -> Self {
        let mut log = Self::new();
        let mut seeded: Vec<Status> = config
            .scored_frames()
            .map(|frame| {
                Status::at(
                    frame.score.time,
                    State::Scoring(super::ScoringEvent {
                        scene_index: frame.scene,
                        distorted_id: frame.distorted_id.to_string(),
                        metric: frame.metric,
                        frame_index: frame.frame,
                        score: frame.score.value.clone(),
                    }),
                )
            })
            .collect();
        seeded.sort_by_key(|s| s.time);
        log.entries.extend(seeded);
        log
    }

    /// Append a status stamped now.
    pub fn append(&mut self, state: State) -> &Status {
        self.append_at(None, state)
    }

    /// Append a status; `time` defaults to now. Never fails.
    pub fn append_at(&mut self, time: Option<DateTime<Utc>>, state: State) -> &Status {
        let status = Status::at(time.unwrap_or_else(Utc::now), state);
        self.dispatch(&status);
        self.entries.push(status);
        &self.entries[self.entries.len() - 1]
    }

    fn dispatch(&mut self, status: &Status) {
        let kind = status.kind();
        let mut alive = vec![true; self.observers.len()];

        for pass in [Topic::Any, Topic::Kind(kind)] {
            for (index, (topic, observer)) in self.observers.iter_mut().enumerate() {
                if *topic == pass && !deliver(observer, status) {
                    alive[index] = false;
                }
            }
        }

        // Forget channels whose receiver is gone
        let mut index = 0;
        self.observers.retain(|_| {
            let keep = alive[index];
            index += 1;
            keep
        });
    }

    /// Register a callback for a topic.
    pub fn on<F>(&mut self, topic: Topic, listener: F)
    where
        F: FnMut(&Status) + Send + 'static,
    {
        self.observers.push((topic, Observer::Callback(Box::new(listener))));
    }

    /// Receive future statuses for a topic over a channel.
    pub fn subscribe(&mut self, topic: Topic) -> Receiver<Status> {
        let (tx, rx) = mpsc::channel();
        self.observers.push((topic, Observer::Channel(tx)));
        rx
    }

    /// Like [`subscribe`](Self::subscribe), but the channel first replays every
    /// retained status matching the topic.
    pub fn subscribe_with_history(&mut self, topic: Topic) -> Receiver<Status> {
        let (tx, rx) = mpsc::channel();
        for status in self.entries.iter().filter(|s| topic.matches(s.kind())) {
            // rx is alive in this scope
            let _ = tx.send(status.clone());
        }
        self.observers.push((topic, Observer::Channel(tx)));
        rx
    }

    pub fn entries(&self) -> &[Status] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Status> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_kind(&self, kind: StatusKind) -> impl Iterator<Item = &Status> + '_ {
        self.entries.iter().filter(move |s| s.kind() == kind)
    }

    /// Copy of the history for readers that must not borrow the log.
    pub fn snapshot(&self) -> Vec<Status> {
        self.entries.clone()
    }
}

fn deliver(observer: &mut Observer, status: &Status) -> bool {
    match observer {
        Observer::Callback(listener) => {
            listener(status);
            true
        }
        Observer::Channel(tx) => tx.send(status.clone()).is_ok(),
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusLog")
            .field("entries", &self.entries)
            .field("observers", &self.observers.len())
            .finish()
    }
}
