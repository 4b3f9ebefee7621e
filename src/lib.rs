// Metrologist - Library Entry Point
//
// Drives an external scoring engine over a video-quality job, records every score it
// reports, and answers statistics and progress queries while the run is in flight.

pub mod config;
pub mod constants;
pub mod error;
pub mod measure;
pub mod protocol;
pub mod score;
pub mod stats;
pub mod status;
pub mod tools;

pub use config::{Configuration, MetricKind};
pub use error::{MetrologistError, Result};
pub use measure::{MeasureOptions, Metrologist, Progress};
pub use score::{FrameScore, Reallocation, ScoreValue};
pub use stats::{FramerateMode, Statistics, StatisticsReport};
pub use status::{JobReplica, State, Status, StatusKind, StatusLog, Topic};
pub use tools::EngineCommand;
