// Measurement supervisor
//
// Owns one job and its status log. `measure` writes the job file, runs the engine
// against it and applies every reported score in the order the engine prints them.
// Observers follow along through the status log; they never borrow the job itself.

pub mod progress;


use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::mpsc::Receiver;

use uuid::Uuid;

use crate::config::Configuration;
use crate::constants::ENGINE_LOG_PREFIX;
use crate::error::{MetrologistError, Result};
use crate::protocol::{self, EngineLine, ScoreArrival};
use crate::score::Reallocation;
use crate::stats::{self, framerate, FramerateMode, StatisticsReport};
use crate::status::{JobReplica, ScoringEvent, State, Status, StatusKind, StatusLog, Topic};
use crate::tools::EngineCommand;

pub use progress::Progress;

/// Per-supervisor run settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureOptions {
    /// Applied when a score arrives for a sequence shorter than its variant's range
    pub reallocation: Reallocation,
}

#[derive(Debug)]
pub struct Metrologist {
    config: Configuration,
    log: StatusLog,
    engine: EngineCommand,
    options: MeasureOptions,
    violations: Vec<MetrologistError>,
    run_token: Option<String>,
}

impl Metrologist {
    /// Supervisor for `config`. Scores already in the job are replayed into the
    /// status history, oldest first.
    pub fn new(config: Configuration) -> Self {
        let log = StatusLog::from_configuration(&config);
        Self::with_history(config, log)
    }

    /// Resume with a previously retained status log.
    pub fn with_history(config: Configuration, log: StatusLog) -> Self {
        Self {
            config,
            log,
            engine: EngineCommand::resolve(),
            options: MeasureOptions::default(),
            violations: Vec::new(),
            run_token: None,
        }
    }

    pub fn with_engine(mut self, engine: EngineCommand) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_options(mut self, options: MeasureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Point-in-time copy of the job.
    pub fn snapshot(&self) -> Configuration {
        self.config.clone()
    }

    pub fn engine(&self) -> &EngineCommand {
        &self.engine
    }

    pub fn options(&self) -> MeasureOptions {
        self.options
    }

    pub fn statuses(&self) -> &[Status] {
        self.log.entries()
    }

    pub fn last_status(&self) -> Option<&Status> {
        self.log.last()
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.log
    }

    pub fn on<F>(&mut self, topic: Topic, listener: F)
    where
        F: FnMut(&Status) + Send + 'static,
    {
        self.log.on(topic, listener);
    }

    pub fn subscribe(&mut self, topic: Topic) -> Receiver<Status> {
        self.log.subscribe(topic)
    }

    pub fn subscribe_with_history(&mut self, topic: Topic) -> Receiver<Status> {
        self.log.subscribe_with_history(topic)
    }

    /// A copy of the job plus a channel of every later status, ready to be
    /// moved to another thread.
    pub fn replica(&mut self) -> (JobReplica, Receiver<Status>) {
        let replica = JobReplica::with_policy(self.snapshot(), self.options.reallocation);
        (replica, self.log.subscribe(Topic::Any))
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.config_path()
    }

    pub fn progress(&self) -> Progress {
        let status = self.log.last().map_or(StatusKind::Idle, Status::kind);
        Progress::from_config(&self.config, status)
    }

    pub fn statistics(&self) -> StatisticsReport {
        stats::calculate(&self.config)
    }

    pub fn framerate(&self, mode: FramerateMode) -> Option<f64> {
        framerate::estimate(&self.config, None, mode)
    }

    /// Scores the engine reported for keys the job does not have, from the latest run.
    pub fn violations(&self) -> &[MetrologistError] {
        &self.violations
    }

    pub fn run_token(&self) -> Option<&str> {
        self.run_token.as_deref()
    }

    /// Record that a collaborator stopped the engine out of band.
    pub fn record_canceled(&mut self) -> &Status {
        log::info!("Run {} canceled", self.token());
        self.log.append(State::Canceled)
    }

    fn token(&self) -> &str {
        self.run_token.as_deref().unwrap_or("-")
    }

    /// Run the engine to completion. Resolves to the populated job on a clean
    /// exit; any process failure is appended as an Error status and returned.
    ///
    /// Scores for keys outside the job never reach the status log. A clean exit
    /// can still carry them, so check [`Metrologist::violations`] after Done.
    pub fn measure(&mut self) -> Result<&Configuration> {
        self.run_token = Some(Uuid::new_v4().to_string());
        self.violations.clear();

        self.config.prepare_scores();
        if !self.config.console() {
            log::warn!("Run {}: output.console is off, the engine will not report scores", self.token());
        }

        let job_file = self.config.config_path();
        if let Err(e) = self.config.save(&job_file) {
            return Err(self.fail(e));
        }
        log::info!("Run {}: wrote job file {}", self.token(), job_file.display());

        let mut cmd = self.engine.command(&job_file);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = MetrologistError::Engine(format!("Failed to start engine {}: {}", self.engine, e));
                return Err(self.fail(err));
            }
        };

        log::info!("Run {}: started {} (pid {})", self.token(), self.engine, child.id());
        self.log.append(State::Running);

        if let Err(e) = self.read_output(&mut child) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.fail(e));
        }

        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                let err = MetrologistError::Engine(format!("Engine process error: {}", e));
                return Err(self.fail(err));
            }
        };

        if !status.success() {
            return Err(self.fail(MetrologistError::EngineExit { code: status.code() }));
        }

        if !self.violations.is_empty() {
            log::warn!(
                "Run {}: engine reported {} score(s) outside the job",
                self.token(),
                self.violations.len()
            );
        }
        log::info!(
            "Run {} done, {} slots filled, {} violation(s)",
            self.token(),
            self.config.filled_slots(),
            self.violations.len()
        );
        self.log.append(State::Done);
        Ok(&self.config)
    }

    fn read_output(&mut self, child: &mut Child) -> Result<()> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MetrologistError::Engine("Engine stdout was not captured".to_string()))?;

        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| MetrologistError::Engine(format!("Failed to read engine output: {}", e)))?;
            if read == 0 {
                return Ok(());
            }
            self.process_line(&String::from_utf8_lossy(&buf));
        }
    }

    /// Apply one line of engine output. Score lines fill a slot and append a
    /// Scoring status; everything else leaves the job untouched.
    pub fn process_line(&mut self, line: &str) {
        match protocol::parse_line(line) {
            EngineLine::Score(arrival) => self.apply_arrival(arrival),
            EngineLine::Diagnostic(text) => {
                if self.config.verbose() && !text.is_empty() {
                    log::info!("{} {}", ENGINE_LOG_PREFIX, text);
                }
            }
            malformed @ EngineLine::Malformed { .. } => {
                if let Some(err) = malformed.into_protocol_error() {
                    log::warn!("Run {}: skipping line: {}", self.token(), err);
                }
            }
        }
    }

    fn apply_arrival(&mut self, arrival: ScoreArrival) {
        if let Some(params) = self.config.metrics.get(&arrival.metric) {
            if !arrival.score.value.fits(arrival.metric, params.regions) {
                log::warn!(
                    "Run {}: {} score for scene {} {} frame {} does not match the configured regions",
                    self.token(),
                    arrival.metric,
                    arrival.scene,
                    arrival.distorted_id,
                    arrival.frame
                );
            }
        }
        match self.config.record_arrival(&arrival, self.options.reallocation) {
            Ok(()) => {
                self.log
                    .append_at(Some(arrival.score.time), State::Scoring(ScoringEvent::from(&arrival)));
            }
            Err(e) => {
                log::error!("Run {}: {}", self.token(), e);
                self.violations.push(e);
            }
        }
    }

    fn fail(&mut self, err: MetrologistError) -> MetrologistError {
        log::error!("Run {} failed: {}", self.token(), err);
        self.log.append(State::Error { cause: err.to_string() });
        err
    }
}
