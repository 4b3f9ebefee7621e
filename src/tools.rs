// Scoring engine resolver
//
// Resolution order:
// 1) Environment variable override (METROLOGIST_ENGINE_PATH)
// 2) Sidecar next to the executable
// 3) bin/ under the executable directory
// 4) PATH fallback
//
// Script engines (.py/.vpy) run through the interpreter from METROLOGIST_PYTHON_PATH, else `python`.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::constants::{DEFAULT_PYTHON, ENGINE_NAME, ENGINE_PATH_ENV, PYTHON_PATH_ENV, SCRIPT_EXTENSIONS};

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Some(p) = env::var_os(env_key).map(PathBuf::from) {
        if p.exists() {
            return p;
        }
        log::warn!("{} points to missing file {}, ignoring", env_key, p.display());
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        for candidate in [dir.join(&filename), dir.join("bin").join(&filename)] {
            if candidate.exists() {
                return candidate;
            }
        }
    }

    PathBuf::from(default_name)
}

/// Resolved engine location
pub fn engine_path() -> PathBuf {
    resolve_tool(ENGINE_PATH_ENV, ENGINE_NAME)
}

/// Interpreter for script engines
pub fn python_path() -> PathBuf {
    env::var_os(PYTHON_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON))
}

fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| SCRIPT_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// How to launch the engine. The job file path is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Launch plan for an engine file: scripts go through the interpreter.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_script(&path) {
            Self::new(python_path()).with_arg(path)
        } else {
            Self::new(path)
        }
    }

    /// Engine resolved from the environment and install layout.
    pub fn resolve() -> Self {
        Self::for_path(engine_path())
    }

    /// Process builder for one run against `job_file`.
    pub fn command(&self, job_file: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(job_file);
        cmd
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

impl EngineCommand {
    /// Check if the program is present at its path or on PATH
    pub fn is_available(&self) -> bool {
        if self.program.exists() {
            return true;
        }
        env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).any(|dir| dir.join(&self.program).is_file()))
            .unwrap_or(false)
    }
}

/// Check if the resolved engine program can be started
pub fn is_engine_available() -> bool {
    EngineCommand::resolve().is_available()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_program_availability() {
        let tmp = TempDir::new().unwrap();
        let engine = tmp.path().join("engine");
        std::fs::write(&engine, "").unwrap();
        assert!(EngineCommand::new(engine.clone()).is_available());
        assert!(!EngineCommand::new(tmp.path().join("missing")).is_available());
        assert!(!EngineCommand::new("metrologist-no-such-program").is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_program_found_on_path() {
        assert!(EngineCommand::new("sh").is_available());
    }

    #[test]
    fn test_resolve_tool_fallback() {
        let path = resolve_tool("METROLOGIST_TEST_NONEXISTENT", "testengine");
        assert_eq!(path, PathBuf::from("testengine"));
    }

    #[test]
    fn test_env_override() {
        let tmp = TempDir::new().unwrap();
        let engine = tmp.path().join("engine");
        std::fs::write(&engine, "test").unwrap();

        std::env::set_var("METROLOGIST_TEST_ENGINE", &engine);
        assert_eq!(resolve_tool("METROLOGIST_TEST_ENGINE", "default"), engine);
        std::env::remove_var("METROLOGIST_TEST_ENGINE");
    }

    #[test]
    fn test_env_override_to_missing_file_is_ignored() {
        std::env::set_var("METROLOGIST_TEST_MISSING", "/nonexistent/engine");
        assert_eq!(resolve_tool("METROLOGIST_TEST_MISSING", "fallback"), PathBuf::from("fallback"));
        std::env::remove_var("METROLOGIST_TEST_MISSING");
    }

    #[test]
    fn test_script_engines_use_interpreter() {
        let plan = EngineCommand::for_path("/opt/engine/metrologist.py");
        assert_eq!(plan.args, vec![OsString::from("/opt/engine/metrologist.py")]);
        assert_ne!(plan.program, PathBuf::from("/opt/engine/metrologist.py"));

        let plan = EngineCommand::for_path("/opt/engine/metrologist-engine");
        assert_eq!(plan, EngineCommand::new("/opt/engine/metrologist-engine"));
    }

    #[test]
    fn test_job_file_is_last_argument() {
        let plan = EngineCommand::new("engine").with_arg("--quiet");
        let cmd = plan.command(Path::new("/jobs/config.json"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, vec![OsStr::new("--quiet"), OsStr::new("/jobs/config.json")]);
        assert_eq!(plan.to_string(), "engine --quiet");
    }
}
