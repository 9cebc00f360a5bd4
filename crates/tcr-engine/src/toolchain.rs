//! Build/test toolchain collaborator.
//!
//! [`CommandToolchain`] executes configured command vectors as
//! subprocesses with captured output and an optional timeout. Built-in
//! command sets exist for the supported languages; anything else can be
//! supplied explicitly.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{Result, TcrError};
use crate::language::Language;

/// Build and test execution, consumed by the cycle.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run the build; `Err(TcrError::Build)` on failure.
    async fn run_build(&self) -> Result<()>;
    /// Run the test suite; `Err(TcrError::Test)` on failure.
    async fn run_tests(&self) -> Result<()>;
}

/// Captured result of one toolchain command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// A short diagnostic line for bus/error messages: the last non-empty
    /// line of stderr, falling back to stdout.
    pub fn summary(&self) -> String {
        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or_else(|| format!("exit code {}", self.exit_code))
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Subprocess-backed [`Toolchain`].
pub struct CommandToolchain {
    name: String,
    build_command: Vec<String>,
    test_command: Vec<String>,
    work_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandToolchain {
    pub fn new(
        name: impl Into<String>,
        build_command: Vec<String>,
        test_command: Vec<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let toolchain = Self {
            name: name.into(),
            build_command,
            test_command,
            work_dir: work_dir.into(),
            timeout: None,
        };
        if toolchain.build_command.is_empty() || toolchain.test_command.is_empty() {
            return Err(TcrError::Configuration(format!(
                "toolchain {} has an empty command",
                toolchain.name
            )));
        }
        Ok(toolchain)
    }

    /// The built-in toolchain for a detected language, or a configuration
    /// error for a language without one.
    pub fn for_language(language: &dyn Language, work_dir: impl Into<PathBuf>) -> Result<Self> {
        let (build, test) = builtin_commands(language.name()).ok_or_else(|| {
            TcrError::Configuration(format!(
                "no built-in toolchain for language {}",
                language.name()
            ))
        })?;
        Self::new(language.name(), build, test, work_dir)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, command: &[String]) -> Result<CommandOutcome> {
        let start = Instant::now();
        let exe = &command[0];
        let args = &command[1..];

        let child = Command::new(exe)
            .args(args)
            .current_dir(&self.work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TcrError::Unexpected(format!("failed to spawn {exe}: {e}")))?;

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    TcrError::Unexpected(format!(
                        "{} timed out after {}s",
                        command.join(" "),
                        timeout.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| TcrError::Unexpected(format!("failed to collect {exe} output: {e}")))?;

        let outcome = CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(
            command = %command.join(" "),
            exit_code = outcome.exit_code,
            duration_ms = outcome.duration_ms,
            "toolchain command finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn run_build(&self) -> Result<()> {
        let outcome = self.run(&self.build_command).await?;
        if outcome.passed() {
            Ok(())
        } else {
            Err(TcrError::Build(outcome.summary()))
        }
    }

    async fn run_tests(&self) -> Result<()> {
        let outcome = self.run(&self.test_command).await?;
        if outcome.passed() {
            Ok(())
        } else {
            Err(TcrError::Test(outcome.summary()))
        }
    }
}

fn vec_of(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Built-in (build, test) command pairs per language name.
fn builtin_commands(language: &str) -> Option<(Vec<String>, Vec<String>)> {
    match language {
        "rust" => Some((
            vec_of(&["cargo", "build", "--workspace"]),
            vec_of(&["cargo", "test", "--workspace"]),
        )),
        "go" => Some((
            vec_of(&["go", "build", "./..."]),
            vec_of(&["go", "test", "./..."]),
        )),
        "java" => Some((
            vec_of(&["mvn", "-q", "test-compile"]),
            vec_of(&["mvn", "-q", "test"]),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_toolchain(build: &[&str], test: &[&str]) -> CommandToolchain {
        CommandToolchain::new("test", vec_of(build), vec_of(test), ".").unwrap()
    }

    #[test]
    fn test_empty_command_is_a_configuration_error() {
        let result = CommandToolchain::new("broken", vec![], vec_of(&["true"]), ".");
        assert!(matches!(result, Err(TcrError::Configuration(_))));
    }

    #[test]
    fn test_builtin_commands_cover_supported_languages() {
        for language in ["rust", "go", "java"] {
            let (build, test) = builtin_commands(language).expect(language);
            assert!(!build.is_empty());
            assert!(!test.is_empty());
        }
        assert!(builtin_commands("cobol").is_none());
    }

    #[test]
    fn test_outcome_summary_prefers_stderr() {
        let outcome = CommandOutcome {
            exit_code: 1,
            stdout: "compiling\n".to_string(),
            stderr: "error: mismatched types\n\n".to_string(),
            duration_ms: 10,
        };
        assert_eq!(outcome.summary(), "error: mismatched types");
    }

    #[test]
    fn test_outcome_summary_falls_back_to_exit_code() {
        let outcome = CommandOutcome {
            exit_code: 7,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 10,
        };
        assert_eq!(outcome.summary(), "exit code 7");
    }

    #[tokio::test]
    async fn test_passing_build_and_tests() {
        let toolchain = echo_toolchain(&["true"], &["true"]);
        toolchain.run_build().await.expect("build");
        toolchain.run_tests().await.expect("tests");
    }

    #[tokio::test]
    async fn test_failing_build_maps_to_build_error() {
        let toolchain = echo_toolchain(&["false"], &["true"]);
        let err = toolchain.run_build().await.unwrap_err();
        assert!(matches!(err, TcrError::Build(_)));
    }

    #[tokio::test]
    async fn test_failing_tests_map_to_test_error() {
        let toolchain = echo_toolchain(&["true"], &["false"]);
        let err = toolchain.run_tests().await.unwrap_err();
        assert!(matches!(err, TcrError::Test(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let toolchain =
            echo_toolchain(&["sleep", "5"], &["true"]).with_timeout(Duration::from_millis(50));
        let err = toolchain.run_build().await.unwrap_err();
        assert!(matches!(err, TcrError::Unexpected(_)));
    }
}
