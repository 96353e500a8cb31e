use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::UserFacingError;

/// An external command to execute, with extra environment layered over the
/// inherited one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The full argv, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Captured result of a command whose output is inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. The seam lets tests record invocations instead of
/// spawning terraform, docker or credstash.
pub trait ProcessRunner: std::fmt::Debug {
    /// Runs the command with inherited stdio and fails on a non-zero exit.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Runs the command capturing stdout and stderr. A non-zero exit is
    /// reported through [`CapturedOutput::success`], not as an error.
    fn capture(&self, invocation: &Invocation) -> Result<CapturedOutput>;

    /// Runs the command and returns stdout, failing on a non-zero exit.
    fn check_output(&self, invocation: &Invocation) -> Result<String> {
        let output = self.capture(invocation)?;
        if !output.success {
            return Err(UserFacingError::Process(format!(
                "{}: {}",
                invocation,
                output.stderr.trim()
            ))
            .into());
        }
        Ok(output.stdout)
    }
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        debug!("running: {}", invocation);
        let status = invocation
            .command()
            .status()
            .with_context(|| format!("failed to start command '{}'", invocation))?;

        if !status.success() {
            return Err(
                UserFacingError::Process(format!("{} exited with {}", invocation, status)).into(),
            );
        }
        Ok(())
    }

    fn capture(&self, invocation: &Invocation) -> Result<CapturedOutput> {
        debug!("capturing: {}", invocation);
        let output = invocation
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to start command '{}'", invocation))?;

        Ok(CapturedOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
