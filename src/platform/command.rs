use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};

/// One external program call. Arguments are passed verbatim, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Start the program and return without waiting (long-running daemons).
    pub detach: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            detach: false,
        }
    }

    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Failure text for logs and errors: stderr if present, otherwise the exit code.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Executes invocations. `Err` means the program could not be started at all.
pub type CommandRunner = Arc<dyn Fn(&Invocation) -> Result<CommandOutput> + Send + Sync>;

pub fn default_runner() -> CommandRunner {
    Arc::new(run_process)
}

fn run_process(invocation: &Invocation) -> Result<CommandOutput> {
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args);

    if invocation.detach {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", invocation.program))?;
        return Ok(CommandOutput {
            success: true,
            ..CommandOutput::default()
        });
    }

    let output = command
        .output()
        .with_context(|| format!("failed to run {}", invocation.program))?;
    Ok(CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
