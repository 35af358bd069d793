use crate::kiln::KilnSettings;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// A single external command the build wants to run, held as data so it can
/// be inspected before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: vec![],
            cwd: None,
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

    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn from_argv(argv: &[String]) -> anyhow::Result<Self> {
        match argv.split_first() {
            Some((program, rest)) => Ok(Invocation::new(program).args(rest.iter().cloned())),
            None => bail!("empty command line"),
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();

        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }

        line
    }
}

#[async_trait]
pub trait Invoker: Debug + Send + Sync {
    async fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()>;
}

pub trait InvokerBuilder {
    type Output: Invoker + 'static;

    fn build(settings: Arc<KilnSettings>) -> Self::Output;
}

/// Runs invocations on the host, inheriting stdio so tool output lands in
/// the terminal unmodified.
#[derive(Debug)]
pub struct HostInvoker;

impl InvokerBuilder for HostInvoker {
    type Output = HostInvoker;

    fn build(_settings: Arc<KilnSettings>) -> Self::Output {
        HostInvoker
    }
}

#[async_trait]
impl Invoker for HostInvoker {
    async fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()> {
        debug!(command = %invocation.command_line(), "running");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("couldn't start {}", invocation.program))?;
        let status = child.wait().await?;

        if !status.success() {
            bail!("{} failed with {}", invocation.command_line(), status);
        }

        Ok(())
    }
}
