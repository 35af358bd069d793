use crate::kiln::hooks::{Hook, HookTrigger};
use crate::kiln::runner::Invocation;
use crate::kiln::targets::TargetState;
use crate::kiln::{Kiln, Stage};
use crate::utils::FileWalker;
use anyhow::bail;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Checks that every glob the plan expects matches at least one file under
/// the freshly written prefix.
#[derive(Debug)]
pub struct VerifyInstall;

#[async_trait]
impl Hook for VerifyInstall {
    const PRIORITY: usize = 50;
    const TRIGGER: HookTrigger = HookTrigger::After;
    const STAGE: Stage = Stage::Install;

    async fn run(&self, state: &mut TargetState, _kiln: &Kiln) -> anyhow::Result<()> {
        for pattern in &state.build.expect {
            let own = pattern.clone();
            let glob = wax::Glob::from_str(&own)?;
            let mut matched = false;

            for entry in glob.walk(&state.build.prefix) {
                if entry.is_ok() {
                    matched = true;
                    break;
                }
            }

            if !matched {
                bail!(
                    "expected {} under {} after install, found nothing",
                    pattern,
                    state.build.prefix.display()
                );
            }

            debug!(pattern = %pattern, "install expectation met");
        }

        Ok(())
    }
}

/// Strips debug symbols from the ELF files an install produced, when the
/// plan opts in.
#[derive(Debug)]
pub struct StripInstalled;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

#[async_trait]
impl Hook for StripInstalled {
    const PRIORITY: usize = 100;
    const TRIGGER: HookTrigger = HookTrigger::After;
    const STAGE: Stage = Stage::Install;

    async fn run(&self, state: &mut TargetState, kiln: &Kiln) -> anyhow::Result<()> {
        if !state.plan.options.strip.unwrap_or(false) {
            return Ok(());
        }

        if tokio::fs::metadata(&state.build.prefix).await.is_err() {
            return Ok(());
        }

        let mut walker = FileWalker::new(&state.build.prefix).await?;

        while let Some(entry) = walker.next().await? {
            let path = entry.path();

            if !is_elf(&path).await? {
                continue;
            }

            let invocation = Invocation::new("strip").arg(path.display().to_string());

            if let Err(err) = kiln.invoker.invoke(&invocation).await {
                warn!(path = %path.display(), "couldn't strip: {:#}", err);
            }
        }

        Ok(())
    }
}

async fn is_elf(path: &Path) -> anyhow::Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = tokio::fs::File::open(path).await?;

    match file.read_exact(&mut magic).await {
        Ok(_) => Ok(magic == *ELF_MAGIC),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err.into()),
    }
}
