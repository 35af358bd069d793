pub mod compiler;
pub mod environment;
pub mod extractor;
pub mod fetcher;
pub mod hooks;
pub mod runner;
pub mod targets;

use crate::kiln::compiler::CompilerBuild;
use crate::kiln::environment::Environment;
use crate::kiln::extractor::Extractor;
use crate::kiln::fetcher::Fetcher;
use crate::kiln::hooks::{HookTrigger, SORTED_HOOKS};
use crate::kiln::runner::{Invoker, InvokerBuilder};
use crate::kiln::targets::{TargetBuild, TargetState};
use crate::plan::{BinutilsSpec, FailurePolicy, TargetTriple, ToolchainPlan};
use anyhow::bail;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Stage {
    Fetch,
    Extract,
    Configure,
    Compile,
    Install,
    Clean,
}

impl Stage {
    pub const fn stages() -> [Stage; 6] {
        [
            Stage::Fetch,
            Stage::Extract,
            Stage::Configure,
            Stage::Compile,
            Stage::Install,
            Stage::Clean,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Configure => "configure",
            Stage::Compile => "compile",
            Stage::Install => "install",
            Stage::Clean => "clean",
        }
    }
}

#[derive(Debug)]
pub struct KilnSettings {
    root_path: PathBuf,
    work_path: PathBuf,
    jobs: Option<usize>,
}

impl Default for KilnSettings {
    fn default() -> Self {
        KilnSettings::with_root(PathBuf::from("/tmp/kiln"))
    }
}

impl KilnSettings {
    pub fn with_root(root_path: PathBuf) -> Self {
        KilnSettings {
            root_path,
            work_path: PathBuf::from("work"),
            jobs: None,
        }
    }

    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn jobs_override(&self) -> Option<usize> {
        self.jobs
    }

    /// Scratch space, everything under it is disposable.
    pub fn work_path(&self) -> PathBuf {
        self.root_path.join(&self.work_path)
    }

    pub fn compiler_work_path(&self) -> PathBuf {
        self.work_path().join("compiler")
    }

    pub fn target_work_path(&self, triple: &TargetTriple) -> PathBuf {
        self.work_path().join("targets").join(triple.as_str())
    }
}

/// Summary of a run under the isolating failure policy: which targets
/// broke, and how.
#[derive(Debug)]
pub struct TargetFailures {
    failures: Vec<(TargetTriple, anyhow::Error)>,
}

impl TargetFailures {
    pub fn triples(&self) -> Vec<&TargetTriple> {
        self.failures.iter().map(|(triple, _)| triple).collect()
    }
}

impl Display for TargetFailures {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} target(s) failed:", self.failures.len())?;

        for (triple, error) in &self.failures {
            write!(f, "\n\n\t{}: {:#}", triple, error)?;
        }

        Ok(())
    }
}

impl std::error::Error for TargetFailures {}

pub struct Kiln {
    fetcher: Fetcher,
    extractor: Extractor,
    environment: Environment,
    invoker: Box<dyn Invoker>,
    pub settings: Arc<KilnSettings>,
}

impl Kiln {
    pub fn from_settings<T: InvokerBuilder>(settings: KilnSettings) -> Self {
        let settings = Arc::from(settings);

        Kiln {
            fetcher: Fetcher::new(),
            extractor: Extractor::default(),
            environment: Environment::new(&settings),
            invoker: Box::from(T::build(settings.clone())),
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_invoker(settings: KilnSettings, invoker: Box<dyn Invoker>) -> Self {
        let settings = Arc::from(settings);

        Kiln {
            fetcher: Fetcher::new(),
            extractor: Extractor::default(),
            environment: Environment::new(&settings),
            invoker,
            settings,
        }
    }

    /// Runs the whole plan in order: host preparation, then the compiler,
    /// then binutils once per target.
    pub async fn run(&self, plan: &ToolchainPlan) -> anyhow::Result<()> {
        info!(toolchain = %plan.name, "starting toolchain build");

        for (triple, backend) in plan.backend_gaps() {
            warn!(
                triple = %triple,
                backend,
                "the compiler preset does not declare the backend this target needs"
            );
        }

        self.prepare(plan).await?;
        self.build_compiler(plan).await?;
        self.build_targets(plan).await?;

        info!(toolchain = %plan.name, "toolchain build finished");

        Ok(())
    }

    async fn prepare(&self, plan: &ToolchainPlan) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.settings.work_path()).await?;

        if plan.host.packages.is_empty() {
            info!("no host packages requested, skipping environment preparation");
            return Ok(());
        }

        info!(packages = plan.host.packages.len(), "preparing the host environment");

        for invocation in self.environment.prepare_invocations(&plan.host)? {
            self.invoker.invoke(&invocation).await?;
        }

        Ok(())
    }

    async fn build_compiler(&self, plan: &ToolchainPlan) -> anyhow::Result<()> {
        let spec = match &plan.compiler {
            Some(spec) => spec,
            None => {
                info!("the plan has no compiler block, skipping the compiler build");
                return Ok(());
            }
        };

        let build = CompilerBuild::plan(spec, &self.settings, self.environment.jobs());
        info!(version = %spec.version, tag = %spec.tag, "building the compiler");

        if tokio::fs::metadata(&build.checkout).await.is_ok() {
            tokio::fs::remove_dir_all(&build.checkout).await?;
        }

        tokio::fs::create_dir_all(&build.work_dir).await?;

        for invocation in build.invocations() {
            self.invoker.invoke(&invocation).await?;
        }

        if tokio::fs::metadata(&build.checkout).await.is_ok() {
            tokio::fs::remove_dir_all(&build.checkout).await?;
        }

        info!(prefix = %spec.prefix, "compiler installed");

        Ok(())
    }

    async fn build_targets(&self, plan: &ToolchainPlan) -> anyhow::Result<()> {
        if plan.targets.is_empty() {
            info!("no targets requested, skipping binutils");
            return Ok(());
        }

        let binutils = match &plan.binutils {
            Some(spec) => spec,
            None => bail!("targets requested but the plan has no binutils block"),
        };

        let mut failures: Vec<(TargetTriple, anyhow::Error)> = vec![];

        for triple in &plan.targets {
            info!(triple = %triple, "building binutils");

            match self.build_target(plan, binutils, triple).await {
                Ok(()) => {
                    info!(triple = %triple, "binutils installed");
                }

                Err(err) => match plan.options.on_failure {
                    FailurePolicy::Abort => {
                        return Err(err.context(format!("binutils build failed for {}", triple)));
                    }

                    FailurePolicy::Isolate => {
                        warn!(triple = %triple, "target failed, moving on: {:#}", err);
                        failures.push((triple.clone(), err));
                    }
                },
            }
        }

        if !failures.is_empty() {
            let summary = TargetFailures { failures };
            warn!(failed = summary.triples().len(), "finishing with failed targets");
            return Err(summary.into());
        }

        Ok(())
    }

    async fn build_target(
        &self,
        plan: &ToolchainPlan,
        binutils: &BinutilsSpec,
        triple: &TargetTriple,
    ) -> anyhow::Result<()> {
        let build = TargetBuild::plan(binutils, triple, &self.settings, self.environment.jobs())?;

        let mut state = TargetState {
            plan,
            build: &build,
            triple,
            stage: Stage::Fetch,
            archive: None,
        };

        for stage in Stage::stages() {
            state.stage = stage;
            debug!(triple = %triple, stage = stage.name(), "running stage");

            self.run_hooks(&mut state, stage, HookTrigger::Before).await?;

            match stage {
                Stage::Fetch => {
                    tokio::fs::create_dir_all(&build.work_dir).await?;

                    let fetched = self.fetcher.fetch(binutils, &build.work_dir).await?;
                    state.archive = Some(fetched);
                }

                Stage::Extract => {
                    if let Some(archive) = &state.archive {
                        self.extractor.extract(&archive.path, &build.work_dir).await?;
                    }
                }

                Stage::Configure | Stage::Compile | Stage::Install => {
                    for invocation in build.stage_invocations(stage) {
                        self.invoker.invoke(&invocation).await?;
                    }
                }

                Stage::Clean => {
                    tokio::fs::remove_dir_all(&build.work_dir).await?;
                }
            }

            self.run_hooks(&mut state, stage, HookTrigger::After).await?;
        }

        Ok(())
    }

    async fn run_hooks(
        &self,
        state: &mut TargetState<'_>,
        stage: Stage,
        trigger: HookTrigger,
    ) -> anyhow::Result<()> {
        for hook in SORTED_HOOKS.iter() {
            if hook.when() == (stage, trigger) {
                hook.trigger(state, self).await?;
            }
        }

        Ok(())
    }
}
