use crate::kiln::fetcher::FetchedArchive;
use crate::kiln::runner::Invocation;
use crate::kiln::{KilnSettings, Stage};
use crate::plan::{BinutilsSpec, TargetTriple, TargetVars, ToolchainPlan};
use handlebars::Handlebars;
use std::path::PathBuf;

/// The resolved shape of one binutils build: a scratch directory scoped to
/// the triple, a prefix namespaced by it, and the commands in between.
#[derive(Debug)]
pub(crate) struct TargetBuild {
    pub work_dir: PathBuf,
    pub source_dir: PathBuf,
    pub prefix: PathBuf,
    pub configure_args: Vec<String>,
    pub expect: Vec<String>,
    pub jobs: usize,
}

impl TargetBuild {
    pub fn plan(
        spec: &BinutilsSpec,
        triple: &TargetTriple,
        settings: &KilnSettings,
        jobs: usize,
    ) -> anyhow::Result<TargetBuild> {
        let work_dir = settings.target_work_path(triple);
        let source_dir = work_dir.join(&spec.source_dir);
        let prefix = spec.prefix_for(triple);

        let mut configure_args = vec![
            format!("--prefix={}", prefix.display()),
            format!("--target={}", triple),
        ];
        configure_args.extend(spec.configure_args.iter().cloned());

        let vars = TargetVars {
            triple: triple.as_str().to_string(),
            version: spec.version.clone(),
            prefix: prefix.display().to_string(),
        };

        let engine = Handlebars::new();
        let mut expect = vec![];

        for pattern in &spec.expect {
            expect.push(engine.render_template(pattern, &vars)?);
        }

        Ok(TargetBuild {
            work_dir,
            source_dir,
            prefix,
            configure_args,
            expect,
            jobs,
        })
    }

    pub fn stage_invocations(&self, stage: Stage) -> Vec<Invocation> {
        match stage {
            Stage::Configure => vec![Invocation::new("./configure")
                .args(self.configure_args.iter().cloned())
                .current_dir(&self.source_dir)],

            Stage::Compile => vec![Invocation::new("make")
                .arg(format!("-j{}", self.jobs))
                .current_dir(&self.source_dir)],

            Stage::Install => vec![Invocation::new("make")
                .arg("install")
                .current_dir(&self.source_dir)],

            _ => vec![],
        }
    }
}

/// Everything hooks may want to look at while a target is being built.
pub(crate) struct TargetState<'a> {
    pub plan: &'a ToolchainPlan,
    pub build: &'a TargetBuild,
    pub triple: &'a TargetTriple,
    pub stage: Stage,
    pub archive: Option<FetchedArchive>,
}
