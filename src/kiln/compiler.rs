use crate::kiln::runner::Invocation;
use crate::kiln::KilnSettings;
use crate::plan::CompilerSpec;
use std::path::PathBuf;

/// The resolved shape of one compiler build: where the checkout lives and
/// the exact commands that take it from clone to installed toolchain.
#[derive(Debug)]
pub(crate) struct CompilerBuild {
    pub work_dir: PathBuf,
    pub checkout: PathBuf,
    jobs: usize,
    repository: String,
    tag: String,
    preset: String,
    build_dir: String,
    prefix: String,
}

impl CompilerBuild {
    pub fn plan(spec: &CompilerSpec, settings: &KilnSettings, jobs: usize) -> CompilerBuild {
        let work_dir = settings.compiler_work_path();
        let checkout = work_dir.join("src");

        CompilerBuild {
            work_dir,
            checkout,
            jobs,
            repository: spec.repository.clone(),
            tag: spec.tag.clone(),
            preset: spec.preset.clone(),
            build_dir: spec.build_dir.clone(),
            prefix: spec.prefix.clone(),
        }
    }

    /// One shallow clone pinned to the release tag, then the preset-driven
    /// configure, build and install steps inside the checkout.
    pub fn invocations(&self) -> Vec<Invocation> {
        vec![
            Invocation::new("git")
                .args(["clone", "--depth", "1", "--branch"])
                .arg(self.tag.as_str())
                .arg("--single-branch")
                .arg(self.repository.as_str())
                .arg(self.checkout.display().to_string())
                .current_dir(&self.work_dir),
            Invocation::new("cmake")
                .arg("--preset")
                .arg(self.preset.as_str())
                .current_dir(&self.checkout),
            Invocation::new("cmake")
                .args(["--build", self.build_dir.as_str(), "--parallel"])
                .arg(self.jobs.to_string())
                .current_dir(&self.checkout),
            Invocation::new("cmake")
                .args(["--install", self.build_dir.as_str(), "--prefix"])
                .arg(self.prefix.as_str())
                .current_dir(&self.checkout),
        ]
    }
}
