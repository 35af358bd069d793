pub mod parsing;

use kiln_utils::VisitStrings;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Default, Debug, Clone)]
pub struct Document {
    pub toolchains: Vec<ToolchainPlan>,
}

impl Document {
    pub fn select(&mut self, name: Option<&str>) -> Option<&mut ToolchainPlan> {
        match name {
            Some(name) => self.toolchains.iter_mut().find(|t| t.name == name),
            None => self.toolchains.first_mut(),
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct ToolchainPlan {
    pub name: String,
    pub description: String,
    pub host: HostPrep,
    pub compiler: Option<CompilerSpec>,
    pub binutils: Option<BinutilsSpec>,
    pub targets: Vec<TargetTriple>,
    pub options: PlanOptions,
}

impl ToolchainPlan {
    /// Triples whose architecture needs a compiler backend the plan does not
    /// declare. Empty when the compiler block is absent or lists no backends.
    pub fn backend_gaps(&self) -> Vec<(&TargetTriple, &'static str)> {
        let compiler = match &self.compiler {
            Some(compiler) if !compiler.backends.is_empty() => compiler,
            _ => return vec![],
        };

        let mut gaps = vec![];
        for triple in &self.targets {
            if let Some(backend) = triple.expected_backend() {
                if !compiler.backends.iter().any(|b| b == backend) {
                    gaps.push((triple, backend));
                }
            }
        }

        gaps
    }
}

#[derive(Default, Debug, Clone)]
pub struct HostPrep {
    pub packages: Vec<String>,
    pub refresh_command: Vec<String>,
    pub install_command: Vec<String>,
}

impl HostPrep {
    pub const DEFAULT_REFRESH: &'static [&'static str] = &["apt-get", "update"];
    pub const DEFAULT_INSTALL: &'static [&'static str] =
        &["apt-get", "install", "-y", "--no-install-recommends"];
}

#[derive(Default, Debug, Clone, VisitStrings)]
pub struct CompilerSpec {
    pub version: String,
    pub repository: String,
    pub tag: String,
    pub preset: String,
    pub build_dir: String,
    pub prefix: String,
    pub backends: Vec<String>,
}

impl CompilerSpec {
    pub const DEFAULT_REPOSITORY: &'static str = "https://github.com/llvm/llvm-project.git";

    pub fn template_vars(&self) -> ReleaseVars {
        ReleaseVars {
            version: self.version.clone(),
        }
    }
}

#[derive(Default, Debug, Clone, VisitStrings)]
pub struct BinutilsSpec {
    pub version: String,
    pub url: String,
    pub source_dir: String,
    pub prefix_base: String,
    pub configure_args: Vec<String>,
    #[skip]
    pub expect: Vec<String>,
    #[skip]
    pub verification: Verification,
}

impl BinutilsSpec {
    pub const DEFAULT_RELEASE_HOST: &'static str = "https://ftp.gnu.org/gnu/binutils";
    pub const DEFAULT_CONFIGURE_ARGS: &'static [&'static str] =
        &["--enable-gold", "--enable-ld=default", "--disable-multilib"];

    pub fn template_vars(&self) -> ReleaseVars {
        ReleaseVars {
            version: self.version.clone(),
        }
    }

    pub fn archive_file_name(&self) -> &str {
        let tail = self.url.rsplit('/').next().unwrap_or(self.url.as_str());
        tail.split('?').next().unwrap_or(tail)
    }

    pub fn prefix_for(&self, triple: &TargetTriple) -> PathBuf {
        Path::new(&self.prefix_base).join(triple.as_str())
    }
}

#[derive(Default, Debug, Clone)]
pub struct Verification {
    pub sha256: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetTriple(String);

impl TargetTriple {
    pub fn new(value: impl Into<String>) -> Self {
        TargetTriple(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn arch(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Compiler backend that would have to be enabled for this triple's
    /// architecture, for the families the orchestrator knows about.
    pub fn expected_backend(&self) -> Option<&'static str> {
        let arch = self.arch();

        if arch == "arm64" || arch.starts_with("aarch64") {
            return Some("AArch64");
        }
        if arch.starts_with("arm") || arch.starts_with("thumb") {
            return Some("ARM");
        }
        if arch.starts_with("riscv") {
            return Some("RISCV");
        }
        if arch == "x86_64" || (arch.len() == 4 && arch.starts_with('i') && arch.ends_with("86")) {
            return Some("X86");
        }
        if arch.starts_with("mips") {
            return Some("Mips");
        }
        if arch.starts_with("powerpc") || arch.starts_with("ppc") {
            return Some("PowerPC");
        }

        None
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetTriple {
    fn from(value: &str) -> Self {
        TargetTriple(value.to_string())
    }
}

#[derive(Default, Debug, Clone)]
pub struct PlanOptions {
    pub strip: Option<bool>,
    pub on_failure: FailurePolicy,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    Abort,
    Isolate,
}

impl FailurePolicy {
    pub fn parse(value: &str) -> Option<FailurePolicy> {
        match value {
            "abort" => Some(FailurePolicy::Abort),
            "isolate" => Some(FailurePolicy::Isolate),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ReleaseVars {
    pub version: String,
}

#[derive(Serialize, Debug)]
pub struct TargetVars {
    pub triple: String,
    pub version: String,
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_mapping_covers_arm_families() {
        assert_eq!(
            TargetTriple::from("arm-none-eabi").expected_backend(),
            Some("ARM")
        );
        assert_eq!(
            TargetTriple::from("armv7-unknown-linux-gnueabihf").expected_backend(),
            Some("ARM")
        );
        assert_eq!(
            TargetTriple::from("thumbv7em-none-eabihf").expected_backend(),
            Some("ARM")
        );
        assert_eq!(
            TargetTriple::from("aarch64-unknown-linux-gnu").expected_backend(),
            Some("AArch64")
        );
        assert_eq!(
            TargetTriple::from("riscv64-unknown-elf").expected_backend(),
            Some("RISCV")
        );
        assert_eq!(
            TargetTriple::from("i686-unknown-linux-gnu").expected_backend(),
            Some("X86")
        );
        assert_eq!(TargetTriple::from("m68k-unknown-elf").expected_backend(), None);
    }

    #[test]
    fn backend_gaps_flag_missing_backends_only() {
        let mut plan = ToolchainPlan {
            targets: vec![
                TargetTriple::from("arm-none-eabi"),
                TargetTriple::from("aarch64-unknown-linux-gnu"),
            ],
            compiler: Some(CompilerSpec {
                backends: vec!["ARM".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };

        let gaps = plan.backend_gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].0.as_str(), "aarch64-unknown-linux-gnu");
        assert_eq!(gaps[0].1, "AArch64");

        plan.compiler = None;
        assert!(plan.backend_gaps().is_empty());
    }

    #[test]
    fn prefixes_are_namespaced_by_triple() {
        let binutils = BinutilsSpec {
            prefix_base: "/usr/local".to_string(),
            ..Default::default()
        };

        let a = binutils.prefix_for(&TargetTriple::from("arm-none-eabi"));
        let b = binutils.prefix_for(&TargetTriple::from("aarch64-unknown-linux-gnu"));
        assert_ne!(a, b);
        assert_eq!(a, PathBuf::from("/usr/local/arm-none-eabi"));

        let again = binutils.prefix_for(&TargetTriple::from("arm-none-eabi"));
        assert_eq!(a, again);
    }

    #[test]
    fn archive_file_name_comes_from_url_tail() {
        let binutils = BinutilsSpec {
            url: "https://ftp.gnu.org/gnu/binutils/binutils-2.41.tar.xz".to_string(),
            ..Default::default()
        };
        assert_eq!(binutils.archive_file_name(), "binutils-2.41.tar.xz");

        let mirrored = BinutilsSpec {
            url: "https://mirror.example/pub/binutils-2.41.tar.xz?fastly=1".to_string(),
            ..Default::default()
        };
        assert_eq!(mirrored.archive_file_name(), "binutils-2.41.tar.xz");
    }
}
