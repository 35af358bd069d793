use crate::kiln::runner::HostInvoker;
use crate::kiln::{Kiln, KilnSettings};
use crate::plan::parsing::{KilnParserCompoundError, ParseDocument};
use crate::plan::{
    Document, FailurePolicy, ReleaseVars, TargetTriple, ToolchainPlan, Verification,
};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use handlebars::Handlebars;
use kdl::KdlDocument;
use kiln_utils::{StringVisitor, VisitStrings};
use miette::NamedSource;
use std::path::PathBuf;
use tracing::{warn, Level};

mod kiln;
mod plan;
mod utils;

const DEFAULT_PLAN: &str = include_str!("../presets/arm-cross.kdl");
const DEFAULT_PLAN_NAME: &str = "arm-cross.kdl";

#[derive(Parser)]
#[command(
    name = "kiln",
    about = "Bakes cross toolchains from declarative plans",
    version
)]
struct Cli {
    /// Log level for diagnostic output
    #[arg(long, global = true, default_value_t = Level::INFO)]
    level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a toolchain plan from host preparation to installed binaries
    Build(PlanArgs),

    /// Print the resolved plan and exit without building anything
    Show(PlanArgs),
}

#[derive(Args)]
struct PlanArgs {
    /// Path to a toolchain plan, defaults to the bundled ARM preset
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Which toolchain to build when the plan declares several
    #[arg(long)]
    toolchain: Option<String>,

    /// Override the pinned compiler version
    #[arg(long)]
    compiler_version: Option<String>,

    /// Override the pinned binutils version
    #[arg(long)]
    binutils_version: Option<String>,

    /// Space separated target triples, replaces the plan's list
    #[arg(long)]
    targets: Option<String>,

    /// What to do when one target fails, "abort" or "isolate"
    #[arg(long)]
    on_failure: Option<String>,

    /// Directory the build scratch space lives under
    #[arg(long)]
    root: Option<PathBuf>,

    /// Parallel jobs for compile steps, defaults to the processor count
    #[arg(long)]
    jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut subscriber = tracing_subscriber::fmt().with_max_level(cli.level);

    // file and line numbers are only worth the noise when debugging
    if [Level::DEBUG, Level::TRACE].contains(&cli.level) {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    tracing::subscriber::set_global_default(subscriber.finish())?;

    match cli.command {
        Command::Build(args) => {
            let plan = resolve_plan(&args)?;

            let root = args.root.unwrap_or_else(|| PathBuf::from("/tmp/kiln"));
            let settings = KilnSettings::with_root(root).jobs(args.jobs);

            let kiln = Kiln::from_settings::<HostInvoker>(settings);
            kiln.run(&plan).await
        }

        Command::Show(args) => {
            let plan = resolve_plan(&args)?;
            println!("{:#?}", plan);

            Ok(())
        }
    }
}

fn resolve_plan(args: &PlanArgs) -> anyhow::Result<ToolchainPlan> {
    let (name, source) = match &args.plan {
        Some(path) => (
            path.display().to_string(),
            std::fs::read_to_string(path)
                .with_context(|| format!("couldn't read the plan at {}", path.display()))?,
        ),

        None => (DEFAULT_PLAN_NAME.to_string(), DEFAULT_PLAN.to_string()),
    };

    let kdl_document: KdlDocument = source.parse().map_err(|err: kdl::KdlError| {
        eprintln!("{:?}", miette::Error::new(err));
        anyhow::anyhow!("{} is not valid KDL", name)
    })?;

    let (document, errors) = Document::parse_document_with_errors(&kdl_document);

    if !errors.is_empty() {
        let count = errors.len();
        let error = miette::Error::new(KilnParserCompoundError {
            source_code: NamedSource::new(&name, source),
            errors,
        });

        eprintln!("{:?}", error);
        bail!("{} contains {} error(s)", name, count);
    }

    let mut document = match document {
        Some(document) => document,
        None => bail!("{} declares no toolchains", name),
    };

    let plan = match document.select(args.toolchain.as_deref()) {
        Some(plan) => plan,
        None => match &args.toolchain {
            Some(wanted) => bail!("{} has no toolchain named {}", name, wanted),
            None => bail!("{} declares no toolchains", name),
        },
    };

    apply_overrides(plan, args)?;
    resolve_templates(plan)?;

    Ok(plan.clone())
}

fn apply_overrides(plan: &mut ToolchainPlan, args: &PlanArgs) -> anyhow::Result<()> {
    if let Some(version) = &args.compiler_version {
        match &mut plan.compiler {
            Some(compiler) => compiler.version = version.clone(),
            None => bail!("--compiler-version was given but the plan builds no compiler"),
        }
    }

    if let Some(version) = &args.binutils_version {
        match &mut plan.binutils {
            Some(binutils) => {
                if binutils.verification.sha256.is_some() && *version != binutils.version {
                    warn!("binutils version overridden, dropping the pinned sha256");
                    binutils.verification = Verification::default();
                }

                binutils.version = version.clone();
            }

            None => bail!("--binutils-version was given but the plan builds no binutils"),
        }
    }

    if let Some(targets) = &args.targets {
        plan.targets = targets.split_whitespace().map(TargetTriple::new).collect();
    }

    if let Some(policy) = &args.on_failure {
        plan.options.on_failure = match FailurePolicy::parse(policy) {
            Some(policy) => policy,
            None => bail!(
                "unknown failure policy {}, expected \"abort\" or \"isolate\"",
                policy
            ),
        };
    }

    Ok(())
}

/// Renders {{version}} and friends inside the compiler and binutils blocks.
/// Per target patterns carry `#[skip]` on `CompilerSpec` and `BinutilsSpec`
/// and get rendered later, once a triple is in scope.
fn resolve_templates(plan: &mut ToolchainPlan) -> anyhow::Result<()> {
    if let Some(compiler) = &mut plan.compiler {
        let vars = compiler.template_vars();
        let mut replacer = TemplateExpand {
            engine: Default::default(),
            vars,
            failure: None,
        };

        compiler.visit_strings(&mut replacer);

        if let Some(err) = replacer.failure {
            return Err(err).context("couldn't render the compiler block");
        }
    }

    if let Some(binutils) = &mut plan.binutils {
        let vars = binutils.template_vars();
        let mut replacer = TemplateExpand {
            engine: Default::default(),
            vars,
            failure: None,
        };

        binutils.visit_strings(&mut replacer);

        if let Some(err) = replacer.failure {
            return Err(err).context("couldn't render the binutils block");
        }
    }

    Ok(())
}

struct TemplateExpand<'a> {
    engine: Handlebars<'a>,
    vars: ReleaseVars,
    failure: Option<handlebars::RenderError>,
}

impl StringVisitor for TemplateExpand<'_> {
    fn visit_string(&mut self, value: &mut String) {
        if self.failure.is_some() {
            return;
        }

        match self.engine.render_template(value, &self.vars) {
            Ok(rendered) => *value = rendered,
            Err(err) => self.failure = Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> PlanArgs {
        PlanArgs {
            plan: None,
            toolchain: None,
            compiler_version: None,
            binutils_version: None,
            targets: None,
            on_failure: None,
            root: None,
            jobs: None,
        }
    }

    #[test]
    fn bundled_preset_resolves_cleanly() {
        let plan = resolve_plan(&default_args()).unwrap();

        assert_eq!(plan.name, "arm-cross");
        assert_eq!(plan.targets.len(), 3);

        let compiler = plan.compiler.as_ref().unwrap();
        assert_eq!(compiler.tag, "llvmorg-17.0.6");

        let binutils = plan.binutils.as_ref().unwrap();
        assert_eq!(
            binutils.url,
            "https://ftp.gnu.org/gnu/binutils/binutils-2.41.tar.xz"
        );
        assert_eq!(binutils.source_dir, "binutils-2.41");
        assert!(binutils.verification.sha256.is_some());
        assert!(binutils.expect[0].contains("{{triple}}"));
    }

    #[test]
    fn version_overrides_flow_into_rendered_fields() {
        let mut args = default_args();
        args.compiler_version = Some("18.1.8".to_string());
        args.binutils_version = Some("2.42".to_string());

        let plan = resolve_plan(&args).unwrap();

        assert_eq!(plan.compiler.as_ref().unwrap().tag, "llvmorg-18.1.8");

        let binutils = plan.binutils.as_ref().unwrap();
        assert_eq!(
            binutils.url,
            "https://ftp.gnu.org/gnu/binutils/binutils-2.42.tar.xz"
        );
        assert_eq!(binutils.source_dir, "binutils-2.42");
        assert!(binutils.verification.sha256.is_none());
    }

    #[test]
    fn target_overrides_replace_the_list() {
        let mut args = default_args();
        args.targets = Some("riscv64-unknown-elf".to_string());

        let plan = resolve_plan(&args).unwrap();
        assert_eq!(plan.targets.len(), 1);
        assert_eq!(plan.targets[0].as_str(), "riscv64-unknown-elf");

        args.targets = Some(String::new());
        let plan = resolve_plan(&args).unwrap();
        assert!(plan.targets.is_empty());
    }

    #[test]
    fn bad_failure_policies_are_rejected() {
        let mut args = default_args();
        args.on_failure = Some("retry".to_string());
        assert!(resolve_plan(&args).is_err());

        args.on_failure = Some("isolate".to_string());
        let plan = resolve_plan(&args).unwrap();
        assert_eq!(plan.options.on_failure, FailurePolicy::Isolate);
    }

    #[test]
    fn unknown_toolchain_names_are_rejected() {
        let mut args = default_args();
        args.toolchain = Some("riscv-cross".to_string());

        assert!(resolve_plan(&args).is_err());
    }
}
