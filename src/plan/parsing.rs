use crate::plan::{
    BinutilsSpec, CompilerSpec, Document, FailurePolicy, HostPrep, PlanOptions, TargetTriple,
    ToolchainPlan, Verification,
};
use kdl::{KdlDocument, KdlEntry, KdlNode};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[error("Failed parsing toolchain plan")]
pub struct KilnParserCompoundError {
    #[source_code]
    pub source_code: NamedSource,
    #[related]
    pub(crate) errors: Vec<KilnParseError>,
}

#[derive(Debug, Diagnostic, Eq, PartialEq, Error)]
#[error("{kind}")]
pub struct KilnParseError {
    /// Offset in chars of the error.
    #[label("{}", label.unwrap_or("here"))]
    pub span: SourceSpan,

    /// Label text for this span. Defaults to `"here"`.
    pub label: Option<&'static str>,

    /// Suggestion for fixing the parser error.
    #[help]
    pub help: Option<String>,

    /// Specific error kind for this parser error.
    pub kind: &'static str,
}

const EMPTY_NODES: &[KdlNode] = &[];

pub(crate) trait GetNodes {
    fn nodes(&self) -> &[KdlNode];
}

impl GetNodes for KdlNode {
    fn nodes(&self) -> &[KdlNode] {
        self.children().map_or(EMPTY_NODES, |x| x.nodes())
    }
}

pub trait ParseDocument {
    fn parse_document(
        input: &KdlDocument,
        source: &str,
        filename: Option<&str>,
    ) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let (data, errors) = Self::parse_document_with_errors(input);
        data.ok_or_else(|| {
            KilnParserCompoundError {
                source_code: NamedSource::new(
                    filename
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "[plan.kdl]".to_string()),
                    source.to_string(),
                ),
                errors,
            }
            .into()
        })
    }

    fn parse_document_strict(
        input: &KdlDocument,
        source: &str,
        filename: Option<&str>,
    ) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let (data, errors) = Self::parse_document_with_errors(input);

        match data {
            Some(obj) if errors.is_empty() => Ok(obj),

            _ => Err(KilnParserCompoundError {
                source_code: NamedSource::new(
                    filename
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "[plan.kdl]".to_string()),
                    source.to_string(),
                ),
                errors,
            }
            .into()),
        }
    }

    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized;
}

pub trait ParseNode {
    fn parse_node_strict(
        input: &KdlNode,
        source: &str,
        filename: Option<&str>,
    ) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let (data, errors) = Self::parse_node_with_errors(input);

        match data {
            Some(obj) if errors.is_empty() => Ok(obj),

            _ => Err(KilnParserCompoundError {
                source_code: NamedSource::new(
                    filename
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "[plan.kdl]".to_string()),
                    source.to_string(),
                ),
                errors,
            }
            .into()),
        }
    }

    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized;
}

#[macro_export]
macro_rules! parse_string_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        use $crate::plan::parsing::extract_single_string_value;

        match extract_single_string_value(
            $input,
            concat!($name, " missing"),
            concat!($name, " should be a string"),
            concat!("only 1 string expected for ", $name),
            concat!($name, " expected a value, property found instead"),
        ) {
            Ok(n) => $into = n.into(),
            Err(e) => $errors.push(e),
        };
    };
}

#[macro_export]
macro_rules! parse_bool_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        use $crate::plan::parsing::extract_single_bool_value;

        match extract_single_bool_value(
            $input,
            concat!($name, " missing"),
            concat!($name, " should be a bool"),
            concat!("only 1 bool expected for ", $name),
            concat!($name, " expected a value, property found instead"),
        ) {
            Ok(n) => $into = n.into(),
            Err(e) => $errors.push(e),
        };
    };
}

#[macro_export]
macro_rules! parse_string_list_into {
    ($input:ident, $into:ident, $errors:expr, $name:literal) => {
        use $crate::plan::parsing::{extract_string_values, ListExtHelper};

        match extract_string_values(
            $input,
            concat!($name, " expects only string values"),
            concat!($name, " expected values, property found instead"),
        ) {
            Ok(n) => $into.add(n),
            Err(e) => $errors.push(e),
        };
    };
}

#[macro_export]
macro_rules! parse_string_list_ext_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        use $crate::plan::parsing::{extract_string_values_with_extend, ListExtHelper};

        match extract_string_values_with_extend(
            $input,
            concat!($name, " expects only string values"),
            concat!($name, " expected values, property found instead"),
        ) {
            Ok((n, true)) => $into.add(n),
            Ok((n, false)) => $into.set(n),
            Err(e) => $errors.push(e),
        };
    };
}

pub trait ListExtHelper<T> {
    fn add(&mut self, value: Vec<T>);
    fn set(&mut self, value: Vec<T>);
}

impl<T> ListExtHelper<T> for Vec<T> {
    fn add(&mut self, value: Vec<T>) {
        self.extend(value);
    }

    fn set(&mut self, value: Vec<T>) {
        *self = value;
    }
}

impl<T> ListExtHelper<T> for Option<Vec<T>> {
    fn add(&mut self, value: Vec<T>) {
        if let Some(data) = self {
            data.extend(value)
        } else {
            *self = Some(value)
        }
    }

    fn set(&mut self, value: Vec<T>) {
        *self = Some(value);
    }
}

impl ParseDocument for Document {
    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut toolchains = vec![];
        let mut errors = vec![];

        for node in input.nodes() {
            match node.name().value() {
                "toolchain" => {
                    let (toolchain, err) = ToolchainPlan::parse_node_with_errors(node);
                    if let Some(toolchain) = toolchain {
                        toolchains.push(toolchain);
                    }
                    errors.extend(err);
                }

                _ => {}
            }
        }

        (Some(Document { toolchains }), errors)
    }
}

impl ParseNode for ToolchainPlan {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut errors: Vec<KilnParseError> = vec![];

        let mut name: String = "<unnamed>".to_string();
        let mut description: String = "".to_string();
        let mut host: Option<HostPrep> = None;
        let mut compiler: Option<CompilerSpec> = None;
        let mut binutils: Option<BinutilsSpec> = None;
        let mut target_names: Vec<String> = vec![];
        let mut targets_span: Option<SourceSpan> = None;
        let mut options: Option<PlanOptions> = None;

        parse_string_into!(input, name, errors, "name of toolchain");
        for node in input.nodes() {
            match node.name().value() {
                "description" => {
                    parse_string_into!(node, description, errors, "description");
                }

                "host" => {
                    let (prep, err) = HostPrep::parse_node_with_errors(node);
                    errors.extend(err);

                    if let Some(prep) = prep {
                        host = Some(prep);
                    }
                }

                "compiler" => {
                    if compiler.is_some() {
                        errors.push(KilnParseError {
                            span: *node.span(),
                            label: Some("second compiler block here"),
                            help: None,
                            kind: "redefinition of compiler, a toolchain builds one compiler",
                        });
                        continue;
                    }

                    let (spec, err) = CompilerSpec::parse_node_with_errors(node);
                    errors.extend(err);

                    if let Some(spec) = spec {
                        compiler = Some(spec);
                    }
                }

                "binutils" => {
                    if binutils.is_some() {
                        errors.push(KilnParseError {
                            span: *node.span(),
                            label: Some("second binutils block here"),
                            help: None,
                            kind: "redefinition of binutils, all targets share one source",
                        });
                        continue;
                    }

                    let (spec, err) = BinutilsSpec::parse_node_with_errors(node);
                    errors.extend(err);

                    if let Some(spec) = spec {
                        binutils = Some(spec);
                    }
                }

                "targets" => {
                    targets_span = Some(*node.span());
                    parse_string_list_ext_into!(node, target_names, errors, "targets");
                }

                "options" => {
                    let (opt, err) = PlanOptions::parse_node_with_errors(node);
                    errors.extend(err);

                    if let Some(opt) = opt {
                        options = Some(opt);
                    }
                }

                _ => {}
            }
        }

        if binutils.is_none() && !target_names.is_empty() {
            if let Some(span) = targets_span {
                errors.push(KilnParseError {
                    span,
                    label: Some("targets declared here"),
                    help: Some("add a binutils block naming the version to build".to_string()),
                    kind: "targets declared without a binutils definition",
                });
            }
        }

        (
            Some(ToolchainPlan {
                name,
                description,
                host: host.unwrap_or_default(),
                compiler,
                binutils,
                targets: target_names.into_iter().map(TargetTriple::new).collect(),
                options: options.unwrap_or_default(),
            }),
            errors,
        )
    }
}

impl ParseNode for HostPrep {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut errors = vec![];
        let mut packages: Vec<String> = vec![];
        let mut refresh_command: Option<Vec<String>> = None;
        let mut install_command: Option<Vec<String>> = None;

        for node in input.nodes() {
            match node.name().value() {
                "packages" => {
                    parse_string_list_ext_into!(node, packages, errors, "packages");
                }

                "refresh-command" => {
                    parse_string_list_into!(node, refresh_command, errors, "refresh-command");
                }

                "install-command" => {
                    parse_string_list_into!(node, install_command, errors, "install-command");
                }

                _ => {}
            }
        }

        (
            Some(HostPrep {
                packages,
                refresh_command: refresh_command
                    .unwrap_or_else(|| owned_list(HostPrep::DEFAULT_REFRESH)),
                install_command: install_command
                    .unwrap_or_else(|| owned_list(HostPrep::DEFAULT_INSTALL)),
            }),
            errors,
        )
    }
}

impl ParseNode for CompilerSpec {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut errors = vec![];
        let mut found_version = false;
        let mut version: String = "0.0.0".to_string();
        let mut repository: Option<String> = None;
        let mut tag: Option<String> = None;
        let mut found_preset = false;
        let mut preset: String = String::new();
        let mut build_dir: Option<String> = None;
        let mut prefix: Option<String> = None;
        let mut backends: Vec<String> = vec![];

        for node in input.nodes() {
            match node.name().value() {
                "version" => {
                    found_version = true;
                    parse_string_into!(node, version, errors, "version");
                }

                "repository" => {
                    parse_string_into!(node, repository, errors, "repository");
                }

                "tag" => {
                    parse_string_into!(node, tag, errors, "tag");
                }

                "preset" => {
                    found_preset = true;
                    parse_string_into!(node, preset, errors, "preset");
                }

                "build-dir" => {
                    parse_string_into!(node, build_dir, errors, "build-dir");
                }

                "prefix" => {
                    parse_string_into!(node, prefix, errors, "prefix");
                }

                "backends" => {
                    parse_string_list_ext_into!(node, backends, errors, "backends");
                }

                _ => {}
            }
        }

        if !found_version {
            errors.push(KilnParseError {
                span: *input.span(),
                label: None,
                help: None,
                kind: "compiler missing version",
            });
        }

        if !found_preset {
            errors.push(KilnParseError {
                span: *input.span(),
                label: None,
                help: Some("name the configure preset the compiler checkout provides".to_string()),
                kind: "compiler missing preset",
            });
        }

        (
            Some(CompilerSpec {
                repository: repository
                    .unwrap_or_else(|| CompilerSpec::DEFAULT_REPOSITORY.to_string()),
                tag: tag.unwrap_or_else(|| "llvmorg-{{version}}".to_string()),
                build_dir: build_dir.unwrap_or_else(|| "build".to_string()),
                prefix: prefix.unwrap_or_else(|| "/usr/local".to_string()),
                version,
                preset,
                backends,
            }),
            errors,
        )
    }
}

impl ParseNode for BinutilsSpec {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let (verification, mut errors) = Verification::parse_node_with_errors(input);

        let verification = if let Some(ver) = verification {
            ver
        } else {
            return (None, errors);
        };

        let mut found_version = false;
        let mut version: String = "0.0.0".to_string();
        let mut url: Option<String> = None;
        let mut source_dir: Option<String> = None;
        let mut prefix_base: Option<String> = None;
        let mut configure_args: Option<Vec<String>> = None;
        let mut expect: Vec<String> = vec![];

        for node in input.nodes() {
            match node.name().value() {
                "version" => {
                    found_version = true;
                    parse_string_into!(node, version, errors, "version");
                }

                "url" => {
                    parse_string_into!(node, url, errors, "url");
                }

                "source-dir" => {
                    parse_string_into!(node, source_dir, errors, "source-dir");
                }

                "prefix-base" => {
                    parse_string_into!(node, prefix_base, errors, "prefix-base");
                }

                "configure-args" => {
                    parse_string_list_ext_into!(node, configure_args, errors, "configure-args");
                }

                "expect" => {
                    parse_string_list_ext_into!(node, expect, errors, "expect");
                }

                _ => {}
            }
        }

        if !found_version {
            errors.push(KilnParseError {
                span: *input.span(),
                label: None,
                help: None,
                kind: "binutils missing version",
            });
        }

        (
            Some(BinutilsSpec {
                url: url.unwrap_or_else(|| {
                    format!(
                        "{}/binutils-{{{{version}}}}.tar.xz",
                        BinutilsSpec::DEFAULT_RELEASE_HOST
                    )
                }),
                source_dir: source_dir.unwrap_or_else(|| "binutils-{{version}}".to_string()),
                prefix_base: prefix_base.unwrap_or_else(|| "/usr/local".to_string()),
                configure_args: configure_args
                    .unwrap_or_else(|| owned_list(BinutilsSpec::DEFAULT_CONFIGURE_ARGS)),
                expect,
                version,
                verification,
            }),
            errors,
        )
    }
}

impl ParseNode for Verification {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut errors = vec![];
        let mut sha256 = None;
        for node in input.nodes() {
            match node.name().value() {
                "sha256" => {
                    let mut hex_value = None;
                    parse_string_into!(node, hex_value, errors, "sha256");

                    if let Some(hex_value) = hex_value {
                        match hex::decode(hex_value) {
                            Ok(v) if v.len() != 32 => errors.push(KilnParseError {
                                span: *node.entries().first().unwrap().span(),
                                label: None,
                                help: None,
                                kind: "expected 32 byte long hex string for sha256",
                            }),
                            Ok(v) => sha256 = Some(v.try_into().unwrap()),
                            Err(v) => errors.push(KilnParseError {
                                span: *node.entries().first().unwrap().span(),
                                label: None,
                                help: Some(format!("{}", v)),
                                kind: "invalid hex string",
                            }),
                        }
                    }
                }
                _ => {}
            }
        }

        (Some(Verification { sha256 }), errors)
    }
}

impl ParseNode for PlanOptions {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<KilnParseError>)
    where
        Self: Sized,
    {
        let mut errors = vec![];
        let mut strip = None;
        let mut on_failure = FailurePolicy::default();

        for node in input.nodes() {
            match node.name().value() {
                "strip" => {
                    parse_bool_into!(node, strip, errors, "strip");
                }

                "on-failure" => {
                    let mut policy: Option<String> = None;
                    parse_string_into!(node, policy, errors, "on-failure");

                    if let Some(policy) = policy {
                        match FailurePolicy::parse(&policy) {
                            Some(parsed) => on_failure = parsed,
                            None => errors.push(KilnParseError {
                                span: *node.entries().first().unwrap().span(),
                                label: None,
                                help: Some("expected \"abort\" or \"isolate\"".to_string()),
                                kind: "unknown failure policy",
                            }),
                        }
                    }
                }

                _ => {}
            }
        }

        (Some(PlanOptions { strip, on_failure }), errors)
    }
}

fn owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn extract_single_entry<'a>(
    input: &'a KdlNode,
    missing_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<&'a KdlEntry, KilnParseError> {
    match input.entries().len() {
        0 => Err(KilnParseError {
            span: *input.name().span(),
            label: None,
            help: None,
            kind: missing_error,
        }),

        1 => {
            let entry = input.entries().first().unwrap();

            if entry.name().is_some() {
                return Err(KilnParseError {
                    span: *entry.span(),
                    label: None,
                    help: None,
                    kind: property_found_error,
                });
            }

            Ok(entry)
        }

        _ => {
            let start_args = input.entries().first().unwrap().span().offset();
            let end_args = input
                .entries()
                .last()
                .map(|x| x.span().len() + x.span().offset())
                .unwrap();

            let span = SourceSpan::new(start_args.into(), (end_args - start_args).into());
            Err(KilnParseError {
                span,
                label: None,
                help: None,
                kind: too_many_error,
            })
        }
    }
}

pub(crate) fn extract_single_string_value(
    input: &KdlNode,
    missing_error: &'static str,
    wrong_type_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<String, KilnParseError> {
    let entry = extract_single_entry(input, missing_error, too_many_error, property_found_error)?;

    match entry.value().as_string() {
        Some(v) => Ok(v.to_string()),
        None => Err(KilnParseError {
            span: *entry.span(),
            label: None,
            help: None,
            kind: wrong_type_error,
        }),
    }
}

pub(crate) fn extract_single_bool_value(
    input: &KdlNode,
    missing_error: &'static str,
    wrong_type_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<bool, KilnParseError> {
    let entry = extract_single_entry(input, missing_error, too_many_error, property_found_error)?;

    match entry.value().as_bool() {
        Some(v) => Ok(v),
        None => Err(KilnParseError {
            span: *entry.span(),
            label: None,
            help: None,
            kind: wrong_type_error,
        }),
    }
}

pub(crate) fn extract_string_values(
    input: &KdlNode,
    wrong_type_error: &'static str,
    property_found_error: &'static str,
) -> Result<Vec<String>, KilnParseError> {
    let mut values = vec![];

    for entry in input.entries() {
        if entry.name().is_some() {
            return Err(KilnParseError {
                span: *entry.span(),
                label: None,
                help: None,
                kind: property_found_error,
            });
        }

        if let Some(v) = entry.value().as_string() {
            values.push(v.to_string());
        } else {
            return Err(KilnParseError {
                span: *entry.span(),
                label: None,
                help: None,
                kind: wrong_type_error,
            });
        }
    }

    Ok(values)
}

pub(crate) fn extract_string_values_with_extend(
    input: &KdlNode,
    wrong_type_error: &'static str,
    property_found_error: &'static str,
) -> Result<(Vec<String>, bool), KilnParseError> {
    let mut values = vec![];

    let mut first = true;
    let mut extends = true;

    for entry in input.entries() {
        if first && entry.name().map_or(false, |k| k.value() == "extends") {
            if let Some(v) = entry.value().as_bool() {
                extends = v;
            } else {
                return Err(KilnParseError {
                    span: *entry.span(),
                    label: None,
                    help: None,
                    kind: "extends expects a bool",
                });
            }

            continue;
        }

        first = false;

        if entry.name().is_some() {
            return Err(KilnParseError {
                span: *entry.span(),
                label: None,
                help: None,
                kind: property_found_error,
            });
        }

        if let Some(v) = entry.value().as_string() {
            values.push(v.to_string());
        } else {
            return Err(KilnParseError {
                span: *entry.span(),
                label: None,
                help: None,
                kind: wrong_type_error,
            });
        }
    }

    Ok((values, extends))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Option<Document>, Vec<KilnParseError>) {
        let doc: KdlDocument = src.parse().unwrap();
        Document::parse_document_with_errors(&doc)
    }

    fn error_kinds(errors: &[KilnParseError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn parses_complete_toolchain() {
        let src = r#"
toolchain "arm-cross" {
    description "Clang/LLVM plus GNU binutils for ARM targets"

    host {
        packages "cmake" "ninja-build" "git"
    }

    compiler {
        version "17.0.6"
        preset "cross-release"
        backends "ARM" "AArch64"
    }

    binutils {
        version "2.41"
        sha256 "ae9a5789e23459e59606e6714723f2d3ffc31c03174191ef0d015bdf06007450"
        expect "bin/{{triple}}-as" "bin/{{triple}}-ld.gold"
    }

    targets "arm-none-eabi" "armv7-unknown-linux-gnueabihf" "aarch64-unknown-linux-gnu"

    options {
        strip true
        on-failure "isolate"
    }
}
"#;

        let (document, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let document = document.unwrap();
        assert_eq!(document.toolchains.len(), 1);

        let plan = &document.toolchains[0];
        assert_eq!(plan.name, "arm-cross");
        assert_eq!(plan.host.packages, vec!["cmake", "ninja-build", "git"]);
        assert_eq!(plan.host.refresh_command, vec!["apt-get", "update"]);
        assert_eq!(plan.targets.len(), 3);
        assert_eq!(plan.targets[0].as_str(), "arm-none-eabi");
        assert_eq!(plan.options.strip, Some(true));
        assert_eq!(plan.options.on_failure, FailurePolicy::Isolate);

        let compiler = plan.compiler.as_ref().unwrap();
        assert_eq!(compiler.version, "17.0.6");
        assert_eq!(compiler.tag, "llvmorg-{{version}}");
        assert_eq!(compiler.repository, CompilerSpec::DEFAULT_REPOSITORY);
        assert_eq!(compiler.backends, vec!["ARM", "AArch64"]);

        let binutils = plan.binutils.as_ref().unwrap();
        assert_eq!(binutils.version, "2.41");
        assert_eq!(
            binutils.url,
            "https://ftp.gnu.org/gnu/binutils/binutils-{{version}}.tar.xz"
        );
        assert_eq!(binutils.source_dir, "binutils-{{version}}");
        assert_eq!(
            binutils.configure_args,
            vec!["--enable-gold", "--enable-ld=default", "--disable-multilib"]
        );
        assert_eq!(binutils.expect.len(), 2);

        let sha = binutils.verification.sha256.unwrap();
        assert_eq!(sha[0], 0xae);
        assert_eq!(sha[31], 0x50);
    }

    #[test]
    fn binutils_missing_version_is_reported() {
        let src = r#"
toolchain "arm-cross" {
    binutils {
        url "https://example.invalid/binutils.tar.xz"
    }
}
"#;

        let (_, errors) = parse(src);
        assert!(error_kinds(&errors).contains(&"binutils missing version"));
    }

    #[test]
    fn targets_require_a_binutils_block() {
        let src = r#"
toolchain "arm-cross" {
    targets "arm-none-eabi"
}
"#;

        let (_, errors) = parse(src);
        assert!(
            error_kinds(&errors).contains(&"targets declared without a binutils definition")
        );
    }

    #[test]
    fn compiler_requires_version_and_preset() {
        let src = r#"
toolchain "arm-cross" {
    compiler {
        repository "https://example.invalid/llvm.git"
    }
}
"#;

        let (_, errors) = parse(src);
        let kinds = error_kinds(&errors);
        assert!(kinds.contains(&"compiler missing version"));
        assert!(kinds.contains(&"compiler missing preset"));
    }

    #[test]
    fn second_compiler_block_is_rejected() {
        let src = r#"
toolchain "arm-cross" {
    compiler {
        version "17.0.6"
        preset "a"
    }
    compiler {
        version "18.1.0"
        preset "b"
    }
}
"#;

        let (_, errors) = parse(src);
        assert!(error_kinds(&errors)
            .contains(&"redefinition of compiler, a toolchain builds one compiler"));
    }

    #[test]
    fn unknown_failure_policy_is_rejected() {
        let src = r#"
toolchain "arm-cross" {
    options {
        on-failure "retry"
    }
}
"#;

        let (_, errors) = parse(src);
        assert!(error_kinds(&errors).contains(&"unknown failure policy"));
    }

    #[test]
    fn short_sha256_is_rejected() {
        let src = r#"
toolchain "arm-cross" {
    binutils {
        version "2.41"
        sha256 "ae9a5789"
    }
}
"#;

        let (_, errors) = parse(src);
        assert!(
            error_kinds(&errors).contains(&"expected 32 byte long hex string for sha256")
        );
    }

    #[test]
    fn targets_can_be_replaced_with_extends_false() {
        let src = r#"
toolchain "arm-cross" {
    binutils {
        version "2.41"
    }
    targets "arm-none-eabi"
    targets extends=false "aarch64-unknown-linux-gnu"
}
"#;

        let (document, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let document = document.unwrap();
        let plan = &document.toolchains[0];
        assert_eq!(plan.targets.len(), 1);
        assert_eq!(plan.targets[0].as_str(), "aarch64-unknown-linux-gnu");
    }

    #[test]
    fn strict_parse_rejects_documents_with_errors() {
        let src = r#"
toolchain "arm-cross" {
    targets "arm-none-eabi"
}
"#;

        let doc: KdlDocument = src.parse().unwrap();
        assert!(Document::parse_document_strict(&doc, src, None).is_err());
    }
}
