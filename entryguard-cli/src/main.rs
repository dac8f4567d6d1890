//! `entryguard` replays scripted editing sessions and prints what the
//! editor would end up showing: the persisted status blob plus one report
//! per mounted field.

use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use entryguard::{
    Fixture,
    io::{DocumentFormat, ReportTarget, ReportWriter, parse_document_any},
    replay,
};

#[derive(Debug, Parser)]
#[command(
    name = "entryguard",
    version,
    about = "Replay editing sessions through the entryguard validation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a fixture and print the resulting validation state
    Replay(ReplayArgs),
    /// Check that a fixture is well formed without running it
    Check {
        /// Fixture spec: file path, inline payload, or "-" for stdin
        #[arg(value_name = "SPEC")]
        spec: String,
    },
}

#[derive(Debug, clap::Args)]
struct ReplayArgs {
    /// Fixture spec: file path, inline payload, or "-" for stdin
    #[arg(value_name = "SPEC")]
    spec: String,

    /// Output destinations ("-" writes to stdout). Accepts multiple values per flag use.
    #[arg(short = 'o', long = "output", value_name = "DEST", num_args = 1.., action = ArgAction::Append)]
    outputs: Vec<String>,

    /// Emit compact JSON/TOML rather than pretty formatting
    #[arg(long = "no-pretty")]
    no_pretty: bool,

    /// Overwrite output files even if they already exist
    #[arg(short = 'f', long = "force", short_alias = 'y', alias = "yes")]
    force: bool,

    /// Log engine activity to stderr
    #[arg(long = "debug")]
    debug: bool,
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => run_replay(args),
        Command::Check { spec } => {
            let fixture = load_fixture(&spec)?;
            println!(
                "fixture ok: {} field(s), {} step(s)",
                fixture.fields.len(),
                fixture.steps.len()
            );
            Ok(())
        }
    }
}

fn run_replay(args: ReplayArgs) -> Result<()> {
    init_tracing(args.debug);

    let mut diagnostics = DiagnosticCollector::default();
    let fixture = match load_fixture(&args.spec) {
        Ok(fixture) => Some(fixture),
        Err(err) => {
            diagnostics.push_input("fixture", err.to_string());
            None
        }
    };
    let (writer, paths) = build_report_writer(&args, &mut diagnostics);
    ensure_output_paths_available(&paths, args.force, &mut diagnostics);
    diagnostics.into_result()?;

    let fixture = fixture.ok_or_else(|| eyre!("fixture failed to load"))?;
    let report = replay::run(&fixture)?;
    writer.write(&report).map_err(|err| eyre!("{err:#}"))
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("entryguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("entryguard=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_fixture(spec: &str) -> Result<Fixture> {
    let format = if spec == "-" {
        DocumentFormat::default()
    } else {
        match probe_format_from_extension(Path::new(spec)) {
            ExtensionFormat::Known(format) => format,
            ExtensionFormat::UnsupportedFeature {
                format_name,
                feature_flag,
            } => {
                return Err(eyre!(
                    "fixture '{spec}' requires {format_name} support, but this build lacks the '{feature_flag}' feature"
                ));
            }
            ExtensionFormat::Unknown => DocumentFormat::default(),
        }
    };
    let value = load_value(spec, format, "fixture")?;
    Ok(Fixture::from_value(value)?)
}

fn load_value(spec: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    if spec == "-" {
        let contents = read_from_source(&InputSource::Stdin)?;
        return parse_contents(&contents, format, label);
    }

    let path = PathBuf::from(spec);
    match read_from_source(&InputSource::File(path.clone())) {
        Ok(contents) => parse_contents(&contents, format, label),
        Err(err) => {
            if is_not_found(&err) {
                let inline_label = format!("inline {label}");
                return parse_contents(spec, format, &inline_label);
            }
            Err(err.wrap_err(format!("failed to load {label} from {}", path.display())))
        }
    }
}

fn read_from_source(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .wrap_err("failed to read from stdin")?;
            Ok(buffer)
        }
        InputSource::File(path) => fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read file {}", path.display())),
    }
}

fn is_not_found(err: &Report) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

fn parse_contents(contents: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    parse_document_any(contents, format).map_err(|primary| {
        eyre!(
            "failed to parse {label}: tried {} (first error: {primary})",
            format_list()
        )
    })
}

fn format_list() -> String {
    let items: Vec<String> = DocumentFormat::available_formats()
        .into_iter()
        .map(|fmt| fmt.to_string())
        .collect();
    items.join(", ")
}

#[derive(Default)]
struct DiagnosticCollector {
    messages: Vec<String>,
}

impl DiagnosticCollector {
    fn push_input(&mut self, label: &str, message: impl Into<String>) {
        self.messages
            .push(format!("input ({label}): {}", message.into()));
    }

    fn push_output(&mut self, message: impl Into<String>) {
        self.messages.push(format!("output: {}", message.into()));
    }

    fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let mut body = String::from("encountered input/output issues:\n");
        for (idx, msg) in self.messages.iter().enumerate() {
            let _ = writeln!(body, "  {}. {}", idx + 1, msg);
        }
        Err(eyre!(body))
    }
}

/// Reports go to stdout unless `-o` names files; files pick the format
/// from their extension.
fn build_report_writer(
    args: &ReplayArgs,
    diagnostics: &mut DiagnosticCollector,
) -> (ReportWriter, Vec<PathBuf>) {
    let mut targets = Vec::new();
    for raw in &args.outputs {
        if raw.trim().is_empty() {
            diagnostics.push_output("output destination cannot be empty");
            continue;
        }
        targets.push(ReportTarget::parse(raw));
    }
    if targets.is_empty() {
        targets.push(ReportTarget::Stdout);
    }

    let file_paths: Vec<PathBuf> = targets
        .iter()
        .filter_map(|target| match target {
            ReportTarget::File(path) => Some(path.clone()),
            ReportTarget::Stdout => None,
        })
        .collect();

    let format = infer_format_from_files(&file_paths, diagnostics).unwrap_or_default();
    (ReportWriter::new(format, !args.no_pretty, targets), file_paths)
}

fn infer_format_from_files(
    file_paths: &[PathBuf],
    diagnostics: &mut DiagnosticCollector,
) -> Option<DocumentFormat> {
    let mut detected: Option<DocumentFormat> = None;
    for path in file_paths {
        match probe_format_from_extension(path) {
            ExtensionFormat::Known(format) => match detected {
                Some(existing) if existing != format => diagnostics.push_output(format!(
                    "output file {} uses {format} but other destinations use {existing}; align extensions",
                    path.display()
                )),
                Some(_) => {}
                None => detected = Some(format),
            },
            ExtensionFormat::UnsupportedFeature {
                format_name,
                feature_flag,
            } => diagnostics.push_output(format!(
                "output file {} requires {format_name} support, but this build was compiled without the '{feature_flag}' feature",
                path.display()
            )),
            ExtensionFormat::Unknown => diagnostics.push_output(format!(
                "cannot infer format from output file {}; use .json/.yaml/.toml",
                path.display()
            )),
        }
    }
    detected
}

fn probe_format_from_extension(path: &Path) -> ExtensionFormat {
    if let Some(format) = DocumentFormat::from_path(path) {
        return ExtensionFormat::Known(format);
    }
    let Some(ext) = path.extension() else {
        return ExtensionFormat::Unknown;
    };
    match ext.to_string_lossy().to_ascii_lowercase().as_str() {
        "yaml" | "yml" => ExtensionFormat::UnsupportedFeature {
            format_name: "yaml",
            feature_flag: "yaml",
        },
        "toml" => ExtensionFormat::UnsupportedFeature {
            format_name: "toml",
            feature_flag: "toml",
        },
        _ => ExtensionFormat::Unknown,
    }
}

#[derive(Debug)]
enum ExtensionFormat {
    Known(DocumentFormat),
    UnsupportedFeature {
        format_name: &'static str,
        feature_flag: &'static str,
    },
    Unknown,
}

fn ensure_output_paths_available(
    paths: &[PathBuf],
    force: bool,
    diagnostics: &mut DiagnosticCollector,
) {
    if force {
        return;
    }
    for path in paths {
        if path.exists() {
            diagnostics.push_output(format!(
                "file {} already exists (pass --force to overwrite)",
                path.display()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve_to_formats() {
        assert!(matches!(
            probe_format_from_extension(Path::new("session.json")),
            ExtensionFormat::Known(DocumentFormat::Json)
        ));
        assert!(matches!(
            probe_format_from_extension(Path::new("session.txt")),
            ExtensionFormat::Unknown
        ));
    }

    #[test]
    fn inline_fixtures_are_accepted() {
        let fixture = load_fixture(
            r#"{"entry":{"id":"e1","contentTypeId":"page"},"fields":[],"steps":[]}"#,
        )
        .expect("inline fixture");
        assert_eq!(fixture.entry.id, "e1");
    }

    #[test]
    fn mixed_output_extensions_are_reported() {
        let mut diagnostics = DiagnosticCollector::default();
        let paths = vec![PathBuf::from("a.json"), PathBuf::from("b.txt")];
        infer_format_from_files(&paths, &mut diagnostics);
        assert_eq!(diagnostics.messages.len(), 1);
    }
}
