//! Writes replay reports to stdout and/or files in one shared format.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::DocumentFormat;
use crate::replay::ReplayReport;

/// Where a rendered report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Stdout,
    File(PathBuf),
}

impl ReportTarget {
    /// `-` means stdout; anything else is a file path.
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            ReportTarget::Stdout
        } else {
            ReportTarget::File(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    format: DocumentFormat,
    pretty: bool,
    targets: Vec<ReportTarget>,
}

impl ReportWriter {
    pub fn new(format: DocumentFormat, pretty: bool, targets: Vec<ReportTarget>) -> Self {
        Self {
            format,
            pretty,
            targets,
        }
    }

    pub fn render(&self, report: &ReplayReport) -> Result<String> {
        let mut rendered = match self.format {
            DocumentFormat::Json if self.pretty => serde_json::to_string_pretty(report)?,
            DocumentFormat::Json => serde_json::to_string(report)?,
            #[cfg(feature = "yaml")]
            DocumentFormat::Yaml => serde_yaml::to_string(report)?,
            #[cfg(feature = "toml")]
            DocumentFormat::Toml if self.pretty => toml::to_string_pretty(report)?,
            #[cfg(feature = "toml")]
            DocumentFormat::Toml => toml::to_string(report)?,
        };
        if !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// Renders once and writes the same text to every target.
    pub fn write(&self, report: &ReplayReport) -> Result<()> {
        let rendered = self
            .render(report)
            .with_context(|| format!("failed to render report as {}", self.format))?;
        for target in &self.targets {
            match target {
                ReportTarget::Stdout => {
                    let mut stdout = io::stdout().lock();
                    stdout
                        .write_all(rendered.as_bytes())
                        .and_then(|_| stdout.flush())
                        .context("failed to write report to stdout")?;
                }
                ReportTarget::File(path) => fs::write(path, &rendered)
                    .with_context(|| format!("failed to write report to {}", path.display()))?,
            }
        }
        Ok(())
    }
}
