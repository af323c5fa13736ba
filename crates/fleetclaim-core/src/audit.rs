//! Append-only human audit log
//!
//! Validation runs append one block per run (header, summary, one line per
//! row). Claim runs append an execution banner and then timestamped lines as
//! they happen, so a crash still leaves a partial trail.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// One audit line, optionally tied to an input line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub level: AuditLevel,
    pub line: Option<usize>,
    pub message: String,
}

impl AuditEntry {
    pub fn info(line: Option<usize>, message: impl Into<String>) -> Self {
        Self { level: AuditLevel::Info, line, message: message.into() }
    }

    pub fn warn(line: Option<usize>, message: impl Into<String>) -> Self {
        Self { level: AuditLevel::Warn, line, message: message.into() }
    }

    pub fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self { level: AuditLevel::Error, line, message: message.into() }
    }
}

impl std::fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}][Line {}] {}", self.level, line, self.message),
            None => write!(f, "[{}] {}", self.level, self.message),
        }
    }
}

/// Audit log file handle
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())
    }

    /// Append a complete run block: header, summary, entries, separator
    pub fn write_run(
        &self,
        title: &str,
        summary: &str,
        entries: &[AuditEntry],
    ) -> std::io::Result<()> {
        let mut block = format!("--- {}: {} ---\n{}\n", title, now(), summary);
        for entry in entries {
            block.push_str(&entry.to_string());
            block.push('\n');
        }
        block.push_str(&"-".repeat(50));
        block.push_str("\n\n");
        self.append(&block)
    }

    /// Append the banner that opens a streamed execution
    pub fn start_execution(&self) -> std::io::Result<()> {
        let rule = "=".repeat(60);
        self.append(&format!(
            "\n{rule}\n--- NEW EXECUTION START: {} ---\n{rule}\n",
            now()
        ))
    }

    /// Append one timestamped entry and mirror it to tracing.
    ///
    /// Write failures are logged, never propagated.
    pub fn record(&self, entry: AuditEntry) {
        match entry.level {
            AuditLevel::Info => info!(line = ?entry.line, "{}", entry.message),
            AuditLevel::Warn => warn!(line = ?entry.line, "{}", entry.message),
            AuditLevel::Error => error!(line = ?entry.line, "{}", entry.message),
        }
        if let Err(e) = self.append(&format!("[{}] {}\n", now(), entry)) {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit log");
        }
    }
}

fn now() -> String {
    Local::now().format(LOG_TIMESTAMP_FORMAT).to_string()
}
