//! Observable output.
//!
//! Operation lines go to stdout, error lines to stderr, skip diagnostics to
//! stdout only at debug level. Each writer sits behind a mutex so lines from
//! concurrent workers never interleave; everything else about output order
//! is unspecified.

use anyhow::anyhow;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::progress::SyncProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "error" => Ok(LogLevel::Error),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(anyhow!(
                "invalid log level {:?}, expected error, info or debug",
                other
            )),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>>;

pub struct Reporter {
    level: LogLevel,
    out: SharedWriter,
    err: SharedWriter,
    pub progress: SyncProgress,
}

impl Reporter {
    pub fn new(level: LogLevel) -> Self {
        Self::with_writers(
            level,
            Box::new(tokio::io::stdout()),
            Box::new(tokio::io::stderr()),
        )
    }

    pub fn with_writers(
        level: LogLevel,
        out: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
        err: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
    ) -> Self {
        Self {
            level,
            out: Arc::new(tokio::sync::Mutex::new(out)),
            err: Arc::new(tokio::sync::Mutex::new(err)),
            progress: SyncProgress::new(),
        }
    }

    async fn write_line(writer: &SharedWriter, line: String) {
        let mut guard = writer.lock().await;
        // a report line that cannot be written has nowhere left to go
        let _ = guard.write_all(line.as_bytes()).await;
        let _ = guard.flush().await;
    }

    /// `verb` is `upload`, `download` or `copy`.
    pub async fn transferred(&self, verb: &str, src: &str, dst: &str, bytes: u64) {
        self.progress.copied.inc();
        self.progress.bytes_transferred.add(bytes);
        Self::write_line(&self.out, format!("{} {} {}\n", verb, src, dst)).await;
    }

    pub async fn deleted(&self, target: &str) {
        self.progress.deleted.inc();
        Self::write_line(&self.out, format!("delete {}\n", target)).await;
    }

    pub async fn skipped(&self, src: &str, dst: &str, reason: &str) {
        self.progress.skipped.inc();
        if self.level == LogLevel::Debug {
            Self::write_line(
                &self.out,
                format!("DEBUG \"sync {} {}\": {}\n", src, dst, reason),
            )
            .await;
        }
    }

    pub async fn failed<ReasonType: std::fmt::Display>(
        &self,
        src: &str,
        dst: &str,
        reason: &ReasonType,
    ) {
        self.progress.errors.inc();
        Self::write_line(
            &self.err,
            format!("ERROR \"sync {} {}\": {:#}\n", src, dst, reason),
        )
        .await;
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            objects_copied: self.progress.copied.get(),
            objects_deleted: self.progress.deleted.get(),
            objects_skipped: self.progress.skipped.get(),
            bytes_transferred: self.progress.bytes_transferred.get(),
            errors: self.progress.errors.get(),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub objects_copied: u64,
    pub objects_deleted: u64,
    pub objects_skipped: u64,
    pub bytes_transferred: u64,
    pub errors: u64,
}

impl std::ops::Add for SyncSummary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            objects_copied: self.objects_copied + other.objects_copied,
            objects_deleted: self.objects_deleted + other.objects_deleted,
            objects_skipped: self.objects_skipped + other.objects_skipped,
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
            errors: self.errors + other.errors,
        }
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "objects copied: {}\n\
            objects deleted: {}\n\
            objects skipped: {}\n\
            bytes transferred: {}\n\
            errors: {}",
            self.objects_copied,
            self.objects_deleted,
            self.objects_skipped,
            bytesize::ByteSize(self.bytes_transferred),
            self.errors,
        )
    }
}
