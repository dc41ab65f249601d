//! Engine for mirroring a directory tree between a local filesystem and
//! S3-compatible object storage: enumerate both sides, merge-join by
//! relative key, classify each pair, and run the resulting transfers on a
//! bounded worker pool.

pub mod compare;
pub mod diff;
pub mod enumerate;
pub mod exec;
pub mod filter;
pub mod plan;
pub mod progress;
pub mod report;
pub mod retry;
pub mod store;
pub mod sync;
pub mod url;

#[cfg(test)]
pub(crate) mod testutils;

pub use compare::SyncStrategy;
pub use report::{LogLevel, Reporter, SyncSummary};
pub use store::{ObjectStore, S3Store};
pub use sync::{sync, SyncSettings};
pub use url::{parse, validate_sync_pair, Endpoint};

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeSettings {
    /// Tokio worker threads, 0 means number of cores.
    pub max_workers: usize,
    /// Tokio blocking threads, 0 means the runtime default.
    pub max_blocking_threads: usize,
    /// Concurrently open file handles, 0 means no limit.
    pub max_open_files: usize,
    /// Operations per second across the pool, 0 means no throttle.
    pub ops_throttle: usize,
}

/// Build the runtime, install tracing, arm the throttles and run `func` to
/// completion. Returns `None` on failure; `func` is expected to have
/// reported its own errors through the [`Reporter`], so nothing extra is
/// printed here.
pub fn run<FuncType, FutureType, SummaryType>(
    verbose: u8,
    quiet: bool,
    print_summary: bool,
    runtime: &RuntimeSettings,
    func: FuncType,
) -> Option<SummaryType>
where
    FuncType: FnOnce() -> FutureType,
    FutureType: std::future::Future<Output = anyhow::Result<SummaryType>>,
    SummaryType: std::fmt::Display,
{
    let trace_level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(trace_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let tokio_runtime = match builder.build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            if !quiet {
                eprintln!("ERROR failed starting the async runtime: {:#}", error);
            }
            return None;
        }
    };
    let runtime = *runtime;
    let result = tokio_runtime.block_on(async move {
        throttle::set_max_open_files(runtime.max_open_files);
        if runtime.ops_throttle > 0 {
            throttle::init_ops_tokens(runtime.ops_throttle);
            tokio::spawn(throttle::run_ops_replenish_task(
                std::time::Duration::from_secs(1),
            ));
        }
        func().await
    });
    match result {
        Ok(summary) => {
            if print_summary {
                eprintln!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            tracing::debug!("sync failed: {:#}", &error);
            None
        }
    }
}
