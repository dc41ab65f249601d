use anyhow::Result;
use structopt::StructOpt;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "rmir",
    about = "`rmir` mirrors a directory tree between a local filesystem and S3-compatible object \
    storage, transferring many objects concurrently.

The destination is made to match the source: new and updated objects are copied, unchanged \
objects are skipped, and with --delete, objects only present at the destination are removed. \
Either side may be a local directory or an s3://bucket[/prefix] location; local->local is not \
supported."
)]
struct Args {
    /// Delete destination objects that are missing from the source
    #[structopt(long)]
    delete: bool,

    /// Compare object sizes instead of modification times
    #[structopt(long = "size-only")]
    size_only: bool,

    /// Show what would be transferred without transferring anything
    #[structopt(long = "dry-run")]
    dry_run: bool,

    /// Leave keys matching this glob out of the sync; may be given multiple times
    #[structopt(long, number_of_values = 1)]
    exclude: Vec<String>,

    /// Operation log level. Options are: error, info, debug (debug also prints why each object
    /// was skipped)
    #[structopt(long, default_value = "info")]
    log: common::LogLevel,

    /// Exit on first error
    #[structopt(short = "-e", long = "fail-early")]
    fail_early: bool,

    /// Number of concurrent transfers
    #[structopt(long, default_value = "5")]
    concurrency: usize,

    /// Use this S3 endpoint instead of the AWS default, e.g. a MinIO address; implies path-style
    /// addressing
    #[structopt(long = "endpoint-url")]
    endpoint_url: Option<String>,

    /// Print summary at the end
    #[structopt(long)]
    summary: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR))
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[structopt(short = "q", long = "quiet")]
    quiet: bool,

    /// Sync source: local directory or s3://bucket[/prefix]
    #[structopt()]
    source: String,

    /// Sync destination: local directory or s3://bucket[/prefix]
    #[structopt()]
    destination: String,

    /// Number of worker threads, 0 means number of cores
    #[structopt(long, default_value = "0")]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[structopt(long, default_value = "0")]
    max_blocking_threads: usize,

    /// Maximum number of open files, 0 means no limit
    #[structopt(long, default_value = "0")]
    max_open_files: usize,

    /// Throttle the number of operations per second, 0 means no throttle
    #[structopt(long, default_value = "0")]
    ops_throttle: usize,
}

async fn async_main(args: Args) -> Result<common::SyncSummary> {
    let reporter = std::sync::Arc::new(common::Reporter::new(args.log));
    let source = match common::parse(&args.source) {
        Ok(endpoint) => endpoint,
        Err(error) => {
            reporter
                .failed(&args.source, &args.destination, &error)
                .await;
            return Err(error);
        }
    };
    let destination = match common::parse(&args.destination) {
        Ok(endpoint) => endpoint,
        Err(error) => {
            reporter
                .failed(&args.source, &args.destination, &error)
                .await;
            return Err(error);
        }
    };
    if let Err(error) = common::validate_sync_pair(&source, &destination) {
        reporter
            .failed(&args.source, &args.destination, &error)
            .await;
        return Err(error);
    }
    let store: std::sync::Arc<dyn common::ObjectStore> =
        std::sync::Arc::new(common::S3Store::from_env(args.endpoint_url.as_deref()).await);
    let cancel = tokio_util::sync::CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });
    let settings = common::SyncSettings {
        delete: args.delete,
        size_only: args.size_only,
        dry_run: args.dry_run,
        fail_early: args.fail_early,
        concurrency: args.concurrency,
        exclude: args.exclude.clone(),
    };
    common::sync(store, source, destination, settings, reporter, cancel).await
}

fn main() {
    let args = Args::from_args();
    let runtime = common::RuntimeSettings {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
        max_open_files: args.max_open_files,
        ops_throttle: args.ops_throttle,
    };
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    match common::run(args.verbose, args.quiet, args.summary, &runtime, func) {
        Some(summary) if summary.errors == 0 => {}
        _ => std::process::exit(1),
    }
}
