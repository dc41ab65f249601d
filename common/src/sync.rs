//! One-way reconciliation: enumerate both sides, join, classify, execute.

use anyhow::Result;
use std::sync::Arc;

use crate::compare::SyncStrategy;
use crate::diff::MergeJoin;
use crate::enumerate;
use crate::exec::{self, ExecSettings};
use crate::filter::FilterSettings;
use crate::plan::{Decision, Planner};
use crate::report::{Reporter, SyncSummary};
use crate::store::ObjectStore;
use crate::url::Endpoint;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Delete destination objects missing from the source.
    pub delete: bool,
    /// Compare sizes instead of modification times.
    pub size_only: bool,
    pub dry_run: bool,
    /// Cancel everything after the first failed operation.
    pub fail_early: bool,
    /// Worker-pool size; also the operation channel capacity.
    pub concurrency: usize,
    /// Keys matching any of these globs are invisible on both sides.
    pub exclude: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            delete: false,
            size_only: false,
            dry_run: false,
            fail_early: false,
            concurrency: 5,
            exclude: Vec::new(),
        }
    }
}

/// Make `dst` mirror `src`. Endpoints must already be validated with
/// [`crate::url::validate_sync_pair`]. Per-operation failures are reported
/// and reflected in the summary's error count; an enumeration failure
/// aborts the run with an error after reporting it.
pub async fn sync(
    store: Arc<dyn ObjectStore>,
    src: Endpoint,
    dst: Endpoint,
    settings: SyncSettings,
    reporter: Arc<Reporter>,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<SyncSummary> {
    let filter = FilterSettings::parse(&settings.exclude)?;
    let strategy = if settings.size_only {
        SyncStrategy::SizeOnly
    } else {
        SyncStrategy::ModTime
    };
    let planner = Planner::new(settings.delete, strategy);
    let src = Arc::new(src);
    let dst = Arc::new(dst);

    let src_records = enumerate::spawn(store.clone(), (*src).clone(), filter.clone());
    let dst_records = enumerate::spawn(store.clone(), (*dst).clone(), filter);

    let (op_tx, op_rx) = async_channel::bounded(settings.concurrency.max(1));
    let executor = tokio::spawn(exec::execute(
        store,
        src.clone(),
        dst.clone(),
        op_rx,
        reporter.clone(),
        cancel.clone(),
        ExecSettings {
            concurrency: settings.concurrency,
            fail_early: settings.fail_early,
            dry_run: settings.dry_run,
        },
    ));

    let mut join = MergeJoin::new(src_records, dst_records);
    let walk_result: Result<()> = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }
        match join.next().await {
            Ok(Some(pair)) => match planner.plan(pair) {
                Decision::Run(operation) => {
                    // blocks when the pool is busy, which is what bounds
                    // total in-flight work
                    if op_tx.send(operation).await.is_err() {
                        break Ok(());
                    }
                }
                Decision::Skip { key, reason } => {
                    reporter
                        .skipped(&src.join_display(&key), &dst.join_display(&key), reason)
                        .await;
                }
                Decision::Ignore => {}
            },
            Ok(None) => break Ok(()),
            Err(error) => {
                cancel.cancel();
                break Err(error);
            }
        }
    };
    drop(op_tx);
    executor.await??;

    match walk_result {
        Ok(()) => Ok(reporter.summary()),
        Err(error) => {
            reporter
                .failed(&src.display_root(), &dst.display_root(), &error)
                .await;
            Err(error)
        }
    }
}
