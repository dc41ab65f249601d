//! Bounded worker pool driving the transfer primitive.
//!
//! Workers pull operations from a shared bounded channel, so enumeration
//! back-pressure falls out of the channel capacity. Remote deletes are
//! accumulated and flushed through the store's bulk-delete call; local
//! deletes unlink one file at a time. Cancellation is observed between
//! operations: a cancelled worker drains without starting new transfers.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::plan::Operation;
use crate::report::Reporter;
use crate::store::ObjectStore;
use crate::url::Endpoint;

/// The S3 bulk-delete call accepts at most this many keys.
pub const DELETE_BATCH_MAX: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct ExecSettings {
    pub concurrency: usize,
    pub fail_early: bool,
    pub dry_run: bool,
}

/// Run operations until the channel closes or the token fires. Worker
/// panics propagate; per-operation failures are reported and counted but
/// do not stop the pool unless `fail_early` is set.
pub async fn execute(
    store: Arc<dyn ObjectStore>,
    src: Arc<Endpoint>,
    dst: Arc<Endpoint>,
    operations: async_channel::Receiver<Operation>,
    reporter: Arc<Reporter>,
    cancel: tokio_util::sync::CancellationToken,
    settings: ExecSettings,
) -> Result<()> {
    let batcher = Arc::new(DeleteBatcher {
        store: store.clone(),
        src: src.clone(),
        dst: dst.clone(),
        reporter: reporter.clone(),
        dry_run: settings.dry_run,
        pending: tokio::sync::Mutex::new(Vec::new()),
    });
    let mut join_set = tokio::task::JoinSet::new();
    for _ in 0..settings.concurrency.max(1) {
        let worker = Worker {
            store: store.clone(),
            src: src.clone(),
            dst: dst.clone(),
            operations: operations.clone(),
            reporter: reporter.clone(),
            cancel: cancel.clone(),
            batcher: batcher.clone(),
            settings,
        };
        join_set.spawn(worker.run());
    }
    while let Some(joined) = join_set.join_next().await {
        joined?;
    }
    if !cancel.is_cancelled() {
        batcher.finish().await;
    }
    Ok(())
}

struct Worker {
    store: Arc<dyn ObjectStore>,
    src: Arc<Endpoint>,
    dst: Arc<Endpoint>,
    operations: async_channel::Receiver<Operation>,
    reporter: Arc<Reporter>,
    cancel: tokio_util::sync::CancellationToken,
    batcher: Arc<DeleteBatcher>,
    settings: ExecSettings,
}

impl Worker {
    async fn run(self) {
        loop {
            let operation = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.operations.recv() => match received {
                    Ok(operation) => operation,
                    Err(_) => break, // channel closed, no more work
                },
            };
            // the recv arm can win a race against a simultaneous cancel;
            // re-check so no new transfer starts after the signal
            if self.cancel.is_cancelled() {
                break;
            }
            throttle::get_ops_token().await;
            if let Err(error) = self.run_operation(&operation).await {
                let key = operation.key();
                self.reporter
                    .failed(
                        &self.src.join_display(key),
                        &self.dst.join_display(key),
                        &error,
                    )
                    .await;
                if self.settings.fail_early {
                    self.cancel.cancel();
                }
            }
        }
    }

    async fn run_operation(&self, operation: &Operation) -> Result<()> {
        tracing::debug!("executing {:?}", operation);
        match operation {
            Operation::Copy { src } => self.copy(src).await,
            Operation::Delete { key } => self.delete(key).await,
        }
    }

    async fn copy(&self, record: &crate::enumerate::ObjectRecord) -> Result<()> {
        let key = &record.key;
        let src_display = self.src.join_display(key);
        let dst_display = self.dst.join_display(key);
        match (&*self.src, &*self.dst) {
            (Endpoint::Local(local), Endpoint::Remote(remote)) => {
                if !self.settings.dry_run {
                    self.store
                        .upload(&local.path_of(key), &remote.bucket, &remote.absolute_key(key))
                        .await?;
                }
                self.reporter
                    .transferred("upload", &src_display, &dst_display, record.size)
                    .await;
            }
            (Endpoint::Remote(remote), Endpoint::Local(local)) => {
                if !self.settings.dry_run {
                    self.store
                        .download(&remote.bucket, &remote.absolute_key(key), &local.path_of(key))
                        .await?;
                }
                self.reporter
                    .transferred("download", &src_display, &dst_display, record.size)
                    .await;
            }
            (Endpoint::Remote(src_remote), Endpoint::Remote(dst_remote)) => {
                if !self.settings.dry_run {
                    self.store
                        .copy_object(
                            &src_remote.bucket,
                            &src_remote.absolute_key(key),
                            &dst_remote.bucket,
                            &dst_remote.absolute_key(key),
                        )
                        .await?;
                }
                self.reporter
                    .transferred("copy", &src_display, &dst_display, record.size)
                    .await;
            }
            (Endpoint::Local(_), Endpoint::Local(_)) => {
                unreachable!("local->local pairs are rejected before planning")
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match &*self.dst {
            Endpoint::Local(local) => {
                let path = local.path_of(key);
                if !self.settings.dry_run {
                    tokio::fs::remove_file(&path)
                        .await
                        .with_context(|| format!("failed removing {:?}", path))?;
                }
                self.reporter.deleted(&self.dst.join_display(key)).await;
            }
            Endpoint::Remote(_) => self.batcher.push(key.to_string()).await,
        }
        Ok(())
    }
}

/// Accumulates remote deletes up to [`DELETE_BATCH_MAX`] keys per call.
/// Keys that fail inside an otherwise successful response each get their
/// own error line; keys that succeed get their own `delete` line.
struct DeleteBatcher {
    store: Arc<dyn ObjectStore>,
    src: Arc<Endpoint>,
    dst: Arc<Endpoint>,
    reporter: Arc<Reporter>,
    dry_run: bool,
    pending: tokio::sync::Mutex<Vec<String>>,
}

impl DeleteBatcher {
    async fn push(&self, key: String) {
        let full_batch = {
            let mut pending = self.pending.lock().await;
            pending.push(key);
            if pending.len() >= DELETE_BATCH_MAX {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };
        if let Some(batch) = full_batch {
            self.flush(batch).await;
        }
    }

    async fn finish(&self) {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        if !batch.is_empty() {
            self.flush(batch).await;
        }
    }

    async fn flush(&self, keys: Vec<String>) {
        let Endpoint::Remote(remote) = &*self.dst else {
            unreachable!("delete batching only runs for remote destinations")
        };
        if self.dry_run {
            for key in &keys {
                self.reporter.deleted(&self.dst.join_display(key)).await;
            }
            return;
        }
        let absolute: Vec<String> = keys.iter().map(|key| remote.absolute_key(key)).collect();
        match self.store.delete_objects(&remote.bucket, &absolute).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    let key = outcome
                        .key
                        .strip_prefix(remote.prefix.as_str())
                        .unwrap_or(&outcome.key);
                    match outcome.error {
                        None => self.reporter.deleted(&self.dst.join_display(key)).await,
                        Some(reason) => {
                            self.reporter
                                .failed(
                                    &self.src.join_display(key),
                                    &self.dst.join_display(key),
                                    &reason,
                                )
                                .await
                        }
                    }
                }
            }
            Err(error) => {
                self.reporter
                    .failed(&self.src.display_root(), &self.dst.display_root(), &error)
                    .await;
            }
        }
    }
}
