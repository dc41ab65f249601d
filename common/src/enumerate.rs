//! Endpoint enumeration.
//!
//! Each enumerator runs on its own task and feeds records through a bounded
//! channel, so production is coupled to consumption. Object-store listing
//! arrives sorted from the service; the filesystem walk buffers and sorts
//! before emitting because `read_dir` promises no order. Listing failures
//! are retried with backoff and abort the sync if they persist.

use anyhow::{anyhow, Context, Result};
use async_recursion::async_recursion;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::filter::FilterSettings;
use crate::retry;
use crate::store::ObjectStore;
use crate::url::{Endpoint, LocalEndpoint, RemoteEndpoint};

/// Records buffered between an enumerator and the differ.
pub const ENUMERATE_BUFFER_SIZE: usize = 1000;

/// One object on either side of the sync. `key` is the forward-slash
/// relative path from the endpoint root, never with a leading slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
    pub mtime: std::time::SystemTime,
    /// Carried through from the store but never interpreted.
    pub storage_class: Option<String>,
}

/// Spawn the enumerator task for `endpoint`. The stream ends when the
/// channel closes; an `Err` item means enumeration failed and the sync
/// must abort.
pub fn spawn(
    store: Arc<dyn ObjectStore>,
    endpoint: Endpoint,
    filter: FilterSettings,
) -> mpsc::Receiver<Result<ObjectRecord>> {
    let (tx, rx) = mpsc::channel(ENUMERATE_BUFFER_SIZE);
    tokio::spawn(async move {
        let result = match &endpoint {
            Endpoint::Local(local) => enumerate_local(local, &filter, &tx).await,
            Endpoint::Remote(remote) => enumerate_remote(&*store, remote, &filter, &tx).await,
        };
        if let Err(error) = result {
            let _ = tx.send(Err(error)).await;
        }
    });
    rx
}

async fn enumerate_local(
    local: &LocalEndpoint,
    filter: &FilterSettings,
    tx: &mpsc::Sender<Result<ObjectRecord>>,
) -> Result<()> {
    let canonical_root = match tokio::fs::canonicalize(&local.root).await {
        Ok(root) => root,
        // a destination that does not exist yet is an empty enumeration;
        // a missing source was already rejected at validation
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => {
            return Err(error)
                .with_context(|| format!("cannot resolve directory {:?}", local.root))
        }
    };
    let mut visited = std::collections::HashSet::new();
    visited.insert(canonical_root);
    let mut records = Vec::new();
    walk(&local.root, &local.root, true, filter, &mut visited, &mut records).await?;
    records.sort_by(|a, b| a.key.cmp(&b.key));
    for record in records {
        if tx.send(Ok(record)).await.is_err() {
            // consumer went away (cancellation); nothing left to do
            break;
        }
    }
    Ok(())
}

#[async_recursion]
async fn walk(
    root: &std::path::Path,
    dir: &std::path::Path,
    top_level: bool,
    filter: &FilterSettings,
    visited: &mut std::collections::HashSet<std::path::PathBuf>,
    out: &mut Vec<ObjectRecord>,
) -> Result<()> {
    let mut entries = retry::with_retry("directory listing", || async {
        tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("cannot open directory {:?} for reading", dir))
    })
    .await?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", dir))?
    {
        let path = entry.path();
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .with_context(|| format!("failed reading metadata from {:?}", path))?;
        let followed_link = metadata.is_symlink();
        let metadata = if followed_link {
            if !top_level {
                // links below the top level are not followed
                continue;
            }
            tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("cannot resolve symlink {:?}", path))?
        } else {
            metadata
        };
        if metadata.is_dir() {
            if followed_link {
                let canonical = tokio::fs::canonicalize(&path)
                    .await
                    .with_context(|| format!("cannot resolve symlink {:?}", path))?;
                if !visited.insert(canonical) {
                    return Err(anyhow!("filesystem cycle detected at {:?}", path));
                }
            }
            walk(root, &path, false, filter, visited, out).await?;
        } else if metadata.is_file() {
            let key = relative_key(root, &path)?;
            if filter.excludes(&key) {
                continue;
            }
            out.push(ObjectRecord {
                key,
                size: metadata.len(),
                mtime: metadata
                    .modified()
                    .with_context(|| format!("failed reading mtime from {:?}", path))?,
                storage_class: None,
            });
        }
        // sockets, fifos and such are skipped
    }
    Ok(())
}

fn relative_key(root: &std::path::Path, path: &std::path::Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{:?} is not under {:?}", path, root))?;
    let parts = relative
        .components()
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .ok_or_else(|| anyhow!("path {:?} is not valid unicode", path))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

async fn enumerate_remote(
    store: &dyn ObjectStore,
    remote: &RemoteEndpoint,
    filter: &FilterSettings,
    tx: &mpsc::Sender<Result<ObjectRecord>>,
) -> Result<()> {
    let mut continuation: Option<String> = None;
    loop {
        let page = retry::with_retry("object listing", || {
            let continuation = continuation.clone();
            async move {
                store
                    .list_page(&remote.bucket, &remote.prefix, continuation)
                    .await
            }
        })
        .await?;
        for entry in page.entries {
            if !remote.key_matches(&entry.key) {
                continue;
            }
            let Some(key) = remote.relative_key(&entry.key) else {
                // the prefix marker object itself
                continue;
            };
            if filter.excludes(key) {
                continue;
            }
            let record = ObjectRecord {
                key: key.to_string(),
                size: entry.size,
                mtime: entry.mtime,
                storage_class: entry.storage_class,
            };
            if tx.send(Ok(record)).await.is_err() {
                return Ok(());
            }
        }
        match page.next_token {
            Some(token) => continuation = Some(token),
            None => return Ok(()),
        }
    }
}
