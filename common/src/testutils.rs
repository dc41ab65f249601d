//! Shared fixtures: a scratch directory layout, an in-memory object store
//! standing in for the transfer primitive, and a capturing writer for
//! asserting reporter output.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::store::{DeleteOutcome, ListPage, ObjectStore, StoreEntry};

pub async fn create_temp_dir() -> Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("rmir_test{}", &idx));
        if let Err(error) = tokio::fs::create_dir(&tmp_dir).await {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

/// Scratch tree used across the enumerator and executor tests:
///
/// foo
/// |- 0.txt
/// |- bar
///    |- 1.txt
///    |- 2.txt
///    |- 3.txt
/// |- baz
///    |- 4.txt
///    |- 5.txt -> ../bar/2.txt
/// |- link -> bar
pub async fn setup_test_dir() -> Result<std::path::PathBuf> {
    let tmp_dir = create_temp_dir().await?;
    let foo_path = tmp_dir.join("foo");
    tokio::fs::create_dir(&foo_path).await.unwrap();
    tokio::fs::write(foo_path.join("0.txt"), "0").await.unwrap();
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await.unwrap();
    tokio::fs::write(bar_path.join("1.txt"), "1").await.unwrap();
    tokio::fs::write(bar_path.join("2.txt"), "2").await.unwrap();
    tokio::fs::write(bar_path.join("3.txt"), "3").await.unwrap();
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await.unwrap();
    tokio::fs::write(baz_path.join("4.txt"), "4").await.unwrap();
    tokio::fs::symlink("../bar/2.txt", baz_path.join("5.txt"))
        .await
        .unwrap();
    tokio::fs::symlink("bar", foo_path.join("link")).await.unwrap();
    Ok(tmp_dir)
}

pub async fn cleanup(tmp_dir: &std::path::Path) {
    let _ = tokio::fs::remove_dir_all(tmp_dir).await;
}

struct MemoryObject {
    data: Vec<u8>,
    mtime: std::time::SystemTime,
}

/// In-memory [`ObjectStore`] keyed by (bucket, key). Listing is served in
/// deliberately small pages so pagination handling gets exercised, and
/// failures can be injected for the retry and partial-batch paths.
pub struct MemoryStore {
    objects: std::sync::Mutex<BTreeMap<(String, String), MemoryObject>>,
    page_size: usize,
    fail_lists: std::sync::atomic::AtomicU32,
    fail_deletes: std::sync::Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            objects: std::sync::Mutex::new(BTreeMap::new()),
            page_size: 2,
            fail_lists: std::sync::atomic::AtomicU32::new(0),
            fail_deletes: std::sync::Mutex::new(HashSet::new()),
        })
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8], mtime: std::time::SystemTime) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            MemoryObject {
                data: data.to_vec(),
                mtime,
            },
        );
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.data.clone())
    }

    /// The next `count` list calls fail with a transient error.
    pub fn fail_next_lists(&self, count: u32) {
        self.fail_lists
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    /// Bulk deletes of `key` report a per-key error instead of deleting.
    pub fn fail_delete_of(&self, key: &str) {
        self.fail_deletes.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        if self
            .fail_lists
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .is_ok()
        {
            return Err(anyhow!("injected listing failure"));
        }
        let guard = self.objects.lock().unwrap();
        let mut entries: Vec<StoreEntry> = guard
            .iter()
            .filter(|((b, k), _)| {
                b == bucket
                    && k.starts_with(prefix)
                    && continuation
                        .as_deref()
                        .map_or(true, |token| k.as_str() > token)
            })
            .take(self.page_size + 1)
            .map(|((_, k), object)| StoreEntry {
                key: k.clone(),
                size: object.data.len() as u64,
                mtime: object.mtime,
                storage_class: None,
            })
            .collect();
        let next_token = if entries.len() > self.page_size {
            entries.truncate(self.page_size);
            entries.last().map(|entry| entry.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    async fn upload(&self, src: &std::path::Path, bucket: &str, key: &str) -> Result<u64> {
        let data = tokio::fs::read(src)
            .await
            .with_context(|| format!("cannot open {:?} for reading", src))?;
        let size = data.len() as u64;
        self.put(bucket, key, &data, std::time::SystemTime::now());
        Ok(size)
    }

    async fn download(&self, bucket: &str, key: &str, dst: &std::path::Path) -> Result<u64> {
        let data = self
            .object(bucket, key)
            .ok_or_else(|| anyhow!("no such object s3://{}/{}", bucket, key))?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory {:?}", parent))?;
        }
        tokio::fs::write(dst, &data)
            .await
            .with_context(|| format!("cannot open {:?} for writing", dst))?;
        Ok(data.len() as u64)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let data = self
            .object(src_bucket, src_key)
            .ok_or_else(|| anyhow!("no such object s3://{}/{}", src_bucket, src_key))?;
        self.put(dst_bucket, dst_key, &data, std::time::SystemTime::now());
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let failing = self.fail_deletes.lock().unwrap().clone();
        let mut guard = self.objects.lock().unwrap();
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            if failing.contains(key) {
                outcomes.push(DeleteOutcome {
                    key: key.clone(),
                    error: Some("AccessDenied: injected delete failure".to_string()),
                });
                continue;
            }
            guard.remove(&(bucket.to_string(), key.clone()));
            outcomes.push(DeleteOutcome {
                key: key.clone(),
                error: None,
            });
        }
        Ok(outcomes)
    }
}

/// Capturing `AsyncWrite` for reporter assertions.
#[derive(Clone, Default)]
pub struct BufSink(Arc<std::sync::Mutex<Vec<u8>>>);

impl BufSink {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines_sorted(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.contents().lines().map(str::to_string).collect();
        lines.sort();
        lines
    }
}

impl tokio::io::AsyncWrite for BufSink {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}
