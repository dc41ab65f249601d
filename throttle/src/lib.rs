mod semaphore;

static OPEN_FILES_LIMIT: semaphore::Limiter = semaphore::Limiter::new();
static OPS_THROTTLE: semaphore::Limiter = semaphore::Limiter::new();

pub fn set_max_open_files(max_open_files: usize) {
    OPEN_FILES_LIMIT.arm(max_open_files);
}

pub struct OpenFileGuard {
    _permit: Option<tokio::sync::SemaphorePermit<'static>>,
}

/// Hold the returned guard for as long as the file handle is open.
pub async fn open_file_permit() -> OpenFileGuard {
    OpenFileGuard {
        _permit: OPEN_FILES_LIMIT.acquire().await,
    }
}

pub fn init_ops_tokens(ops_tokens: usize) {
    OPS_THROTTLE.arm(ops_tokens);
}

/// Consume one operations/sec token; a no-op unless `init_ops_tokens` ran.
pub async fn get_ops_token() {
    OPS_THROTTLE.consume().await;
}

pub async fn run_ops_replenish_task(interval: std::time::Duration) {
    OPS_THROTTLE.run_replenish_task(interval).await;
}
