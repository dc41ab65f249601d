/// Limiter that stays inert until `arm` gives it a budget.
///
/// Armed state is the presence of the inner semaphore: before `arm` runs
/// there is nothing to contend on and every call is a single pointer load.
/// The budget is remembered so a replenish task can top spent permits back
/// up to it.
pub struct Limiter {
    inner: std::sync::OnceLock<Budget>,
}

struct Budget {
    limit: usize,
    sem: tokio::sync::Semaphore,
}

impl Limiter {
    pub const fn new() -> Self {
        Self {
            inner: std::sync::OnceLock::new(),
        }
    }

    /// Arm with `limit` permits; zero leaves the limiter inert. Only the
    /// first non-zero call takes effect.
    pub fn arm(&self, limit: usize) {
        if limit == 0 {
            return;
        }
        let _ = self.inner.set(Budget {
            limit,
            sem: tokio::sync::Semaphore::new(limit),
        });
    }

    /// Borrow a permit for the duration of the returned guard; `None` when
    /// the limiter was never armed.
    pub async fn acquire(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        let budget = self.inner.get()?;
        // the semaphore is never closed
        Some(budget.sem.acquire().await.unwrap())
    }

    /// Spend a permit without returning it; paired with `run_replenish_task`.
    pub async fn consume(&self) {
        if let Some(budget) = self.inner.get() {
            budget.sem.acquire().await.unwrap().forget();
        }
    }

    /// Periodically restore consumed permits up to the armed budget.
    pub async fn run_replenish_task(&self, interval: std::time::Duration) {
        let Some(budget) = self.inner.get() else {
            return;
        };
        loop {
            tokio::time::sleep(interval).await;
            let missing = budget.limit.saturating_sub(budget.sem.available_permits());
            if missing > 0 {
                budget.sem.add_permits(missing);
            }
        }
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}
