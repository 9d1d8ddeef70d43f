use tracing::warn;

use crate::issue_key::IssueKey;

use super::service::LockService;
use super::LockError;

/// Proof of holding a lock.
///
/// Call [`LockGuard::release`] to give the lock back. A guard dropped without
/// an explicit release (panic, cancelled future) spawns the release on the
/// current tokio runtime; outside a runtime the lock is left to expire.
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard {
    service: LockService,
    key: IssueKey,
    held_value: String,
    released: bool,
}

impl LockGuard {
    pub(super) fn new(service: LockService, key: IssueKey, held_value: String) -> Self {
        Self {
            service,
            key,
            held_value,
            released: false,
        }
    }

    pub fn key(&self) -> &IssueKey {
        &self.key
    }

    /// Releases the lock. Returns `false` if it had already expired or was
    /// taken over by another holder.
    pub async fn release(mut self) -> Result<bool, LockError> {
        self.released = true;
        self.service.release(&self.key, &self.held_value).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = self.service.clone();
                let key = self.key.clone();
                let held_value = std::mem::take(&mut self.held_value);
                handle.spawn(async move {
                    if let Err(e) = service.release(&key, &held_value).await {
                        warn!("Deferred release of lock {} failed: {}", key, e);
                    }
                });
            }
            Err(_) => {
                warn!(
                    "Lock guard for {} dropped outside a runtime, lock will expire after its TTL",
                    self.key
                );
            }
        }
    }
}
