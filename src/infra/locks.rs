use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-tutor async locks. A booking holds its tutor's guard across the
/// conflict check and the write so two overlapping requests cannot both pass.
#[derive(Clone, Default)]
pub struct ScheduleLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ScheduleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, tutor_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(tutor_id.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_tutor_is_serialised() {
        let locks = ScheduleLocks::new();
        let guard = locks.lock("usr_a").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock("usr_a").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_tutors_do_not_block() {
        let locks = ScheduleLocks::new();
        let _a = locks.lock("usr_a").await;
        tokio::time::timeout(Duration::from_millis(100), locks.lock("usr_b"))
            .await
            .unwrap();
    }
}
