use core::time::Duration;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use im::OrdMap;
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use tap::Pipe as _;
use thiserror::Error;
use tokio::sync::watch;
use types::{primitives::Epoch, state::AgnosticState};

type StateSender = watch::Sender<Option<Arc<AgnosticState>>>;

#[derive(Debug, Error)]
pub enum StateCacheError {
    #[error("could not obtain state cache lock in {} ms", timeout.as_millis())]
    CacheLockTimeout { timeout: Duration },
    #[error("state for epoch {epoch} was pruned from the cache")]
    Evicted { epoch: Epoch },
}

#[derive(Default)]
struct Entries {
    senders: OrdMap<Epoch, Arc<StateSender>>,
    floor: Epoch,
}

/// Blocking cache of decoded end-of-epoch states.
///
/// Readers may start waiting for an epoch before anything has been stored for it.
/// Every reader of an epoch receives the same [`Arc`].
pub struct StateCache {
    entries: Mutex<Entries>,
    try_lock_timeout: Duration,
}

impl StateCache {
    #[must_use]
    pub fn new(try_lock_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            try_lock_timeout,
        }
    }

    /// Publishes `state` for `epoch` and wakes all waiters.
    ///
    /// Returns `false` if a state was already published for `epoch` or `epoch` has been pruned.
    /// The first published state is kept.
    pub fn put(&self, epoch: Epoch, state: Arc<AgnosticState>) -> Result<bool> {
        let sender = {
            let mut entries = self.try_lock()?;

            if epoch < entries.floor {
                debug!("dropping state for pruned epoch {epoch}");
                return Ok(false);
            }

            Arc::clone(entries.senders.entry(epoch).or_insert_with(new_sender))
        };

        let published = sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }

            *current = Some(state);
            true
        });

        if !published {
            warn!("state for epoch {epoch} is already cached; keeping the first one");
        }

        Ok(published)
    }

    /// Waits until a state for `epoch` is published.
    ///
    /// Fails with [`StateCacheError::Evicted`] if `epoch` is pruned before or while waiting.
    pub async fn wait(&self, epoch: Epoch) -> Result<Arc<AgnosticState>> {
        let mut receiver = {
            let mut entries = self.try_lock()?;

            if epoch < entries.floor {
                return Err(anyhow!(StateCacheError::Evicted { epoch }));
            }

            entries.senders.entry(epoch).or_insert_with(new_sender).subscribe()
        };

        let state = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| StateCacheError::Evicted { epoch })?
            .clone();

        state.ok_or_else(|| anyhow!(StateCacheError::Evicted { epoch }))
    }

    pub fn get(&self, epoch: Epoch) -> Result<Option<Arc<AgnosticState>>> {
        self.try_lock()?
            .senders
            .get(&epoch)
            .and_then(|sender| sender.borrow().clone())
            .pipe(Ok)
    }

    /// Number of published states.
    pub fn len(&self) -> Result<usize> {
        self.try_lock()?
            .senders
            .values()
            .filter(|sender| sender.borrow().is_some())
            .count()
            .pipe(Ok)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|length| length == 0)
    }

    /// Removes every epoch below `floor`, including pending ones.
    ///
    /// Pending waiters on removed epochs are woken with [`StateCacheError::Evicted`].
    /// Returns the number of removed entries.
    pub fn prune(&self, floor: Epoch) -> Result<usize> {
        let mut entries = self.try_lock()?;

        if floor <= entries.floor {
            return Ok(0);
        }

        let (pruned, at_floor, mut retained) = entries.senders.split_lookup(&floor);

        if let Some(sender) = at_floor {
            retained.insert(floor, sender);
        }

        entries.senders = retained;
        entries.floor = floor;

        debug!("pruned {} cache entries below epoch {floor}", pruned.len());

        Ok(pruned.len())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Entries>> {
        let timeout = self.try_lock_timeout;

        self.entries.try_lock_for(timeout).ok_or_else(|| {
            let error = StateCacheError::CacheLockTimeout { timeout };

            warn!("{error:?}");

            anyhow!(error)
        })
    }
}

fn new_sender() -> Arc<StateSender> {
    Arc::new(watch::Sender::new(None))
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use types::primitives::H256;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn state(epoch: Epoch, root: u8) -> Arc<AgnosticState> {
        Arc::new(AgnosticState {
            epoch,
            state_root: H256::repeat_byte(root),
            ..AgnosticState::default()
        })
    }

    #[tokio::test]
    async fn test_state_cache_wait_before_put() -> Result<()> {
        let cache = Arc::new(StateCache::new(TIMEOUT));

        let waiter = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.wait(3).await }
        });

        tokio::task::yield_now().await;

        let published = state(3, 1);

        assert!(cache.put(3, Arc::clone(&published))?);
        assert!(Arc::ptr_eq(&waiter.await??, &published));

        Ok(())
    }

    #[tokio::test]
    async fn test_state_cache_all_waiters_see_same_state() -> Result<()> {
        let cache = Arc::new(StateCache::new(TIMEOUT));

        let waiters = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.wait(5).await })
            })
            .collect::<Vec<_>>();

        let published = state(5, 2);

        cache.put(5, Arc::clone(&published))?;

        for result in join_all(waiters).await {
            assert!(Arc::ptr_eq(&result??, &published));
        }

        let late = cache.wait(5).await?;

        assert!(Arc::ptr_eq(&late, &published));

        Ok(())
    }

    #[tokio::test]
    async fn test_state_cache_never_overwrites() -> Result<()> {
        let cache = StateCache::new(TIMEOUT);
        let first = state(1, 1);

        assert!(cache.put(1, Arc::clone(&first))?);
        assert!(!cache.put(1, state(1, 9))?);
        assert!(Arc::ptr_eq(&cache.wait(1).await?, &first));
        assert_eq!(cache.len()?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_state_cache_prune_evicts_waiters() -> Result<()> {
        let cache = Arc::new(StateCache::new(TIMEOUT));

        cache.put(1, state(1, 1))?;
        cache.put(4, state(4, 4))?;

        let waiter = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.wait(2).await }
        });

        tokio::task::yield_now().await;

        assert_eq!(cache.prune(4)?, 2);

        let error = waiter.await?.expect_err("pruned epoch should not resolve");

        assert!(matches!(
            error.downcast_ref(),
            Some(StateCacheError::Evicted { epoch: 2 }),
        ));

        assert!(cache.wait(1).await.is_err());
        assert!(!cache.put(3, state(3, 3))?);
        assert_eq!(cache.get(4)?, Some(state(4, 4)));
        assert_eq!(cache.len()?, 1);

        Ok(())
    }

    #[test]
    fn test_state_cache_lock_timeout() {
        let cache = StateCache::new(TIMEOUT);
        let _guard = cache.entries.lock();

        let error = cache.get(0).expect_err("lock is held");

        assert!(matches!(
            error.downcast_ref(),
            Some(StateCacheError::CacheLockTimeout { .. }),
        ));
    }
}
