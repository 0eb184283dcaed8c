use core::sync::atomic::{AtomicU64, Ordering};
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::watch;

struct Entry<T> {
    generation: u64,
    outcome: watch::Sender<Option<T>>,
}

/// Registry of keys that are currently being worked on.
///
/// The first caller to acquire a key becomes its holder and receives a [`Page`].
/// Later callers of the same key wait for the holder and receive whatever it published.
/// If the holder goes away without publishing, one of the waiters becomes the new holder.
/// A [`Page`] only ever frees the entry it created, even if the key was freed and acquired again.
pub struct AcquireBook<T> {
    name: &'static str,
    pages: Mutex<HashMap<String, Entry<T>>>,
    generations: AtomicU64,
    live: watch::Sender<usize>,
}

pub enum Acquisition<T: Clone + Send + Sync + 'static> {
    Holder(Page<T>),
    Follower(T),
}

impl<T: Clone + Send + Sync + 'static> AcquireBook<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pages: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            live: watch::Sender::new(0),
        }
    }

    pub async fn acquire(self: &Arc<Self>, key: impl Into<String>) -> Acquisition<T> {
        let key = key.into();

        loop {
            let mut receiver = {
                let mut pages = self.pages.lock();

                if let Some(entry) = pages.get(&key) {
                    entry.outcome.subscribe()
                } else {
                    let generation = self.generations.fetch_add(1, Ordering::Relaxed);

                    pages.insert(
                        key.clone(),
                        Entry {
                            generation,
                            outcome: watch::Sender::new(None),
                        },
                    );

                    self.live.send_modify(|live| *live += 1);

                    trace!("{} book: acquired {key}", self.name);

                    return Acquisition::Holder(Page {
                        book: Arc::clone(self),
                        key,
                        generation,
                        released: false,
                    });
                }
            };

            debug!("{} book: {key} is in flight, waiting for holder", self.name);

            let outcome = receiver
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|outcome| (*outcome).clone());

            if let Some(outcome) = outcome {
                return Acquisition::Follower(outcome);
            }
        }
    }

    /// Clears `key` without publishing an outcome.
    ///
    /// Returns `true` if `key` was in flight.
    pub fn free_page(&self, key: &str) -> bool {
        self.release(key, None, None)
    }

    #[must_use]
    pub fn live_keys(&self) -> Vec<String> {
        let mut keys = self.pages.lock().keys().cloned().collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        *self.live.borrow()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once no key is in flight.
    pub async fn wait_until_empty(&self) -> Result<()> {
        self.live.subscribe().wait_for(|live| *live == 0).await?;
        Ok(())
    }

    // `generation` restricts the release to the entry a page created.
    fn release(&self, key: &str, generation: Option<u64>, outcome: Option<T>) -> bool {
        let entry = {
            let mut pages = self.pages.lock();

            match pages.get(key) {
                Some(entry) if generation.unwrap_or(entry.generation) == entry.generation => {
                    pages.remove(key)
                }
                _ => None,
            }
        };

        let Some(entry) = entry else {
            return false;
        };

        if let Some(outcome) = outcome {
            entry.outcome.send_replace(Some(outcome));
        }

        self.live.send_modify(|live| *live -= 1);

        trace!("{} book: freed {key}", self.name);

        true
    }
}

/// Exclusive hold on one key of an [`AcquireBook`].
///
/// The key is freed when the page is published, freed or dropped.
pub struct Page<T: Clone + Send + Sync + 'static> {
    book: Arc<AcquireBook<T>>,
    key: String,
    generation: u64,
    released: bool,
}

impl<T: Clone + Send + Sync + 'static> Page<T> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Hands `outcome` to every caller waiting on this key and frees it.
    pub fn publish(mut self, outcome: T) {
        self.released = true;
        self.book.release(&self.key, Some(self.generation), Some(outcome));
    }

    pub fn free(mut self) {
        self.released = true;
        self.book.release(&self.key, Some(self.generation), None);
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Page<T> {
    fn drop(&mut self) {
        if !self.released {
            self.book.release(&self.key, Some(self.generation), None);
        }
    }
}
