use anyhow::{bail, Result};
use async_trait::async_trait;
use database::{InMemorySink, RecordBatch, Selector, Sink, Tables};

/// Sink that rejects batches of one kind and stores everything else.
pub struct FailingSink {
    failing_kind: &'static str,
    inner: InMemorySink,
}

impl FailingSink {
    /// `failing_kind` is the snake case name of a [`RecordBatch`] variant.
    #[must_use]
    pub fn new(failing_kind: &'static str) -> Self {
        Self {
            failing_kind,
            inner: InMemorySink::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.inner.snapshot()
    }
}

#[async_trait]
impl Sink for FailingSink {
    async fn persist(&self, batch: RecordBatch) -> Result<()> {
        if batch.as_ref() == self.failing_kind {
            bail!("storage rejected {} batch", self.failing_kind);
        }

        self.inner.persist(batch).await
    }

    async fn delete(&self, selector: Selector) -> Result<()> {
        self.inner.delete(selector).await
    }
}
