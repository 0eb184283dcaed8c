use std::{collections::HashSet, sync::Arc};

use types::primitives::ValidatorIndex;

use crate::config::ValidatorPool;

/// Pool of every validator not claimed by a named pool.
pub const OTHERS_POOL: &str = "others";

/// Pool of every validator when no named pools are configured.
pub const ALL_POOL: &str = "all";

/// Validator indices handed to one worker, tagged with the pool they belong to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Batch {
    pub pool: Arc<str>,
    pub indices: Vec<ValidatorIndex>,
}

impl Batch {
    fn new(pool: &str, indices: Vec<ValidatorIndex>) -> Self {
        Self {
            pool: pool.into(),
            indices,
        }
    }
}

pub struct ValidatorPartitioner {
    pools: Vec<ValidatorPool>,
    batch_count: usize,
}

impl ValidatorPartitioner {
    #[must_use]
    pub const fn new(pools: Vec<ValidatorPool>, batch_count: usize) -> Self {
        Self { pools, batch_count }
    }

    /// Named pools followed by `others`, or a single `all` pool.
    ///
    /// Named pool indices are used as configured.
    /// `others` is omitted when the named pools cover the whole validator set.
    #[must_use]
    pub fn pools(&self, validator_count: usize) -> Vec<Batch> {
        let all = 0..validator_count as ValidatorIndex;

        if self.pools.is_empty() {
            return vec![Batch::new(ALL_POOL, all.collect())];
        }

        let claimed = self
            .pools
            .iter()
            .flat_map(|pool| pool.indices.iter().copied())
            .collect::<HashSet<_>>();

        let others = all
            .filter(|validator_index| !claimed.contains(validator_index))
            .collect::<Vec<_>>();

        self.pools
            .iter()
            .map(|pool| Batch::new(&pool.name, pool.indices.clone()))
            .chain((!others.is_empty()).then(|| Batch::new(OTHERS_POOL, others)))
            .collect()
    }

    /// Batches of reward work for an epoch with `validator_count` validators.
    ///
    /// With named pools every pool is one batch.
    /// Otherwise the indices are split into `batch_count` contiguous batches whose sizes differ by
    /// at most one, larger batches first. Empty batches are never produced.
    #[must_use]
    pub fn partition(&self, validator_count: usize) -> Vec<Batch> {
        if !self.pools.is_empty() {
            return self.pools(validator_count);
        }

        let batch_count = self.batch_count.max(1);
        let base = validator_count / batch_count;
        let remainder = validator_count % batch_count;

        let mut start = 0;

        (0..batch_count)
            .map(|batch| base + usize::from(batch < remainder))
            .take_while(|size| *size > 0)
            .map(|size| {
                let end = start + size;
                let indices = (start as ValidatorIndex..end as ValidatorIndex).collect();
                start = end;
                Batch::new(ALL_POOL, indices)
            })
            .collect()
    }
}
