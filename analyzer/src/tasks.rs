use std::sync::Arc;

use epoch_metrics::MetricsBundle;
use types::primitives::Epoch;

use crate::partitioner::Batch;

/// Request to orchestrate one epoch, sent in increasing epoch order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EpochTask {
    pub epoch: Epoch,
}

/// Reward computation for one batch of validators.
pub struct ValTask {
    pub bundle: Arc<MetricsBundle>,
    pub batch: Batch,
}
