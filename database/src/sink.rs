use anyhow::Result;
use async_trait::async_trait;
use strum::{AsRefStr, Display};
use types::{
    primitives::Epoch,
    records::{
        EpochSummary, FinalizedCheckpoint, PoolSummary, ProposerDutyRecord, ValidatorLastStatus,
        ValidatorRewards,
    },
};

/// Rows of a single kind written in one call.
#[derive(Clone, PartialEq, Eq, Debug, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RecordBatch {
    ProposerDuties(Vec<ProposerDutyRecord>),
    ValidatorLastStatuses(Vec<ValidatorLastStatus>),
    ValidatorRewards(Vec<ValidatorRewards>),
    EpochSummaries(Vec<EpochSummary>),
    PoolSummaries(Vec<PoolSummary>),
    FinalizedCheckpoints(Vec<FinalizedCheckpoint>),
}

impl RecordBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::ProposerDuties(records) => records.len(),
            Self::ValidatorLastStatuses(records) => records.len(),
            Self::ValidatorRewards(records) => records.len(),
            Self::EpochSummaries(records) => records.len(),
            Self::PoolSummaries(records) => records.len(),
            Self::FinalizedCheckpoints(records) => records.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Selector {
    #[strum(to_string = "validator last statuses of epoch {epoch}")]
    ValidatorLastStatuses { epoch: Epoch },
    #[strum(to_string = "validator rewards of epoch {epoch}")]
    ValidatorRewards { epoch: Epoch },
}

/// Destination of every computed record.
///
/// Writes are upserts keyed by the natural key of each record kind.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn persist(&self, batch: RecordBatch) -> Result<()>;

    async fn delete(&self, selector: Selector) -> Result<()>;
}
