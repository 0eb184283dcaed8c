use anyhow::Result;
use async_trait::async_trait;
use im::OrdMap;
use log::debug;
use parking_lot::Mutex;
use types::{
    primitives::{Epoch, Slot, ValidatorIndex},
    records::{
        EpochSummary, FinalizedCheckpoint, PoolSummary, ProposerDutyRecord, ValidatorLastStatus,
        ValidatorRewards,
    },
};

use crate::sink::{RecordBatch, Selector, Sink};

#[derive(Clone, Default, Debug)]
pub struct Tables {
    pub proposer_duties: OrdMap<Slot, ProposerDutyRecord>,
    pub validator_last_statuses: OrdMap<(Epoch, ValidatorIndex), ValidatorLastStatus>,
    pub validator_rewards: OrdMap<(Epoch, ValidatorIndex), ValidatorRewards>,
    pub epoch_summaries: OrdMap<Epoch, EpochSummary>,
    pub pool_summaries: OrdMap<(Epoch, String), PoolSummary>,
    pub finalized_checkpoints: OrdMap<Epoch, FinalizedCheckpoint>,
    pub persist_calls: usize,
}

#[derive(Default)]
pub struct InMemorySink {
    tables: Mutex<Tables>,
}

impl InMemorySink {
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.tables.lock().clone()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn persist(&self, batch: RecordBatch) -> Result<()> {
        debug!("persisting {} {} rows", batch.len(), batch.as_ref());

        let mut tables = self.tables.lock();

        tables.persist_calls += 1;

        match batch {
            RecordBatch::ProposerDuties(records) => {
                for record in records {
                    tables.proposer_duties.insert(record.slot, record);
                }
            }
            RecordBatch::ValidatorLastStatuses(records) => {
                for record in records {
                    let key = (record.epoch, record.validator_index);
                    tables.validator_last_statuses.insert(key, record);
                }
            }
            RecordBatch::ValidatorRewards(records) => {
                for record in records {
                    let key = (record.epoch, record.validator_index);
                    tables.validator_rewards.insert(key, record);
                }
            }
            RecordBatch::EpochSummaries(records) => {
                for record in records {
                    tables.epoch_summaries.insert(record.epoch, record);
                }
            }
            RecordBatch::PoolSummaries(records) => {
                for record in records {
                    let key = (record.epoch, record.pool.clone());
                    tables.pool_summaries.insert(key, record);
                }
            }
            RecordBatch::FinalizedCheckpoints(records) => {
                for record in records {
                    tables.finalized_checkpoints.insert(record.epoch, record);
                }
            }
        }

        Ok(())
    }

    async fn delete(&self, selector: Selector) -> Result<()> {
        debug!("deleting {selector}");

        let mut tables = self.tables.lock();

        match selector {
            Selector::ValidatorLastStatuses { epoch } => {
                remove_epoch(&mut tables.validator_last_statuses, epoch);
            }
            Selector::ValidatorRewards { epoch } => {
                remove_epoch(&mut tables.validator_rewards, epoch);
            }
        }

        Ok(())
    }
}

fn remove_epoch<V: Clone>(table: &mut OrdMap<(Epoch, ValidatorIndex), V>, epoch: Epoch) {
    let keys = table
        .range((epoch, 0)..=(epoch, ValidatorIndex::MAX))
        .map(|(key, _)| *key)
        .collect::<Vec<_>>();

    for key in keys {
        table.remove(&key);
    }
}
