use std::sync::Arc;

use helper_functions::{accessors, misc, predicates};
use types::{
    consts::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
    containers::ProposerDuty,
    nonstandard::ValidatorStatus,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex},
    records::{EpochSummary, PoolSummary, ProposerDutyRecord, ValidatorLastStatus},
    state::AgnosticState,
};

use crate::error::BundleError;

/// The three consecutive end-of-epoch states an epoch is analyzed from.
///
/// `next` is the state at the end of the processed epoch. `current` and `prev` are the two before it
/// and may be empty near the lower bound of tracked history.
pub struct MetricsBase {
    pub epoch: Epoch,
    pub prev: Arc<AgnosticState>,
    pub current: Arc<AgnosticState>,
    pub next: Arc<AgnosticState>,
}

impl MetricsBase {
    pub fn new(
        epoch: Epoch,
        next: Arc<AgnosticState>,
        current: Arc<AgnosticState>,
        prev: Arc<AgnosticState>,
    ) -> Result<Self, BundleError> {
        if next.is_empty() {
            return Err(BundleError::MissingNextState { epoch });
        }

        check_epoch("next", &next, Some(epoch))?;
        check_epoch("current", &current, epoch.checked_sub(1))?;
        check_epoch("previous", &prev, epoch.checked_sub(2))?;

        Ok(Self {
            epoch,
            prev,
            current,
            next,
        })
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.next.is_empty()
    }

    #[must_use]
    pub fn has_current(&self) -> bool {
        self.has_next() && !self.current.is_empty()
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.has_current() && !self.prev.is_empty()
    }

    /// Last slot of `current`'s epoch if it turned out to be missed.
    ///
    /// Only a later state can tell, so this is read from `next`.
    #[must_use]
    pub fn carried_missed_block(&self) -> Option<Slot> {
        self.next.prev_missing_block
    }

    /// Duties of `next`'s epoch except its last slot.
    ///
    /// Whether the last slot was missed is only known to the state after it,
    /// so that duty is left to [`Self::current_proposer_duties`] of the following epoch.
    #[must_use]
    pub fn next_proposer_duties(&self) -> Vec<ProposerDutyRecord> {
        let decided = self
            .next
            .proposer_duties
            .iter()
            .copied()
            .filter(|duty| !misc::is_epoch_end(duty.slot))
            .collect::<Vec<_>>();

        duty_records(&decided, &self.next.missed_blocks, None)
    }

    /// Duties of `current`'s epoch, including the missed block carried over from `next`.
    #[must_use]
    pub fn current_proposer_duties(&self, carried: Option<Slot>) -> Vec<ProposerDutyRecord> {
        if self.current.is_empty() {
            return vec![];
        }

        duty_records(
            &self.current.proposer_duties,
            &self.current.missed_blocks,
            carried,
        )
    }

    #[must_use]
    pub fn validator_last_statuses(&self) -> Vec<ValidatorLastStatus> {
        let state = &self.next;

        state
            .validators
            .iter()
            .zip(&state.balances)
            .zip(state.validator_indices())
            .map(|((validator, balance), validator_index)| ValidatorLastStatus {
                validator_index,
                epoch: state.epoch,
                balance: *balance,
                effective_balance: validator.effective_balance,
                status: accessors::validator_status(validator, state.epoch),
                slashed: validator.slashed,
                activation_epoch: validator.activation_epoch,
                exit_epoch: validator.exit_epoch,
                withdrawable_epoch: validator.withdrawable_epoch,
                pubkey: validator.pubkey,
            })
            .collect()
    }

    /// Aggregate of `current`'s epoch. Attestations for it are read from `next`.
    #[must_use]
    pub fn epoch_summary(&self) -> EpochSummary {
        let tally = self.tally(self.current.validator_indices());
        let missed_blocks = self.current.missed_blocks.len()
            + usize::from(self.carried_missed_block().is_some());

        EpochSummary {
            epoch: self.current.epoch,
            slot: self.current.slot,
            num_validators: tally.validators,
            num_active: tally.active,
            num_slashed: tally.slashed,
            num_exited: tally.exited,
            num_in_activation: tally.in_activation,
            num_attesting_validators: tally.attesting,
            total_balance: tally.total_balance,
            total_effective_balance: tally.total_effective_balance,
            attesting_effective_balance: tally.attesting_effective_balance,
            missing_source: tally.missing_source,
            missing_target: tally.missing_target,
            missing_head: tally.missing_head,
            missed_blocks: missed_blocks as u64,
        }
    }

    #[must_use]
    pub fn pool_summary(&self, pool: &str, indices: &[ValidatorIndex]) -> PoolSummary {
        let tally = self.tally(indices.iter().copied());

        PoolSummary {
            pool: pool.to_owned(),
            epoch: self.current.epoch,
            num_validators: tally.validators,
            num_active: tally.active,
            total_balance: tally.total_balance,
            total_effective_balance: tally.total_effective_balance,
            missing_source: tally.missing_source,
            missing_target: tally.missing_target,
            missing_head: tally.missing_head,
        }
    }

    fn tally(&self, indices: impl IntoIterator<Item = ValidatorIndex>) -> Tally {
        let mut tally = Tally::default();

        for validator_index in indices {
            let Some(validator) = self.current.validator(validator_index) else {
                continue;
            };

            tally.validators += 1;
            tally.total_balance += self.current.balance(validator_index).unwrap_or_default();

            match accessors::validator_status(validator, self.current.epoch) {
                ValidatorStatus::InActivation => tally.in_activation += 1,
                ValidatorStatus::Active => tally.active += 1,
                ValidatorStatus::Exited => tally.exited += 1,
                ValidatorStatus::Slashed => tally.slashed += 1,
            }

            if !predicates::is_active_validator(validator, self.current.epoch) {
                continue;
            }

            let flags = self.next.participation(validator_index);

            tally.total_effective_balance += validator.effective_balance;

            if flags != 0 {
                tally.attesting += 1;
                tally.attesting_effective_balance += validator.effective_balance;
            }

            tally.missing_source +=
                u64::from(!predicates::has_flag(flags, TIMELY_SOURCE_FLAG_INDEX));
            tally.missing_target +=
                u64::from(!predicates::has_flag(flags, TIMELY_TARGET_FLAG_INDEX));
            tally.missing_head +=
                u64::from(!predicates::has_flag(flags, TIMELY_HEAD_FLAG_INDEX));
        }

        tally
    }
}

#[derive(Default)]
struct Tally {
    validators: u64,
    active: u64,
    slashed: u64,
    exited: u64,
    in_activation: u64,
    attesting: u64,
    total_balance: Gwei,
    total_effective_balance: Gwei,
    attesting_effective_balance: Gwei,
    missing_source: u64,
    missing_target: u64,
    missing_head: u64,
}

fn check_epoch(
    role: &'static str,
    state: &AgnosticState,
    expected: Option<Epoch>,
) -> Result<(), BundleError> {
    if state.is_empty() {
        return Ok(());
    }

    match expected {
        Some(expected) if expected == state.epoch => Ok(()),
        _ => Err(BundleError::EpochMismatch {
            role,
            expected: expected.unwrap_or_default(),
            actual: state.epoch,
        }),
    }
}

fn duty_records(
    duties: &[ProposerDuty],
    missed_blocks: &[Slot],
    carried: Option<Slot>,
) -> Vec<ProposerDutyRecord> {
    duties
        .iter()
        .map(|duty| ProposerDutyRecord {
            validator_index: duty.validator_index,
            slot: duty.slot,
            proposed: !(missed_blocks.contains(&duty.slot) || carried == Some(duty.slot)),
        })
        .collect()
}
