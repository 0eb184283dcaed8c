use std::collections::BTreeSet;

use crate::{
    containers::{ProposerDuty, Validator},
    nonstandard::Phase,
    primitives::{Epoch, Gwei, ParticipationFlags, Slot, ValidatorIndex, H256},
};

/// Fork-independent view of a decoded beacon state at the last slot of an epoch.
///
/// A state whose `state_root` is zero is the empty state. Empty states stand in for epochs that are
/// out of range or not downloaded.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct AgnosticState {
    pub phase: Phase,
    pub slot: Slot,
    pub epoch: Epoch,
    pub state_root: H256,
    pub validators: Vec<Validator>,
    pub balances: Vec<Gwei>,
    pub previous_epoch_participation: Vec<ParticipationFlags>,
    pub current_sync_committee: BTreeSet<ValidatorIndex>,
    pub total_active_balance: Gwei,
    pub missed_blocks: Vec<Slot>,
    pub prev_missing_block: Option<Slot>,
    pub proposer_duties: Vec<ProposerDuty>,
}

impl AgnosticState {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state_root.is_zero()
    }

    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn validator(&self, index: ValidatorIndex) -> Option<&Validator> {
        self.validators.get(usize::try_from(index).ok()?)
    }

    #[must_use]
    pub fn balance(&self, index: ValidatorIndex) -> Option<Gwei> {
        self.balances.get(usize::try_from(index).ok()?).copied()
    }

    #[must_use]
    pub fn participation(&self, index: ValidatorIndex) -> ParticipationFlags {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.previous_epoch_participation.get(index))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn in_sync_committee(&self, index: ValidatorIndex) -> bool {
        self.current_sync_committee.contains(&index)
    }

    #[must_use]
    pub fn previous_epoch(&self) -> Epoch {
        self.epoch.saturating_sub(1)
    }

    pub fn validator_indices(&self) -> impl Iterator<Item = ValidatorIndex> + '_ {
        (0..self.validators.len()).map(|index| index as ValidatorIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_is_recognized_by_zero_root() {
        let state = AgnosticState::empty();

        assert!(state.is_empty());
        assert_eq!(state.validator_count(), 0);
        assert_eq!(state.balance(0), None);
        assert_eq!(state.participation(3), 0);
    }

    #[test]
    fn state_with_root_is_not_empty() {
        let state = AgnosticState {
            epoch: 5,
            state_root: H256::repeat_byte(1),
            validators: vec![Validator::default(); 2],
            balances: vec![1, 2],
            ..AgnosticState::default()
        };

        assert!(!state.is_empty());
        assert_eq!(state.balance(1), Some(2));
        assert_eq!(state.previous_epoch(), 4);
        assert_eq!(state.validator_indices().collect::<Vec<_>>(), [0, 1]);
    }
}
