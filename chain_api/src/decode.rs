use helper_functions::{accessors, misc};
use thiserror::Error;
use types::{
    combined::VersionedBeaconState,
    consts::SLOTS_PER_EPOCH,
    containers::ProposerDuty,
    primitives::{Slot, H256},
    state::AgnosticState,
};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum DecodeError {
    #[error("state at slot {slot} has {validators} validators but {balances} balances")]
    BalanceCountMismatch {
        slot: Slot,
        validators: usize,
        balances: usize,
    },
    #[error("state at slot {slot} has {validators} validators but {participation} participation flags")]
    ParticipationCountMismatch {
        slot: Slot,
        validators: usize,
        participation: usize,
    },
    #[error("state at slot {slot} retains only {length} block roots")]
    BlockRootsTooShort { slot: Slot, length: usize },
    #[error("state at slot {slot} has a zero state root")]
    ZeroStateRoot { slot: Slot },
    #[error("state at slot {slot} has inconsistent block roots: {message}")]
    InvalidBlockRoots { slot: Slot, message: String },
}

/// Builds the fork-independent view of a downloaded state.
pub fn decode_state(
    state: VersionedBeaconState,
    state_root: H256,
    proposer_duties: Vec<ProposerDuty>,
) -> Result<AgnosticState, DecodeError> {
    let VersionedBeaconState {
        phase,
        slot,
        validators,
        balances,
        block_roots,
        previous_epoch_participation,
        current_sync_committee,
    } = state;

    if state_root.is_zero() {
        return Err(DecodeError::ZeroStateRoot { slot });
    }

    if validators.len() != balances.len() {
        return Err(DecodeError::BalanceCountMismatch {
            slot,
            validators: validators.len(),
            balances: balances.len(),
        });
    }

    if validators.len() != previous_epoch_participation.len() {
        return Err(DecodeError::ParticipationCountMismatch {
            slot,
            validators: validators.len(),
            participation: previous_epoch_participation.len(),
        });
    }

    if (block_roots.len() as u64) < 2 * SLOTS_PER_EPOCH {
        return Err(DecodeError::BlockRootsTooShort {
            slot,
            length: block_roots.len(),
        });
    }

    let invalid_block_roots = |error: anyhow::Error| DecodeError::InvalidBlockRoots {
        slot,
        message: error.to_string(),
    };

    let missed_blocks = accessors::missed_blocks(&block_roots, slot).map_err(invalid_block_roots)?;
    let prev_missing_block =
        accessors::prev_missing_block(&block_roots, slot).map_err(invalid_block_roots)?;

    let epoch = misc::compute_epoch_at_slot(slot);
    let total_active_balance = accessors::total_active_balance(&validators, epoch);

    Ok(AgnosticState {
        phase,
        slot,
        epoch,
        state_root,
        validators,
        balances,
        previous_epoch_participation,
        current_sync_committee: current_sync_committee.into_iter().collect(),
        total_active_balance,
        missed_blocks,
        prev_missing_block,
        proposer_duties,
    })
}

#[cfg(test)]
mod tests {
    use types::{
        consts::FAR_FUTURE_EPOCH, containers::Validator, nonstandard::Phase, primitives::Gwei,
    };

    use super::*;

    const BALANCE: Gwei = 32_000_000_000;

    fn versioned(slot: Slot, validator_count: usize, missed: &[Slot]) -> VersionedBeaconState {
        let validator = Validator {
            effective_balance: BALANCE,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        };

        let mut block_roots = vec![H256::zero(); 64];
        let mut root = H256::zero();

        for past_slot in slot.saturating_sub(64)..slot {
            if !missed.contains(&past_slot) {
                root = H256::from_low_u64_be(past_slot + 1);
            }

            block_roots[(past_slot % 64) as usize] = root;
        }

        VersionedBeaconState {
            phase: Phase::Altair,
            slot,
            validators: vec![validator; validator_count],
            balances: vec![BALANCE; validator_count],
            block_roots,
            previous_epoch_participation: vec![0b111; validator_count],
            current_sync_committee: vec![1, 0, 1],
        }
    }

    #[test]
    fn decodes_state_with_missed_blocks() -> Result<(), DecodeError> {
        let duties = vec![ProposerDuty {
            validator_index: 1,
            slot: 66,
        }];

        let state = decode_state(
            versioned(95, 4, &[63, 66, 70]),
            H256::repeat_byte(9),
            duties.clone(),
        )?;

        assert_eq!(state.epoch, 2);
        assert_eq!(state.phase, Phase::Altair);
        assert!(!state.is_empty());
        assert_eq!(state.missed_blocks, [66, 70]);
        assert_eq!(state.prev_missing_block, Some(63));
        assert_eq!(state.total_active_balance, 4 * BALANCE);
        assert_eq!(state.current_sync_committee.len(), 2);
        assert_eq!(state.proposer_duties, duties);

        Ok(())
    }

    #[test]
    fn rejects_zero_state_root() {
        assert_eq!(
            decode_state(versioned(95, 1, &[]), H256::zero(), vec![]),
            Err(DecodeError::ZeroStateRoot { slot: 95 }),
        );
    }

    #[test]
    fn rejects_mismatched_balances() {
        let mut state = versioned(95, 3, &[]);
        state.balances.pop();

        assert!(matches!(
            decode_state(state, H256::repeat_byte(1), vec![]),
            Err(DecodeError::BalanceCountMismatch {
                validators: 3,
                balances: 2,
                ..
            }),
        ));
    }

    #[test]
    fn rejects_short_block_roots() {
        let mut state = versioned(95, 1, &[]);
        state.block_roots.truncate(40);

        assert!(matches!(
            decode_state(state, H256::repeat_byte(1), vec![]),
            Err(DecodeError::BlockRootsTooShort { length: 40, .. }),
        ));
    }
}
