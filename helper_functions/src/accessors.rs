use anyhow::{ensure, Result};
use integer_sqrt::IntegerSquareRoot as _;
use itertools::Itertools as _;
use types::{
    consts::{
        BASE_REWARDS_PER_EPOCH, BASE_REWARD_FACTOR, EFFECTIVE_BALANCE_INCREMENT, GENESIS_EPOCH,
        SLOTS_PER_EPOCH, SYNC_COMMITTEE_SIZE, SYNC_REWARD_WEIGHT, WEIGHT_DENOMINATOR,
    },
    containers::Validator,
    nonstandard::ValidatorStatus,
    primitives::{Epoch, Gwei, Slot, H256},
};

use crate::{
    error::Error,
    misc::{compute_epoch_at_slot, compute_start_slot_at_epoch},
    predicates::is_active_validator,
};

#[must_use]
pub fn total_active_balance(validators: &[Validator], epoch: Epoch) -> Gwei {
    validators
        .iter()
        .filter(|validator| is_active_validator(validator, epoch))
        .map(|validator| validator.effective_balance)
        .sum::<Gwei>()
        .max(EFFECTIVE_BALANCE_INCREMENT)
}

#[must_use]
pub const fn validator_status(validator: &Validator, epoch: Epoch) -> ValidatorStatus {
    if validator.slashed {
        ValidatorStatus::Slashed
    } else if validator.activation_epoch > epoch {
        ValidatorStatus::InActivation
    } else if validator.exit_epoch <= epoch {
        ValidatorStatus::Exited
    } else {
        ValidatorStatus::Active
    }
}

#[must_use]
pub fn phase0_base_reward(effective_balance: Gwei, total_active_balance: Gwei) -> Gwei {
    effective_balance * BASE_REWARD_FACTOR
        / balance_sqrt(total_active_balance)
        / BASE_REWARDS_PER_EPOCH
}

#[must_use]
pub fn base_reward_per_increment(total_active_balance: Gwei) -> Gwei {
    EFFECTIVE_BALANCE_INCREMENT * BASE_REWARD_FACTOR / balance_sqrt(total_active_balance)
}

#[must_use]
pub const fn altair_base_reward(effective_balance: Gwei, base_reward_per_increment: Gwei) -> Gwei {
    effective_balance / EFFECTIVE_BALANCE_INCREMENT * base_reward_per_increment
}

/// Reward a sync committee member receives for one slot of participation.
#[must_use]
pub fn sync_participant_reward(total_active_balance: Gwei) -> Gwei {
    let total_active_increments = total_active_balance / EFFECTIVE_BALANCE_INCREMENT;
    let total_base_rewards =
        base_reward_per_increment(total_active_balance) * total_active_increments;
    let max_participant_rewards =
        total_base_rewards * SYNC_REWARD_WEIGHT / WEIGHT_DENOMINATOR / SLOTS_PER_EPOCH;

    max_participant_rewards / SYNC_COMMITTEE_SIZE
}

// Total active balance is never below one increment.
fn balance_sqrt(total_active_balance: Gwei) -> Gwei {
    total_active_balance
        .max(EFFECTIVE_BALANCE_INCREMENT)
        .integer_sqrt()
}

/// Block root at `slot` as recorded by a state at `state_slot`.
///
/// The state does not know its own block yet, so `slot` must be strictly before `state_slot`.
pub fn block_root_at_slot(block_roots: &[H256], state_slot: Slot, slot: Slot) -> Result<H256> {
    ensure!(!block_roots.is_empty(), Error::BlockRootsEmpty);

    let length = block_roots.len() as u64;

    ensure!(
        slot < state_slot && state_slot - slot <= length,
        Error::BlockRootNotRetained { slot, state_slot },
    );

    let index = usize::try_from(slot % length)?;

    Ok(block_roots[index])
}

/// Slots of the epoch of `state_slot` that are known to have no block.
///
/// A slot is missed when its root repeats the root of the slot before it.
/// The state slot itself is not covered; the next epoch reports it through [`prev_missing_block`].
pub fn missed_blocks(block_roots: &[H256], state_slot: Slot) -> Result<Vec<Slot>> {
    let start_slot = compute_start_slot_at_epoch(compute_epoch_at_slot(state_slot));

    (start_slot.max(1)..state_slot)
        .map(|slot| -> Result<_> {
            let root = block_root_at_slot(block_roots, state_slot, slot)?;
            let previous = block_root_at_slot(block_roots, state_slot, slot - 1)?;
            Ok((root == previous).then_some(slot))
        })
        .filter_map_ok(core::convert::identity)
        .collect()
}

/// Last slot of the previous epoch if no block was proposed in it.
pub fn prev_missing_block(block_roots: &[H256], state_slot: Slot) -> Result<Option<Slot>> {
    let epoch = compute_epoch_at_slot(state_slot);

    if epoch == GENESIS_EPOCH {
        return Ok(None);
    }

    let slot = compute_start_slot_at_epoch(epoch) - 1;
    let root = block_root_at_slot(block_roots, state_slot, slot)?;
    let previous = block_root_at_slot(block_roots, state_slot, slot - 1)?;

    Ok((root == previous).then_some(slot))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::consts::FAR_FUTURE_EPOCH;

    use super::*;

    const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

    fn active(effective_balance: Gwei) -> Validator {
        Validator {
            effective_balance,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    // Every slot gets a distinct root unless listed in `missed`.
    fn roots(length: usize, missed: &[Slot]) -> Vec<H256> {
        let mut roots = vec![H256::zero(); length];
        let mut current = H256::zero();

        for slot in 0..length as u64 {
            if !missed.contains(&slot) {
                current = H256::from_low_u64_be(slot + 1);
            }
            roots[usize::try_from(slot).expect("slot fits in usize")] = current;
        }

        roots
    }

    #[test]
    fn base_rewards_tolerate_zero_total_balance() {
        assert_eq!(
            base_reward_per_increment(0),
            base_reward_per_increment(EFFECTIVE_BALANCE_INCREMENT),
        );
        assert!(phase0_base_reward(MAX_EFFECTIVE_BALANCE, 0) > 0);
        assert!(sync_participant_reward(0) <= sync_participant_reward(MAX_EFFECTIVE_BALANCE));
    }

    #[test]
    fn total_active_balance_ignores_inactive_validators() {
        let pending = Validator {
            activation_epoch: 10,
            ..active(MAX_EFFECTIVE_BALANCE)
        };

        let validators = [active(MAX_EFFECTIVE_BALANCE), pending, active(1_000_000_000)];

        assert_eq!(total_active_balance(&validators, 5), 33_000_000_000);
    }

    #[test]
    fn total_active_balance_has_a_floor() {
        assert_eq!(total_active_balance(&[], 0), EFFECTIVE_BALANCE_INCREMENT);
    }

    #[test_case(
        Validator { slashed: true, ..active(0) }, 3 => ValidatorStatus::Slashed;
        "slashed takes precedence"
    )]
    #[test_case(
        Validator { activation_epoch: 4, ..active(0) }, 3 => ValidatorStatus::InActivation;
        "not yet activated"
    )]
    #[test_case(
        Validator { exit_epoch: 3, ..active(0) }, 3 => ValidatorStatus::Exited;
        "exited at epoch"
    )]
    #[test_case(active(0), 3 => ValidatorStatus::Active; "active")]
    fn status(validator: Validator, epoch: Epoch) -> ValidatorStatus {
        validator_status(&validator, epoch)
    }

    #[test]
    fn base_rewards_follow_square_root_of_total_balance() {
        let total = 64 * MAX_EFFECTIVE_BALANCE;
        let sqrt = total.integer_sqrt();

        assert_eq!(
            phase0_base_reward(MAX_EFFECTIVE_BALANCE, total),
            MAX_EFFECTIVE_BALANCE * 64 / sqrt / 4,
        );

        let per_increment = base_reward_per_increment(total);

        assert_eq!(per_increment, 1_000_000_000 * 64 / sqrt);
        assert_eq!(
            altair_base_reward(MAX_EFFECTIVE_BALANCE, per_increment),
            32 * per_increment,
        );
    }

    #[test]
    fn block_roots_outside_window_are_rejected() {
        let block_roots = roots(64, &[]);

        assert!(block_root_at_slot(&block_roots, 63, 62).is_ok());
        assert!(block_root_at_slot(&block_roots, 63, 63).is_err());
        assert!(block_root_at_slot(&[], 63, 10).is_err());
        assert!(block_root_at_slot(&block_roots, 200, 100).is_err());
    }

    #[test]
    fn missed_blocks_are_detected_within_epoch() -> Result<()> {
        let block_roots = roots(128, &[33, 40, 41, 63]);

        assert_eq!(missed_blocks(&block_roots, 63)?, [33, 40, 41]);
        assert_eq!(prev_missing_block(&block_roots, 95)?, Some(63));
        assert_eq!(prev_missing_block(&block_roots, 63)?, None);

        Ok(())
    }

    #[test]
    fn genesis_slot_is_never_missed() -> Result<()> {
        let block_roots = vec![H256::repeat_byte(7); 64];

        assert_eq!(missed_blocks(&block_roots, 31)?, (1..31).collect::<Vec<_>>());
        assert_eq!(prev_missing_block(&block_roots, 31)?, None);

        Ok(())
    }
}
