use bit_field::BitField as _;
use types::{
    containers::Validator,
    primitives::{Epoch, ParticipationFlags},
};

#[inline]
#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

/// Validators that earn or lose rewards for attestations made during `previous_epoch`.
#[inline]
#[must_use]
pub const fn is_eligible_for_rewards(validator: &Validator, previous_epoch: Epoch) -> bool {
    is_active_validator(validator, previous_epoch)
        || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch)
}

#[inline]
#[must_use]
pub fn has_flag(flags: ParticipationFlags, flag_index: usize) -> bool {
    flags.get_bit(flag_index)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::consts::{
        FAR_FUTURE_EPOCH, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX,
    };

    use super::*;

    fn validator(activation_epoch: Epoch, exit_epoch: Epoch) -> Validator {
        Validator {
            activation_epoch,
            exit_epoch,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    #[test_case(0, FAR_FUTURE_EPOCH, 5 => true)]
    #[test_case(6, FAR_FUTURE_EPOCH, 5 => false)]
    #[test_case(0, 5, 5 => false)]
    #[test_case(0, 6, 5 => true)]
    fn activity(activation_epoch: Epoch, exit_epoch: Epoch, epoch: Epoch) -> bool {
        is_active_validator(&validator(activation_epoch, exit_epoch), epoch)
    }

    #[test]
    fn slashed_validator_stays_eligible_until_withdrawable() {
        let slashed = Validator {
            slashed: true,
            withdrawable_epoch: 10,
            ..validator(0, 4)
        };

        assert!(is_eligible_for_rewards(&slashed, 8));
        assert!(!is_eligible_for_rewards(&slashed, 9));
    }

    #[test_case(0b000, TIMELY_SOURCE_FLAG_INDEX => false)]
    #[test_case(0b001, TIMELY_SOURCE_FLAG_INDEX => true)]
    #[test_case(0b010, TIMELY_TARGET_FLAG_INDEX => true)]
    #[test_case(0b011, TIMELY_HEAD_FLAG_INDEX => false)]
    #[test_case(0b111, TIMELY_HEAD_FLAG_INDEX => true)]
    fn flags(flags: ParticipationFlags, flag_index: usize) -> bool {
        has_flag(flags, flag_index)
    }
}
