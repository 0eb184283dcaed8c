use std::sync::Arc;

use helper_functions::{accessors, predicates};
use types::{
    consts::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
    containers::Validator,
    nonstandard::Phase,
    primitives::{Epoch, ValidatorIndex},
    records::ValidatorRewards,
    state::AgnosticState,
};

use crate::{
    altair::AltairMetrics, base::MetricsBase, error::BundleError, phase0::Phase0Metrics,
    rewards::MaxReward,
};

pub trait StateMetrics: Send + Sync {
    fn base(&self) -> &MetricsBase;

    fn max_reward(&self, validator_index: ValidatorIndex, validator: &Validator) -> MaxReward;

    /// Rewards of the transition from `current` to `next`.
    ///
    /// The transition pays for attestations made during `prev`'s epoch,
    /// so validators that were not eligible then cannot earn anything.
    fn validator_rewards(
        &self,
        validator_index: ValidatorIndex,
    ) -> Result<ValidatorRewards, BundleError> {
        let base = self.base();
        let unknown = |role| BundleError::UnknownValidator {
            role,
            validator_index,
        };

        let validator = base
            .current
            .validator(validator_index)
            .ok_or_else(|| unknown("current"))?;
        let current_balance = base
            .current
            .balance(validator_index)
            .ok_or_else(|| unknown("current"))?;
        let next_validator = base
            .next
            .validator(validator_index)
            .ok_or_else(|| unknown("next"))?;
        let balance = base
            .next
            .balance(validator_index)
            .ok_or_else(|| unknown("next"))?;

        let signed = |gwei: u64| {
            i64::try_from(gwei).map_err(|source| BundleError::BalanceOverflow {
                validator_index,
                source,
            })
        };

        let reward = signed(balance)? - signed(current_balance)?;

        let eligible = predicates::is_eligible_for_rewards(validator, base.prev.epoch);

        let max_reward = if eligible {
            self.max_reward(validator_index, validator)
        } else {
            MaxReward::default()
        };

        let flags = base.current.participation(validator_index);
        let missing = |flag_index| eligible && !predicates::has_flag(flags, flag_index);

        Ok(ValidatorRewards {
            validator_index,
            epoch: base.epoch,
            balance,
            reward,
            max_reward: max_reward.total(),
            max_attestation_reward: max_reward.attestation,
            max_sync_committee_reward: max_reward.sync_committee,
            base_reward: max_reward.base_reward,
            in_sync_committee: base.current.in_sync_committee(validator_index),
            missing_source: missing(TIMELY_SOURCE_FLAG_INDEX),
            missing_target: missing(TIMELY_TARGET_FLAG_INDEX),
            missing_head: missing(TIMELY_HEAD_FLAG_INDEX),
            status: accessors::validator_status(next_validator, base.next.epoch),
        })
    }
}

/// Metrics of one epoch with the reward rules of the fork `next` was decoded for.
pub enum MetricsBundle {
    Phase0(Phase0Metrics),
    Altair(AltairMetrics),
}

impl MetricsBundle {
    pub fn build(
        epoch: Epoch,
        next: Arc<AgnosticState>,
        current: Arc<AgnosticState>,
        prev: Arc<AgnosticState>,
    ) -> Result<Self, BundleError> {
        let base = MetricsBase::new(epoch, next, current, prev)?;

        let bundle = match base.next.phase {
            Phase::Phase0 => Self::Phase0(Phase0Metrics::new(base)),
            Phase::Altair | Phase::Bellatrix | Phase::Capella | Phase::Deneb => {
                Self::Altair(AltairMetrics::new(base))
            }
        };

        Ok(bundle)
    }

    fn strategy(&self) -> &dyn StateMetrics {
        match self {
            Self::Phase0(metrics) => metrics,
            Self::Altair(metrics) => metrics,
        }
    }
}

impl StateMetrics for MetricsBundle {
    fn base(&self) -> &MetricsBase {
        self.strategy().base()
    }

    fn max_reward(&self, validator_index: ValidatorIndex, validator: &Validator) -> MaxReward {
        self.strategy().max_reward(validator_index, validator)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use test_case::test_case;
    use types::nonstandard::ValidatorStatus;

    use super::*;

    const VALIDATOR_COUNT: usize = 16;

    fn bundle_with(
        phase: Phase,
        adjust_current: impl FnOnce(&mut AgnosticState),
    ) -> Result<MetricsBundle> {
        let mut current = factory::state(phase, 1, VALIDATOR_COUNT)?;

        adjust_current(&mut current);

        let bundle = MetricsBundle::build(
            2,
            Arc::new(factory::state(phase, 2, VALIDATOR_COUNT)?),
            Arc::new(current),
            Arc::new(factory::state(phase, 0, VALIDATOR_COUNT)?),
        )?;

        Ok(bundle)
    }

    #[test_case(Phase::Phase0 => "phase0")]
    #[test_case(Phase::Altair => "altair")]
    #[test_case(Phase::Capella => "altair")]
    #[test_case(Phase::Deneb => "altair")]
    fn strategy_follows_fork_of_next_state(phase: Phase) -> &'static str {
        match bundle_with(phase, |_| {}).expect("bundle should build") {
            MetricsBundle::Phase0(_) => "phase0",
            MetricsBundle::Altair(_) => "altair",
        }
    }

    #[test_case(Phase::Phase0)]
    #[test_case(Phase::Altair)]
    #[test_case(Phase::Deneb)]
    fn builds_at_genesis_without_history(phase: Phase) -> Result<()> {
        let empty = Arc::new(AgnosticState::empty());
        let genesis = factory::state(phase, 0, VALIDATOR_COUNT)?;
        let validator = genesis.validators[0];

        let bundle = MetricsBundle::build(0, Arc::new(genesis), Arc::clone(&empty), empty)?;

        assert!(!bundle.base().has_current());
        assert!(bundle.max_reward(0, &validator).base_reward > 0);
        assert!(matches!(
            bundle.validator_rewards(0),
            Err(BundleError::UnknownValidator { role: "current", .. }),
        ));

        Ok(())
    }

    #[test]
    fn realized_reward_is_balance_difference() -> Result<()> {
        let rewards = bundle_with(Phase::Altair, |_| {})?.validator_rewards(3)?;

        assert_eq!(rewards.epoch, 2);
        assert_eq!(rewards.reward, factory::BALANCE_GROWTH as i64);
        assert_eq!(rewards.balance, factory::MAX_EFFECTIVE_BALANCE + 2 * factory::BALANCE_GROWTH);
        assert_eq!(rewards.status, ValidatorStatus::Active);
        assert!(!rewards.missing_source);

        Ok(())
    }

    #[test]
    fn phase0_max_reward_has_four_components() -> Result<()> {
        let bundle = bundle_with(Phase::Phase0, |_| {})?;
        let rewards = bundle.validator_rewards(0)?;
        let base_reward = rewards.base_reward;

        assert!(base_reward > 0);
        assert_eq!(rewards.max_sync_committee_reward, 0);
        assert_eq!(rewards.max_reward, 4 * base_reward - base_reward / 8);

        Ok(())
    }

    #[test]
    fn altair_sync_committee_members_earn_more() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |_| {})?;

        // The factory puts even validators in the sync committee.
        let member = bundle.validator_rewards(0)?;
        let other = bundle.validator_rewards(1)?;

        assert!(member.in_sync_committee);
        assert!(!other.in_sync_committee);
        assert_eq!(member.base_reward, other.base_reward);
        assert_eq!(member.max_attestation_reward, other.max_attestation_reward);
        assert_eq!(member.max_attestation_reward, member.base_reward * 54 / 64);
        assert!(member.max_sync_committee_reward > 0);
        assert_eq!(other.max_reward, other.max_attestation_reward);

        Ok(())
    }

    #[test]
    fn ineligible_validators_cannot_earn() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |current| {
            current.validators[4].activation_epoch = 1;
            current.previous_epoch_participation[4] = 0;
        })?;

        let rewards = bundle.validator_rewards(4)?;

        assert_eq!(rewards.max_reward, 0);
        assert!(!rewards.missing_source);
        assert!(!rewards.missing_target);

        Ok(())
    }

    #[test]
    fn missing_flags_come_from_current_state() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |current| {
            current.previous_epoch_participation[6] = 0b011;
        })?;

        let rewards = bundle.validator_rewards(6)?;

        assert!(!rewards.missing_source);
        assert!(!rewards.missing_target);
        assert!(rewards.missing_head);

        Ok(())
    }

    #[test]
    fn balance_decrease_is_a_negative_reward() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |current| {
            current.balances[2] += 3 * factory::BALANCE_GROWTH;
        })?;

        let rewards = bundle.validator_rewards(2)?;

        assert_eq!(rewards.reward, -2 * factory::BALANCE_GROWTH as i64);

        Ok(())
    }

    #[test]
    fn oversized_balance_is_an_error() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |current| current.balances[5] = u64::MAX)?;

        assert!(matches!(
            bundle.validator_rewards(5),
            Err(BundleError::BalanceOverflow { validator_index: 5, .. }),
        ));

        Ok(())
    }

    #[test]
    fn unknown_validator_is_an_error() -> Result<()> {
        let bundle = bundle_with(Phase::Altair, |_| {})?;

        assert!(matches!(
            bundle.validator_rewards(VALIDATOR_COUNT as u64),
            Err(BundleError::UnknownValidator { role: "current", .. }),
        ));

        Ok(())
    }
}
