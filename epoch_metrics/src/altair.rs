use helper_functions::accessors;
use types::{
    consts::{
        SLOTS_PER_EPOCH, TIMELY_HEAD_WEIGHT, TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT,
        WEIGHT_DENOMINATOR,
    },
    containers::Validator,
    primitives::ValidatorIndex,
};

use crate::{base::MetricsBase, bundle::StateMetrics, rewards::MaxReward};

/// Rewards from Altair onwards. Later forks did not change how attestations or sync committees are paid.
pub struct AltairMetrics {
    base: MetricsBase,
}

impl AltairMetrics {
    #[must_use]
    pub const fn new(base: MetricsBase) -> Self {
        Self { base }
    }
}

impl StateMetrics for AltairMetrics {
    fn base(&self) -> &MetricsBase {
        &self.base
    }

    fn max_reward(&self, validator_index: ValidatorIndex, validator: &Validator) -> MaxReward {
        let total_active_balance = self.base.current.total_active_balance;

        let base_reward = accessors::altair_base_reward(
            validator.effective_balance,
            accessors::base_reward_per_increment(total_active_balance),
        );

        let attestation = base_reward
            * (TIMELY_SOURCE_WEIGHT + TIMELY_TARGET_WEIGHT + TIMELY_HEAD_WEIGHT)
            / WEIGHT_DENOMINATOR;

        let sync_committee = if self.base.current.in_sync_committee(validator_index) {
            accessors::sync_participant_reward(total_active_balance) * SLOTS_PER_EPOCH
        } else {
            0
        };

        MaxReward {
            base_reward,
            attestation,
            sync_committee,
        }
    }
}
