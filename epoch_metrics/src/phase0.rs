use helper_functions::accessors;
use types::{
    consts::PROPOSER_REWARD_QUOTIENT,
    containers::Validator,
    primitives::ValidatorIndex,
};

use crate::{base::MetricsBase, bundle::StateMetrics, rewards::MaxReward};

pub struct Phase0Metrics {
    base: MetricsBase,
}

impl Phase0Metrics {
    #[must_use]
    pub const fn new(base: MetricsBase) -> Self {
        Self { base }
    }
}

impl StateMetrics for Phase0Metrics {
    fn base(&self) -> &MetricsBase {
        &self.base
    }

    // Source, target and head each pay the full base reward when every validator attests.
    // The inclusion component pays what is left after the proposer's share.
    fn max_reward(&self, _validator_index: ValidatorIndex, validator: &Validator) -> MaxReward {
        let base_reward = accessors::phase0_base_reward(
            validator.effective_balance,
            self.base.current.total_active_balance,
        );

        let inclusion = base_reward - base_reward / PROPOSER_REWARD_QUOTIENT;

        MaxReward {
            base_reward,
            attestation: 3 * base_reward + inclusion,
            sync_committee: 0,
        }
    }
}
