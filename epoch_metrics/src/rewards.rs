use types::primitives::Gwei;

/// Largest reward a validator could have earned in one epoch transition.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct MaxReward {
    pub base_reward: Gwei,
    pub attestation: Gwei,
    pub sync_committee: Gwei,
}

impl MaxReward {
    #[must_use]
    pub const fn total(self) -> Gwei {
        self.attestation + self.sync_committee
    }
}
