use strum::{AsRefStr, Display, EnumString};

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    AsRefStr,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Phase {
    #[default]
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
}

impl Phase {
    #[must_use]
    pub const fn is_post_altair(self) -> bool {
        !matches!(self, Self::Phase0)
    }
}

/// Status of a validator as seen at the end of an epoch.
///
/// Every validator is in exactly one status, so the counts of an epoch add up to its validator count.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ValidatorStatus {
    InActivation = 0,
    Active = 1,
    Exited = 2,
    Slashed = 3,
}

impl ValidatorStatus {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}
