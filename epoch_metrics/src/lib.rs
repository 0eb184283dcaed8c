pub use crate::{
    base::MetricsBase,
    bundle::{MetricsBundle, StateMetrics},
    error::BundleError,
    rewards::MaxReward,
};

mod altair;
mod base;
mod bundle;
mod error;
mod phase0;
mod rewards;
