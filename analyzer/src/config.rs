use core::time::Duration;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::Result;
use helper_functions::misc;
use serde::{Deserialize, Serialize};
use serde_with::{As, DurationMilliSeconds};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use types::primitives::{Epoch, Slot, ValidatorIndex};

use crate::partitioner::OTHERS_POOL;

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Debug,
    Deserialize,
    Serialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DownloadMode {
    #[default]
    Finalized,
    Head,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub epoch: bool,
    pub validator_rewards: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            epoch: true,
            validator_rewards: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorPool {
    pub name: String,
    pub indices: Vec<ValidatorIndex>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub init_slot: Slot,
    pub final_slot: Option<Slot>,
    pub download_mode: DownloadMode,
    pub follow_finality: bool,
    #[serde(rename = "finality_poll_interval_ms", with = "As::<DurationMilliSeconds>")]
    pub finality_poll_interval: Duration,
    pub metrics: MetricsConfig,
    pub pools: Vec<ValidatorPool>,
    pub worker_count: usize,
    pub task_queue_capacity: usize,
    pub max_concurrent_requests: usize,
    pub max_concurrent_epochs: usize,
    pub max_retries: usize,
    #[serde(rename = "retry_backoff_ms", with = "As::<DurationMilliSeconds>")]
    pub retry_backoff: Duration,
    #[serde(rename = "cache_lock_timeout_ms", with = "As::<DurationMilliSeconds>")]
    pub cache_lock_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            init_slot: 0,
            final_slot: None,
            download_mode: DownloadMode::default(),
            follow_finality: false,
            finality_poll_interval: Duration::from_secs(12),
            metrics: MetricsConfig::default(),
            pools: vec![],
            worker_count: 8,
            task_queue_capacity: 64,
            max_concurrent_requests: 4,
            max_concurrent_epochs: 4,
            max_retries: 5,
            retry_backoff: Duration::from_secs(2),
            cache_lock_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("final slot {final_slot} is before initial slot {init_slot}")]
    InvertedRange { init_slot: Slot, final_slot: Slot },
    #[error("validator pool names must not be empty")]
    EmptyPoolName,
    #[error("validator pool name {name} is reserved")]
    ReservedPoolName { name: String },
    #[error("validator pool {name} is defined more than once")]
    DuplicatePool { name: String },
    #[error("validator {validator_index} belongs to both {first} and {second}")]
    OverlappingPools {
        validator_index: ValidatorIndex,
        first: String,
        second: String,
    },
}

impl AnalyzerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs_err::read(path)?;
        let config = serde_yaml::from_slice::<Self>(bytes.as_slice())?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("worker_count", self.worker_count),
            ("task_queue_capacity", self.task_queue_capacity),
            ("max_concurrent_requests", self.max_concurrent_requests),
            ("max_concurrent_epochs", self.max_concurrent_epochs),
            ("max_retries", self.max_retries),
        ];

        if let Some((field, _)) = counts.into_iter().find(|(_, count)| *count == 0) {
            return Err(ConfigError::Zero { field });
        }

        if let Some(final_slot) = self.final_slot {
            if final_slot < self.init_slot {
                return Err(ConfigError::InvertedRange {
                    init_slot: self.init_slot,
                    final_slot,
                });
            }
        }

        let mut names = HashSet::new();
        let mut owners = HashMap::new();

        for pool in &self.pools {
            if pool.name.is_empty() {
                return Err(ConfigError::EmptyPoolName);
            }

            if pool.name == OTHERS_POOL {
                return Err(ConfigError::ReservedPoolName {
                    name: pool.name.clone(),
                });
            }

            if !names.insert(pool.name.as_str()) {
                return Err(ConfigError::DuplicatePool {
                    name: pool.name.clone(),
                });
            }

            for validator_index in &pool.indices {
                if let Some(first) = owners.insert(*validator_index, pool.name.as_str()) {
                    if first != pool.name {
                        return Err(ConfigError::OverlappingPools {
                            validator_index: *validator_index,
                            first: first.to_owned(),
                            second: pool.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Lowest epoch whose end-of-epoch state is tracked.
    #[must_use]
    pub const fn init_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot(self.init_slot)
    }

    #[must_use]
    pub const fn is_finalized_mode(&self) -> bool {
        matches!(self.download_mode, DownloadMode::Finalized)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;
    use test_case::test_case;

    use super::*;

    fn pool(name: &str, indices: &[ValidatorIndex]) -> ValidatorPool {
        ValidatorPool {
            name: name.to_owned(),
            indices: indices.to_vec(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnalyzerConfig::default();

        assert!(config.validate().is_ok());
        assert!(config.is_finalized_mode());
        assert_eq!(config.init_epoch(), 0);
    }

    #[test]
    fn loads_partial_yaml() -> Result<()> {
        let mut file = NamedTempFile::new()?;

        writeln!(
            file,
            "init_slot: 6400\n\
             download_mode: head\n\
             retry_backoff_ms: 250\n\
             metrics:\n  validator_rewards: false\n\
             pools:\n  - name: lido\n    indices: [1, 2, 3]",
        )?;

        let config = AnalyzerConfig::load(file.path())?;

        assert_eq!(config.init_epoch(), 200);
        assert_eq!(config.download_mode, DownloadMode::Head);
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
        assert!(config.metrics.epoch);
        assert!(!config.metrics.validator_rewards);
        assert_eq!(config.pools, [pool("lido", &[1, 2, 3])]);
        assert_eq!(config.worker_count, 8);

        Ok(())
    }

    #[test]
    fn rejects_unknown_fields() -> Result<()> {
        let mut file = NamedTempFile::new()?;

        writeln!(file, "workers: 3")?;

        assert!(AnalyzerConfig::load(file.path()).is_err());

        Ok(())
    }

    #[test_case(
        AnalyzerConfig { worker_count: 0, ..AnalyzerConfig::default() }
        => matches Err(ConfigError::Zero { field: "worker_count" });
        "no workers"
    )]
    #[test_case(
        AnalyzerConfig { max_retries: 0, ..AnalyzerConfig::default() }
        => matches Err(ConfigError::Zero { field: "max_retries" });
        "no attempts"
    )]
    #[test_case(
        AnalyzerConfig { init_slot: 64, final_slot: Some(63), ..AnalyzerConfig::default() }
        => matches Err(ConfigError::InvertedRange { .. });
        "inverted range"
    )]
    #[test_case(
        AnalyzerConfig { pools: vec![pool("", &[1])], ..AnalyzerConfig::default() }
        => matches Err(ConfigError::EmptyPoolName);
        "empty name"
    )]
    #[test_case(
        AnalyzerConfig { pools: vec![pool("others", &[1])], ..AnalyzerConfig::default() }
        => matches Err(ConfigError::ReservedPoolName { .. });
        "reserved name"
    )]
    #[test_case(
        AnalyzerConfig {
            pools: vec![pool("a", &[1]), pool("a", &[2])],
            ..AnalyzerConfig::default()
        }
        => matches Err(ConfigError::DuplicatePool { .. });
        "duplicate name"
    )]
    #[test_case(
        AnalyzerConfig {
            pools: vec![pool("a", &[1, 2]), pool("b", &[2, 3])],
            ..AnalyzerConfig::default()
        }
        => matches Err(ConfigError::OverlappingPools { validator_index: 2, .. });
        "overlapping pools"
    )]
    #[test_case(
        AnalyzerConfig {
            pools: vec![pool("a", &[1, 2]), pool("b", &[3])],
            ..AnalyzerConfig::default()
        }
        => matches Ok(());
        "disjoint pools"
    )]
    fn validation(config: AnalyzerConfig) -> Result<(), ConfigError> {
        config.validate()
    }
}
