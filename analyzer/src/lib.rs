pub use crate::{
    analyzer::ChainAnalyzer,
    config::{AnalyzerConfig, ConfigError, DownloadMode, MetricsConfig, ValidatorPool},
    downloader::Downloader,
    orchestrator::{EpochOrchestrator, EpochOutcome, EpochReport, EpochStage},
    partitioner::{Batch, ValidatorPartitioner, ALL_POOL, OTHERS_POOL},
    tasks::{EpochTask, ValTask},
    worker_pool::WorkerPool,
};

mod analyzer;
mod config;
mod downloader;
mod orchestrator;
mod partitioner;
mod tasks;
mod worker_pool;
