use core::sync::atomic::{AtomicU64, Ordering};

use derive_more::Display;

pub static PROGRESS: PipelineProgress = PipelineProgress::new();

#[derive(Display, Debug)]
#[display("downloaded: {downloaded_epoch:?}, processed: {processed_epoch:?}")]
pub struct PipelineProgress {
    downloaded_epoch: AtomicU64,
    processed_epoch: AtomicU64,
}

impl PipelineProgress {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            downloaded_epoch: AtomicU64::new(0),
            processed_epoch: AtomicU64::new(0),
        }
    }

    pub fn record_downloaded(&self, epoch: u64) {
        self.downloaded_epoch.fetch_max(epoch, Ordering::Relaxed);
    }

    pub fn record_processed(&self, epoch: u64) {
        self.processed_epoch.fetch_max(epoch, Ordering::Relaxed);
    }

    #[must_use]
    pub fn downloaded_epoch(&self) -> u64 {
        self.downloaded_epoch.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn processed_epoch(&self) -> u64 {
        self.processed_epoch.load(Ordering::Relaxed)
    }
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! info_with_progress {
    ($($arg:tt)*) => {
        ::tracing::info!("[{}] {}", $crate::PROGRESS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! debug_with_progress {
    ($($arg:tt)*) => {
        ::tracing::debug!("[{}] {}", $crate::PROGRESS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn_with_progress {
    ($($arg:tt)*) => {
        ::tracing::warn!("[{}] {}", $crate::PROGRESS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! error_with_progress {
    ($($arg:tt)*) => {
        ::tracing::error!("[{}] {}", $crate::PROGRESS, format_args!($($arg)*));
    };
}
