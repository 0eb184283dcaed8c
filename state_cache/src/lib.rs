pub use crate::state_cache::{StateCache, StateCacheError};

mod state_cache;
