pub use crate::{
    api::ChainApi,
    decode::{decode_state, DecodeError},
    error::{ApiError, FetchError},
    fetcher::ResilientFetcher,
    retry::RetryPolicy,
};

mod api;
mod decode;
mod error;
mod fetcher;
mod retry;
