//! Deterministic states and scripted collaborators for tests.

pub use crate::{
    chain::MockChainApi,
    sink::FailingSink,
    states::{
        beacon_state, proposer_duties, state, state_root, state_with_missed_slots, BALANCE_GROWTH,
        MAX_EFFECTIVE_BALANCE,
    },
};

mod chain;
mod sink;
mod states;
