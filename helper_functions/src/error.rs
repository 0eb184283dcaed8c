use thiserror::Error;
use types::primitives::Slot;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("block roots are empty")]
    BlockRootsEmpty,
    #[error("block root for slot {slot} is not retained by state at slot {state_slot}")]
    BlockRootNotRetained { slot: Slot, state_slot: Slot },
}
