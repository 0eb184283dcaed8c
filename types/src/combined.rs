use crate::{
    containers::Validator,
    nonstandard::Phase,
    primitives::{Gwei, ParticipationFlags, Slot, ValidatorIndex, H256},
};

/// Beacon state as delivered by the upstream chain client, tagged with the fork it was decoded for.
///
/// `block_roots` is indexed by `slot % block_roots.len()`, like the historical ring buffer in the
/// state itself. Phase 0 states carry participation already folded from pending attestations.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct VersionedBeaconState {
    pub phase: Phase,
    pub slot: Slot,
    pub validators: Vec<Validator>,
    pub balances: Vec<Gwei>,
    pub block_roots: Vec<H256>,
    pub previous_epoch_participation: Vec<ParticipationFlags>,
    pub current_sync_committee: Vec<ValidatorIndex>,
}
