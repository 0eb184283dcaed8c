use core::ops::Range;

use types::{
    consts::SLOTS_PER_EPOCH,
    primitives::{Epoch, Slot},
};

#[must_use]
pub const fn compute_epoch_at_slot(slot: Slot) -> Epoch {
    slot / SLOTS_PER_EPOCH
}

#[must_use]
pub const fn compute_start_slot_at_epoch(epoch: Epoch) -> Slot {
    epoch.saturating_mul(SLOTS_PER_EPOCH)
}

/// Last slot of `epoch`. States analyzed for an epoch are requested at this slot.
#[must_use]
pub const fn compute_end_slot_at_epoch(epoch: Epoch) -> Slot {
    compute_start_slot_at_epoch(epoch.saturating_add(1)).saturating_sub(1)
}

#[must_use]
pub const fn slots_in_epoch(epoch: Epoch) -> Range<Slot> {
    compute_start_slot_at_epoch(epoch)..compute_start_slot_at_epoch(epoch.saturating_add(1))
}

#[must_use]
pub const fn is_epoch_end(slot: Slot) -> bool {
    slot % SLOTS_PER_EPOCH == SLOTS_PER_EPOCH - 1
}
