pub use ethereum_types::{H160, H256};

pub type Epoch = u64;
pub type ExecutionAddress = H160;
pub type Gwei = u64;
pub type ParticipationFlags = u8;
pub type Slot = u64;
pub type ValidatorIndex = u64;

fixed_hash::construct_fixed_hash! {
    pub struct PublicKeyBytes(48);
}
