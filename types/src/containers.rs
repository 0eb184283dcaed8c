use crate::primitives::{Epoch, ExecutionAddress, Gwei, PublicKeyBytes, Slot, ValidatorIndex, H256};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProposerDuty {
    pub validator_index: ValidatorIndex,
    pub slot: Slot,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Finality {
    pub previous_justified: Checkpoint,
    pub current_justified: Checkpoint,
    pub finalized: Checkpoint,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    pub gas_used: u64,
    pub effective_gas_price: u64,
    pub contract_address: Option<ExecutionAddress>,
}
