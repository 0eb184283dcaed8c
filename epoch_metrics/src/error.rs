use core::num::TryFromIntError;

use thiserror::Error;
use types::primitives::{Epoch, ValidatorIndex};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("state for epoch {epoch} is not available")]
    MissingNextState { epoch: Epoch },
    #[error("{role} state is for epoch {actual}, expected epoch {expected}")]
    EpochMismatch {
        role: &'static str,
        expected: Epoch,
        actual: Epoch,
    },
    #[error("validator {validator_index} is not present in the {role} state")]
    UnknownValidator {
        role: &'static str,
        validator_index: ValidatorIndex,
    },
    #[error("balance of validator {validator_index} does not fit in a signed reward")]
    BalanceOverflow {
        validator_index: ValidatorIndex,
        source: TryFromIntError,
    },
}
