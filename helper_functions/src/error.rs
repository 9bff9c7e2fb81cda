use parse_display::Display;
use thiserror::Error;
use types::phase0::primitives::{Epoch, Gwei, Shard, Slot, ValidatorIndex};

/// A standing invariant of `BeaconState` does not hold.
///
/// Transitions check these on entry and abort without modifying the state.
#[derive(Clone, Copy, Debug, Error)]
pub enum InvalidState {
    #[error("validator registry has {validators} entries but there are {balances} balances")]
    RegistryLengthMismatch { validators: usize, balances: usize },
    #[error("validator registry shrank from {before} to {after} entries")]
    RegistryShrank { before: usize, after: usize },
    #[error(
        "validator {validator_index} has effective balance {effective_balance} \
         exceeding maximum {maximum}"
    )]
    EffectiveBalanceExceedsMaximum {
        validator_index: ValidatorIndex,
        effective_balance: Gwei,
        maximum: Gwei,
    },
    #[error(
        "validator {validator_index} has effective balance {effective_balance} \
         that is not a multiple of {increment}"
    )]
    EffectiveBalanceNotMultipleOfIncrement {
        validator_index: ValidatorIndex,
        effective_balance: Gwei,
        increment: Gwei,
    },
    #[error("{vector} has {actual} entries instead of {expected}")]
    VectorLengthMismatch {
        vector: StateVector,
        expected: u64,
        actual: usize,
    },
    #[error("{field} of validator {validator_index} regressed from {before} to {after}")]
    EpochFieldRegressed {
        validator_index: ValidatorIndex,
        field: EpochField,
        before: Epoch,
        after: Epoch,
    },
}

/// A query was made that a correctly bootstrapped caller would never make.
#[derive(Clone, Copy, Debug, Error)]
pub enum PreconditionViolation {
    #[error("total active balance is zero")]
    NoActiveBalance,
    #[error("validator index {validator_index} is out of bounds")]
    ValidatorIndexOutOfBounds { validator_index: ValidatorIndex },
    #[error("slot {slot} is out of range for state at slot {state_slot}")]
    SlotOutOfRange { slot: Slot, state_slot: Slot },
    #[error("epoch {epoch} has no committees in state at epoch {state_epoch}")]
    EpochOutOfRange { epoch: Epoch, state_epoch: Epoch },
    #[error("epoch number overflowed")]
    EpochOverflow,
    #[error("shard {shard} has no committee at slot {slot}")]
    NoCommitteeForShard { slot: Slot, shard: Shard },
    #[error(
        "aggregation bitfield length {bitfield_length} \
         does not match committee length {committee_length}"
    )]
    BitfieldLengthMismatch {
        bitfield_length: usize,
        committee_length: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum StateVector {
    #[display("latest_randao_mixes")]
    RandaoMixes,
    #[display("latest_block_roots")]
    BlockRoots,
    #[display("latest_index_roots")]
    IndexRoots,
    #[display("latest_penalized_balances")]
    PenalizedBalances,
    #[display("latest_crosslinks")]
    Crosslinks,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum EpochField {
    #[display("activation eligibility epoch")]
    ActivationEligibility,
    #[display("activation epoch")]
    Activation,
    #[display("exit epoch")]
    Exit,
    #[display("withdrawable epoch")]
    Withdrawable,
}
