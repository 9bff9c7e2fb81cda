use core::cmp::Ordering;

use anyhow::Result;
use bls::SignatureBytes;
use hashing::hash_bytes;
use log::debug;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::FAR_FUTURE_EPOCH,
        primitives::{Epoch, Gwei, ValidatorIndex},
    },
};

use crate::{
    accessors::{self, get_current_epoch, get_validator_churn_limit},
    error::{PreconditionViolation, StateVector},
    misc::compute_activation_exit_epoch,
};

#[inline]
pub fn increase_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_add(delta);
}

#[inline]
pub fn decrease_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_sub(delta);
}

/// Queues `validator_index` for exit behind the validators that are already exiting.
///
/// At most `get_validator_churn_limit` validators exit in the same epoch.
pub fn initiate_validator_exit(
    config: &Config,
    state: &mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<()> {
    // > Return if validator already initiated exit
    if accessors::get_validator(state, validator_index)?.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    let exit_queue_epoch = exit_queue_epoch(config, state);

    // > Set validator exit epoch and withdrawable epoch
    let validator = accessors::get_validator_mut(state, validator_index)?;

    validator.exit_epoch = exit_queue_epoch;

    validator.withdrawable_epoch = exit_queue_epoch
        .checked_add(config.min_validator_withdrawability_delay)
        .ok_or(PreconditionViolation::EpochOverflow)?;

    debug!("validator {validator_index} initiated exit at epoch {exit_queue_epoch}");

    Ok(())
}

fn exit_queue_epoch(config: &Config, state: &BeaconState) -> Epoch {
    let current_epoch = get_current_epoch(config, state);
    let mut exit_queue_epoch = compute_activation_exit_epoch(config, current_epoch);
    let mut exit_queue_churn = 0;

    for validator in &state.validator_registry {
        let exit_epoch = validator.exit_epoch;

        if exit_epoch == FAR_FUTURE_EPOCH {
            continue;
        }

        match exit_epoch.cmp(&exit_queue_epoch) {
            Ordering::Less => {}
            Ordering::Equal => exit_queue_churn += 1,
            Ordering::Greater => {
                exit_queue_epoch = exit_epoch;
                exit_queue_churn = 1;
            }
        }
    }

    if exit_queue_churn >= get_validator_churn_limit(config, state) {
        exit_queue_epoch += 1;
    }

    exit_queue_epoch
}

/// Mixes a block proposer's randao reveal into the mix of the current epoch.
pub fn mix_in_randao(
    config: &Config,
    state: &mut BeaconState,
    randao_reveal: SignatureBytes,
) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);

    let mix = accessors::ring_entry_mut(
        &mut state.latest_randao_mixes,
        StateVector::RandaoMixes,
        config.latest_randao_mixes_length,
        current_epoch,
    )?;

    *mix ^= hash_bytes(randao_reveal);

    Ok(())
}
