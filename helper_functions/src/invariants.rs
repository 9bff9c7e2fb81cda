use anyhow::{ensure, Result};
use arithmetic::U64Ext as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState, consts::FAR_FUTURE_EPOCH, containers::Validator,
        primitives::Epoch,
    },
};

use crate::error::{EpochField, InvalidState, StateVector};

/// Checks the invariants every transition relies on.
pub fn validate_invariants(config: &Config, state: &BeaconState) -> Result<()> {
    config.validate()?;

    ensure!(
        state.validator_registry.len() == state.validator_balances.len(),
        InvalidState::RegistryLengthMismatch {
            validators: state.validator_registry.len(),
            balances: state.validator_balances.len(),
        },
    );

    let vector_lengths = [
        (
            StateVector::RandaoMixes,
            config.latest_randao_mixes_length.get(),
            state.latest_randao_mixes.len(),
        ),
        (
            StateVector::BlockRoots,
            config.latest_block_roots_length.get(),
            state.latest_block_roots.len(),
        ),
        (
            StateVector::IndexRoots,
            config.latest_index_roots_length.get(),
            state.latest_index_roots.len(),
        ),
        (
            StateVector::PenalizedBalances,
            config.latest_penalized_exit_length.get(),
            state.latest_penalized_balances.len(),
        ),
        (
            StateVector::Crosslinks,
            config.shard_count.get(),
            state.latest_crosslinks.len(),
        ),
    ];

    for (vector, expected, actual) in vector_lengths {
        ensure!(
            u64::try_from(actual) == Ok(expected),
            InvalidState::VectorLengthMismatch {
                vector,
                expected,
                actual,
            },
        );
    }

    for (validator_index, validator) in (0..).zip(&state.validator_registry) {
        let effective_balance = validator.effective_balance;

        ensure!(
            effective_balance <= config.max_effective_balance,
            InvalidState::EffectiveBalanceExceedsMaximum {
                validator_index,
                effective_balance,
                maximum: config.max_effective_balance,
            },
        );

        ensure!(
            effective_balance.prev_multiple_of(config.effective_balance_increment)
                == effective_balance,
            InvalidState::EffectiveBalanceNotMultipleOfIncrement {
                validator_index,
                effective_balance,
                increment: config.effective_balance_increment.get(),
            },
        );
    }

    Ok(())
}

/// Checks that no validator was removed and that no scheduled epoch moved backwards.
pub fn validate_epoch_fields_did_not_regress(
    before: &[Validator],
    after: &[Validator],
) -> Result<()> {
    ensure!(
        before.len() <= after.len(),
        InvalidState::RegistryShrank {
            before: before.len(),
            after: after.len(),
        },
    );

    for (validator_index, (old, new)) in (0..).zip(before.iter().zip(after)) {
        let fields = [
            (
                EpochField::ActivationEligibility,
                old.activation_eligibility_epoch,
                new.activation_eligibility_epoch,
            ),
            (EpochField::Activation, old.activation_epoch, new.activation_epoch),
            (EpochField::Exit, old.exit_epoch, new.exit_epoch),
            (EpochField::Withdrawable, old.withdrawable_epoch, new.withdrawable_epoch),
        ];

        for (field, before, after) in fields {
            ensure!(
                !regressed(before, after),
                InvalidState::EpochFieldRegressed {
                    validator_index,
                    field,
                    before,
                    after,
                },
            );
        }
    }

    Ok(())
}

const fn regressed(before: Epoch, after: Epoch) -> bool {
    before != FAR_FUTURE_EPOCH && after < before
}
