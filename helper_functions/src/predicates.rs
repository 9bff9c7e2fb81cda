use types::{
    config::Config,
    phase0::{consts::FAR_FUTURE_EPOCH, containers::Validator, primitives::Epoch},
};

use crate::misc::compute_activation_exit_epoch;

// > Check if ``validator`` is active.
#[inline]
#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

// > Check if ``validator`` is eligible to be placed into the activation queue.
#[must_use]
pub const fn is_eligible_for_activation_queue(config: &Config, validator: &Validator) -> bool {
    validator.activation_eligibility_epoch == FAR_FUTURE_EPOCH
        && validator.effective_balance >= config.max_effective_balance
}

/// Whether `validator` competes for an activation slot given the finalized epoch.
///
/// Validators that were already assigned an activation epoch stay in the queue until that epoch
/// falls behind the activation delay of `finalized_epoch`.
#[must_use]
pub const fn is_eligible_for_activation(
    config: &Config,
    validator: &Validator,
    finalized_epoch: Epoch,
) -> bool {
    validator.activation_eligibility_epoch != FAR_FUTURE_EPOCH
        && validator.activation_epoch >= compute_activation_exit_epoch(config, finalized_epoch)
}

#[inline]
#[must_use]
pub const fn is_eligible_for_penalties(validator: &Validator, previous_epoch: Epoch) -> bool {
    is_active_validator(validator, previous_epoch)
        || (validator.slashed && previous_epoch.saturating_add(1) < validator.withdrawable_epoch)
}
