use core::{num::NonZeroU64, ops::Range};

use types::{
    config::Config,
    phase0::{
        containers::Fork,
        primitives::{Domain, DomainType, Epoch, Slot, ValidatorIndex, H256},
    },
};

#[must_use]
pub fn compute_epoch_at_slot(config: &Config, slot: Slot) -> Epoch {
    slot / config.slots_per_epoch
}

#[must_use]
pub const fn compute_start_slot_at_epoch(config: &Config, epoch: Epoch) -> Slot {
    epoch.saturating_mul(config.slots_per_epoch.get())
}

#[must_use]
pub const fn slots_in_epoch(config: &Config, epoch: Epoch) -> Range<Slot> {
    compute_start_slot_at_epoch(config, epoch)..compute_start_slot_at_epoch(config, epoch + 1)
}

/// The earliest epoch at which a validator activated or exited in `epoch` takes effect.
#[must_use]
pub const fn compute_activation_exit_epoch(config: &Config, epoch: Epoch) -> Epoch {
    epoch
        .saturating_add(1)
        .saturating_add(config.activation_exit_delay)
}

/// Signature domain of `domain_type` at `epoch`.
///
/// The low 4 bytes hold the domain type and the high 4 bytes hold the fork version in effect.
#[must_use]
pub fn compute_domain(fork: Fork, epoch: Epoch, domain_type: DomainType) -> Domain {
    let fork_version = if epoch < fork.epoch {
        fork.previous_version
    } else {
        fork.current_version
    };

    let mut bytes = [0; size_of::<Domain>()];
    bytes[..size_of::<DomainType>()].copy_from_slice(&domain_type.to_le_bytes());
    bytes[size_of::<DomainType>()..].copy_from_slice(fork_version.as_bytes());
    Domain::from_le_bytes(bytes)
}

/// Number of crosslink committees in an epoch with `active_validator_count` active validators.
///
/// Always a nonzero multiple of `SLOTS_PER_EPOCH`.
#[must_use]
pub fn committee_count(config: &Config, active_validator_count: u64) -> u64 {
    let slots_per_epoch = config.slots_per_epoch.get();

    let committees_per_slot = (config.shard_count.get() / slots_per_epoch)
        .min(active_validator_count / slots_per_epoch / config.target_committee_size)
        .max(1);

    committees_per_slot * slots_per_epoch
}

/// Positions in the shuffled index list occupied by committee `index` out of `count`.
#[must_use]
pub fn committee_range(length: usize, index: u64, count: NonZeroU64) -> Range<usize> {
    let length_u128 = length as u128;
    let count = u128::from(count.get());
    let start = length_u128 * u128::from(index) / count;
    let end = length_u128 * (u128::from(index) + 1) / count;

    // Both bounds are at most `length`, so the conversions cannot fail.
    let start = usize::try_from(start).unwrap_or(length);
    let end = usize::try_from(end).unwrap_or(length);

    start..end
}

/// Permutes `indices` with the swap-or-not shuffle.
///
/// Position `i` of the result holds `indices[shuffle_single(i)]`, so committees are contiguous
/// slices of it.
#[must_use]
pub fn shuffle_indices(
    config: &Config,
    indices: &[ValidatorIndex],
    seed: H256,
) -> Vec<ValidatorIndex> {
    let Some(index_count) = NonZeroU64::new(indices.len() as u64) else {
        return vec![];
    };

    (0..index_count.get())
        .map(|position| {
            let shuffled = shuffling::shuffle_single(config, position, index_count, seed);

            // `shuffled` is less than `indices.len()`, which fits in `usize`.
            #[expect(clippy::cast_possible_truncation)]
            indices[shuffled as usize]
        })
        .collect()
}
