use core::num::NonZeroU64;

use anyhow::{ensure, Result};
use hashing::{hash_256_256_64, merkle_root, mix_in_length};
use itertools::Itertools as _;
use num_bigint::BigUint;
use types::{
    config::Config,
    nonstandard::RelativeEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_EPOCH,
        containers::{AttestationData, Bitfield, Validator},
        primitives::{Epoch, Shard, Slot, ValidatorIndex, H256},
    },
};

use crate::{
    error::{InvalidState, PreconditionViolation, StateVector},
    misc, predicates,
};

#[must_use]
pub fn get_current_epoch(config: &Config, state: &BeaconState) -> Epoch {
    misc::compute_epoch_at_slot(config, state.slot)
}

#[must_use]
pub fn get_previous_epoch(config: &Config, state: &BeaconState) -> Epoch {
    get_current_epoch(config, state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_next_epoch(config: &Config, state: &BeaconState) -> Epoch {
    get_current_epoch(config, state) + 1
}

#[must_use]
pub fn get_finality_delay(config: &Config, state: &BeaconState) -> u64 {
    get_previous_epoch(config, state).saturating_sub(state.finalized_epoch)
}

/// Which of the two shufflings kept in `state` covers `epoch`.
///
/// At the genesis epoch the previous and current epochs coincide and the current one is used.
pub fn relative_epoch(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<RelativeEpoch> {
    let state_epoch = get_current_epoch(config, state);

    if epoch == state_epoch {
        return Ok(RelativeEpoch::Current);
    }

    ensure!(
        epoch == get_previous_epoch(config, state),
        PreconditionViolation::EpochOutOfRange { epoch, state_epoch },
    );

    Ok(RelativeEpoch::Previous)
}

/// Reads entry `index` of a ring buffer of `length` entries.
pub fn ring_entry<T: Copy>(
    vector: &[T],
    name: StateVector,
    length: NonZeroU64,
    index: u64,
) -> Result<T> {
    let position = usize::try_from(index % length)?;

    vector.get(position).copied().ok_or_else(|| {
        InvalidState::VectorLengthMismatch {
            vector: name,
            expected: length.get(),
            actual: vector.len(),
        }
        .into()
    })
}

pub fn ring_entry_mut<T>(
    vector: &mut [T],
    name: StateVector,
    length: NonZeroU64,
    index: u64,
) -> Result<&mut T> {
    let position = usize::try_from(index % length)?;
    let actual = vector.len();

    vector.get_mut(position).ok_or_else(|| {
        InvalidState::VectorLengthMismatch {
            vector: name,
            expected: length.get(),
            actual,
        }
        .into()
    })
}

pub fn get_block_root_at_slot(config: &Config, state: &BeaconState, slot: Slot) -> Result<H256> {
    let out_of_range = PreconditionViolation::SlotOutOfRange {
        slot,
        state_slot: state.slot,
    };

    ensure!(slot < state.slot, out_of_range);

    ensure!(
        state.slot <= slot.saturating_add(config.latest_block_roots_length.get()),
        out_of_range,
    );

    ring_entry(
        &state.latest_block_roots,
        StateVector::BlockRoots,
        config.latest_block_roots_length,
        slot,
    )
}

/// Root of the block at the start of `epoch`.
pub fn get_block_root(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<H256> {
    get_block_root_at_slot(
        config,
        state,
        misc::compute_start_slot_at_epoch(config, epoch),
    )
}

pub fn get_randao_mix(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<H256> {
    ring_entry(
        &state.latest_randao_mixes,
        StateVector::RandaoMixes,
        config.latest_randao_mixes_length,
        epoch,
    )
}

pub fn get_active_index_root(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<H256> {
    ring_entry(
        &state.latest_index_roots,
        StateVector::IndexRoots,
        config.latest_index_roots_length,
        epoch,
    )
}

/// Root of the list of validators active at `epoch`, packed four indices to a chunk.
#[must_use]
pub fn compute_active_index_root(state: &BeaconState, epoch: Epoch) -> H256 {
    let indices = active_validator_indices(state, epoch).collect_vec();

    let chunks = indices.chunks(4).map(|packed| {
        let mut chunk = H256::zero();

        for (bytes, index) in chunk.as_bytes_mut().chunks_exact_mut(8).zip(packed) {
            bytes.copy_from_slice(&index.to_le_bytes());
        }

        chunk
    });

    mix_in_length(merkle_root(chunks), indices.len())
}

pub fn generate_seed(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<H256> {
    let randao_mix = get_randao_mix(
        config,
        state,
        epoch.saturating_sub(config.min_seed_lookahead),
    )?;

    let index_root = get_active_index_root(config, state, epoch)?;

    Ok(hash_256_256_64(randao_mix, index_root, epoch))
}

pub fn active_validator_indices(
    state: &BeaconState,
    epoch: Epoch,
) -> impl Iterator<Item = ValidatorIndex> + '_ {
    (0..)
        .zip(&state.validator_registry)
        .filter(move |(_, validator)| predicates::is_active_validator(validator, epoch))
        .map(|(validator_index, _)| validator_index)
}

pub fn get_validator(state: &BeaconState, validator_index: ValidatorIndex) -> Result<&Validator> {
    usize::try_from(validator_index)
        .ok()
        .and_then(|position| state.validator_registry.get(position))
        .ok_or_else(|| PreconditionViolation::ValidatorIndexOutOfBounds { validator_index }.into())
}

pub fn get_validator_mut(
    state: &mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<&mut Validator> {
    usize::try_from(validator_index)
        .ok()
        .and_then(|position| state.validator_registry.get_mut(position))
        .ok_or_else(|| PreconditionViolation::ValidatorIndexOutOfBounds { validator_index }.into())
}

/// Sum of the effective balances of `validator_indices`.
pub fn get_total_balance(
    state: &BeaconState,
    validator_indices: impl IntoIterator<Item = ValidatorIndex>,
) -> Result<BigUint> {
    validator_indices
        .into_iter()
        .map(|validator_index| get_validator(state, validator_index))
        .map_ok(|validator| BigUint::from(validator.effective_balance))
        .sum()
}

#[must_use]
pub fn get_total_active_balance(config: &Config, state: &BeaconState) -> BigUint {
    let current_epoch = get_current_epoch(config, state);

    state
        .validator_registry
        .iter()
        .filter(|validator| predicates::is_active_validator(validator, current_epoch))
        .map(|validator| BigUint::from(validator.effective_balance))
        .sum()
}

#[must_use]
pub fn get_validator_churn_limit(config: &Config, state: &BeaconState) -> u64 {
    let active_validator_count = active_validator_indices(state, get_current_epoch(config, state))
        .count() as u64;

    (active_validator_count / config.churn_limit_quotient).max(config.min_per_epoch_churn_limit)
}

/// Crosslink committees of one epoch, computed from a single shuffle of its active validators.
#[derive(Clone, Debug)]
pub struct EpochCommittees {
    epoch: Epoch,
    start_shard: Shard,
    committee_count: NonZeroU64,
    shuffled_indices: Vec<ValidatorIndex>,
}

impl EpochCommittees {
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub const fn committee_count(&self) -> u64 {
        self.committee_count.get()
    }

    /// Committees assigned to `slot` along with their shards.
    pub fn committees_at_slot<'committees>(
        &'committees self,
        config: &Config,
        slot: Slot,
    ) -> Result<impl Iterator<Item = (Shard, &'committees [ValidatorIndex])>> {
        let slot_epoch = misc::compute_epoch_at_slot(config, slot);

        ensure!(
            slot_epoch == self.epoch,
            PreconditionViolation::EpochOutOfRange {
                epoch: slot_epoch,
                state_epoch: self.epoch,
            },
        );

        let slots_per_epoch = config.slots_per_epoch.get();
        let committees_per_slot = self.committee_count.get() / slots_per_epoch;
        let offset = slot % slots_per_epoch;
        let shard_count = config.shard_count;

        Ok((0..committees_per_slot).map(move |position| {
            let committee_index = committees_per_slot * offset + position;
            let shard = (self.start_shard + committee_index) % shard_count;

            let range = misc::committee_range(
                self.shuffled_indices.len(),
                committee_index,
                self.committee_count,
            );

            (shard, &self.shuffled_indices[range])
        }))
    }

    /// Every committee of the epoch in slot order.
    pub fn iter<'committees>(
        &'committees self,
        config: &'committees Config,
    ) -> impl Iterator<Item = (Slot, Shard, &'committees [ValidatorIndex])> {
        misc::slots_in_epoch(config, self.epoch).flat_map(move |slot| {
            self.committees_at_slot(config, slot)
                .into_iter()
                .flatten()
                .map(move |(shard, committee)| (slot, shard, committee))
        })
    }

    pub fn committee_for_shard(
        &self,
        config: &Config,
        slot: Slot,
        shard: Shard,
    ) -> Result<&[ValidatorIndex]> {
        self.committees_at_slot(config, slot)?
            .find(|(committee_shard, _)| *committee_shard == shard)
            .map(|(_, committee)| committee)
            .ok_or_else(|| PreconditionViolation::NoCommitteeForShard { slot, shard }.into())
    }

    /// Members of the committee attesting to `data` whose bits are set in `bitfield`.
    pub fn attestation_participants(
        &self,
        config: &Config,
        data: &AttestationData,
        bitfield: &Bitfield,
    ) -> Result<Vec<ValidatorIndex>> {
        let committee = self.committee_for_shard(config, data.slot, data.shard)?;

        ensure!(
            bitfield.len() == committee.len(),
            PreconditionViolation::BitfieldLengthMismatch {
                bitfield_length: bitfield.len(),
                committee_length: committee.len(),
            },
        );

        Ok(committee
            .iter()
            .zip(bitfield.iter().by_vals())
            .filter(|(_, participated)| *participated)
            .map(|(validator_index, _)| *validator_index)
            .collect())
    }
}

pub fn get_epoch_committees(
    config: &Config,
    state: &BeaconState,
    relative_epoch: RelativeEpoch,
) -> EpochCommittees {
    let (epoch, calculation_epoch, start_shard, seed) = match relative_epoch {
        RelativeEpoch::Previous => (
            get_previous_epoch(config, state),
            state.previous_calculation_epoch,
            state.previous_epoch_start_shard,
            state.previous_epoch_seed,
        ),
        RelativeEpoch::Current => (
            get_current_epoch(config, state),
            state.current_calculation_epoch,
            state.current_epoch_start_shard,
            state.current_epoch_seed,
        ),
    };

    let active_indices = active_validator_indices(state, calculation_epoch).collect_vec();
    let committee_count = misc::committee_count(config, active_indices.len() as u64);

    EpochCommittees {
        epoch,
        start_shard,
        committee_count: NonZeroU64::new(committee_count).unwrap_or(config.slots_per_epoch),
        shuffled_indices: misc::shuffle_indices(config, &active_indices, seed),
    }
}

pub fn get_crosslink_committees_at_slot(
    config: &Config,
    state: &BeaconState,
    slot: Slot,
) -> Result<Vec<(Shard, Vec<ValidatorIndex>)>> {
    let epoch = misc::compute_epoch_at_slot(config, slot);
    let committees = get_epoch_committees(config, state, relative_epoch(config, state, epoch)?);

    let crosslink_committees = committees
        .committees_at_slot(config, slot)?
        .map(|(shard, committee)| (shard, committee.to_vec()))
        .collect();

    Ok(crosslink_committees)
}

pub fn get_attestation_participants(
    config: &Config,
    state: &BeaconState,
    data: &AttestationData,
    bitfield: &Bitfield,
) -> Result<Vec<ValidatorIndex>> {
    let epoch = misc::compute_epoch_at_slot(config, data.slot);

    get_epoch_committees(config, state, relative_epoch(config, state, epoch)?)
        .attestation_participants(config, data, bitfield)
}
