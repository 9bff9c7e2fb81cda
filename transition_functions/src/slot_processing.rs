use anyhow::Result;
use hashing::merkle_root;
use helper_functions::{
    accessors::ring_entry_mut,
    error::StateVector,
    invariants::validate_invariants,
    verifier::{NullVerifier, Verifier},
};
use log::debug;
use types::{config::Config, phase0::beacon_state::BeaconState};

use crate::epoch_processing;

/// Advances `state` by one slot, running epoch processing when the slot ends an epoch.
///
/// `state` is left untouched if the transition fails.
pub fn advance_slot(config: &Config, state: &mut BeaconState) -> Result<()> {
    advance_slot_with_verifier(config, state, NullVerifier)
}

pub fn advance_slot_with_verifier(
    config: &Config,
    state: &mut BeaconState,
    verifier: impl Verifier,
) -> Result<()> {
    validate_invariants(config, state)?;

    let mut post_state = state.clone();

    process_slot(config, &mut post_state)?;

    if (post_state.slot + 1) % config.slots_per_epoch == 0 {
        epoch_processing::process_epoch(config, &mut post_state, verifier)?;
    }

    post_state.slot += 1;
    *state = post_state;

    Ok(())
}

pub fn process_slot(config: &Config, state: &mut BeaconState) -> Result<()> {
    let slot = state.slot;

    // > Cache block root
    let previous_block_root = state.latest_block_header.signing_root();

    *ring_entry_mut(
        &mut state.latest_block_roots,
        StateVector::BlockRoots,
        config.latest_block_roots_length,
        slot,
    )? = previous_block_root;

    // > Batch block roots once the ring buffer wraps around
    if (slot + 1) % config.latest_block_roots_length == 0 {
        let batched_root = merkle_root(state.latest_block_roots.iter().copied());

        debug!("batching block roots ending at slot {slot}");

        state.batched_block_roots.push(batched_root);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use helper_functions::{
        accessors::{get_block_root_at_slot, get_current_epoch},
        error::InvalidState,
    };
    use types::phase0::{containers::BeaconBlockHeader, primitives::H256};

    use super::*;

    fn quick_start(config: &Config, validator_count: u64) -> BeaconState {
        interop::quick_start_beacon_state(config, 0, validator_count)
            .expect("quick start state can be built")
    }

    #[test]
    fn block_root_is_recorded_for_current_slot() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16);

        state.slot = 3;
        state.latest_block_header = BeaconBlockHeader {
            slot: 3,
            state_root: H256::repeat_byte(1),
            ..BeaconBlockHeader::default()
        };

        advance_slot(&config, &mut state)?;

        assert_eq!(state.slot, 4);

        assert_eq!(
            get_block_root_at_slot(&config, &state, 3)?,
            state.latest_block_header.signing_root(),
        );

        Ok(())
    }

    #[test]
    fn epoch_is_processed_at_last_slot() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16);

        state.slot = config.slots_per_epoch.get() - 2;

        advance_slot(&config, &mut state)?;

        assert_eq!(state.current_calculation_epoch, 0);

        advance_slot(&config, &mut state)?;

        assert_eq!(get_current_epoch(&config, &state), 1);
        assert_eq!(state.current_calculation_epoch, 1);
        assert_eq!(state.latest_randao_mixes[1], state.latest_randao_mixes[0]);

        Ok(())
    }

    #[test]
    fn block_roots_are_batched_when_buffer_wraps() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16);
        let length = config.latest_block_roots_length.get();

        for _ in 0..length - 1 {
            advance_slot(&config, &mut state)?;
        }

        assert!(state.batched_block_roots.is_empty());

        advance_slot(&config, &mut state)?;

        assert_eq!(state.slot, length);

        itertools::assert_equal(
            state.batched_block_roots.iter().copied(),
            [merkle_root(state.latest_block_roots.iter().copied())],
        );

        validate_invariants(&config, &state)
    }

    #[test]
    fn failed_advance_leaves_state_untouched() {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16);

        state.slot = config.slots_per_epoch.get() - 1;
        state.latest_crosslinks.pop();

        let pre_state = state.clone();
        let error = advance_slot(&config, &mut state).expect_err("crosslinks are missing");

        assert!(matches!(
            error.downcast_ref::<InvalidState>(),
            Some(InvalidState::VectorLengthMismatch {
                vector: StateVector::Crosslinks,
                ..
            }),
        ));

        assert_eq!(state, pre_state);
    }
}
