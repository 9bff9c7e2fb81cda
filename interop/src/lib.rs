//! Deterministic genesis states for tests and local runs.
//!
//! Keys are derived from validator indices and are not valid BLS points. They are only meant to
//! be distinct, which is all a `NullVerifier` needs.

use anyhow::Result;
use bls::PublicKeyBytes;
use hashing::{hash_256, hash_bytes};
use helper_functions::accessors::{compute_active_index_root, generate_seed};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        containers::{Eth1Data, Validator},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
};

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#create-genesis-state>
const QUICK_START_ETH1_BLOCK_HASH: H256 = H256([0x42; 32]);

const BLS_WITHDRAWAL_PREFIX: u8 = 0;

/// A genesis state with `validator_count` validators that are active from the genesis epoch.
pub fn quick_start_beacon_state(
    config: &Config,
    genesis_time: UnixSeconds,
    validator_count: u64,
) -> Result<BeaconState> {
    let eth1_data = Eth1Data {
        block_hash: QUICK_START_ETH1_BLOCK_HASH,
        ..Eth1Data::default()
    };

    let mut state = BeaconState::new(config, genesis_time, eth1_data)?;

    for validator_index in 0..validator_count {
        let pubkey = public_key(validator_index);

        state.validator_registry.push(Validator {
            pubkey,
            withdrawal_credentials: withdrawal_credentials(pubkey),
            effective_balance: config.max_effective_balance,
            slashed: false,
            activation_eligibility_epoch: GENESIS_EPOCH,
            activation_epoch: GENESIS_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        });

        state.validator_balances.push(config.max_effective_balance);
    }

    // Seeds of the first epochs read index roots up to the activation exit delay.
    for epoch in GENESIS_EPOCH..=GENESIS_EPOCH + config.activation_exit_delay {
        let index_root = compute_active_index_root(&state, epoch);
        let position = epoch % config.latest_index_roots_length;

        state.latest_index_roots[usize::try_from(position)?] = index_root;
    }

    let genesis_seed = generate_seed(config, &state, GENESIS_EPOCH)?;

    state.previous_epoch_seed = genesis_seed;
    state.current_epoch_seed = genesis_seed;

    Ok(state)
}

#[must_use]
pub fn public_key(validator_index: ValidatorIndex) -> PublicKeyBytes {
    let high = hash_bytes(validator_index.to_le_bytes());
    let low = hash_256(high);

    let mut public_key = PublicKeyBytes::zero();
    let (head, tail) = public_key.as_bytes_mut().split_at_mut(H256::len_bytes());

    head.copy_from_slice(high.as_bytes());
    tail.copy_from_slice(&low.as_bytes()[..tail.len()]);

    public_key
}

fn withdrawal_credentials(public_key: PublicKeyBytes) -> H256 {
    let mut credentials = hash_bytes(public_key);
    credentials.as_bytes_mut()[0] = BLS_WITHDRAWAL_PREFIX;
    credentials
}
