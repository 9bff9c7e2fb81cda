use core::num::TryFromIntError;

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    phase0::{
        consts::{GENESIS_EPOCH, GENESIS_SLOT, GENESIS_START_SHARD},
        containers::{
            BeaconBlockHeader, Crosslink, Eth1Data, Eth1DataVote, Fork, PendingAttestation,
            Validator,
        },
        primitives::{Epoch, Gwei, Shard, Slot, UnixSeconds, H256},
    },
};

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconState {
    // > Misc
    pub slot: Slot,
    pub genesis_time: UnixSeconds,
    pub fork: Fork,

    // > Validator registry
    pub validator_registry: Vec<Validator>,
    pub validator_balances: Vec<Gwei>,
    pub validator_registry_update_epoch: Epoch,

    // > Randomness and committees
    pub latest_randao_mixes: Vec<H256>,
    pub previous_epoch_start_shard: Shard,
    pub current_epoch_start_shard: Shard,
    pub previous_calculation_epoch: Epoch,
    pub current_calculation_epoch: Epoch,
    pub previous_epoch_seed: H256,
    pub current_epoch_seed: H256,

    // > Finality
    pub previous_justified_epoch: Epoch,
    pub justified_epoch: Epoch,
    pub justification_bitfield: u64,
    pub finalized_epoch: Epoch,

    // > Recent state
    pub latest_crosslinks: Vec<Crosslink>,
    pub latest_block_roots: Vec<H256>,
    pub latest_index_roots: Vec<H256>,
    pub latest_penalized_balances: Vec<Gwei>,
    pub latest_attestations: Vec<PendingAttestation>,
    pub batched_block_roots: Vec<H256>,
    pub latest_block_header: BeaconBlockHeader,

    // > Ethereum 1.0 chain data
    pub latest_eth1_data: Eth1Data,
    pub eth1_data_votes: Vec<Eth1DataVote>,
}

impl BeaconState {
    /// A state at the genesis slot with an empty registry and zeroed history.
    ///
    /// Fixed-length sequences are sized from `config`. Validators are added by the caller.
    pub fn new(
        config: &Config,
        genesis_time: UnixSeconds,
        latest_eth1_data: Eth1Data,
    ) -> Result<Self, TryFromIntError> {
        let genesis_crosslink = Crosslink {
            epoch: GENESIS_EPOCH,
            shard_block_root: H256::zero(),
        };

        Ok(Self {
            slot: GENESIS_SLOT,
            genesis_time,
            fork: Fork {
                previous_version: config.genesis_fork_version,
                current_version: config.genesis_fork_version,
                epoch: GENESIS_EPOCH,
            },
            validator_registry: vec![],
            validator_balances: vec![],
            validator_registry_update_epoch: GENESIS_EPOCH,
            latest_randao_mixes: vec![
                H256::zero();
                config.latest_randao_mixes_length.get().try_into()?
            ],
            previous_epoch_start_shard: GENESIS_START_SHARD,
            current_epoch_start_shard: GENESIS_START_SHARD,
            previous_calculation_epoch: GENESIS_EPOCH,
            current_calculation_epoch: GENESIS_EPOCH,
            previous_epoch_seed: H256::zero(),
            current_epoch_seed: H256::zero(),
            previous_justified_epoch: GENESIS_EPOCH,
            justified_epoch: GENESIS_EPOCH,
            justification_bitfield: 0,
            finalized_epoch: GENESIS_EPOCH,
            latest_crosslinks: vec![genesis_crosslink; config.shard_count.get().try_into()?],
            latest_block_roots: vec![
                H256::zero();
                config.latest_block_roots_length.get().try_into()?
            ],
            latest_index_roots: vec![
                H256::zero();
                config.latest_index_roots_length.get().try_into()?
            ],
            latest_penalized_balances: vec![
                0;
                config.latest_penalized_exit_length.get().try_into()?
            ],
            latest_attestations: vec![],
            batched_block_roots: vec![],
            latest_block_header: BeaconBlockHeader::default(),
            latest_eth1_data,
            eth1_data_votes: vec![],
        })
    }
}
