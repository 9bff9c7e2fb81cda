use core::num::NonZeroU64;
use std::{borrow::Cow, collections::BTreeMap};

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{de::IgnoredAny, Deserialize, Serialize};
use thiserror::Error;

use crate::phase0::primitives::{Gwei, Version, H32};

/// Protocol constants injected into every transition.
///
/// Field names map to `SCREAMING_SNAKE_CASE` keys, so configuration files written for other
/// clients can be loaded with `serde_yaml`. Missing keys take their mainnet values.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants enforced by construction. \
              It is intended to be deserialized from user input and checked with `Config::validate`."
)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Genesis
    pub genesis_fork_version: Version,

    // Misc
    pub shard_count: NonZeroU64,
    pub target_committee_size: NonZeroU64,
    pub shuffle_round_count: u8,

    // Gwei values
    pub max_effective_balance: Gwei,
    pub effective_balance_increment: NonZeroU64,
    pub ejection_balance: Gwei,
    pub hysteresis_quotient: NonZeroU64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    // Time parameters
    pub slots_per_epoch: NonZeroU64,
    pub min_attestation_inclusion_delay: NonZeroU64,
    pub min_seed_lookahead: u64,
    pub activation_exit_delay: u64,
    pub epochs_per_eth1_voting_period: NonZeroU64,
    pub min_validator_withdrawability_delay: u64,
    pub min_epochs_to_inactivity_penalty: u64,

    // State list lengths
    pub latest_block_roots_length: NonZeroU64,
    pub latest_randao_mixes_length: NonZeroU64,
    pub latest_index_roots_length: NonZeroU64,
    pub latest_penalized_exit_length: NonZeroU64,

    // Rewards and penalties
    pub base_reward_factor: u64,
    pub base_rewards_per_epoch: NonZeroU64,
    pub proposer_reward_quotient: NonZeroU64,
    pub inactivity_penalty_quotient: NonZeroU64,

    // Validator cycle
    pub churn_limit_quotient: NonZeroU64,
    pub min_per_epoch_churn_limit: u64,

    // Later additions and other unknown variables
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, IgnoredAny>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Meta
            //
            // Use `default` as the default `config_name` and override it in `Config::mainnet`.
            // This way custom network data will be kept separate from mainnet data if a user
            // forgets to specify a custom `CONFIG_NAME`.
            config_name: Cow::Borrowed("default"),

            // Genesis
            genesis_fork_version: H32(hex!("00000000")),

            // Misc
            shard_count: nonzero!(1024_u64),
            target_committee_size: nonzero!(128_u64),
            shuffle_round_count: 90,

            // Gwei values
            max_effective_balance: 32_000_000_000,
            effective_balance_increment: nonzero!(1_000_000_000_u64),
            ejection_balance: 16_000_000_000,
            hysteresis_quotient: nonzero!(4_u64),
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,

            // Time parameters
            slots_per_epoch: nonzero!(64_u64),
            min_attestation_inclusion_delay: nonzero!(4_u64),
            min_seed_lookahead: 1,
            activation_exit_delay: 4,
            epochs_per_eth1_voting_period: nonzero!(16_u64),
            min_validator_withdrawability_delay: 256,
            min_epochs_to_inactivity_penalty: 4,

            // State list lengths
            latest_block_roots_length: nonzero!(8192_u64),
            latest_randao_mixes_length: nonzero!(8192_u64),
            latest_index_roots_length: nonzero!(8192_u64),
            latest_penalized_exit_length: nonzero!(8192_u64),

            // Rewards and penalties
            base_reward_factor: 64,
            base_rewards_per_epoch: nonzero!(5_u64),
            proposer_reward_quotient: nonzero!(8_u64),
            inactivity_penalty_quotient: nonzero!(1_u64 << 25),

            // Validator cycle
            churn_limit_quotient: nonzero!(1_u64 << 16),
            min_per_epoch_churn_limit: 4,

            // Later additions and other unknown variables
            unknown: BTreeMap::new(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            ..Self::default()
        }
    }

    /// Scaled-down constants for tests and local networks.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),

            // Genesis
            genesis_fork_version: H32(hex!("00000001")),

            // Misc
            shard_count: nonzero!(8_u64),
            target_committee_size: nonzero!(4_u64),
            shuffle_round_count: 10,

            // Time parameters
            slots_per_epoch: nonzero!(8_u64),
            min_attestation_inclusion_delay: nonzero!(1_u64),
            epochs_per_eth1_voting_period: nonzero!(2_u64),

            // State list lengths
            latest_block_roots_length: nonzero!(64_u64),
            latest_randao_mixes_length: nonzero!(64_u64),
            latest_index_roots_length: nonzero!(64_u64),
            latest_penalized_exit_length: nonzero!(64_u64),

            // Validator cycle
            churn_limit_quotient: nonzero!(32_u64),
            min_per_epoch_churn_limit: 2,

            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        if self.latest_block_roots_length.get() % self.slots_per_epoch != 0 {
            return Err(Error::BlockRootsLengthNotMultipleOfSlotsPerEpoch {
                latest_block_roots_length: self.latest_block_roots_length,
                slots_per_epoch: self.slots_per_epoch,
            });
        }

        if self.shard_count < self.slots_per_epoch {
            return Err(Error::TooFewShards {
                shard_count: self.shard_count,
                slots_per_epoch: self.slots_per_epoch,
            });
        }

        for (name, balance) in [
            ("MAX_EFFECTIVE_BALANCE", self.max_effective_balance),
            ("EJECTION_BALANCE", self.ejection_balance),
        ] {
            if balance % self.effective_balance_increment != 0 {
                return Err(Error::BalanceNotMultipleOfIncrement {
                    name,
                    balance,
                    increment: self.effective_balance_increment,
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn slots_per_eth1_voting_period(&self) -> u64 {
        self.epochs_per_eth1_voting_period.get() * self.slots_per_epoch.get()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error(
        "LATEST_BLOCK_ROOTS_LENGTH ({latest_block_roots_length}) \
         is not a multiple of SLOTS_PER_EPOCH ({slots_per_epoch})"
    )]
    BlockRootsLengthNotMultipleOfSlotsPerEpoch {
        latest_block_roots_length: NonZeroU64,
        slots_per_epoch: NonZeroU64,
    },
    #[error("SHARD_COUNT ({shard_count}) is less than SLOTS_PER_EPOCH ({slots_per_epoch})")]
    TooFewShards {
        shard_count: NonZeroU64,
        slots_per_epoch: NonZeroU64,
    },
    #[error("{name} ({balance}) is not a multiple of EFFECTIVE_BALANCE_INCREMENT ({increment})")]
    BalanceNotMultipleOfIncrement {
        name: &'static str,
        balance: Gwei,
        increment: NonZeroU64,
    },
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Refactoring worsens readability, which is more important in tests."
)]
