use core::num::NonZeroU64;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{ensure, Result};
use arithmetic::{integer_sqrt, BigUintExt as _};
use helper_functions::{
    accessors::{
        get_block_root, get_block_root_at_slot, get_current_epoch, get_epoch_committees,
        get_finality_delay, get_previous_epoch, get_total_active_balance, get_total_balance,
        get_validator, relative_epoch, EpochCommittees,
    },
    error::PreconditionViolation,
    misc::{compute_domain, compute_epoch_at_slot},
    predicates::{is_active_validator, is_eligible_for_penalties},
    verifier::Verifier,
};
use itertools::izip;
use log::warn;
use num_bigint::BigUint;
use num_traits::Zero as _;
use types::{
    config::Config,
    nonstandard::RelativeEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::DOMAIN_ATTESTATION,
        containers::{AttestationData, PendingAttestation},
        primitives::{Epoch, Gwei, Shard, Slot, ValidatorIndex, H256},
    },
};

/// Committees of the two epochs covered by pending attestations, together with the attestations
/// that survived signature verification.
pub struct Participation {
    pub previous_committees: EpochCommittees,
    pub current_committees: EpochCommittees,
    pub attestations: Vec<FoldedAttestation>,
}

impl Participation {
    #[must_use]
    pub const fn committees(&self, relative_epoch: RelativeEpoch) -> &EpochCommittees {
        match relative_epoch {
            RelativeEpoch::Previous => &self.previous_committees,
            RelativeEpoch::Current => &self.current_committees,
        }
    }

    pub fn in_epoch(
        &self,
        config: &Config,
        epoch: Epoch,
    ) -> impl Iterator<Item = &FoldedAttestation> {
        let slots_per_epoch = config.slots_per_epoch;

        self.attestations
            .iter()
            .filter(move |attestation| attestation.data.slot / slots_per_epoch == epoch)
    }
}

#[derive(Clone, Debug)]
pub struct FoldedAttestation {
    pub data: AttestationData,
    pub participants: Vec<ValidatorIndex>,
    pub inclusion_delay: NonZeroU64,
    pub proposer_index: ValidatorIndex,
}

/// Resolves the participants of every pending attestation and checks its aggregate signature.
///
/// Attestations that cannot be resolved or fail verification are left out with a warning.
pub fn participation(
    config: &Config,
    state: &BeaconState,
    verifier: impl Verifier,
) -> Result<Participation> {
    let previous_committees = get_epoch_committees(config, state, RelativeEpoch::Previous);
    let current_committees = get_epoch_committees(config, state, RelativeEpoch::Current);

    let mut participation = Participation {
        previous_committees,
        current_committees,
        attestations: vec![],
    };

    for (position, attestation) in state.latest_attestations.iter().enumerate() {
        match fold_attestation(config, state, &verifier, &participation, attestation) {
            Ok(folded) => participation.attestations.push(folded),
            Err(error) => warn!(
                "excluding pending attestation {position} for slot {} and shard {}: {error}",
                attestation.data.slot, attestation.data.shard,
            ),
        }
    }

    Ok(participation)
}

fn fold_attestation<V: Verifier>(
    config: &Config,
    state: &BeaconState,
    verifier: &V,
    participation: &Participation,
    attestation: &PendingAttestation,
) -> Result<FoldedAttestation> {
    let PendingAttestation {
        aggregation_bitfield,
        data,
        inclusion_slot,
        proposer_index,
        signature,
        ..
    } = attestation;

    let epoch = compute_epoch_at_slot(config, data.slot);
    let committees = participation.committees(relative_epoch(config, state, epoch)?);
    let participants = committees.attestation_participants(config, data, aggregation_bitfield)?;

    let inclusion_delay = NonZeroU64::new(inclusion_slot.saturating_sub(data.slot))
        .ok_or(PreconditionViolation::SlotOutOfRange {
            slot: data.slot,
            state_slot: *inclusion_slot,
        })?;

    get_validator(state, *proposer_index)?;

    if !V::IS_NULL {
        let public_keys = participants
            .iter()
            .map(|validator_index| Ok(get_validator(state, *validator_index)?.pubkey))
            .collect::<Result<Vec<_>>>()?;

        let aggregate_public_key = verifier.aggregate_public_keys(public_keys)?;
        let domain = compute_domain(state.fork, epoch, DOMAIN_ATTESTATION);

        ensure!(
            verifier.verify(aggregate_public_key, data.hash_tree_root(), *signature, domain),
            "aggregate signature is invalid",
        );
    }

    Ok(FoldedAttestation {
        data: data.clone(),
        participants,
        inclusion_delay,
        proposer_index: *proposer_index,
    })
}

/// Attesting balances accumulated over unslashed participants.
#[expect(clippy::struct_field_names)]
#[derive(Clone, Default, Debug)]
pub struct Statistics {
    pub previous_epoch_active_balance: BigUint,
    pub current_epoch_active_balance: BigUint,
    pub previous_epoch_source_attesting_balance: BigUint,
    pub previous_epoch_target_attesting_balance: BigUint,
    pub previous_epoch_head_attesting_balance: BigUint,
    pub current_epoch_target_attesting_balance: BigUint,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct Performance {
    previous_epoch_match: Match,
    previous_epoch_fastest_inclusion: Option<Inclusion>,
    current_epoch_matching_target: bool,
}

impl Performance {
    #[must_use]
    pub fn previous_epoch_matching_source(self) -> bool {
        Match::Source <= self.previous_epoch_match
    }

    #[must_use]
    pub fn previous_epoch_matching_target(self) -> bool {
        Match::Target <= self.previous_epoch_match
    }

    #[must_use]
    pub fn previous_epoch_matching_head(self) -> bool {
        Match::Head <= self.previous_epoch_match
    }

    #[must_use]
    pub const fn previous_epoch_fastest_inclusion(self) -> Option<Inclusion> {
        self.previous_epoch_fastest_inclusion
    }

    #[must_use]
    pub const fn current_epoch_matching_target(self) -> bool {
        self.current_epoch_matching_target
    }
}

// As suggested by `clippy::struct_excessive_bools`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug)]
enum Match {
    #[default]
    None,
    Source,
    Target,
    Head,
}

#[derive(Clone, Copy, Debug)]
pub struct Inclusion {
    pub delay: NonZeroU64,
    pub proposer_index: ValidatorIndex,
}

pub fn statistics(
    config: &Config,
    state: &BeaconState,
    participation: &Participation,
) -> Result<(Statistics, Vec<Performance>)> {
    let current_epoch = get_current_epoch(config, state);
    let previous_epoch = get_previous_epoch(config, state);

    let mut statistics = Statistics::default();
    let mut performance = vec![Performance::default(); state.validator_registry.len()];

    for validator in &state.validator_registry {
        if is_active_validator(validator, previous_epoch) {
            statistics.previous_epoch_active_balance += validator.effective_balance;
        }

        if is_active_validator(validator, current_epoch) {
            statistics.current_epoch_active_balance += validator.effective_balance;
        }
    }

    // `get_block_root` fails when an epoch has a single slot and its root is not recorded yet.
    let previous_epoch_target_root = get_block_root(config, state, previous_epoch).ok();
    let current_epoch_target_root = get_block_root(config, state, current_epoch).ok();

    for attestation in participation.in_epoch(config, previous_epoch) {
        let data = &attestation.data;
        let matching_target = Some(data.target_root) == previous_epoch_target_root;

        let matching_head = get_block_root_at_slot(config, state, data.slot)
            .is_ok_and(|root| root == data.beacon_block_root);

        let inclusion = Inclusion {
            delay: attestation.inclusion_delay,
            proposer_index: attestation.proposer_index,
        };

        for validator_index in attestation.participants.iter().copied() {
            let validator = get_validator(state, validator_index)?;

            if validator.slashed {
                continue;
            }

            let performance = &mut performance[usize::try_from(validator_index)?];
            let effective_balance = validator.effective_balance;

            if !performance.previous_epoch_matching_source() {
                statistics.previous_epoch_source_attesting_balance += effective_balance;
                performance.previous_epoch_match = Match::Source;
            }

            if !performance.previous_epoch_matching_target() && matching_target {
                statistics.previous_epoch_target_attesting_balance += effective_balance;
                performance.previous_epoch_match = Match::Target;
            }

            if !performance.previous_epoch_matching_head() && matching_target && matching_head {
                statistics.previous_epoch_head_attesting_balance += effective_balance;
                performance.previous_epoch_match = Match::Head;
            }

            let fastest = performance
                .previous_epoch_fastest_inclusion
                .get_or_insert(inclusion);

            if inclusion.delay < fastest.delay {
                *fastest = inclusion;
            }
        }
    }

    // At the genesis epoch the previous and current epochs coincide.
    if current_epoch != previous_epoch {
        for attestation in participation.in_epoch(config, current_epoch) {
            if Some(attestation.data.target_root) != current_epoch_target_root {
                continue;
            }

            for validator_index in attestation.participants.iter().copied() {
                let validator = get_validator(state, validator_index)?;
                let performance = &mut performance[usize::try_from(validator_index)?];

                if !validator.slashed && !performance.current_epoch_matching_target {
                    statistics.current_epoch_target_attesting_balance +=
                        validator.effective_balance;

                    performance.current_epoch_matching_target = true;
                }
            }
        }
    } else {
        statistics.current_epoch_target_attesting_balance =
            statistics.previous_epoch_target_attesting_balance.clone();
    }

    Ok((statistics, performance))
}

/// The crosslink root with the most attesting balance behind it in one committee.
#[derive(Clone, Debug)]
pub struct WinningRoot {
    pub shard_block_root: H256,
    pub attesting_balance: BigUint,
    pub participants: BTreeSet<ValidatorIndex>,
}

#[derive(Clone, Debug)]
pub struct CommitteeOutcome {
    pub slot: Slot,
    pub shard: Shard,
    pub committee: Vec<ValidatorIndex>,
    pub committee_balance: BigUint,
    pub winning_root: Option<WinningRoot>,
}

/// Tallies crosslink votes for every committee of `relative_epoch`.
///
/// Ties between roots are broken in favor of the numerically greater root.
pub fn committee_outcomes(
    config: &Config,
    state: &BeaconState,
    participation: &Participation,
    relative_epoch: RelativeEpoch,
) -> Result<Vec<CommitteeOutcome>> {
    participation
        .committees(relative_epoch)
        .iter(config)
        .map(|(slot, shard, committee)| -> Result<CommitteeOutcome> {
            let mut votes = BTreeMap::<_, BTreeSet<_>>::new();

            for attestation in &participation.attestations {
                if attestation.data.slot != slot || attestation.data.shard != shard {
                    continue;
                }

                for validator_index in attestation.participants.iter().copied() {
                    if !get_validator(state, validator_index)?.slashed {
                        votes
                            .entry(attestation.data.shard_block_root)
                            .or_default()
                            .insert(validator_index);
                    }
                }
            }

            let mut winning_root = None::<WinningRoot>;

            for (shard_block_root, participants) in votes {
                let attesting_balance = get_total_balance(state, participants.iter().copied())?;

                if winning_root
                    .as_ref()
                    .is_none_or(|winner| winner.attesting_balance <= attesting_balance)
                {
                    winning_root = Some(WinningRoot {
                        shard_block_root,
                        attesting_balance,
                        participants,
                    });
                }
            }

            Ok(CommitteeOutcome {
                slot,
                shard,
                committee: committee.to_vec(),
                committee_balance: get_total_balance(state, committee.iter().copied())?,
                winning_root,
            })
        })
        .collect()
}

/// The reward unit every reward and penalty of an epoch is a multiple of.
///
/// Fails if no validator is active in the current epoch.
pub fn base_reward(
    config: &Config,
    state: &BeaconState,
    validator_index: ValidatorIndex,
) -> Result<Gwei> {
    let total_active_balance = get_total_active_balance(config, state);

    ensure!(
        !total_active_balance.is_zero(),
        PreconditionViolation::NoActiveBalance,
    );

    let effective_balance = get_validator(state, validator_index)?.effective_balance;

    Ok(compute_base_reward(
        config,
        effective_balance,
        &integer_sqrt(&total_active_balance),
    ))
}

// The multiplication has to come first and the division by `BASE_REWARDS_PER_EPOCH` last.
fn compute_base_reward(
    config: &Config,
    effective_balance: Gwei,
    total_active_balance_sqrt: &BigUint,
) -> Gwei {
    (BigUint::from(effective_balance) * config.base_reward_factor
        / total_active_balance_sqrt
        / config.base_rewards_per_epoch.get())
    .saturating_to_u64()
}

#[derive(Clone, Copy, Default, Debug)]
pub struct EpochDeltas {
    pub reward: Gwei,
    pub penalty: Gwei,
}

impl EpochDeltas {
    fn add_reward(&mut self, value: Gwei) {
        self.reward = self.reward.saturating_add(value);
    }

    fn add_penalty(&mut self, value: Gwei) {
        self.penalty = self.penalty.saturating_add(value);
    }
}

/// Rewards and penalties for attestation participation, inclusion and inactivity.
pub fn attestation_deltas(
    config: &Config,
    state: &BeaconState,
    statistics: &Statistics,
    performance: &[Performance],
) -> Result<Vec<EpochDeltas>> {
    let total_active_balance = &statistics.current_epoch_active_balance;

    ensure!(
        !total_active_balance.is_zero(),
        PreconditionViolation::NoActiveBalance,
    );

    let total_active_balance_sqrt = integer_sqrt(total_active_balance);
    let previous_epoch = get_previous_epoch(config, state);
    let finality_delay = get_finality_delay(config, state);
    let in_inactivity_leak = finality_delay > config.min_epochs_to_inactivity_penalty;

    let mut deltas = vec![EpochDeltas::default(); state.validator_registry.len()];

    let attestation_component_reward = |base_reward: Gwei, attesting_balance: &BigUint| {
        (BigUint::from(base_reward) * attesting_balance / total_active_balance).saturating_to_u64()
    };

    for (index, validator, performance) in izip!(0.., &state.validator_registry, performance) {
        let base_reward =
            compute_base_reward(config, validator.effective_balance, &total_active_balance_sqrt);

        let proposer_reward = base_reward / config.proposer_reward_quotient;

        if is_eligible_for_penalties(validator, previous_epoch) {
            let deltas = &mut deltas[index];

            let components = [
                (
                    performance.previous_epoch_matching_source(),
                    &statistics.previous_epoch_source_attesting_balance,
                ),
                (
                    performance.previous_epoch_matching_target(),
                    &statistics.previous_epoch_target_attesting_balance,
                ),
                (
                    performance.previous_epoch_matching_head(),
                    &statistics.previous_epoch_head_attesting_balance,
                ),
            ];

            for (matching, attesting_balance) in components {
                if matching {
                    deltas.add_reward(attestation_component_reward(base_reward, attesting_balance));
                } else {
                    deltas.add_penalty(base_reward);
                }
            }

            if in_inactivity_leak {
                deltas.add_penalty(config.base_rewards_per_epoch.get() * base_reward);

                if !performance.previous_epoch_matching_target() {
                    let inactivity_penalty = BigUint::from(validator.effective_balance)
                        * finality_delay
                        / config.inactivity_penalty_quotient.get();

                    deltas.add_penalty(inactivity_penalty.saturating_to_u64());
                }
            }
        }

        if let Some(inclusion) = performance.previous_epoch_fastest_inclusion() {
            let Inclusion {
                delay,
                proposer_index,
            } = inclusion;

            let max_attester_reward = base_reward - proposer_reward;
            let inclusion_reward =
                max_attester_reward * config.min_attestation_inclusion_delay.get() / delay;

            deltas[usize::try_from(proposer_index)?].add_reward(proposer_reward);
            deltas[index].add_reward(inclusion_reward);
        }
    }

    Ok(deltas)
}

/// Rewards committee members that voted for the winning crosslink and penalizes the rest.
pub fn crosslink_deltas(
    config: &Config,
    state: &BeaconState,
    statistics: &Statistics,
    outcomes: &[CommitteeOutcome],
) -> Result<Vec<EpochDeltas>> {
    let total_active_balance = &statistics.current_epoch_active_balance;

    ensure!(
        !total_active_balance.is_zero(),
        PreconditionViolation::NoActiveBalance,
    );

    let total_active_balance_sqrt = integer_sqrt(total_active_balance);
    let mut deltas = vec![EpochDeltas::default(); state.validator_registry.len()];

    for outcome in outcomes {
        for validator_index in outcome.committee.iter().copied() {
            let effective_balance = get_validator(state, validator_index)?.effective_balance;
            let base_reward =
                compute_base_reward(config, effective_balance, &total_active_balance_sqrt);
            let deltas = &mut deltas[usize::try_from(validator_index)?];

            match &outcome.winning_root {
                Some(winner) if winner.participants.contains(&validator_index) => {
                    let reward = BigUint::from(base_reward) * &winner.attesting_balance
                        / &outcome.committee_balance;

                    deltas.add_reward(reward.saturating_to_u64());
                }
                _ => deltas.add_penalty(base_reward),
            }
        }
    }

    Ok(deltas)
}
