use anyhow::Result;
use arithmetic::U64Ext as _;
use helper_functions::{
    accessors::{
        active_validator_indices, compute_active_index_root, generate_seed, get_current_epoch,
        get_next_epoch, get_previous_epoch, get_randao_mix, get_validator_mut,
        get_validator_churn_limit, ring_entry, ring_entry_mut,
    },
    error::StateVector,
    invariants::{validate_epoch_fields_did_not_regress, validate_invariants},
    misc::{committee_count, compute_activation_exit_epoch, compute_epoch_at_slot},
    mutators::{decrease_balance, increase_balance, initiate_validator_exit},
    predicates::{is_active_validator, is_eligible_for_activation, is_eligible_for_activation_queue},
    verifier::{NullVerifier, Verifier},
};
use itertools::{izip, Itertools as _};
use log::debug;
use num_bigint::BigUint;
use num_traits::Zero as _;
use types::{
    config::Config,
    nonstandard::RelativeEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        containers::Crosslink,
        primitives::Epoch,
    },
};

use crate::epoch_intermediates::{self, Participation};

/// Runs epoch processing on `state` as of the last slot of an epoch.
///
/// `state` is left untouched if any phase fails.
pub fn transition_epoch(config: &Config, state: &mut BeaconState) -> Result<()> {
    transition_epoch_with_verifier(config, state, NullVerifier)
}

pub fn transition_epoch_with_verifier(
    config: &Config,
    state: &mut BeaconState,
    verifier: impl Verifier,
) -> Result<()> {
    validate_invariants(config, state)?;

    let mut post_state = state.clone();
    process_epoch(config, &mut post_state, verifier)?;
    *state = post_state;

    Ok(())
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub(crate) fn process_epoch(
    config: &Config,
    state: &mut BeaconState,
    verifier: impl Verifier,
) -> Result<()> {
    debug!("processing epoch {}", get_current_epoch(config, state));

    let participation = epoch_intermediates::participation(config, state, verifier)?;

    process_justification_and_finalization(config, state, &participation)?;
    process_crosslinks(config, state, &participation)?;
    process_rewards_and_penalties(config, state, &participation)?;
    process_registry_updates(config, state)?;
    process_final_updates(config, state)?;

    validate_invariants(config, state)
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn process_justification_and_finalization(
    config: &Config,
    state: &mut BeaconState,
    participation: &Participation,
) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);
    let previous_epoch = get_previous_epoch(config, state);

    // Epoch boundary roots are not available yet.
    if current_epoch <= GENESIS_EPOCH + 1 {
        return Ok(());
    }

    let (statistics, _) = epoch_intermediates::statistics(config, state, participation)?;

    let old_previous_justified_epoch = state.previous_justified_epoch;
    let old_justified_epoch = state.justified_epoch;
    let old_finalized_epoch = state.finalized_epoch;
    let mut new_justified_epoch = old_justified_epoch;

    // > Rotate the justification bitfield up one epoch to make room for the current epoch
    state.justification_bitfield <<= 1;

    // > If the previous epoch gets justified, fill the second last bit
    if is_supermajority(
        &statistics.previous_epoch_target_attesting_balance,
        &statistics.previous_epoch_active_balance,
    ) {
        new_justified_epoch = previous_epoch;
        state.justification_bitfield |= 0b10;
    }

    // > If the current epoch gets justified, fill the last bit
    if is_supermajority(
        &statistics.current_epoch_target_attesting_balance,
        &statistics.current_epoch_active_balance,
    ) {
        new_justified_epoch = current_epoch;
        state.justification_bitfield |= 0b01;
    }

    let bitfield = state.justification_bitfield;

    // > The 2nd/3rd/4th most recent epochs are all justified, the 2nd using the 4th as source
    if (bitfield >> 1) % 8 == 0b111 && old_previous_justified_epoch + 3 == current_epoch {
        state.finalized_epoch = old_previous_justified_epoch;
    }

    // > The 2nd/3rd most recent epochs are both justified, the 2nd using the 3rd as source
    if (bitfield >> 1) % 4 == 0b11 && old_previous_justified_epoch + 2 == current_epoch {
        state.finalized_epoch = old_previous_justified_epoch;
    }

    // > The 1st/2nd/3rd most recent epochs are all justified, the 1st using the 3rd as source
    if bitfield % 8 == 0b111 && old_justified_epoch + 2 == current_epoch {
        state.finalized_epoch = old_justified_epoch;
    }

    // > The 1st/2nd most recent epochs are both justified, the 1st using the 2nd as source
    if bitfield % 4 == 0b11 && old_justified_epoch + 1 == current_epoch {
        state.finalized_epoch = old_justified_epoch;
    }

    // > Rotate justified epochs
    state.previous_justified_epoch = old_justified_epoch;
    state.justified_epoch = new_justified_epoch;

    if state.finalized_epoch != old_finalized_epoch {
        debug!("finalized epoch {} at epoch {current_epoch}", state.finalized_epoch);
    }

    Ok(())
}

// A registry with no balance cannot justify anything.
fn is_supermajority(attesting_balance: &BigUint, total_balance: &BigUint) -> bool {
    !total_balance.is_zero() && attesting_balance * 3_u8 >= total_balance * 2_u8
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn process_crosslinks(
    config: &Config,
    state: &mut BeaconState,
    participation: &Participation,
) -> Result<()> {
    let at_genesis = get_previous_epoch(config, state) == get_current_epoch(config, state);

    for relative_epoch in [RelativeEpoch::Previous, RelativeEpoch::Current] {
        // Both relative epochs have the same committees.
        if at_genesis && relative_epoch == RelativeEpoch::Previous {
            continue;
        }

        let outcomes =
            epoch_intermediates::committee_outcomes(config, state, participation, relative_epoch)?;

        for outcome in outcomes {
            let Some(winner) = outcome.winning_root else {
                continue;
            };

            if winner.attesting_balance * 3_u8 >= outcome.committee_balance * 2_u8 {
                *ring_entry_mut(
                    &mut state.latest_crosslinks,
                    StateVector::Crosslinks,
                    config.shard_count,
                    outcome.shard,
                )? = Crosslink {
                    epoch: compute_epoch_at_slot(config, outcome.slot),
                    shard_block_root: winner.shard_block_root,
                };
            }
        }
    }

    Ok(())
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn process_rewards_and_penalties(
    config: &Config,
    state: &mut BeaconState,
    participation: &Participation,
) -> Result<()> {
    // > No rewards are applied at the end of `GENESIS_EPOCH`
    // > because rewards are for work done in the previous epoch
    if get_current_epoch(config, state) == GENESIS_EPOCH {
        return Ok(());
    }

    let (statistics, performance) = epoch_intermediates::statistics(config, state, participation)?;

    if statistics.current_epoch_active_balance.is_zero() {
        return Ok(());
    }

    let attestation_deltas =
        epoch_intermediates::attestation_deltas(config, state, &statistics, &performance)?;

    let outcomes = epoch_intermediates::committee_outcomes(
        config,
        state,
        participation,
        RelativeEpoch::Previous,
    )?;

    let crosslink_deltas =
        epoch_intermediates::crosslink_deltas(config, state, &statistics, &outcomes)?;

    for (balance, attestation, crosslink) in izip!(
        &mut state.validator_balances,
        attestation_deltas,
        crosslink_deltas,
    ) {
        increase_balance(balance, attestation.reward.saturating_add(crosslink.reward));
        decrease_balance(balance, attestation.penalty.saturating_add(crosslink.penalty));
    }

    Ok(())
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn process_registry_updates(config: &Config, state: &mut BeaconState) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);
    let registry_before = state.validator_registry.clone();

    // > Process activation eligibility and ejections
    for validator_index in 0..state.validator_registry.len() as u64 {
        let validator = get_validator_mut(state, validator_index)?;

        if is_eligible_for_activation_queue(config, validator) {
            validator.activation_eligibility_epoch = current_epoch;
            debug!("validator {validator_index} became eligible for activation");
        }

        let validator = *validator;

        if is_active_validator(&validator, current_epoch)
            && validator.effective_balance <= config.ejection_balance
        {
            debug!(
                "ejecting validator {validator_index} with effective balance {}",
                validator.effective_balance,
            );

            initiate_validator_exit(config, state, validator_index)?;
        }
    }

    // > Queue validators eligible for activation and not yet dequeued for activation
    let activation_queue = (0..)
        .zip(&state.validator_registry)
        .filter(|(_, validator)| {
            is_eligible_for_activation(config, validator, state.finalized_epoch)
        })
        // > Order by the sequence of activation_eligibility_epoch setting and then index
        .sorted_by_key(|(validator_index, validator)| {
            (validator.activation_eligibility_epoch, *validator_index)
        })
        .map(|(validator_index, _)| validator_index)
        .collect_vec();

    // > Dequeued validators for activation up to churn limit
    let churn_limit = usize::try_from(get_validator_churn_limit(config, state))?;
    let activation_epoch = compute_activation_exit_epoch(config, current_epoch);

    for validator_index in activation_queue.into_iter().take(churn_limit) {
        let validator = get_validator_mut(state, validator_index)?;

        // Validators dequeued in earlier epochs keep their activation epoch.
        if validator.activation_epoch == FAR_FUTURE_EPOCH {
            validator.activation_epoch = activation_epoch;
            debug!("validator {validator_index} will be activated at epoch {activation_epoch}");
        }
    }

    if state.validator_registry != registry_before {
        state.validator_registry_update_epoch = current_epoch;
    }

    validate_epoch_fields_did_not_regress(&registry_before, &state.validator_registry)
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn process_final_updates(config: &Config, state: &mut BeaconState) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);
    let next_epoch = get_next_epoch(config, state);

    process_eth1_data_votes(config, state);
    process_effective_balance_updates(config, state);

    // > Set active index root
    let index_root_epoch = next_epoch + config.activation_exit_delay;
    let index_root = compute_active_index_root(state, index_root_epoch);

    *ring_entry_mut(
        &mut state.latest_index_roots,
        StateVector::IndexRoots,
        config.latest_index_roots_length,
        index_root_epoch,
    )? = index_root;

    // > Set total penalized balances
    let penalized_balance = ring_entry(
        &state.latest_penalized_balances,
        StateVector::PenalizedBalances,
        config.latest_penalized_exit_length,
        current_epoch,
    )?;

    *ring_entry_mut(
        &mut state.latest_penalized_balances,
        StateVector::PenalizedBalances,
        config.latest_penalized_exit_length,
        next_epoch,
    )? = penalized_balance;

    // > Set randao mix
    let randao_mix = get_randao_mix(config, state, current_epoch)?;

    *ring_entry_mut(
        &mut state.latest_randao_mixes,
        StateVector::RandaoMixes,
        config.latest_randao_mixes_length,
        next_epoch,
    )? = randao_mix;

    // > Remove previous epoch attestations
    state.latest_attestations.retain(|attestation| {
        compute_epoch_at_slot(config, attestation.data.slot) >= current_epoch
    });

    update_shuffling_parameters(config, state, next_epoch)
}

fn process_eth1_data_votes(config: &Config, state: &mut BeaconState) {
    let next_epoch = get_next_epoch(config, state);

    if next_epoch % config.epochs_per_eth1_voting_period != 0 {
        return;
    }

    let slots_per_period = config.slots_per_eth1_voting_period();

    if let Some(vote) = state
        .eth1_data_votes
        .iter()
        .find(|vote| vote.vote_count.saturating_mul(2) > slots_per_period)
    {
        state.latest_eth1_data = vote.eth1_data;
    }

    state.eth1_data_votes.clear();
}

fn process_effective_balance_updates(config: &Config, state: &mut BeaconState) {
    let increment = config.effective_balance_increment;
    let hysteresis_increment = increment.get() / config.hysteresis_quotient;
    let downward_threshold = hysteresis_increment * config.hysteresis_downward_multiplier;
    let upward_threshold = hysteresis_increment * config.hysteresis_upward_multiplier;

    // > Update effective balances with hysteresis
    for (validator, balance) in state
        .validator_registry
        .iter_mut()
        .zip(state.validator_balances.iter().copied())
    {
        let below = balance.saturating_add(downward_threshold) < validator.effective_balance;
        let above = validator.effective_balance.saturating_add(upward_threshold) < balance;

        if below || above {
            validator.effective_balance = balance
                .prev_multiple_of(increment)
                .min(config.max_effective_balance);
        }
    }
}

fn update_shuffling_parameters(
    config: &Config,
    state: &mut BeaconState,
    next_epoch: Epoch,
) -> Result<()> {
    state.previous_epoch_start_shard = state.current_epoch_start_shard;
    state.previous_calculation_epoch = state.current_calculation_epoch;
    state.previous_epoch_seed = state.current_epoch_seed;

    let active_validator_count =
        active_validator_indices(state, state.current_calculation_epoch).count() as u64;

    state.current_epoch_start_shard = (state.current_epoch_start_shard
        + committee_count(config, active_validator_count))
        % config.shard_count;

    state.current_calculation_epoch = next_epoch;
    state.current_epoch_seed = generate_seed(config, state, next_epoch)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Error;
    use bitvec::{bitvec, order::Lsb0};
    use bls::{AggregatePublicKeyBytes, AggregateSignatureBytes, PublicKeyBytes, SignatureBytes};
    use helper_functions::{
        accessors::{get_epoch_committees, relative_epoch},
        error::InvalidState,
    };
    use log::Level;
    use types::phase0::{
        containers::{AttestationData, Eth1Data, Eth1DataVote, PendingAttestation, Validator},
        primitives::{Domain, Gwei, Slot, H256},
    };

    use super::*;

    struct RejectingVerifier;

    impl Verifier for RejectingVerifier {
        const IS_NULL: bool = false;

        fn aggregate_public_keys(
            &self,
            _public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        ) -> Result<AggregatePublicKeyBytes> {
            Ok(AggregatePublicKeyBytes::default())
        }

        fn aggregate_signatures(
            &self,
            _signatures: impl IntoIterator<Item = SignatureBytes>,
        ) -> Result<AggregateSignatureBytes> {
            Ok(AggregateSignatureBytes::empty())
        }

        fn verify(
            &self,
            _public_key: AggregatePublicKeyBytes,
            _message: H256,
            _signature: AggregateSignatureBytes,
            _domain: Domain,
        ) -> bool {
            false
        }
    }

    fn quick_start(config: &Config, validator_count: u64, slot: Slot) -> BeaconState {
        let mut state = interop::quick_start_beacon_state(config, 0, validator_count)
            .expect("quick start state can be built");

        state.slot = slot;
        state
    }

    fn empty_state(config: &Config, slot: Slot) -> BeaconState {
        let mut state =
            BeaconState::new(config, 0, Eth1Data::default()).expect("minimal config fits in usize");

        state.slot = slot;
        state
    }

    fn pending_validator(config: &Config, activation_eligibility_epoch: Epoch) -> Validator {
        Validator {
            effective_balance: config.max_effective_balance,
            activation_eligibility_epoch,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    fn push_validator(config: &Config, state: &mut BeaconState, validator: Validator) {
        state.validator_registry.push(validator);
        state.validator_balances.push(config.max_effective_balance);
    }

    // Every committee of `epoch` attests with all bits set and zero roots, which match the roots
    // recorded in a quick start state.
    fn full_participation(
        config: &Config,
        state: &BeaconState,
        epoch: Epoch,
    ) -> Vec<PendingAttestation> {
        let relative_epoch =
            relative_epoch(config, state, epoch).expect("epoch is previous or current");

        get_epoch_committees(config, state, relative_epoch)
            .iter(config)
            .map(|(slot, shard, committee)| PendingAttestation {
                aggregation_bitfield: bitvec![u8, Lsb0; 1; committee.len()],
                data: AttestationData {
                    slot,
                    shard,
                    ..AttestationData::default()
                },
                inclusion_slot: slot + 1,
                ..PendingAttestation::default()
            })
            .collect()
    }

    fn activation_epochs(state: &BeaconState) -> impl Iterator<Item = Epoch> + '_ {
        state
            .validator_registry
            .iter()
            .map(|validator| validator.activation_epoch)
    }

    fn invalid_state(error: &Error) -> Option<&InvalidState> {
        error.downcast_ref()
    }

    #[test]
    fn empty_registry_transitions_through_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = empty_state(&config, config.slots_per_epoch.get() - 1);
        let mix = H256::repeat_byte(7);

        state.latest_randao_mixes[0] = mix;

        let pre_state = state.clone();

        transition_epoch(&config, &mut state)?;

        assert!(state.validator_registry.is_empty());
        assert_eq!(state.finalized_epoch, pre_state.finalized_epoch);
        assert_eq!(state.justified_epoch, pre_state.justified_epoch);
        assert_eq!(state.latest_randao_mixes[0], mix);
        assert_eq!(state.latest_randao_mixes[1], mix);
        assert_eq!(state.latest_index_roots[5], compute_active_index_root(&state, 5));
        assert_eq!(state.current_calculation_epoch, 1);
        assert_eq!(state.previous_calculation_epoch, 0);
        assert_eq!(state.current_epoch_seed, generate_seed(&config, &state, 1)?);
        assert_eq!(state.latest_block_roots, pre_state.latest_block_roots);

        validate_invariants(&config, &state)
    }

    #[test]
    fn transition_is_deterministic() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 15);

        state.latest_attestations = full_participation(&config, &state, 0);
        state.validator_balances[3] -= 700_000_000;
        state.validator_registry[5].slashed = true;

        let mut first = state.clone();
        let mut second = state;

        transition_epoch(&config, &mut first)?;
        transition_epoch(&config, &mut second)?;

        assert_eq!(first, second);

        validate_invariants(&config, &first)
    }

    #[test]
    fn rewards_saturate_at_maximum_balance() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 15);

        state.latest_attestations = full_participation(&config, &state, 0);
        state.validator_balances[0] = Gwei::MAX;

        transition_epoch(&config, &mut state)?;

        assert_eq!(state.validator_balances[0], Gwei::MAX);
        assert_eq!(state.validator_registry[0].effective_balance, config.max_effective_balance);

        validate_invariants(&config, &state)
    }

    #[test]
    fn invalid_state_is_rejected_without_modification() {
        let config = Config::minimal();
        let mut state = quick_start(&config, 8, 7);

        state.validator_balances.pop();

        let pre_state = state.clone();
        let error = transition_epoch(&config, &mut state).expect_err("balances are missing");

        assert!(matches!(
            invalid_state(&error),
            Some(InvalidState::RegistryLengthMismatch {
                validators: 8,
                balances: 7,
            }),
        ));

        assert_eq!(state, pre_state);
    }

    #[test]
    fn inconsistent_config_is_rejected_without_modification() {
        let mut config = Config::minimal();
        let mut state = quick_start(&config, 8, 7);

        config.config_name = "Minimal".into();

        let pre_state = state.clone();

        assert!(transition_epoch(&config, &mut state).is_err());
        assert_eq!(state, pre_state);
    }

    #[test]
    fn previous_and_current_epochs_are_justified() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 23);
        let mut attestations = full_participation(&config, &state, 1);

        attestations.extend(full_participation(&config, &state, 2));
        state.latest_attestations = attestations;

        let participation = epoch_intermediates::participation(&config, &state, NullVerifier)?;

        process_justification_and_finalization(&config, &mut state, &participation)?;

        assert_eq!(state.justification_bitfield, 0b11);
        assert_eq!(state.previous_justified_epoch, 0);
        assert_eq!(state.justified_epoch, 2);
        assert_eq!(state.finalized_epoch, 0);

        Ok(())
    }

    #[test]
    fn consecutive_justified_epochs_are_finalized() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 23);

        state.latest_attestations = full_participation(&config, &state, 2);
        state.justification_bitfield = 0b1;
        state.justified_epoch = 1;

        let participation = epoch_intermediates::participation(&config, &state, NullVerifier)?;

        process_justification_and_finalization(&config, &mut state, &participation)?;

        assert_eq!(state.justification_bitfield, 0b11);
        assert_eq!(state.justified_epoch, 2);
        assert_eq!(state.previous_justified_epoch, 1);
        assert_eq!(state.finalized_epoch, 1);

        Ok(())
    }

    #[test]
    fn justification_waits_for_two_epochs() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 15);

        state.latest_attestations = full_participation(&config, &state, 1);

        let participation = epoch_intermediates::participation(&config, &state, NullVerifier)?;

        process_justification_and_finalization(&config, &mut state, &participation)?;

        assert_eq!(state.justification_bitfield, 0);
        assert_eq!(state.justified_epoch, 0);

        Ok(())
    }

    #[test]
    fn supermajority_updates_crosslink() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 64, 7);
        let shard_block_root = H256::repeat_byte(9);

        let mut attestations = full_participation(&config, &state, 0);

        for attestation in &mut attestations {
            attestation.data.shard_block_root = shard_block_root;

            // Only half of the committee at slot 3 attests.
            if attestation.data.slot == 3 {
                let half = attestation.aggregation_bitfield.len() / 2;
                attestation.aggregation_bitfield[half..].fill(false);
            }
        }

        let supermajority_shard = attestations[2].data.shard;
        let minority_shard = attestations[3].data.shard;

        state.latest_attestations = attestations;

        let participation = epoch_intermediates::participation(&config, &state, NullVerifier)?;

        process_crosslinks(&config, &mut state, &participation)?;

        assert_eq!(
            state.latest_crosslinks[usize::try_from(supermajority_shard)?],
            Crosslink {
                epoch: 0,
                shard_block_root,
            },
        );

        assert_eq!(
            state.latest_crosslinks[usize::try_from(minority_shard)?],
            Crosslink::default(),
        );

        Ok(())
    }

    #[test]
    fn rewards_are_skipped_at_genesis_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 7);
        let pre_state = state.clone();

        let participation = epoch_intermediates::participation(&config, &state, NullVerifier)?;

        process_rewards_and_penalties(&config, &mut state, &participation)?;

        assert_eq!(state.validator_balances, pre_state.validator_balances);

        Ok(())
    }

    #[test]
    fn rejected_signatures_are_logged_and_excluded() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 15);

        state.latest_attestations = full_participation(&config, &state, 0);

        let mut accepted = state.clone();
        let mut rejected = state;

        transition_epoch(&config, &mut accepted)?;

        testing_logger::setup();

        transition_epoch_with_verifier(&config, &mut rejected, RejectingVerifier)?;

        testing_logger::validate(|captured_logs| {
            let warnings = captured_logs
                .iter()
                .filter(|log| log.level == Level::Warn)
                .collect::<Vec<_>>();

            assert_eq!(warnings.len(), 8);
            assert!(warnings[0].body.ends_with("aggregate signature is invalid"));
        });

        assert!(izip!(&accepted.validator_balances, &rejected.validator_balances)
            .all(|(accepted, rejected)| accepted > rejected));

        Ok(())
    }

    #[test]
    fn activation_queue_is_ordered_by_eligibility_then_index() -> Result<()> {
        let config = Config::minimal();
        let mut state = empty_state(&config, 63);

        for eligibility_epoch in [5, 3, 3, 7] {
            push_validator(&config, &mut state, pending_validator(&config, eligibility_epoch));
        }

        assert_eq!(get_validator_churn_limit(&config, &state), 2);

        process_registry_updates(&config, &mut state)?;

        let activation_epoch = compute_activation_exit_epoch(&config, 7);

        itertools::assert_equal(
            activation_epochs(&state),
            [FAR_FUTURE_EPOCH, activation_epoch, activation_epoch, FAR_FUTURE_EPOCH],
        );

        assert_eq!(state.validator_registry_update_epoch, 7);

        Ok(())
    }

    #[test]
    fn activations_are_limited_by_churn() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 96, 15);

        for _ in 0..10 {
            push_validator(&config, &mut state, pending_validator(&config, 0));
        }

        assert_eq!(get_validator_churn_limit(&config, &state), 3);

        process_registry_updates(&config, &mut state)?;

        let activated = activation_epochs(&state)
            .filter(|epoch| *epoch == compute_activation_exit_epoch(&config, 1))
            .count();

        assert_eq!(activated, 3);

        Ok(())
    }

    #[test]
    fn validators_at_ejection_balance_are_ejected() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 4, 15);

        state.validator_registry[0].effective_balance = config.ejection_balance;
        state.validator_registry[1].effective_balance =
            config.ejection_balance + config.effective_balance_increment.get();

        process_registry_updates(&config, &mut state)?;

        itertools::assert_equal(
            state.validator_registry.iter().map(|validator| validator.exit_epoch),
            [
                compute_activation_exit_epoch(&config, 1),
                FAR_FUTURE_EPOCH,
                FAR_FUTURE_EPOCH,
                FAR_FUTURE_EPOCH,
            ],
        );

        assert_eq!(state.validator_registry_update_epoch, 1);

        Ok(())
    }

    #[test]
    fn eligibility_is_set_once() -> Result<()> {
        let config = Config::minimal();
        let mut state = empty_state(&config, 15);

        push_validator(&config, &mut state, pending_validator(&config, FAR_FUTURE_EPOCH));

        push_validator(
            &config,
            &mut state,
            Validator {
                effective_balance: config.ejection_balance,
                ..pending_validator(&config, FAR_FUTURE_EPOCH)
            },
        );

        process_registry_updates(&config, &mut state)?;

        let after_first_call = state.clone();

        process_registry_updates(&config, &mut state)?;

        assert_eq!(state.validator_registry, after_first_call.validator_registry);

        itertools::assert_equal(
            state
                .validator_registry
                .iter()
                .map(|validator| validator.activation_eligibility_epoch),
            [1, FAR_FUTURE_EPOCH],
        );

        // Not yet active, so the low balance does not eject it.
        assert_eq!(state.validator_registry[1].exit_epoch, FAR_FUTURE_EPOCH);

        Ok(())
    }

    #[test]
    fn dequeued_validators_keep_activation_epoch_and_use_churn() -> Result<()> {
        let config = Config::minimal();
        let mut state = empty_state(&config, 63);

        push_validator(
            &config,
            &mut state,
            Validator {
                activation_epoch: 20,
                ..pending_validator(&config, 3)
            },
        );

        push_validator(&config, &mut state, pending_validator(&config, 4));
        push_validator(&config, &mut state, pending_validator(&config, 5));

        assert!(20 >= compute_activation_exit_epoch(&config, state.finalized_epoch));
        assert_eq!(get_validator_churn_limit(&config, &state), 2);

        process_registry_updates(&config, &mut state)?;

        itertools::assert_equal(
            activation_epochs(&state),
            [20, compute_activation_exit_epoch(&config, 7), FAR_FUTURE_EPOCH],
        );

        Ok(())
    }

    #[test]
    fn unchanged_registry_keeps_update_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 15);

        process_registry_updates(&config, &mut state)?;

        assert_eq!(state.validator_registry_update_epoch, GENESIS_EPOCH);

        Ok(())
    }

    #[test]
    fn eth1_vote_with_majority_is_adopted() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 15);
        let slots_per_period = config.slots_per_eth1_voting_period();

        let winner = Eth1Data {
            block_hash: H256::repeat_byte(2),
            ..Eth1Data::default()
        };

        state.eth1_data_votes = vec![
            Eth1DataVote {
                eth1_data: Eth1Data {
                    block_hash: H256::repeat_byte(1),
                    ..Eth1Data::default()
                },
                vote_count: slots_per_period / 2,
            },
            Eth1DataVote {
                eth1_data: winner,
                vote_count: slots_per_period / 2 + 1,
            },
        ];

        process_final_updates(&config, &mut state)?;

        assert_eq!(state.latest_eth1_data, winner);
        assert!(state.eth1_data_votes.is_empty());

        Ok(())
    }

    #[test]
    fn eth1_votes_are_kept_within_period() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 7);

        state.eth1_data_votes = vec![Eth1DataVote {
            eth1_data: Eth1Data::default(),
            vote_count: 1,
        }];

        process_final_updates(&config, &mut state)?;

        assert_eq!(state.eth1_data_votes.len(), 1);

        Ok(())
    }

    #[test]
    fn effective_balance_follows_hysteresis() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 4, 7);
        let increment = config.effective_balance_increment.get();
        let downward_threshold =
            increment / config.hysteresis_quotient * config.hysteresis_downward_multiplier;

        state.validator_balances[0] = config.max_effective_balance - downward_threshold - 1;
        state.validator_balances[1] = config.max_effective_balance - downward_threshold;
        state.validator_balances[2] = config.max_effective_balance * 2;

        process_final_updates(&config, &mut state)?;

        itertools::assert_equal(
            state.validator_registry.iter().map(|validator| validator.effective_balance),
            [
                config.max_effective_balance - increment,
                config.max_effective_balance,
                config.max_effective_balance,
                config.max_effective_balance,
            ],
        );

        Ok(())
    }

    #[test]
    fn final_updates_rotate_epoch_bookkeeping() -> Result<()> {
        let config = Config::minimal();
        let mut state = quick_start(&config, 16, 15);

        state.latest_randao_mixes[1] = H256::repeat_byte(3);
        state.latest_penalized_balances[1] = 7;

        state.latest_attestations = [3, 9]
            .into_iter()
            .map(|slot| PendingAttestation {
                data: AttestationData {
                    slot,
                    ..AttestationData::default()
                },
                ..PendingAttestation::default()
            })
            .collect();

        let pre_state = state.clone();

        process_final_updates(&config, &mut state)?;

        let index_root_epoch = 2 + config.activation_exit_delay;
        let start_shard = committee_count(&config, 16) % config.shard_count;

        assert_eq!(state.latest_randao_mixes[2], H256::repeat_byte(3));
        assert_eq!(state.latest_penalized_balances[2], 7);

        assert_eq!(
            state.latest_index_roots[usize::try_from(index_root_epoch)?],
            compute_active_index_root(&state, index_root_epoch),
        );

        itertools::assert_equal(
            state.latest_attestations.iter().map(|attestation| attestation.data.slot),
            [9],
        );

        assert_eq!(state.previous_epoch_seed, pre_state.current_epoch_seed);
        assert_eq!(state.previous_calculation_epoch, pre_state.current_calculation_epoch);
        assert_eq!(state.previous_epoch_start_shard, pre_state.current_epoch_start_shard);
        assert_eq!(state.current_epoch_start_shard, start_shard);
        assert_eq!(state.current_calculation_epoch, 2);
        assert_eq!(state.current_epoch_seed, generate_seed(&config, &state, 2)?);

        Ok(())
    }
}
