use core::num::NonZeroU64;

use types::{config::Config, phase0::primitives::H256};

const BITS_PER_HASH: u64 = 256;

/// Position of `index` after a swap-or-not shuffle of `0..index_count` seeded with `seed`.
///
/// See the following for an explanation of the algorithm:
/// - <https://github.com/protolambda/eth2-docs/tree/de65f38857f1e27ffb6f25107d61e795cf1a5ad7#shuffling>
/// - <https://link.springer.com/content/pdf/10.1007%2F978-3-642-32009-5_1.pdf>
#[must_use]
pub fn shuffle_single(config: &Config, mut index: u64, index_count: NonZeroU64, seed: H256) -> u64 {
    assert!(index < index_count.get());

    for round in 0..config.shuffle_round_count {
        let pivot = compute_pivot(seed, round, index_count);
        let flip = (pivot + index_count.get() - index) % index_count;
        let position = index.max(flip);
        let source = compute_source(seed, round, position / BITS_PER_HASH);
        let byte = source[usize::from(position.to_le_bytes()[0] / 8)];
        let bit = (byte >> (position % 8)) & 1 == 1;

        if bit {
            index = flip;
        }
    }

    index
}

fn compute_pivot(seed: H256, round: u8, index_count: NonZeroU64) -> u64 {
    let hash = hashing::hash_256_8(seed, round);
    let mut bytes = [0; size_of::<u64>()];
    bytes.copy_from_slice(&hash[..size_of::<u64>()]);
    u64::from_le_bytes(bytes) % index_count
}

fn compute_source(seed: H256, round: u8, position_window: u64) -> H256 {
    // Truncate to match the behavior of `compute_shuffled_index` in `consensus-specs`.
    #[expect(clippy::cast_possible_truncation)]
    let position_window = position_window as u32;

    hashing::hash_256_8_32(seed, round, position_window)
}
