use ethereum_types::H256;
use sha2::{Digest as _, Sha256};

#[inline]
#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    H256(Sha256::digest(bytes).into())
}

#[inline]
#[must_use]
pub fn hash_256(bytes: H256) -> H256 {
    hash_bytes(bytes)
}

#[inline]
#[must_use]
pub fn hash_256_8(a: H256, b: u8) -> H256 {
    let digest = Sha256::new().chain_update(a).chain_update([b]).finalize();

    H256(digest.into())
}

#[inline]
#[must_use]
pub fn hash_256_8_32(a: H256, b: u8, c: u32) -> H256 {
    let digest = Sha256::new()
        .chain_update(a)
        .chain_update([b])
        .chain_update(c.to_le_bytes())
        .finalize();

    H256(digest.into())
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let digest = Sha256::new().chain_update(left).chain_update(right).finalize();

    H256(digest.into())
}

#[inline]
#[must_use]
pub fn hash_256_256_64(a: H256, b: H256, c: u64) -> H256 {
    let digest = Sha256::new()
        .chain_update(a)
        .chain_update(b)
        .chain_update(c.to_le_bytes())
        .finalize();

    H256(digest.into())
}

/// Packs a `u64` into a chunk the way basic values are packed before merkleization.
#[inline]
#[must_use]
pub fn chunk_64(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Root of a binary Merkle tree over `chunks`, padded with zero subtrees to a power of two.
///
/// The root of an empty sequence is the zero chunk.
#[must_use]
pub fn merkle_root(chunks: impl IntoIterator<Item = H256>) -> H256 {
    let mut layer = chunks.into_iter().collect::<Vec<_>>();
    let mut zero_subtree = H256::zero();

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(zero_subtree);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| match pair {
                [left, right] => hash_256_256(*left, *right),
                _ => unreachable!("chunks_exact(2) yields slices of length 2"),
            })
            .collect();

        zero_subtree = hash_256_256(zero_subtree, zero_subtree);
    }

    layer.pop().unwrap_or(zero_subtree)
}

#[inline]
#[must_use]
pub fn mix_in_length(root: H256, length: usize) -> H256 {
    let length = u64::try_from(length).unwrap_or(u64::MAX);
    hash_256_256(root, chunk_64(length))
}
