use hashing::{chunk_64, merkle_root};

use crate::phase0::{
    containers::{AttestationData, BeaconBlockHeader, Crosslink},
    primitives::H256,
};

impl AttestationData {
    /// The message signed by attesters.
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        merkle_root([
            chunk_64(self.slot),
            chunk_64(self.shard),
            self.beacon_block_root,
            self.target_root,
            self.shard_block_root,
            self.previous_crosslink.hash_tree_root(),
            chunk_64(self.source_epoch),
            self.source_root,
        ])
    }
}

impl BeaconBlockHeader {
    /// Root of the header without its signature.
    ///
    /// This is the root recorded in `BeaconState.latest_block_roots`.
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        merkle_root([
            chunk_64(self.slot),
            self.previous_block_root,
            self.state_root,
            self.block_body_root,
        ])
    }
}

impl Crosslink {
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        merkle_root([chunk_64(self.epoch), self.shard_block_root])
    }
}
