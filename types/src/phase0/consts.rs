use crate::phase0::primitives::{DomainType, Epoch, Shard, Slot};

pub const DOMAIN_ATTESTATION: DomainType = 1;
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;
pub const GENESIS_START_SHARD: Shard = 0;

