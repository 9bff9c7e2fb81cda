//! Byte representations of BLS public keys and signatures.
//!
//! Points are never decompressed here. Aggregation and verification are done by whatever
//! implements `helper_functions::verifier::Verifier`, which receives and returns these types.

pub use public_key_bytes::PublicKeyBytes;
pub use signature_bytes::SignatureBytes;

pub type AggregatePublicKeyBytes = PublicKeyBytes;
pub type AggregateSignatureBytes = SignatureBytes;

pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 48;
pub const COMPRESSED_SIGNATURE_SIZE: usize = 96;

mod public_key_bytes;
mod signature_bytes;
