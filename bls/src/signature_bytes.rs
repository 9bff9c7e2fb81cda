use derive_more::derive::AsRef;
use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

use crate::COMPRESSED_SIGNATURE_SIZE;

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct SignatureBytes(COMPRESSED_SIGNATURE_SIZE);
}

impl_fixed_hash_serde!(SignatureBytes, COMPRESSED_SIGNATURE_SIZE);

impl hex::FromHex for SignatureBytes {
    type Error = <[u8; COMPRESSED_SIGNATURE_SIZE] as hex::FromHex>::Error;

    fn from_hex<T: AsRef<[u8]>>(digits: T) -> Result<Self, Self::Error> {
        hex::FromHex::from_hex(digits).map(Self)
    }
}

impl SignatureBytes {
    /// The compressed point at infinity.
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.as_mut()[0] = 0xc0;
        bytes
    }
}
