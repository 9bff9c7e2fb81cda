use anyhow::Result;
use bls::{AggregatePublicKeyBytes, AggregateSignatureBytes, PublicKeyBytes, SignatureBytes};
use types::phase0::primitives::{Domain, H256};

/// Signature operations used by epoch processing.
///
/// Aggregation may fail on malformed input. Verification only reports whether the signature
/// matches, so a bad attestation never aborts a transition.
pub trait Verifier {
    /// Whether this verifier accepts every signature without looking at it.
    ///
    /// Callers may skip aggregation entirely when this is `true`.
    const IS_NULL: bool;

    fn aggregate_public_keys(
        &self,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
    ) -> Result<AggregatePublicKeyBytes>;

    fn aggregate_signatures(
        &self,
        signatures: impl IntoIterator<Item = SignatureBytes>,
    ) -> Result<AggregateSignatureBytes>;

    fn verify(
        &self,
        public_key: AggregatePublicKeyBytes,
        message: H256,
        signature: AggregateSignatureBytes,
        domain: Domain,
    ) -> bool;
}

impl<V: Verifier> Verifier for &V {
    const IS_NULL: bool = V::IS_NULL;

    #[inline]
    fn aggregate_public_keys(
        &self,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
    ) -> Result<AggregatePublicKeyBytes> {
        (*self).aggregate_public_keys(public_keys)
    }

    #[inline]
    fn aggregate_signatures(
        &self,
        signatures: impl IntoIterator<Item = SignatureBytes>,
    ) -> Result<AggregateSignatureBytes> {
        (*self).aggregate_signatures(signatures)
    }

    #[inline]
    fn verify(
        &self,
        public_key: AggregatePublicKeyBytes,
        message: H256,
        signature: AggregateSignatureBytes,
        domain: Domain,
    ) -> bool {
        (*self).verify(public_key, message, signature, domain)
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct NullVerifier;

impl Verifier for NullVerifier {
    const IS_NULL: bool = true;

    #[inline]
    fn aggregate_public_keys(
        &self,
        _public_keys: impl IntoIterator<Item = PublicKeyBytes>,
    ) -> Result<AggregatePublicKeyBytes> {
        Ok(AggregatePublicKeyBytes::default())
    }

    #[inline]
    fn aggregate_signatures(
        &self,
        _signatures: impl IntoIterator<Item = SignatureBytes>,
    ) -> Result<AggregateSignatureBytes> {
        Ok(AggregateSignatureBytes::empty())
    }

    #[inline]
    fn verify(
        &self,
        _public_key: AggregatePublicKeyBytes,
        _message: H256,
        _signature: AggregateSignatureBytes,
        _domain: Domain,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_through_reference(verifier: impl Verifier) -> bool {
        verifier.verify(
            PublicKeyBytes::zero(),
            H256::zero(),
            SignatureBytes::zero(),
            0,
        )
    }

    #[test]
    fn null_verifier_accepts_everything() -> Result<()> {
        assert!(NullVerifier::IS_NULL);
        assert!(<&NullVerifier>::IS_NULL);
        assert!(verify_through_reference(&NullVerifier));

        assert_eq!(
            NullVerifier.aggregate_signatures([SignatureBytes::repeat_byte(1)])?,
            SignatureBytes::empty(),
        );

        Ok(())
    }
}
