use crate::keys::SecretParams;
use num_bigint::BigUint;

/// Raw RSA signing of a blinded value: `blinded^d mod n`.
///
/// No hashing, padding or range check is applied; callers decide which
/// values are acceptable. Deterministic for identical inputs.
///
/// # Panics
///
/// Panics if `n` is zero.
pub fn sign(blinded: &BigUint, d: &BigUint, n: &BigUint) -> BigUint {
    blinded.modpow(d, n)
}

/// An Envelope holds a client's value without
/// revealing it: the client multiplied it by
/// `r^e` before handing it over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    blinded_msg: BigUint,
}

impl Envelope {
    pub fn blinded_msg(&self) -> &BigUint {
        &self.blinded_msg
    }
}

impl From<BigUint> for Envelope {
    fn from(blinded_msg: BigUint) -> Self {
        Self { blinded_msg }
    }
}

/// An Envelope which has a signature written
/// on it by the BlindSigner party.
///
/// Once the client divides out `r`, the signature
/// also signs the original value, even though the
/// BlindSigner has never seen it.
#[derive(Clone, Debug)]
pub struct SignedEnvelope {
    pub envelope: Envelope,
    signature: BigUint,
}

impl SignedEnvelope {
    pub fn signature_for_envelope(&self) -> &BigUint {
        &self.signature
    }

    pub fn into_signature(self) -> BigUint {
        self.signature
    }
}

/// Represents the party that signs the Envelope
/// without seeing the value inside.
#[derive(Clone, Debug)]
pub struct BlindSigner {
    params: SecretParams,
}

impl BlindSigner {
    pub fn new(params: SecretParams) -> Self {
        Self { params }
    }

    pub fn modulus(&self) -> &BigUint {
        self.params.n()
    }

    pub fn sign_envelope(&self, e: Envelope) -> SignedEnvelope {
        let signature = sign(e.blinded_msg(), self.params.d(), self.params.n());
        SignedEnvelope {
            envelope: e,
            signature,
        }
    }
}

impl From<SecretParams> for BlindSigner {
    fn from(params: SecretParams) -> Self {
        Self::new(params)
    }
}
