//! Shared fixtures for unit tests. The 2048-bit key is iterated-S2K
//! protected, so decoded containers are cached per test binary.

use crate::keys::KeyContainer;
use num_bigint::BigUint;
use std::sync::OnceLock;

pub(crate) const PRIV_1024: &str = include_str!("../testdata/rsa_1024_priv.asc");
pub(crate) const PUB_1024: &str = include_str!("../testdata/rsa_1024_pub.asc");
pub(crate) const PRIV_1024_AES256: &str = include_str!("../testdata/rsa_1024_aes256_priv.asc");
pub(crate) const PRIV_2048: &str = include_str!("../testdata/rsa_2048_priv.asc");
pub(crate) const PUB_2048: &str = include_str!("../testdata/rsa_2048_pub.asc");
pub(crate) const PASSPHRASE: &str = "verifyme";

const MODULUS_1024: &str = "9692121558ccb572588dcb5bc4aa6ef8d3fb2993ac6a08ced1c1ff79b63c1d77\
d781af13ab9937aab9671a979457d4c679cfe390cb6e70efbe5296a47ad09efa\
828bb4cadaca69d5a5d31e7a226856ff5b7a2028e957c3d7c6a16e424715625e\
c7fc462eadb0e7fd0a8a8afecc0b02589f084bc5d2d5885864b0e354408f5d17";

const MODULUS_2048: &str = "a416bfcf7f41f98fd38d85dd45722d075a3a69a0dda38594aaf14470934b2566\
63eec7fdd6e57632c2f2e2d800943030898fddf406a31a972c9156c0f3ff4746\
6b18d47fe74b43ee8aded904efe1e3389f3da89c1acf84b0482767aceac63555\
ee1847c06993bcb8755be4d722c12a9b41deb3c360955c934da77ffa9dd95559\
f156dbd5b2a57551deb32ed5fe755897fc22dfaeea0c606059c6ae1072dc11fa\
c58f5d98e659965dac613b5bec3dc1b2e53b28f1903d0c12aa43661b66982b05\
c0be2fd8b6897e758c79a0449cc61592578d7994b8e560c063cfe24a56df16c9\
a47c944146000d7493ac43e4c82bd5776c9a721d3e40a84674707aff16abb9b5";

pub(crate) fn passphrase(_prompt: &str) -> Option<String> {
    Some(PASSPHRASE.to_string())
}

fn decode(armored: &str) -> KeyContainer {
    KeyContainer::decode(armored.as_bytes(), Some(&passphrase)).expect("fixture decodes")
}

pub(crate) fn container_1024() -> &'static KeyContainer {
    static CONTAINER: OnceLock<KeyContainer> = OnceLock::new();
    CONTAINER.get_or_init(|| decode(PRIV_1024))
}

pub(crate) fn public_1024() -> &'static KeyContainer {
    static CONTAINER: OnceLock<KeyContainer> = OnceLock::new();
    CONTAINER.get_or_init(|| decode(PUB_1024))
}

pub(crate) fn container_2048() -> &'static KeyContainer {
    static CONTAINER: OnceLock<KeyContainer> = OnceLock::new();
    CONTAINER.get_or_init(|| decode(PRIV_2048))
}

pub(crate) fn public_2048() -> &'static KeyContainer {
    static CONTAINER: OnceLock<KeyContainer> = OnceLock::new();
    CONTAINER.get_or_init(|| decode(PUB_2048))
}

pub(crate) fn modulus_1024() -> BigUint {
    BigUint::parse_bytes(MODULUS_1024.as_bytes(), 16).expect("hex modulus")
}

pub(crate) fn modulus_2048() -> BigUint {
    BigUint::parse_bytes(MODULUS_2048.as_bytes(), 16).expect("hex modulus")
}

/// `a^-1 mod n`, if it exists.
pub(crate) fn mod_inverse(a: &BigUint, n: &BigUint) -> Option<BigUint> {
    use num_bigint::{ModInverse, ToBigUint};

    let inverse = a.clone().mod_inverse(n)?;
    ToBigUint::to_biguint(&inverse)
}

/// Uniform-enough random value in `[0, n)`.
pub(crate) fn random_below(n: &BigUint) -> BigUint {
    use rand::Rng;

    let mut bytes = vec![0u8; (n.bits() as usize + 7) / 8 + 8];
    rand::thread_rng().fill(&mut bytes[..]);
    BigUint::from_bytes_be(&bytes) % n
}

/// Client-side blinding: returns `m * r^e mod n` and `r^-1 mod n`.
pub(crate) fn blind(m: &BigUint, e: &BigUint, n: &BigUint) -> (BigUint, BigUint) {
    loop {
        let r = random_below(n);
        if let Some(r_inv) = mod_inverse(&r, n) {
            return ((m * r.modpow(e, n)) % n, r_inv);
        }
    }
}
