//! The issuance protocol: one blinded value in, one signed value out.
//!
//! Wire format of a request body (JSON):
//!
//! ```json
//! {"message": "<hex numeral>", "token_hash": "<opaque>", "scheme": "RSA"}
//! ```
//!
//! `message` is a bare hexadecimal numeral, `scheme` is `"RSA"` (default)
//! or `"ECDSA"`. Unknown fields, including the legacy `is_rsa` flag, are
//! rejected. The response is the signature as a bare lowercase hex numeral.

use crate::blind_sigs::{BlindSigner, Envelope};
use crate::error::{Error, Result};
use crate::keys::{self, KeyContainer, PassphraseProvider};
use crate::packet::PacketKind;
use crate::utils;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Signing scheme selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scheme {
    #[default]
    Rsa,
    Ecdsa,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
            Self::Ecdsa => f.write_str("ECDSA"),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireRequest {
    message: String,
    token_hash: String,
    #[serde(default)]
    scheme: Scheme,
}

/// A client's request to sign a blinded value.
#[derive(Clone, PartialEq, Eq)]
pub struct BlindedRequest {
    pub message: BigUint,
    /// Opaque to issuance; carried for external bookkeeping.
    pub token_hash: String,
    pub scheme: Scheme,
}

impl BlindedRequest {
    /// Parses a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let wire: WireRequest =
            serde_json::from_slice(body).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let message = utils::parse_hex_numeral(&wire.message).ok_or_else(|| {
            Error::InvalidInput("message is not a hexadecimal numeral".to_string())
        })?;
        Ok(Self {
            message,
            token_hash: wire.token_hash,
            scheme: wire.scheme,
        })
    }
}

impl fmt::Debug for BlindedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindedRequest")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// The signed blinded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedResponse(BigUint);

impl SignedResponse {
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Display for SignedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&utils::to_hex_numeral(&self.0))
    }
}

/// Immutable server key state shared by every request.
///
/// Built once before serving; request handling only reads it.
#[derive(Debug)]
pub struct IssuanceContext {
    signer: BlindSigner,
    public_key: String,
}

impl IssuanceContext {
    /// Extracts `(d, n)` from `secret` and the export string from `public`.
    ///
    /// The first public key must carry the same modulus as the secret key.
    pub fn new(secret: &KeyContainer, public: &KeyContainer) -> Result<Self> {
        let params = keys::find_secret_params(secret)?;
        let public_params = keys::find_public_params(public)?;
        if &public_params.n != params.n() {
            return Err(Error::InvalidKey(
                "public key modulus does not match the secret key".to_string(),
            ));
        }
        let public_key = keys::find_public_export_string(public)?;
        info!(
            modulus_bits = params.n().bits(),
            key_id = ?secret.first_key(PacketKind::SecretKey).and_then(|k| k.key_id()).map(|id| format!("{:016X}", id)),
            "loaded server key pair"
        );

        Ok(Self {
            signer: BlindSigner::from(params),
            public_key,
        })
    }

    /// Decodes both armored blocks and builds the context.
    pub fn from_armored(
        secret: &[u8],
        public: &[u8],
        passphrase: Option<&dyn PassphraseProvider>,
    ) -> Result<Self> {
        let secret = KeyContainer::decode(secret, passphrase)?;
        let public = KeyContainer::decode(public, None)?;
        Self::new(&secret, &public)
    }

    pub fn public_key_export_string(&self) -> &str {
        &self.public_key
    }

    pub fn modulus(&self) -> &BigUint {
        self.signer.modulus()
    }

    pub fn handle(&self, request: &BlindedRequest) -> Result<SignedResponse> {
        let result = match request.scheme {
            Scheme::Rsa => self.sign_rsa(&request.message),
            Scheme::Ecdsa => Err(Error::UnsupportedScheme(Scheme::Ecdsa)),
        };
        match &result {
            Ok(_) => debug!(scheme = %request.scheme, "signed blinded message"),
            Err(e) => debug!(scheme = %request.scheme, error = %e, "rejected issuance request"),
        }
        result
    }

    /// Parses a JSON body and handles it.
    pub fn handle_json(&self, body: &[u8]) -> Result<SignedResponse> {
        let request = BlindedRequest::from_json(body)?;
        self.handle(&request)
    }

    fn sign_rsa(&self, message: &BigUint) -> Result<SignedResponse> {
        if message.is_zero() {
            return Err(Error::InvalidInput("message must be non-zero".to_string()));
        }
        if message >= self.signer.modulus() {
            return Err(Error::InvalidInput(
                "message must be below the modulus".to_string(),
            ));
        }
        let signed = self.signer.sign_envelope(Envelope::from(message.clone()));
        Ok(SignedResponse(signed.into_signature()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blind_sigs::sign;
    use crate::testing;
    use std::sync::Arc;

    fn context_1024() -> IssuanceContext {
        IssuanceContext::new(testing::container_1024(), testing::public_1024()).unwrap()
    }

    fn body(message: &str) -> Vec<u8> {
        format!(r#"{{"message": "{}", "token_hash": "abc", "scheme": "RSA"}}"#, message).into_bytes()
    }

    #[test]
    fn signs_hex_message() -> Result<()> {
        let ctx = context_1024();
        let response = ctx.handle_json(&body("deadbeef"))?;
        let params = keys::find_secret_params(testing::container_1024())?;
        assert_eq!(
            response.value(),
            &sign(&BigUint::from(0xdead_beefu32), params.d(), params.n())
        );

        let text = response.to_string();
        assert!(text.starts_with("4fb9855b7e5170ec"));
        assert!(!text.starts_with("0x"));
        assert_eq!(text, text.trim());
        assert_eq!(text, text.to_lowercase());
        Ok(())
    }

    #[test]
    fn scheme_defaults_to_rsa() -> Result<()> {
        let request = BlindedRequest::from_json(br#"{"message": "ff", "token_hash": "t"}"#)?;
        assert_eq!(request.scheme, Scheme::Rsa);
        assert_eq!(request.message, BigUint::from(255u32));
        assert_eq!(request.token_hash, "t");
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_messages() {
        let ctx = context_1024();
        let n = ctx.modulus().clone();

        for message in [n.clone(), &n + 1u32, BigUint::zero()] {
            let hex = utils::to_hex_numeral(&message);
            let err = ctx.handle_json(&body(&hex)).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{}", hex);
        }

        let largest = &n - 1u32;
        assert!(ctx.handle_json(&body(&utils::to_hex_numeral(&largest))).is_ok());
    }

    #[test]
    fn rejects_malformed_bodies() {
        let ctx = context_1024();
        let bad: [&[u8]; 8] = [
            b"not json",
            br#"{"token_hash": "abc"}"#,
            br#"{"message": "ff"}"#,
            br#"{"message": "0xff", "token_hash": "abc"}"#,
            br#"{"message": "", "token_hash": "abc"}"#,
            br#"{"message": 255, "token_hash": "abc"}"#,
            br#"{"message": "ff", "token_hash": "abc", "scheme": "rsa"}"#,
            br#"{"message": "ff", "token_hash": "abc", "is_rsa": true}"#,
        ];
        for body in bad {
            let err = ctx.handle_json(body).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_)),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn ecdsa_is_unsupported() {
        let ctx = context_1024();
        let err = ctx
            .handle_json(br#"{"message": "ff", "token_hash": "abc", "scheme": "ECDSA"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(Scheme::Ecdsa)));
    }

    #[test]
    fn failed_requests_leave_context_usable() -> Result<()> {
        let ctx = context_1024();
        let first = ctx.handle_json(&body("1234"))?;
        assert!(ctx.handle_json(b"{}").is_err());
        assert!(ctx.handle_json(&body(&utils::to_hex_numeral(ctx.modulus()))).is_err());
        assert_eq!(ctx.handle_json(&body("1234"))?, first);
        Ok(())
    }

    #[test]
    fn concurrent_requests_share_the_context() {
        let ctx = Arc::new(context_1024());
        let expected = ctx.handle_json(&body("c0ffee")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || ctx.handle_json(&body("c0ffee")).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn mismatched_key_pair_is_rejected() {
        let err = IssuanceContext::new(testing::container_1024(), testing::public_2048()).unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn builds_from_armored_blocks() -> Result<()> {
        let ctx = IssuanceContext::from_armored(
            testing::PRIV_1024_AES256.as_bytes(),
            testing::PUB_1024.as_bytes(),
            Some(&testing::passphrase),
        )?;
        assert_eq!(ctx.modulus(), &testing::modulus_1024());
        assert!(ctx
            .public_key_export_string()
            .starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));
        Ok(())
    }

    #[test]
    fn debug_hides_message() -> Result<()> {
        let request = BlindedRequest::from_json(&body("deadbeef"))?;
        let debug = format!("{:?}", request);
        assert!(!debug.contains("deadbeef"));
        assert!(!debug.contains(&BigUint::from(0xdead_beefu32).to_string()));
        Ok(())
    }
}
