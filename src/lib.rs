pub mod armor;
mod blind_sigs;
pub mod config;
mod error;
mod issuance;
mod keys;
mod packet;
mod s2k;
pub mod server;
mod utils;

#[cfg(test)]
mod testing;

pub use crate::blind_sigs::{sign, BlindSigner, Envelope, SignedEnvelope};
pub use crate::error::{DecodeError, Error, NotFound, Result};
pub use crate::issuance::{BlindedRequest, IssuanceContext, Scheme, SignedResponse};
pub use crate::keys::{
    find_public_export_string, find_public_params, find_secret_params, KeyContainer,
    PassphraseProvider, PublicParams, SecretParams,
};
pub use crate::packet::{KeyPacket, Packet, PacketKind, PublicKeyAlgorithm};
pub use crate::utils::{parse_hex_numeral, to_hex_numeral};
