use crate::issuance::Scheme;
use crate::packet::PacketKind;
use thiserror::Error;

/// Specialisation of `std::Result`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
/// error variants.
pub enum Error {
    #[error("key container could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    #[error("no {0} found in key container")]
    NotFound(NotFound),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("signing scheme {0} is not supported")]
    UnsupportedScheme(Scheme),
}

/// What a lookup in a key container failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    Packet(PacketKind),
    Field(PacketKind, &'static str),
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Packet(kind) => write!(f, "{} packet", kind),
            Self::Field(kind, name) => write!(f, "field `{}` in {} packet", name, kind),
        }
    }
}

/// Failures while turning an armored blob into key packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("armor header line not found")]
    MissingArmorHeader,

    #[error("armor footer line not found for `{0}`")]
    MissingArmorFooter(String),

    #[error("armor footer `{found}` does not match header `{expected}`")]
    ArmorLabelMismatch { expected: String, found: String },

    #[error("armor payload is not valid radix-64")]
    InvalidRadix64,

    #[error("armor checksum line missing")]
    MissingChecksum,

    #[error("armor checksum mismatch: expected {expected:06x}, computed {computed:06x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("invalid packet header byte {0:#04x}")]
    InvalidPacketHeader(u8),

    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("partial body lengths are not allowed in key packets")]
    PartialBodyLength,

    #[error("public key portion of {0} bytes is too long to fingerprint")]
    OversizedKeyPacket(usize),

    #[error("unsupported {kind} packet version {version}")]
    UnsupportedVersion { kind: PacketKind, version: u8 },

    #[error("unsupported symmetric cipher {0}")]
    UnsupportedCipher(u8),

    #[error("unsupported string-to-key specifier {0}")]
    UnsupportedS2k(u8),

    #[error("unsupported hash algorithm {0}")]
    UnsupportedHash(u8),

    #[error("secret key is encrypted and no passphrase was supplied")]
    PassphraseRequired,

    #[error("wrong passphrase for secret key")]
    WrongPassphrase,

    #[error("secret key material checksum mismatch")]
    SecretChecksumMismatch,
}
