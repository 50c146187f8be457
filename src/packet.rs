//! Packet framing and key packet bodies.

use crate::error::DecodeError;
use num_bigint::BigUint;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// The kind tag of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Signature,
    SecretKey,
    PublicKey,
    SecretSubkey,
    UserId,
    PublicSubkey,
    Other(u8),
}

impl PacketKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            2 => Self::Signature,
            5 => Self::SecretKey,
            6 => Self::PublicKey,
            7 => Self::SecretSubkey,
            13 => Self::UserId,
            14 => Self::PublicSubkey,
            other => Self::Other(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::Signature => 2,
            Self::SecretKey => 5,
            Self::PublicKey => 6,
            Self::SecretSubkey => 7,
            Self::UserId => 13,
            Self::PublicSubkey => 14,
            Self::Other(tag) => tag,
        }
    }

    pub fn is_key(self) -> bool {
        matches!(
            self,
            Self::SecretKey | Self::PublicKey | Self::SecretSubkey | Self::PublicSubkey
        )
    }

    pub fn is_secret(self) -> bool {
        matches!(self, Self::SecretKey | Self::SecretSubkey)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature => f.write_str("signature"),
            Self::SecretKey => f.write_str("secret-key"),
            Self::PublicKey => f.write_str("public-key"),
            Self::SecretSubkey => f.write_str("secret-subkey"),
            Self::UserId => f.write_str("user-id"),
            Self::PublicSubkey => f.write_str("public-subkey"),
            Self::Other(tag) => write!(f, "tag-{}", tag),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Rsa,
    RsaEncryptOnly,
    RsaSignOnly,
    Elgamal,
    Dsa,
    Other(u8),
}

impl PublicKeyAlgorithm {
    pub fn is_rsa(self) -> bool {
        matches!(self, Self::Rsa | Self::RsaEncryptOnly | Self::RsaSignOnly)
    }

    /// Names of the public numeric fields, in wire order.
    pub fn public_fields(self) -> &'static [&'static str] {
        match self {
            Self::Rsa | Self::RsaEncryptOnly | Self::RsaSignOnly => &["n", "e"],
            Self::Elgamal => &["p", "g", "y"],
            Self::Dsa => &["p", "q", "g", "y"],
            Self::Other(_) => &[],
        }
    }

    /// Names of the secret numeric fields, in wire order.
    pub fn secret_fields(self) -> &'static [&'static str] {
        match self {
            Self::Rsa | Self::RsaEncryptOnly | Self::RsaSignOnly => &["d", "p", "q", "u"],
            Self::Elgamal | Self::Dsa => &["x"],
            Self::Other(_) => &[],
        }
    }
}

impl From<u8> for PublicKeyAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Rsa,
            2 => Self::RsaEncryptOnly,
            3 => Self::RsaSignOnly,
            16 => Self::Elgamal,
            17 => Self::Dsa,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
            Self::RsaEncryptOnly => f.write_str("RSA (encrypt only)"),
            Self::RsaSignOnly => f.write_str("RSA (sign only)"),
            Self::Elgamal => f.write_str("Elgamal"),
            Self::Dsa => f.write_str("DSA"),
            Self::Other(id) => write!(f, "algorithm {}", id),
        }
    }
}

/// A public or secret key packet with its named numeric fields.
///
/// Secret fields are only present once the packet has been unlocked, and
/// are wiped when the packet is dropped.
#[derive(Clone)]
pub struct KeyPacket {
    kind: PacketKind,
    version: u8,
    created: u32,
    algorithm: PublicKeyAlgorithm,
    key_id: Option<u64>,
    fields: BTreeMap<&'static str, BigUint>,
}

impl KeyPacket {
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Creation time, seconds since the epoch.
    pub fn created(&self) -> u32 {
        self.created
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    /// Low 64 bits of the fingerprint (v4) or of the modulus (v2/v3).
    pub fn key_id(&self) -> Option<u64> {
        self.key_id
    }

    pub fn field(&self, name: &str) -> Option<&BigUint> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub(crate) fn insert_field(&mut self, name: &'static str, value: BigUint) {
        if let Some(mut old) = self.fields.insert(name, value) {
            old.zeroize();
        }
    }
}

impl fmt::Debug for KeyPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPacket")
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("created", &self.created)
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id.map(|id| format!("{:016X}", id)))
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for KeyPacket {
    fn drop(&mut self) {
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

/// One framed packet of a key container.
#[derive(Clone)]
pub struct Packet {
    kind: PacketKind,
    body: Zeroizing<Vec<u8>>,
    key: Option<KeyPacket>,
}

impl Packet {
    pub(crate) fn new(kind: PacketKind, body: Vec<u8>, key: Option<KeyPacket>) -> Self {
        Self {
            kind,
            body: Zeroizing::new(body),
            key,
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn key(&self) -> Option<&KeyPacket> {
        self.key.as_ref()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("kind", &self.kind)
            .field("len", &self.body.len())
            .field("key", &self.key)
            .finish()
    }
}

/// Bounds-checked cursor over packet bytes.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::Truncated(what))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        bytes
    }

    pub(crate) fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// A multiprecision integer: bit count followed by big-endian magnitude.
    pub(crate) fn mpi(&mut self, what: &'static str) -> Result<BigUint, DecodeError> {
        let bits = usize::from(self.u16(what)?);
        let bytes = self.take((bits + 7) / 8, what)?;
        Ok(BigUint::from_bytes_be(bytes))
    }
}

/// Splits a binary packet stream into `(kind, body)` pairs using each
/// packet's own header.
pub(crate) fn split_packets(data: &[u8]) -> Result<Vec<(PacketKind, Vec<u8>)>, DecodeError> {
    let mut reader = Reader::new(data);
    let mut packets = Vec::new();

    while !reader.is_empty() {
        let ctb = reader.u8("packet header")?;
        if ctb & 0x80 == 0 {
            return Err(DecodeError::InvalidPacketHeader(ctb));
        }

        let (tag, len) = if ctb & 0x40 != 0 {
            let tag = ctb & 0x3f;
            let first = reader.u8("packet length")?;
            let len = match first {
                0..=191 => usize::from(first),
                192..=223 => {
                    let second = reader.u8("packet length")?;
                    ((usize::from(first) - 192) << 8) + usize::from(second) + 192
                }
                255 => reader.u32("packet length")? as usize,
                _ => return Err(DecodeError::PartialBodyLength),
            };
            (tag, len)
        } else {
            let tag = (ctb >> 2) & 0x0f;
            let len = match ctb & 0x03 {
                0 => usize::from(reader.u8("packet length")?),
                1 => usize::from(reader.u16("packet length")?),
                2 => reader.u32("packet length")? as usize,
                // indeterminate: the packet runs to the end of the stream
                _ => data.len() - reader.position(),
            };
            (tag, len)
        };

        if tag == 0 {
            return Err(DecodeError::InvalidPacketHeader(ctb));
        }

        let body = reader.take(len, "packet body")?;
        packets.push((PacketKind::from_tag(tag), body.to_vec()));
    }

    Ok(packets)
}

/// Appends a packet with a new-format header.
pub(crate) fn write_packet(out: &mut Vec<u8>, kind: PacketKind, body: &[u8]) {
    out.push(0xc0 | kind.tag());
    let len = body.len();
    if len < 192 {
        out.push(len as u8);
    } else if len < 8384 {
        let len = len - 192;
        out.push(((len >> 8) + 192) as u8);
        out.push((len & 0xff) as u8);
    } else {
        out.push(0xff);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(body);
}

/// Parses the public portion shared by every key packet kind.
///
/// Returns the packet and the number of body bytes the public portion
/// occupies; for secret packets the secret portion follows.
pub(crate) fn parse_key_packet(
    kind: PacketKind,
    body: &[u8],
) -> Result<(KeyPacket, usize), DecodeError> {
    let mut reader = Reader::new(body);
    let version = reader.u8("key packet version")?;

    let (created, algorithm) = match version {
        2 | 3 => {
            let created = reader.u32("key creation time")?;
            let _validity_days = reader.u16("key validity")?;
            (created, reader.u8("key algorithm")?)
        }
        4 => {
            let created = reader.u32("key creation time")?;
            (created, reader.u8("key algorithm")?)
        }
        _ => return Err(DecodeError::UnsupportedVersion { kind, version }),
    };
    let algorithm = PublicKeyAlgorithm::from(algorithm);

    let mut fields = BTreeMap::new();
    for name in algorithm.public_fields() {
        fields.insert(*name, reader.mpi("public key field")?);
    }

    let public_len = if matches!(algorithm, PublicKeyAlgorithm::Other(_)) && !kind.is_secret() {
        body.len()
    } else {
        reader.position()
    };

    let key_id = match (version, algorithm) {
        (4, PublicKeyAlgorithm::Other(_)) if kind.is_secret() => None,
        (4, _) => Some(v4_key_id(&body[..public_len])?),
        (_, alg) if alg.is_rsa() => fields.get("n").map(low_u64),
        _ => None,
    };

    let key = KeyPacket {
        kind,
        version,
        created,
        algorithm,
        key_id,
        fields,
    };
    Ok((key, public_len))
}

fn v4_key_id(public_body: &[u8]) -> Result<u64, DecodeError> {
    let len = u16::try_from(public_body.len())
        .map_err(|_| DecodeError::OversizedKeyPacket(public_body.len()))?;
    let mut hasher = Sha1::new();
    hasher.update([0x99]);
    hasher.update(len.to_be_bytes());
    hasher.update(public_body);
    let fingerprint = hasher.finalize();
    let mut id = [0u8; 8];
    id.copy_from_slice(&fingerprint[12..20]);
    Ok(u64::from_be_bytes(id))
}

fn low_u64(n: &BigUint) -> u64 {
    let bytes = n.to_bytes_be();
    let start = bytes.len().saturating_sub(8);
    bytes[start..]
        .iter()
        .fold(0u64, |id, byte| (id << 8) | u64::from(*byte))
}
