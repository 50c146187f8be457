use crate::armor::{self, PUBLIC_KEY_BLOCK};
use crate::error::{DecodeError, Error, NotFound, Result};
use crate::packet::{self, KeyPacket, Packet, PacketKind, Reader};
use crate::s2k::{S2k, SymmetricAlgorithm};
use num_bigint::BigUint;
use num_traits::Zero;
use sha1::{Digest, Sha1};
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const S2K_USAGE_CLEAR: u8 = 0;
const S2K_USAGE_SHA1: u8 = 254;
const S2K_USAGE_CHECKSUM: u8 = 255;

/// Supplies the passphrase for an encrypted secret key.
///
/// Implemented for any `Fn(&str) -> Option<String>`; the argument is a
/// prompt naming the key. Returning `None` means no passphrase is available.
pub trait PassphraseProvider {
    fn passphrase(&self, prompt: &str) -> Option<String>;
}

impl<F> PassphraseProvider for F
where
    F: Fn(&str) -> Option<String>,
{
    fn passphrase(&self, prompt: &str) -> Option<String> {
        self(prompt)
    }
}

/// The ordered packets of one armored key block.
#[derive(Clone, Debug)]
pub struct KeyContainer {
    label: String,
    packets: Vec<Packet>,
}

impl KeyContainer {
    /// Decodes an armored key block.
    ///
    /// An encrypted primary secret key is unlocked with a passphrase from
    /// `passphrase`; decoding fails if none is supplied or it is wrong.
    /// Secret subkeys keep only their public fields.
    pub fn decode(
        armored: &[u8],
        passphrase: Option<&dyn PassphraseProvider>,
    ) -> Result<Self, DecodeError> {
        let armored = armor::decode(armored)?;

        let mut packets = Vec::new();
        for (kind, body) in packet::split_packets(&armored.data)? {
            let key = if kind.is_key() {
                let (mut key, public_len) = packet::parse_key_packet(kind, &body)?;
                if kind == PacketKind::SecretKey {
                    unlock(&mut key, &body[public_len..], passphrase)?;
                }
                Some(key)
            } else {
                None
            };
            packets.push(Packet::new(kind, body, key));
        }
        debug!(label = %armored.label, packets = packets.len(), "decoded key container");

        Ok(Self {
            label: armored.label,
            packets,
        })
    }

    /// The armor label, e.g. `PGP PRIVATE KEY BLOCK`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// First key packet of the given kind.
    pub fn first_key(&self, kind: PacketKind) -> Option<&KeyPacket> {
        self.packets
            .iter()
            .filter(|p| p.kind() == kind)
            .find_map(Packet::key)
    }
}

fn unlock(
    key: &mut KeyPacket,
    secret: &[u8],
    passphrase: Option<&dyn PassphraseProvider>,
) -> Result<(), DecodeError> {
    let names = key.algorithm().secret_fields();
    if names.is_empty() {
        // secret layout unknown for this algorithm
        return Ok(());
    }

    let mut reader = Reader::new(secret);
    let usage = reader.u8("string-to-key usage")?;

    if usage == S2K_USAGE_CLEAR {
        let fields = read_secret_fields(names, reader.rest(), usage)?;
        return install_secret_fields(key, fields, DecodeError::SecretChecksumMismatch);
    }

    if usage != S2K_USAGE_SHA1 && usage != S2K_USAGE_CHECKSUM {
        // legacy usage octets name a cipher with an MD5 key; not supported
        return Err(DecodeError::UnsupportedS2k(usage));
    }
    if key.version() < 4 {
        return Err(DecodeError::UnsupportedVersion {
            kind: key.kind(),
            version: key.version(),
        });
    }

    let cipher = SymmetricAlgorithm::try_from(reader.u8("secret key cipher")?)?;
    let s2k = S2k::parse(&mut reader)?;
    let iv = reader.take(cipher.block_size(), "secret key IV")?;
    let mut plaintext = Zeroizing::new(reader.rest().to_vec());

    let prompt = match key.key_id() {
        Some(id) => format!("Passphrase needed for secret key {:016X}", id),
        None => "Passphrase needed for secret key".to_string(),
    };
    let phrase = passphrase
        .and_then(|provider| provider.passphrase(&prompt))
        .map(Zeroizing::new)
        .ok_or(DecodeError::PassphraseRequired)?;

    let sym_key = s2k.derive_key(phrase.as_bytes(), cipher.key_size());
    cipher.decrypt(&sym_key, iv, &mut plaintext)?;

    let fields = read_secret_fields(names, &plaintext, usage)
        .map_err(|_| DecodeError::WrongPassphrase)?;
    install_secret_fields(key, fields, DecodeError::WrongPassphrase)
}

fn install_secret_fields(
    key: &mut KeyPacket,
    mut fields: Vec<(&'static str, BigUint)>,
    mismatch: DecodeError,
) -> Result<(), DecodeError> {
    if key.algorithm().is_rsa() && !rsa_secret_consistent(key, &fields) {
        wipe(&mut fields);
        return Err(mismatch);
    }
    for (name, value) in fields {
        key.insert_field(name, value);
    }
    Ok(())
}

// The additive checksum misses reordered bytes, so the RSA fields are also
// checked against the public modulus and exponent.
fn rsa_secret_consistent(key: &KeyPacket, fields: &[(&'static str, BigUint)]) -> bool {
    let secret = |name: &str| {
        fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    };
    let (Some(n), Some(e)) = (key.field("n"), key.field("e")) else {
        return false;
    };
    let (Some(d), Some(p), Some(q)) = (secret("d"), secret("p"), secret("q")) else {
        return false;
    };
    if n.is_zero() || &(p * q) != n {
        return false;
    }

    let m = BigUint::from(0x5a5a_5a5au32) % n;
    m.modpow(d, n).modpow(e, n) == m
}

fn wipe(fields: &mut [(&'static str, BigUint)]) {
    for (_, value) in fields.iter_mut() {
        value.zeroize();
    }
}

// Reads the secret MPIs and verifies the trailing SHA-1 hash or 16-bit sum.
fn read_secret_fields(
    names: &[&'static str],
    plaintext: &[u8],
    usage: u8,
) -> Result<Vec<(&'static str, BigUint)>, DecodeError> {
    let mut reader = Reader::new(plaintext);
    let mut fields = Vec::with_capacity(names.len());
    for name in names {
        fields.push((*name, reader.mpi("secret key field")?));
    }
    let material = &plaintext[..reader.position()];

    let valid = if usage == S2K_USAGE_SHA1 {
        let expected = reader.take(20, "secret key hash")?;
        Sha1::digest(material).as_slice() == expected
    } else {
        let expected = reader.u16("secret key checksum")?;
        let sum = material
            .iter()
            .fold(0u16, |acc, byte| acc.wrapping_add(u16::from(*byte)));
        sum == expected
    };

    if valid {
        Ok(fields)
    } else {
        wipe(&mut fields);
        Err(DecodeError::SecretChecksumMismatch)
    }
}

/// The RSA signing parameters of a secret key. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretParams {
    d: BigUint,
    #[zeroize(skip)]
    n: BigUint,
}

impl SecretParams {
    /// Requires `n` and `d` non-zero and `d < n`.
    pub fn new(d: BigUint, n: BigUint) -> Result<Self> {
        if n.is_zero() {
            return Err(Error::InvalidKey("modulus is zero".to_string()));
        }
        if d.is_zero() {
            return Err(Error::InvalidKey("private exponent is zero".to_string()));
        }
        if d >= n {
            return Err(Error::InvalidKey(
                "private exponent is not below the modulus".to_string(),
            ));
        }
        Ok(Self { d, n })
    }

    pub fn d(&self) -> &BigUint {
        &self.d
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }
}

impl fmt::Debug for SecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretParams")
            .field("n_bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// The RSA verification parameters of a public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicParams {
    pub n: BigUint,
    pub e: BigUint,
}

fn rsa_key(container: &KeyContainer, kind: PacketKind) -> Result<&KeyPacket> {
    let key = container
        .first_key(kind)
        .ok_or(Error::NotFound(NotFound::Packet(kind)))?;
    if !key.algorithm().is_rsa() {
        return Err(Error::InvalidKey(format!(
            "{} packet uses {}, not RSA",
            kind,
            key.algorithm()
        )));
    }
    Ok(key)
}

fn rsa_field(key: &KeyPacket, name: &'static str) -> Result<BigUint> {
    key.field(name)
        .cloned()
        .ok_or(Error::NotFound(NotFound::Field(key.kind(), name)))
}

/// `(d, n)` of the first secret-key packet.
pub fn find_secret_params(container: &KeyContainer) -> Result<SecretParams> {
    let key = rsa_key(container, PacketKind::SecretKey)?;
    SecretParams::new(rsa_field(key, "d")?, rsa_field(key, "n")?)
}

/// `(n, e)` of the first public-key packet.
pub fn find_public_params(container: &KeyContainer) -> Result<PublicParams> {
    let key = rsa_key(container, PacketKind::PublicKey)?;
    Ok(PublicParams {
        n: rsa_field(key, "n")?,
        e: rsa_field(key, "e")?,
    })
}

/// Armored export of the first public key.
///
/// Includes the packets that belong to it (user IDs, signatures, public
/// subkeys) up to the next primary key. Secret packets are never exported.
pub fn find_public_export_string(container: &KeyContainer) -> Result<String> {
    let packets = container.packets();
    let start = packets
        .iter()
        .position(|p| p.kind() == PacketKind::PublicKey)
        .ok_or(Error::NotFound(NotFound::Packet(PacketKind::PublicKey)))?;
    let end = packets[start + 1..]
        .iter()
        .position(|p| matches!(p.kind(), PacketKind::PublicKey | PacketKind::SecretKey))
        .map_or(packets.len(), |offset| start + 1 + offset);

    let mut data = Vec::new();
    for p in packets[start..end].iter().filter(|p| !p.kind().is_secret()) {
        packet::write_packet(&mut data, p.kind(), p.body());
    }
    Ok(armor::encode(PUBLIC_KEY_BLOCK, &data))
}
