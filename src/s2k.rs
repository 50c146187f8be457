//! String-to-key derivation and symmetric decryption of secret key material.

use crate::error::DecodeError;
use crate::packet::Reader;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use sha2::Digest;
use zeroize::Zeroizing;

// bytes fed to the hash per update call while iterating
const ITERATION_CHUNK: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sha224,
}

impl TryFrom<u8> for HashAlgorithm {
    type Error = DecodeError;

    fn try_from(id: u8) -> Result<Self, DecodeError> {
        match id {
            2 => Ok(Self::Sha1),
            8 => Ok(Self::Sha256),
            9 => Ok(Self::Sha384),
            10 => Ok(Self::Sha512),
            11 => Ok(Self::Sha224),
            other => Err(DecodeError::UnsupportedHash(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SymmetricAlgorithm {
    Aes128,
    Aes192,
    Aes256,
}

impl SymmetricAlgorithm {
    pub(crate) fn key_size(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    pub(crate) fn block_size(self) -> usize {
        16
    }

    fn id(self) -> u8 {
        match self {
            Self::Aes128 => 7,
            Self::Aes192 => 8,
            Self::Aes256 => 9,
        }
    }

    /// CFB-decrypts `buf` in place.
    pub(crate) fn decrypt(self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), DecodeError> {
        let invalid = |_| DecodeError::UnsupportedCipher(self.id());
        match self {
            Self::Aes128 => cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
            Self::Aes192 => cfb_mode::Decryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
            Self::Aes256 => cfb_mode::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
        }
        Ok(())
    }
}

impl TryFrom<u8> for SymmetricAlgorithm {
    type Error = DecodeError;

    fn try_from(id: u8) -> Result<Self, DecodeError> {
        match id {
            7 => Ok(Self::Aes128),
            8 => Ok(Self::Aes192),
            9 => Ok(Self::Aes256),
            other => Err(DecodeError::UnsupportedCipher(other)),
        }
    }
}

/// A string-to-key specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum S2k {
    Simple {
        hash: HashAlgorithm,
    },
    Salted {
        hash: HashAlgorithm,
        salt: [u8; 8],
    },
    IteratedSalted {
        hash: HashAlgorithm,
        salt: [u8; 8],
        count: usize,
    },
}

/// Number of octets hashed for an iterated specifier's coded count.
pub(crate) fn decode_count(coded: u8) -> usize {
    (16 + usize::from(coded & 15)) << (usize::from(coded >> 4) + 6)
}

impl S2k {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let specifier = reader.u8("string-to-key specifier")?;
        match specifier {
            0 => {
                let hash = HashAlgorithm::try_from(reader.u8("string-to-key hash")?)?;
                Ok(Self::Simple { hash })
            }
            1 | 3 => {
                let hash = HashAlgorithm::try_from(reader.u8("string-to-key hash")?)?;
                let mut salt = [0u8; 8];
                salt.copy_from_slice(reader.take(8, "string-to-key salt")?);
                if specifier == 1 {
                    Ok(Self::Salted { hash, salt })
                } else {
                    let count = decode_count(reader.u8("string-to-key count")?);
                    Ok(Self::IteratedSalted { hash, salt, count })
                }
            }
            other => Err(DecodeError::UnsupportedS2k(other)),
        }
    }

    fn hash(&self) -> HashAlgorithm {
        match self {
            Self::Simple { hash } | Self::Salted { hash, .. } | Self::IteratedSalted { hash, .. } => {
                *hash
            }
        }
    }

    /// Derives `key_len` bytes of symmetric key from `passphrase`.
    pub(crate) fn derive_key(&self, passphrase: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(Vec::with_capacity(key_len));
        let mut preload = 0;
        while key.len() < key_len {
            let block = match self.hash() {
                HashAlgorithm::Sha1 => self.hash_round::<sha1::Sha1>(preload, passphrase),
                HashAlgorithm::Sha224 => self.hash_round::<sha2::Sha224>(preload, passphrase),
                HashAlgorithm::Sha256 => self.hash_round::<sha2::Sha256>(preload, passphrase),
                HashAlgorithm::Sha384 => self.hash_round::<sha2::Sha384>(preload, passphrase),
                HashAlgorithm::Sha512 => self.hash_round::<sha2::Sha512>(preload, passphrase),
            };
            key.extend_from_slice(&block);
            preload += 1;
        }
        key.truncate(key_len);
        key
    }

    // one hash context, preloaded with `preload` zero octets
    fn hash_round<D: Digest>(&self, preload: usize, passphrase: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut hasher = D::new();
        hasher.update(vec![0u8; preload]);

        match self {
            Self::Simple { .. } => hasher.update(passphrase),
            Self::Salted { salt, .. } => {
                hasher.update(salt);
                hasher.update(passphrase);
            }
            Self::IteratedSalted { salt, count, .. } => {
                let mut unit = Zeroizing::new(Vec::with_capacity(salt.len() + passphrase.len()));
                unit.extend_from_slice(salt);
                unit.extend_from_slice(passphrase);

                let repeats = (ITERATION_CHUNK / unit.len()).max(1);
                let chunk = Zeroizing::new(unit.repeat(repeats));

                // at least one full salt+passphrase is always hashed
                let mut remaining = (*count).max(unit.len());
                while remaining >= chunk.len() {
                    hasher.update(&chunk[..]);
                    remaining -= chunk.len();
                }
                hasher.update(&chunk[..remaining]);
            }
        }

        Zeroizing::new(hasher.finalize().to_vec())
    }
}
