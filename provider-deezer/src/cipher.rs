//! # Stripe Cipher
//!
//! Deezer media files are served under `BF_CBC_STRIPE`: the file is cut into
//! 2048-byte chunks and every third full chunk (byte offset divisible by
//! 6144) is Blowfish-CBC encrypted with a fixed IV. Everything else, including
//! a trailing short chunk, is plaintext.
//!
//! The per-track key is derived from the MD5 hex digest of the track id and
//! the 16-character master key:
//!
//! ```text
//! key[i] = hex[i] ^ hex[i + 16] ^ master[i]    for i in 0..16
//! ```
//!
//! [`StripeDecoder`] applies the scheme chunk by chunk over a byte stream;
//! [`decrypt`] and [`encrypt`] work on whole buffers.

use bytes::{Bytes, BytesMut};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use std::fmt;
use std::io;
use tokio_util::codec::Decoder;

use crate::error::{DeezerError, Result};

/// Size of one stripe chunk.
pub const CHUNK_SIZE: usize = 2048;

/// Distance between two encrypted chunks.
pub const STRIPE_SIZE: usize = CHUNK_SIZE * 3;

/// Fixed IV, reset for every encrypted chunk.
pub const IV: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

type BlowfishCbcDec = cbc::Decryptor<blowfish::Blowfish>;
type BlowfishCbcEnc = cbc::Encryptor<blowfish::Blowfish>;

/// The 16-byte master key, parsed from its Latin-1 string form.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; 16]);

impl MasterKey {
    /// Parse a master key.
    ///
    /// # Errors
    ///
    /// [`DeezerError::InvalidMasterKey`] unless the key is exactly 16
    /// characters, each in U+0000..=U+00FF.
    pub fn parse(key: &str) -> Result<Self> {
        let mut bytes = [0u8; 16];
        let mut len = 0;

        for c in key.chars() {
            let code = u32::from(c);
            if code > 0xFF {
                return Err(DeezerError::InvalidMasterKey(format!(
                    "character U+{:04X} is outside Latin-1",
                    code
                )));
            }
            if len == bytes.len() {
                return Err(DeezerError::InvalidMasterKey(format!(
                    "expected 16 characters, got {}",
                    key.chars().count()
                )));
            }
            bytes[len] = code as u8;
            len += 1;
        }

        if len != bytes.len() {
            return Err(DeezerError::InvalidMasterKey(format!(
                "expected 16 characters, got {}",
                len
            )));
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Blowfish key for exactly one track.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CipherKey([u8; 16]);

impl CipherKey {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

/// Derive the per-track key.
///
/// Track ids are hashed as single-byte characters; ids are numeric in
/// practice so this equals their ASCII bytes.
pub fn derive_key(track_id: &str, master: &MasterKey) -> CipherKey {
    let id_bytes: Vec<u8> = track_id.chars().map(|c| u32::from(c) as u8).collect();
    let digest = hex::encode(Md5::digest(&id_bytes));
    let hex = digest.as_bytes();

    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = hex[i] ^ hex[i + 16] ^ master.0[i];
    }
    CipherKey(key)
}

/// Whether the chunk starting at `offset` with `len` bytes is encrypted.
pub fn is_protected(offset: usize, len: usize) -> bool {
    len == CHUNK_SIZE && offset % STRIPE_SIZE == 0
}

fn decrypt_chunk(key: &CipherKey, chunk: &mut [u8]) -> Result<()> {
    BlowfishCbcDec::new_from_slices(key.as_bytes(), &IV)
        .map_err(|e| DeezerError::Cipher(format!("Invalid key length: {}", e)))?
        .decrypt_padded_mut::<NoPadding>(chunk)
        .map_err(|e| DeezerError::Cipher(format!("Chunk decryption failed: {}", e)))?;
    Ok(())
}

fn encrypt_chunk(key: &CipherKey, chunk: &mut [u8]) -> Result<()> {
    let len = chunk.len();
    BlowfishCbcEnc::new_from_slices(key.as_bytes(), &IV)
        .map_err(|e| DeezerError::Cipher(format!("Invalid key length: {}", e)))?
        .encrypt_padded_mut::<NoPadding>(chunk, len)
        .map_err(|e| DeezerError::Cipher(format!("Chunk encryption failed: {}", e)))?;
    Ok(())
}

fn apply_stripes(
    data: &[u8],
    key: &CipherKey,
    transform: fn(&CipherKey, &mut [u8]) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    for (index, chunk) in out.chunks_mut(CHUNK_SIZE).enumerate() {
        if is_protected(index * CHUNK_SIZE, chunk.len()) {
            transform(key, chunk)?;
        }
    }
    Ok(out)
}

/// Decrypt a whole ciphered payload. Output has the input's length.
pub fn decrypt(data: &[u8], track_id: &str, master: &MasterKey) -> Result<Vec<u8>> {
    apply_stripes(data, &derive_key(track_id, master), decrypt_chunk)
}

/// Inverse of [`decrypt`]: encrypt the stripe chunks of a plaintext payload.
pub fn encrypt(data: &[u8], track_id: &str, master: &MasterKey) -> Result<Vec<u8>> {
    apply_stripes(data, &derive_key(track_id, master), encrypt_chunk)
}

/// Streaming stripe decryption.
///
/// Yields one chunk at a time, so memory stays bounded by the read buffer
/// regardless of file size.
#[derive(Debug)]
pub struct StripeDecoder {
    key: CipherKey,
    offset: usize,
}

impl StripeDecoder {
    pub fn new(key: CipherKey) -> Self {
        Self { key, offset: 0 }
    }

    /// Bytes emitted so far.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Decoder for StripeDecoder {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Bytes>> {
        if src.len() < CHUNK_SIZE {
            src.reserve(CHUNK_SIZE - src.len());
            return Ok(None);
        }

        let mut chunk = src.split_to(CHUNK_SIZE);
        if is_protected(self.offset, chunk.len()) {
            decrypt_chunk(&self.key, &mut chunk)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
        self.offset += CHUNK_SIZE;
        Ok(Some(chunk.freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Bytes>> {
        if let Some(chunk) = self.decode(src)? {
            return Ok(Some(chunk));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // The short tail is never encrypted.
        let tail = src.split();
        self.offset += tail.len();
        Ok(Some(tail.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "g4el58wc0zvf9na1";

    fn master() -> MasterKey {
        MasterKey::parse(MASTER).unwrap()
    }

    #[test]
    fn test_master_key_validation() {
        assert!(MasterKey::parse("too-short").is_err());
        assert!(MasterKey::parse("seventeen-chars!!").is_err());
        assert!(MasterKey::parse("g4el58wc0zvf9na\u{20ac}").is_err());
        assert_eq!(
            MasterKey::parse("g4el58wc0zvf9na\u{00e9}").unwrap().as_bytes()[15],
            0xE9
        );
    }

    #[test]
    fn test_derive_key_matches_reference_layout() {
        let key = derive_key("3135556", &master());

        let digest = hex::encode(Md5::digest(b"3135556"));
        let hex = digest.as_bytes();
        let master = MASTER.as_bytes();
        for i in 0..16 {
            assert_eq!(key.as_bytes()[i], hex[i] ^ hex[i + 16] ^ master[i]);
        }
    }

    #[test]
    fn test_derive_key_is_deterministic_and_id_sensitive() {
        let master = master();
        assert_eq!(derive_key("3135556", &master), derive_key("3135556", &master));
        assert_ne!(derive_key("3135556", &master), derive_key("3135557", &master));
    }

    #[test]
    fn test_protected_chunk_selection() {
        assert!(is_protected(0, CHUNK_SIZE));
        assert!(!is_protected(CHUNK_SIZE, CHUNK_SIZE));
        assert!(!is_protected(CHUNK_SIZE * 2, CHUNK_SIZE));
        assert!(is_protected(STRIPE_SIZE, CHUNK_SIZE));
        assert!(!is_protected(STRIPE_SIZE, 100));
        assert!(!is_protected(0, CHUNK_SIZE - 1));
    }

    #[test]
    fn test_single_chunk_payload_is_identity() {
        let payload: Vec<u8> = (0..CHUNK_SIZE - 8).map(|i| i as u8).collect();
        assert_eq!(decrypt(&payload, "3135556", &master()).unwrap(), payload);
    }

    #[test]
    fn test_decoder_passes_short_tail_through() {
        let mut decoder = StripeDecoder::new(derive_key("1", &master()));
        let mut buf = BytesMut::from(&[9u8; 100][..]);

        assert!(decoder.decode(&mut buf).unwrap().is_none());
        let tail = decoder.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(&tail[..], &[9u8; 100][..]);
        assert_eq!(decoder.offset(), 100);
    }
}
