//! AES-CTR and AES-CBC primitives for Common Encryption.
//!
//! The block cipher comes from the `aes` crate; everything mode-level
//! (counter layout, chaining, padding, ciphertext stealing) is implemented
//! here because CENC pins the exact semantics:
//!
//! - CTR: the 16-byte counter carries the IV in bytes 0-7 and a 64-bit
//!   big-endian block counter in bytes 8-15, incremented once per 16
//!   keystream bytes. Overflow wraps within the low 64 bits only.
//! - CBC: three padding schemes (none / PKCS#5 / ciphertext stealing).
//!   With no padding the IV chains across calls; otherwise every call
//!   restarts from the stored IV.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

use crate::assert_invariant;
use crate::error::{Error, Result};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Increment an 8-byte big-endian counter by 1. Returns true on wrap.
fn increment64(counter: &mut [u8]) -> bool {
    debug_assert_eq!(counter.len(), 8);
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            return false;
        }
    }
    true
}

/// AES defines three key sizes: 128, 192 and 256 bits.
fn check_key_size(key: &[u8]) -> Result<()> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        other => Err(Error::invalid_argument(format!(
            "invalid AES key size: {} bytes",
            other
        ))),
    }
}

/// Key-size-erased AES block cipher.
enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesBlock {
    fn new(key: &[u8]) -> Result<Self> {
        check_key_size(key)?;
        let cipher = match key.len() {
            16 => AesBlock::Aes128(Aes128::new(GenericArray::from_slice(key))),
            24 => AesBlock::Aes192(Aes192::new(GenericArray::from_slice(key))),
            _ => AesBlock::Aes256(Aes256::new(GenericArray::from_slice(key))),
        };
        Ok(cipher)
    }

    fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes192(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.decrypt_block(block),
            AesBlock::Aes192(c) => c.decrypt_block(block),
            AesBlock::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn check_iv_size(iv: &[u8], allowed: &[usize]) -> Result<()> {
    if allowed.contains(&iv.len()) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "invalid IV size: {} bytes (expected one of {:?})",
            iv.len(),
            allowed
        )))
    }
}

/// AES-CTR keystream cipher. Encryption and decryption are the same
/// operation.
///
/// The keystream offset within a block is preserved across calls so that
/// subsample boundaries inside one sample do not realign encryption;
/// [`AesCtrCryptor::set_iv`] resets the offset for the next sample.
pub struct AesCtrCryptor {
    cipher: AesBlock,
    iv: Vec<u8>,
    counter: [u8; AES_BLOCK_SIZE],
    encrypted_counter: [u8; AES_BLOCK_SIZE],
    block_offset: usize,
}

impl AesCtrCryptor {
    /// Create a CTR cryptor. Keys of 16/24/32 bytes; IV of 8 or 16 bytes
    /// (CENC uses 8, leaving the low half as the block counter).
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let cipher = AesBlock::new(key)?;
        let mut cryptor = Self {
            cipher,
            iv: Vec::new(),
            counter: [0u8; AES_BLOCK_SIZE],
            encrypted_counter: [0u8; AES_BLOCK_SIZE],
            block_offset: 0,
        };
        cryptor.set_iv(iv)?;
        Ok(cryptor)
    }

    /// Install a new IV and reset the keystream position.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        check_iv_size(iv, &[8, 16])?;
        self.iv = iv.to_vec();
        self.block_offset = 0;
        self.counter = [0u8; AES_BLOCK_SIZE];
        self.counter[..iv.len()].copy_from_slice(iv);
        Ok(())
    }

    /// The IV this cryptor was last set to.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// XOR the keystream into `data` in place.
    pub fn crypt_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            if self.block_offset == 0 {
                self.encrypted_counter = self.counter;
                self.cipher.encrypt_block(&mut self.encrypted_counter);
                // Bytes 8-15 of the counter block are a 64-bit integer
                // incremented once per block of sample data; the IV half
                // stays untouched even on wrap (ISO/IEC 23001-7).
                increment64(&mut self.counter[8..]);
            }
            *byte ^= self.encrypted_counter[self.block_offset];
            self.block_offset = (self.block_offset + 1) % AES_BLOCK_SIZE;
        }
    }

    /// Encrypt into a new vector; ciphertext size equals plaintext size.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = plaintext.to_vec();
        self.crypt_in_place(&mut out);
        out
    }

    /// CTR decryption is the same keystream XOR.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        self.encrypt(ciphertext)
    }
}

/// CBC residual-block handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbcPadding {
    /// Residual bytes are left in the clear; the IV chains across calls.
    NoPadding,
    /// Residual block padded to 16 bytes with the pad count.
    Pkcs5,
    /// Ciphertext stealing: inputs shorter than one block pass through;
    /// otherwise output length equals input length.
    Cts,
}

impl CbcPadding {
    fn num_padding_bytes(self, size: usize) -> usize {
        match self {
            CbcPadding::Pkcs5 => AES_BLOCK_SIZE - (size % AES_BLOCK_SIZE),
            _ => 0,
        }
    }
}

/// AES-CBC encryptor.
pub struct AesCbcEncryptor {
    cipher: AesBlock,
    padding: CbcPadding,
    iv: [u8; AES_BLOCK_SIZE],
    chain_iv: [u8; AES_BLOCK_SIZE],
}

impl AesCbcEncryptor {
    /// Create a CBC encryptor with a 16-byte IV.
    pub fn new(key: &[u8], iv: &[u8], padding: CbcPadding) -> Result<Self> {
        let cipher = AesBlock::new(key)?;
        check_iv_size(iv, &[16])?;
        let mut iv_block = [0u8; AES_BLOCK_SIZE];
        iv_block.copy_from_slice(iv);
        Ok(Self {
            cipher,
            padding,
            iv: iv_block,
            chain_iv: iv_block,
        })
    }

    /// Install a new IV, resetting the chain.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        check_iv_size(iv, &[16])?;
        self.iv.copy_from_slice(iv);
        self.chain_iv = self.iv;
        Ok(())
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    fn encrypt_chained(&mut self, block: &[u8; AES_BLOCK_SIZE]) -> [u8; AES_BLOCK_SIZE] {
        let mut work = [0u8; AES_BLOCK_SIZE];
        for (i, byte) in work.iter_mut().enumerate() {
            *byte = block[i] ^ self.chain_iv[i];
        }
        self.cipher.encrypt_block(&mut work);
        self.chain_iv = work;
        work
    }

    /// Encrypt one call's worth of plaintext.
    ///
    /// Output length is `plaintext.len()` plus the padding bytes for the
    /// selected scheme (zero for no-padding and CTS).
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        // Chaining across calls only exists for the no-padding scheme.
        if self.padding != CbcPadding::NoPadding {
            self.chain_iv = self.iv;
        }

        let residual_size = plaintext.len() % AES_BLOCK_SIZE;
        let cbc_size = plaintext.len() - residual_size;
        let mut out = Vec::with_capacity(plaintext.len() + self.padding.num_padding_bytes(plaintext.len()));

        if cbc_size == 0 && self.padding == CbcPadding::Cts {
            // Less than one block: left unencrypted.
            out.extend_from_slice(plaintext);
            return out;
        }

        for chunk in plaintext[..cbc_size].chunks_exact(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            out.extend_from_slice(&self.encrypt_chained(&block));
        }

        if residual_size == 0 && self.padding != CbcPadding::Pkcs5 {
            return out;
        }

        match self.padding {
            CbcPadding::NoPadding => {
                // The residual tail is left in the clear.
                out.extend_from_slice(&plaintext[cbc_size..]);
            }
            CbcPadding::Pkcs5 => {
                let pad = self.padding.num_padding_bytes(plaintext.len());
                assert_invariant!(
                    pad > 0 && pad <= AES_BLOCK_SIZE,
                    "PKCS#5 pad count must be within one block",
                    "crypto::aes::encrypt"
                );
                let mut block = [pad as u8; AES_BLOCK_SIZE];
                block[..residual_size].copy_from_slice(&plaintext[cbc_size..]);
                out.extend_from_slice(&self.encrypt_chained(&block));
            }
            CbcPadding::Cts => {
                // Zero-pad the residual, encrypt it chained off the last
                // full ciphertext block, then swap: the stolen tail of the
                // last full block becomes the final partial block.
                let mut block = [0u8; AES_BLOCK_SIZE];
                block[..residual_size].copy_from_slice(&plaintext[cbc_size..]);
                let encrypted_residual = self.encrypt_chained(&block);

                let last_full_start = out.len() - AES_BLOCK_SIZE;
                let stolen: Vec<u8> = out[last_full_start..last_full_start + residual_size].to_vec();
                out[last_full_start..].copy_from_slice(&encrypted_residual);
                out.extend_from_slice(&stolen);
            }
        }
        out
    }
}

/// AES-CBC decryptor, the inverse of [`AesCbcEncryptor`].
pub struct AesCbcDecryptor {
    cipher: AesBlock,
    padding: CbcPadding,
    iv: [u8; AES_BLOCK_SIZE],
    chain_iv: [u8; AES_BLOCK_SIZE],
}

impl AesCbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8], padding: CbcPadding) -> Result<Self> {
        let cipher = AesBlock::new(key)?;
        check_iv_size(iv, &[16])?;
        let mut iv_block = [0u8; AES_BLOCK_SIZE];
        iv_block.copy_from_slice(iv);
        Ok(Self {
            cipher,
            padding,
            iv: iv_block,
            chain_iv: iv_block,
        })
    }

    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        check_iv_size(iv, &[16])?;
        self.iv.copy_from_slice(iv);
        self.chain_iv = self.iv;
        Ok(())
    }

    fn decrypt_chained(&mut self, block: &[u8; AES_BLOCK_SIZE]) -> [u8; AES_BLOCK_SIZE] {
        let mut work = *block;
        self.cipher.decrypt_block(&mut work);
        for (i, byte) in work.iter_mut().enumerate() {
            *byte ^= self.chain_iv[i];
        }
        self.chain_iv = *block;
        work
    }

    /// Decrypt one call's worth of ciphertext, stripping PKCS#5 padding
    /// when that scheme is selected.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if self.padding != CbcPadding::NoPadding {
            self.chain_iv = self.iv;
        }

        match self.padding {
            CbcPadding::NoPadding => {
                let residual_size = ciphertext.len() % AES_BLOCK_SIZE;
                let cbc_size = ciphertext.len() - residual_size;
                let mut out = Vec::with_capacity(ciphertext.len());
                for chunk in ciphertext[..cbc_size].chunks_exact(AES_BLOCK_SIZE) {
                    let mut block = [0u8; AES_BLOCK_SIZE];
                    block.copy_from_slice(chunk);
                    out.extend_from_slice(&self.decrypt_chained(&block));
                }
                out.extend_from_slice(&ciphertext[cbc_size..]);
                Ok(out)
            }
            CbcPadding::Pkcs5 => {
                if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
                    return Err(Error::EncryptionFailure(
                        "PKCS#5 ciphertext must be a positive multiple of the block size".into(),
                    ));
                }
                let mut out = Vec::with_capacity(ciphertext.len());
                for chunk in ciphertext.chunks_exact(AES_BLOCK_SIZE) {
                    let mut block = [0u8; AES_BLOCK_SIZE];
                    block.copy_from_slice(chunk);
                    out.extend_from_slice(&self.decrypt_chained(&block));
                }
                let pad = *out.last().ok_or_else(|| {
                    Error::EncryptionFailure("empty PKCS#5 plaintext".into())
                })? as usize;
                if pad == 0 || pad > AES_BLOCK_SIZE || pad > out.len() {
                    return Err(Error::EncryptionFailure("bad PKCS#5 padding".into()));
                }
                if out[out.len() - pad..].iter().any(|&b| b as usize != pad) {
                    return Err(Error::EncryptionFailure("bad PKCS#5 padding".into()));
                }
                out.truncate(out.len() - pad);
                Ok(out)
            }
            CbcPadding::Cts => self.decrypt_cts(ciphertext),
        }
    }

    fn decrypt_cts(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < AES_BLOCK_SIZE {
            // Shorter than one block passed through unencrypted.
            return Ok(ciphertext.to_vec());
        }
        let residual_size = ciphertext.len() % AES_BLOCK_SIZE;
        if residual_size == 0 {
            let mut out = Vec::with_capacity(ciphertext.len());
            for chunk in ciphertext.chunks_exact(AES_BLOCK_SIZE) {
                let mut block = [0u8; AES_BLOCK_SIZE];
                block.copy_from_slice(chunk);
                out.extend_from_slice(&self.decrypt_chained(&block));
            }
            return Ok(out);
        }

        // Layout after stealing: C_0..C_{k-2}, X, T where X encrypts the
        // zero-padded residual chained off the unswapped C_{k-1}, and T is
        // the first |residual| bytes of C_{k-1}.
        let full_blocks = ciphertext.len() / AES_BLOCK_SIZE;
        let swapped_start = (full_blocks - 1) * AES_BLOCK_SIZE;

        let mut out = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext[..swapped_start].chunks_exact(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            out.extend_from_slice(&self.decrypt_chained(&block));
        }
        let prev_cipher_block = self.chain_iv;

        let mut x = [0u8; AES_BLOCK_SIZE];
        x.copy_from_slice(&ciphertext[swapped_start..swapped_start + AES_BLOCK_SIZE]);
        let tail = &ciphertext[swapped_start + AES_BLOCK_SIZE..];

        // D(X) = pad0(residual) XOR C_{k-1}; reconstruct C_{k-1} from the
        // stolen tail plus the zero-pad region of D(X).
        let mut dx = x;
        self.cipher.decrypt_block(&mut dx);
        let mut last_full_cipher = [0u8; AES_BLOCK_SIZE];
        last_full_cipher[..residual_size].copy_from_slice(tail);
        last_full_cipher[residual_size..].copy_from_slice(&dx[residual_size..]);

        let mut last_plain = last_full_cipher;
        self.cipher.decrypt_block(&mut last_plain);
        for (i, byte) in last_plain.iter_mut().enumerate() {
            *byte ^= prev_cipher_block[i];
        }
        out.extend_from_slice(&last_plain);

        for i in 0..residual_size {
            out.push(dx[i] ^ last_full_cipher[i]);
        }
        self.chain_iv = self.iv;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = &[0u8; 16];

    #[test]
    fn rejects_bad_key_sizes() {
        assert!(AesCtrCryptor::new(&[0u8; 15], &[0u8; 8]).is_err());
        assert!(AesCtrCryptor::new(&[0u8; 17], &[0u8; 8]).is_err());
        assert!(AesCtrCryptor::new(&[0u8; 24], &[0u8; 8]).is_ok());
        assert!(AesCtrCryptor::new(&[0u8; 32], &[0u8; 8]).is_ok());
        assert!(AesCbcEncryptor::new(&[0u8; 20], &[0u8; 16], CbcPadding::Pkcs5).is_err());
    }

    #[test]
    fn rejects_bad_iv_sizes() {
        assert!(AesCtrCryptor::new(KEY, &[0u8; 7]).is_err());
        assert!(AesCbcEncryptor::new(KEY, &[0u8; 8], CbcPadding::NoPadding).is_err());
    }

    #[test]
    fn ctr_known_vector_zero_key_zero_iv() {
        // AES-128(zero key) of the zero block is the classic
        // 66e94bd4ef8a2c3b884cfa59ca342b2e; with a zero IV the first
        // keystream block is exactly that.
        let mut cryptor = AesCtrCryptor::new(KEY, &[0u8; 8]).unwrap();
        let ciphertext = cryptor.encrypt(&[0u8; 16]);
        assert_eq!(
            ciphertext,
            [
                0x66, 0xe9, 0x4b, 0xd4, 0xef, 0x8a, 0x2c, 0x3b, 0x88, 0x4c, 0xfa, 0x59, 0xca,
                0x34, 0x2b, 0x2e
            ]
        );
    }

    #[test]
    fn ctr_round_trips() {
        let plaintext: Vec<u8> = (0u8..=255).collect();
        let iv = [0x11u8; 8];
        let mut enc = AesCtrCryptor::new(KEY, &iv).unwrap();
        let ciphertext = enc.encrypt(&plaintext);
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(ciphertext, plaintext);

        let mut dec = AesCtrCryptor::new(KEY, &iv).unwrap();
        assert_eq!(dec.decrypt(&ciphertext), plaintext);
    }

    #[test]
    fn ctr_keystream_offset_survives_split_calls() {
        let plaintext = [0xabu8; 40];
        let iv = [0x42u8; 8];

        let mut whole = AesCtrCryptor::new(KEY, &iv).unwrap();
        let expected = whole.encrypt(&plaintext);

        let mut split = AesCtrCryptor::new(KEY, &iv).unwrap();
        let mut actual = split.encrypt(&plaintext[..7]);
        actual.extend(split.encrypt(&plaintext[7..23]));
        actual.extend(split.encrypt(&plaintext[23..]));
        assert_eq!(actual, expected);
    }

    #[test]
    fn ctr_counter_wrap_keeps_iv_prefix() {
        // IV = ff ff ff ff ff ff ff ff, block counter starts at zero; the
        // counter half wraps independently of the IV half, so blocks are
        // E(ffffffffffffffff || 0) then E(ffffffffffffffff || 1).
        let iv = [0xffu8; 8];
        let mut cryptor = AesCtrCryptor::new(KEY, &iv).unwrap();
        let ciphertext = cryptor.encrypt(&[0u8; 32]);

        let cipher = Aes128::new(GenericArray::from_slice(KEY));
        let mut expected = Vec::new();
        for counter_value in [0u64, 1u64] {
            let mut block = [0u8; 16];
            block[..8].copy_from_slice(&iv);
            block[8..].copy_from_slice(&counter_value.to_be_bytes());
            let ga = GenericArray::from_mut_slice(&mut block);
            cipher.encrypt_block(ga);
            expected.extend_from_slice(&block);
        }
        assert_eq!(ciphertext, expected);
    }

    #[test]
    fn increment64_wraps_low_half_only() {
        let mut counter = [0xffu8; 8];
        assert!(increment64(&mut counter));
        assert_eq!(counter, [0u8; 8]);

        let mut counter = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
        assert!(!increment64(&mut counter));
        assert_eq!(counter, [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn cbc_pkcs5_pads_to_block_multiple() {
        let iv = [0x01u8; 16];
        let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::Pkcs5).unwrap();
        for len in [0usize, 1, 15, 16, 17, 31, 32] {
            let plaintext = vec![0x5au8; len];
            let ciphertext = enc.encrypt(&plaintext);
            assert_eq!(ciphertext.len(), len + (16 - len % 16), "len {}", len);

            let mut dec = AesCbcDecryptor::new(KEY, &iv, CbcPadding::Pkcs5).unwrap();
            assert_eq!(dec.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn cbc_pkcs5_empty_input_is_one_pad_block() {
        // Empty plaintext encrypts a full block of 0x10 bytes.
        let iv = [0u8; 16];
        let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::Pkcs5).unwrap();
        let ciphertext = enc.encrypt(&[]);
        assert_eq!(ciphertext.len(), 16);

        let cipher = Aes128::new(GenericArray::from_slice(KEY));
        let mut expected = [0x10u8; 16];
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut expected));
        assert_eq!(ciphertext, expected);
    }

    #[test]
    fn cbc_no_padding_leaves_residual_clear_and_chains() {
        let iv = [0x07u8; 16];
        let plaintext = [0x33u8; 20];

        let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::NoPadding).unwrap();
        let ciphertext = enc.encrypt(&plaintext);
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_eq!(&ciphertext[16..], &plaintext[16..]);

        // Chaining: two sequential calls equal one combined call over the
        // block-aligned prefix.
        let mut chained = AesCbcEncryptor::new(KEY, &iv, CbcPadding::NoPadding).unwrap();
        let first = chained.encrypt(&[0x44u8; 16]);
        let second = chained.encrypt(&[0x55u8; 16]);

        let mut combined = AesCbcEncryptor::new(KEY, &iv, CbcPadding::NoPadding).unwrap();
        let mut both = [0u8; 32];
        both[..16].copy_from_slice(&[0x44u8; 16]);
        both[16..].copy_from_slice(&[0x55u8; 16]);
        let expected = combined.encrypt(&both);
        assert_eq!([first, second].concat(), expected);

        let mut dec = AesCbcDecryptor::new(KEY, &iv, CbcPadding::NoPadding).unwrap();
        assert_eq!(dec.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn cbc_cts_short_input_passes_through() {
        let iv = [0x09u8; 16];
        let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::Cts).unwrap();
        assert_eq!(enc.encrypt(b"hi"), b"hi");
        assert_eq!(enc.encrypt(&[0xaau8; 15]), &[0xaau8; 15]);
    }

    #[test]
    fn cbc_cts_round_trips_without_expansion() {
        let iv = [0x0bu8; 16];
        for len in [16usize, 17, 31, 32, 33, 47, 100] {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::Cts).unwrap();
            let ciphertext = enc.encrypt(&plaintext);
            assert_eq!(ciphertext.len(), plaintext.len(), "len {}", len);

            let mut dec = AesCbcDecryptor::new(KEY, &iv, CbcPadding::Cts).unwrap();
            assert_eq!(dec.decrypt(&ciphertext).unwrap(), plaintext, "len {}", len);
        }
    }

    #[test]
    fn cbc_reset_iv_restarts_chain() {
        let iv = [0x0du8; 16];
        let block = [0x77u8; 16];

        let mut enc = AesCbcEncryptor::new(KEY, &iv, CbcPadding::NoPadding).unwrap();
        let first = enc.encrypt(&block);
        enc.set_iv(&iv).unwrap();
        let second = enc.encrypt(&block);
        assert_eq!(first, second);
    }
}
