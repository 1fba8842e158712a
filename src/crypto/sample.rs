//! Per-sample Common Encryption: IV derivation, subsample plans, pattern
//! application, and the auxiliary information consumed by `senc`.

use crate::assert_invariant;
use crate::codec::NaluSpan;
use crate::config::{EncryptionParams, ProtectionScheme};
use crate::crypto::aes::{AesCbcEncryptor, AesCtrCryptor, CbcPadding, AES_BLOCK_SIZE};
use crate::error::{Error, Result};

/// The clear/encrypted split of one subsample.
///
/// Summing `clear_bytes + cipher_bytes` across a sample's entries yields
/// the sample size exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleEntry {
    pub clear_bytes: u16,
    pub cipher_bytes: u32,
}

impl SubsampleEntry {
    pub fn new(clear_bytes: u16, cipher_bytes: u32) -> Self {
        Self {
            clear_bytes,
            cipher_bytes,
        }
    }
}

/// Everything a decryptor needs for one sample; the fragmenter turns this
/// into `senc`/`saiz`/`saio` entries.
#[derive(Debug, Clone)]
pub struct DecryptConfig {
    /// Key identifier, always 16 bytes.
    pub key_id: [u8; 16],
    /// IV used for this sample (8 or 16 bytes).
    pub iv: Vec<u8>,
    /// Ordered clear/cipher split. Never empty for an encrypted sample.
    pub subsamples: Vec<SubsampleEntry>,
    pub protection_scheme: ProtectionScheme,
    /// Pattern parameters; both zero for non-pattern schemes.
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
}

impl DecryptConfig {
    /// Byte size of this sample's entry in the `senc` box:
    /// per-sample IV plus the subsample table.
    pub fn aux_info_size(&self) -> u32 {
        let iv_size = self.protection_scheme.per_sample_iv_size() as u32;
        // subsample_count (u16) + 6 bytes per entry.
        iv_size + 2 + 6 * self.subsamples.len() as u32
    }
}

enum Cryptor {
    Ctr(AesCtrCryptor),
    Cbc(AesCbcEncryptor),
}

/// Applies one CENC protection scheme to samples, deriving IVs and
/// producing [`DecryptConfig`] side information.
pub struct SampleEncryptor {
    scheme: ProtectionScheme,
    key_id: [u8; 16],
    crypt_byte_block: u8,
    skip_byte_block: u8,
    cryptor: Cryptor,
    /// IV for the next sample; fixed when `constant_iv` is set.
    current_iv: Vec<u8>,
    constant_iv: bool,
}

impl SampleEncryptor {
    /// Validate the parameters and build the scheme's cryptor.
    pub fn new(params: &EncryptionParams) -> Result<Self> {
        let scheme = params.scheme;

        if params.iv.len() != scheme.iv_size() {
            return Err(Error::invalid_argument(format!(
                "{} requires a {}-byte IV, got {}",
                scheme,
                scheme.iv_size(),
                params.iv.len()
            )));
        }

        if scheme.uses_pattern() {
            if params.crypt_byte_block == 0 {
                return Err(Error::invalid_argument(format!(
                    "{} requires crypt_byte_block > 0 (typical pattern is 1:9)",
                    scheme
                )));
            }
        } else if params.crypt_byte_block != 0 || params.skip_byte_block != 0 {
            return Err(Error::invalid_argument(format!(
                "{} does not use pattern encryption; crypt/skip blocks must be 0",
                scheme
            )));
        }

        let cryptor = if scheme.uses_ctr() {
            Cryptor::Ctr(AesCtrCryptor::new(&params.key, &params.iv)?)
        } else {
            // CBC schemes never pad: cbc1 cipher spans are block-aligned
            // and cbcs leaves trailing partial blocks clear.
            Cryptor::Cbc(AesCbcEncryptor::new(
                &params.key,
                &params.iv,
                CbcPadding::NoPadding,
            )?)
        };

        Ok(Self {
            scheme,
            key_id: params.key_id,
            crypt_byte_block: if scheme.uses_pattern() {
                params.crypt_byte_block
            } else {
                0
            },
            skip_byte_block: if scheme.uses_pattern() {
                params.skip_byte_block
            } else {
                0
            },
            cryptor,
            current_iv: params.iv.clone(),
            constant_iv: scheme.uses_pattern(),
        })
    }

    pub fn scheme(&self) -> ProtectionScheme {
        self.scheme
    }

    pub fn key_id(&self) -> &[u8; 16] {
        &self.key_id
    }

    pub fn crypt_byte_block(&self) -> u8 {
        self.crypt_byte_block
    }

    pub fn skip_byte_block(&self) -> u8 {
        self.skip_byte_block
    }

    /// The constant IV recorded in `tenc` for pattern schemes.
    pub fn constant_iv(&self) -> Option<&[u8]> {
        self.constant_iv.then_some(self.current_iv.as_slice())
    }

    /// Encrypt one converted sample in place.
    ///
    /// `nalus` is the converter's clear-leader plan; an empty plan treats
    /// the whole payload as a single full-cipher subsample. A caller
    /// supplied `iv_override` replaces the derived IV for this sample
    /// only.
    pub fn encrypt_sample(
        &mut self,
        data: &mut [u8],
        nalus: &[NaluSpan],
        iv_override: Option<&[u8]>,
    ) -> Result<DecryptConfig> {
        let sample_iv = match iv_override {
            Some(iv) => {
                if iv.len() != self.scheme.iv_size() {
                    return Err(Error::invalid_argument(format!(
                        "per-sample IV override must be {} bytes",
                        self.scheme.iv_size()
                    )));
                }
                iv.to_vec()
            }
            None => self.current_iv.clone(),
        };
        self.set_cryptor_iv(&sample_iv)?;

        let subsamples = build_subsample_plan(data.len(), nalus, self.scheme)?;
        assert_invariant!(
            subsamples
                .iter()
                .map(|s| s.clear_bytes as u64 + s.cipher_bytes as u64)
                .sum::<u64>()
                == data.len() as u64,
            "subsample bytes must cover the sample exactly",
            "crypto::sample::encrypt_sample"
        );

        let mut pos = 0usize;
        let mut cipher_total = 0u64;
        for entry in &subsamples {
            pos += entry.clear_bytes as usize;
            let span = entry.cipher_bytes as usize;
            if span > 0 {
                self.encrypt_span(&mut data[pos..pos + span], &sample_iv)?;
                cipher_total += span as u64;
            }
            pos += span;
        }

        if !self.constant_iv && iv_override.is_none() {
            self.advance_iv(cipher_total);
        }

        Ok(DecryptConfig {
            key_id: self.key_id,
            iv: sample_iv,
            subsamples,
            protection_scheme: self.scheme,
            crypt_byte_block: self.crypt_byte_block,
            skip_byte_block: self.skip_byte_block,
        })
    }

    fn set_cryptor_iv(&mut self, iv: &[u8]) -> Result<()> {
        match &mut self.cryptor {
            Cryptor::Ctr(c) => c.set_iv(iv),
            Cryptor::Cbc(c) => c.set_iv(iv),
        }
    }

    fn encrypt_span(&mut self, span: &mut [u8], sample_iv: &[u8]) -> Result<()> {
        if !self.scheme.uses_pattern() {
            match &mut self.cryptor {
                Cryptor::Ctr(c) => c.crypt_in_place(span),
                Cryptor::Cbc(c) => {
                    assert_invariant!(
                        span.len() % AES_BLOCK_SIZE == 0,
                        "cbc1 cipher spans must be block aligned",
                        "crypto::sample::encrypt_span"
                    );
                    let encrypted = c.encrypt(span);
                    span.copy_from_slice(&encrypted);
                }
            }
            return Ok(());
        }

        // Pattern encryption: crypt_byte_block encrypted blocks, then
        // skip_byte_block skipped ones, repeating. A trailing partial
        // block is never encrypted. CBC chaining restarts from the
        // constant IV at each subsample.
        if let Cryptor::Cbc(c) = &mut self.cryptor {
            c.set_iv(sample_iv)?;
        }

        let crypt_run = self.crypt_byte_block as usize * AES_BLOCK_SIZE;
        let skip_run = self.skip_byte_block as usize * AES_BLOCK_SIZE;
        let mut pos = 0usize;
        while pos + AES_BLOCK_SIZE <= span.len() {
            let full_blocks_left = (span.len() - pos) / AES_BLOCK_SIZE;
            let encrypt_len = crypt_run.min(full_blocks_left * AES_BLOCK_SIZE);
            match &mut self.cryptor {
                Cryptor::Ctr(c) => c.crypt_in_place(&mut span[pos..pos + encrypt_len]),
                Cryptor::Cbc(c) => {
                    let encrypted = c.encrypt(&span[pos..pos + encrypt_len]);
                    span[pos..pos + encrypt_len].copy_from_slice(&encrypted);
                }
            }
            pos += encrypt_len;
            if skip_run == 0 && encrypt_len < crypt_run {
                break;
            }
            pos += skip_run;
        }
        Ok(())
    }

    /// Derive the next sample's IV: CTR advances by the number of blocks
    /// consumed, CBC by one.
    fn advance_iv(&mut self, cipher_bytes: u64) {
        match self.scheme {
            ProtectionScheme::Cenc => {
                let blocks = cipher_bytes.div_ceil(AES_BLOCK_SIZE as u64);
                let mut iv = u64::from_be_bytes(
                    self.current_iv[..8].try_into().unwrap_or([0u8; 8]),
                );
                iv = iv.wrapping_add(blocks);
                self.current_iv = iv.to_be_bytes().to_vec();
            }
            ProtectionScheme::Cbc1 => {
                let mut low = u64::from_be_bytes(
                    self.current_iv[8..16].try_into().unwrap_or([0u8; 8]),
                );
                low = low.wrapping_add(1);
                self.current_iv[8..16].copy_from_slice(&low.to_be_bytes());
            }
            // Pattern schemes keep the constant IV.
            ProtectionScheme::Cens | ProtectionScheme::Cbcs => {}
        }
    }
}

/// Turn the converter's clear-leader plan into subsample entries.
///
/// Clear-only runs fold forward into the following entry while the
/// combined clear count fits in 16 bits; a trailing clear-only run stays
/// as its own `(clear, 0)` entry, split as needed at the u16 limit.
fn build_subsample_plan(
    sample_size: usize,
    nalus: &[NaluSpan],
    scheme: ProtectionScheme,
) -> Result<Vec<SubsampleEntry>> {
    if nalus.is_empty() {
        if sample_size > u32::MAX as usize {
            return Err(Error::invalid_argument("sample too large to encrypt"));
        }
        return Ok(vec![SubsampleEntry::new(0, sample_size as u32)]);
    }

    let mut plan: Vec<SubsampleEntry> = Vec::with_capacity(nalus.len());
    let mut pending_clear = 0usize;

    for span in nalus {
        let mut clear = span.clear_leader.min(span.size);
        let mut cipher = span.size - clear;

        // cbc1 cipher spans must be multiples of the block size; extend
        // the leader to cover the remainder.
        if scheme == ProtectionScheme::Cbc1 {
            let extra = cipher % AES_BLOCK_SIZE;
            clear += extra;
            cipher -= extra;
        }

        if cipher == 0 {
            pending_clear += clear;
            continue;
        }

        let mut total_clear = pending_clear + clear;
        pending_clear = 0;
        // Oversized clear runs become leading clear-only entries.
        while total_clear > u16::MAX as usize {
            plan.push(SubsampleEntry::new(u16::MAX, 0));
            total_clear -= u16::MAX as usize;
        }
        plan.push(SubsampleEntry::new(total_clear as u16, cipher as u32));
    }

    while pending_clear > 0 {
        let chunk = pending_clear.min(u16::MAX as usize);
        plan.push(SubsampleEntry::new(chunk as u16, 0));
        pending_clear -= chunk;
    }

    Ok(plan)
}
