//! Common Encryption: AES primitives and the per-sample encryption
//! pipeline.

pub mod aes;
pub mod sample;

pub use aes::{AesCbcDecryptor, AesCbcEncryptor, AesCtrCryptor, CbcPadding, AES_BLOCK_SIZE};
pub use sample::{DecryptConfig, SampleEncryptor, SubsampleEntry};
