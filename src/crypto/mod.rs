//! 密钥材料、密钥派生与 chunk AEAD

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::TAG_SIZE;
pub use keys::{Aad, BaseNonce, Dek, Ikm, Info, Nonce, Salt};
