//! ChaCha20-Poly1305 chunk 加解密
//!
//! - `seal` 输出 `ciphertext || tag`，长度恰为 `plaintext.len() + TAG_SIZE`
//! - `open` 只有在 tag 校验通过后才返回明文

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce as CipherNonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::crypto::keys::{Aad, Dek, Nonce};

/// Poly1305 认证标签长度
pub const TAG_SIZE: usize = 16;

/// 加密单个 chunk
pub fn seal(
    dek: &Dek,
    nonce: &Nonce,
    plaintext: &[u8],
    aad: &Aad,
) -> Result<Vec<u8>, chacha20poly1305::Error> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(dek.as_bytes()));
    cipher.encrypt(
        CipherNonce::from_slice(nonce.as_bytes()),
        Payload {
            msg: plaintext,
            aad: aad.as_bytes(),
        },
    )
}

/// 解密并校验单个 chunk
pub fn open(
    dek: &Dek,
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &Aad,
) -> Result<Vec<u8>, chacha20poly1305::Error> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(dek.as_bytes()));
    cipher.decrypt(
        CipherNonce::from_slice(nonce.as_bytes()),
        Payload {
            msg: ciphertext,
            aad: aad.as_bytes(),
        },
    )
}
