//! 密钥派生基础函数（均基于 SHA-256）
//!
//! - `normalize`：`SHA-256(domain_tag || raw)`，原始秘密成为 IKM 之前都要经过它，
//!   不同来源使用不同域标签，互不碰撞
//! - `hkdf_sha256`：使用固定 info 标签的 HKDF extract-and-expand

use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// 归一化哈希的输出长度
pub const NORMALIZED_LEN: usize = 32;

/// 密码来源 IKM 的域标签
pub const PASSWORD_DOMAIN_TAG: &[u8] = b"shf-ikm-password-v1";

/// 钱包签名来源 IKM 的域标签
pub const SIGNATURE_DOMAIN_TAG: &[u8] = b"shf-ikm-signature-v1";

/// DEK 的 HKDF info 标签
pub const DEK_INFO: &[u8] = b"shf-v1-dek-chacha20";

/// base nonce 的 HKDF info 标签
pub const NONCE_BASE_INFO: &[u8] = b"shf-v1-nonce-base-96";

/// 将 `domain_tag || raw` 哈希为定长值
pub fn normalize(domain_tag: &[u8], raw: &[u8]) -> [u8; NORMALIZED_LEN] {
    Sha256::new()
        .chain_update(domain_tag)
        .chain_update(raw)
        .finalize()
        .into()
}

/// HKDF-SHA256 派生 `N` 字节
pub fn hkdf_sha256<const N: usize>(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; N]> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hkdf.expand(info, &mut okm)
        .map_err(|_| Error::Internal("HKDF output length"))?;
    Ok(okm)
}
