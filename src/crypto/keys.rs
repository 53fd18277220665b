//! 密钥材料类型
//!
//! 本模块中的每个类型都是对字节的校验包装。
//!
//! 设计约束：
//! - 只能通过带校验的构造函数创建，长度在边界处检查一次
//! - 类型系统保证 `Salt` 不会被当作 `Dek` 传入
//! - 机密类型（IKM / DEK / base nonce）的 Debug 输出一律脱敏
//! - IKM 与 DEK 在 drop 时清零

use std::fmt;

use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::crypto::kdf::{
    self, DEK_INFO, NONCE_BASE_INFO, PASSWORD_DOMAIN_TAG, SIGNATURE_DOMAIN_TAG,
};
use crate::error::{Result, ValidationError};

/// `Ikm::from_bytes` 接受的最小长度
pub const IKM_MIN_SIZE: usize = 32;

/// 密码原始字节的最小长度
pub const PASSWORD_MIN_SIZE: usize = 8;

/// ChaCha20-Poly1305 密钥长度
pub const DEK_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce 长度
pub const NONCE_SIZE: usize = 12;

/// 新生成 salt 的长度
pub const SALT_SIZE: usize = 32;

/// 输入密钥材料（IKM）
///
/// 不落盘；drop 时清零。
pub struct Ikm {
    bytes: Zeroizing<Vec<u8>>,
}

impl Ikm {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() < IKM_MIN_SIZE {
            return Err(ValidationError::TooShort {
                what: "IKM",
                min: IKM_MIN_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// 密码 → IKM
    ///
    /// 先检查最小长度，再以密码域标签做 SHA-256 归一化。
    pub fn from_password(password: &str) -> Result<Self, ValidationError> {
        let raw = password.as_bytes();
        if raw.len() < PASSWORD_MIN_SIZE {
            return Err(ValidationError::PasswordTooShort {
                min: PASSWORD_MIN_SIZE,
            });
        }
        let normalized = Zeroizing::new(kdf::normalize(PASSWORD_DOMAIN_TAG, raw));
        Self::from_bytes(normalized.as_slice())
    }

    /// 钱包签名（`0x` 前缀 hex）→ IKM
    ///
    /// 使用与密码不同的域标签，两条路径的 IKM 不会碰撞。
    pub fn from_signature(signature: &str) -> Result<Self, ValidationError> {
        let digits = signature
            .strip_prefix("0x")
            .filter(|d| !d.is_empty())
            .ok_or(ValidationError::InvalidSignatureHex)?;
        let raw = Zeroizing::new(
            hex::decode(digits).map_err(|_| ValidationError::InvalidSignatureHex)?,
        );
        let normalized = Zeroizing::new(kdf::normalize(SIGNATURE_DOMAIN_TAG, &raw));
        Self::from_bytes(normalized.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Ikm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ikm").field("bytes", &"[REDACTED]").finish()
    }
}

/// 每个文件一份的 salt，非机密，长度不限。
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// 从系统 RNG 取 `SALT_SIZE` 字节
    pub fn random() -> Self {
        let mut bytes = vec![0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(&self.0))
    }
}

/// HKDF info 标签；DEK 与 base nonce 各用一个固定值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info(&'static [u8]);

impl Info {
    pub const DEK: Info = Info(DEK_INFO);
    pub const NONCE_BASE: Info = Info(NONCE_BASE_INFO);

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0
    }
}

/// 数据加密密钥（DEK）：单个文件的 ChaCha20-Poly1305 密钥
#[derive(Clone)]
pub struct Dek {
    bytes: Zeroizing<[u8; DEK_SIZE]>,
}

impl Dek {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let array: [u8; DEK_SIZE] =
            bytes
                .try_into()
                .map_err(|_| ValidationError::WrongLength {
                    what: "DEK",
                    expected: DEK_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self {
            bytes: Zeroizing::new(array),
        })
    }

    /// `HKDF(ikm, salt, Info::DEK)`
    pub fn derive(ikm: &Ikm, salt: &Salt) -> Result<Self> {
        let okm = Zeroizing::new(kdf::hkdf_sha256::<DEK_SIZE>(
            ikm.as_bytes(),
            salt.as_bytes(),
            Info::DEK.as_bytes(),
        )?);
        Ok(Self::from_bytes(okm.as_slice())?)
    }

    pub fn as_bytes(&self) -> &[u8; DEK_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for Dek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dek").field("bytes", &"[REDACTED]").finish()
    }
}

/// 单个 chunk 的 nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let array = bytes
            .try_into()
            .map_err(|_| ValidationError::WrongLength {
                what: "nonce",
                expected: NONCE_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// 每个文件的 base nonce，负责把 chunk 序号映射为该 chunk 的 nonce。
#[derive(Clone, PartialEq, Eq)]
pub struct BaseNonce([u8; NONCE_SIZE]);

impl BaseNonce {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        Nonce::from_bytes(bytes)
            .map(|n| Self(n.0))
            .map_err(|_| ValidationError::WrongLength {
                what: "base nonce",
                expected: NONCE_SIZE,
                actual: bytes.len(),
            })
    }

    /// `HKDF(ikm, salt, Info::NONCE_BASE)`
    pub fn derive(ikm: &Ikm, salt: &Salt) -> Result<Self> {
        let okm = kdf::hkdf_sha256::<NONCE_SIZE>(
            ikm.as_bytes(),
            salt.as_bytes(),
            Info::NONCE_BASE.as_bytes(),
        )?;
        Ok(Self(okm))
    }

    /// 第 `chunk_index` 个 chunk 的 nonce
    ///
    /// 末 8 字节与大端序号异或；同一 base 下不同序号必得不同 nonce。
    /// 结果恒为 12 字节，因此不再经过 `Nonce::from_bytes` 校验。
    pub fn nonce(&self, chunk_index: u64) -> Nonce {
        let mut nonce = self.0;
        let counter = chunk_index.to_be_bytes();
        for (byte, c) in nonce[NONCE_SIZE - 8..].iter_mut().zip(counter) {
            *byte ^= c;
        }
        Nonce(nonce)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for BaseNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseNonce")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// 附加认证数据（AAD）。当前 chunk 加解密均传 `Aad::empty()`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aad(Vec<u8>);

impl Aad {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ikm() -> Ikm {
        Ikm::from_password("correct horse battery").unwrap()
    }

    #[test]
    fn ikm_rejects_short_input() {
        let err = Ikm::from_bytes(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooShort {
                what: "IKM",
                min: 32,
                actual: 31
            }
        );
        assert!(Ikm::from_bytes(&[0u8; 64]).is_ok());
    }

    #[test]
    fn password_must_be_eight_bytes() {
        assert!(matches!(
            Ikm::from_password("1234567"),
            Err(ValidationError::PasswordTooShort { min: 8 })
        ));
        assert_eq!(Ikm::from_password("12345678").unwrap().as_bytes().len(), 32);
    }

    #[test]
    fn signature_requires_prefixed_hex() {
        for bad in ["deadbeef", "0x", "0xzz", "0xabc"] {
            assert_eq!(
                Ikm::from_signature(bad).unwrap_err(),
                ValidationError::InvalidSignatureHex,
                "{bad}"
            );
        }
        assert!(Ikm::from_signature("0xdeadbeef").is_ok());
    }

    #[test]
    fn password_and_signature_ikm_never_collide() {
        // "0x3132333435363738" 解码后正是 "12345678" 的字节
        let from_password = Ikm::from_password("12345678").unwrap();
        let from_signature = Ikm::from_signature("0x3132333435363738").unwrap();
        assert_ne!(from_password.as_bytes(), from_signature.as_bytes());
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::from_bytes(&[9u8; 32]);
        assert_eq!(
            Dek::derive(&ikm(), &salt).unwrap().as_bytes(),
            Dek::derive(&ikm(), &salt).unwrap().as_bytes()
        );
        assert_eq!(
            BaseNonce::derive(&ikm(), &salt).unwrap(),
            BaseNonce::derive(&ikm(), &salt).unwrap()
        );
    }

    #[test]
    fn derivation_depends_on_salt() {
        let a = Dek::derive(&ikm(), &Salt::from_bytes(&[1u8; 32])).unwrap();
        let b = Dek::derive(&ikm(), &Salt::from_bytes(&[2u8; 32])).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn dek_and_nonce_length_checks() {
        assert!(matches!(
            Dek::from_bytes(&[0u8; 31]),
            Err(ValidationError::WrongLength { expected: 32, actual: 31, .. })
        ));
        assert!(matches!(
            Nonce::from_bytes(&[0u8; 13]),
            Err(ValidationError::WrongLength { expected: 12, actual: 13, .. })
        ));
        assert!(matches!(
            BaseNonce::from_bytes(&[0u8; 24]),
            Err(ValidationError::WrongLength { what: "base nonce", .. })
        ));
    }

    #[test]
    fn nonce_xors_big_endian_counter_into_tail() {
        let base = BaseNonce::from_bytes(&[0u8; 12]).unwrap();
        assert_eq!(base.nonce(0).as_bytes(), &[0u8; 12]);
        assert_eq!(
            base.nonce(0x0102).as_bytes(),
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02]
        );

        let base = BaseNonce::from_bytes(&[0xffu8; 12]).unwrap();
        let nonce = base.nonce(1);
        assert_eq!(&nonce.as_bytes()[..4], &[0xff; 4]);
        assert_eq!(nonce.as_bytes()[11], 0xfe);
    }

    #[test]
    fn nonces_are_unique_per_index() {
        let base = BaseNonce::derive(&ikm(), &Salt::random()).unwrap();
        let seen: HashSet<Nonce> = (0..10_000u64).map(|i| base.nonce(i)).collect();
        assert_eq!(seen.len(), 10_000);
        assert_ne!(base.nonce(0), base.nonce(u64::MAX));
    }

    #[test]
    fn chunk_nonces_pass_nonce_validation() {
        let base = BaseNonce::derive(&ikm(), &Salt::from_bytes(&[4u8; 32])).unwrap();
        for i in [0u64, 1, 255, 1 << 40, u64::MAX] {
            let nonce = base.nonce(i);
            assert_eq!(Nonce::from_bytes(nonce.as_bytes()), Ok(nonce));
        }
    }

    #[test]
    fn info_labels_are_distinct() {
        assert_ne!(Info::DEK, Info::NONCE_BASE);
        assert_eq!(Info::DEK.as_bytes(), DEK_INFO);
    }

    #[test]
    fn random_salts_differ() {
        let a = Salt::random();
        assert_eq!(a.as_bytes().len(), SALT_SIZE);
        assert_ne!(a, Salt::random());
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let dek = Dek::from_bytes(&[0xaa; 32]).unwrap();
        assert!(!format!("{dek:?}").contains("170"));
        assert!(format!("{:?}", ikm()).contains("REDACTED"));
    }
}
