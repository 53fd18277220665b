//! 密钥来源解析
//!
//! 职责范围：
//! - 将密码或钱包签名转换为 IKM
//! - 为新文件生成随机 salt，派生 DEK 与 base nonce，并给出记录还原方式的 Header
//!
//! 签名来源的 IKM 绑定到单个文件与单个账户：钱包签名的消息中包含
//! 文件的 BLAKE2s-256 哈希与签名地址。

use blake2::{Blake2s256, Digest};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::crypto::keys::{BaseNonce, Dek, Ikm, Salt};
use crate::error::{Result, ValidationError};
use crate::format::header::{EncryptionHeader, IkmMethod};
use crate::io::ByteSource;

/// 外部钱包：以指定账户对给定消息签名
pub trait MessageSigner: Send + Sync {
    /// 返回 `0x` 前缀的 hex 签名；失败时返回 `Error::Signer`。
    fn sign_message<'a>(&'a self, account: &'a str, message: &'a str)
    -> BoxFuture<'a, Result<String>>;
}

pub enum KeySource<'a> {
    Password {
        password: SecretString,
    },
    Signature {
        signer: &'a dyn MessageSigner,
        account: String,
        /// 待签名的原文，必须以 `0x` hex 形式包含 `challenge`
        message: String,
        /// 签名所绑定的文件哈希
        challenge: [u8; 32],
    },
}

impl KeySource<'_> {
    pub fn method(&self) -> IkmMethod {
        match self {
            Self::Password { .. } => IkmMethod::Password,
            Self::Signature { .. } => IkmMethod::Signature,
        }
    }

    /// 得到归一化后的 IKM；签名来源需要等待钱包返回。
    pub async fn resolve_ikm(&self) -> Result<Ikm> {
        match self {
            Self::Password { password } => Ok(Ikm::from_password(password.expose_secret())?),
            Self::Signature {
                signer,
                account,
                message,
                challenge,
            } => {
                if !message.contains(&format!("0x{}", hex::encode(challenge))) {
                    return Err(ValidationError::UnboundChallenge.into());
                }
                debug!(account = %account, "requesting signature");
                let signature = signer.sign_message(account, message).await?;
                Ok(Ikm::from_signature(&signature)?)
            }
        }
    }
}

/// 一个新加密文件的密钥与 Header
#[derive(Debug)]
pub struct GeneratedKey {
    pub dek: Dek,
    pub base_nonce: BaseNonce,
    pub header: EncryptionHeader,
}

/// 解析 `source` 得到 IKM，生成随机 salt 并派生密钥
pub async fn generate_encryption_key(source: KeySource<'_>) -> Result<GeneratedKey> {
    let ikm = source.resolve_ikm().await?;
    let salt = Salt::random();
    let dek = Dek::derive(&ikm, &salt)?;
    let base_nonce = BaseNonce::derive(&ikm, &salt)?;

    Ok(GeneratedKey {
        dek,
        base_nonce,
        header: EncryptionHeader::new(source.method(), salt),
    })
}

/// 对一次性输入流计算 BLAKE2s-256
pub async fn file_hash<R: ByteSource>(source: &mut R) -> Result<[u8; 32]> {
    let mut hasher = Blake2s256::new();
    while let Some(segment) = source.read().await? {
        hasher.update(&segment);
    }
    Ok(hasher.finalize().into())
}

/// 钱包签名消息中的各字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub app: String,
    pub purpose: String,
    pub version: u32,
    pub domain: String,
    pub chain_id: u64,
    pub address: String,
}

/// 生成确定性的、可读的签名消息，把文件哈希绑定到账户
pub fn signing_message(ctx: &SigningContext, file_hash: &[u8; 32]) -> String {
    format!(
        "{app}\n\
         Purpose: {purpose}\n\
         Version: {version}\n\
         Domain: {domain}\n\
         Chain ID: {chain_id}\n\
         Address: {address}\n\
         File hash: 0x{hash}",
        app = ctx.app,
        purpose = ctx.purpose,
        version = ctx.version,
        domain = ctx.domain,
        chain_id = ctx.chain_id,
        address = ctx.address,
        hash = hex::encode(file_hash),
    )
}
