//! SHF Header 实现
//!
//! 文件布局：
//!
//! ```text
//! MAGIC "SHF"          3 bytes
//! HEADER_LEN           u32, big-endian
//! CBOR record          HEADER_LEN bytes: {"v": 1, "ikm": "password"|"signature", "salt": bytes}
//! ```
//!
//! Header 的职责：
//! - 标识文件类型（magic）
//! - 指明版本号与 IKM 来源（password / signature）
//! - 提供密钥派生所需的 salt
//!
//! 设计约束：
//! - Header 本身不经认证，因此记录按规范形式编码（固定键序、最短整数、定长）
//! - 解码先得到无类型的 CBOR 值，逐字段校验后才信任其内容
//! - 长度超过 `MAX_HEADER_LEN` 时在解码前直接拒绝

use ciborium::value::{Integer, Value};

use crate::crypto::keys::Salt;
use crate::error::FormatError;

/// 文件魔数（ASCII）
pub const MAGIC: &[u8; 3] = b"SHF";

/// 魔数加长度前缀
pub const PREFIX_SIZE: usize = MAGIC.len() + 4;

/// 读取方接受的 CBOR 记录最大长度
pub const MAX_HEADER_LEN: usize = 64 * 1024;

/// 当前支持的版本号
pub const VERSION: u64 = 1;

const KEY_VERSION: &str = "v";
const KEY_IKM: &str = "ikm";
const KEY_SALT: &str = "salt";

/// 解密方还原 IKM 的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkmMethod {
    Password,
    Signature,
}

impl IkmMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Signature => "signature",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "password" => Some(Self::Password),
            "signature" => Some(Self::Signature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub version: u64,
    pub ikm_method: IkmMethod,
    pub salt: Salt,
}

impl EncryptionHeader {
    pub fn new(ikm_method: IkmMethod, salt: Salt) -> Self {
        Self {
            version: VERSION,
            ikm_method,
            salt,
        }
    }

    /// 序列化为 `MAGIC | HEADER_LEN | CBOR`
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let record = Value::Map(vec![
            (
                Value::Text(KEY_VERSION.into()),
                Value::Integer(Integer::from(self.version)),
            ),
            (
                Value::Text(KEY_IKM.into()),
                Value::Text(self.ikm_method.as_str().into()),
            ),
            (
                Value::Text(KEY_SALT.into()),
                Value::Bytes(self.salt.as_bytes().to_vec()),
            ),
        ]);

        let mut body = Vec::new();
        ciborium::ser::into_writer(&record, &mut body)
            .map_err(|e| FormatError::Cbor(format!("{e:?}")))?;

        if body.len() > MAX_HEADER_LEN {
            return Err(FormatError::HeaderTooLarge {
                len: body.len(),
                max: MAX_HEADER_LEN,
            });
        }

        let mut out = Vec::with_capacity(PREFIX_SIZE + body.len());
        out.extend_from_slice(MAGIC);
        // 上面已按 MAX_HEADER_LEN 限制
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// 为新加密文件编码 Header
pub fn create_encryption_header(header: &EncryptionHeader) -> Result<Vec<u8>, FormatError> {
    header.encode()
}

/// 校验 7 字节前缀并返回声明的记录长度
///
/// 超过 `MAX_HEADER_LEN` 的长度在读取后续内容之前即被拒绝。
pub fn parse_prefix(buf: &[u8]) -> Result<usize, FormatError> {
    if buf.len() < PREFIX_SIZE {
        return Err(FormatError::TooShort(buf.len()));
    }
    if &buf[..MAGIC.len()] != MAGIC {
        return Err(FormatError::InvalidMagic);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&buf[MAGIC.len()..PREFIX_SIZE]);
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_HEADER_LEN {
        return Err(FormatError::HeaderTooLarge {
            len,
            max: MAX_HEADER_LEN,
        });
    }
    Ok(len)
}

/// 从 `buf` 开头解析 Header
///
/// 返回 Header 及其占用的字节数，密文 chunk 从该偏移开始。
pub fn read_encryption_header(buf: &[u8]) -> Result<(EncryptionHeader, usize), FormatError> {
    let len = parse_prefix(buf)?;
    let available = buf.len() - PREFIX_SIZE;
    if len > available {
        return Err(FormatError::LengthOutOfBounds { len, available });
    }

    let header = decode_record(&buf[PREFIX_SIZE..PREFIX_SIZE + len])?;
    Ok((header, PREFIX_SIZE + len))
}

fn decode_record(bytes: &[u8]) -> Result<EncryptionHeader, FormatError> {
    let mut reader = bytes;
    let value: Value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| FormatError::Cbor(format!("{e:?}")))?;
    if !reader.is_empty() {
        return Err(FormatError::Shape("trailing bytes after record"));
    }

    let Value::Map(entries) = value else {
        return Err(FormatError::Shape("record is not a map"));
    };

    let mut version = None;
    let mut ikm_method = None;
    let mut salt = None;

    for (key, value) in entries {
        let Value::Text(key) = key else {
            return Err(FormatError::Shape("non-text key"));
        };
        match key.as_str() {
            KEY_VERSION => {
                let Value::Integer(v) = value else {
                    return Err(FormatError::Shape("version is not an integer"));
                };
                let v = u64::try_from(v)
                    .map_err(|_| FormatError::Shape("version is negative"))?;
                set_once(&mut version, v)?;
            }
            KEY_IKM => {
                let Value::Text(m) = value else {
                    return Err(FormatError::Shape("ikm method is not a string"));
                };
                let m = IkmMethod::parse(&m)
                    .ok_or(FormatError::Shape("unknown ikm method"))?;
                set_once(&mut ikm_method, m)?;
            }
            KEY_SALT => {
                let Value::Bytes(s) = value else {
                    return Err(FormatError::Shape("salt is not a byte string"));
                };
                set_once(&mut salt, Salt::from_bytes(&s))?;
            }
            _ => return Err(FormatError::Shape("unknown field")),
        }
    }

    let version = version.ok_or(FormatError::Shape("missing version"))?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    Ok(EncryptionHeader {
        version,
        ikm_method: ikm_method.ok_or(FormatError::Shape("missing ikm method"))?,
        salt: salt.ok_or(FormatError::Shape("missing salt"))?,
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<(), FormatError> {
    if slot.replace(value).is_some() {
        return Err(FormatError::Shape("duplicate field"));
    }
    Ok(())
}
