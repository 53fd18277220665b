//! shf 命令行入口
//!
//! 用法：
//!   shf encrypt <input> <output> [--chunk-size BYTES]
//!   shf decrypt <input> <output> [--chunk-size BYTES]
//!   shf inspect <input>
//!
//! 设计原则：
//! - 密码从终端读取，不出现在参数中
//! - 输出经临时文件写入，整个流处理成功后才出现在目标路径
//! - 实际逻辑全部委托给 shf_engine

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tokio::fs::File;
use tracing::{debug, info};

use shf_engine::{
    AtomicFileSink, DEFAULT_CHUNK_SIZE, DecryptOptions, EncryptOptions, IkmMethod, Ikm,
    KeySource, ReaderSource, decrypt_file, encrypt_file, generate_encryption_key, peek_header,
};

#[derive(Parser, Debug)]
#[command(name = "shf", version, about = "Streaming chunked file encryption")]
struct Cli {
    /// 日志级别（trace / debug / info / warn / error），RUST_LOG 优先
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 使用密码加密文件
    Encrypt {
        input: PathBuf,
        output: PathBuf,
        /// 每个 chunk 的明文字节数
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// 解密使用密码加密的文件
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        /// 必须与加密时的 chunk 大小一致
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// 打印加密文件的 Header
    Inspect { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match cli.command {
        Command::Encrypt {
            input,
            output,
            chunk_size,
        } => encrypt(&input, &output, chunk_size).await,
        Command::Decrypt {
            input,
            output,
            chunk_size,
        } => decrypt(&input, &output, chunk_size).await,
        Command::Inspect { input } => inspect(&input).await,
    }
}

async fn encrypt(input: &Path, output: &Path, chunk_size: usize) -> Result<()> {
    let password = prompt("Password: ")?;
    let confirm = prompt("Confirm password: ")?;
    if password.expose_secret() != confirm.expose_secret() {
        bail!("passwords do not match");
    }

    let generated = generate_encryption_key(KeySource::Password { password }).await?;

    let mut source = ReaderSource::new(open(input).await?);
    let mut sink = AtomicFileSink::create(output)
        .await
        .with_context(|| format!("creating {}", output.display()))?;

    let options = EncryptOptions::default()
        .with_chunk_size(chunk_size)
        .with_progress(|p| debug!(chunk = p.chunk_index, bytes = p.bytes_processed, "progress"));

    let summary = encrypt_file(
        &mut source,
        &mut sink,
        &generated.dek,
        &generated.base_nonce,
        &generated.header,
        options,
    )
    .await?;

    info!(
        output = %sink.target().display(),
        chunks = summary.chunks,
        bytes = summary.plaintext_bytes,
        "encrypted"
    );
    Ok(())
}

async fn decrypt(input: &Path, output: &Path, chunk_size: usize) -> Result<()> {
    let header = peek_header(&mut ReaderSource::new(open(input).await?)).await?;
    if header.ikm_method != IkmMethod::Password {
        bail!(
            "{} was encrypted with a wallet signature; decrypt it through the SDK signer",
            input.display()
        );
    }

    let password = prompt("Password: ")?;
    let ikm = Ikm::from_password(password.expose_secret())?;

    let mut source = ReaderSource::new(open(input).await?);
    let mut sink = AtomicFileSink::create(output)
        .await
        .with_context(|| format!("creating {}", output.display()))?;

    let options = DecryptOptions::default()
        .with_chunk_size(chunk_size)
        .with_progress(|p| debug!(chunk = p.chunk_index, bytes = p.bytes_processed, "progress"));

    let summary = decrypt_file(
        &mut source,
        &mut sink,
        move |_header| async move { Ok::<_, shf_engine::Error>(ikm) },
        options,
    )
    .await?;

    info!(
        output = %sink.target().display(),
        chunks = summary.chunks,
        bytes = summary.plaintext_bytes,
        "decrypted"
    );
    Ok(())
}

async fn inspect(input: &Path) -> Result<()> {
    let header = peek_header(&mut ReaderSource::new(open(input).await?)).await?;

    println!("version: {}", header.version);
    println!("ikm:     {}", header.ikm_method.as_str());
    println!("salt:    0x{}", hex::encode(header.salt.as_bytes()));
    Ok(())
}

async fn open(path: &Path) -> Result<File> {
    File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))
}

fn prompt(label: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(label).context("reading password")?;
    Ok(SecretString::from(password))
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
