//! arkv: encrypted document archive CLI
//!
//! Commands:
//!   wallet address               - print the wallet's ledger address
//!   key archive / key file       - print a derived key as hex
//!   encrypt <input>              - encrypt a file into a data record (+ optional metadata record)
//!   decrypt <input> --tags PATH  - re-derive the file key from a tag set and decrypt
//!   config show                  - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use arkv_core::config::{default_config_path, expand_tilde};
use arkv_core::{ArkvConfig, ArkvResult, DocumentMetadata};
use arkv_crypto::{
    decrypt_metadata, encrypt_metadata, ArchiveId, FileId, RecordKind, RecordTags, Session, Tag,
    WalletKey,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "arkv",
    version,
    about = "Encrypted document archive client",
    long_about = "arkv: derive wallet-rooted keys and encrypt/decrypt archive records"
)]
struct Cli {
    /// Path to config.toml (default: ~/.config/arkv/config.toml)
    #[arg(long, short = 'c', env = "ARKV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides config)
    #[arg(long, env = "ARKV_LOG")]
    log: Option<String>,

    /// Log output format (overrides config)
    #[arg(long, env = "ARKV_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Wallet key file, JWK JSON or PEM (overrides config key_file)
    #[arg(long, short = 'w', env = "ARKV_WALLET", global = true)]
    wallet: Option<PathBuf>,

    /// Archive password; prompted for when not given
    #[arg(long, env = "ARKV_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wallet inspection
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Print derived keys (debug aid; output is secret)
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Encrypt a file into a data record
    Encrypt {
        /// File to encrypt
        input: PathBuf,

        /// Archive to file the document under (default: a new archive)
        #[arg(long)]
        archive_id: Option<ArchiveId>,

        /// Ciphertext output path (default: <input>.enc, or inside records.output_dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// JSON file with document metadata to store as an encrypted metadata record
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Decrypt a record using its tag set
    Decrypt {
        /// Encrypted record body
        input: PathBuf,

        /// Tag set written alongside the record (<record>.tags.json)
        #[arg(long)]
        tags: PathBuf,

        /// Plaintext output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    /// Print the address derived from the wallet's public modulus
    Address,
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Archive key for an archive id
    Archive {
        #[arg(long)]
        archive_id: ArchiveId,
    },
    /// File key for a file id within an archive
    File {
        #[arg(long)]
        archive_id: ArchiveId,
        #[arg(long)]
        file_id: FileId,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.logging.format, true)
            .map_err(|e| anyhow::anyhow!("invalid logging.format in config: {e}"))?,
    };
    init_logging(&level, format);

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Wallet { action: WalletAction::Address } => {
            let wallet = load_wallet(cli.wallet.as_deref(), &config).await?;
            println!("{}", wallet.address());
            Ok(())
        }
        Commands::Key { action } => {
            let session = open_session(cli.wallet.as_deref(), &config).await?;
            let secret = read_password(cli.password)?;
            cmd_key(&session, &secret, action)
        }
        Commands::Encrypt { input, archive_id, output, metadata } => {
            let session = open_session(cli.wallet.as_deref(), &config).await?;
            let secret = read_password(cli.password)?;
            let request = EncryptRequest {
                input,
                archive_id,
                output,
                metadata,
            };
            let outcome = cmd_encrypt(&config, &session, &secret, &request).await?;
            session.logout();
            outcome.print();
            Ok(())
        }
        Commands::Decrypt { input, tags, output } => {
            let session = open_session(cli.wallet.as_deref(), &config).await?;
            let secret = read_password(cli.password)?;
            let result = cmd_decrypt(&session, &secret, &input, &tags, output.as_deref()).await;
            session.logout();
            result
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries decrypted output, so logs always go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config, wallet and password loading ───────────────────────────────────────

async fn load_config(path: &Path) -> ArkvResult<ArkvConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path).await?;
        ArkvConfig::parse(&content)
    } else {
        Ok(ArkvConfig::default())
    }
}

/// Resolve the wallet path: CLI flag > config key_file
fn resolve_wallet_path(override_path: Option<&Path>, config: &ArkvConfig) -> Result<PathBuf> {
    override_path
        .map(Path::to_path_buf)
        .or_else(|| config.wallet.key_file.as_deref().map(expand_tilde))
        .context(
            "no wallet configured\n\
             Pass --wallet PATH, set ARKV_WALLET, or set [wallet] key_file in the config",
        )
}

async fn load_wallet(override_path: Option<&Path>, config: &ArkvConfig) -> Result<WalletKey> {
    let path = resolve_wallet_path(override_path, config)?;
    let text = Zeroizing::new(
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading wallet: {}", path.display()))?,
    );
    WalletKey::parse(&text).with_context(|| format!("loading wallet: {}", path.display()))
}

async fn open_session(override_path: Option<&Path>, config: &ArkvConfig) -> Result<Session> {
    let wallet = load_wallet(override_path, config).await?;
    Ok(Session::login(wallet).with_key_cache(config.crypto.cache_archive_keys))
}

fn read_password(given: Option<String>) -> Result<SecretString> {
    match given {
        Some(password) => Ok(SecretString::from(password)),
        None => rpassword::prompt_password("arkv password: ")
            .map(SecretString::from)
            .context("reading password"),
    }
}

// ── Record file layout ────────────────────────────────────────────────────────

/// `<record>.tags.json`
fn tags_path(record: &Path) -> PathBuf {
    append_extension(record, "tags.json")
}

/// `<record>.meta`
fn metadata_path(record: &Path) -> PathBuf {
    append_extension(record, "meta")
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Ciphertext path: CLI flag > records.output_dir/<name>.enc > <input>.enc
fn resolve_output_path(input: &Path, output: Option<&Path>, config: &ArkvConfig) -> PathBuf {
    if let Some(p) = output {
        return p.to_path_buf();
    }
    let encrypted = append_extension(input, "enc");
    match (&config.records.output_dir, encrypted.file_name()) {
        (Some(dir), Some(name)) => expand_tilde(dir).join(name),
        _ => encrypted,
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

async fn write_tags(path: &Path, tags: &RecordTags) -> Result<()> {
    let json = serde_json::to_vec_pretty(&tags.to_tags()).context("serializing tags")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing tags: {}", path.display()))
}

async fn read_tags(path: &Path) -> Result<RecordTags> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading tags: {}", path.display()))?;
    let tags: Vec<Tag> = serde_json::from_slice(&content)
        .with_context(|| format!("parsing tags: {}", path.display()))?;
    RecordTags::from_tags(&tags).with_context(|| format!("invalid tag set: {}", path.display()))
}

// ── `arkv key` ────────────────────────────────────────────────────────────────

fn cmd_key(session: &Session, secret: &SecretString, action: KeyAction) -> Result<()> {
    let key_hex = match action {
        KeyAction::Archive { archive_id } => {
            let key = session
                .archive_key(&archive_id, secret)
                .context("deriving archive key")?;
            Zeroizing::new(hex::encode(key.as_bytes()))
        }
        KeyAction::File { archive_id, file_id } => {
            let key = session
                .file_key(&archive_id, &file_id, secret)
                .context("deriving file key")?;
            Zeroizing::new(hex::encode(key.as_bytes()))
        }
    };
    println!("{}", key_hex.as_str());
    Ok(())
}

// ── `arkv encrypt` ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct EncryptRequest {
    input: PathBuf,
    archive_id: Option<ArchiveId>,
    output: Option<PathBuf>,
    metadata: Option<PathBuf>,
}

#[derive(Debug)]
struct EncryptOutcome {
    archive_id: ArchiveId,
    file_id: FileId,
    record: PathBuf,
    tags: PathBuf,
    metadata: Option<(PathBuf, PathBuf)>,
}

impl EncryptOutcome {
    fn print(&self) {
        println!("archive-id: {}", self.archive_id);
        println!("file-id:    {}", self.file_id);
        println!("record:     {}", self.record.display());
        println!("tags:       {}", self.tags.display());
        if let Some((record, tags)) = &self.metadata {
            println!("metadata:   {}", record.display());
            println!("meta-tags:  {}", tags.display());
        }
    }
}

async fn cmd_encrypt(
    config: &ArkvConfig,
    session: &Session,
    secret: &SecretString,
    request: &EncryptRequest,
) -> Result<EncryptOutcome> {
    let input = &request.input;
    let plaintext = Zeroizing::new(
        tokio::fs::read(input)
            .await
            .with_context(|| format!("reading input: {}", input.display()))?,
    );
    // Nothing is written until the metadata has parsed and both records are encrypted
    let metadata = match &request.metadata {
        Some(meta_input) => Some(read_metadata(meta_input).await?),
        None => None,
    };

    let archive_id = request.archive_id.unwrap_or_else(ArchiveId::new_v4);
    let file_id = FileId::new_v4();
    let file_key = session
        .file_key(&archive_id, &file_id, secret)
        .context("deriving file key")?;

    let payload = arkv_crypto::encrypt(&file_key, &plaintext).context("encrypting input")?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let data_tags = RecordTags::data(&payload, archive_id, file_id, file_name);
    let record = resolve_output_path(input, request.output.as_deref(), config);

    let meta_record = match metadata {
        Some(mut meta) => {
            let content_type = content_type_for(input);
            let data_ref = record
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            meta.attach_to_record(file_id, plaintext.len() as u64, content_type, data_ref);

            let meta_payload =
                encrypt_metadata(&file_key, &meta).context("encrypting metadata")?;
            let meta_tags = RecordTags::metadata(&meta_payload, archive_id, file_id, content_type);
            Some((meta_payload, meta_tags))
        }
        None => None,
    };

    if let Some(parent) = record.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating output dir: {}", parent.display()))?;
    }
    tokio::fs::write(&record, payload.data())
        .await
        .with_context(|| format!("writing record: {}", record.display()))?;
    let tags = tags_path(&record);
    write_tags(&tags, &data_tags).await?;

    tracing::info!(
        %archive_id,
        %file_id,
        size = plaintext.len(),
        record = %record.display(),
        "encrypted data record"
    );

    let metadata = match meta_record {
        Some((meta_payload, meta_tags)) => {
            let meta_path = metadata_path(&record);
            tokio::fs::write(&meta_path, meta_payload.data())
                .await
                .with_context(|| format!("writing metadata record: {}", meta_path.display()))?;
            let meta_tags_path = tags_path(&meta_path);
            write_tags(&meta_tags_path, &meta_tags).await?;

            tracing::info!(%file_id, record = %meta_path.display(), "encrypted metadata record");
            Some((meta_path, meta_tags_path))
        }
        None => None,
    };

    Ok(EncryptOutcome {
        archive_id,
        file_id,
        record,
        tags,
        metadata,
    })
}

async fn read_metadata(path: &Path) -> Result<DocumentMetadata> {
    let json = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading metadata: {}", path.display()))?;
    serde_json::from_slice(&json).with_context(|| format!("parsing metadata: {}", path.display()))
}

// ── `arkv decrypt` ────────────────────────────────────────────────────────────

/// Decrypt a record body. Data records yield the original bytes; metadata
/// records yield pretty-printed JSON.
async fn decrypt_record(
    session: &Session,
    secret: &SecretString,
    input: &Path,
    tags_file: &Path,
) -> ArkvResult<Zeroizing<Vec<u8>>> {
    let tags = read_tags(tags_file).await?;
    let body = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading record: {}", input.display()))?;

    let file_key = session.file_key(&tags.archive_id, &tags.file_id, secret)?;

    let plaintext = match tags.kind {
        RecordKind::Data => tags.decrypt(&file_key, &body)?,
        RecordKind::Meta => {
            let meta: DocumentMetadata = decrypt_metadata(&tags.cipher_iv, &file_key, &body)?;
            serde_json::to_vec_pretty(&meta).context("rendering metadata")?
        }
    };

    tracing::debug!(
        archive_id = %tags.archive_id,
        file_id = %tags.file_id,
        kind = tags.kind.as_str(),
        "decrypted record"
    );
    Ok(Zeroizing::new(plaintext))
}

async fn cmd_decrypt(
    session: &Session,
    secret: &SecretString,
    input: &Path,
    tags_file: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let plaintext = match decrypt_record(session, secret, input, tags_file).await {
        Ok(plaintext) => plaintext,
        Err(e) if e.is_integrity() => {
            return Err(anyhow::Error::new(e).context(format!(
                "{} does not authenticate: check the password and that {} is its tag set",
                input.display(),
                tags_file.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };

    match output {
        Some(path) => tokio::fs::write(path, plaintext.as_slice())
            .await
            .with_context(|| format!("writing output: {}", path.display())),
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&plaintext).await.context("writing to stdout")?;
            stdout.flush().await.context("flushing stdout")
        }
    }
}

// ── `arkv config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &ArkvConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
