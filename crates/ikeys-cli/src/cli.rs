//! CLI command definitions and argument parsing

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ikeys_client::{ClientConfig, ClientError, KeyResolver, RemoteIdentity};
use ikeys_crypto::signature::{self, SignatureError};
use ikeys_crypto::{CodecError, KeyPair, PrivateKey, ProtocolVersion, PublicKey};
use serde::Serialize;
use tracing::{debug, info};

use crate::output::{render, OutputFormat};
use crate::ExitCode;

/// ikeys - signed service-to-service authentication tool
#[derive(Parser, Debug)]
#[command(name = "ikeys")]
#[command(about = "Key pairs, message signatures and directory lookups")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: text or json
    #[arg(long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Private key text, overriding INFUZU_SECRET_KEY
    #[arg(long, global = true)]
    pub private_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new key pair
    Keygen,
    /// Print the public key belonging to the configured private key
    PublicKey,
    /// Sign a message with the configured private key
    Sign(SignArgs),
    /// Verify a signature over a message
    Verify(VerifyArgs),
    /// Print the key-pair ID named by a signature
    KeyId(KeyIdArgs),
    /// Look a key pair up in the directory service
    Lookup(LookupArgs),
}

/// Where a message comes from. Neither flag set means stdin.
#[derive(clap::Args, Debug, Default)]
pub struct MessageSource {
    /// Message text
    #[arg(long, short, conflicts_with = "file")]
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl MessageSource {
    fn read(&self) -> anyhow::Result<String> {
        if let Some(message) = &self.message {
            return Ok(message.clone());
        }
        if let Some(path) = &self.file {
            return Ok(std::fs::read_to_string(path)?);
        }
        let mut message = String::new();
        std::io::stdin().read_to_string(&mut message)?;
        Ok(message)
    }
}

#[derive(clap::Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub source: MessageSource,

    /// Signature protocol version: 1.0 or 1.2
    #[arg(long = "version", default_value = "1.2")]
    pub protocol: ProtocolVersion,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub source: MessageSource,

    /// Signature envelope to check
    #[arg(long, short)]
    pub signature: String,

    /// Public key text; looked up in the directory when omitted
    #[arg(long)]
    pub public_key: Option<String>,

    /// Maximum accepted signature age in seconds
    #[arg(long)]
    pub max_skew: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct KeyIdArgs {
    /// Signature envelope
    pub signature: String,
}

#[derive(clap::Args, Debug)]
pub struct LookupArgs {
    /// Key-pair ID to resolve
    pub key_pair_id: String,
}

/// Rendered command result.
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub code: ExitCode,
}

impl CommandOutput {
    fn success(text: String) -> Self {
        Self {
            text,
            code: ExitCode::Success,
        }
    }
}

#[derive(Serialize)]
struct KeygenReport {
    key_pair_id: String,
    private_key: String,
    public_key: String,
}

#[derive(Serialize)]
struct PublicKeyReport {
    key_pair_id: String,
    public_key: String,
}

#[derive(Serialize)]
struct SignReport {
    signature: String,
    version: String,
}

#[derive(Serialize)]
struct VerifyReport {
    valid: bool,
    key_pair_id: String,
    version: String,
}

#[derive(Serialize)]
struct KeyIdReport {
    key_pair_id: String,
    version: String,
}

impl Cli {
    /// Run the command and print its output.
    pub async fn execute(self, config: ClientConfig) -> anyhow::Result<ExitCode> {
        let output = self.run(config).await?;
        println!("{}", output.text);
        Ok(output.code)
    }

    /// Run the command and return its rendered output.
    pub async fn run(self, mut config: ClientConfig) -> anyhow::Result<CommandOutput> {
        if let Some(key) = self.private_key {
            config.private_key = Some(key.into());
        }
        let format = self.output;

        match self.command {
            Commands::Keygen => keygen(format),
            Commands::PublicKey => public_key(format, &config),
            Commands::Sign(args) => sign(format, &config, &args),
            Commands::Verify(args) => verify(format, &config, &args).await,
            Commands::KeyId(args) => key_id(format, &args),
            Commands::Lookup(args) => lookup(format, &config, &args).await,
        }
    }
}

fn keygen(format: OutputFormat) -> anyhow::Result<CommandOutput> {
    let pair = KeyPair::generate();
    info!(key_id = %pair.id(), "generated key pair");
    let report = KeygenReport {
        key_pair_id: pair.id().to_string(),
        private_key: pair.private_key().to_base64()?,
        public_key: pair.public_key().to_base64(),
    };
    let text = render(format, &report, |_| pair.to_string())?;
    Ok(CommandOutput::success(text))
}

fn public_key(format: OutputFormat, config: &ClientConfig) -> anyhow::Result<CommandOutput> {
    let key = config.signing_key()?.public_key();
    let report = PublicKeyReport {
        key_pair_id: key.key_pair_id().to_string(),
        public_key: key.to_base64(),
    };
    let text = render(format, &report, |r| r.public_key.clone())?;
    Ok(CommandOutput::success(text))
}

fn sign(format: OutputFormat, config: &ClientConfig, args: &SignArgs) -> anyhow::Result<CommandOutput> {
    let key: PrivateKey = config.signing_key()?;
    let message = args.source.read()?;
    let report = SignReport {
        signature: key.sign(&message, args.protocol)?,
        version: args.protocol.to_string(),
    };
    debug!(key_id = %key.key_pair_id(), version = %args.protocol, "message signed");
    let text = render(format, &report, |r| r.signature.clone())?;
    Ok(CommandOutput::success(text))
}

async fn verify(
    format: OutputFormat,
    config: &ClientConfig,
    args: &VerifyArgs,
) -> anyhow::Result<CommandOutput> {
    let message = args.source.read()?;
    let max_skew = args.max_skew.unwrap_or(config.max_clock_skew_secs);
    let version = signature::signature_version(&args.signature)?;
    let key_pair_id = signature::extract_key_pair_id(&args.signature)?;

    let key = match &args.public_key {
        Some(text) => PublicKey::from_base64(text.trim())?,
        None => {
            let resolver = KeyResolver::from_config(config)?;
            resolver.resolve(key_pair_id.as_str()).await?.public_key()?
        }
    };

    let valid = signature::verify(&message, &args.signature, &key, max_skew)?;
    let report = VerifyReport {
        valid,
        key_pair_id: key_pair_id.to_string(),
        version: version.to_string(),
    };
    let text = render(format, &report, |r| {
        let verdict = if r.valid { "valid" } else { "invalid" };
        verdict.to_string()
    })?;
    Ok(CommandOutput {
        text,
        code: if valid {
            ExitCode::Success
        } else {
            ExitCode::VerificationFailed
        },
    })
}

fn key_id(format: OutputFormat, args: &KeyIdArgs) -> anyhow::Result<CommandOutput> {
    let report = KeyIdReport {
        key_pair_id: signature::extract_key_pair_id(&args.signature)?.to_string(),
        version: signature::signature_version(&args.signature)?.to_string(),
    };
    let text = render(format, &report, |r| r.key_pair_id.clone())?;
    Ok(CommandOutput::success(text))
}

async fn lookup(
    format: OutputFormat,
    config: &ClientConfig,
    args: &LookupArgs,
) -> anyhow::Result<CommandOutput> {
    let resolver = KeyResolver::from_config(config)?;
    let identity: RemoteIdentity = resolver.resolve(&args.key_pair_id).await?;
    let text = render(format, &identity, |i| {
        let mut lines = vec![i.to_string(), format!("Application: {}", i.application)];
        if let Some(key) = &i.public_key {
            lines.push(format!("Public Key: {key}"));
        }
        lines.join("\n")
    })?;
    Ok(CommandOutput::success(text))
}

/// Map a command failure to its exit code.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<CodecError>().is_some() || err.downcast_ref::<SignatureError>().is_some() {
        return ExitCode::InvalidInput;
    }
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Codec(_) | ClientError::Signature(_) | ClientError::MissingKeyMaterial) => {
            ExitCode::InvalidInput
        }
        _ => ExitCode::GeneralError,
    }
}
