//! Gateway commands: `vg keygen`, `vg encrypt`, `vg decrypt`.
//!
//! One-shot operations build the gateway directly from the resolved key and
//! the configured failure policy. There is no silent ephemeral-key fallback
//! here: a ciphertext produced under a key nobody holds is useless, so a
//! missing key is an error with remediation.

use clap::Args;
use vigil_core::config::CoreConfig;
use vigil_core::error::KeyError;
use vigil_core::gateway::{EncryptionGateway, GatewayKey};

/// Arguments for `vg encrypt`.
#[derive(Args)]
pub struct EncryptArgs {
    /// Value to encrypt
    pub value: String,

    /// Base64-encoded 32-byte key (falls back to the config file)
    #[arg(long, env = "VIGIL_ENCRYPTION_KEY", hide_env_values = true)]
    pub key: Option<String>,
}

/// Arguments for `vg decrypt`.
#[derive(Args)]
pub struct DecryptArgs {
    /// Ciphertext envelope to decrypt
    pub ciphertext: String,

    /// Base64-encoded 32-byte key (falls back to the config file)
    #[arg(long, env = "VIGIL_ENCRYPTION_KEY", hide_env_values = true)]
    pub key: Option<String>,
}

/// Generate a key and print it base64-encoded on stdout.
pub fn keygen() -> anyhow::Result<()> {
    println!("{}", GatewayKey::generate().to_base64());
    Ok(())
}

/// Build a gateway from the resolved key and the configured policy.
fn build_gateway(
    arg_key: Option<&str>,
    config: &CoreConfig,
) -> Result<EncryptionGateway, vigil_core::Error> {
    let key = match arg_key {
        Some(raw) => GatewayKey::from_base64(raw)?,
        None => config.resolved_key()?.ok_or(KeyError::Missing)?,
    };
    Ok(if config.strict_mode {
        EncryptionGateway::strict(&key)
    } else {
        EncryptionGateway::permissive(&key)
    })
}

pub fn encrypt(args: &EncryptArgs, config: &CoreConfig) -> anyhow::Result<()> {
    let gateway = build_gateway(args.key.as_deref(), config)?;
    let envelope = gateway
        .encrypt(&args.value)
        .map_err(vigil_core::Error::from)?;
    println!("{envelope}");
    Ok(())
}

pub fn decrypt(args: &DecryptArgs, config: &CoreConfig) -> anyhow::Result<()> {
    let gateway = build_gateway(args.key.as_deref(), config)?;
    let plaintext = gateway
        .decrypt(&args.ciphertext)
        .map_err(vigil_core::Error::from)?;
    println!("{plaintext}");
    Ok(())
}
