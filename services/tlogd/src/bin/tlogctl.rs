//! tlogctl - operator tool for tlogd

use std::path::PathBuf;
use std::time::Duration;

use aggregator::LogApi;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tlog::{Ed25519Signer, LogSigner};

use tlogd::client::HttpLogClient;
use tlogd::wire::SthDto;

#[derive(Parser)]
#[command(name = "tlogctl")]
#[command(about = "Transparency log operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a signing key and print its public key
    Keygen {
        /// File to write the hex seed to
        path: PathBuf,
    },

    /// Print a log's signed tree head
    Sth {
        #[arg(long, env = "TLOG_URL")]
        url: String,
    },

    /// Append key=value pairs to a log
    Submit {
        #[arg(long, env = "TLOG_URL")]
        url: String,

        #[arg(long, env = "TLOGD_SUBMIT_SECRET")]
        secret: String,

        /// Items as key=value
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Ask a daemon for the agreed output of an input hash
    Decide {
        #[arg(long, env = "TLOG_URL")]
        url: String,

        input_hash: String,
    },
}

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { path } => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            let signer = Ed25519Signer::generate();
            std::fs::write(&path, signer.seed_hex())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", hex::encode(signer.public_key()));
        }

        Commands::Sth { url } => {
            let sth = HttpLogClient::new(url, TIMEOUT)?.get_sth().await?;
            println!("{}", serde_json::to_string_pretty(&SthDto::from(&sth))?);
        }

        Commands::Submit { url, secret, items } => {
            let pairs = items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) if !k.is_empty() => Ok((k.as_bytes().to_vec(), v.as_bytes().to_vec())),
                    _ => bail!("expected key=value, got {item}"),
                })
                .collect::<Result<Vec<_>>>()?;
            let client = HttpLogClient::new(url, TIMEOUT)?.with_submit_secret(Some(secret));
            let sth = client.submit(pairs).await?;
            println!("{}", serde_json::to_string_pretty(&SthDto::from(&sth))?);
        }

        Commands::Decide { url, input_hash } => {
            let resp = reqwest::Client::builder()
                .timeout(TIMEOUT)
                .build()?
                .get(format!("{}/decide/{}", url.trim_end_matches('/'), input_hash))
                .send()
                .await?;
            let status = resp.status();
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                bail!("no decision ({status})");
            }
        }
    }

    Ok(())
}
