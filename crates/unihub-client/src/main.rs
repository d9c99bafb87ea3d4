//! `unihub`: inspect and edit the local Unified Hub identity.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use unihub_client::{profile, registry, ClientConfig, IdentityStore};
use unihub_shared::ChannelMode;
use unihub_store::ChannelKey;

#[derive(Parser, Debug)]
#[command(name = "unihub", version, about = "Manage the local Unified Hub identity")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the local profile.
    Identity,
    /// Complete first-run setup.
    Setup {
        #[arg(long)]
        nickname: String,
        #[arg(long, default_value = "")]
        bio: String,
    },
    /// List remembered channels.
    Channels {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Forget a remembered channel by its identity key.
    Forget {
        #[arg(value_enum)]
        mode: ModeArg,
        /// Channel uid for hosted channels, room code for joined ones.
        key: String,
    },
    /// Write the identity as a JSON document.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Apply a JSON document's profile and channels to the identity.
    Import { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Host,
    Join,
}

impl From<ModeArg> for ChannelMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Host => ChannelMode::Host,
            ModeArg::Join => ChannelMode::Join,
        }
    }
}

fn main() -> anyhow::Result<()> {
    unihub_client::init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let db = config
        .open_database()
        .context("Failed to open the identity database")?;
    info!(path = ?db.path(), "Opened identity database");
    let mut store = IdentityStore::open(db)?;

    match cli.command {
        Command::Identity => {
            let profile = store.profile();
            println!("uid:       {}", profile.uid);
            println!("nickname:  {}", profile.nickname);
            println!("bio:       {}", profile.bio);
            println!(
                "avatar:    {}",
                profile
                    .avatar
                    .as_ref()
                    .map(|bytes| format!("{} bytes", bytes.len()))
                    .unwrap_or_else(|| "none".to_string())
            );
            println!("setup:     {}", if profile.setup_complete { "complete" } else { "pending" });
            println!("channels:  {}", store.channels().len());
        }
        Command::Setup { nickname, bio } => {
            store.complete_setup(&nickname, &bio)?;
            println!("Welcome, {}.", store.profile().nickname);
        }
        Command::Channels { mode } => {
            let records = match mode {
                Some(mode) => store.channels_in_mode(mode.into()),
                None => store.channels(),
            };
            if records.is_empty() {
                println!("No remembered channels.");
            }
            for record in records {
                println!(
                    "{:<5} {:<24} {}:{:<6} code={:<12} key={}",
                    record.mode.as_str(),
                    record.name,
                    record.address,
                    record.port,
                    record.code.as_str(),
                    record.key().identity_key(),
                );
            }
        }
        Command::Forget { mode, key } => {
            let key = ChannelKey::from_parts(mode.into(), &key);
            if registry::forget(&mut store, &key)? {
                println!("Forgot {key}.");
            } else {
                anyhow::bail!("No remembered channel {key}");
            }
        }
        Command::Export { out } => {
            let json = profile::export_profile(&store)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let result = profile::import_profile(&mut store, &json)?;
            println!(
                "Imported {} with {} channel(s).",
                result.uid, result.channels_imported
            );
        }
    }

    Ok(())
}
