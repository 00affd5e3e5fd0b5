//! Sealroom command-line tools.
//!
//! # Usage
//!
//! ```bash
//! # Create (on first use) and print the identity public key of `alice`
//! sealroom identity --key-db alice.redb --participant alice
//!
//! # Run an in-memory conversation between four participants
//! sealroom --log-level debug demo --participants 4 --message "hello"
//! ```

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use sealroom_core::{
    ConversationProtocol, IdentityKeyStore, ParticipantId, ProtocolConfig, config,
};
use sealroom_store::{
    MemoryKeyDirectory, MemoryMessageStore, MemorySecureStore, RedbSecureStore, SystemEnv,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealroom end-to-end encrypted group messaging
#[derive(Parser, Debug)]
#[command(name = "sealroom")]
#[command(about = "Sealroom end-to-end encrypted group messaging tools")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Prefix of secure-store labels
    #[arg(long, default_value = config::DEFAULT_KEY_LABEL_PREFIX, global = true)]
    key_label_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the identity public key, creating the identity on first use
    Identity {
        /// Path to the key database
        #[arg(long)]
        key_db: PathBuf,

        /// Participant identifier owning the key
        #[arg(long)]
        participant: String,
    },

    /// Run a start/send/receive round between in-memory participants
    Demo {
        /// Number of participants, initiator included
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..))]
        participants: u16,

        /// Message the initiator sends
        #[arg(long, default_value = "hello, room")]
        message: String,

        /// Maximum plaintext bytes per message
        #[arg(long, default_value_t = config::DEFAULT_MAX_PLAINTEXT_LEN)]
        max_plaintext_len: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ProtocolConfig { key_label_prefix: args.key_label_prefix, ..ProtocolConfig::default() };

    match args.command {
        Command::Identity { key_db, participant } => {
            identity(&config, &key_db, &ParticipantId::new(participant)).await
        },
        Command::Demo { participants, message, max_plaintext_len } => {
            let config = ProtocolConfig { max_plaintext_len, ..config };
            demo(config, usize::from(participants), &message).await
        },
    }
}

async fn identity(
    config: &ProtocolConfig,
    key_db: &Path,
    participant: &ParticipantId,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = RedbSecureStore::open(key_db)?;
    let identity = IdentityKeyStore::new(SystemEnv::new(), store, config.identity_label(participant));

    let key_pair = identity.identity_key_pair().await?;
    info!(%participant, label = identity.label(), "identity ready");

    writeln!(io::stdout().lock(), "{}", STANDARD.encode(key_pair.public_key().as_bytes()))?;
    Ok(())
}

async fn demo(
    config: ProtocolConfig,
    participants: usize,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = SystemEnv::new();
    let store = MemoryMessageStore::new(env);
    let directory = MemoryKeyDirectory::new();

    let parties: Vec<_> = (1..=participants)
        .map(|i| {
            ConversationProtocol::new(
                env,
                ParticipantId::new(format!("participant-{i}")),
                MemorySecureStore::new(),
                directory.clone(),
                store.clone(),
                config.clone(),
            )
        })
        .collect();

    for party in &parties {
        party.publish_public_key().await?;
    }

    let Some((initiator, others)) = parties.split_first() else {
        return Ok(());
    };
    let invitees: Vec<_> = others.iter().map(|party| party.local_participant().clone()).collect();

    let conversation = initiator.start_conversation(&invitees).await?;
    info!(conversation = %conversation.id, participants = parties.len(), "conversation started");

    initiator.send_message(message, &conversation).await?;
    if let Some(last) = others.last() {
        last.send_message(&format!("{} received", last.local_participant()), &conversation).await?;
    }

    for party in &parties {
        let history = party.history(&conversation).await?;
        for received in &history.messages {
            info!(
                reader = %party.local_participant(),
                sender = %received.sender,
                text = %received.text,
                "decrypted"
            );
        }
    }

    Ok(())
}
