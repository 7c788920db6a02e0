//! Command execution: wires the storage core together and drives it with
//! message envelopes.

mod args;

use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};

use tagmark_core::backend::{FileBookmarkStore, KvBookmarkStore, RemoteBookmarkBackend};
use tagmark_core::bridge::{FileBridgeHost, LoopbackTransport, MessageFileBridge};
use tagmark_core::config::Config;
use tagmark_core::dispatch::{MessageDispatcher, SenderContext};
use tagmark_core::index::StorageIndex;
use tagmark_core::remote::{RemoteClient, ReqwestTransport};
use tagmark_core::router::StorageRouter;
use tagmark_core::store::{JsonFileStore, KeyValueStore};

use args::{Cli, Commands, TagCommands};

/// Parse arguments, run one command, and return the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => match Config::config_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        },
    };
    let config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    match run_command(cli.command, config, &config_path).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn run_command(
    command: Commands,
    mut config: Config,
    config_path: &std::path::Path,
) -> tagmark_core::Result<i32> {
    // Configuration commands mutate config and return; everything else goes
    // through the dispatcher as an envelope.
    match command {
        Commands::Login { token } => {
            config.auth_token = Some(token);
            config.save_to(config_path)?;
            println!("credential stored");
            return Ok(0);
        }
        Commands::UseBackend { backend } => {
            config.default_backend = backend.parse()?;
            config.save_to(config_path)?;
            println!("default backend: {}", config.default_backend);
            return Ok(0);
        }
        Commands::GrantDir { path } => {
            std::fs::create_dir_all(&path)?;
            let canonical = path.canonicalize()?;
            println!("file backend directory: {}", canonical.display());
            config.file_directory = Some(canonical);
            config.save_to(config_path)?;
            return Ok(0);
        }
        Commands::Config => {
            println!("{}", toml_or_default(&config));
            return Ok(0);
        }
        other => {
            let dispatcher = build_dispatcher(&config)?;
            seed_index(&dispatcher).await;
            let envelope = envelope_for(other);
            let response = dispatcher.dispatch(envelope, &SenderContext::default()).await;
            let failed = response.get("error").is_some();
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(if failed { 1 } else { 0 })
        }
    }
}

fn toml_or_default(config: &Config) -> String {
    toml::to_string_pretty(config).unwrap_or_else(|_| format!("{config:?}"))
}

fn envelope_for(command: Commands) -> Value {
    match command {
        Commands::Get { url } => json!({
            "type": "getCurrentBookmark",
            "data": { "url": url },
        }),
        Commands::Tags { url } => json!({
            "type": "getTagsForUrl",
            "data": { "url": url },
        }),
        Commands::Recent { count } => json!({
            "type": "getRecentBookmarks",
            "data": { "count": count },
        }),
        Commands::Save {
            url,
            tags,
            description,
            extended,
            toread,
            private,
        } => {
            let mut data = serde_json::Map::new();
            data.insert("url".to_string(), json!(url));
            if let Some(tags) = tags {
                data.insert("tags".to_string(), json!(tags));
            }
            if let Some(description) = description {
                data.insert("description".to_string(), json!(description));
            }
            if let Some(extended) = extended {
                data.insert("extended".to_string(), json!(extended));
            }
            if toread {
                data.insert("toread".to_string(), json!("yes"));
            }
            if private {
                data.insert("shared".to_string(), json!("no"));
            }
            json!({ "type": "saveBookmark", "data": data })
        }
        Commands::Delete { url } => json!({
            "type": "deleteBookmark",
            "data": { "url": url },
        }),
        Commands::Tag { operation } => match operation {
            TagCommands::Add { url, value } => json!({
                "type": "saveTag",
                "data": { "url": url, "value": value },
            }),
            TagCommands::Rm { url, value } => json!({
                "type": "deleteTag",
                "data": { "url": url, "value": value },
            }),
        },
        Commands::Backend { url } => json!({
            "type": "getStorageBackendForUrl",
            "data": { "url": url },
        }),
        Commands::Move { url, target } => json!({
            "type": "moveBookmarkToStorage",
            "data": { "url": url, "targetBackend": target },
        }),
        Commands::List { all } => {
            if all {
                json!({ "type": "getAggregatedBookmarksForIndex" })
            } else {
                json!({ "type": "getLocalBookmarksForIndex" })
            }
        }
        // Config commands are handled before dispatch.
        Commands::Login { .. }
        | Commands::UseBackend { .. }
        | Commands::GrantDir { .. }
        | Commands::Config => json!({ "type": "echo" }),
    }
}

fn build_dispatcher(config: &Config) -> tagmark_core::Result<MessageDispatcher> {
    let data_dir = dirs::data_dir()
        .ok_or(tagmark_core::TagmarkError::NoConfigDir)?
        .join("tagmark");

    let device_store: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::new(data_dir.join("device-store.json")));
    let synced_store: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::new(data_dir.join("synced-store.json")));

    // The bridge host stands in for the isolated helper context; the handle
    // it owns comes from configuration.
    let host = Arc::new(FileBridgeHost::new(config.file_directory.clone()));
    let bridge = MessageFileBridge::new(LoopbackTransport::new(host));

    let remote_config = config.remote_config();
    let transport = ReqwestTransport::new(&remote_config)?;
    let remote = RemoteBookmarkBackend::new(RemoteClient::new(remote_config, transport));

    let router = StorageRouter::new(
        Box::new(remote),
        Box::new(KvBookmarkStore::local(device_store.clone())),
        Box::new(KvBookmarkStore::synced(synced_store)),
        Box::new(FileBookmarkStore::new(bridge)),
        StorageIndex::new(device_store),
        config.default_backend,
    );
    Ok(MessageDispatcher::new(router))
}

/// One-time index seeding for stores that predate the index.
async fn seed_index(dispatcher: &MessageDispatcher) {
    // Seeding failure is not fatal for the command being run.
    if let Err(e) = dispatcher.router().ensure_index_seeded().await {
        log::warn!("index seeding failed: {e}");
    }
}
