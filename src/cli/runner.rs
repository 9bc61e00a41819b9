//! CLI runner - executes commands

use crate::chat::{ChatClient, ChatConnector, Room};
use crate::cli::commands::{Cli, Commands, RoomsCommand, RunArgs, SyncCommand};
use crate::config::HubConfig;
use crate::connector::Connector;
use crate::database::{DuckDbStore, EventStore, RoomStore};
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::http::HttpClient;
use crate::types::Resource;
use crate::warehouse::{WarehouseClient, WarehouseConnector};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        match &self.cli.command {
            Commands::Sync(SyncCommand::Chat {
                run,
                expand_threads,
            }) => self.sync_chat(&config, run, *expand_threads).await,
            Commands::Sync(SyncCommand::Warehouse { run, rename }) => {
                self.sync_warehouse(&config, run, rename.as_deref()).await
            }
            Commands::Rooms(RoomsCommand::List { room_type, name }) => {
                self.list_rooms(&config, room_type.as_deref(), name.as_deref())
                    .await
            }
            Commands::Rooms(RoomsCommand::Add { project }) => self.add_room(&config, project).await,
            Commands::Rooms(RoomsCommand::Stored) => self.stored_rooms(&config),
        }
    }

    /// File, then environment, then flags
    fn load_config(&self) -> Result<HubConfig> {
        let mut config = HubConfig::load(self.cli.config.as_deref())?.with_env_overrides();
        if let Some(db) = &self.cli.db {
            config.database = Some(db.clone());
        }
        config.validate()?;
        debug!("effective config: {config:?}");
        Ok(config)
    }

    fn open_store(config: &HubConfig) -> Result<DuckDbStore> {
        let path = config.database_path()?;
        info!("using store {}", path.display());
        DuckDbStore::open(path)
    }

    fn chat_client(config: &HubConfig) -> Result<ChatClient> {
        Ok(ChatClient::new(HttpClient::with_config(config.chat.http_config()?)?))
    }

    // ========================================================================
    // Sync
    // ========================================================================

    async fn sync_chat(
        &self,
        config: &HubConfig,
        run: &RunArgs,
        expand_threads: bool,
    ) -> Result<()> {
        let store = Self::open_store(config)?;
        let client = Self::chat_client(config)?;
        let room = resolve_room(&store, &client, &run.project).await?;
        let resource = Resource::new(room.id.clone(), room.key());

        let connector = ChatConnector::new(client)
            .with_page_size(config.chat.page_size)
            .with_thread_expansion(expand_threads || config.chat.expand_threads);
        let batch_size = run.batch_size.unwrap_or(config.sync.batch_size);
        let engine =
            SyncEngine::new(connector, store).with_config(config.sync.engine_config(batch_size));

        execute(engine, &resource, deadline(run, config)).await
    }

    async fn sync_warehouse(
        &self,
        config: &HubConfig,
        run: &RunArgs,
        rename: Option<&str>,
    ) -> Result<()> {
        let store = Self::open_store(config)?;
        let client = WarehouseClient::new(HttpClient::with_config(config.warehouse.http_config())?)
            .with_table(&config.warehouse.table)
            .with_database(config.warehouse.database.clone())
            .with_block_size(config.warehouse.block_size);
        let resource = Resource::new(run.project.as_str(), rename.unwrap_or(&run.project));

        let batch_size = run.batch_size.unwrap_or(config.sync.warehouse_batch_size);
        let engine = SyncEngine::new(WarehouseConnector::new(client), store)
            .with_config(config.sync.engine_config(batch_size));

        execute(engine, &resource, deadline(run, config)).await
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    async fn list_rooms(
        &self,
        config: &HubConfig,
        room_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<()> {
        let client = Self::chat_client(config)?;
        let rooms = client.rooms().await?;
        for room in filter_rooms(&rooms, room_type, name) {
            print_room(room);
        }
        Ok(())
    }

    async fn add_room(&self, config: &HubConfig, project: &str) -> Result<()> {
        let store = Self::open_store(config)?;
        let client = Self::chat_client(config)?;
        let room = client.get_room(project).await?;
        if store.save_room(&room)? {
            println!("added {} ({})", room.key(), room.id);
        } else {
            println!("updated {} ({})", room.key(), room.id);
        }
        Ok(())
    }

    fn stored_rooms(&self, config: &HubConfig) -> Result<()> {
        let store = Self::open_store(config)?;
        for room in store.list_rooms()? {
            let count = EventStore::<crate::chat::ChatMessage>::count(&store, room.key())?;
            println!("{}\t{}\t{} messages", room.key(), room.id, count);
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Stored room for `uri`, fetched and registered when not stored yet
async fn resolve_room(store: &DuckDbStore, client: &ChatClient, uri: &str) -> Result<Room> {
    if let Some(room) = store.get_room(uri)? {
        return Ok(room);
    }
    let room = client.get_room(uri).await?;
    store.save_room(&room)?;
    info!("registered room {} ({})", room.key(), room.id);
    Ok(room)
}

fn deadline(run: &RunArgs, config: &HubConfig) -> Option<Instant> {
    run.deadline_secs
        .or(config.sync.deadline_secs)
        .map(|secs| Instant::now() + Duration::from_secs(secs))
}

/// Run one sync and report its outcome on stdout/stderr
async fn execute<C, S>(
    mut engine: SyncEngine<C, S>,
    resource: &Resource,
    deadline: Option<Instant>,
) -> Result<()>
where
    C: Connector,
    S: EventStore<C::Event>,
{
    let outcome = match deadline {
        Some(deadline) => engine.sync_until(resource, deadline).await,
        None => engine.sync(resource).await,
    };

    match outcome {
        Ok(count) => {
            println!("{count}");
            debug!(
                "stats: {}",
                serde_json::to_string(engine.stats()).unwrap_or_default()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "sync of {} failed after persisting {} events",
                resource.key,
                engine.stats().events_persisted
            );
            if e.is_upstream() {
                eprintln!("committed events are kept; rerun to resume after them");
            }
            Err(e)
        }
    }
}

/// Rooms matching a type (case-insensitive) and a name fragment
pub(crate) fn filter_rooms<'a>(
    rooms: &'a [Room],
    room_type: Option<&'a str>,
    name: Option<&'a str>,
) -> impl Iterator<Item = &'a Room> + 'a {
    let name = name.map(str::to_lowercase);
    rooms.iter().filter(move |room| {
        room_type.map_or(true, |t| room.is_type(t))
            && name
                .as_deref()
                .map_or(true, |n| room.name.to_lowercase().contains(n))
    })
}

fn print_room(room: &Room) {
    println!(
        "{}\t{}\t{}\t{} users",
        room.key(),
        room.id,
        room.github_type.as_deref().unwrap_or("-"),
        room.user_count
    );
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").field("cli", &self.cli).finish()
    }
}
