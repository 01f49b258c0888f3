/// TCP front door: accepts connections, logs characters in, runs sessions
///
/// Each connection gets its own task. A failing connection is logged and
/// closed; it never takes the listener or other sessions down with it.

use crate::config::ServerConfig;
use crate::core::{AppState, Record, Session};
use crate::error::{MudError, Result};
use crate::network::ansi::Color;
use crate::network::line::{line_transport, InputMode, LineReader, Output};
use crate::persistence::{JsonStore, NullPersister, Persister, WriteBehind};
use crate::world::{validate_name, Character};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Bound listener plus the world it serves
pub struct Server {
    state: AppState,
    listener: TcpListener,
    writer: Option<WriteBehind>,
}

impl Server {
    /// Load the world and bind the listening socket
    ///
    /// With a `data_dir` the world is restored from its JSON records and
    /// every later change is written back; without one the world lives in
    /// memory only.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let mut records = Vec::new();
        let mut writer = None;
        let persister: Arc<dyn Persister> = match &config.data_dir {
            Some(dir) => {
                let store = JsonStore::open(dir).await?;
                records = store.load_all().await?;
                info!("Loaded {} records from {}", records.len(), store.root().display());
                let write_behind = store.spawn_writer();
                writer = Some(write_behind.clone());
                Arc::new(write_behind)
            }
            None => {
                info!("No data directory configured, world will not be saved");
                Arc::new(NullPersister)
            }
        };

        let state = AppState::new(config, persister);
        restore_world(&state, records);

        let listener = TcpListener::bind(state.config.address()).await?;
        info!("{} listening on {}", state.config.name, listener.local_addr()?);

        Ok(Self {
            state,
            listener,
            writer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Wait until every queued record has reached disk
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    /// Accept connections until the listener fails
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Could not set TCP_NODELAY for {}: {}", peer, e);
            }
            debug!("Accepted connection from {}", peer);

            let state = self.state.clone();
            tokio::spawn(async move {
                match handle_connection(state, stream).await {
                    Ok(()) | Err(MudError::ConnectionClosed) => {
                        debug!("Connection from {} closed", peer)
                    }
                    Err(e) => error!("Connection from {} failed: {}", peer, e),
                }
            });
        }
    }
}

fn restore_world(state: &AppState, records: Vec<Record>) {
    let total = records.len();
    let mut restored = 0;
    for record in records {
        let (id, kind) = (record.id, record.kind);
        match state.store.restore(record) {
            Ok(_) => restored += 1,
            Err(e) => warn!("Could not restore {} {}: {}", kind, id, e),
        }
    }
    if total > 0 {
        info!("Restored {} of {} entities", restored, total);
    }
}

/// Log a character in over `stream` and run its session to the end
pub async fn handle_connection<S>(state: AppState, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, output) =
        line_transport(stream, state.config.max_line_length, state.config.color_mode);

    output
        .write_colored(Color::Cyan, &format!("Connected to {}", state.config.name))
        .await?;
    let character = login(&state, &mut reader, &output).await?;

    let session = Session::new(state, character, reader, output)?;
    session.run().await
}

/// Ask for a name until a valid one is given; new names create a character
/// in the start room
async fn login<R>(state: &AppState, reader: &mut LineReader<R>, output: &Output) -> Result<Arc<Character>>
where
    R: AsyncRead + Unpin,
{
    loop {
        output.write_str("Name: ").await?;
        let answer = reader.read_line(InputMode::Clean).await?;
        if answer.is_empty() {
            return Err(MudError::ConnectionClosed);
        }

        let name = match validate_name(&answer) {
            Ok(name) => name,
            Err(MudError::ValidationError { reason, .. }) => {
                output.write_colored(Color::Red, &reason).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let (character, created) = state.store.character_or_create(&name)?;
        if created {
            info!("Created character {}", name);
        }

        if state.bus.is_online(character.id()) {
            output
                .write_colored(Color::Red, &format!("{} is already playing", name))
                .await?;
            continue;
        }

        // A character whose room has been lost starts over
        if state.store.room(character.room_id()).is_err() {
            let room = state.store.start_room()?;
            warn!("{} was in a missing room, moving to {}", name, room.id());
            character.set_room_id(room.id());
        }

        return Ok(character);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ansi::ColorMode;
    use crate::persistence::MemoryPersister;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn state() -> AppState {
        let config = ServerConfig::builder()
            .input_throttle(std::time::Duration::ZERO)
            .color_mode(ColorMode::None)
            .build()
            .unwrap();
        AppState::new(config, Arc::new(MemoryPersister::new()))
    }

    async fn read_until(client: &mut tokio::io::DuplexStream, needle: &str) -> String {
        let mut seen = String::new();
        let mut buf = [0u8; 512];
        while !seen.contains(needle) {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "Closed before {:?}, saw {:?}", needle, seen);
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        seen
    }

    #[tokio::test]
    async fn test_login_rejects_bad_names_then_creates_character() {
        let state = state();
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let (mut reader, output) = line_transport(server, 256, ColorMode::None);

        client.write_all(b"x\r\nmerlin\r\n").await.unwrap();
        let character = login(&state, &mut reader, &output).await.unwrap();

        assert_eq!(character.name(), "Merlin");
        assert!(state.store.find_character("merlin").is_some());
        read_until(&mut client, "Names are").await;
    }

    #[tokio::test]
    async fn test_login_returns_existing_character() {
        let state = state();
        let room = state.store.start_room().unwrap();
        let existing = state.store.create_character("morgana", room.id());
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let (mut reader, output) = line_transport(server, 256, ColorMode::None);

        client.write_all(b"MORGANA\r\n").await.unwrap();
        let character = login(&state, &mut reader, &output).await.unwrap();

        assert!(Arc::ptr_eq(&character, &existing));
    }

    #[tokio::test]
    async fn test_empty_name_closes_connection() {
        let state = state();
        let (mut client, server) = tokio::io::duplex(16 * 1024);

        client.write_all(b"\r\n").await.unwrap();
        let result = handle_connection(state, server).await;

        assert!(matches!(result, Err(MudError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_bind_restores_saved_world() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::builder()
            .port(0)
            .data_dir(dir.path())
            .build()
            .unwrap();

        let room_id = {
            let server = Server::bind(config.clone()).await.unwrap();
            let room = server.state().store.start_room().unwrap();
            room.set_title("Saved Hall");
            server.flush().await;
            room.id()
        };

        let server = Server::bind(config).await.unwrap();
        let room = server.state().store.room(room_id).unwrap();
        assert_eq!(room.title(), "Saved Hall");
    }
}
