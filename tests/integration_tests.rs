/// Integration tests for the mudcore server
///
/// Real loopback connections against a bound `Server`, plus world-level
/// scenarios driven through the public library API.

use mudcore::{
    core::{EventBus, WorldHook},
    network::ColorMode,
    persistence::MemoryPersister,
    world::{Coordinate, ExitDirection},
    EntityStore, Server, ServerConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

const WAIT: Duration = Duration::from_secs(3);

/// End of a room description followed by the input prompt
const PROMPT_AFTER_ROOM: &str = "\r\n> ";

// ============================================================================
// Helpers
// ============================================================================

async fn start_server() -> Arc<Server> {
    let config = ServerConfig::builder()
        .name("Test MUD")
        .port(0)
        .input_throttle(Duration::from_millis(20))
        .color_mode(ColorMode::None)
        .build()
        .expect("Valid config");

    let server = Arc::new(Server::bind(config).await.expect("Server should bind"));
    let running = server.clone();
    tokio::spawn(async move {
        let _ = running.run().await;
    });
    server
}

struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pending: String,
}

impl Client {
    async fn connect(server: &Server, name: &str) -> Self {
        let stream = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Client {
            reader,
            writer,
            pending: String::new(),
        };

        client.expect("Name: ").await;
        client.send(name).await;
        client.expect("Exits:").await;
        client.expect(PROMPT_AFTER_ROOM).await;
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{}\r\n", line).as_bytes()).await.unwrap();
    }

    /// Consume output up to and including `needle`, returning it
    async fn expect(&mut self, needle: &str) -> String {
        let mut buf = [0u8; 1024];
        let result = timeout(WAIT, async {
            loop {
                if let Some(pos) = self.pending.find(needle) {
                    let end = pos + needle.len();
                    let consumed: String = self.pending.drain(..end).collect();
                    return consumed;
                }
                let n = self.reader.read(&mut buf).await.unwrap();
                assert!(n > 0, "Connection closed while waiting for {:?}", needle);
                self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        })
        .await;

        match result {
            Ok(text) => text,
            Err(_) => panic!("Timed out waiting for {:?}, have {:?}", needle, self.pending),
        }
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "Condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Multi-session scenarios
// ============================================================================

#[tokio::test]
async fn test_exit_change_reaches_other_session_mid_read() {
    let server = start_server().await;
    let mut alice = Client::connect(&server, "alice").await;
    let mut bob = Client::connect(&server, "bob").await;
    alice.expect("Bob has connected\r\n> ").await;

    alice.send("/exit n").await;
    alice.expect("Exit north enabled").await;

    // Bob is idle at his prompt; the notice interrupts it and the prompt is redrawn
    let seen = bob.expect("This room has been modified\r\n> ").await;
    assert!(seen.contains("\x1b[2K"));

    alice.send("look").await;
    alice.expect("Exits: n\r\n").await;
}

#[tokio::test]
async fn test_say_is_heard_in_the_same_room() {
    let server = start_server().await;
    let mut alice = Client::connect(&server, "alice").await;
    let mut bob = Client::connect(&server, "bob").await;

    bob.send("say well met").await;
    bob.expect("You say: well met").await;
    alice.expect("Bob says: well met\r\n> ").await;

    alice.send("look").await;
    alice.expect("Also here: Bob").await;
}

#[tokio::test]
async fn test_movement_is_announced() {
    let server = start_server().await;
    let mut alice = Client::connect(&server, "alice").await;
    let mut bob = Client::connect(&server, "bob").await;

    alice.send("/exit e").await;
    alice.expect("Exit east enabled").await;
    alice.send("east").await;
    alice.expect("Exits: w").await;

    bob.expect("Alice has left the room").await;

    let store = &server.state().store;
    let alice_character = store.find_character("alice").unwrap();
    let room = store.room(alice_character.room_id()).unwrap();
    assert_eq!(room.location(), Coordinate::new(1, 0, 0));
}

#[tokio::test]
async fn test_disconnect_tears_down_only_that_session() {
    let server = start_server().await;
    let alice = Client::connect(&server, "alice").await;
    let mut bob = Client::connect(&server, "bob").await;
    let bus = server.state().bus.clone();
    assert_eq!(bus.subscriber_count(), 2);

    drop(alice);

    wait_for(|| bus.subscriber_count() == 1).await;
    bob.expect("Alice has disconnected").await;

    bob.send("who").await;
    let seen = bob.expect("Bob").await;
    assert!(!seen.contains("Alice"));
}

#[tokio::test]
async fn test_same_character_cannot_log_in_twice() {
    let server = start_server().await;
    let _alice = Client::connect(&server, "alice").await;

    let stream = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
    let (reader, writer) = stream.into_split();
    let mut second = Client {
        reader,
        writer,
        pending: String::new(),
    };
    second.expect("Name: ").await;
    second.send("Alice").await;
    second.expect("Alice is already playing").await;
    second.expect("Name: ").await;
}

#[tokio::test]
async fn test_logout_keyword_closes_connection() {
    let server = start_server().await;
    let mut alice = Client::connect(&server, "alice").await;

    alice.send("logout").await;

    let mut buf = [0u8; 256];
    let closed = timeout(WAIT, async {
        loop {
            if alice.reader.read(&mut buf).await.unwrap_or(0) == 0 {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "Server should close the connection");
    wait_for(|| server.state().bus.subscriber_count() == 0).await;
}

// ============================================================================
// World scenarios
// ============================================================================

fn store() -> EntityStore {
    let hook = WorldHook::new(Arc::new(MemoryPersister::new()), Arc::new(EventBus::default()));
    EntityStore::new(Arc::new(hook))
}

#[test]
fn test_backpack_weighs_its_nested_contents() {
    let store = store();
    let weighted = |name: &str, weight: i64| {
        let template = store.create_template(name);
        template.set_weight(weight);
        store.create_item(template.id())
    };

    let sword = weighted("Sword", 5);
    let bag = weighted("Bag", 2);
    let backpack = weighted("Backpack", 3);
    bag.add_item(sword.id());
    backpack.add_item(bag.id());

    assert_eq!(backpack.weight(&store).unwrap(), 10);
}

#[test]
fn test_concurrent_edits_from_many_threads_converge() {
    let store = Arc::new(store());
    let zone = store.create_zone("Midgaard");
    let room_id = store.create_room(zone.id(), Coordinate::ORIGIN).id();

    let handles: Vec<_> = ExitDirection::ALL
        .into_iter()
        .map(|direction| {
            let store = store.clone();
            std::thread::spawn(move || {
                let room = store.room(room_id).unwrap();
                room.set_exit(direction, true);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.room(room_id).unwrap().exits().len(), ExitDirection::ALL.len());
}
