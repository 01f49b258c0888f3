/// Per-connection session multiplexer
///
/// A session runs as two tasks. The input task owns the read half of the
/// connection: it waits for a request, reads one line in the requested mode,
/// enforces the input throttle and hands the line back. The session task owns
/// the event subscription and all prompt output. It writes the prompt, then
/// waits on whichever comes first: the requested line, an event for this
/// character, or a failure reported by the input task.
///
/// Reading a line can take forever, so it never runs on the session task;
/// otherwise events from other players could not be shown while this player
/// is idle at the prompt.

use crate::commands::{argify, Context};
use crate::core::{AppState, Subscription};
use crate::core::events::MudEvent;
use crate::error::{MudError, Result};
use crate::network::ansi::Color;
use crate::network::line::{InputMode, LineReader, Output};
use crate::world::{Character, Room, Zone};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

const PROMPT: &str = "> ";

/// Where a session is in its input cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No line has been requested from the input task
    AwaitingInput,

    /// A line has been requested; events are shown while waiting
    InputRequested,

    /// Torn down; terminal
    Closed,
}

/// One request to the input task
#[derive(Debug, Clone, Copy)]
struct InputRequest {
    mode: InputMode,
}

/// Minimum spacing between two lines handed to the session
struct Throttle {
    delay: Duration,
    last: Instant,
}

impl Throttle {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Instant::now(),
        }
    }

    /// Sleep for whatever is left of the delay since the previous line
    async fn wait(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < self.delay {
            sleep(self.delay - elapsed).await;
        }
        self.last = Instant::now();
    }
}

async fn input_loop<R>(
    mut reader: LineReader<R>,
    mut requests: mpsc::Receiver<InputRequest>,
    lines: mpsc::Sender<String>,
    delay: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut throttle = Throttle::new(delay);

    while let Some(request) = requests.recv().await {
        let line = reader.read_line(request.mode).await?;
        throttle.wait().await;

        if lines.send(line).await.is_err() {
            break;
        }
    }

    debug!("Input task finished");
    Ok(())
}

/// One live connection's read-eval loop
pub struct Session {
    state: AppState,
    character: Arc<Character>,
    room: Arc<Room>,
    zone: Arc<Zone>,
    output: Output,

    subscription: Subscription,
    events_open: bool,

    requests: mpsc::Sender<InputRequest>,
    lines: mpsc::Receiver<String>,
    failure: oneshot::Receiver<MudError>,
    input_failed: bool,
    input_task: JoinHandle<()>,

    prompt: String,
    status: SessionState,
}

impl Session {
    /// Attach `character` to a connection and start its input task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `MudError::UnknownEntity`: the character's room or zone is missing
    pub fn new<R>(
        state: AppState,
        character: Arc<Character>,
        reader: LineReader<R>,
        output: Output,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let room = state.store.room(character.room_id())?;
        let zone = state.store.zone(room.zone_id())?;
        let subscription = state.bus.register(character.clone());

        let (request_tx, request_rx) = mpsc::channel(1);
        let (line_tx, line_rx) = mpsc::channel(1);
        let (failure_tx, failure_rx) = oneshot::channel();
        let delay = state.config.input_throttle();

        let input_task = tokio::spawn(async move {
            if let Err(e) = input_loop(reader, request_rx, line_tx, delay).await {
                let _ = failure_tx.send(e);
            }
        });

        debug!("Session started for {}", character.name());

        Ok(Self {
            state,
            character,
            room,
            zone,
            output,
            subscription,
            events_open: true,
            requests: request_tx,
            lines: line_rx,
            failure: failure_rx,
            input_failed: false,
            input_task,
            prompt: String::new(),
            status: SessionState::AwaitingInput,
        })
    }

    pub fn state(&self) -> SessionState {
        self.status
    }

    pub fn character(&self) -> &Arc<Character> {
        &self.character
    }

    /// The session's cached view of the current room
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// Run until logout, disconnect or a fatal error, then tear down
    pub async fn run(mut self) -> Result<()> {
        let result = self.main_loop().await;
        self.close();
        if let Err(e) = self.output.close().await {
            debug!("Could not shut down output for {}: {}", self.character.name(), e);
        }

        match &result {
            Ok(()) => info!("{} logged out", self.character.name()),
            Err(MudError::ConnectionClosed) => info!("{} disconnected", self.character.name()),
            Err(e) => error!("Session for {} ended: {}", self.character.name(), e),
        }
        result
    }

    async fn main_loop(&mut self) -> Result<()> {
        let welcome = format!("Welcome to {}, {}!", self.state.config.name, self.character.name());
        self.output.write_colored(Color::Green, &welcome).await?;

        self.character.touch_login();
        self.state.bus.publish(MudEvent::Login {
            character: self.character.clone(),
        });
        self.print_room().await?;

        loop {
            let line = self.get_user_input(InputMode::Raw, PROMPT).await?;
            let line = line.trim();

            if line.is_empty() || line.eq_ignore_ascii_case(&self.state.config.logout_keyword) {
                return Ok(());
            }

            self.dispatch(line).await?;
        }
    }

    /// Ask the input task for one line and wait for it, showing events that
    /// arrive in the meantime
    ///
    /// A line that is already available always wins over pending events.
    pub async fn get_user_input(&mut self, mode: InputMode, prompt: &str) -> Result<String> {
        self.request_line(mode, prompt).await?;
        self.next_line().await
    }

    /// Show the prompt and ask the input task for a line
    ///
    /// The prompt is on screen before any event can be shown, so every
    /// later `interrupt` redraws it exactly once.
    async fn request_line(&mut self, mode: InputMode, prompt: &str) -> Result<()> {
        if self.status == SessionState::Closed {
            return Err(MudError::ConnectionClosed);
        }
        if self.input_failed {
            return Err(MudError::InputTaskFailed("input task already failed".to_string()));
        }

        self.prompt = prompt.to_string();
        self.output.write_str(&self.prompt).await?;
        if self.requests.send(InputRequest { mode }).await.is_err() {
            return Err(self.input_failure().await);
        }
        self.status = SessionState::InputRequested;
        Ok(())
    }

    /// Wait for the requested line, showing events until it arrives
    async fn next_line(&mut self) -> Result<String> {
        loop {
            tokio::select! {
                biased;

                failure = &mut self.failure => {
                    self.input_failed = true;
                    return Err(match failure {
                        Ok(e) => e,
                        Err(_) => MudError::InputTaskFailed("input task stopped".to_string()),
                    });
                }

                line = self.lines.recv() => {
                    self.status = SessionState::AwaitingInput;
                    return match line {
                        Some(line) => Ok(line),
                        None => Err(self.input_failure().await),
                    };
                }

                event = self.subscription.recv(), if self.events_open => {
                    match event {
                        Some(event) => self.process_event(event).await?,
                        None => {
                            warn!("Event queue for {} closed", self.character.name());
                            self.events_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Error explaining why the input task stopped talking to us
    async fn input_failure(&mut self) -> MudError {
        self.input_failed = true;
        match (&mut self.failure).await {
            Ok(e) => e,
            Err(_) => MudError::InputTaskFailed("input task stopped".to_string()),
        }
    }

    async fn process_event(&mut self, event: MudEvent) -> Result<()> {
        if let MudEvent::RoomUpdated { room } = &event {
            if room.id() == self.room.id() {
                self.room = room.clone();
            }
        }

        // The character may have moved on since the event was queued
        if !event.is_visible_to(&self.character) {
            return Ok(());
        }

        if let Some(text) = event.render(&self.character) {
            debug!("Showing {} event to {}", event.name(), self.character.name());
            self.output.interrupt(&text, &self.prompt).await?;
        }
        Ok(())
    }

    fn context(&mut self) -> Context<'_> {
        Context::new(
            &self.state.store,
            &self.state.bus,
            &self.character,
            &mut self.room,
            &mut self.zone,
            self.output.color_mode(),
        )
    }

    /// Route one line to the command or action handler and show the result
    async fn dispatch(&mut self, line: &str) -> Result<()> {
        let prefix = self.state.config.command_prefix.clone();
        let commands = self.state.commands.clone();
        let actions = self.state.actions.clone();

        let (result, lines) = {
            let mut ctx = self.context();
            let result = match line.strip_prefix(prefix.as_str()) {
                Some(rest) => {
                    let (command, args) = argify(rest);
                    commands.handle(&mut ctx, &command, &args)
                }
                None => {
                    let (action, args) = argify(line);
                    actions.handle(&mut ctx, &action, &args)
                }
            };
            (result, ctx.take_lines())
        };

        for text in lines {
            self.output.write_line(&text).await?;
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) if !e.is_fatal() => {
                debug!("{}: {}", self.character.name(), e);
                self.output.write_colored(Color::Red, &e.to_string()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn print_room(&mut self) -> Result<()> {
        let lines = {
            let mut ctx = self.context();
            ctx.print_room()?;
            ctx.take_lines()
        };
        for text in lines {
            self.output.write_line(&text).await?;
        }
        Ok(())
    }

    /// Unregister, stop the input task and announce the logout; idempotent
    fn close(&mut self) {
        if self.status == SessionState::Closed {
            return;
        }
        self.status = SessionState::Closed;

        self.input_task.abort();
        self.state.bus.unregister(&self.subscription);
        self.state.bus.publish(MudEvent::Logout {
            character: self.character.clone(),
        });
        debug!("Session closed for {}", self.character.name());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
