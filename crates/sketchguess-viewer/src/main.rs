//! Headless SketchGuess participant.
//!
//! Connects to the relay, follows the session and the drawing, and keeps a
//! PNG of the surface up to date on disk.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use sketchguess_core::{
    ClientConfig, ClientEvent, ClientMessage, Effect, GameClient, NativeStoreClient, RasterSurface,
    TransportEvent, UiAction,
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "sketchguess-viewer")]
#[command(about = "Follow a SketchGuess drawing and export it as PNG")]
#[command(version)]
struct Cli {
    /// User id to connect as
    user_id: String,
    /// Join the roster under this name
    #[arg(long)]
    join: Option<String>,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

struct Viewer {
    config: ClientConfig,
    client: GameClient<RasterSurface>,
    store: NativeStoreClient,
    join: Option<String>,
    dirty: bool,
}

impl Viewer {
    fn connect(&mut self) {
        if let Err(e) = self.store.connect(&self.config.server_url) {
            log::error!("Cannot connect to {}: {}", self.config.server_url, e);
        }
    }

    fn send(&mut self, message: &ClientMessage) -> bool {
        match self.store.send(message) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Send failed: {}", e);
                false
            }
        }
    }

    fn send_outgoing(&mut self) {
        if !self.store.is_connected() {
            return;
        }
        for message in self.client.drain_outgoing() {
            if !self.send(&message) {
                self.client.handle(ClientEvent::Disconnected);
                break;
            }
        }
    }

    /// Returns `false` once the connection is gone.
    fn poll(&mut self) -> bool {
        let mut alive = true;
        for event in self.store.poll_events() {
            match event {
                TransportEvent::Connected => {
                    log::info!("Connected to {}", self.config.server_url);
                    let hello = self.client.hello();
                    self.send(&hello);
                    if let Some(username) = self.join.take() {
                        let effects = self.client.handle(ClientEvent::Action(UiAction::Join { username }));
                        self.apply(effects);
                    }
                }
                TransportEvent::Message(message) => {
                    let effects = self.client.handle(ClientEvent::Server(message));
                    self.apply(effects);
                }
                TransportEvent::Disconnected => {
                    log::warn!("Disconnected");
                    self.client.handle(ClientEvent::Disconnected);
                    alive = false;
                }
                TransportEvent::Error { message } => {
                    log::error!("{}", message);
                    self.client.handle(ClientEvent::Disconnected);
                    alive = false;
                }
            }
        }
        alive
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SurfaceChanged => self.dirty = true,
                Effect::RequestResync => {
                    self.send(&ClientMessage::ResyncDrawing);
                }
                Effect::ModeChanged(mode) => {
                    log::info!(
                        "{:?}: word {}, drawer {:?}, {}s left",
                        mode.screen,
                        mode.word_label(),
                        mode.drawer_id,
                        mode.timer
                    );
                }
                Effect::RosterChanged(roster) => {
                    for entry in roster {
                        log::debug!("  {}: {} pts", entry.username, entry.current_points);
                    }
                }
                Effect::AttemptPosted(attempt) => {
                    log::info!("{} guessed {:?}", attempt.username, attempt.guess);
                }
                Effect::Notice(notice) => log::warn!("{}", notice),
            }
        }
    }

    fn export(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let result = self
            .client
            .surface()
            .encode_png()
            .map_err(|e| e.to_string())
            .and_then(|png| std::fs::write(&self.config.snapshot_path, png).map_err(|e| e.to_string()));
        if let Err(e) = result {
            log::error!("Failed to write {}: {}", self.config.snapshot_path.display(), e);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ClientConfig::resolve(cli.config.as_deref())?;
    log::info!("Starting SketchGuess viewer as {}", cli.user_id);

    let surface = RasterSurface::new(config.canvas_width, config.canvas_height)?;
    let client = GameClient::new(cli.user_id, surface).with_history(config.max_history);

    let mut viewer = Viewer {
        config,
        client,
        store: NativeStoreClient::new(),
        join: cli.join,
        dirty: true,
    };
    viewer.connect();

    let flush_interval = Duration::from_millis(viewer.config.flush_interval_ms);
    let mut last_flush = Instant::now();

    loop {
        if !viewer.poll() {
            thread::sleep(RECONNECT_DELAY);
            viewer.connect();
            continue;
        }

        if last_flush.elapsed() >= flush_interval {
            viewer.client.flush();
            viewer.send_outgoing();
            last_flush = Instant::now();
        }

        viewer.export();
        thread::sleep(POLL_INTERVAL);
    }
}
