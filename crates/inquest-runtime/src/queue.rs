//! The engine loop — single consumer of a session's command queue
//!
//! Every mutation of a session's graph state (upstream frames, user
//! gestures, reset, terminate) enters one ordered mpsc queue and is
//! processed by one consumer that owns the [`GraphEngine`]. There is no
//! other mutation path, so the engine needs no locks and frames are always
//! applied in arrival order. Each applied command publishes a fresh
//! snapshot on a broadcast channel; a lagging subscriber drops revisions,
//! it never blocks the loop.

use inquest_core::{Error, Interaction, Result, UpdateFrame};
use inquest_graph::{GraphEngine, Snapshot};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Every command a session's queue accepts.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// An upstream arrival frame; processed in arrival order.
    Ingest(UpdateFrame),
    /// A user gesture; touches only viewport/expansion state.
    Interact(Interaction),
    /// Clear all state atomically and start over.
    Reset,
    /// Stop accepting ingestion, keep state renderable.
    Terminate,
    /// Re-broadcast the current snapshot, for subscribers that joined
    /// after the last mutation.
    Publish,
    /// Tear the loop down entirely.
    Shutdown,
}

/// The engine loop: single consumer of the command queue.
pub struct EngineLoop {
    command_rx: mpsc::Receiver<EngineCommand>,
    snapshot_tx: broadcast::Sender<Snapshot>,
    engine: GraphEngine,
    /// Fired by the session's safety deadline (or by close); handled as a
    /// terminate, not a crash.
    cancel: CancellationToken,
}

impl EngineLoop {
    pub fn new(
        engine: GraphEngine,
        command_rx: mpsc::Receiver<EngineCommand>,
        snapshot_tx: broadcast::Sender<Snapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            command_rx,
            snapshot_tx,
            engine,
            cancel,
        }
    }

    /// Process commands until Shutdown or queue closure. Cancellation
    /// terminates ingestion but keeps serving interactions, so a timed-out
    /// investigation stays on screen and navigable.
    pub async fn run(mut self) {
        info!("engine loop started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled(), if !self.engine.is_terminated() => {
                    warn!("session cancelled; terminating ingestion");
                    self.engine.terminate();
                    self.publish();
                }
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("command queue closed, shutting down");
                        break;
                    };
                    if self.handle(cmd) {
                        break;
                    }
                }
            }
        }
        info!("engine loop stopped");
    }

    /// Apply one command. Returns true on Shutdown.
    fn handle(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::Ingest(frame) => match self.engine.ingest(&frame) {
                Ok(outcome) => debug!(?outcome, "frame applied"),
                // Rejected events degrade to a log line; the stream keeps
                // flowing and prior state is untouched.
                Err(e) => warn!(error = %e, "frame rejected"),
            },
            EngineCommand::Interact(interaction) => self.engine.interact(&interaction),
            EngineCommand::Reset => self.engine.reset(),
            EngineCommand::Terminate => self.engine.terminate(),
            EngineCommand::Publish => {}
            EngineCommand::Shutdown => {
                info!("shutdown command received");
                return true;
            }
        }
        self.publish();
        false
    }

    fn publish(&self) {
        // Send fails only when nobody subscribes; that is fine.
        let _ = self.snapshot_tx.send(self.engine.snapshot());
    }
}

/// Cheap handle for submitting commands to a session's loop and
/// subscribing to its snapshot stream.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    command_tx: mpsc::Sender<EngineCommand>,
    snapshot_tx: broadcast::Sender<Snapshot>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(
        id: String,
        command_tx: mpsc::Sender<EngineCommand>,
        snapshot_tx: broadcast::Sender<Snapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            command_tx,
            snapshot_tx,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn ingest(&self, frame: UpdateFrame) -> Result<()> {
        self.send(EngineCommand::Ingest(frame)).await
    }

    pub async fn interact(&self, interaction: Interaction) -> Result<()> {
        self.send(EngineCommand::Interact(interaction)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(EngineCommand::Reset).await
    }

    pub async fn terminate(&self) -> Result<()> {
        self.send(EngineCommand::Terminate).await
    }

    /// Ask the loop to re-broadcast its current snapshot.
    pub async fn request_snapshot(&self) -> Result<()> {
        self.send(EngineCommand::Publish).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        self.send(EngineCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| Error::ChannelClosed(self.id.clone()))
    }
}
