//! Per-user engine actors.
//!
//! Every user key gets one tokio task that owns that user's
//! [`ConversationalTaskEngine`] and drains an mpsc queue of commands one at a
//! time. Two requests for the same user therefore never interleave, while
//! different users proceed in parallel.
//!
//! An actor that receives nothing for the idle TTL stops itself and its
//! registry slot is reclaimed, so the number of live actors tracks recent
//! users rather than every key ever seen. The next request for that user
//! spawns a fresh actor over the same storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use taskchat_core::types::{ChatOutcome, ChatTurn, Task, TaskMutation};

use crate::engine::ConversationalTaskEngine;
use crate::error::ChatError;

/// Pending commands allowed per user before senders wait.
const DEFAULT_QUEUE_DEPTH: usize = 32;

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(900);

type Reply<T> = oneshot::Sender<Result<T, ChatError>>;

/// Held by a running actor for its whole life. A replacement actor for the
/// same user waits on it, so a stopping actor can finish its queue first.
type Lease = Arc<tokio::sync::Mutex<()>>;

/// Builds the engine for a user key on first use.
pub trait EngineFactory: Send + Sync {
    fn create(&self, user_key: &str) -> Result<ConversationalTaskEngine, ChatError>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str) -> Result<ConversationalTaskEngine, ChatError> + Send + Sync,
{
    fn create(&self, user_key: &str) -> Result<ConversationalTaskEngine, ChatError> {
        self(user_key)
    }
}

enum EngineCommand {
    ListTasks {
        reply: Reply<Vec<Task>>,
    },
    MutateTasks {
        mutation: TaskMutation,
        reply: Reply<Vec<Task>>,
    },
    Chat {
        message: String,
        reply: Reply<ChatOutcome>,
    },
    History {
        reply: Reply<Vec<ChatTurn>>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

// =============================================================================
// EngineHandle
// =============================================================================

/// Address of one user's actor.
#[derive(Clone)]
struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    lease: Lease,
}

impl EngineHandle {
    fn spawn(
        user_key: &str,
        engine: ConversationalTaskEngine,
        queue_depth: usize,
        idle_ttl: Option<Duration>,
        lease: Lease,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        tokio::spawn(run_actor(
            Arc::from(user_key),
            engine,
            rx,
            idle_ttl,
            Arc::clone(&lease),
        ));
        Self { tx, lease }
    }

    /// The actor no longer accepts commands.
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// The actor has stopped and finished everything it had queued.
    fn is_finished(&self) -> bool {
        self.is_closed() && self.lease.try_lock().is_ok()
    }

    /// Stop the actor after it finishes the commands queued ahead of this one.
    async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(EngineCommand::Shutdown { ack }).await.is_ok() {
            let _ = done.await;
        }
    }
}

async fn run_actor(
    user_key: Arc<str>,
    engine: ConversationalTaskEngine,
    mut rx: mpsc::Receiver<EngineCommand>,
    idle_ttl: Option<Duration>,
    lease: Lease,
) {
    let _lease = lease.lock_owned().await;
    debug!(user = %user_key, "Engine actor started");

    loop {
        let next = match idle_ttl {
            Some(ttl) => match tokio::time::timeout(ttl, rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!(user = %user_key, idle_secs = ttl.as_secs(), "Engine actor idle, stopping");
                    // Anything queued before the close is still served below.
                    rx.close();
                    continue;
                }
            },
            None => rx.recv().await,
        };
        let Some(command) = next else {
            break;
        };

        // A send error only means the caller stopped waiting.
        match command {
            EngineCommand::ListTasks { reply } => {
                let _ = reply.send(engine.list_tasks());
            }
            EngineCommand::MutateTasks { mutation, reply } => {
                let _ = reply.send(engine.mutate_tasks(mutation));
            }
            EngineCommand::Chat { message, reply } => {
                let _ = reply.send(engine.process_chat_message(&message).await);
            }
            EngineCommand::History { reply } => {
                let _ = reply.send(engine.get_history());
            }
            EngineCommand::Shutdown { ack } => {
                rx.close();
                let _ = ack.send(());
                break;
            }
        }
    }

    debug!(user = %user_key, "Engine actor stopped");
}

// =============================================================================
// EngineRegistry
// =============================================================================

/// User key → actor map. Actors are created lazily, stop themselves when
/// idle, and are respawned on the next request.
pub struct EngineRegistry {
    factory: Arc<dyn EngineFactory>,
    handles: Mutex<HashMap<String, EngineHandle>>,
    queue_depth: usize,
    idle_ttl: Option<Duration>,
}

impl EngineRegistry {
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            handles: Mutex::new(HashMap::new()),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            idle_ttl: Some(DEFAULT_IDLE_TTL),
        }
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// How long an actor may wait for a command before stopping. `None`
    /// keeps actors until [`shutdown`](Self::shutdown).
    pub fn with_idle_ttl(mut self, idle_ttl: Option<Duration>) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub async fn list_tasks(&self, user_key: &str) -> Result<Vec<Task>, ChatError> {
        self.dispatch(user_key, |reply| EngineCommand::ListTasks { reply })
            .await
    }

    pub async fn mutate_tasks(
        &self,
        user_key: &str,
        mutation: TaskMutation,
    ) -> Result<Vec<Task>, ChatError> {
        self.dispatch(user_key, |reply| EngineCommand::MutateTasks { mutation, reply })
            .await
    }

    pub async fn process_chat_message(
        &self,
        user_key: &str,
        message: &str,
    ) -> Result<ChatOutcome, ChatError> {
        let message = message.to_string();
        self.dispatch(user_key, |reply| EngineCommand::Chat { message, reply })
            .await
    }

    pub async fn get_history(&self, user_key: &str) -> Result<Vec<ChatTurn>, ChatError> {
        self.dispatch(user_key, |reply| EngineCommand::History { reply })
            .await
    }

    /// Number of users with a running actor.
    pub fn active_users(&self) -> usize {
        match self.handles.lock() {
            Ok(mut handles) => {
                handles.retain(|_, h| !h.is_finished());
                handles.values().filter(|h| !h.is_closed()).count()
            }
            Err(_) => 0,
        }
    }

    /// Stop every actor, letting queued commands finish first.
    pub async fn shutdown(&self) {
        let handles: Vec<EngineHandle> = match self.handles.lock() {
            Ok(mut map) => map.drain().map(|(_, h)| h).collect(),
            Err(_) => return,
        };
        for handle in &handles {
            handle.shutdown().await;
        }
        info!(stopped = handles.len(), "Engine actors stopped");
    }

    /// Send one command to `user_key`'s actor and wait for the reply.
    async fn dispatch<T>(
        &self,
        user_key: &str,
        build: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        let mut command = build(reply);
        let mut retried = false;
        loop {
            let handle = self.handle(user_key)?;
            match handle.tx.send(command).await {
                Ok(()) => break,
                // The actor went idle between lookup and send; the command
                // comes back untouched and goes to a fresh actor.
                Err(mpsc::error::SendError(returned)) if !retried => {
                    retried = true;
                    command = returned;
                }
                Err(_) => return Err(ChatError::EngineUnavailable(user_key.to_string())),
            }
        }
        response
            .await
            .map_err(|_| ChatError::EngineUnavailable(user_key.to_string()))?
    }

    /// Handle for `user_key`, spawning its actor if needed.
    fn handle(&self, user_key: &str) -> Result<EngineHandle, ChatError> {
        let mut handles = self
            .handles
            .lock()
            .map_err(|e| ChatError::EngineUnavailable(format!("registry lock poisoned: {}", e)))?;

        let lease = match handles.get(user_key) {
            Some(handle) if !handle.is_closed() => return Ok(handle.clone()),
            Some(handle) => Arc::clone(&handle.lease),
            None => Lease::default(),
        };

        let engine = self.factory.create(user_key)?;
        let handle = EngineHandle::spawn(user_key, engine, self.queue_depth, self.idle_ttl, lease);
        handles.retain(|_, h| !h.is_finished());
        handles.insert(user_key.to_string(), handle.clone());
        info!(user = %user_key, active = handles.len(), "Engine actor spawned");
        Ok(handle)
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("active_users", &self.active_users())
            .field("queue_depth", &self.queue_depth)
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}
