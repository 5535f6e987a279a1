//! Capability store implementation
//!
//! Tokens live only in process memory. All operations go through a single
//! lock around the token map; lookups take the shared side, issuance and
//! sweeps take the exclusive side. Nothing blocks while the lock is held.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::TokenError;

/// Number of random bytes behind every token (128 bits)
pub const TOKEN_BYTES: usize = 16;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Default delay between two sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// A token bound to a library path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    /// Opaque URL-safe token string
    pub token: String,
    /// Path the token grants access to
    pub path: String,
    /// Issuance time
    pub created_at: Instant,
}

impl CapabilityToken {
    /// Valid while `now - created_at <= ttl`
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// In-memory token store with a fixed TTL
pub struct CapabilityStore {
    tokens: RwLock<HashMap<String, CapabilityToken>>,
    ttl: Duration,
}

impl CapabilityStore {
    /// Create an empty store whose tokens live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently held, expired-but-unswept ones included
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    /// Issue a fresh token for `path`.
    ///
    /// The caller is responsible for checking that `path` exists and that
    /// the requester may access it. Collisions are not checked for.
    pub fn issue_token(&self, path: impl Into<String>) -> String {
        let token = Self::generate_token();
        let entry = CapabilityToken {
            token: token.clone(),
            path: path.into(),
            created_at: Instant::now(),
        };

        tracing::debug!(path = %entry.path, "Issued capability token");

        self.tokens.write().insert(token.clone(), entry);
        token
    }

    /// Resolve a token back to its path.
    ///
    /// Expired entries are reported as [`TokenError::Expired`] until the
    /// sweep removes them, after which they are [`TokenError::NotFound`].
    pub fn resolve(&self, token: &str) -> Result<String, TokenError> {
        let now = Instant::now();
        let tokens = self.tokens.read();

        let entry = tokens.get(token).ok_or(TokenError::NotFound)?;
        if entry.is_expired(now, self.ttl) {
            return Err(TokenError::Expired);
        }
        Ok(entry.path.clone())
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;

        let removed = {
            let mut tokens = self.tokens.write();
            let before = tokens.len();
            tokens.retain(|_, entry| !entry.is_expired(now, ttl));
            before - tokens.len()
        };

        if removed > 0 {
            tracing::debug!(removed, "Swept expired capability tokens");
        }
        removed
    }

    /// Spawn a task running [`sweep`](Self::sweep) every `interval`.
    ///
    /// The first sweep happens one interval after the call. The task holds
    /// only a weak reference, so it also exits once the store is dropped.
    /// Must be called from within a tokio runtime.
    pub fn start_sweeping(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        let cancel = CancellationToken::new();
        let store = Arc::downgrade(self);
        let task = tokio::spawn(Self::sweep_loop(store, interval, cancel.clone()));

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            ttl_secs = self.ttl.as_secs(),
            "Capability token sweeper started"
        );

        SweepHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn sweep_loop(store: Weak<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    match store.upgrade() {
                        Some(store) => {
                            store.sweep();
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::debug!("Capability token sweeper stopped");
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

impl Default for CapabilityStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

/// Cancellation handle for the background sweep.
///
/// Dropping the handle cancels the task without waiting for it.
pub struct SweepHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Cancel the sweep and wait until the task has exited.
    ///
    /// A sweep already running completes; none starts afterwards.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Sweep task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
