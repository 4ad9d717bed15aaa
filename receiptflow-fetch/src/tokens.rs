//! Credential pool with per-token circuit breakers and round-robin rotation.
//!
//! The [`TokenManager`] owns every fiscal-API credential for the lifetime of
//! the process. Each failed attempt counts against the credential that was
//! used; after `error_threshold` consecutive failures the credential is
//! disabled for `cooldown` and the pointer moves on immediately. A periodic
//! rotation (see [`TokenManager::spawn_rotation`]) spreads load across the
//! pool and performs a full reset when every credential is disabled.
//!
//! The manager never fails once constructed: when nothing is healthy it
//! still serves the first credential.

use chrono::{DateTime, Utc};
use receiptflow_core::mask_credential;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::TokenError;

/// Consecutive errors before a credential is disabled.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;

/// How long a disabled credential stays out of rotation.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

// ============================================================================
// Settings
// ============================================================================

/// Circuit-breaker settings for a credential pool.
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    /// Consecutive errors that disable a credential.
    pub error_threshold: u32,
    /// Cooldown applied to a disabled credential.
    pub cooldown: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

// ============================================================================
// Token State
// ============================================================================

/// Health record of a single credential.
#[derive(Clone)]
struct TokenState {
    value: String,
    success_count: u64,
    /// Consecutive errors, reset by any success.
    error_count: u32,
    disabled: bool,
    disabled_until: Option<Instant>,
    last_error: Option<String>,
    last_used_at: Option<DateTime<Utc>>,
}

impl TokenState {
    fn new(value: String) -> Self {
        Self {
            value,
            success_count: 0,
            error_count: 0,
            disabled: false,
            disabled_until: None,
            last_error: None,
            last_used_at: None,
        }
    }

    fn enable(&mut self) {
        self.disabled = false;
        self.disabled_until = None;
        self.error_count = 0;
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("value", &mask_credential(&self.value))
            .field("success_count", &self.success_count)
            .field("error_count", &self.error_count)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// Read-only snapshot of a credential's health. The credential is masked.
#[derive(Debug, Clone, Serialize)]
pub struct TokenStats {
    /// Masked credential (first 4 + last 4 characters).
    pub masked: String,
    /// Successful attempts.
    pub success_count: u64,
    /// Consecutive failed attempts.
    pub error_count: u32,
    /// Whether the credential is out of rotation.
    pub disabled: bool,
    /// Remaining cooldown in seconds, if disabled.
    pub disabled_for_secs: Option<u64>,
    /// Last recorded error message.
    pub last_error: Option<String>,
    /// Last time the credential was used.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Whether the pointer is on this credential.
    pub current: bool,
}

// ============================================================================
// Token Pool
// ============================================================================

#[derive(Debug)]
struct TokenPool {
    tokens: Vec<TokenState>,
    current: usize,
}

impl TokenPool {
    fn enabled_count(&self) -> usize {
        self.tokens.iter().filter(|t| !t.disabled).count()
    }

    fn reenable_expired(&mut self, now: Instant) {
        for token in &mut self.tokens {
            if token.disabled && token.disabled_until.is_some_and(|until| until <= now) {
                info!(token = %mask_credential(&token.value), "Cooldown elapsed, credential re-enabled");
                token.enable();
            }
        }
    }

    /// First enabled index strictly after `from`, wrapping around.
    fn next_enabled_after(&self, from: usize) -> Option<usize> {
        let len = self.tokens.len();
        (1..=len)
            .map(|offset| (from + offset) % len)
            .find(|&idx| !self.tokens[idx].disabled)
    }

    fn position(&self, credential: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t.value == credential)
    }
}

// ============================================================================
// Token Manager
// ============================================================================

/// Owns a pool of credentials, tracks their health and rotates between them.
#[derive(Debug)]
pub struct TokenManager {
    pool: Mutex<TokenPool>,
    settings: TokenSettings,
}

impl TokenManager {
    /// Creates a manager with default circuit-breaker settings.
    pub fn new(credentials: Vec<String>) -> Result<Self, TokenError> {
        Self::with_settings(credentials, TokenSettings::default())
    }

    /// Creates a manager with custom circuit-breaker settings.
    pub fn with_settings(
        credentials: Vec<String>,
        settings: TokenSettings,
    ) -> Result<Self, TokenError> {
        if credentials.is_empty() {
            return Err(TokenError::EmptyPool);
        }
        if let Some(idx) = credentials.iter().position(|c| c.trim().is_empty()) {
            return Err(TokenError::BlankCredential(idx));
        }

        info!(count = credentials.len(), "Credential pool initialized");

        Ok(Self {
            pool: Mutex::new(TokenPool {
                tokens: credentials.into_iter().map(TokenState::new).collect(),
                current: 0,
            }),
            settings,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TokenPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    /// Returns true if the pool is empty. Never true for a constructed manager.
    pub fn is_empty(&self) -> bool {
        self.lock().tokens.is_empty()
    }

    /// Returns the number of credentials currently in rotation.
    pub fn enabled_count(&self) -> usize {
        self.lock().enabled_count()
    }

    /// Returns the credential to use for the next attempt.
    ///
    /// Expired cooldowns are lifted first. If the pointed-to credential is
    /// disabled, the pointer moves forward to the next enabled one. With
    /// every credential disabled, the first one is returned as a last resort.
    pub fn current_token(&self) -> String {
        let mut pool = self.lock();
        pool.reenable_expired(Instant::now());

        let current = pool.current;
        if pool.tokens[current].disabled {
            match pool.next_enabled_after(current) {
                Some(next) => {
                    debug!(from = current, to = next, "Skipping disabled credential");
                    pool.current = next;
                }
                None => {
                    error!(
                        count = pool.tokens.len(),
                        "All credentials disabled, serving the first one as a last resort"
                    );
                    return pool.tokens[0].value.clone();
                }
            }
        }

        pool.tokens[pool.current].value.clone()
    }

    /// Records a successful attempt with `credential`.
    pub fn record_success(&self, credential: &str) {
        let mut pool = self.lock();
        let Some(idx) = pool.position(credential) else {
            debug!(token = %mask_credential(credential), "Success for unknown credential ignored");
            return;
        };

        let token = &mut pool.tokens[idx];
        token.success_count += 1;
        token.error_count = 0;
        token.last_used_at = Some(Utc::now());
        debug!(token = %mask_credential(credential), successes = token.success_count, "Credential succeeded");
    }

    /// Records a failed attempt with `credential`.
    ///
    /// Reaching the error threshold disables the credential for the cooldown
    /// and moves the pointer off it right away.
    pub fn record_error(&self, credential: &str, message: &str) {
        let mut pool = self.lock();
        let Some(idx) = pool.position(credential) else {
            debug!(token = %mask_credential(credential), "Error for unknown credential ignored");
            return;
        };

        let threshold = self.settings.error_threshold;
        let cooldown = self.settings.cooldown;
        let token = &mut pool.tokens[idx];
        token.error_count += 1;
        token.last_error = Some(message.to_string());
        token.last_used_at = Some(Utc::now());

        warn!(
            token = %mask_credential(credential),
            errors = token.error_count,
            error = %message,
            "Credential attempt failed"
        );

        if token.error_count >= threshold && !token.disabled {
            token.disabled = true;
            token.disabled_until = Some(Instant::now() + cooldown);
            warn!(
                token = %mask_credential(credential),
                cooldown_secs = cooldown.as_secs(),
                "Credential disabled"
            );

            if pool.current == idx {
                if let Some(next) = pool.next_enabled_after(idx) {
                    pool.current = next;
                }
            }
        }
    }

    /// Advances the pointer to the next enabled credential.
    ///
    /// With nothing enabled, every credential is re-enabled instead.
    pub fn rotate(&self) {
        let mut pool = self.lock();
        pool.reenable_expired(Instant::now());

        if pool.enabled_count() == 0 {
            warn!(count = pool.tokens.len(), "No credentials enabled, resetting the whole pool");
            for token in &mut pool.tokens {
                token.enable();
            }
            pool.current = 0;
            return;
        }

        let current = pool.current;
        if let Some(next) = pool.next_enabled_after(current) {
            pool.current = next;
        }
        debug!(current = pool.current, "Rotated credential pointer");
    }

    /// Moves the pointer off `credential` to the next enabled credential.
    ///
    /// Used between failed attempts so a retry goes out with a different
    /// credential. Unlike [`rotate`](Self::rotate) this never resets the pool.
    /// Does nothing if `credential` is no longer the current one.
    pub fn advance_from(&self, credential: &str) {
        let mut pool = self.lock();
        pool.reenable_expired(Instant::now());

        let current = pool.current;
        if pool.tokens[current].value != credential {
            return;
        }
        if let Some(next) = pool.next_enabled_after(current) {
            pool.current = next;
        }
    }

    /// Returns a masked snapshot of every credential.
    pub fn stats(&self) -> Vec<TokenStats> {
        let pool = self.lock();
        let now = Instant::now();

        pool.tokens
            .iter()
            .enumerate()
            .map(|(idx, token)| TokenStats {
                masked: mask_credential(&token.value),
                success_count: token.success_count,
                error_count: token.error_count,
                disabled: token.disabled,
                disabled_for_secs: token
                    .disabled_until
                    .map(|until| until.saturating_duration_since(now).as_secs()),
                last_error: token.last_error.clone(),
                last_used_at: token.last_used_at,
                current: idx == pool.current,
            })
            .collect()
    }

    /// Spawns the periodic rotation task.
    ///
    /// The task lives until the returned handle is shut down or dropped.
    pub fn spawn_rotation(self: &Arc<Self>, period: Duration) -> RotationHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let manager = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // Missed ticks after a stall must not rotate several times in a row.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => manager.rotate(),
                }
            }
            debug!("Credential rotation stopped");
        });

        info!(period_secs = period.as_secs(), "Credential rotation started");
        RotationHandle {
            cancel,
            task: Some(task),
        }
    }
}

// ============================================================================
// Rotation Handle
// ============================================================================

/// Owner of the periodic rotation task. Dropping it stops the task.
#[derive(Debug)]
pub struct RotationHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RotationHandle {
    /// Stops the rotation task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
