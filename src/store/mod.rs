// ABOUTME: In-memory credential store with per-kind freshness checks and a background reaper
// ABOUTME: Provides save/get/take/delete over sessions, codes, tokens and client registrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Credential Store
//!
//! Five tables of opaque-key records, each behind its own `RwLock`. Lookups never
//! return a record past its freshness deadline, whether or not the reaper has run
//! yet. Single-use records (sessions, codes, refresh tokens) are consumed with
//! [`RecordTable::take`], which checks and removes under one write lock.
//!
//! The reaper is a background task owned by the store; it stops on
//! [`CredentialStore::close`] or when the store is dropped.

/// Record types and their freshness rules
pub mod records;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use records::{
    AccessTokenRecord, AuthorizationCode, AuthorizationSession, ClientRegistration, Expiring,
    RefreshTokenRecord, UpstreamToken, UserIdentity,
};

/// Insertion refused because the table already holds its maximum of live records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} table is full ({limit} live records)")]
pub struct CapacityExceeded {
    /// Table name
    pub kind: &'static str,
    /// Configured limit
    pub limit: usize,
}

/// One keyed table of records of a single kind
pub struct RecordTable<R> {
    kind: &'static str,
    entries: Arc<RwLock<HashMap<String, R>>>,
}

impl<R> Clone for RecordTable<R> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<R: Expiring + Clone + Send + Sync> RecordTable<R> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Table name used in logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Store `record` under `key`, replacing any previous record
    pub async fn save(&self, key: impl Into<String>, record: R) {
        self.entries.write().await.insert(key.into(), record);
    }

    /// Store `record` unless the table already holds `limit` live records
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded`] when the live count has reached `limit`
    pub async fn save_within_capacity(
        &self,
        key: impl Into<String>,
        record: R,
        limit: usize,
    ) -> Result<(), CapacityExceeded> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let live = entries.values().filter(|r| !r.is_expired_at(now)).count();
        if live >= limit {
            return Err(CapacityExceeded {
                kind: self.kind,
                limit,
            });
        }
        entries.insert(key.into(), record);
        Ok(())
    }

    /// Fetch a live record without consuming it
    pub async fn get(&self, key: &str) -> Option<R> {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|record| !record.is_expired_at(now))
            .cloned()
    }

    /// Remove and return a live record in one step
    ///
    /// A stale record is removed as well but reported as absent.
    pub async fn take(&self, key: &str) -> Option<R> {
        let now = Utc::now();
        self.entries
            .write()
            .await
            .remove(key)
            .filter(|record| !record.is_expired_at(now))
    }

    /// Remove a record; absent keys are ignored
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Number of live records
    pub async fn count(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|record| !record.is_expired_at(now))
            .count()
    }

    /// Physically remove every record stale at `now`, returning how many were dropped
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired_at(now));
        before - entries.len()
    }
}

/// Concurrent in-memory store for every credential the server issues
pub struct CredentialStore {
    sessions: RecordTable<AuthorizationSession>,
    authorization_codes: RecordTable<AuthorizationCode>,
    access_tokens: RecordTable<AccessTokenRecord>,
    refresh_tokens: RecordTable<RefreshTokenRecord>,
    clients: RecordTable<ClientRegistration>,
    shutdown: CancellationToken,
}

impl CredentialStore {
    /// Create an empty store and start its reaper
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(reaper_interval: Duration) -> Self {
        let store = Self {
            sessions: RecordTable::new("authorization_sessions"),
            authorization_codes: RecordTable::new("authorization_codes"),
            access_tokens: RecordTable::new("access_tokens"),
            refresh_tokens: RecordTable::new("refresh_tokens"),
            clients: RecordTable::new("client_registrations"),
            shutdown: CancellationToken::new(),
        };
        store.spawn_reaper(reaper_interval);
        store
    }

    fn reaper(&self) -> Reaper {
        Reaper {
            sessions: self.sessions.clone(),
            authorization_codes: self.authorization_codes.clone(),
            access_tokens: self.access_tokens.clone(),
            refresh_tokens: self.refresh_tokens.clone(),
            clients: self.clients.clone(),
        }
    }

    fn spawn_reaper(&self, period: Duration) {
        let tables = self.reaper();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tables.sweep(Utc::now()).await;
                    }
                    () = shutdown.cancelled() => {
                        debug!("Credential store reaper received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    /// Pending authorization sessions keyed by internal state
    #[must_use]
    pub const fn sessions(&self) -> &RecordTable<AuthorizationSession> {
        &self.sessions
    }

    /// Authorization codes awaiting exchange
    #[must_use]
    pub const fn authorization_codes(&self) -> &RecordTable<AuthorizationCode> {
        &self.authorization_codes
    }

    /// Issued bearer tokens
    #[must_use]
    pub const fn access_tokens(&self) -> &RecordTable<AccessTokenRecord> {
        &self.access_tokens
    }

    /// Issued refresh tokens
    #[must_use]
    pub const fn refresh_tokens(&self) -> &RecordTable<RefreshTokenRecord> {
        &self.refresh_tokens
    }

    /// Dynamically registered clients
    #[must_use]
    pub const fn clients(&self) -> &RecordTable<ClientRegistration> {
        &self.clients
    }

    /// Sweep every table immediately, returning the number of records removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.reaper().sweep(now).await
    }

    /// Stop the background reaper
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Table handles owned by the reaper task
struct Reaper {
    sessions: RecordTable<AuthorizationSession>,
    authorization_codes: RecordTable<AuthorizationCode>,
    access_tokens: RecordTable<AccessTokenRecord>,
    refresh_tokens: RecordTable<RefreshTokenRecord>,
    clients: RecordTable<ClientRegistration>,
}

impl Reaper {
    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let counts = [
            (self.sessions.kind(), self.sessions.sweep(now).await),
            (
                self.authorization_codes.kind(),
                self.authorization_codes.sweep(now).await,
            ),
            (self.access_tokens.kind(), self.access_tokens.sweep(now).await),
            (
                self.refresh_tokens.kind(),
                self.refresh_tokens.sweep(now).await,
            ),
            (self.clients.kind(), self.clients.sweep(now).await),
        ];

        let mut removed = 0;
        for (kind, count) in counts {
            if count > 0 {
                debug!("Cleaned up {} expired {} entries", count, kind);
            }
            removed += count;
        }
        removed
    }
}
