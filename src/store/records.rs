// ABOUTME: Record types held by the credential store and their per-kind freshness rules
// ABOUTME: Covers client registrations, authorization sessions and codes, access and refresh tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ttl;
use crate::oauth2_server::models::PkceMethod;

/// A record whose freshness can be judged against a point in time
pub trait Expiring {
    /// True once the record must no longer be returned by a lookup
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool;
}

/// `created_at + ttl <= now`, saturating on overflow
fn aged_out(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    ChronoDuration::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .is_none_or(|deadline| deadline <= now)
}

/// Identity of the human behind an upstream token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Upstream login handle
    pub login: String,
    /// Upstream numeric id
    pub id: i64,
}

/// Token pair issued by the upstream provider
#[derive(Clone)]
pub struct UpstreamToken {
    /// Upstream access token
    pub access_token: String,
    /// Upstream refresh token, when the upstream app issues expiring tokens
    pub refresh_token: Option<String>,
    /// When the upstream access token stops working
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for UpstreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A dynamically registered public client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Server-minted identifier
    pub client_id: String,
    /// Display name supplied at registration
    pub client_name: Option<String>,
    /// Exact redirect URIs the client may use
    pub redirect_uris: Vec<String>,
    /// Allowed grant types
    pub grant_types: Vec<String>,
    /// Allowed response types
    pub response_types: Vec<String>,
    /// Always `none`: public clients only
    pub token_endpoint_auth_method: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl ClientRegistration {
    /// Whether `redirect_uri` exactly matches one of the registered URIs
    #[must_use]
    pub fn allows_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

impl Expiring for ClientRegistration {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        aged_out(self.created_at, ttl::CLIENT_REGISTRATION, now)
    }
}

/// State held between `/oauth/authorize` and the upstream callback
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    /// Client that started the attempt
    pub client_id: String,
    /// Opaque state supplied by the client, echoed back verbatim
    pub client_state: Option<String>,
    /// Redirect URI the client is sent back to
    pub redirect_uri: String,
    /// Whether the client sent `redirect_uri` itself, rather than relying on its single registered URI
    pub redirect_uri_supplied: bool,
    /// PKCE challenge, when the client uses PKCE
    pub code_challenge: Option<String>,
    /// PKCE challenge method
    pub code_challenge_method: Option<PkceMethod>,
    /// Start of the attempt
    pub created_at: DateTime<Utc>,
}

impl Expiring for AuthorizationSession {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        aged_out(self.created_at, ttl::AUTHORIZATION_SESSION, now)
    }
}

/// Authorization code minted after a successful upstream callback
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// Client that started the attempt
    pub client_id: String,
    /// Upstream tokens obtained during the callback
    pub upstream: UpstreamToken,
    /// PKCE challenge carried over from the session
    pub code_challenge: Option<String>,
    /// Redirect URI carried over from the session
    pub redirect_uri: String,
    /// Carried over from the session; an omitted `redirect_uri` may be omitted again at the token endpoint
    pub redirect_uri_supplied: bool,
    /// Authenticated upstream user
    pub user: UserIdentity,
    /// Mint time
    pub created_at: DateTime<Utc>,
}

impl Expiring for AuthorizationCode {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        aged_out(self.created_at, ttl::AUTHORIZATION_CODE, now)
    }
}

/// Bearer access token issued by this server
#[derive(Debug, Clone)]
pub struct AccessTokenRecord {
    /// Upstream tokens the bearer stands for
    pub upstream: UpstreamToken,
    /// Authenticated upstream user
    pub user: UserIdentity,
    /// End of validity
    pub expires_at: DateTime<Utc>,
}

impl Expiring for AccessTokenRecord {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Refresh token issued by this server
#[derive(Clone)]
pub struct RefreshTokenRecord {
    /// Upstream refresh token exchanged on rotation
    pub upstream_refresh_token: String,
    /// Authenticated upstream user
    pub user: UserIdentity,
    /// Mint time
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for RefreshTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRecord")
            .field("upstream_refresh_token", &"[REDACTED]")
            .field("user", &self.user)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Expiring for RefreshTokenRecord {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        aged_out(self.created_at, ttl::REFRESH_TOKEN, now)
    }
}
