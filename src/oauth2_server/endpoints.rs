// ABOUTME: OAuth 2.0 authorization, upstream callback and token endpoints implementation
// ABOUTME: Bridges upstream GitHub sign-in to opaque bearer tokens with PKCE and refresh rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use url::Url;

use super::client_registration::ClientRegistrationManager;
use super::models::{
    AuthorizeRequest, CallbackRequest, OAuth2Error, PkceMethod, TokenRequest, TokenResponse,
};
use crate::config::ServerConfig;
use crate::constants::{oauth, token_sizes, ttl};
use crate::logging::{token_prefix, AppLogger};
use crate::store::{
    AccessTokenRecord, AuthorizationCode, AuthorizationSession, CredentialStore,
    RefreshTokenRecord, UpstreamToken, UserIdentity,
};
use crate::upstream::{UpstreamError, UpstreamIdentityClient};

/// Settings the flow needs from the server configuration
#[derive(Debug, Clone)]
struct FlowSettings {
    upstream_client_id: String,
    callback_url: String,
    allowed_organization: Option<String>,
}

/// OAuth 2.0 Authorization Server
///
/// Holds no mutable state of its own; every fact lives in the credential store.
pub struct OAuth2AuthorizationServer {
    client_manager: ClientRegistrationManager,
    store: Arc<CredentialStore>,
    upstream: Arc<dyn UpstreamIdentityClient>,
    settings: FlowSettings,
}

impl OAuth2AuthorizationServer {
    /// Create the authorization server over a shared store and upstream client
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        store: Arc<CredentialStore>,
        upstream: Arc<dyn UpstreamIdentityClient>,
    ) -> Self {
        Self {
            client_manager: ClientRegistrationManager::new(Arc::clone(&store)),
            store,
            upstream,
            settings: FlowSettings {
                upstream_client_id: config.upstream.client_id.clone(),
                callback_url: config.callback_url(),
                allowed_organization: config.allowed_organization.clone(),
            },
        }
    }

    /// Dynamic client registration manager
    #[must_use]
    pub const fn client_manager(&self) -> &ClientRegistrationManager {
        &self.client_manager
    }

    /// Handle authorization request (GET /oauth/authorize)
    ///
    /// Returns the upstream authorize URL the browser must be redirected to.
    ///
    /// # Errors
    /// Returns `invalid_request` for a missing `client_id`, a redirect URI outside a
    /// registered client's list, or a challenge method other than `S256`
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<String, OAuth2Error> {
        let client_id = request
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing required parameter: client_id"))?;

        let requested_redirect = request.redirect_uri.filter(|uri| !uri.is_empty());
        let redirect_uri_supplied = requested_redirect.is_some();

        // Unregistered client ids may proceed; only registered clients are held to their list
        let redirect_uri = match self.client_manager.get_client(&client_id).await {
            Some(client) => match requested_redirect {
                Some(uri) if client.allows_redirect_uri(&uri) => uri,
                Some(uri) => {
                    tracing::warn!(
                        client_id = %client_id,
                        redirect_uri = %uri,
                        "Rejected authorize request with unregistered redirect_uri"
                    );
                    return Err(OAuth2Error::invalid_request(
                        "redirect_uri does not match registered URIs",
                    ));
                }
                None => match client.redirect_uris.as_slice() {
                    [only] => only.clone(),
                    _ => {
                        return Err(OAuth2Error::invalid_request(
                            "Missing required parameter: redirect_uri",
                        ))
                    }
                },
            },
            None => requested_redirect.ok_or_else(|| {
                OAuth2Error::invalid_request("Missing required parameter: redirect_uri")
            })?,
        };

        if Url::parse(&redirect_uri).is_err() {
            return Err(OAuth2Error::invalid_request("redirect_uri must be an absolute URI"));
        }

        let code_challenge = request.code_challenge.filter(|c| !c.is_empty());
        let code_challenge_method = match request.code_challenge_method.as_deref() {
            None | Some("") => code_challenge.as_ref().map(|_| PkceMethod::S256),
            Some(method) => Some(PkceMethod::parse(method).ok_or_else(|| {
                OAuth2Error::invalid_request("Only S256 code challenge method supported")
            })?),
        };

        let internal_state = generate_random_string(token_sizes::STATE_BYTES)?;

        self.store
            .sessions()
            .save(
                internal_state.clone(),
                AuthorizationSession {
                    client_id: client_id.clone(),
                    client_state: request.state,
                    redirect_uri,
                    redirect_uri_supplied,
                    code_challenge,
                    code_challenge_method,
                    created_at: Utc::now(),
                },
            )
            .await;

        tracing::debug!(
            client_id = %client_id,
            state = %token_prefix(&internal_state),
            "Authorization session started"
        );

        self.upstream_authorize_url(&internal_state)
    }

    /// Build the upstream authorize URL carrying the internal state
    fn upstream_authorize_url(&self, internal_state: &str) -> Result<String, OAuth2Error> {
        Url::parse_with_params(
            oauth::GITHUB_AUTHORIZE_URL,
            &[
                ("client_id", self.settings.upstream_client_id.as_str()),
                ("redirect_uri", self.settings.callback_url.as_str()),
                ("state", internal_state),
                ("scope", oauth::UPSTREAM_SCOPES),
            ],
        )
        .map(String::from)
        .map_err(|e| {
            tracing::error!("Failed to build upstream authorize URL: {}", e);
            OAuth2Error::server_error("Failed to build upstream authorize URL")
        })
    }

    /// Handle the upstream redirect (GET /oauth/callback)
    ///
    /// Returns the client redirect URL carrying the new code and the client's state.
    ///
    /// # Errors
    /// Returns `invalid_request` for upstream errors and unknown state, `access_denied`
    /// for identities outside the allowed organization, and `server_error` when the
    /// upstream provider fails
    pub async fn callback(&self, request: CallbackRequest) -> Result<String, OAuth2Error> {
        if let Some(error) = request.error.filter(|e| !e.is_empty()) {
            let description = request.error_description.unwrap_or_default();
            tracing::warn!("Upstream authorization failed: {} - {}", error, description);
            return Err(OAuth2Error::invalid_request(&format!(
                "GitHub OAuth error: {error} - {description}"
            )));
        }

        let state = request.state.unwrap_or_default();
        let session = self
            .store
            .sessions()
            .take(&state)
            .await
            .ok_or_else(|| OAuth2Error::invalid_request("Invalid or expired state"))?;

        let upstream_code = request
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing required parameter: code"))?;

        let upstream_token = self.upstream.exchange_code(&upstream_code).await.map_err(|e| {
            tracing::error!(
                "Failed to exchange upstream code for client_id={}: {:#}",
                session.client_id,
                e
            );
            OAuth2Error::server_error("Failed to exchange code with GitHub")
        })?;

        let user = self
            .upstream
            .get_user(&upstream_token.access_token)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch upstream user: {:#}", e);
                OAuth2Error::server_error("Failed to get GitHub user")
            })?;

        if let Some(org) = &self.settings.allowed_organization {
            self.ensure_org_member(&upstream_token, &user.login, org)
                .await?;
        }

        let code = generate_random_string(token_sizes::AUTHORIZATION_CODE_BYTES)?;
        let redirect = client_redirect_url(
            &session.redirect_uri,
            &code,
            session.client_state.as_deref(),
        )?;

        self.store
            .authorization_codes()
            .save(
                code,
                AuthorizationCode {
                    client_id: session.client_id.clone(),
                    upstream: upstream_token,
                    code_challenge: session.code_challenge,
                    redirect_uri: session.redirect_uri,
                    redirect_uri_supplied: session.redirect_uri_supplied,
                    user: UserIdentity {
                        login: user.login.clone(),
                        id: user.id,
                    },
                    created_at: Utc::now(),
                },
            )
            .await;

        AppLogger::log_oauth_event(&session.client_id, &user.login, "code_issued", true);
        Ok(redirect)
    }

    async fn ensure_org_member(
        &self,
        upstream_token: &UpstreamToken,
        login: &str,
        org: &str,
    ) -> Result<(), OAuth2Error> {
        match self
            .upstream
            .check_org_membership(&upstream_token.access_token, org)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                AppLogger::log_security_event(
                    "org_membership_denied",
                    "medium",
                    &format!("not a member of {org}"),
                    Some(login),
                );
                Err(OAuth2Error::access_denied(&format!(
                    "Access denied: You must be a member of the {org} organization"
                )))
            }
            Err(e) => {
                tracing::error!("Failed to check organization membership for {}: {:#}", login, e);
                Err(OAuth2Error::server_error(
                    "Failed to verify organization membership",
                ))
            }
        }
    }

    /// Handle token request (POST /oauth/token)
    ///
    /// # Errors
    /// Returns `unsupported_grant_type`, `invalid_request`, `invalid_grant` or
    /// `invalid_client` per RFC 6749 Section 5.2
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        match request.grant_type.as_deref() {
            Some(oauth::GRANT_AUTHORIZATION_CODE) => {
                self.handle_authorization_code_grant(request).await
            }
            Some(oauth::GRANT_REFRESH_TOKEN) => self.handle_refresh_token_grant(request).await,
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    /// Handle authorization code grant
    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;

        // Single use: the code is gone whether or not the checks below pass
        let auth_code = self
            .store
            .authorization_codes()
            .take(&code)
            .await
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired authorization code"))?;

        if let Some(client_id) = request.client_id.as_deref().filter(|id| !id.is_empty()) {
            if !auth_code.client_id.is_empty() && auth_code.client_id != client_id {
                tracing::warn!(
                    "Authorization code presented by client_id={} but issued to {}",
                    client_id,
                    auth_code.client_id
                );
                return Err(OAuth2Error::invalid_client("client_id mismatch"));
            }
        }

        // RFC 6749 Section 4.1.3: required here only if it was sent to /authorize
        let presented_redirect = request.redirect_uri.as_deref().filter(|uri| !uri.is_empty());
        let redirect_matches = match presented_redirect {
            Some(uri) => uri == auth_code.redirect_uri,
            None => !auth_code.redirect_uri_supplied,
        };
        if !redirect_matches {
            return Err(OAuth2Error::invalid_grant("Redirect URI mismatch"));
        }

        if let Some(challenge) = auth_code.code_challenge.as_deref() {
            let verified = request
                .code_verifier
                .as_deref()
                .is_some_and(|verifier| verify_pkce(verifier, challenge));
            if !verified {
                tracing::warn!(
                    "PKCE verification failed for client {} - code_verifier does not match code_challenge",
                    auth_code.client_id
                );
                return Err(OAuth2Error::invalid_grant("PKCE verification failed"));
            }
        }

        let upstream_refresh = auth_code.upstream.refresh_token.clone().unwrap_or_default();
        let response = self
            .issue_token_pair(auth_code.upstream, upstream_refresh, auth_code.user.clone())
            .await?;

        AppLogger::log_oauth_event(&auth_code.client_id, &auth_code.user.login, "token_issued", true);
        Ok(response)
    }

    /// Handle refresh token grant with rotation
    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token = request
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

        let old_record = self
            .store
            .refresh_tokens()
            .take(&refresh_token)
            .await
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        let upstream_token = match self
            .upstream
            .refresh_token(&old_record.upstream_refresh_token)
            .await
        {
            Ok(token) => token,
            Err(UpstreamError::OAuth { error, description }) => {
                tracing::warn!(
                    "Upstream rejected refresh for {}: {} - {}",
                    old_record.user.login,
                    error,
                    description
                );
                return Err(OAuth2Error::invalid_grant("Failed to refresh GitHub token"));
            }
            Err(e) => {
                tracing::error!(
                    "Upstream refresh failed for {}: {:#}",
                    old_record.user.login,
                    e
                );
                // Transient failure: the presented token stays usable for a retry
                self.store
                    .refresh_tokens()
                    .save(refresh_token, old_record)
                    .await;
                return Err(OAuth2Error::server_error("Failed to refresh GitHub token"));
            }
        };

        let upstream_refresh = upstream_token
            .refresh_token
            .clone()
            .unwrap_or(old_record.upstream_refresh_token);
        let response = self
            .issue_token_pair(upstream_token, upstream_refresh, old_record.user.clone())
            .await?;

        tracing::info!(
            "Refresh token rotated for user {} ({} -> {})",
            old_record.user.login,
            token_prefix(&refresh_token),
            response.refresh_token.as_deref().map_or("", token_prefix)
        );
        Ok(response)
    }

    /// Mint and store a new access/refresh pair; nothing is stored unless both mint
    async fn issue_token_pair(
        &self,
        upstream: UpstreamToken,
        upstream_refresh_token: String,
        user: UserIdentity,
    ) -> Result<TokenResponse, OAuth2Error> {
        let access_token = generate_random_string(token_sizes::ACCESS_TOKEN_BYTES)?;
        let refresh_token = generate_random_string(token_sizes::REFRESH_TOKEN_BYTES)?;
        let now = Utc::now();

        self.store
            .access_tokens()
            .save(
                access_token.clone(),
                AccessTokenRecord {
                    upstream,
                    user: user.clone(),
                    expires_at: now + Duration::seconds(ttl::ACCESS_TOKEN_SECS),
                },
            )
            .await;
        self.store
            .refresh_tokens()
            .save(
                refresh_token.clone(),
                RefreshTokenRecord {
                    upstream_refresh_token,
                    user,
                    created_at: now,
                },
            )
            .await;

        Ok(TokenResponse {
            access_token,
            token_type: oauth::TOKEN_TYPE_BEARER.to_owned(),
            expires_in: ttl::ACCESS_TOKEN_SECS,
            refresh_token: Some(refresh_token),
        })
    }
}

/// Append `code` and the client's `state` to its redirect URI, keeping existing query pairs
fn client_redirect_url(
    redirect_uri: &str,
    code: &str,
    client_state: Option<&str>,
) -> Result<String, OAuth2Error> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        tracing::error!("Stored redirect_uri {} failed to parse: {}", redirect_uri, e);
        OAuth2Error::server_error("Invalid stored redirect_uri")
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = client_state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.into())
}

/// S256 check: `base64url-no-pad(SHA-256(verifier)) == challenge`, compared in constant time
#[must_use]
pub fn verify_pkce(code_verifier: &str, code_challenge: &str) -> bool {
    let computed_challenge = pkce_challenge(code_verifier);
    computed_challenge
        .as_bytes()
        .ct_eq(code_challenge.as_bytes())
        .into()
}

/// Derive the S256 challenge for a verifier
#[must_use]
pub fn pkce_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate `byte_len` random bytes, URL-safe base64 encoded without padding
///
/// # Errors
/// Returns `server_error` if the system RNG fails; the server cannot mint
/// unguessable credentials without it
pub fn generate_random_string(byte_len: usize) -> Result<String, OAuth2Error> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; byte_len];

    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!(
            "CRITICAL: SystemRandom failed - cannot generate secure random bytes: {}",
            e
        );
        OAuth2Error::server_error("System RNG failure")
    })?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}
