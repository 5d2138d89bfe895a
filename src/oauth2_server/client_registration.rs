// ABOUTME: OAuth 2.0 dynamic client registration implementation (RFC 7591)
// ABOUTME: Validates public-client metadata and records registrations in the credential store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use super::endpoints::generate_random_string;
use super::models::{ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error};
use crate::constants::{limits, oauth, token_sizes};
use crate::store::{ClientRegistration, CredentialStore};

/// OAuth 2.0 Client Registration Manager
pub struct ClientRegistrationManager {
    store: Arc<CredentialStore>,
}

impl ClientRegistrationManager {
    /// Creates a new client registration manager
    #[must_use]
    pub const fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Register a new public OAuth 2.0 client (RFC 7591)
    ///
    /// # Errors
    /// Returns `too_many_requests` when the registration cap is reached,
    /// `invalid_redirect_uri` for a disallowed redirect URI, and
    /// `invalid_client_metadata` for any other validation failure
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        // Cheap pre-check; the authoritative check happens under the write lock below
        if self.store.clients().count().await >= limits::MAX_CLIENT_REGISTRATIONS {
            tracing::warn!("Client registration refused: registration cap reached");
            return Err(OAuth2Error::too_many_requests(
                "Too many client registrations",
            ));
        }

        Self::validate_registration_request(&request)?;

        let grant_types = request
            .grant_types
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| vec![oauth::GRANT_AUTHORIZATION_CODE.to_owned()]);
        let response_types = request
            .response_types
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| vec![oauth::RESPONSE_TYPE_CODE.to_owned()]);
        let token_endpoint_auth_method = request
            .token_endpoint_auth_method
            .filter(|method| !method.is_empty())
            .unwrap_or_else(|| oauth::AUTH_METHOD_NONE.to_owned());

        let client_id = generate_random_string(token_sizes::CLIENT_ID_BYTES)?;
        let created_at = Utc::now();

        let registration = ClientRegistration {
            client_id: client_id.clone(),
            client_name: request.client_name.filter(|name| !name.is_empty()),
            redirect_uris: request.redirect_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method,
            created_at,
        };

        self.store
            .clients()
            .save_within_capacity(
                client_id.clone(),
                registration.clone(),
                limits::MAX_CLIENT_REGISTRATIONS,
            )
            .await
            .map_err(|e| {
                tracing::warn!("Client registration refused: {}", e);
                OAuth2Error::too_many_requests("Too many client registrations")
            })?;

        tracing::info!(
            client_id = %client_id,
            client_name = registration.client_name.as_deref().unwrap_or(""),
            redirect_uris = ?registration.redirect_uris,
            "Registered OAuth client"
        );

        Ok(ClientRegistrationResponse {
            client_id,
            client_name: registration.client_name,
            redirect_uris: registration.redirect_uris,
            grant_types: registration.grant_types,
            response_types: registration.response_types,
            token_endpoint_auth_method: registration.token_endpoint_auth_method,
            client_id_issued_at: created_at.timestamp(),
        })
    }

    /// Look up a live registration
    pub async fn get_client(&self, client_id: &str) -> Option<ClientRegistration> {
        self.store.clients().get(client_id).await
    }

    /// Validate registration request
    fn validate_registration_request(
        request: &ClientRegistrationRequest,
    ) -> Result<(), OAuth2Error> {
        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_client_metadata(
                "redirect_uris is required and must not be empty",
            ));
        }

        for uri in &request.redirect_uris {
            if !is_valid_redirect_uri(uri) {
                return Err(OAuth2Error::invalid_redirect_uri(&format!(
                    "redirect_uri must use http://127.0.0.1, http://localhost or https scheme: {uri}"
                )));
            }
        }

        if let Some(grant_types) = &request.grant_types {
            for grant_type in grant_types {
                if !is_supported_grant_type(grant_type) {
                    return Err(OAuth2Error::invalid_client_metadata(&format!(
                        "Unsupported grant_type: {grant_type}"
                    )));
                }
            }
        }

        if let Some(response_types) = &request.response_types {
            for response_type in response_types {
                if response_type != oauth::RESPONSE_TYPE_CODE {
                    return Err(OAuth2Error::invalid_client_metadata(&format!(
                        "Unsupported response_type: {response_type}"
                    )));
                }
            }
        }

        if let Some(method) = request.token_endpoint_auth_method.as_deref() {
            if !method.is_empty() && method != oauth::AUTH_METHOD_NONE {
                return Err(OAuth2Error::invalid_client_metadata(
                    "Only token_endpoint_auth_method 'none' is supported (public clients)",
                ));
            }
        }

        Ok(())
    }
}

/// Redirect URI allow policy: `https` anywhere, `http` only on loopback
///
/// Fragments and wildcards are always rejected.
#[must_use]
pub fn is_valid_redirect_uri(uri: &str) -> bool {
    if uri.trim().is_empty() || uri.contains('#') || uri.contains('*') {
        tracing::warn!("Rejected redirect_uri with fragment or wildcard: {}", uri);
        return false;
    }

    let Ok(parsed_uri) = Url::parse(uri) else {
        tracing::warn!("Rejected malformed redirect_uri: {}", uri);
        return false;
    };

    let Some(host) = parsed_uri.host_str().filter(|host| !host.is_empty()) else {
        tracing::warn!("Rejected redirect_uri without host: {}", uri);
        return false;
    };

    match parsed_uri.scheme() {
        "https" => true,
        "http" if matches!(host, "localhost" | "127.0.0.1") => true,
        _ => {
            tracing::warn!(
                "Rejected redirect_uri with non-HTTPS scheme for non-loopback host: {}",
                uri
            );
            false
        }
    }
}

/// Check if grant type is supported
fn is_supported_grant_type(grant_type: &str) -> bool {
    matches!(
        grant_type,
        oauth::GRANT_AUTHORIZATION_CODE | oauth::GRANT_REFRESH_TOKEN
    )
}
