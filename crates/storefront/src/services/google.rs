//! Google OAuth 2.0 client for customer sign-in.
//!
//! # Flow
//!
//! 1. `authorization_url()` with a random `state` kept in the session
//! 2. Google redirects back with `code` and `state`
//! 3. `exchange_code()` trades the code for an access token
//! 4. `fetch_profile()` reads the OpenID userinfo of the account

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Errors talking to Google.
#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Google did not vouch for the email address.
    #[error("Google account email is not verified")]
    UnverifiedEmail,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The subset of OpenID userinfo used to find or create an account.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account ID.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    #[must_use]
    pub fn new(config: &GoogleConfig, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                redirect_uri: config.redirect_uri.clone(),
            }),
        }
    }

    /// The consent screen URL for a given CSRF `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.inner.client_id.as_str()),
                ("redirect_uri", self.inner.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_or_else(|_| AUTHORIZE_URL.to_string(), String::from)
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    pub async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GoogleError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::UnverifiedEmail` if Google has not verified the email.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .inner
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GoogleError::OAuth(format!("Userinfo request failed ({status})")));
        }

        let profile: GoogleProfile = response.json().await?;
        if !profile.email_verified {
            return Err(GoogleError::UnverifiedEmail);
        }
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(
            &GoogleConfig {
                client_id: "client-123.apps.googleusercontent.com".to_string(),
                client_secret: SecretString::from("s3cr3t"),
                redirect_uri: "https://api.senmarket.vn/api/auth/google/callback".to_string(),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_authorization_url_encodes_params() {
        let url = Url::parse(&client().authorization_url("abc 123")).unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(
            params["redirect_uri"],
            "https://api.senmarket.vn/api/auth/google/callback"
        );
        assert_eq!(params["state"], "abc 123");
        assert_eq!(params["scope"], "openid email profile");
    }

    #[test]
    fn test_profile_deserializes_without_optional_fields() {
        let profile: GoogleProfile =
            serde_json::from_str(r#"{"sub":"109","email":"lan@gmail.com"}"#).unwrap();
        assert_eq!(profile.sub, "109");
        assert!(!profile.email_verified);
        assert!(profile.name.is_none());
    }
}
