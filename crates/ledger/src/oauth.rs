use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use musicshare_core::{Service, TransportError};

use crate::credentials::AuthorizedUser;

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Loopback redirect; after consent the browser lands on it with `?code=...` in the address bar.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";
/// Refresh this long before the access token's reported expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, issued_at: Instant, lifetime: Duration) -> Self {
        Self { value: SecretString::from(value.into()), expires_at: issued_at + lifetime }
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Browser URL that asks the user to grant spreadsheet access with offline refresh.
pub fn consent_url(client_id: &str, redirect_uri: &str) -> Result<Url, TransportError> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", SHEETS_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|error| TransportError::Decode {
        service: Service::Ledger,
        message: error.to_string(),
    })
}

/// Trades a one-time consent code for a persisted refresh grant.
pub async fn exchange_code(
    http: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &SecretString,
    code: &str,
    redirect_uri: &str,
) -> Result<AuthorizedUser, TransportError> {
    let token = post_token_form(
        http,
        token_url,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.trim()),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("redirect_uri", redirect_uri),
        ],
    )
    .await?;

    let refresh_token = token.refresh_token.filter(|value| !value.is_empty()).ok_or_else(|| {
        TransportError::Decode {
            service: Service::Ledger,
            message: "token endpoint returned no refresh token; revoke access and retry"
                .to_owned(),
        }
    })?;

    Ok(AuthorizedUser {
        client_id: client_id.to_owned(),
        client_secret: client_secret.clone(),
        refresh_token: refresh_token.into(),
    })
}

pub async fn refresh_access_token(
    http: &Client,
    token_url: &str,
    user: &AuthorizedUser,
) -> Result<AccessToken, TransportError> {
    let issued_at = Instant::now();
    let token = post_token_form(
        http,
        token_url,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.expose_secret()),
            ("refresh_token", user.refresh_token.expose_secret()),
        ],
    )
    .await?;

    let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3_600));
    Ok(AccessToken::new(token.access_token, issued_at, lifetime))
}

async fn post_token_form(
    http: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, TransportError> {
    let response = http.post(token_url).form(form).send().await.map_err(|error| {
        TransportError::Request {
            service: Service::Ledger,
            message: format!("oauth token request failed: {error}"),
        }
    })?;

    if !response.status().is_success() {
        return Err(TransportError::Status {
            service: Service::Ledger,
            status: response.status().as_u16(),
        });
    }

    let token: TokenResponse = response.json().await.map_err(|error| TransportError::Decode {
        service: Service::Ledger,
        message: format!("failed to decode oauth token response: {error}"),
    })?;
    if token.access_token.is_empty() {
        return Err(TransportError::Decode {
            service: Service::Ledger,
            message: "token endpoint returned empty access token".to_owned(),
        });
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{consent_url, AccessToken, DEFAULT_REDIRECT_URI, EXPIRY_MARGIN};

    #[test]
    fn consent_url_requests_offline_spreadsheet_scope() {
        let url = consent_url("abc.apps.googleusercontent.com", DEFAULT_REDIRECT_URI)
            .expect("valid url");

        let pairs: Vec<(String, String)> =
            url.query_pairs().map(|(key, value)| (key.into_owned(), value.into_owned())).collect();
        assert!(pairs.contains(&("access_type".to_owned(), "offline".to_owned())));
        assert!(pairs.contains(&(
            "scope".to_owned(),
            "https://www.googleapis.com/auth/spreadsheets".to_owned()
        )));
        assert!(pairs.contains(&("redirect_uri".to_owned(), "http://localhost".to_owned())));
        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    }

    #[test]
    fn token_goes_stale_inside_expiry_margin() {
        let issued = Instant::now();
        let token = AccessToken::new("ya29", issued, Duration::from_secs(3_600));

        assert!(token.is_fresh(issued));
        assert!(token.is_fresh(issued + Duration::from_secs(3_600) - EXPIRY_MARGIN * 2));
        assert!(!token.is_fresh(issued + Duration::from_secs(3_600) - EXPIRY_MARGIN));
        assert_eq!(token.expose(), "ya29");
    }
}
