use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use musicshare_core::{
    CatalogApi, CatalogError, CatalogToken, Service, TrackMetadata, TransportError,
};

/// Spotify Web API over the client-credentials flow.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    token_url: String,
    api_base_url: String,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Option<Vec<ArtistPayload>>,
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    #[serde(default)]
    name: Option<String>,
}

impl SpotifyClient {
    pub fn new(
        token_url: impl Into<String>,
        api_base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build().map_err(|error| {
            TransportError::Request { service: Service::Catalog, message: error.to_string() }
        })?;

        Ok(Self {
            http,
            token_url: token_url.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            client_id: client_id.into(),
            client_secret,
        })
    }
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn issue_token(&self) -> Result<CatalogToken, TransportError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|error| TransportError::Request {
                service: Service::Catalog,
                message: format!("token request failed: {error}"),
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                service: Service::Catalog,
                status: response.status().as_u16(),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|error| TransportError::Decode {
            service: Service::Catalog,
            message: format!("failed to decode token response: {error}"),
        })?;
        let token = validate_token(token)?;

        info!(
            event_name = "catalog.token.issued",
            expires_in_secs = token.expires_in.unwrap_or_default(),
            "catalog token issued"
        );
        Ok(CatalogToken::new(token.access_token))
    }

    async fn fetch_track(
        &self,
        track_id: &str,
        token: &CatalogToken,
    ) -> Result<TrackMetadata, CatalogError> {
        let url = format!("{}/tracks/{track_id}", self.api_base_url);
        let response =
            self.http.get(&url).bearer_auth(token.expose()).send().await.map_err(|error| {
                TransportError::Request {
                    service: Service::Catalog,
                    message: format!("track lookup failed: {error}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                track_id: track_id.to_owned(),
                status: status.as_u16(),
            });
        }

        let payload: TrackPayload =
            response.json().await.map_err(|error| CatalogError::Malformed {
                track_id: track_id.to_owned(),
                reason: error.to_string(),
            })?;
        debug!(event_name = "catalog.track.fetched", track_id, "fetched catalog track");
        track_from_payload(track_id, payload)
    }
}

fn validate_token(token: TokenResponse) -> Result<TokenResponse, TransportError> {
    if token.access_token.trim().is_empty() {
        return Err(TransportError::Decode {
            service: Service::Catalog,
            message: "token endpoint returned empty access token".to_owned(),
        });
    }
    if let Some(token_type) = token.token_type.as_deref() {
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(TransportError::Decode {
                service: Service::Catalog,
                message: format!("unexpected token type `{token_type}`"),
            });
        }
    }
    Ok(token)
}

fn track_from_payload(
    track_id: &str,
    payload: TrackPayload,
) -> Result<TrackMetadata, CatalogError> {
    let malformed = |reason: &str| CatalogError::Malformed {
        track_id: track_id.to_owned(),
        reason: reason.to_owned(),
    };

    let title = payload
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| malformed("missing name"))?;
    let artists: Vec<String> = payload
        .artists
        .ok_or_else(|| malformed("missing artists"))?
        .into_iter()
        .filter_map(|artist| artist.name)
        .filter(|name| !name.trim().is_empty())
        .collect();
    if artists.is_empty() {
        return Err(malformed("empty artist list"));
    }

    Ok(TrackMetadata { title, artists })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use musicshare_core::CatalogError;

    use super::{track_from_payload, validate_token, TokenResponse, TrackPayload};

    fn payload(value: serde_json::Value) -> TrackPayload {
        serde_json::from_value(value).expect("payload decodes")
    }

    #[test]
    fn track_payload_keeps_artist_order() {
        let track = track_from_payload(
            "abc",
            payload(json!({
                "id": "abc",
                "name": "Nightcall",
                "artists": [{ "name": "Kavinsky" }, { "name": "Lovefoxxx" }],
                "album": { "name": "OutRun" }
            })),
        )
        .expect("track decodes");

        assert_eq!(track.title, "Nightcall");
        assert_eq!(track.artist_line(), "Kavinsky, Lovefoxxx");
    }

    #[test]
    fn missing_name_or_artists_is_malformed() {
        for value in [
            json!({ "artists": [{ "name": "Kavinsky" }] }),
            json!({ "name": "Nightcall" }),
            json!({ "name": "Nightcall", "artists": [] }),
            json!({ "name": "", "artists": [{ "name": "Kavinsky" }] }),
        ] {
            let result = track_from_payload("abc", payload(value.clone()));
            assert!(matches!(result, Err(CatalogError::Malformed { .. })), "payload: {value}");
        }
    }

    #[test]
    fn token_response_must_carry_bearer_token() {
        let ok: TokenResponse = serde_json::from_value(json!({
            "access_token": "BQD", "token_type": "Bearer", "expires_in": 3600
        }))
        .expect("decodes");
        assert!(validate_token(ok).is_ok());

        let empty: TokenResponse =
            serde_json::from_value(json!({ "access_token": "", "token_type": "Bearer" }))
                .expect("decodes");
        assert!(validate_token(empty).is_err());

        let mac: TokenResponse =
            serde_json::from_value(json!({ "access_token": "x", "token_type": "mac" }))
                .expect("decodes");
        assert!(validate_token(mac).is_err());
    }
}
