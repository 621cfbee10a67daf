use super::time::parse_utc_timestamp;
use crate::config::Config;
use crate::error::{auth_error, env_error, RescheduleResult};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Full read/write access to calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed up front
const EXPIRY_SKEW_SECONDS: i64 = 60;
/// How often the callback listener checks for cancellation
const CALLBACK_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Authorized-user token file, compatible with the format Google's client libraries write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedUserToken {
    #[serde(alias = "access_token")]
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthorizedUserToken {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry.as_deref().and_then(parse_utc_timestamp)
    }

    /// An access token with no known expiry is taken as valid
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(expiry)) => expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) > now,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Merge a token endpoint response into this token
    fn apply(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
        let expires_in = response.expires_in.unwrap_or(3600);
        self.expiry = Some((now + Duration::seconds(expires_in)).to_rfc3339());
    }
}

/// Response of the OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Client id and secret of an OAuth client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientConfigFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a downloaded client config (`{"installed": {...}}` or `{"web": {...}}`)
    pub fn from_client_config(json: &str) -> RescheduleResult<Self> {
        let file: ClientConfigFile = serde_json::from_str(json)
            .map_err(|_| auth_error("Invalid JSON format in GOOGLE_CLIENT_CONFIG."))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| auth_error("GOOGLE_CLIENT_CONFIG has no 'installed' or 'web' client"))
    }
}

/// Loads, refreshes and obtains calendar credentials backed by a token file
#[derive(Clone)]
pub struct TokenManager {
    client: Client,
    token_file: PathBuf,
    client_config: Option<String>,
}

impl TokenManager {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            token_file: config.token_file.clone(),
            client_config: config.google_client_config.clone(),
        }
    }

    /// Write a token handed over by the environment to the token file
    pub fn seed(&self, token_json: &str) -> RescheduleResult<()> {
        // Validate before touching the file
        serde_json::from_str::<AuthorizedUserToken>(token_json)
            .map_err(|e| auth_error(&format!("GOOGLE_TOKEN_JSON is not a valid token: {}", e)))?;
        fs::write(&self.token_file, token_json)?;
        info!("GOOGLE_TOKEN_JSON found and written to {}", self.token_file.display());
        Ok(())
    }

    /// Get a valid access token, refreshing or authorizing as needed
    pub async fn get_access_token(&self) -> RescheduleResult<String> {
        let stored = self.load()?;

        let token = match stored {
            Some(token) if token.is_valid(Utc::now()) => token,
            Some(token) if token.can_refresh() => {
                info!("Access token expired, refreshing");
                let token = self.refresh_token(token).await?;
                self.save(&token)?;
                token
            }
            _ => {
                let token = self.authorize_interactively().await?;
                self.save(&token)?;
                token
            }
        };

        token
            .token
            .ok_or_else(|| auth_error("No access token available"))
    }

    /// Read the token file, if there is a usable one
    pub fn load(&self) -> RescheduleResult<Option<AuthorizedUserToken>> {
        if !self.token_file.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.token_file)?;
        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.token_file.display(), e);
                Ok(None)
            }
        }
    }

    /// Save the credentials for the next run
    pub fn save(&self, token: &AuthorizedUserToken) -> RescheduleResult<()> {
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_file, json)?;
        Ok(())
    }

    /// Refresh an expired token
    async fn refresh_token(&self, mut token: AuthorizedUserToken) -> RescheduleResult<AuthorizedUserToken> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            token.refresh_token.clone(),
            token.client_id.clone(),
            token.client_secret.clone(),
        ) else {
            return Err(auth_error("Token cannot be refreshed without refresh token and client credentials"));
        };

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token".to_string()),
        ];

        let response = self.request_token(&token.token_uri, &params).await?;
        token.apply(response, Utc::now());
        Ok(token)
    }

    /// Run the installed-app flow: consent in the browser, code on a loopback server
    async fn authorize_interactively(&self) -> RescheduleResult<AuthorizedUserToken> {
        let client_config = self
            .client_config
            .as_deref()
            .ok_or_else(|| env_error("GOOGLE_CLIENT_CONFIG"))?;
        let secrets = ClientSecrets::from_client_config(client_config)?;

        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| auth_error(&format!("Failed to start callback server: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| auth_error("Callback server has no TCP address"))?;
        let redirect_uri = format!("http://localhost:{}", port);

        // Random state guards against forged callbacks
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = authorization_url(&secrets, &redirect_uri, &state)?;

        println!("Opening browser for Google Calendar authorization...");
        println!("If it does not open, visit: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Failed to open browser: {}", e);
        }

        let code = receive_code(server, state).await?;

        let params = [
            ("client_id", secrets.client_id.clone()),
            ("client_secret", secrets.client_secret.clone()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code".to_string()),
        ];
        let response = self.request_token(&secrets.token_uri, &params).await?;

        let mut token = AuthorizedUserToken {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: Some(secrets.client_id),
            client_secret: Some(secrets.client_secret),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            expiry: None,
            extra: Map::new(),
        };
        token.apply(response, Utc::now());

        info!("Authorization successful");
        Ok(token)
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, String)]) -> RescheduleResult<TokenResponse> {
        let response = self
            .client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to request token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Failed to get token: HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))
    }
}

/// Consent page URL for the calendar scope
pub fn authorization_url(secrets: &ClientSecrets, redirect_uri: &str, state: &str) -> RescheduleResult<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("scope", CALENDAR_SCOPE),
            ("state", state),
        ],
    )
    .map_err(|e| auth_error(&format!("Invalid auth_uri in client config: {}", e)))
}

/// Pull the authorization code out of a callback request path
pub fn parse_callback(path: &str, expected_state: &str) -> RescheduleResult<String> {
    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(path))
        .map_err(|e| auth_error(&format!("Malformed callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(auth_error(&format!("Authorization denied: {}", value))),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(auth_error("State mismatch in authorization callback"));
    }
    code.ok_or_else(|| auth_error("No authorization code found in callback"))
}

/// Wait for the callback off the runtime. Dropping the future stops the listener.
async fn receive_code(server: tiny_http::Server, state: String) -> RescheduleResult<String> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let _cancel_on_drop = CancelOnDrop(cancelled.clone());

    tokio::task::spawn_blocking(move || wait_for_callback(&server, &state, &cancelled))
        .await
        .map_err(|e| auth_error(&format!("Callback listener failed: {}", e)))?
}

/// Raises the flag when the waiting future goes away
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Block until the browser hits the loopback server or the wait is cancelled
fn wait_for_callback(
    server: &tiny_http::Server,
    expected_state: &str,
    cancelled: &AtomicBool,
) -> RescheduleResult<String> {
    println!("Waiting for authorization callback...");
    let request = loop {
        if cancelled.load(Ordering::Relaxed) {
            return Err(auth_error("Authorization cancelled"));
        }
        if let Some(request) = server.recv_timeout(CALLBACK_POLL_INTERVAL)? {
            break request;
        }
    };
    let result = parse_callback(request.url(), expected_state);

    let body = match &result {
        Ok(_) => "Authorization successful! You can close this window.".to_string(),
        Err(e) => format!("Authorization failed: {}", e),
    };
    request.respond(tiny_http::Response::from_string(body))?;

    result
}

/// Remove the token file, if present
pub fn remove_token_file(path: &Path) -> RescheduleResult<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}
