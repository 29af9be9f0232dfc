//! OAuth access for the Sheets API.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::tinvest::export::error::{ExportError, Result};

/// Scope granting read and write access to spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Default location of the cached token.
pub const DEFAULT_TOKEN_CACHE: &str = "token.json";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_MARGIN_SECS: u64 = 60;
const REDIRECT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of bearer tokens for the Sheets client.
pub trait TokenProvider {
    fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientConfig {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Token persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl CachedToken {
    /// Whether the token can still be used at `now` (seconds since epoch).
    pub fn is_valid_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => now + EXPIRY_MARGIN_SECS < expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Installed-application OAuth flow with an on-disk token cache.
///
/// A cached token is reused while valid, refreshed when it has expired, and
/// the browser consent flow runs only when neither works.
pub struct InstalledAppFlow {
    credentials_path: PathBuf,
    token_cache: PathBuf,
    client: Client,
}

impl InstalledAppFlow {
    pub fn new(credentials_path: impl Into<PathBuf>, token_cache: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            credentials_path: credentials_path.into(),
            token_cache: token_cache.into(),
            client,
        })
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let data = fs::read_to_string(&self.credentials_path)?;
        let secrets: ClientSecrets = serde_json::from_str(&data)?;
        secrets.installed.or(secrets.web).ok_or_else(|| {
            ExportError::Auth(format!(
                "{} has neither an 'installed' nor a 'web' client",
                self.credentials_path.display()
            ))
        })
    }

    fn refresh(&self, config: &ClientConfig, refresh_token: &str) -> Result<CachedToken> {
        let response = self.request_token(
            config,
            &[
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )?;
        let mut token = into_cached(response);
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    fn consent(&self, config: &ClientConfig) -> Result<CachedToken> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let consent_url = Url::parse_with_params(
            &config.auth_uri,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SHEETS_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| ExportError::Auth(format!("invalid auth_uri: {err}")))?;

        eprintln!("Open this URL in a browser to grant access to Google Sheets:\n{consent_url}");
        let code = wait_for_redirect_code(&listener, REDIRECT_READ_TIMEOUT)?;

        let response = self.request_token(
            config,
            &[
                ("code", code.as_str()),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )?;
        Ok(into_cached(response))
    }

    fn request_token(&self, config: &ClientConfig, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(&config.token_uri).form(form).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExportError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        Ok(response.json()?)
    }
}

impl TokenProvider for InstalledAppFlow {
    #[instrument(level = "debug", skip_all, fields(cache = %self.token_cache.display()))]
    fn access_token(&self) -> Result<String> {
        let cached = read_cached_token(&self.token_cache)?;
        if let Some(token) = &cached {
            if token.is_valid_at(unix_now()) {
                debug!("using cached token");
                return Ok(token.access_token.clone());
            }
        }

        let config = self.client_config()?;
        let refreshed = match cached.as_ref().and_then(|token| token.refresh_token.as_deref()) {
            Some(refresh_token) => match self.refresh(&config, refresh_token) {
                Ok(token) => Some(token),
                Err(error) => {
                    warn!(%error, "token refresh failed, falling back to consent flow");
                    None
                }
            },
            None => None,
        };
        let token = match refreshed {
            Some(token) => token,
            None => self.consent(&config)?,
        };

        write_cached_token(&self.token_cache, &token)?;
        info!("access token stored");
        Ok(token.access_token)
    }
}

/// Reads the token cache, `None` when the file does not exist.
pub fn read_cached_token(path: &Path) -> Result<Option<CachedToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

pub fn write_cached_token(path: &Path, token: &CachedToken) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(token)?)?;
    Ok(())
}

fn into_cached(response: TokenResponse) -> CachedToken {
    CachedToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: response.expires_in.map(|secs| unix_now() + secs),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Accepts loopback connections until one carries the OAuth redirect.
///
/// Requests without a `code` or `error` parameter, such as favicon fetches,
/// get a 404 and are ignored. Connections that stay silent for
/// `read_timeout` are dropped.
pub fn wait_for_redirect_code(listener: &TcpListener, read_timeout: Duration) -> Result<String> {
    loop {
        let (mut stream, peer) = listener.accept()?;
        stream.set_read_timeout(Some(read_timeout))?;

        let mut request_line = String::new();
        match BufReader::new(&stream).read_line(&mut request_line) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(error) => {
                debug!(%peer, %error, "dropping silent connection");
                continue;
            }
        }

        let code = match parse_redirect_code(&request_line) {
            Ok(Some(code)) => Ok(code),
            Ok(None) => {
                debug!(%peer, request = request_line.trim_end(), "ignoring request");
                if let Err(error) = respond(&mut stream, "404 Not Found", "Not found") {
                    debug!(%error, "failed to answer ignored request");
                }
                continue;
            }
            Err(error) => Err(error),
        };

        let reply = if code.is_ok() {
            "Authorisation complete, you can close this tab."
        } else {
            "Authorisation failed, check the terminal."
        };
        if let Err(error) = respond(&mut stream, "200 OK", reply) {
            debug!(%error, "failed to answer redirect");
        }
        return code;
    }
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}

/// Reads the OAuth result from a request line such as
/// `GET /?code=abc&scope=... HTTP/1.1`.
///
/// Returns `None` when the request is not a redirect at all, and an error when
/// the redirect reports a refused consent.
pub fn parse_redirect_code(request_line: &str) -> Result<Option<String>> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Ok(None);
    };

    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => return Ok(Some(value.into_owned())),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    match error {
        Some(error) => Err(ExportError::Auth(format!("consent refused: {error}"))),
        None => Ok(None),
    }
}
