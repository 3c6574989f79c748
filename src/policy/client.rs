//! Authenticated REST client for the policy server.
//!
//! Sessions work in two steps: a basic-auth login yields a `sessionkey`,
//! which is then sent as a bearer token on data calls. The key is cached
//! with a one-hour lifetime and re-obtained when missing or expired. The
//! session state sits behind an async lock so concurrent exchanges cannot
//! race duplicate logins.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::error::Error;
use crate::Result;

const LOGIN_PATH: &str = "/ca/api/sso/services/login/v1/token";
const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct SessionKey {
    key: String,
    expires_at: Instant,
}

pub struct PolicyClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Option<SessionKey>>,
}

impl PolicyClient {
    pub fn new(config: PolicyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
            username: config.username,
            password: config.password,
            session: Mutex::new(None),
        })
    }

    /// GET an API path and decode the JSON body.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let key = self.session_key().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(path, "policy server GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::PolicyApi {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::PolicyApi {
                status: Some(status.as_u16()),
                detail,
            });
        }
        response.json::<Value>().await.map_err(|e| Error::PolicyApi {
            status: None,
            detail: format!("response is not JSON: {e}"),
        })
    }

    /// Return a valid session key, logging in when none is cached or the
    /// cached one has expired. The lock is held across the login so only
    /// one task authenticates.
    async fn session_key(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if Instant::now() < current.expires_at {
                return Ok(current.key.clone());
            }
        }

        let key = self.login().await?;
        *session = Some(SessionKey {
            key: key.clone(),
            expires_at: Instant::now() + SESSION_TTL,
        });
        Ok(key)
    }

    async fn login(&self) -> Result<String> {
        info!("authenticating with the policy server REST API");
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| Error::PolicyApi {
                status: None,
                detail: format!("login failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::PolicyApi {
                status: Some(status.as_u16()),
                detail: format!("login rejected: {detail}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::PolicyApi {
            status: None,
            detail: format!("login response is not JSON: {e}"),
        })?;
        body.get("sessionkey")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::PolicyApi {
                status: None,
                detail: "login response missing sessionkey".into(),
            })
    }
}
