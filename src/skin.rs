//! Skin resolution – display name → profile id → signed textures.
//!
//! | Step | Request                                    | Response used              |
//! |------|--------------------------------------------|----------------------------|
//! | 1    | `GET {profile_api}/{name}`                 | `id`                       |
//! | 2    | `GET {session_api}/{id}?unsigned=false`    | `properties[textures]`     |
//!
//! Both calls block, so [`SkinResolver::resolve_detached`] runs them on
//! Tokio's blocking pool. Any failure aborts the whole resolution; the
//! caller decides what "unchanged" means.

use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SkinError;
use crate::types::{Profile, SkinConfig, SkinRef};

// ---------------------------------------------------------------------------
// HTTP seam
// ---------------------------------------------------------------------------

/// Blocking `GET url → body`.
pub trait HttpFetch: Send + Sync {
    fn get(&self, url: &str) -> Result<String, SkinError>;
}

/// [`HttpFetch`] over reqwest's blocking client.
///
/// The client is built per request on the calling (blocking) thread: a
/// blocking reqwest client must never be created or dropped inside an async
/// context.
pub struct ReqwestFetch {
    timeout: Duration,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HttpFetch for ReqwestFetch {
    fn get(&self, url: &str) -> Result<String, SkinError> {
        let transport = |e: reqwest::Error| SkinError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(transport)?;
        let response = client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SkinError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(transport)
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NameLookup {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionProfile {
    #[serde(default)]
    properties: Vec<SessionProperty>,
}

#[derive(Debug, Deserialize)]
struct SessionProperty {
    name: String,
    value: String,
    signature: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Account names are 1 to 16 characters of `[A-Za-z0-9_]`, which also
/// keeps them safe to splice into a URL path.
pub fn is_account_name(name: &str) -> bool {
    (1..=16).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

pub struct SkinResolver {
    config: SkinConfig,
    http: Arc<dyn HttpFetch>,
}

impl SkinResolver {
    pub fn new(config: SkinConfig, http: Arc<dyn HttpFetch>) -> Self {
        Self { config, http }
    }

    /// Resolver backed by reqwest with the configured timeout.
    pub fn with_reqwest(config: SkinConfig) -> Self {
        let http = ReqwestFetch::new(Duration::from_millis(config.timeout_ms));
        Self::new(config, Arc::new(http))
    }

    /// Blocking two-step lookup. Call off the owner thread. Names that
    /// could not belong to an account are refused before any request.
    pub fn resolve(&self, name: &str) -> Result<SkinRef, SkinError> {
        if !is_account_name(name) {
            return Err(SkinError::InvalidName(name.to_string()));
        }
        let id = self.profile_id(name)?;
        self.textures(&id)
    }

    /// [`resolve`](Self::resolve) on the blocking pool.
    pub async fn resolve_detached(self: Arc<Self>, name: String) -> Result<SkinRef, SkinError> {
        tokio::task::spawn_blocking(move || self.resolve(&name))
            .await
            .map_err(|e| SkinError::Join(e.to_string()))?
    }

    fn profile_id(&self, name: &str) -> Result<String, SkinError> {
        let url = format!("{}/{}", self.config.profile_api.trim_end_matches('/'), name);
        let body = self.http.get(&url)?;
        let lookup: NameLookup = serde_json::from_str(&body).map_err(|e| SkinError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        debug!("resolved skin owner '{}' to profile {}", name, lookup.id);
        Ok(lookup.id)
    }

    fn textures(&self, id: &str) -> Result<SkinRef, SkinError> {
        let url = format!(
            "{}/{}?unsigned=false",
            self.config.session_api.trim_end_matches('/'),
            id
        );
        let body = self.http.get(&url)?;
        let profile: SessionProfile = serde_json::from_str(&body).map_err(|e| SkinError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let mut properties = profile.properties;
        let idx = properties
            .iter()
            .position(|p| p.name == Profile::TEXTURES)
            .unwrap_or(0);
        if idx >= properties.len() {
            return Err(SkinError::MissingProperty(id.to_string()));
        }
        let property = properties.swap_remove(idx);
        let signature = property
            .signature
            .ok_or_else(|| SkinError::MissingProperty(id.to_string()))?;
        Ok(SkinRef::new(signature, property.value))
    }
}
