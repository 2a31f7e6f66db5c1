//! Support for library configuration options

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono_tz::Tz;
use once_cell::sync::Lazy;

use crate::credential::{Credential, LegacyCredential, OAuthCredential};
use crate::error::OsmError;

/// The OSM server every path is relative to
pub const DEFAULT_BASE_URL: &str = "https://www.onlinescoutmanager.co.uk/";

/// Where the response cache is persisted between runs, unless told otherwise
pub const DEFAULT_CACHE_FILE: &str = "osm.cache";

/// Where legacy credentials (user id and secret) are persisted
pub const DEFAULT_CREDENTIALS_FILE: &str = "osm.creds";

/// Token endpoint of the OAuth2 client-credentials grant, relative to the base URL
pub const OAUTH_TOKEN_PATH: &str = "oauth/token";

/// The fixed scope requested with the client-credentials grant
pub const OAUTH_SCOPE: &str = "section:member:read section:programme:read section:event:read section:flexirecord:read section:badge:read section:administration:read";

/// How long a cached response stays valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// OSM dates and times are local to this timezone
pub const TIMEZONE: Tz = chrono_tz::Europe::London;

/// The User-Agent sent with every request.
/// Feel free to override it when initing this library.
pub static USER_AGENT: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new(format!("osm-accessor/{}", env!("CARGO_PKG_VERSION")))));

/// Name of the flexi record that tracks members moving on to the next section.
/// Sections may name theirs differently; override it before initialising sections.
pub static MOVERS_FLEXI_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Moving On".to_string())));

pub(crate) fn user_agent() -> String {
    match USER_AGENT.lock() {
        Ok(ua) => ua.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub(crate) fn movers_flexi_name() -> String {
    match MOVERS_FLEXI_NAME.lock() {
        Ok(name) => name.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Build a credential from the environment.
///
/// `OSM_CLIENT_ID` and `OSM_CLIENT_SECRET` select the OAuth2 scheme.
/// Otherwise `OSM_API_ID` and `OSM_API_TOKEN` select the legacy scheme, whose user id and secret are read from `credentials_file`.
pub fn credential_from_env(credentials_file: &Path) -> Result<Credential, OsmError> {
    if let (Ok(id), Ok(secret)) = (std::env::var("OSM_CLIENT_ID"), std::env::var("OSM_CLIENT_SECRET")) {
        return Ok(Credential::OAuth(OAuthCredential::new(id, secret)));
    }

    match (std::env::var("OSM_API_ID"), std::env::var("OSM_API_TOKEN")) {
        (Ok(api_id), Ok(token)) => {
            let legacy = LegacyCredential::load_from_file(api_id, token, credentials_file)?;
            Ok(Credential::Legacy(legacy))
        },
        _ => Err(OsmError::Auth("set OSM_CLIENT_ID/OSM_CLIENT_SECRET or OSM_API_ID/OSM_API_TOKEN".to_string())),
    }
}
