//! Credentials attached to every OSM request
//!
//! Two schemes are supported:
//! * the legacy token exchange, where an API id and token are traded once (with the end user's email and password)
//!   for a user id and secret that are then sent with every request,
//! * the OAuth2 client-credentials grant, where a bearer token is negotiated and refreshed as needed.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::accessor::Fields;
use crate::client::ApiRequest;
use crate::error::OsmError;
use crate::traits::Transport;

/// Refresh OAuth tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The credential of an [`Accessor`](crate::accessor::Accessor)
#[derive(Debug)]
pub enum Credential {
    Legacy(LegacyCredential),
    OAuth(OAuthCredential),
}

impl Credential {
    /// Make `request` carry valid authorization.
    ///
    /// `transport` is only used by the OAuth scheme, to negotiate a token when it does not hold a valid one.
    pub async fn attach(&self, request: &mut ApiRequest, transport: &dyn Transport) -> Result<(), OsmError> {
        match self {
            Credential::Legacy(legacy) => {
                legacy.attach(request);
                Ok(())
            },
            Credential::OAuth(oauth) => oauth.attach(request, transport).await,
        }
    }

    /// Who is asking, without any secret. Cached responses are only shared between identical scopes
    pub fn cache_scope(&self) -> String {
        match self {
            Credential::Legacy(legacy) => format!("{}/{}", legacy.api_id, legacy.user_id.as_deref().unwrap_or("-")),
            Credential::OAuth(oauth) => format!("oauth/{}", oauth.client_id),
        }
    }
}

impl From<LegacyCredential> for Credential {
    fn from(c: LegacyCredential) -> Self { Credential::Legacy(c) }
}

impl From<OAuthCredential> for Credential {
    fn from(c: OAuthCredential) -> Self { Credential::OAuth(c) }
}


/// An API id and token, and the user id and secret obtained by [`LegacyCredential::authorise`]
#[derive(Clone, Debug, PartialEq)]
pub struct LegacyCredential {
    api_id: String,
    token: String,
    user_id: Option<String>,
    secret: Option<String>,
}

#[derive(Deserialize)]
struct AuthoriseResponse {
    #[serde(deserialize_with = "crate::utils::de_id")]
    userid: String,
    secret: String,
}

impl LegacyCredential {
    /// A credential that has not been authorised yet. It is only good for calling the `authorise` endpoint
    pub fn new<S: ToString, T: ToString>(api_id: S, token: T) -> Self {
        Self { api_id: api_id.to_string(), token: token.to_string(), user_id: None, secret: None }
    }

    /// A credential whose user id and secret are already known
    pub fn with_user<S: ToString, T: ToString>(self, user_id: S, secret: T) -> Self {
        Self { user_id: Some(user_id.to_string()), secret: Some(secret.to_string()), ..self }
    }

    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }
    pub fn is_authorised(&self) -> bool { self.user_id.is_some() && self.secret.is_some() }

    /// Trade the end user's email and password for a user id and secret
    pub async fn authorise(&self, transport: &dyn Transport, base_url: &Url, email: &str, password: &str) -> Result<Self, OsmError> {
        let url = base_url.join("users.php?action=authorise")?;
        let mut fields = Fields::new();
        fields.insert("email".to_string(), email.to_string());
        fields.insert("password".to_string(), password.to_string());

        let mut request = ApiRequest::new(url.clone(), fields);
        // Only the API id and token: the user id and secret are what we are asking for
        Self::new(&self.api_id, &self.token).attach(&mut request);

        let response = transport.post(&request).await
            .map_err(|source| OsmError::Transport { url: url.to_string(), source })?;

        let creds: AuthoriseResponse = serde_json::from_str(&response.body)
            .map_err(|_| OsmError::Auth(format!("unexpected answer from {} (HTTP {}): {}", url, response.status, response.body)))?;
        log::info!("Authorised as OSM user {}", creds.userid);

        Ok(self.clone().with_user(creds.userid, creds.secret))
    }

    /// Write the user id and secret to `path`, one per line
    pub fn save_to_file(&self, path: &Path) -> Result<(), OsmError> {
        let (user_id, secret) = match (&self.user_id, &self.secret) {
            (Some(u), Some(s)) => (u, s),
            _ => return Err(OsmError::Auth("cannot save a credential that has not been authorised".to_string())),
        };

        let mut file = std::fs::File::create(path)?;
        writeln!(file, "{}", user_id)?;
        writeln!(file, "{}", secret)?;
        Ok(())
    }

    /// Build an authorised credential from an API id and token, and a file written by [`Self::save_to_file`]
    pub fn load_from_file<S: ToString, T: ToString>(api_id: S, token: T, path: &Path) -> Result<Self, OsmError> {
        let file = std::fs::File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let user_id = lines.next().transpose()?.filter(|l| l.is_empty() == false);
        let secret = lines.next().transpose()?.filter(|l| l.is_empty() == false);
        match (user_id, secret) {
            (Some(u), Some(s)) => Ok(Self::new(api_id, token).with_user(u, s)),
            _ => Err(OsmError::Auth(format!("credentials file {:?} must hold a user id and a secret", path))),
        }
    }

    fn attach(&self, request: &mut ApiRequest) {
        request.fields.insert("apiid".to_string(), self.api_id.clone());
        request.fields.insert("token".to_string(), self.token.clone());
        if let (Some(user_id), Some(secret)) = (&self.user_id, &self.secret) {
            request.fields.insert("userid".to_string(), user_id.clone());
            request.fields.insert("secret".to_string(), secret.clone());
        }
    }
}


/// OAuth2 client credentials. The bearer token is negotiated lazily and refreshed before it expires
#[derive(Debug)]
pub struct OAuthCredential {
    client_id: String,
    client_secret: String,
    scope: String,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Clone, Debug)]
struct AccessToken {
    secret: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => Instant::now() + TOKEN_REFRESH_MARGIN < at,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl OAuthCredential {
    pub fn new<S: ToString, T: ToString>(client_id: S, client_secret: T) -> Self {
        Self::with_scope(client_id, client_secret, crate::config::OAUTH_SCOPE)
    }

    pub fn with_scope<S: ToString, T: ToString, U: ToString>(client_id: S, client_secret: T, scope: U) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str { &self.client_id }

    async fn attach(&self, request: &mut ApiRequest, transport: &dyn Transport) -> Result<(), OsmError> {
        let mut slot = self.token.lock().await;
        let token = match slot.as_ref() {
            Some(token) if token.is_fresh() => token.secret.clone(),
            _ => {
                let new_token = self.fetch_token(&request.url, transport).await?;
                let secret = new_token.secret.clone();
                *slot = Some(new_token);
                secret
            },
        };
        request.bearer = Some(token);
        Ok(())
    }

    async fn fetch_token(&self, request_url: &Url, transport: &dyn Transport) -> Result<AccessToken, OsmError> {
        let token_url = request_url.join(&format!("/{}", crate::config::OAUTH_TOKEN_PATH))?;
        log::debug!("Requesting an OAuth token from {}", token_url);

        let mut fields = Fields::new();
        fields.insert("grant_type".to_string(), "client_credentials".to_string());
        fields.insert("client_id".to_string(), self.client_id.clone());
        fields.insert("client_secret".to_string(), self.client_secret.clone());
        fields.insert("scope".to_string(), self.scope.clone());

        let response = transport.post(&ApiRequest::new(token_url.clone(), fields)).await
            .map_err(|source| OsmError::Transport { url: token_url.to_string(), source })?;
        if response.status != 200 {
            return Err(OsmError::Auth(format!("token endpoint answered HTTP {}: {}", response.status, response.body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|err| OsmError::Auth(format!("unexpected token response ({}): {}", err, response.body)))?;

        Ok(AccessToken {
            secret: parsed.access_token,
            expires_at: parsed.expires_in.map(|s| Instant::now() + Duration::from_secs(s)),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpResponse;
    use crate::mock_transport::MockTransport;

    fn base() -> Url {
        Url::parse("https://osm.example/").unwrap()
    }

    #[test]
    fn legacy_fields_are_attached() {
        let mut request = ApiRequest::new(base().join("api.php?action=getTerms").unwrap(), Fields::new());
        LegacyCredential::new("12", "tok").with_user("34", "sec").attach(&mut request);

        assert_eq!(request.fields.get("apiid").map(|s| s.as_str()), Some("12"));
        assert_eq!(request.fields.get("token").map(|s| s.as_str()), Some("tok"));
        assert_eq!(request.fields.get("userid").map(|s| s.as_str()), Some("34"));
        assert_eq!(request.fields.get("secret").map(|s| s.as_str()), Some("sec"));
        assert_eq!(request.bearer, None);
    }

    #[test]
    fn cache_scope_identifies_the_user_but_not_the_secret() {
        let alice = Credential::from(LegacyCredential::new("12", "tok").with_user("34", "sec"));
        let bob = Credential::from(LegacyCredential::new("12", "tok").with_user("35", "sec"));
        let robot = Credential::from(OAuthCredential::new("client", "shh"));

        assert_eq!(alice.cache_scope(), "12/34");
        assert_ne!(alice.cache_scope(), bob.cache_scope());
        assert_eq!(robot.cache_scope(), "oauth/client");
        assert!(alice.cache_scope().contains("sec") == false);
    }

    #[test]
    fn credentials_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osm.creds");

        let creds = LegacyCredential::new("12", "tok").with_user("34", "sec");
        creds.save_to_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "34\nsec\n");

        let loaded = LegacyCredential::load_from_file("12", "tok", &path).unwrap();
        assert_eq!(loaded, creds);

        assert!(LegacyCredential::new("12", "tok").save_to_file(&path).is_err());
    }

    #[tokio::test]
    async fn authorise_sends_only_api_credentials() {
        let transport = MockTransport::new()
            .on("users.php?action=authorise", HttpResponse::ok(r#"{"userid": 34, "secret": "sec"}"#));

        let creds = LegacyCredential::new("12", "tok")
            .authorise(&transport, &base(), "leader@example.com", "hunter2").await
            .unwrap();
        assert_eq!(creds, LegacyCredential::new("12", "tok").with_user("34", "sec"));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].fields.get("email").map(|s| s.as_str()), Some("leader@example.com"));
        assert!(sent[0].fields.get("userid").is_none());
    }

    #[tokio::test]
    async fn oauth_token_is_reused() {
        let transport = MockTransport::new()
            .on("oauth/token", HttpResponse::ok(r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3600}"#));
        let credential = Credential::OAuth(OAuthCredential::new("client", "shh"));

        for _ in 0..2 {
            let mut request = ApiRequest::new(base().join("api.php?action=getTerms").unwrap(), Fields::new());
            credential.attach(&mut request, &transport).await.unwrap();
            assert_eq!(request.bearer.as_deref(), Some("abc"));
            assert!(request.fields.is_empty());
        }

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.as_str(), "https://osm.example/oauth/token");
        assert_eq!(sent[0].fields.get("grant_type").map(|s| s.as_str()), Some("client_credentials"));
    }

    #[tokio::test]
    async fn oauth_failure_is_an_auth_error() {
        let transport = MockTransport::new()
            .on("oauth/token", HttpResponse::ok(r#"{"error": "invalid_client"}"#).with_status(401));
        let credential = Credential::OAuth(OAuthCredential::new("client", "wrong"));

        let mut request = ApiRequest::new(base().join("api.php?action=getTerms").unwrap(), Fields::new());
        match credential.attach(&mut request, &transport).await {
            Err(OsmError::Auth(_)) => {},
            other => panic!("expected an auth error, got {:?}", other),
        }
    }
}
