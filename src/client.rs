//! This module provides the HTTP transport used to talk to the OSM server

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::accessor::Fields;
use crate::error::TransportFailure;
use crate::traits::Transport;

/// An outgoing OSM request, before or after a [`Credential`](crate::credential::Credential) has been attached to it
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub url: Url,
    /// Sent as a form-encoded body
    pub fields: Fields,
    /// Sent as an `Authorization: Bearer` header
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(url: Url, fields: Fields) -> Self {
        Self { url, fields, bearer: None }
    }
}

/// The raw answer to an [`ApiRequest`]
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body and no headers
    pub fn ok<S: Into<String>>(body: S) -> Self {
        Self { status: 200, headers: HashMap::new(), body: body.into() }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header<K: AsRef<str>, V: ToString>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.as_ref().to_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }
}

/// A [`Transport`] that actually sends requests over HTTPS
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport. This does not start a connection
    pub fn new() -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &ApiRequest) -> Result<HttpResponse, TransportFailure> {
        let mut builder = self.client
            .post(request.url.clone())
            .header(USER_AGENT, crate::config::user_agent())
            .form(&request.fields);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let res = builder.send().await?;

        let status = res.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in res.headers() {
            match value.to_str() {
                Ok(v) => { headers.insert(name.as_str().to_string(), v.to_string()); },
                Err(_) => log::debug!("Ignoring non-ASCII header {}", name),
            }
        }
        let body = res.text().await?;

        Ok(HttpResponse { status, headers, body })
    }
}
