use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clientstrap_core::{with_deadline, Deadline, Error, Lockfile, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

/// Every control API authenticates the same fixed user; only the password rotates.
pub const USERNAME: &str = "riot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Where a control API listens. Always loopback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub port: u16,
}

impl Endpoint {
    pub fn https(port: u16) -> Self {
        Self {
            scheme: Scheme::Https,
            port,
        }
    }

    pub fn http(port: u16) -> Self {
        Self {
            scheme: Scheme::Http,
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://127.0.0.1:{}", self.scheme.as_str(), self.port)
    }
}

/// What `get_json` does with a non-2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Propagate,
    /// Report the failure as an absent document and let the caller decide.
    TreatAsNull,
}

pub fn basic_authorization(password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{USERNAME}:{password}"))
    )
}

/// One authenticated session against a client's local control API.
///
/// A session is bound to the port and password of a single lockfile. When the
/// client restarts and publishes a new lockfile, build a new client.
pub struct ControlApiClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl ControlApiClient {
    pub fn from_lockfile(path: &Path) -> Result<Self> {
        let lockfile = Lockfile::read(path)?;
        Self::new(&lockfile)
    }

    pub fn new(lockfile: &Lockfile) -> Result<Self> {
        Self::connect(Endpoint::https(lockfile.port), &lockfile.password)
    }

    pub fn connect(endpoint: Endpoint, password: &str) -> Result<Self> {
        let mut authorization = HeaderValue::from_str(&basic_authorization(password))
            .map_err(|err| Error::transport("control API password is not a valid header", err))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);

        // The control API serves a self-signed certificate. Trust is relaxed for
        // this client only.
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .build()
            .map_err(|err| Error::transport("failed to build control API client", err))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn base_url(&self) -> String {
        self.endpoint.base_url()
    }

    pub async fn get(&self, path: &str, deadline: Option<Deadline>) -> Result<()> {
        self.send(Method::GET, path, None, deadline).await.map(drop)
    }

    pub async fn get_string(&self, path: &str, deadline: Option<Deadline>) -> Result<String> {
        self.send(Method::GET, path, None, deadline).await
    }

    /// GETs a JSON document. `Ok(None)` means the API answered `null` or nothing,
    /// or, under [`FailurePolicy::TreatAsNull`], that it answered non-2xx.
    pub async fn get_json(
        &self,
        path: &str,
        policy: FailurePolicy,
        deadline: Option<Deadline>,
    ) -> Result<Option<Value>> {
        let body = match self.send(Method::GET, path, None, deadline).await {
            Ok(body) => body,
            Err(Error::UnsuccessfulResponse { status, body })
                if policy == FailurePolicy::TreatAsNull =>
            {
                debug!(path, status, body = %body, "treating failed response as absent");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        parse_json_body(path, &body)
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        deadline: Option<Deadline>,
    ) -> Result<()> {
        self.send(Method::POST, path, body, deadline).await.map(drop)
    }

    pub async fn put(
        &self,
        path: &str,
        body: Option<&Value>,
        deadline: Option<Deadline>,
    ) -> Result<()> {
        self.send(Method::PUT, path, body, deadline).await.map(drop)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        deadline: Option<Deadline>,
    ) -> Result<String> {
        let url = format!("{}{path}", self.base_url());
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let operation = format!("{method} {path}");
        with_deadline(deadline, &operation, async {
            let response = request
                .send()
                .await
                .map_err(|err| Error::transport(format!("{operation} failed"), err))?;
            let status = response.status();
            let text = response.text().await.map_err(|err| {
                Error::transport(format!("{operation}: failed reading response body"), err)
            })?;
            debug!(method = %method, path, status = status.as_u16(), "control API call");

            if !status.is_success() {
                return Err(Error::UnsuccessfulResponse {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Ok(text)
        })
        .await
    }
}

impl fmt::Debug for ControlApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlApiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn parse_json_body(path: &str, body: &str) -> Result<Option<Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|err| Error::protocol(format!("GET {path} returned invalid JSON: {err}")))?;
    Ok((!value.is_null()).then_some(value))
}
