use std::time::Duration;

use chan_core::{
    parse_catalog, parse_thread, BoardTarget, CatalogThread, Endpoints, Fetched, Thread,
    ThreadNumber,
};
use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use url::Url;

use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            // Busy 2ch catalogs run to several megabytes.
            max_bytes: 32 * 1024 * 1024,
            allowed_content_types: vec!["application/json".to_string()],
        }
    }
}

/// Remote access to one imageboard backend.
///
/// `Ok(Fetched::NotFound)` is the authoritative "gone" answer; every other
/// failure is an `Err` and must not be read as a deletion.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_catalog(
        &self,
        target: &BoardTarget,
    ) -> Result<Fetched<Vec<CatalogThread>>, FetchError>;

    async fn fetch_thread(
        &self,
        target: &BoardTarget,
        number: ThreadNumber,
    ) -> Result<Fetched<Thread>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings, endpoints: Endpoints) -> Result<Self, FetchError> {
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            endpoints,
            client,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    /// GETs a JSON document, enforcing status, content type and size limits.
    async fn get_json(&self, url: Url) -> Result<Fetched<Vec<u8>>, FetchError> {
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            engine_debug!("GET {} -> 404", url);
            return Ok(Fetched::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{url}: {status}"),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    format!("{url}: response too large"),
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        match content_type.as_deref() {
            None => {
                return Err(FetchError::new(
                    FailureKind::MissingContentType,
                    format!("{url}: response carries no content type"),
                ));
            }
            Some(ct) if !self.is_content_type_allowed(ct) => {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    format!("{url}: unsupported content type"),
                ));
            }
            Some(_) => {}
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    format!("{url}: response too large"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        engine_trace!("GET {} -> {} bytes", url, bytes.len());

        Ok(Fetched::Found(bytes))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch_catalog(
        &self,
        target: &BoardTarget,
    ) -> Result<Fetched<Vec<CatalogThread>>, FetchError> {
        let url = self
            .endpoints
            .catalog_url(target)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        match self.get_json(url).await? {
            Fetched::Found(body) => parse_catalog(target, &body)
                .map(Fetched::Found)
                .map_err(|err| FetchError::new(FailureKind::Parse, err.to_string())),
            Fetched::NotFound => Ok(Fetched::NotFound),
        }
    }

    async fn fetch_thread(
        &self,
        target: &BoardTarget,
        number: ThreadNumber,
    ) -> Result<Fetched<Thread>, FetchError> {
        let url = self
            .endpoints
            .thread_url(target, number)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        match self.get_json(url).await? {
            Fetched::Found(body) => parse_thread(&self.endpoints, target, &body)
                .map(Fetched::Found)
                .map_err(|err| FetchError::new(FailureKind::Parse, err.to_string())),
            Fetched::NotFound => Ok(Fetched::NotFound),
        }
    }
}

fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
    let redirect_limit = settings.redirect_limit;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= redirect_limit {
            attempt.error("redirect limit exceeded")
        } else {
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(policy)
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
