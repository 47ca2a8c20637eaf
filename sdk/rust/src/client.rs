use std::collections::BTreeMap;
use std::path::Path;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::run_file::RunFile;

/// Header the host expects the secret in, unless configured otherwise.
pub const DEFAULT_TOKEN_HEADER: &str = "x-companion-token";

const LANGUAGE_PATH: &str = "/Settings/v.1.0/Language";

#[derive(Debug, Serialize, Deserialize)]
struct LanguageBody {
    language: String,
}

#[derive(Debug, Deserialize)]
struct BetaStatus {
    beta: bool,
}

#[derive(Debug, Deserialize)]
struct ThreadPoolStatus {
    size: usize,
}

#[derive(Debug, Clone)]
pub struct CompanionClient {
    client: Client,
    base_url: Url,
    secret: String,
    header_name: String,
}

impl CompanionClient {
    pub fn new(base_url: &str, secret: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            secret: secret.into(),
            header_name: DEFAULT_TOKEN_HEADER.to_string(),
        })
    }

    /// Connect to the loopback instance advertised by a run file.
    pub fn discover(run_file: &Path) -> Result<Self, ClientError> {
        Self::discover_on(run_file, "127.0.0.1")
    }

    pub fn discover_on(run_file: &Path, host: &str) -> Result<Self, ClientError> {
        let run = RunFile::read(run_file)?;
        Self::new(&format!("http://{host}:{}", run.port), run.secret)
    }

    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Module name to version, including the host itself.
    pub async fn version(&self) -> Result<BTreeMap<String, String>, ClientError> {
        self.get_json("/version").await
    }

    pub async fn beta(&self) -> Result<bool, ClientError> {
        Ok(self.get_json::<BetaStatus>("/beta").await?.beta)
    }

    pub async fn language(&self) -> Result<String, ClientError> {
        Ok(self.get_json::<LanguageBody>(LANGUAGE_PATH).await?.language)
    }

    pub async fn set_language(&self, language: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.url(LANGUAGE_PATH)?)
            .header(self.header_name.as_str(), &self.secret)
            .json(&LanguageBody {
                language: language.to_string(),
            })
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    pub async fn threadpool(&self) -> Result<usize, ClientError> {
        Ok(self.get_json::<ThreadPoolStatus>("/threadpool").await?.size)
    }

    /// Liveness probe.
    pub async fn up(&self) -> Result<(), ClientError> {
        let resp = self.get("/up").await?;
        check(resp).await.map(|_| ())
    }

    /// `ws://…/socket?token=…` for the realtime event stream.
    pub fn websocket_url(&self) -> Result<Url, ClientError> {
        let mut url = self.url("/socket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http→ws keeps the URL valid, so this cannot fail.
        let _ = url.set_scheme(scheme);
        url.query_pairs_mut().append_pair("token", &self.secret);
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get(&self, path: &str) -> Result<Response, ClientError> {
        Ok(self
            .client
            .get(self.url(path)?)
            .header(self.header_name.as_str(), &self.secret)
            .send()
            .await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = check(self.get(path).await?).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}
