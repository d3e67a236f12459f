use crate::endpoints::BackendOptions;
use async_trait::async_trait;
use beacon_core::{BearerToken, BoardError, GpuInfo, Result, SignalBackend, SignalsPayload};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// 基于 HTTP 的看板后端
#[derive(Debug, Clone)]
pub struct HttpBackend {
    pub(crate) options: BackendOptions,
    pub(crate) client: Client,
}

impl HttpBackend {
    /// 创建 HTTP 后端
    ///
    /// # 错误
    /// * `Config` - HTTP 客户端无法构建
    pub fn new(options: BackendOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout())
            .build()
            .map_err(|e| BoardError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self { options, client })
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.options.url(path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let response = ensure_success(response, &url)?;

        response
            .json::<T>()
            .await
            .map_err(|e| BoardError::parse(format!("unexpected payload from {}: {}", url, e)))
    }
}

#[async_trait]
impl SignalBackend for HttpBackend {
    async fn fetch_signals(&self) -> Result<SignalsPayload> {
        self.get_json(&self.options.signals_path).await
    }

    async fn fetch_gpu_info(&self) -> Result<GpuInfo> {
        self.get_json(&self.options.gpu_info_path).await
    }

    async fn submit_return_message(
        &self,
        device_name: &str,
        return_message: &str,
        token: &BearerToken,
    ) -> Result<()> {
        let url = self.options.url(&self.options.return_message_path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .form(&[("name", device_name), ("return_message", return_message)])
            .send()
            .await
            .map_err(|e| BoardError::submission(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), device = %device_name, "Return message rejected");
            return Err(BoardError::submission(format!(
                "POST {} returned status {}",
                url,
                response.status()
            )));
        }

        debug!(device = %device_name, "Return message accepted");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.options.base_url
    }
}

pub(crate) fn transport_error(url: &str, err: reqwest::Error) -> BoardError {
    if err.is_timeout() {
        BoardError::network(format!("request to {} timed out", url))
    } else {
        BoardError::network(format!("request to {} failed: {}", url, err))
    }
}

pub(crate) fn ensure_success(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BoardError::network(format!("{} returned status {}", url, status)))
    }
}
