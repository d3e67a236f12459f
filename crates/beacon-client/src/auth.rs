use crate::http::{transport_error, HttpBackend};
use beacon_core::{BearerToken, BoardError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 登录接口返回的令牌
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    pub fn bearer(&self) -> BearerToken {
        BearerToken::new(self.access_token.clone())
    }
}

impl HttpBackend {
    /// 用户名密码换取访问令牌
    ///
    /// # 错误
    /// * `Network` - 请求失败
    /// * `Auth` - 凭据被拒绝
    /// * `Parse` - 响应无法解析
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = self.options.url(&self.options.token_path);

        let response = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(username = %username, status = %status, "Login rejected");
            return Err(BoardError::auth(format!(
                "login for {} rejected with status {}",
                username, status
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| BoardError::parse(format!("invalid token response: {}", e)))?;

        info!(username = %username, "Logged in");
        Ok(token)
    }
}
