use crate::backend::{BearerToken, SignalBackend};
use std::sync::{Arc, RwLock};

/// 应用上下文
///
/// 显式传递给需要后端或令牌的组件，不使用全局单例。
#[derive(Clone)]
pub struct BoardContext {
    backend: Arc<dyn SignalBackend>,
    token: Arc<RwLock<Option<BearerToken>>>,
}

impl BoardContext {
    pub fn new(backend: Arc<dyn SignalBackend>) -> Self {
        Self {
            backend,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_token(self, token: BearerToken) -> Self {
        self.set_token(Some(token));
        self
    }

    pub fn backend(&self) -> Arc<dyn SignalBackend> {
        self.backend.clone()
    }

    /// 当前令牌的副本
    pub fn token(&self) -> Option<BearerToken> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 替换令牌（登录或注销后由认证协作方调用）
    pub fn set_token(&self, token: Option<BearerToken>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

impl std::fmt::Debug for BoardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardContext")
            .field("backend", &self.backend.name())
            .field("token", &self.token())
            .finish()
    }
}
