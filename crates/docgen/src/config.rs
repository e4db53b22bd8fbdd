//! 说明服务配置

use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 说明服务配置，构造时传入客户端
#[derive(Clone)]
pub struct ExplainerConfig {
    /// 没有凭据时不启用说明服务
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
    /// 每次调用后的固定等待
    pub settle_delay: Duration,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(500),
        }
    }
}

impl std::fmt::Debug for ExplainerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

impl ExplainerConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载 (便于测试)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("OPENAI_API_KEY") {
            if !v.trim().is_empty() {
                config.api_key = Some(v.trim().to_string());
            }
        }

        if let Some(v) = lookup("VBADOC_API_BASE") {
            if !v.trim().is_empty() {
                config.api_base = v.trim().trim_end_matches('/').to_string();
            }
        }

        if let Some(v) = lookup("VBADOC_MODEL") {
            if !v.trim().is_empty() {
                config.model = v.trim().to_string();
            }
        }

        if let Some(v) = lookup("VBADOC_TIMEOUT_SECS") {
            if let Ok(secs) = v.trim().parse() {
                config.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(v) = lookup("VBADOC_SETTLE_MS") {
            if let Ok(ms) = v.trim().parse() {
                config.settle_delay = Duration::from_millis(ms);
            }
        }

        config
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}
