//! 说明服务 - OpenAI 兼容的 chat/completions 接口

use crate::config::ExplainerConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("service returned an empty response")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// 说明服务不可用时替代说明正文的文本
pub const EXPLANATION_UNAVAILABLE: &str = "Explanation unavailable: the summarization service could not be reached.";

const EXPLAIN_INSTRUCTION: &str = "You are documenting legacy spreadsheet macros. \
Explain what the following VBA code does: its overall purpose, each procedure it defines, \
and how the procedures interact.";

const STEPS_INSTRUCTION: &str = "Describe the control flow of the following VBA code as a \
numbered list of steps. Write exactly one step per line and nothing else.";

/// 说明结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// 总体说明，失败时为 `EXPLANATION_UNAVAILABLE`
    pub summary: String,
    /// 逐行步骤，失败时为 None
    pub steps: Option<String>,
}

impl Explanation {
    pub fn unavailable() -> Self {
        Self {
            summary: EXPLANATION_UNAVAILABLE.to_string(),
            steps: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.summary != EXPLANATION_UNAVAILABLE
    }
}

/// 外部说明服务
#[async_trait]
pub trait Explainer: Send + Sync {
    /// 总体说明
    async fn explain(&self, source: &str) -> Result<String>;

    /// 编号步骤，一行一步
    async fn steps(&self, source: &str) -> Result<String>;
}

/// 调用两次服务；任一失败只影响对应部分，不会让请求失败
pub async fn explain_source(explainer: &dyn Explainer, source: &str) -> Explanation {
    let summary = match explainer.explain(source).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Explanation request failed: {}", e);
            return Explanation::unavailable();
        }
    };

    let steps = match explainer.steps(source).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Step request failed: {}", e);
            None
        }
    };

    Explanation { summary, steps }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI 兼容客户端
pub struct OpenAiExplainer {
    client: Client,
    config: ExplainerConfig,
    api_key: String,
}

impl OpenAiExplainer {
    pub fn new(config: ExplainerConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or(ServiceError::MissingApiKey)?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// 有凭据时构造，否则 None
    pub fn from_config(config: ExplainerConfig) -> Option<Box<dyn Explainer>> {
        match Self::new(config) {
            Ok(explainer) => Some(Box::new(explainer)),
            Err(ServiceError::MissingApiKey) => None,
            Err(e) => {
                warn!("Explanation service disabled: {}", e);
                None
            }
        }
    }

    async fn complete(&self, instruction: &str, source: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: source,
                },
            ],
        };

        debug!("POST {} ({} bytes of source)", url, source.len());
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await;

        tokio::time::sleep(self.config.settle_delay).await;
        let response = response?;

        if !response.status().is_success() {
            return Err(ServiceError::Api(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let data: ChatResponse = response.json().await?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl Explainer for OpenAiExplainer {
    async fn explain(&self, source: &str) -> Result<String> {
        self.complete(EXPLAIN_INSTRUCTION, source).await
    }

    async fn steps(&self, source: &str) -> Result<String> {
        self.complete(STEPS_INSTRUCTION, source).await
    }
}
