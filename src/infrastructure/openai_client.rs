use crate::infrastructure::config::AiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u64 = 2;

/// Failures of the external generation service. `user_message` renders
/// each one as the string shown to the user instead of an AI reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("API key is not configured")]
    MissingKey,
    #[error("API key was rejected")]
    InvalidKey,
    #[error("access to the API is forbidden")]
    Forbidden,
    #[error("model '{0}' was not found")]
    ModelNotFound(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("server error: HTTP {0}")]
    Server(u16),
    #[error("response body is not valid JSON")]
    MalformedBody,
    #[error("response JSON has an unexpected shape")]
    UnexpectedFormat,
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl AiError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingKey => {
                "❌ OpenAI API key не настроен. Добавьте OPENAI_API_KEY в .env файл".to_string()
            }
            Self::InvalidKey => {
                "❌ Неверный OpenAI API ключ. Проверьте OPENAI_API_KEY в .env".to_string()
            }
            Self::Forbidden => {
                "❌ Доступ запрещен. Проверьте права доступа к OpenAI API".to_string()
            }
            Self::ModelNotFound(model) => {
                format!("❌ Модель {model} не найдена. Проверьте настройку OPENAI_MODEL")
            }
            Self::RateLimited => {
                "❌ Превышен лимит запросов OpenAI API. Попробуйте позже".to_string()
            }
            Self::Server(status) => format!("❌ Серверная ошибка OpenAI: {status}"),
            Self::MalformedBody => "❌ Неверный ответ от OpenAI (не JSON)".to_string(),
            Self::UnexpectedFormat => {
                "❌ Неожиданный формат ответа от OpenAI. Проверьте логи.".to_string()
            }
            Self::Unavailable(details) => format!("⚠️ OpenAI временно недоступен: {details}"),
        }
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_text: &str,
        max_tokens: u32,
    ) -> Result<String, AiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGenerationClient {
    client: Client,
    config: AiConfig,
}

impl ReqwestGenerationClient {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| AiError::Unavailable(error.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, AiError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|error| AiError::Unavailable(format!("invalid API base URL: {error}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AiError::Unavailable("API base URL cannot carry a path".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }
}

#[async_trait]
impl GenerationClient for ReqwestGenerationClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_text: &str,
        max_tokens: u32,
    ) -> Result<String, AiError> {
        let api_key = self.config.api_key.as_deref().ok_or(AiError::MissingKey)?;
        let url = self.endpoint_url(&["chat", "completions"])?;
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text},
            ],
            "max_completion_tokens": max_tokens,
        });

        let mut last_error = AiError::UnexpectedFormat;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(url.clone())
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await
                .map_err(|error| AiError::Unavailable(error.to_string()))?;

            let status = response.status();
            match status {
                StatusCode::UNAUTHORIZED => return Err(AiError::InvalidKey),
                StatusCode::FORBIDDEN => return Err(AiError::Forbidden),
                StatusCode::NOT_FOUND => {
                    return Err(AiError::ModelNotFound(self.config.model.clone()))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    last_error = AiError::RateLimited;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(1000 * attempt)).await;
                    }
                    continue;
                }
                status if status.is_server_error() => {
                    last_error = AiError::Server(status.as_u16());
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500 * attempt)).await;
                    }
                    continue;
                }
                _ => {}
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(_) => {
                    last_error = AiError::MalformedBody;
                    continue;
                }
            };
            return extract_generated_text(&body).ok_or(AiError::UnexpectedFormat);
        }
        Err(last_error)
    }
}

/// Pulls the reply text out of the known response shapes: chat choices
/// first, then the older completion `text`, then a top-level field.
fn extract_generated_text(body: &Value) -> Option<String> {
    let from_choices = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| {
            choice
                .get("message")
                .and_then(|message| message.get("content"))
                .or_else(|| choice.get("text"))
        });
    let text = from_choices
        .or_else(|| body.get("output"))
        .or_else(|| body.get("text"))
        .and_then(Value::as_str)?;

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_extends_base_path() {
        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            api_base: "https://api.openai.com/v1/".to_string(),
        };
        let client = ReqwestGenerationClient::new(config).expect("build client");
        let url = client
            .endpoint_url(&["chat", "completions"])
            .expect("endpoint url");
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn extracts_chat_completion_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "  Уроки  "}}]
        });
        assert_eq!(extract_generated_text(&body).as_deref(), Some("Уроки"));
    }

    #[test]
    fn falls_back_to_completion_text_then_top_level() {
        let completion = serde_json::json!({"choices": [{"text": "ответ"}]});
        assert_eq!(
            extract_generated_text(&completion).as_deref(),
            Some("ответ")
        );

        let top_level = serde_json::json!({"output": "готово"});
        assert_eq!(extract_generated_text(&top_level).as_deref(), Some("готово"));
    }

    #[test]
    fn rejects_empty_and_malformed_bodies() {
        assert_eq!(extract_generated_text(&serde_json::json!({})), None);
        assert_eq!(
            extract_generated_text(&serde_json::json!({"choices": []})),
            None
        );
        assert_eq!(
            extract_generated_text(&serde_json::json!({"choices": [{"message": {"content": "  "}}]})),
            None
        );
    }

    #[test]
    fn user_messages_carry_the_failure_marker() {
        assert_eq!(
            AiError::InvalidKey.user_message(),
            "❌ Неверный OpenAI API ключ. Проверьте OPENAI_API_KEY в .env"
        );
        assert_eq!(
            AiError::ModelNotFound("gpt-4o".to_string()).user_message(),
            "❌ Модель gpt-4o не найдена. Проверьте настройку OPENAI_MODEL"
        );
        assert_eq!(
            AiError::Server(503).user_message(),
            "❌ Серверная ошибка OpenAI: 503"
        );
        assert!(AiError::Unavailable("timeout".to_string())
            .user_message()
            .starts_with("⚠️"));
    }
}
