use crate::infrastructure::config::AiConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TRANSCRIPT_PREFIX: &str = "🎤 Распознанный текст:\n\n";

/// Outcome of a transcription attempt. Failures are already rendered as
/// user-facing Russian strings, so callers only branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    Recognized(String),
    Failed(String),
}

#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        format: &str,
        language: &str,
    ) -> TranscriptionOutcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestTranscriptionClient {
    client: Client,
    config: AiConfig,
}

impl ReqwestTranscriptionClient {
    pub fn new(config: AiConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| error.to_string())?;
        Ok(Self { client, config })
    }

    fn endpoint_url(&self) -> Option<Url> {
        let mut url = Url::parse(&self.config.api_base).ok()?;
        {
            let mut path = url.path_segments_mut().ok()?;
            path.pop_if_empty();
            path.extend(["audio", "transcriptions"]);
        }
        Some(url)
    }
}

#[async_trait]
impl TranscriptionClient for ReqwestTranscriptionClient {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        format: &str,
        language: &str,
    ) -> TranscriptionOutcome {
        let Some(api_key) = self.config.api_key.clone() else {
            return TranscriptionOutcome::Failed(
                "❌ Голосовое распознавание недоступно. Не настроен OpenAI API ключ.".to_string(),
            );
        };
        let Some(url) = self.endpoint_url() else {
            return TranscriptionOutcome::Failed(
                "❌ Ошибка при обращении к сервису распознавания.".to_string(),
            );
        };

        let file_part = match Part::bytes(audio)
            .file_name(format!("audio.{format}"))
            .mime_str(&format!("audio/{format}"))
        {
            Ok(part) => part,
            Err(_) => {
                return TranscriptionOutcome::Failed(
                    "❌ Ошибка при обращении к сервису распознавания.".to_string(),
                )
            }
        };
        let form = Form::new()
            .part("file", file_part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", language.to_string());

        let response = match self
            .client
            .post(url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                return TranscriptionOutcome::Failed(
                    "❌ Превышено время ожидания. Попробуйте ещё раз.".to_string(),
                )
            }
            Err(_) => {
                return TranscriptionOutcome::Failed(
                    "❌ Ошибка при обращении к сервису распознавания.".to_string(),
                )
            }
        };

        let status = response.status();
        if !status.is_success() {
            return TranscriptionOutcome::Failed(format!(
                "❌ Ошибка распознавания: {}",
                status.as_u16()
            ));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) => {
                return TranscriptionOutcome::Failed(
                    "❌ Ошибка при обращении к сервису распознавания.".to_string(),
                )
            }
        };
        let text = body
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return TranscriptionOutcome::Failed(
                "❌ Не удалось распознать речь. Попробуйте говорить чётче.".to_string(),
            );
        }
        TranscriptionOutcome::Recognized(text.to_string())
    }
}

/// Runs a transcription and renders the result the way the chat surface
/// shows it: recognized text behind a microphone prefix, failures as-is.
pub async fn recognize_voice(
    client: &dyn TranscriptionClient,
    audio: Vec<u8>,
    format: &str,
) -> String {
    match client.transcribe(audio, format, "ru").await {
        TranscriptionOutcome::Recognized(text) => format!("{TRANSCRIPT_PREFIX}{text}"),
        TranscriptionOutcome::Failed(message) => message,
    }
}

pub fn is_failure_message(rendered: &str) -> bool {
    rendered.starts_with('❌')
}

/// Recovers the plain transcript from a rendered recognition result.
pub fn strip_transcript_prefix(rendered: &str) -> &str {
    rendered.strip_prefix(TRANSCRIPT_PREFIX).unwrap_or(rendered)
}
