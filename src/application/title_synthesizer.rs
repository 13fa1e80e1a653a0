use crate::domain::title::{accept_generated_title, fallback_title};
use crate::infrastructure::openai_client::GenerationClient;
use std::sync::Arc;

const TITLE_MAX_TOKENS: u32 = 50;

const TITLE_SYSTEM_PROMPT: &str = "Ты помощник, который придумывает короткие названия задач. \
Отвечай только названием, без пояснений и без кавычек.";

/// Produces a short task title from already-cleaned task text. With a
/// generation client the title comes from the model, otherwise (or on
/// any model failure) from the deterministic fallback. Never fails and
/// never exceeds 30 characters.
pub struct TitleSynthesizer {
    client: Option<Arc<dyn GenerationClient>>,
}

impl TitleSynthesizer {
    pub fn new(client: Option<Arc<dyn GenerationClient>>) -> Self {
        Self { client }
    }

    pub fn deterministic() -> Self {
        Self { client: None }
    }

    pub async fn synthesize(&self, clean_text: &str) -> String {
        if let Some(client) = &self.client {
            let prompt = build_title_prompt(clean_text);
            if let Ok(raw) = client
                .generate(TITLE_SYSTEM_PROMPT, &prompt, TITLE_MAX_TOKENS)
                .await
            {
                if let Some(title) = accept_generated_title(&raw) {
                    return title;
                }
            }
        }
        fallback_title(clean_text)
    }
}

fn build_title_prompt(clean_text: &str) -> String {
    format!(
        "Создай короткое название задачи (до 30 символов) из текста пользователя.\n\
         Убери из названия даты, время и слова-паразиты, оставь суть.\n\n\
         Примеры:\n\
         \"Завтра в 5 часов вечера уроки\" -> \"Уроки\"\n\
         \"Позвонить маме в 19:30\" -> \"Позвонить маме\"\n\
         \"Сходить в магазин за продуктами\" -> \"Покупка продуктов\"\n\
         \"Встреча с командой по проекту\" -> \"Встреча с командой\"\n\n\
         Текст: \"{clean_text}\"\n\
         Название:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::title::TITLE_MAX_CHARS;
    use crate::infrastructure::openai_client::AiError;
    use async_trait::async_trait;

    struct CannedGenerator(Result<String, AiError>);

    #[async_trait]
    impl GenerationClient for CannedGenerator {
        async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, AiError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn uses_the_generated_title_when_acceptable() {
        let synthesizer =
            TitleSynthesizer::new(Some(Arc::new(CannedGenerator(Ok("\"Уроки\"".to_string())))));
        assert_eq!(synthesizer.synthesize("уроки").await, "Уроки");
    }

    #[tokio::test]
    async fn falls_back_when_the_model_fails() {
        let synthesizer = TitleSynthesizer::new(Some(Arc::new(CannedGenerator(Err(
            AiError::RateLimited,
        )))));
        assert_eq!(
            synthesizer.synthesize("Позвонить маме").await,
            "Позвонить маме"
        );
    }

    #[tokio::test]
    async fn falls_back_when_the_model_returns_noise() {
        let synthesizer =
            TitleSynthesizer::new(Some(Arc::new(CannedGenerator(Ok("\"\"".to_string())))));
        assert_eq!(
            synthesizer.synthesize("Сходить к врачу").await,
            "Сходить к врачу"
        );
    }

    #[tokio::test]
    async fn deterministic_mode_never_calls_a_model() {
        let synthesizer = TitleSynthesizer::deterministic();
        assert_eq!(
            synthesizer.synthesize("встреча завтра в 10:00").await,
            "встреча"
        );
    }

    #[tokio::test]
    async fn generated_titles_are_capped() {
        let long = "Очень длинное название задачи которое не помещается".to_string();
        let synthesizer = TitleSynthesizer::new(Some(Arc::new(CannedGenerator(Ok(long)))));
        let title = synthesizer.synthesize("что-то").await;
        assert!(title.chars().count() <= TITLE_MAX_CHARS);
        assert!(title.ends_with("..."));
    }
}
