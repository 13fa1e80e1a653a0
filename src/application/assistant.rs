use crate::application::stats::{PomodoroStats, UserStats};
use crate::infrastructure::openai_client::GenerationClient;
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;

const MAX_RESPONSE_TOKENS: u32 = 1000;
const MAX_REPLY_CHARS: usize = 1000;
const TRUNCATION_NOTE: &str = "\n\n✂️ *Ответ сокращён для удобства чтения*";
const DEFAULT_CONTEXT: &str = "Пользователь только начал использовать бот";

static JSON_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{[^}]*\}$").expect("valid json blob pattern"));
static OPAQUE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=_-]{16,64}$").expect("valid token pattern"));
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z]*\n?").expect("valid fence pattern"));
static HEADING_MARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("valid heading pattern"));
static REPEATED_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid spaces pattern"));
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newlines pattern"));

/// Task counts the assistant gets as conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl UserContext {
    pub fn from_stats(stats: &UserStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            completed: stats.completed,
        }
    }

    fn describe(&self) -> String {
        format!(
            "Задач всего: {}, активных: {}, выполнено: {}",
            self.total, self.active, self.completed
        )
    }
}

/// Conversational layer over the generation client. Every failure is
/// degraded to the client's user-facing message, so callers always get
/// a displayable string.
pub struct Assistant {
    client: Arc<dyn GenerationClient>,
}

impl Assistant {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    pub async fn ask(&self, question: &str, context: Option<UserContext>) -> String {
        let system_prompt = build_system_prompt(context);
        match self
            .client
            .generate(&system_prompt, question, MAX_RESPONSE_TOKENS)
            .await
        {
            Ok(raw) => plain_ai_text(&normalize_ai_response(&raw)),
            Err(error) => error.user_message(),
        }
    }

    pub async fn create_task_plan(&self, goal: &str, timeframe: &str) -> String {
        let prompt = format!(
            "Составь пошаговый план достижения цели.\n\
             Цель: {goal}\n\
             Срок: {timeframe}\n\
             Дай 3-5 конкретных шагов с примерной оценкой времени на каждый."
        );
        self.ask(&prompt, None).await
    }

    pub async fn analyze_productivity(
        &self,
        stats: &UserStats,
        pomodoro: &PomodoroStats,
    ) -> String {
        let prompt = format!(
            "Проанализируй продуктивность пользователя и дай 2-3 совета.\n\
             Задач всего: {}, активных: {}, выполнено: {}, просрочено: {}.\n\
             Фокус-сессий: {}, общее время фокуса: {} минут.",
            stats.total,
            stats.active,
            stats.completed,
            stats.overdue,
            pomodoro.sessions,
            pomodoro.total_seconds / 60
        );
        self.ask(&prompt, Some(UserContext::from_stats(stats))).await
    }
}

fn build_system_prompt(context: Option<UserContext>) -> String {
    let context_line = context
        .map(|context| context.describe())
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
    format!(
        "Ты - AI-ассистент для тайм-менеджмента FocusUp. Помогаешь планировать задачи, \
         бороться с прокрастинацией и сохранять фокус.\n\
         Контекст пользователя: {context_line}.\n\
         Правила ответа:\n\
         - отвечай на русском языке;\n\
         - без markdown-разметки;\n\
         - 500-800 символов, по делу, дружелюбно."
    )
}

/// Rejects replies that are service noise rather than text, and strips
/// markdown the chat surface cannot render.
pub fn normalize_ai_response(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() < 200 && JSON_BLOB.is_match(trimmed) {
        return "❌ Сервис вернул служебный ответ. Попробуйте переформулировать вопрос."
            .to_string();
    }
    if OPAQUE_TOKEN.is_match(trimmed) {
        return "❌ Не удалось получить понятный ответ. Попробуйте ещё раз.".to_string();
    }

    let text = CODE_FENCE.replace_all(trimmed, "");
    let text = HEADING_MARKS.replace_all(&text, "");
    text.replace("**", "")
        .replace("__", "")
        .replace("~~", "")
        .replace(['*', '_', '`'], "")
        .trim()
        .to_string()
}

/// Tightens whitespace and cuts over-long replies at a sentence end,
/// marking the cut.
pub fn plain_ai_text(raw: &str) -> String {
    let text = REPEATED_SPACES.replace_all(raw, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.chars().count() <= MAX_REPLY_CHARS {
        return text.to_string();
    }

    let window: String = text.chars().take(MAX_REPLY_CHARS).collect();
    let cut = window
        .rfind(['.', '!', '?'])
        .map(|position| position + 1)
        .unwrap_or(window.len());
    format!("{}{TRUNCATION_NOTE}", &window[..cut])
}
