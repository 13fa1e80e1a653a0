use crate::application::title_synthesizer::TitleSynthesizer;
use crate::domain::extract::extract_task_fields;
use crate::domain::models::{
    format_deadline, normalize_deadline, Category, Priority, Task, TASK_TITLE_MAX_CHARS,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_log::EventLog;
use crate::infrastructure::task_repository::{NewTask, TaskStore};
use chrono::NaiveDate;
use std::sync::Arc;

const VOICE_TAG: &str = "голосовая";

/// Identity of the chat user a free-text task came from.
#[derive(Debug, Clone, Default)]
pub struct ChatUser {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTask {
    pub task_id: i64,
    pub user_id: i64,
    pub title: String,
    pub category: Category,
    pub priority: Priority,
    pub deadline: Option<String>,
}

/// Turns free text (typed or transcribed) into stored tasks.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    synthesizer: TitleSynthesizer,
    log: Arc<EventLog>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, synthesizer: TitleSynthesizer, log: Arc<EventLog>) -> Self {
        Self {
            store,
            synthesizer,
            log,
        }
    }

    pub async fn create_task_from_text(
        &self,
        user: &ChatUser,
        text: &str,
        from_voice: bool,
    ) -> Result<CreatedTask, InfraError> {
        let today = chrono::Local::now().date_naive();
        self.create_task_from_text_at(user, text, from_voice, today)
            .await
    }

    /// Same as `create_task_from_text` with an explicit "today" so relative
    /// date words resolve deterministically.
    pub async fn create_task_from_text_at(
        &self,
        user: &ChatUser,
        text: &str,
        from_voice: bool,
        today: NaiveDate,
    ) -> Result<CreatedTask, InfraError> {
        let user_id = self
            .store
            .create_user(
                user.chat_id,
                user.username.as_deref(),
                user.first_name.as_deref(),
                user.last_name.as_deref(),
            )
            .inspect_err(|error| {
                self.log.error(
                    "create_task_from_text",
                    &format!("user upsert failed for chat {}: {error}", user.chat_id),
                )
            })?;

        let parsed = extract_task_fields(text, today);
        let title = self.synthesizer.synthesize(&parsed.title).await;

        // a bare time with no date does not make a deadline
        let deadline = parsed
            .date
            .map(|date| format_deadline(date, parsed.time));
        let category = parsed.category.unwrap_or(Category::Other);
        let priority = parsed.priority.unwrap_or(Priority::Medium);
        let mut tags = vec![priority.as_code().to_string()];
        if from_voice {
            tags.push(VOICE_TAG.to_string());
        }

        let task_id = self
            .store
            .create_task(
                user_id,
                NewTask {
                    title: title.clone(),
                    category,
                    tags: Some(tags.join(",")),
                    deadline: deadline.clone(),
                },
            )
            .inspect_err(|error| {
                self.log.error(
                    "create_task_from_text",
                    &format!("persist failed for user {user_id}: {error}"),
                )
            })?;

        self.log.info(
            "create_task_from_text",
            &format!("task {task_id} created for user {user_id}"),
        );
        Ok(CreatedTask {
            task_id,
            user_id,
            title,
            category,
            priority,
            deadline,
        })
    }

    /// Direct structured creation. The deadline is normalized to the
    /// canonical `DD.MM.YY HH:MM` form and the title is capped.
    pub fn create_task(&self, user_id: i64, mut task: NewTask) -> Result<i64, InfraError> {
        if task.title.trim().is_empty() {
            return Err(InfraError::InvalidInput(
                "task title must not be empty".to_string(),
            ));
        }
        if task.title.chars().count() > TASK_TITLE_MAX_CHARS {
            task.title = task.title.chars().take(TASK_TITLE_MAX_CHARS).collect();
        }
        task.deadline = task.deadline.as_deref().map(normalize_deadline);

        let task_id = self.store.create_task(user_id, task).inspect_err(|error| {
            self.log.error(
                "create_task",
                &format!("persist failed for user {user_id}: {error}"),
            )
        })?;
        self.log.info(
            "create_task",
            &format!("task {task_id} created for user {user_id}"),
        );
        Ok(task_id)
    }

    pub fn task_by_id(&self, task_id: i64) -> Result<Option<Task>, InfraError> {
        self.store.task_by_id(task_id)
    }
}
