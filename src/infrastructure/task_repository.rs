use crate::domain::models::{normalize_deadline, parse_deadline, Category, PomodoroSession, Task, User};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub category: Category,
    pub tags: Option<String>,
    pub deadline: Option<String>,
}

/// Persistence contract consumed by the pipeline, timer, and statistics
/// services. Single-row operations are atomic; no multi-row transactions
/// are required.
pub trait TaskStore: Send + Sync {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<i64, InfraError>;
    fn user_id_by_chat_id(&self, chat_id: i64) -> Result<Option<i64>, InfraError>;

    fn create_task(&self, user_id: i64, task: NewTask) -> Result<i64, InfraError>;
    fn task_by_id(&self, task_id: i64) -> Result<Option<Task>, InfraError>;
    fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, InfraError>;
    fn list_active(&self, user_id: i64) -> Result<Vec<Task>, InfraError>;
    fn list_completed(&self, user_id: i64) -> Result<Vec<Task>, InfraError>;
    fn list_today(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Task>, InfraError>;
    fn list_upcoming(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError>;
    fn list_overdue(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError>;

    fn update_title(&self, task_id: i64, title: &str) -> Result<bool, InfraError>;
    fn update_category(&self, task_id: i64, category: Category) -> Result<bool, InfraError>;
    fn update_deadline(&self, task_id: i64, deadline: Option<&str>) -> Result<bool, InfraError>;
    fn set_completed(&self, task_id: i64, completed: bool) -> Result<bool, InfraError>;
    fn delete_task(&self, task_id: i64) -> Result<bool, InfraError>;

    fn record_pomodoro_session(
        &self,
        user_id: i64,
        duration_seconds: u32,
        task_id: Option<i64>,
    ) -> Result<i64, InfraError>;
    fn pomodoro_sessions(&self, user_id: i64) -> Result<Vec<PomodoroSession>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    db_path: PathBuf,
}

impl SqliteTaskRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn map_task_row(row: &Row<'_>) -> rusqlite::Result<(Task, String, String)> {
        let category_raw: Option<String> = row.get(3)?;
        let created_at_raw: String = row.get(7)?;
        let updated_at_raw: String = row.get(8)?;
        let task = Task {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            // legacy rows carry emoji-prefixed labels, normalize on read
            category: Category::normalize(category_raw.as_deref()),
            tags: row.get(4)?,
            deadline: row.get(5)?,
            completed: row.get::<_, i64>(6)? != 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        Ok((task, created_at_raw, updated_at_raw))
    }

    fn finish_task_row(
        (mut task, created_at_raw, updated_at_raw): (Task, String, String),
    ) -> Result<Task, InfraError> {
        task.created_at = parse_stored_timestamp(&created_at_raw)?;
        task.updated_at = parse_stored_timestamp(&updated_at_raw)?;
        Ok(task)
    }

    fn query_tasks(&self, user_id: i64, filter: &str) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT id, user_id, title, category, tags, deadline, completed, created_at, updated_at
             FROM tasks WHERE user_id = ?1{filter} ORDER BY created_at DESC, id DESC"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params![user_id], Self::map_task_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(Self::finish_task_row(row?)?);
        }
        Ok(tasks)
    }
}

fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidInput(format!("invalid stored timestamp '{raw}': {error}")))
}

impl TaskStore for SqliteTaskRepository {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<i64, InfraError> {
        let connection = self.connect()?;
        // concurrent first contacts race the insert; the conflict clause
        // makes the loser fall through to the shared row
        connection.execute(
            "INSERT INTO users (chat_id, username, first_name, last_name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id) DO NOTHING",
            params![chat_id, username, first_name, last_name],
        )?;
        connection
            .query_row(
                "SELECT id FROM users WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .map_err(InfraError::from)
    }

    fn user_id_by_chat_id(&self, chat_id: i64) -> Result<Option<i64>, InfraError> {
        let connection = self.connect()?;
        connection
            .query_row(
                "SELECT id FROM users WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(InfraError::from)
    }

    fn create_task(&self, user_id: i64, task: NewTask) -> Result<i64, InfraError> {
        let connection = self.connect()?;
        let now = Utc::now().to_rfc3339();
        connection.execute(
            "INSERT INTO tasks (user_id, title, category, tags, deadline, completed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![
                user_id,
                task.title,
                task.category.as_code(),
                task.tags,
                task.deadline,
                now
            ],
        )?;
        Ok(connection.last_insert_rowid())
    }

    fn task_by_id(&self, task_id: i64) -> Result<Option<Task>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT id, user_id, title, category, tags, deadline, completed, created_at, updated_at
                 FROM tasks WHERE id = ?1",
                params![task_id],
                Self::map_task_row,
            )
            .optional()?;
        row.map(Self::finish_task_row).transpose()
    }

    fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        self.query_tasks(user_id, "")
    }

    fn list_active(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        self.query_tasks(user_id, " AND completed = 0")
    }

    fn list_completed(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        self.query_tasks(user_id, " AND completed = 1")
    }

    fn list_today(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Task>, InfraError> {
        // the stored deadline form is not sortable in SQL, filter after re-parse
        let tasks = self.query_tasks(user_id, " AND completed = 0 AND deadline IS NOT NULL")?;
        Ok(tasks
            .into_iter()
            .filter(|task| {
                task.deadline
                    .as_deref()
                    .and_then(parse_deadline)
                    .is_some_and(|deadline| deadline.date() == today)
            })
            .collect())
    }

    fn list_upcoming(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError> {
        let tasks = self.query_tasks(user_id, " AND completed = 0 AND deadline IS NOT NULL")?;
        Ok(tasks
            .into_iter()
            .filter(|task| {
                task.deadline
                    .as_deref()
                    .and_then(parse_deadline)
                    .is_some_and(|deadline| deadline >= now)
            })
            .collect())
    }

    fn list_overdue(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError> {
        let tasks = self.query_tasks(user_id, " AND completed = 0 AND deadline IS NOT NULL")?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.is_overdue(now))
            .collect())
    }

    fn update_title(&self, task_id: i64, title: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks SET title = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, title, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn update_category(&self, task_id: i64, category: Category) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks SET category = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, category.as_code(), Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn update_deadline(&self, task_id: i64, deadline: Option<&str>) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        // stored deadlines must stay in the canonical comparable form
        let deadline = deadline.map(normalize_deadline);
        let changed = connection.execute(
            "UPDATE tasks SET deadline = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, deadline, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn set_completed(&self, task_id: i64, completed: bool) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks SET completed = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, completed as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn delete_task(&self, task_id: i64) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        Ok(changed > 0)
    }

    fn record_pomodoro_session(
        &self,
        user_id: i64,
        duration_seconds: u32,
        task_id: Option<i64>,
    ) -> Result<i64, InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO pomodoro_sessions (user_id, duration_seconds, task_id, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, duration_seconds, task_id, Utc::now().to_rfc3339()],
        )?;
        Ok(connection.last_insert_rowid())
    }

    fn pomodoro_sessions(&self, user_id: i64) -> Result<Vec<PomodoroSession>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, duration_seconds, task_id, completed_at
             FROM pomodoro_sessions WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = statement.query_map(params![user_id], |row| {
            let completed_at_raw: String = row.get(4)?;
            Ok((
                PomodoroSession {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    duration_seconds: row.get(2)?,
                    task_id: row.get(3)?,
                    completed_at: Utc::now(),
                },
                completed_at_raw,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (mut session, completed_at_raw) = row?;
            session.completed_at = parse_stored_timestamp(&completed_at_raw)?;
            sessions.push(session);
        }
        Ok(sessions)
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_user_id: i64,
    next_task_id: i64,
    next_session_id: i64,
    users: Vec<User>,
    tasks: Vec<Task>,
    sessions: Vec<PomodoroSession>,
}

/// In-memory store used by tests and by callers that do not need
/// persistence across restarts.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryTaskStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("task store lock poisoned: {error}")))
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<i64, InfraError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.iter().find(|user| user.chat_id == chat_id) {
            return Ok(user.id);
        }
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.push(User {
            id,
            chat_id,
            username: username.map(ToOwned::to_owned),
            first_name: first_name.map(ToOwned::to_owned),
            last_name: last_name.map(ToOwned::to_owned),
        });
        Ok(id)
    }

    fn user_id_by_chat_id(&self, chat_id: i64) -> Result<Option<i64>, InfraError> {
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .find(|user| user.chat_id == chat_id)
            .map(|user| user.id))
    }

    fn create_task(&self, user_id: i64, task: NewTask) -> Result<i64, InfraError> {
        let mut state = self.lock()?;
        state.next_task_id += 1;
        let id = state.next_task_id;
        let now = Utc::now();
        state.tasks.push(Task {
            id,
            user_id,
            title: task.title,
            category: task.category,
            tags: task.tags,
            deadline: task.deadline,
            completed: false,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn task_by_id(&self, task_id: i64) -> Result<Option<Task>, InfraError> {
        let state = self.lock()?;
        Ok(state.tasks.iter().find(|task| task.id == task_id).cloned())
    }

    fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .iter()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect())
    }

    fn list_active(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        Ok(self
            .list_tasks(user_id)?
            .into_iter()
            .filter(|task| !task.completed)
            .collect())
    }

    fn list_completed(&self, user_id: i64) -> Result<Vec<Task>, InfraError> {
        Ok(self
            .list_tasks(user_id)?
            .into_iter()
            .filter(|task| task.completed)
            .collect())
    }

    fn list_today(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Task>, InfraError> {
        Ok(self
            .list_active(user_id)?
            .into_iter()
            .filter(|task| {
                task.deadline
                    .as_deref()
                    .and_then(parse_deadline)
                    .is_some_and(|deadline| deadline.date() == today)
            })
            .collect())
    }

    fn list_upcoming(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError> {
        Ok(self
            .list_active(user_id)?
            .into_iter()
            .filter(|task| {
                task.deadline
                    .as_deref()
                    .and_then(parse_deadline)
                    .is_some_and(|deadline| deadline >= now)
            })
            .collect())
    }

    fn list_overdue(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<Task>, InfraError> {
        Ok(self
            .list_active(user_id)?
            .into_iter()
            .filter(|task| task.is_overdue(now))
            .collect())
    }

    fn update_title(&self, task_id: i64, title: &str) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        task.title = title.to_string();
        task.updated_at = Utc::now();
        Ok(true)
    }

    fn update_category(&self, task_id: i64, category: Category) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        task.category = category;
        task.updated_at = Utc::now();
        Ok(true)
    }

    fn update_deadline(&self, task_id: i64, deadline: Option<&str>) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        task.deadline = deadline.map(normalize_deadline);
        task.updated_at = Utc::now();
        Ok(true)
    }

    fn set_completed(&self, task_id: i64, completed: bool) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        task.completed = completed;
        task.updated_at = Utc::now();
        Ok(true)
    }

    fn delete_task(&self, task_id: i64) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != task_id);
        Ok(state.tasks.len() < before)
    }

    fn record_pomodoro_session(
        &self,
        user_id: i64,
        duration_seconds: u32,
        task_id: Option<i64>,
    ) -> Result<i64, InfraError> {
        let mut state = self.lock()?;
        state.next_session_id += 1;
        let id = state.next_session_id;
        state.sessions.push(PomodoroSession {
            id,
            user_id,
            duration_seconds,
            task_id,
            completed_at: Utc::now(),
        });
        Ok(id)
    }

    fn pomodoro_sessions(&self, user_id: i64) -> Result<Vec<PomodoroSession>, InfraError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect())
    }
}
