use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical task categories. Legacy rows may carry emoji-prefixed Russian
/// labels or free text; those are normalized at the read boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Study,
    Health,
    Personal,
    Fun,
    Other,
}

impl Category {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Health => "health",
            Self::Personal => "personal",
            Self::Fun => "fun",
            Self::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "💼 Работа",
            Self::Study => "🎓 Учеба",
            Self::Health => "🏋️ Здоровье",
            Self::Personal => "🏠 Личное",
            Self::Fun => "🎉 Развлечения",
            Self::Other => "🔧 Другое",
        }
    }

    pub fn normalize(raw: Option<&str>) -> Category {
        let Some(raw) = raw else {
            return Self::Personal;
        };
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "work" => return Self::Work,
            "study" => return Self::Study,
            "health" => return Self::Health,
            "personal" => return Self::Personal,
            "fun" => return Self::Fun,
            "other" => return Self::Other,
            _ => {}
        }
        if lowered.contains("работ") {
            Self::Work
        } else if lowered.contains("учеб") || lowered.contains("учёб") {
            Self::Study
        } else if lowered.contains("здоров") {
            Self::Health
        } else if lowered.contains("развлеч") {
            Self::Fun
        } else if lowered.contains("друго") {
            Self::Other
        } else {
            Self::Personal
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Priority has historically been stored inside the free-text tags column.
    pub fn from_tags(tags: Option<&str>) -> Priority {
        let Some(tags) = tags else {
            return Self::Medium;
        };
        let lowered = tags.to_lowercase();
        let trimmed = lowered.trim();
        if lowered.contains("high") || lowered.contains("высок") || trimmed == "3" {
            Self::High
        } else if lowered.contains("low") || lowered.contains("низк") || trimmed == "1" {
            Self::Low
        } else {
            Self::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn default_duration_seconds(self) -> u32 {
        match self {
            Self::Work => 25 * 60,
            Self::ShortBreak => 5 * 60,
            Self::LongBreak => 15 * 60,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Работа",
            Self::ShortBreak => "Короткий перерыв",
            Self::LongBreak => "Длинный перерыв",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub const TASK_TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub category: Category,
    pub tags: Option<String>,
    pub deadline: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        if self.title.chars().count() > TASK_TITLE_MAX_CHARS {
            return Err(format!(
                "task.title must not exceed {TASK_TITLE_MAX_CHARS} characters"
            ));
        }
        if let Some(deadline) = self.deadline.as_deref() {
            validate_non_empty(deadline, "task.deadline")?;
        }
        Ok(())
    }

    pub fn priority(&self) -> Priority {
        Priority::from_tags(self.tags.as_deref())
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        if self.completed {
            return false;
        }
        match self.deadline.as_deref().and_then(parse_deadline) {
            Some(deadline) => deadline < now,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PomodoroSession {
    pub id: i64,
    pub user_id: i64,
    pub duration_seconds: u32,
    pub task_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

impl PomodoroSession {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_seconds == 0 {
            return Err("pomodoro.duration_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

const DEADLINE_DATE_FORMAT: &str = "%d.%m.%y";
const DEADLINE_DATETIME_FORMAT: &str = "%d.%m.%y %H:%M";

/// Renders the canonical stored deadline form, `DD.MM.YY` with an optional
/// `HH:MM` suffix.
pub fn format_deadline(date: NaiveDate, time: Option<NaiveTime>) -> String {
    match time {
        Some(time) => format!(
            "{} {}",
            date.format(DEADLINE_DATE_FORMAT),
            time.format("%H:%M")
        ),
        None => date.format(DEADLINE_DATE_FORMAT).to_string(),
    }
}

/// Re-parses a stored deadline string. Date-only deadlines resolve to
/// midnight so they stay comparable with timed ones.
pub fn parse_deadline(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, DEADLINE_DATETIME_FORMAT) {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(trimmed, DEADLINE_DATE_FORMAT)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Brings external deadline inputs (ISO-8601, four-digit years) to the
/// canonical form. Unrecognized input passes through unchanged so legacy
/// strings are never destroyed.
pub fn normalize_deadline(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return raw.to_string();
    }

    let mut parsed: Option<NaiveDateTime> = None;
    if trimmed.contains('T') {
        parsed = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").ok();
    }
    if parsed.is_none() {
        for format in [
            DEADLINE_DATETIME_FORMAT,
            "%d.%m.%Y %H:%M",
            "%Y-%m-%d %H:%M:%S",
        ] {
            if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
                parsed = Some(value);
                break;
            }
        }
    }

    match parsed {
        Some(value) => value.format(DEADLINE_DATETIME_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
