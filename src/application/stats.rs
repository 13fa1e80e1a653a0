use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_repository::TaskStore;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub overdue: usize,
    /// Completed share of all tasks as a percentage, 0.0 with no tasks
    /// at all.
    pub completion_rate: f64,
    pub categories: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroStats {
    pub sessions: usize,
    pub total_seconds: u64,
    pub average_seconds: u64,
}

impl PomodoroStats {
    /// Achievement label shown next to the session count.
    pub fn level_label(&self) -> &'static str {
        match self.sessions {
            sessions if sessions >= 20 => "🏆 Мастер продуктивности",
            sessions if sessions >= 10 => "🔥 Продуктивный",
            sessions if sessions >= 5 => "⭐ Начинающий",
            _ => "🌱 Новичок",
        }
    }
}

pub struct StatsService {
    store: Arc<dyn TaskStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn compute_user_stats(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<UserStats, InfraError> {
        let tasks = self.store.list_tasks(user_id)?;
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let overdue = tasks.iter().filter(|task| task.is_overdue(now)).count();
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };

        let mut categories = BTreeMap::new();
        for task in &tasks {
            *categories.entry(task.category.as_code()).or_insert(0) += 1;
        }

        Ok(UserStats {
            total,
            active: total - completed,
            completed,
            overdue,
            completion_rate,
            categories,
        })
    }

    pub fn compute_pomodoro_stats(&self, user_id: i64) -> Result<PomodoroStats, InfraError> {
        let sessions = self.store.pomodoro_sessions(user_id)?;
        let total_seconds: u64 = sessions
            .iter()
            .map(|session| u64::from(session.duration_seconds))
            .sum();
        let average_seconds = if sessions.is_empty() {
            0
        } else {
            total_seconds / sessions.len() as u64
        };
        Ok(PomodoroStats {
            sessions: sessions.len(),
            total_seconds,
            average_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Category;
    use crate::infrastructure::task_repository::{InMemoryTaskStore, NewTask};
    use chrono::NaiveDate;

    fn seed_task(
        store: &InMemoryTaskStore,
        user_id: i64,
        category: Category,
        deadline: Option<&str>,
        completed: bool,
    ) {
        let task_id = store
            .create_task(
                user_id,
                NewTask {
                    title: "задача".to_string(),
                    category,
                    tags: None,
                    deadline: deadline.map(ToOwned::to_owned),
                },
            )
            .expect("create task");
        if completed {
            store.set_completed(task_id, true).expect("complete");
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 20)
            .expect("valid date")
            .and_hms_opt(12, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn empty_store_yields_zero_rates_not_errors() {
        let store = Arc::new(InMemoryTaskStore::default());
        let service = StatsService::new(Arc::clone(&store) as _);

        let stats = service.compute_user_stats(1, now()).expect("stats");
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(stats.categories.is_empty());

        let pomodoro = service.compute_pomodoro_stats(1).expect("stats");
        assert_eq!(pomodoro.sessions, 0);
        assert_eq!(pomodoro.average_seconds, 0);
    }

    #[test]
    fn counts_split_by_completion_and_overdue() {
        let store = Arc::new(InMemoryTaskStore::default());
        let user_id = store.create_user(42, None, None, None).expect("user");
        seed_task(&store, user_id, Category::Work, Some("01.01.20 09:00"), false);
        seed_task(&store, user_id, Category::Work, None, true);
        seed_task(&store, user_id, Category::Health, Some("31.12.30"), false);
        seed_task(&store, user_id, Category::Personal, None, false);

        let service = StatsService::new(Arc::clone(&store) as _);
        let stats = service.compute_user_stats(user_id, now()).expect("stats");
        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_rate, 25.0);
        assert_eq!(stats.categories.get("work"), Some(&2));
        assert_eq!(stats.categories.get("health"), Some(&1));
    }

    #[test]
    fn pomodoro_totals_and_levels() {
        let store = Arc::new(InMemoryTaskStore::default());
        let user_id = store.create_user(42, None, None, None).expect("user");
        for _ in 0..5 {
            store
                .record_pomodoro_session(user_id, 1500, None)
                .expect("record");
        }

        let service = StatsService::new(Arc::clone(&store) as _);
        let stats = service.compute_pomodoro_stats(user_id).expect("stats");
        assert_eq!(stats.sessions, 5);
        assert_eq!(stats.total_seconds, 7500);
        assert_eq!(stats.average_seconds, 1500);
        assert_eq!(stats.level_label(), "⭐ Начинающий");

        assert_eq!(
            PomodoroStats {
                sessions: 0,
                total_seconds: 0,
                average_seconds: 0
            }
            .level_label(),
            "🌱 Новичок"
        );
        assert_eq!(
            PomodoroStats {
                sessions: 25,
                total_seconds: 0,
                average_seconds: 0
            }
            .level_label(),
            "🏆 Мастер продуктивности"
        );
    }
}
