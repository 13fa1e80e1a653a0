use crate::domain::models::SessionType;
use crate::infrastructure::event_log::EventLog;
use crate::infrastructure::task_repository::TaskStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const PROGRESS_BAR_WIDTH: usize = 15;
const AUTO_CHAIN_STEPS: u32 = 8;

const FINAL_SPRINT_QUOTES: [&str; 5] = [
    "Почти готово! 🏁",
    "Последние секунды! ⚡",
    "Ты у цели! 🎯",
    "Финишная прямая! 🚀",
    "Ещё чуть-чуть! 💪",
];

const CLOSING_QUOTES: [&str; 5] = [
    "Осталось совсем немного! 🔜",
    "Продолжай в том же духе! 🔥",
    "Ты на правильном пути! ⭐",
    "Концентрация на максимуме! 🎯",
    "Отличная работа! 👏",
];

const STEADY_QUOTES: [&str; 8] = [
    "Ты справишься! 💪",
    "Сосредоточься на цели! 🎯",
    "Держи темп! 🚀",
    "Твоё время - твоя сила! ⚡",
    "Каждая минута важна! ⏰",
    "Фокус - ключ к успеху! 🗝️",
    "Ты можешь больше! 🌟",
    "Продуктивность в действии! 🔥",
];

/// Snapshot pushed to the chat surface on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerView {
    pub session_type: SessionType,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub progress_line: String,
    pub quote: String,
    pub chain_step: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReport {
    Completed {
        session_type: SessionType,
        duration_seconds: u32,
    },
    /// A chain step finished; the chain waits for an explicit continue.
    ChainStepCompleted { step: u32, next_session: SessionType },
    ChainFinished { total_sessions: u32 },
}

/// Where timer updates land (a chat message, a widget). Render failures
/// are transient and must not stop the timer.
#[async_trait]
pub trait TimerSurface: Send + Sync {
    async fn render(&self, view: TimerView) -> Result<(), String>;
    async fn report(&self, report: SessionReport);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDurations {
    pub work_seconds: u32,
    pub short_break_seconds: u32,
    pub long_break_seconds: u32,
}

impl Default for SessionDurations {
    fn default() -> Self {
        Self {
            work_seconds: SessionType::Work.default_duration_seconds(),
            short_break_seconds: SessionType::ShortBreak.default_duration_seconds(),
            long_break_seconds: SessionType::LongBreak.default_duration_seconds(),
        }
    }
}

impl SessionDurations {
    fn duration_for(&self, session_type: SessionType) -> u32 {
        match session_type {
            SessionType::Work => self.work_seconds,
            SessionType::ShortBreak => self.short_break_seconds,
            SessionType::LongBreak => self.long_break_seconds,
        }
    }
}

struct TimerControl {
    paused: AtomicBool,
    remaining_seconds: AtomicU32,
}

struct ActiveTimer {
    handle: JoinHandle<()>,
    control: Arc<TimerControl>,
    session_type: SessionType,
    surface: Arc<dyn TimerSurface>,
    chain_step: Option<u32>,
    awaiting_continue: bool,
    // identifies which tick task owns this entry; a completing task may
    // only touch the entry while the generations still match
    generation: u64,
}

/// Per-user focus timers. All mutable state lives in the keyed map behind
/// one lock; each running timer is a spawned tick task.
pub struct PomodoroController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    timers: Mutex<HashMap<i64, ActiveTimer>>,
    store: Arc<dyn TaskStore>,
    log: Arc<EventLog>,
    tick_period: Duration,
    durations: SessionDurations,
    next_generation: AtomicU64,
}

impl ControllerInner {
    fn lock_timers(&self) -> Option<MutexGuard<'_, HashMap<i64, ActiveTimer>>> {
        match self.timers.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                self.log.error("pomodoro", "timer map lock poisoned");
                None
            }
        }
    }
}

impl PomodoroController {
    pub fn new(store: Arc<dyn TaskStore>, log: Arc<EventLog>) -> Self {
        Self::with_settings(store, log, Duration::from_secs(1), SessionDurations::default())
    }

    pub fn with_settings(
        store: Arc<dyn TaskStore>,
        log: Arc<EventLog>,
        tick_period: Duration,
        durations: SessionDurations,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                timers: Mutex::new(HashMap::new()),
                store,
                log,
                tick_period,
                durations,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Starts a single session. Any running or waiting timer of the same
    /// user is discarded first without recording anything.
    pub fn start_timer(
        &self,
        user_id: i64,
        session_type: SessionType,
        duration_seconds: u32,
        surface: Arc<dyn TimerSurface>,
    ) {
        self.start_internal(user_id, session_type, duration_seconds, surface, None);
    }

    /// Starts the fixed eight-step chain: work and short breaks alternate,
    /// the eighth step is the long break.
    pub fn start_auto_chain(&self, user_id: i64, surface: Arc<dyn TimerSurface>) {
        let session_type = chain_session(1);
        let duration = self.inner.durations.duration_for(session_type);
        self.start_internal(user_id, session_type, duration, surface, Some(1));
    }

    fn start_internal(
        &self,
        user_id: i64,
        session_type: SessionType,
        duration_seconds: u32,
        surface: Arc<dyn TimerSurface>,
        chain_step: Option<u32>,
    ) {
        // a zero-length session would complete before its first tick and
        // record a row that fails PomodoroSession::validate
        if duration_seconds == 0 {
            return;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let control = Arc::new(TimerControl {
            paused: AtomicBool::new(false),
            remaining_seconds: AtomicU32::new(duration_seconds),
        });
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.inner),
            user_id,
            session_type,
            duration_seconds,
            Arc::clone(&control),
            Arc::clone(&surface),
            chain_step,
            generation,
        ));

        let Some(mut timers) = self.inner.lock_timers() else {
            handle.abort();
            return;
        };
        if let Some(previous) = timers.insert(
            user_id,
            ActiveTimer {
                handle,
                control,
                session_type,
                surface,
                chain_step,
                awaiting_continue: false,
                generation,
            },
        ) {
            previous.handle.abort();
        }
    }

    /// Advances a chain that finished a step and is waiting. Returns false
    /// when no chain is waiting for this user.
    pub fn continue_auto_chain(&self, user_id: i64) -> bool {
        let (surface, next_step) = {
            let Some(mut timers) = self.inner.lock_timers() else {
                return false;
            };
            let waiting = matches!(
                timers.get(&user_id),
                Some(timer) if timer.awaiting_continue && timer.chain_step.is_some()
            );
            if !waiting {
                return false;
            }
            let Some(timer) = timers.remove(&user_id) else {
                return false;
            };
            let Some(step) = timer.chain_step else {
                return false;
            };
            (timer.surface, step + 1)
        };

        let session_type = chain_session(next_step);
        let duration = self.inner.durations.duration_for(session_type);
        self.start_internal(user_id, session_type, duration, surface, Some(next_step));
        true
    }

    pub fn pause(&self, user_id: i64) -> bool {
        let Some(timers) = self.inner.lock_timers() else {
            return false;
        };
        match timers.get(&user_id) {
            Some(timer) if !timer.awaiting_continue => {
                !timer.control.paused.swap(true, Ordering::SeqCst)
            }
            _ => false,
        }
    }

    pub fn resume(&self, user_id: i64) -> bool {
        let Some(timers) = self.inner.lock_timers() else {
            return false;
        };
        match timers.get(&user_id) {
            Some(timer) if !timer.awaiting_continue => {
                timer.control.paused.swap(false, Ordering::SeqCst)
            }
            _ => false,
        }
    }

    /// Discards the user's timer. An interrupted session leaves no trace
    /// in statistics.
    pub fn stop(&self, user_id: i64) -> bool {
        let Some(mut timers) = self.inner.lock_timers() else {
            return false;
        };
        match timers.remove(&user_id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn remaining_seconds(&self, user_id: i64) -> Option<u32> {
        let timers = self.inner.lock_timers()?;
        timers
            .get(&user_id)
            .map(|timer| timer.control.remaining_seconds.load(Ordering::SeqCst))
    }

    pub fn is_running(&self, user_id: i64) -> bool {
        self.inner
            .lock_timers()
            .map(|timers| timers.contains_key(&user_id))
            .unwrap_or(false)
    }

    pub fn active_session(&self, user_id: i64) -> Option<SessionType> {
        let timers = self.inner.lock_timers()?;
        timers.get(&user_id).map(|timer| timer.session_type)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_timer(
    inner: Arc<ControllerInner>,
    user_id: i64,
    session_type: SessionType,
    total_seconds: u32,
    control: Arc<TimerControl>,
    surface: Arc<dyn TimerSurface>,
    chain_step: Option<u32>,
    generation: u64,
) {
    let mut remaining = total_seconds;
    while remaining > 0 {
        tokio::time::sleep(inner.tick_period).await;
        if control.paused.load(Ordering::SeqCst) {
            continue;
        }
        remaining -= 1;
        control.remaining_seconds.store(remaining, Ordering::SeqCst);
        if remaining == 0 {
            break;
        }
        let view = TimerView {
            session_type,
            remaining_seconds: remaining,
            total_seconds,
            progress_line: progress_bar(total_seconds - remaining, total_seconds),
            quote: motivational_quote(remaining).to_string(),
            chain_step,
        };
        // a failed edit skips this tick only
        let _ = surface.render(view).await;
    }

    match inner
        .store
        .record_pomodoro_session(user_id, total_seconds, None)
    {
        Ok(session_id) => inner.log.info(
            "pomodoro",
            &format!("session {session_id} recorded for user {user_id}"),
        ),
        Err(error) => inner.log.error(
            "pomodoro",
            &format!("session persist failed for user {user_id}: {error}"),
        ),
    }

    // a restart may have replaced the map entry between the last tick and
    // this cleanup; only the entry's owner may remove or mutate it, and a
    // superseded run makes no report
    match chain_step {
        None => {
            if !remove_owned_entry(&inner, user_id, generation) {
                return;
            }
            surface
                .report(SessionReport::Completed {
                    session_type,
                    duration_seconds: total_seconds,
                })
                .await;
        }
        Some(step) if step < AUTO_CHAIN_STEPS => {
            let owned = inner.lock_timers().is_some_and(|mut timers| {
                match timers.get_mut(&user_id) {
                    Some(timer) if timer.generation == generation => {
                        timer.awaiting_continue = true;
                        true
                    }
                    _ => false,
                }
            });
            if !owned {
                return;
            }
            surface
                .report(SessionReport::ChainStepCompleted {
                    step,
                    next_session: chain_session(step + 1),
                })
                .await;
        }
        Some(_) => {
            if !remove_owned_entry(&inner, user_id, generation) {
                return;
            }
            surface
                .report(SessionReport::ChainFinished {
                    total_sessions: AUTO_CHAIN_STEPS,
                })
                .await;
        }
    }
}

fn remove_owned_entry(inner: &ControllerInner, user_id: i64, generation: u64) -> bool {
    let Some(mut timers) = inner.lock_timers() else {
        return false;
    };
    match timers.get(&user_id) {
        Some(timer) if timer.generation == generation => {
            timers.remove(&user_id);
            true
        }
        _ => false,
    }
}

fn chain_session(step: u32) -> SessionType {
    match step {
        AUTO_CHAIN_STEPS => SessionType::LongBreak,
        step if step % 2 == 1 => SessionType::Work,
        _ => SessionType::ShortBreak,
    }
}

pub fn progress_bar(elapsed_seconds: u32, total_seconds: u32) -> String {
    let progress = if total_seconds == 0 {
        1.0
    } else {
        f64::from(elapsed_seconds) / f64::from(total_seconds)
    };
    let filled = (PROGRESS_BAR_WIDTH as f64 * progress) as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);
    let bar: String = "█".repeat(filled) + &"▒".repeat(PROGRESS_BAR_WIDTH - filled);
    format!("[{bar}] {}%", (progress * 100.0) as u32)
}

/// Quote pool depends on how much time is left; within a pool the pick
/// rotates with the countdown so repeated renders stay deterministic.
pub fn motivational_quote(remaining_seconds: u32) -> &'static str {
    let pool: &[&str] = if remaining_seconds < 60 {
        &FINAL_SPRINT_QUOTES
    } else if remaining_seconds < 300 {
        &CLOSING_QUOTES
    } else {
        &STEADY_QUOTES
    };
    pool[remaining_seconds as usize % pool.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::task_repository::InMemoryTaskStore;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    const TICK: Duration = Duration::from_millis(5);

    struct Harness {
        controller: PomodoroController,
        store: Arc<InMemoryTaskStore>,
        logs_dir: std::path::PathBuf,
    }

    impl Harness {
        fn new(durations: SessionDurations) -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let logs_dir = std::env::temp_dir().join(format!(
                "focusup-pomodoro-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&logs_dir).expect("create temp logs dir");
            let store = Arc::new(InMemoryTaskStore::default());
            let controller = PomodoroController::with_settings(
                Arc::clone(&store) as Arc<dyn TaskStore>,
                Arc::new(EventLog::new(&logs_dir)),
                TICK,
                durations,
            );
            Self {
                controller,
                store,
                logs_dir,
            }
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.logs_dir);
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        reports: Mutex<Vec<SessionReport>>,
        views: Mutex<Vec<TimerView>>,
    }

    impl RecordingSurface {
        fn reports(&self) -> Vec<SessionReport> {
            self.reports.lock().expect("reports lock").clone()
        }

        fn views(&self) -> Vec<TimerView> {
            self.views.lock().expect("views lock").clone()
        }
    }

    #[async_trait]
    impl TimerSurface for RecordingSurface {
        async fn render(&self, view: TimerView) -> Result<(), String> {
            self.views.lock().expect("views lock").push(view);
            Ok(())
        }

        async fn report(&self, report: SessionReport) {
            self.reports.lock().expect("reports lock").push(report);
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn natural_completion_records_exactly_one_session() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(7, SessionType::Work, 3, Arc::clone(&surface) as _);

        let store = Arc::clone(&harness.store);
        wait_until(|| !harness.controller.is_running(7)).await;

        let sessions = store.pomodoro_sessions(7).expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_seconds, 3);
        assert_eq!(
            surface.reports(),
            vec![SessionReport::Completed {
                session_type: SessionType::Work,
                duration_seconds: 3,
            }]
        );

        let views = surface.views();
        assert!(!views.is_empty());
        for view in &views {
            assert_eq!(view.total_seconds, 3);
            assert_eq!(
                view.progress_line.matches('█').count() + view.progress_line.matches('▒').count(),
                15
            );
        }
    }

    #[tokio::test]
    async fn second_start_discards_the_first_without_a_record() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(7, SessionType::Work, 10_000, Arc::clone(&surface) as _);
        harness
            .controller
            .start_timer(7, SessionType::ShortBreak, 10_000, Arc::clone(&surface) as _);

        tokio::time::sleep(TICK * 4).await;
        assert!(harness.controller.is_running(7));
        assert_eq!(
            harness.controller.active_session(7),
            Some(SessionType::ShortBreak)
        );
        assert!(harness.store.pomodoro_sessions(7).expect("sessions").is_empty());
        assert!(harness.controller.stop(7));
    }

    #[tokio::test]
    async fn pause_preserves_remaining_exactly() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(7, SessionType::Work, 10_000, Arc::clone(&surface) as _);

        wait_until(|| {
            harness
                .controller
                .remaining_seconds(7)
                .is_some_and(|remaining| remaining < 10_000)
        })
        .await;
        assert!(harness.controller.pause(7));
        // let any tick already in flight settle
        tokio::time::sleep(TICK * 3).await;
        let frozen = harness.controller.remaining_seconds(7).expect("running");
        tokio::time::sleep(TICK * 10).await;
        assert_eq!(harness.controller.remaining_seconds(7), Some(frozen));

        assert!(harness.controller.resume(7));
        wait_until(|| {
            harness
                .controller
                .remaining_seconds(7)
                .is_some_and(|remaining| remaining < frozen)
        })
        .await;
        assert!(harness.controller.stop(7));
    }

    #[tokio::test]
    async fn stop_records_nothing() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(7, SessionType::Work, 10_000, Arc::clone(&surface) as _);
        tokio::time::sleep(TICK * 4).await;

        assert!(harness.controller.stop(7));
        assert!(!harness.controller.stop(7));
        assert!(harness.store.pomodoro_sessions(7).expect("sessions").is_empty());
        assert!(surface.reports().is_empty());
    }

    #[tokio::test]
    async fn control_calls_without_a_timer_are_no_ops() {
        let harness = Harness::new(SessionDurations::default());
        assert!(!harness.controller.pause(7));
        assert!(!harness.controller.resume(7));
        assert!(!harness.controller.stop(7));
        assert!(!harness.controller.continue_auto_chain(7));
        assert_eq!(harness.controller.remaining_seconds(7), None);
    }

    #[tokio::test]
    async fn auto_chain_advances_only_on_explicit_continue() {
        let harness = Harness::new(SessionDurations {
            work_seconds: 2,
            short_break_seconds: 1,
            long_break_seconds: 1,
        });
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_auto_chain(7, Arc::clone(&surface) as _);

        wait_until(|| {
            surface
                .reports()
                .iter()
                .any(|report| matches!(report, SessionReport::ChainStepCompleted { step: 1, .. }))
        })
        .await;
        assert_eq!(harness.store.pomodoro_sessions(7).expect("sessions").len(), 1);

        // waiting for continue: nothing advances on its own
        tokio::time::sleep(TICK * 10).await;
        assert_eq!(harness.store.pomodoro_sessions(7).expect("sessions").len(), 1);
        assert!(!harness.controller.pause(7));

        for step in 2..=AUTO_CHAIN_STEPS {
            assert!(harness.controller.continue_auto_chain(7));
            wait_until(|| {
                harness.store.pomodoro_sessions(7).expect("sessions").len() == step as usize
            })
            .await;
        }

        wait_until(|| !harness.controller.is_running(7)).await;
        let reports = surface.reports();
        assert!(matches!(
            reports.last(),
            Some(SessionReport::ChainFinished { total_sessions: 8 })
        ));
        assert!(reports
            .iter()
            .any(|report| matches!(
                report,
                SessionReport::ChainStepCompleted {
                    step: 2,
                    next_session: SessionType::Work,
                }
            )));
        assert!(!harness.controller.continue_auto_chain(7));
    }

    #[tokio::test]
    async fn restart_during_completion_cleanup_keeps_the_new_timer_controllable() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());

        // repeatedly land a restart right around the first timer's natural
        // completion; the replacement must stay in the map and stoppable
        for _ in 0..25 {
            harness
                .controller
                .start_timer(7, SessionType::Work, 1, Arc::clone(&surface) as _);
            tokio::time::sleep(TICK).await;
            harness
                .controller
                .start_timer(7, SessionType::Work, 10_000, Arc::clone(&surface) as _);
            tokio::time::sleep(TICK * 3).await;

            assert!(harness.controller.is_running(7));
            assert!(harness.controller.stop(7));
        }

        // only naturally completed one-second runs may have rows
        let sessions = harness.store.pomodoro_sessions(7).expect("sessions");
        assert!(sessions
            .iter()
            .all(|session| session.duration_seconds == 1));
    }

    #[tokio::test]
    async fn zero_duration_start_is_rejected() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(7, SessionType::Work, 0, Arc::clone(&surface) as _);

        tokio::time::sleep(TICK * 4).await;
        assert!(!harness.controller.is_running(7));
        assert!(harness.store.pomodoro_sessions(7).expect("sessions").is_empty());
        assert!(surface.reports().is_empty());
    }

    #[tokio::test]
    async fn users_tick_independently() {
        let harness = Harness::new(SessionDurations::default());
        let surface = Arc::new(RecordingSurface::default());
        harness
            .controller
            .start_timer(1, SessionType::Work, 2, Arc::clone(&surface) as _);
        harness
            .controller
            .start_timer(2, SessionType::Work, 10_000, Arc::clone(&surface) as _);

        wait_until(|| !harness.controller.is_running(1)).await;
        assert!(harness.controller.is_running(2));
        assert_eq!(harness.store.pomodoro_sessions(1).expect("sessions").len(), 1);
        assert!(harness.store.pomodoro_sessions(2).expect("sessions").is_empty());
        assert!(harness.controller.stop(2));
    }

    #[test]
    fn chain_steps_map_to_session_types() {
        assert_eq!(chain_session(1), SessionType::Work);
        assert_eq!(chain_session(2), SessionType::ShortBreak);
        assert_eq!(chain_session(7), SessionType::Work);
        assert_eq!(chain_session(8), SessionType::LongBreak);
    }

    #[test]
    fn progress_bar_is_fifteen_cells_wide() {
        assert_eq!(progress_bar(0, 100), format!("[{}] 0%", "▒".repeat(15)));
        assert_eq!(progress_bar(100, 100), format!("[{}] 100%", "█".repeat(15)));

        let halfway = progress_bar(50, 100);
        assert_eq!(halfway.matches('█').count(), 7);
        assert_eq!(halfway.matches('▒').count(), 8);
        assert!(halfway.ends_with("50%"));
    }

    #[test]
    fn quote_pool_follows_the_remaining_time() {
        assert!(FINAL_SPRINT_QUOTES.contains(&motivational_quote(30)));
        assert!(CLOSING_QUOTES.contains(&motivational_quote(120)));
        assert!(STEADY_QUOTES.contains(&motivational_quote(1200)));
        // same countdown value always picks the same quote
        assert_eq!(motivational_quote(120), motivational_quote(120));
    }
}
