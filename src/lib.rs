pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::assistant::{Assistant, UserContext};
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::pomodoro::{
    PomodoroController, SessionDurations, SessionReport, TimerSurface, TimerView,
};
pub use application::stats::{PomodoroStats, StatsService, UserStats};
pub use application::task_pipeline::{ChatUser, CreatedTask, TaskService};
pub use application::title_synthesizer::TitleSynthesizer;
pub use domain::extract::{extract_task_fields, ParsedTask};
pub use domain::models::{Category, PomodoroSession, Priority, SessionType, Task, User};
pub use infrastructure::config::AiConfig;
pub use infrastructure::error::InfraError;
pub use infrastructure::event_log::EventLog;
pub use infrastructure::openai_client::{AiError, GenerationClient, ReqwestGenerationClient};
pub use infrastructure::task_repository::{
    InMemoryTaskStore, NewTask, SqliteTaskRepository, TaskStore,
};
pub use infrastructure::transcription_client::{
    is_failure_message, recognize_voice, strip_transcript_prefix, ReqwestTranscriptionClient,
    TranscriptionClient, TranscriptionOutcome,
};
