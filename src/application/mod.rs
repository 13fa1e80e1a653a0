pub mod assistant;
pub mod bootstrap;
pub mod pomodoro;
pub mod stats;
pub mod task_pipeline;
pub mod title_synthesizer;
