pub mod config;
pub mod error;
pub mod event_log;
pub mod openai_client;
pub mod storage;
pub mod task_repository;
pub mod transcription_client;
