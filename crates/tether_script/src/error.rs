//! Script errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("pending job failed: {0}")]
    Job(String),

    #[error("callback table is full ({0} slots)")]
    CallbacksFull(usize),

    #[error("no callback registered with id {0}")]
    UnknownCallback(i32),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
}
