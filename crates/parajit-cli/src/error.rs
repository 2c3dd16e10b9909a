//! The CLI's own error enum, wrapping each library crate's error type so
//! `main.rs`'s `exit_code_for` can match on it to pick an exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Compiler(#[from] parajit_compiler::Error),

    #[error(transparent)]
    Runtime(#[from] parajit_runtime::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
