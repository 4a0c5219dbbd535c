use chg_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}
