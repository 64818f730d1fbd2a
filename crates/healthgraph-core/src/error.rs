use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealthGraphError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Alarm provider error: {0}")]
    AlarmProvider(String),
}

pub type Result<T> = std::result::Result<T, HealthGraphError>;
