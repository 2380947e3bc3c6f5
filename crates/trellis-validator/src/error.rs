use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackingError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error("tracking depth limit exceeded (limit={limit}, frame={label})")]
    DepthExceeded { limit: usize, label: String },
}
