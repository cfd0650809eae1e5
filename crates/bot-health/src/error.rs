use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("no record for {entity_type}:{entity_id}")]
    NotFound {
        entity_type: String,
        entity_id: String,
    },
}

pub type Result<T> = std::result::Result<T, HealthError>;
