#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("book key must not be empty")]
    EmptyKey,
}
