#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("render error: {0}")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("export I/O error: {0}")]
    ExportIo(#[source] std::io::Error),
}
