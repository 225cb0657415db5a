use std::path::PathBuf;

use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdoutはMCPトランスポートが使うのでログはstderrへ
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let favorites_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("favorites.json"));

    bookshelf_mcp::interface::mcp::run(favorites_path).await
}
