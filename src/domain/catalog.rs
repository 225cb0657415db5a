use async_trait::async_trait;

use super::model::book::Book;

/// 検索条件。未指定のフィールドにはクライアント側の既定値が適用される。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// 自由テキスト検索（`q`）。
    pub query: Option<String>,
    /// タイトル限定検索（`title`）。
    pub title: Option<String>,
    /// 1ページあたりの件数。既定20、上限100。
    pub limit: Option<u32>,
    /// 1始まりのページ番号。既定1。
    pub page: Option<u32>,
}

/// 検索1ページ分の結果。
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub books: Vec<Book>,
    /// 全ヒット件数（このページの件数ではない）。
    pub total: u64,
    /// 実際に適用されたページ番号。
    pub page: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// 上流が非2xxステータスを返した。
    #[error("catalog request failed with status {0}")]
    Status(u16),

    #[error("catalog transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("catalog response decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 書籍カタログの抽象。Infra層（Open Libraryクライアント）が実装する。
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, CatalogError>;
}
