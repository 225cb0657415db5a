//! Open Library検索APIクライアント。
//! <https://openlibrary.org/dev/docs/api/search>

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::domain::catalog::{Catalog, CatalogError, SearchPage, SearchQuery};
use crate::domain::model::book::Book;
use crate::domain::model::key::BookKey;

/// Open Library本体のベースURL。
pub const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";

/// 表紙画像サービスのベースURL。
const COVERS_BASE_URL: &str = "https://covers.openlibrary.org";

/// API側の上限。
const MAX_LIMIT: u32 = 100;
const DEFAULT_LIMIT: u32 = 20;

/// Open Library検索APIクライアント。
#[derive(Debug, Clone)]
pub struct OpenLibraryCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl OpenLibraryCatalog {
    pub fn new() -> Self {
        Self::with_base_url(OPEN_LIBRARY_BASE_URL)
    }

    /// ベースURLを差し替えて構築する（テストスタブ用）。
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// 検索URLを組み立てる。qとtitleは空白のみなら付与しない。
    fn search_url(&self, query: &SearchQuery) -> Result<reqwest::Url, CatalogError> {
        let endpoint = format!("{}/search.json", self.base_url.trim_end_matches('/'));
        let mut url = reqwest::Url::parse(&endpoint)
            .map_err(|e| CatalogError::Transport(Box::new(e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            if let Some(q) = normalized(query.query.as_deref()) {
                pairs.append_pair("q", q);
            }
            if let Some(title) = normalized(query.title.as_deref()) {
                pairs.append_pair("title", title);
            }
            pairs.append_pair("limit", &effective_limit(query).to_string());
            pairs.append_pair("page", &effective_page(query).to_string());
        }

        Ok(url)
    }
}

impl Default for OpenLibraryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for OpenLibraryCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, CatalogError> {
        let url = self.search_url(query)?;

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Transport(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(Box::new(e)))?;

        let doc_count = body.docs.len();
        let books: Vec<Book> = body.docs.into_iter().filter_map(map_doc).collect();
        if books.len() < doc_count {
            debug!(
                skipped = doc_count - books.len(),
                "skipped documents without a usable key"
            );
        }

        let total = body.num_found.unwrap_or(books.len() as u64);
        Ok(SearchPage {
            books,
            total,
            page: effective_page(query),
        })
    }
}

fn normalized(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn effective_limit(query: &SearchQuery) -> u32 {
    query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn effective_page(query: &SearchQuery) -> u32 {
    query.page.unwrap_or(1).max(1)
}

/// search.json のレスポンス（必要なフィールドのみ）。
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "numFound", default)]
    num_found: Option<u64>,
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    cover_i: Option<u64>,
}

/// APIドキュメントを正規化Bookへ変換する。keyの無いドキュメントはNone。
fn map_doc(doc: SearchDoc) -> Option<Book> {
    let key = BookKey::new(doc.key?).ok()?;

    let title = doc
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let author = doc
        .author_name
        .into_iter()
        .next()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "Unknown Author".to_string());

    let cover_url = doc
        .cover_i
        .map(|id| format!("{COVERS_BASE_URL}/b/id/{id}-L.jpg"));

    Some(Book::new(
        key,
        title,
        author,
        doc.first_publish_year,
        cover_url,
    ))
}
