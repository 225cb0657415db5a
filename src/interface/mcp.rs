//! MCP Server for bookshelf-mcp
//!
//! MCP Protocol (stdio) <-> application::FavoritesStore / page controllers
//!
//! 4 tools: search, favorites, favorite, export

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::error::AppError;
use crate::application::page::{ActivePage, FavoritesPage, HomePage, PageState, HOME_RESULT_LIMIT};
use crate::application::render::{Card, ExportConfig, ExportFormat, RenderService};
use crate::application::store::FavoritesStore;
use crate::domain::catalog::{Catalog, CatalogError, SearchQuery};
use crate::domain::model::book::Book;
use crate::domain::model::key::BookKey;
use crate::domain::repository::FavoritesRepository;
use crate::infra::json_store::JsonFavoritesRepository;
use crate::infra::open_library::OpenLibraryCatalog;

// =============================================================================
// Public entry point
// =============================================================================

/// MCP Serverを起動する。favorites_pathはお気に入りコレクションの保存先。
pub async fn run(favorites_path: PathBuf) -> anyhow::Result<()> {
    let repo = JsonFavoritesRepository::new(favorites_path);
    let store = FavoritesStore::open(repo);
    let server = BookshelfServer::new(store, Arc::new(OpenLibraryCatalog::new()));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

// =============================================================================
// MCP Server
// =============================================================================

type Store = FavoritesStore<JsonFavoritesRepository>;

#[derive(Clone)]
struct BookshelfServer {
    store: Arc<RwLock<Store>>,
    pages: Arc<RwLock<PageState>>,
    catalog: Arc<dyn Catalog>,
    tool_router: ToolRouter<Self>,
}

impl BookshelfServer {
    fn new(store: Store, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            pages: Arc::new(RwLock::new(PageState::default())),
            catalog,
            tool_router: Self::tool_router(),
        }
    }

    fn to_mcp_error(e: AppError) -> McpError {
        McpError::internal_error(format!("{e}"), None)
    }

    /// アクティブページのカード列を現在のストア内容で組み立てる。
    fn active_cards(&self) -> Result<Vec<Card>, McpError> {
        let store = self
            .store
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let pages = self
            .pages
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;

        let books: Vec<Book> = match pages.active {
            ActivePage::Home => pages.home.results().to_vec(),
            ActivePage::Favorites => pages.favorites.view(&store).books,
        };

        let mut cards = RenderService::cards(&books);
        store.hydrate(&mut cards);
        Ok(cards)
    }

    /// カード参照 → Book に解決する。
    ///
    /// 優先順位:
    /// 1. カード番号（直近に描画したリストの1始まり、出力の番号に対応）
    /// 2. key完全一致（アクティブページ → お気に入り）
    /// 3. タイトル部分一致（case-insensitive、一意のときだけ）
    fn resolve_card(&self, reference: &str) -> Result<Book, McpError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(McpError::invalid_params("card must not be empty", None));
        }

        let cards = self.active_cards()?;

        // 1. カード番号
        if let Ok(number) = reference.parse::<usize>() {
            if number == 0 || number > cards.len() {
                return Err(McpError::invalid_params(
                    format!(
                        "Card number {} out of range (1-{}). Use the book key or a title fragment instead.",
                        number,
                        cards.len()
                    ),
                    None,
                ));
            }
            return Ok(cards[number - 1].book.clone());
        }

        // 2. key完全一致（アクティブページ優先、次にお気に入り全体）
        if let Some(card) = cards.iter().find(|c| c.book.key().as_str() == reference) {
            return Ok(card.book.clone());
        }
        if let Ok(key) = BookKey::new(reference) {
            let store = self
                .store
                .read()
                .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
            if let Some(book) = store.get(&key) {
                return Ok(book.clone());
            }
        }

        // 3. タイトル部分一致（case-insensitive, フォールバック）
        let needle = reference.to_lowercase();
        let matches: Vec<&Card> = cards
            .iter()
            .filter(|c| c.book.title().to_lowercase().contains(&needle))
            .collect();
        match matches.len() {
            0 => Err(McpError::invalid_params(
                format!("No card found matching: '{reference}'"),
                None,
            )),
            1 => Ok(matches[0].book.clone()),
            n => Err(McpError::invalid_params(
                format!(
                    "Ambiguous reference: '{reference}' matches {n} cards: {}",
                    matches
                        .iter()
                        .map(|c| format!("'{}'", c.book.title()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                None,
            )),
        }
    }
}

// =============================================================================
// ServerHandler impl
// =============================================================================

impl ServerHandler for BookshelfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "bookshelf-mcp".to_string(),
                title: Some("Bookshelf MCP — Open Library Search & Favorites".to_string()),
                description: Some(
                    "Browse the Open Library catalog and keep a local favorites shelf. \
                     2-step workflow: `search` → pick a card → `favorite`."
                        .to_string(),
                ),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Search books and manage a locally persisted favorites shelf.\n\
                 \n\
                 Intended flow: `search` (omit the query to browse the default set), mark cards \
                 with `favorite` (card number, book key, or title fragment), review with \
                 `favorites` (optional filter), write the list out with `export`.\n\
                 \n\
                 Favorites survive restarts. Toggling from either page updates the list \
                 immediately — the reply re-renders the page you last viewed."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_ctx).await
    }
}

// =============================================================================
// Request types
// =============================================================================

/// filenameにパス区切り文字や".."が含まれていないことを検証する。
fn validate_filename(filename: &str) -> Result<(), McpError> {
    if filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.is_empty()
    {
        return Err(McpError::invalid_params(
            "filename must not contain path separators, '..', or be empty",
            None,
        ));
    }
    Ok(())
}

fn parse_export_format(s: Option<&str>) -> Result<ExportFormat, McpError> {
    match s {
        Some("json") => Ok(ExportFormat::Json),
        Some("markdown") | None => Ok(ExportFormat::Markdown),
        Some(other) => Err(McpError::invalid_params(
            format!("Unknown format: '{other}'. Use: markdown, json"),
            None,
        )),
    }
}

/// 空白のみの入力をNoneに落とす。
fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpSearchRequest {
    #[schemars(
        description = "Free text search (title, author, ...). Omit or leave blank to browse the default set."
    )]
    pub query: Option<String>,
    #[schemars(description = "Search by title only, instead of free text.")]
    pub title: Option<String>,
    #[schemars(description = "Results per page, 1-100 (default: 24)")]
    pub limit: Option<u32>,
    #[schemars(description = "Page number, starting at 1 (default: 1)")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpFavoritesRequest {
    #[schemars(
        description = "Show only favorites whose title or author contains this text (case-insensitive). Omit to show all."
    )]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpFavoriteRequest {
    #[schemars(
        description = "Card to toggle: number from the last rendered list (e.g. '3'), exact book key (e.g. '/works/OL45883W'), or a unique title fragment."
    )]
    pub card: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpExportRequest {
    #[schemars(description = "Output directory path (default: current directory)")]
    pub output_dir: Option<String>,
    #[schemars(description = "Output filename (default: 'favorites.md' / 'favorites.json')")]
    pub filename: Option<String>,
    #[schemars(description = "Output format: 'markdown' (default) or 'json'")]
    pub format: Option<String>,
    #[schemars(
        description = "Export only favorites whose title or author contains this text (case-insensitive)"
    )]
    pub filter: Option<String>,
}

// =============================================================================
// Tool implementations
// =============================================================================

#[tool_router]
impl BookshelfServer {
    #[tool(
        name = "search",
        description = "Search the Open Library catalog and render the results as numbered cards (★ = favorited). Omit the query to browse the default set. Card numbers feed `favorite`.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            open_world_hint = true
        )
    )]
    async fn search(
        &self,
        Parameters(req): Parameters<McpSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let query_text = trimmed(req.query.as_deref());
        let title_text = trimmed(req.title.as_deref());
        let browsing = query_text.is_none() && title_text.is_none();
        let label = search_label(query_text, title_text);
        let query = build_search_query(query_text, title_text, req.limit, req.page);

        let ticket = {
            let mut pages = self
                .pages
                .write()
                .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
            pages.home.begin_search()
        };

        let outcome = self.catalog.search(&query).await;

        let result_page = match outcome {
            Ok(result_page) => result_page,
            Err(e) => {
                warn!(error = %e, "catalog search failed");
                return Ok(CallToolResult::success(vec![Content::text(
                    search_failure_message(browsing, &e),
                )]));
            }
        };

        let header = format!("{} ({} found)", label, result_page.total);

        let store = self
            .store
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let mut pages = self
            .pages
            .write()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;

        let applied = pages.home.apply(ticket, header, result_page.books);
        pages.active = ActivePage::Home;

        let rendered = render_home_page(&store, &pages.home);
        let text = if applied {
            rendered
        } else {
            // 追い越された検索の結果は捨て、最新の表示を返す
            format!("Search superseded by a newer request. Showing the latest results.\n\n{rendered}")
        };

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        name = "favorites",
        description = "Show the favorites page, optionally filtered by title/author substring. The filter only narrows the view — the stored list is untouched. Card numbers feed `favorite`.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn favorites(
        &self,
        Parameters(req): Parameters<McpFavoritesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let store = self
            .store
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let mut pages = self
            .pages
            .write()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;

        pages.favorites.set_filter(req.filter);
        pages.active = ActivePage::Favorites;

        Ok(CallToolResult::success(vec![Content::text(
            render_favorites_page(&store, &pages.favorites),
        )]))
    }

    #[tool(
        name = "favorite",
        description = "Toggle a book's favorite state. Specify the card by number from the last rendered list, by exact book key, or by a unique title fragment. Replies with the change and re-renders the active page.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn favorite(
        &self,
        Parameters(req): Parameters<McpFavoriteRequest>,
    ) -> Result<CallToolResult, McpError> {
        let book = self.resolve_card(&req.card)?;
        let title = book.title().to_string();

        let mut store = self
            .store
            .write()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let now_favorite = store.toggle(book);

        let pages = self
            .pages
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let rendered = match pages.active {
            ActivePage::Home => render_home_page(&store, &pages.home),
            ActivePage::Favorites => render_favorites_page(&store, &pages.favorites),
        };

        let verdict = if now_favorite {
            "Added to Favorites"
        } else {
            "Removed from Favorites"
        };

        Ok(CallToolResult::success(vec![Content::text(format!(
            "{verdict}: {title}\n\n{rendered}"
        ))]))
    }

    #[tool(
        name = "export",
        description = "Write the favorites list to a file as Markdown cards or JSON. Optional filter narrows the exported set. The stored list is NOT modified.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn export(
        &self,
        Parameters(req): Parameters<McpExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format = parse_export_format(req.format.as_deref())?;

        let default_ext = match format {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        };
        let filename = req
            .filename
            .unwrap_or_else(|| format!("favorites.{default_ext}"));
        validate_filename(&filename)?;

        let output_dir = req
            .output_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let store = self
            .store
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;

        let filter = trimmed(req.filter.as_deref());
        let books: Vec<Book> = match filter {
            Some(term) => store.filter(term).into_iter().cloned().collect(),
            None => store.all().to_vec(),
        };

        let header = favorites_header(filter, books.len(), store.len());
        let config = ExportConfig {
            output_dir,
            filename,
            format,
        };

        let path = RenderService::export(&header, &books, &config).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Favorites exported to: {} ({} books)",
            path.display(),
            books.len()
        ))]))
    }
}

// =============================================================================
// Helpers — page rendering
// =============================================================================

/// 検索結果リストの見出しラベル。件数は後から付く。
fn search_label(query_text: Option<&str>, title_text: Option<&str>) -> String {
    match (query_text, title_text) {
        (None, None) => "Browse".to_string(),
        (Some(q), _) => format!("Results for \"{q}\""),
        (None, Some(t)) => format!("Results for title \"{t}\""),
    }
}

/// MCPリクエスト → カタログ検索条件。入力が両方空なら既定セットへフォールバック。
fn build_search_query(
    query_text: Option<&str>,
    title_text: Option<&str>,
    limit: Option<u32>,
    page: Option<u32>,
) -> SearchQuery {
    let mut query = if query_text.is_none() && title_text.is_none() {
        HomePage::browse_query()
    } else {
        SearchQuery {
            query: query_text.map(String::from),
            title: title_text.map(String::from),
            limit: Some(HOME_RESULT_LIMIT),
            page: None,
        }
    };

    if limit.is_some() {
        query.limit = limit;
    }
    if page.is_some() {
        query.page = page;
    }
    query
}

fn search_failure_message(browsing: bool, e: &CatalogError) -> String {
    let base = if browsing {
        "Failed to load books. Please try again."
    } else {
        "Search failed. Please try again."
    };
    match e {
        CatalogError::Status(status) => format!("{base} (HTTP {status})"),
        _ => base.to_string(),
    }
}

fn render_home_page<R: FavoritesRepository>(store: &FavoritesStore<R>, home: &HomePage) -> String {
    if home.results().is_empty() {
        return format!("# {}\n\nNo results found.", home.header());
    }
    let mut cards = RenderService::cards(home.results());
    store.hydrate(&mut cards);
    RenderService::render_markdown(home.header(), &cards)
}

fn render_favorites_page<R: FavoritesRepository>(
    store: &FavoritesStore<R>,
    page: &FavoritesPage,
) -> String {
    let view = page.view(store);
    let header = favorites_header(page.filter(), view.books.len(), store.len());

    if let Some(notice) = view.notice {
        return format!("# {header}\n\n{notice}");
    }

    let mut cards = RenderService::cards(&view.books);
    store.hydrate(&mut cards);
    RenderService::render_markdown(&header, &cards)
}

fn favorites_header(filter: Option<&str>, shown: usize, total: usize) -> String {
    match filter {
        Some(term) => format!("Favorites matching \"{term}\" ({shown} of {total})"),
        None => format!("Favorites ({total} books)"),
    }
}

// =============================================================================
// Tests
// =============================================================================
