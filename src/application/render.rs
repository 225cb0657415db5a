use serde::{Deserialize, Serialize};

use crate::domain::model::book::Book;

use super::error::AppError;

/// 出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

/// エクスポート設定
pub struct ExportConfig {
    pub output_dir: std::path::PathBuf,
    pub filename: String,
    pub format: ExportFormat,
}

/// 表示用カード。favoritedはストアの内容で後からhydrateされる。
#[derive(Debug, Clone)]
pub struct Card {
    pub book: Book,
    pub favorited: bool,
}

impl Card {
    pub fn new(book: Book, favorited: bool) -> Self {
        Self { book, favorited }
    }
}

/// JSONエクスポート用のリストDTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookList {
    pub title: String,
    pub count: usize,
    pub books: Vec<BookEntry>,
}

/// JSONエクスポート用の1冊分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookEntry {
    pub key: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publish_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// カードリスト → Markdown/JSON表現と書き出し
pub struct RenderService;

impl RenderService {
    /// 未hydrateのカード列を作る。
    pub fn cards(books: &[Book]) -> Vec<Card> {
        books
            .iter()
            .cloned()
            .map(|book| Card::new(book, false))
            .collect()
    }

    fn marker(favorited: bool) -> &'static str {
        if favorited {
            "★"
        } else {
            "☆"
        }
    }

    /// カードリストをMarkdownの番号付きカード列に描画する。
    pub fn render_markdown(header: &str, cards: &[Card]) -> String {
        let mut buf = format!("# {header}\n");

        for (i, card) in cards.iter().enumerate() {
            let book = &card.book;
            buf.push('\n');
            buf.push_str(&format!(
                "{}. {} **{}** — {}",
                i + 1,
                Self::marker(card.favorited),
                book.title(),
                book.author()
            ));
            if let Some(year) = book.first_publish_year() {
                buf.push_str(&format!(" ({year})"));
            }
            buf.push('\n');
            buf.push_str(&format!("   {}", book.key()));
            if let Some(cover) = book.cover_url() {
                buf.push_str(&format!(" · cover: {cover}"));
            }
            buf.push('\n');
        }

        buf
    }

    /// リストDTOを構築する。
    pub fn build_list(title: impl Into<String>, books: &[Book]) -> BookList {
        let entries: Vec<BookEntry> = books
            .iter()
            .map(|book| BookEntry {
                key: book.key().to_string(),
                title: book.title().to_string(),
                author: book.author().to_string(),
                first_publish_year: book.first_publish_year(),
                cover_url: book.cover_url().map(|s| s.to_string()),
            })
            .collect();

        BookList {
            title: title.into(),
            count: entries.len(),
            books: entries,
        }
    }

    /// リストをJSON文字列に変換する。
    pub fn render_json(title: &str, books: &[Book]) -> Result<String, AppError> {
        let list = Self::build_list(title, books);
        serde_json::to_string_pretty(&list).map_err(|e| AppError::Render(Box::new(e)))
    }

    /// リストをファイルに書き出す。
    pub fn export(
        header: &str,
        books: &[Book],
        config: &ExportConfig,
    ) -> Result<std::path::PathBuf, AppError> {
        let content = match config.format {
            ExportFormat::Markdown => {
                // エクスポートされるのはお気に入りなので全カードにマーカーを付ける
                let cards: Vec<Card> = books
                    .iter()
                    .cloned()
                    .map(|book| Card::new(book, true))
                    .collect();
                Self::render_markdown(header, &cards)
            }
            ExportFormat::Json => Self::render_json(header, books)?,
        };

        let path = config.output_dir.join(&config.filename);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(AppError::ExportIo)?;
        }

        std::fs::write(&path, content).map_err(AppError::ExportIo)?;
        Ok(path)
    }
}
