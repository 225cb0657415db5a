//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Mutex;

use async_trait::async_trait;

use bookshelf_mcp::application::store::FavoritesStore;
use bookshelf_mcp::domain::catalog::{Catalog, CatalogError, SearchPage, SearchQuery};
use bookshelf_mcp::domain::model::book::Book;
use bookshelf_mcp::domain::model::favorites::Favorites;
use bookshelf_mcp::domain::model::key::BookKey;
use bookshelf_mcp::domain::repository::FavoritesRepository;

// =============================================================================
// InMemoryRepo — テスト用リポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("in-memory store error")]
pub struct InMemoryError;

/// ファイルI/O不要のインメモリリポジトリ。
/// cloneはストレージを共有するので、Storeに渡した後も外から観察できる。
#[derive(Clone)]
pub struct InMemoryRepo {
    inner: Rc<RepoInner>,
}

struct RepoInner {
    blob: RefCell<Option<String>>,
    fail_saves: Cell<bool>,
    saves: Cell<usize>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RepoInner {
                blob: RefCell::new(None),
                fail_saves: Cell::new(false),
                saves: Cell::new(0),
            }),
        }
    }

    /// 保存済みblobを直接差し込む（壊れたデータのテスト用）。
    pub fn with_raw(raw: &str) -> Self {
        let repo = Self::new();
        *repo.inner.blob.borrow_mut() = Some(raw.to_string());
        repo
    }

    /// 以降のsaveを失敗させるかどうか。
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.fail_saves.set(fail);
    }

    /// 現在永続化されているblob。
    pub fn raw(&self) -> Option<String> {
        self.inner.blob.borrow().clone()
    }

    /// 成功したsaveの回数。
    pub fn save_count(&self) -> usize {
        self.inner.saves.get()
    }
}

impl FavoritesRepository for InMemoryRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Option<Favorites>, Self::Error> {
        match &*self.inner.blob.borrow() {
            Some(json) => serde_json::from_str(json).map(Some).map_err(|_| InMemoryError),
            None => Ok(None),
        }
    }

    fn save(&self, favorites: &Favorites) -> Result<(), Self::Error> {
        if self.inner.fail_saves.get() {
            return Err(InMemoryError);
        }
        let json = serde_json::to_string(favorites).map_err(|_| InMemoryError)?;
        *self.inner.blob.borrow_mut() = Some(json);
        self.inner.saves.set(self.inner.saves.get() + 1);
        Ok(())
    }
}

// =============================================================================
// FakeCatalog — ネットワーク不要のカタログスタブ
// =============================================================================

/// キューした応答を順に返すカタログ。受け取ったクエリも記録する。
pub struct FakeCatalog {
    responses: Mutex<VecDeque<Result<SearchPage, CatalogError>>>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn push_page(&self, books: Vec<Book>, total: u64) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(SearchPage { books, total, page: 1 }));
    }

    pub fn push_error(&self, error: CatalogError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// これまでに受け取った検索クエリ。
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, CatalogError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SearchPage {
                books: Vec::new(),
                total: 0,
                page: 1,
            })
        })
    }
}

// =============================================================================
// Book fixtures
// =============================================================================

pub fn book(key: &str, title: &str, author: &str) -> Book {
    Book::new(BookKey::new(key).unwrap(), title, author, None, None)
}

pub fn dune() -> Book {
    Book::new(
        BookKey::new("/works/OL893415W").unwrap(),
        "Dune",
        "Frank Herbert",
        Some(1965),
        Some("https://covers.openlibrary.org/b/id/44444-L.jpg".to_string()),
    )
}

pub fn foundation() -> Book {
    Book::new(
        BookKey::new("/works/OL46125W").unwrap(),
        "Foundation",
        "Isaac Asimov",
        Some(1951),
        None,
    )
}

pub fn hobbit() -> Book {
    Book::new(
        BookKey::new("/works/OL262758W").unwrap(),
        "The Hobbit",
        "J.R.R. Tolkien",
        Some(1937),
        Some("https://covers.openlibrary.org/b/id/6979861-L.jpg".to_string()),
    )
}

pub fn sample_shelf() -> Vec<Book> {
    vec![dune(), foundation(), hobbit()]
}

/// 指定の本が入ったストアを作る。
pub fn store_with(books: Vec<Book>) -> FavoritesStore<InMemoryRepo> {
    let mut store = FavoritesStore::open(InMemoryRepo::new());
    for book in books {
        store.add(book);
    }
    store
}
