use crate::domain::catalog::SearchQuery;
use crate::domain::model::book::Book;
use crate::domain::repository::FavoritesRepository;

use super::store::FavoritesStore;

/// 検索語なしのときに表示する既定セットのクエリ。
const DEFAULT_BROWSE_QUERY: &str = "fantasy";

/// Homeの1ページあたりの表示件数。
pub const HOME_RESULT_LIMIT: u32 = 24;

/// 検索の発行順チケット。最後に発行されたものだけが結果を反映できる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Home画面: 検索結果リストの表示状態。
#[derive(Debug)]
pub struct HomePage {
    results: Vec<Book>,
    header: String,
    issued: u64,
}

impl Default for HomePage {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            header: "Home".to_string(),
            issued: 0,
        }
    }
}

impl HomePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力が空のときのフォールバック先になる既定クエリ。
    pub fn browse_query() -> SearchQuery {
        SearchQuery {
            query: Some(DEFAULT_BROWSE_QUERY.to_string()),
            limit: Some(HOME_RESULT_LIMIT),
            ..SearchQuery::default()
        }
    }

    /// 検索の開始を記録し、結果反映用のチケットを発行する。
    pub fn begin_search(&mut self) -> SearchTicket {
        self.issued += 1;
        SearchTicket(self.issued)
    }

    /// 検索結果を反映する。より新しい検索が既に始まっていたら
    /// 何も変えずfalseを返す（遅れて届いた結果は捨てる）。
    pub fn apply(&mut self, ticket: SearchTicket, header: String, books: Vec<Book>) -> bool {
        if ticket.0 < self.issued {
            return false;
        }
        self.header = header;
        self.results = books;
        true
    }

    /// 現在表示中の結果リスト。
    pub fn results(&self) -> &[Book] {
        &self.results
    }

    /// 現在表示中のリストの見出し。
    pub fn header(&self) -> &str {
        &self.header
    }
}

/// Favorites画面: フィルタ入力の状態と表示リストの導出。
#[derive(Debug, Default)]
pub struct FavoritesPage {
    filter: Option<String>,
}

/// Favorites画面の表示内容。リストが空のときはnoticeに理由が入る。
#[derive(Debug)]
pub struct FavoritesView {
    pub books: Vec<Book>,
    pub notice: Option<String>,
}

impl FavoritesPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// フィルタ入力を正規化して保持する。空白のみはフィルタなし扱い。
    pub fn set_filter(&mut self, term: Option<String>) {
        self.filter = term
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// ストアの現在の内容から表示リストを導出する。
    pub fn view<R: FavoritesRepository>(&self, store: &FavoritesStore<R>) -> FavoritesView {
        if store.is_empty() {
            return FavoritesView {
                books: Vec::new(),
                notice: Some("No favorites yet. Add some from Home.".to_string()),
            };
        }

        let books: Vec<Book> = match self.filter() {
            Some(term) => store.filter(term).into_iter().cloned().collect(),
            None => store.all().to_vec(),
        };

        let notice = if books.is_empty() {
            self.filter().map(|term| format!("No favorites match \"{term}\"."))
        } else {
            None
        };

        FavoritesView { books, notice }
    }
}

/// 最後に描画したページ。トグル後の再描画対象になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePage {
    #[default]
    Home,
    Favorites,
}

/// サーバが1セッションで保持するページ状態一式。
#[derive(Debug, Default)]
pub struct PageState {
    pub home: HomePage,
    pub favorites: FavoritesPage,
    pub active: ActivePage,
}
