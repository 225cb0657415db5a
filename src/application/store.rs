use tracing::warn;

use crate::domain::model::book::Book;
use crate::domain::model::favorites::Favorites;
use crate::domain::model::key::BookKey;
use crate::domain::repository::FavoritesRepository;

use super::render::Card;

/// お気に入りストア。
/// 構築時に一度だけ永続層から読み込み、以後はメモリ上の内容が正。
/// 変更のたびにコレクション全体を書き戻す。書き込み失敗は吸収し、
/// 次の変更時の書き戻しが実質的な再試行になる。
pub struct FavoritesStore<R: FavoritesRepository> {
    repo: R,
    favorites: Favorites,
    revision: u64,
}

impl<R: FavoritesRepository> FavoritesStore<R> {
    /// ストアを開く。読めない・壊れているデータは空コレクションとして扱う。
    pub fn open(repo: R) -> Self {
        let favorites = match repo.load() {
            Ok(Some(favorites)) => favorites,
            Ok(None) => Favorites::new(),
            Err(e) => {
                warn!(error = %e, "failed to load favorites, starting empty");
                Favorites::new()
            }
        };
        Self {
            repo,
            favorites,
            revision: 0,
        }
    }

    /// 挿入順のままの全お気に入り。
    pub fn all(&self) -> &[Book] {
        self.favorites.as_slice()
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    pub fn is_favorite(&self, key: &BookKey) -> bool {
        self.favorites.contains(key)
    }

    pub fn get(&self, key: &BookKey) -> Option<&Book> {
        self.favorites.get(key)
    }

    /// 変更カウンタ。描画済みビューはこれを比べて再読込の要否を判断できる。
    /// 実際に内容が変わった操作でのみ増える。
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 追加。既存keyならno-opでfalseを返し、永続化もしない。
    pub fn add(&mut self, book: Book) -> bool {
        if !self.favorites.add(book) {
            return false;
        }
        self.committed();
        true
    }

    /// 削除。未登録keyならno-opでNone。
    pub fn remove(&mut self, key: &BookKey) -> Option<Book> {
        let removed = self.favorites.remove(key)?;
        self.committed();
        Some(removed)
    }

    /// トグル。新しいお気に入り状態を返す。
    pub fn toggle(&mut self, book: Book) -> bool {
        let now_favorite = self.favorites.toggle(book);
        self.committed();
        now_favorite
    }

    /// タイトル・著者の部分一致でお気に入りを絞り込む。
    pub fn filter(&self, term: &str) -> Vec<&Book> {
        self.favorites.filter(term)
    }

    /// 描画済みカードのお気に入りマーカーを現在の内容に合わせる。
    /// ストア自身は変更しない。
    pub fn hydrate(&self, cards: &mut [Card]) {
        for card in cards {
            card.favorited = self.is_favorite(card.book.key());
        }
    }

    fn committed(&mut self) {
        self.revision += 1;
        if let Err(e) = self.repo.save(&self.favorites) {
            warn!(error = %e, "failed to persist favorites, keeping in-memory state");
        }
    }
}
