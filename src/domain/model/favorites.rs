use serde::{Deserialize, Deserializer, Serialize};

use super::book::Book;
use super::key::BookKey;

/// お気に入りコレクション。`key` で一意、挿入順を保持する。
/// JSON上は素のBook配列として保存される。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Favorites {
    books: Vec<Book>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重複keyは最初の1件だけ残して取り込む。
    pub fn from_books(books: Vec<Book>) -> Self {
        let mut favorites = Self::new();
        for book in books {
            favorites.add(book);
        }
        favorites
    }

    pub fn as_slice(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn contains(&self, key: &BookKey) -> bool {
        self.books.iter().any(|b| b.key() == key)
    }

    pub fn get(&self, key: &BookKey) -> Option<&Book> {
        self.books.iter().find(|b| b.key() == key)
    }

    /// 末尾に追加。既存keyならno-opでfalseを返す。
    pub fn add(&mut self, book: Book) -> bool {
        if self.contains(book.key()) {
            return false;
        }
        self.books.push(book);
        true
    }

    /// keyに一致する1冊を取り除いて返す。無ければNone。
    pub fn remove(&mut self, key: &BookKey) -> Option<Book> {
        let pos = self.books.iter().position(|b| b.key() == key)?;
        Some(self.books.remove(pos))
    }

    /// 登録済みなら外し、未登録なら追加する。新しいお気に入り状態を返す。
    pub fn toggle(&mut self, book: Book) -> bool {
        if self.remove(book.key()).is_some() {
            false
        } else {
            self.books.push(book);
            true
        }
    }

    /// タイトルか著者にtermを含むものだけ返す（大文字小文字を無視、順序維持）。
    /// 空白のみのtermは全件。
    pub fn filter(&self, term: &str) -> Vec<&Book> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.books.iter().collect();
        }
        self.books.iter().filter(|b| matches(b, &needle)).collect()
    }
}

fn matches(book: &Book, needle: &str) -> bool {
    book.title().to_lowercase().contains(needle) || book.author().to_lowercase().contains(needle)
}

// 読み込んだ配列が重複keyを含んでいても不変条件を回復できるよう、
// from_books経由でデシリアライズする。
impl<'de> Deserialize<'de> for Favorites {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let books = Vec::<Book>::deserialize(deserializer)?;
        Ok(Self::from_books(books))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(key: &str, title: &str, author: &str) -> Book {
        Book::new(BookKey::new(key).unwrap(), title, author, None, None)
    }

    fn sample() -> Favorites {
        Favorites::from_books(vec![
            book("/works/OL1W", "Dune", "Frank Herbert"),
            book("/works/OL2W", "Foundation", "Isaac Asimov"),
            book("/works/OL3W", "The Hobbit", "J.R.R. Tolkien"),
        ])
    }

    #[test]
    fn test_add_ignores_duplicate_key() {
        let mut favorites = Favorites::new();
        assert!(favorites.add(book("/works/OL1W", "Dune", "Frank Herbert")));
        assert!(!favorites.add(book("/works/OL1W", "Dune (reissue)", "F. Herbert")));

        assert_eq!(favorites.len(), 1);
        // 最初のレコードが残る
        assert_eq!(favorites.as_slice()[0].title(), "Dune");
    }

    #[test]
    fn test_remove_returns_removed_book() {
        let mut favorites = sample();
        let removed = favorites.remove(&BookKey::new("/works/OL2W").unwrap());
        assert_eq!(removed.unwrap().title(), "Foundation");
        assert_eq!(favorites.len(), 2);

        let absent = favorites.remove(&BookKey::new("/works/OL9W").unwrap());
        assert!(absent.is_none());
        assert_eq!(favorites.len(), 2);
    }

    #[test]
    fn test_toggle_flips_membership() {
        let mut favorites = Favorites::new();
        let dune = book("/works/OL1W", "Dune", "Frank Herbert");

        assert!(favorites.toggle(dune.clone()));
        assert!(favorites.contains(dune.key()));
        assert!(!favorites.toggle(dune.clone()));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let favorites = sample();
        let titles: Vec<&str> = favorites.as_slice().iter().map(|b| b.title()).collect();
        assert_eq!(titles, vec!["Dune", "Foundation", "The Hobbit"]);
    }

    #[test]
    fn test_filter_matches_title_and_author_case_insensitive() {
        let favorites = sample();

        let by_title = favorites.filter("DUNE");
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title(), "Dune");

        for fragment in ["dun", "DUN"] {
            let hits = favorites.filter(fragment);
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].title(), "Dune");
        }

        let by_author = favorites.filter("asimov");
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].title(), "Foundation");

        assert!(favorites.filter("zzz").is_empty());
    }

    #[test]
    fn test_filter_blank_term_returns_all_in_order() {
        let favorites = sample();
        assert_eq!(favorites.filter("").len(), 3);
        assert_eq!(favorites.filter("   ").len(), 3);
        let titles: Vec<&str> = favorites.filter("").iter().map(|b| b.title()).collect();
        assert_eq!(titles, vec!["Dune", "Foundation", "The Hobbit"]);
    }

    #[test]
    fn test_deserialize_drops_duplicate_keys() {
        let json = r#"[
            {"key": "/works/OL1W", "title": "Dune", "author": "Frank Herbert"},
            {"key": "/works/OL2W", "title": "Foundation", "author": "Isaac Asimov"},
            {"key": "/works/OL1W", "title": "Dune (dup)", "author": "Frank Herbert"}
        ]"#;
        let favorites: Favorites = serde_json::from_str(json).unwrap();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites.as_slice()[0].title(), "Dune");
    }

    #[test]
    fn test_serialize_as_plain_array() {
        let favorites = Favorites::from_books(vec![book("/works/OL1W", "Dune", "Frank Herbert")]);
        let json = serde_json::to_string(&favorites).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"key\":\"/works/OL1W\""));
    }
}
