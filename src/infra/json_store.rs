use std::path::PathBuf;

use crate::domain::model::favorites::Favorites;
use crate::domain::repository::FavoritesRepository;

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSONファイルによるFavoritesRepository実装。
/// コレクション全体を1ファイルに丸ごと保存する。部分更新はしない。
pub struct JsonFavoritesRepository {
    path: PathBuf,
}

impl JsonFavoritesRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FavoritesRepository for JsonFavoritesRepository {
    type Error = JsonStoreError;

    fn load(&self) -> Result<Option<Favorites>, Self::Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let favorites: Favorites = serde_json::from_str(&content)?;
        Ok(Some(favorites))
    }

    fn save(&self, favorites: &Favorites) -> Result<(), Self::Error> {
        // 保存先が相対パスのベースネームだけのとき、parentは空文字列になる
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(favorites)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::book::Book;
    use crate::domain::model::key::BookKey;

    fn book(key: &str, title: &str) -> Book {
        Book::new(BookKey::new(key).unwrap(), title, "Author", None, None)
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");

        let repo = JsonFavoritesRepository::new(&path);

        // 初回loadはNone
        assert!(repo.load().unwrap().is_none());

        let favorites = Favorites::from_books(vec![
            book("/works/OL1W", "Dune"),
            book("/works/OL2W", "Foundation"),
        ]);
        repo.save(&favorites).unwrap();

        let loaded = repo.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.as_slice()[0].title(), "Dune");
        assert_eq!(loaded.as_slice()[1].title(), "Foundation");
    }

    #[test]
    fn load_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "not json{{{").unwrap();

        let repo = JsonFavoritesRepository::new(&path);
        assert!(repo.load().is_err());
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("favorites.json");

        let repo = JsonFavoritesRepository::new(&path);
        repo.save(&Favorites::new()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn saved_file_is_plain_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");

        let repo = JsonFavoritesRepository::new(&path);
        repo.save(&Favorites::from_books(vec![book("/works/OL1W", "Dune")]))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["key"], "/works/OL1W");
    }
}
