use super::model::favorites::Favorites;

/// 永続化の抽象。Infra層が実装する。
pub trait FavoritesRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Option<Favorites>, Self::Error>;
    fn save(&self, favorites: &Favorites) -> Result<(), Self::Error>;
}
