use serde::{Deserialize, Serialize};

use super::key::BookKey;

/// 検索APIのドキュメントを正規化した1冊分のレコード。
/// `key` が同じなら同じ本。他のフィールドは表示用で、同一性には関与しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    key: BookKey,
    title: String,
    author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_publish_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover_url: Option<String>,
}

impl Book {
    pub fn new(
        key: BookKey,
        title: impl Into<String>,
        author: impl Into<String>,
        first_publish_year: Option<i32>,
        cover_url: Option<String>,
    ) -> Self {
        Self {
            key,
            title: title.into(),
            author: author.into(),
            first_publish_year,
            cover_url,
        }
    }

    pub fn key(&self) -> &BookKey {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn first_publish_year(&self) -> Option<i32> {
        self.first_publish_year
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.cover_url.as_deref()
    }
}
