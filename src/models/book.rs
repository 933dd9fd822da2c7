//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub type BookId = Uuid;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub description: String,
    /// Path of the stored cover image, or a remote URL
    pub image_url: String,
    /// Copies currently available to borrow
    pub count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a book
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub count: i32,
}

/// Text fields submitted with a create or update form
#[derive(Debug, Clone, Default, Validate)]
pub struct BookInput {
    #[validate(length(min = 5))]
    pub title: String,
    #[validate(length(min = 5))]
    pub description: String,
    #[validate(required, range(min = 0))]
    pub count: Option<i32>,
}

impl BookInput {
    /// Build from raw form values, trimming the text fields
    pub fn new(title: &str, description: &str, count: impl Into<Option<i32>>) -> Self {
        Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            count: count.into(),
        }
    }
}

/// Pagination parameters of the book listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Books per page (default: 20)
    pub per_page: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Rows to skip; saturates so far-out pages come back empty
    pub fn offset(&self) -> i64 {
        self.page()
            .saturating_sub(1)
            .saturating_mul(self.per_page())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_trimmed_before_validation() {
        let input = BookInput::new("   abc   ", "  a long description ", 3);
        assert_eq!(input.title, "abc");
        assert_eq!(input.description, "a long description");
        assert!(input.validate().is_err());

        assert!(BookInput::new("Dune!", "Sand and spice", 0).validate().is_ok());
    }

    #[test]
    fn count_must_be_present_and_non_negative() {
        assert!(BookInput::new("Title", "Description", -1).validate().is_err());
        assert!(BookInput::new("Title", "Description", None).validate().is_err());
    }

    #[test]
    fn list_query_defaults() {
        let query = ListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            page: Some(2),
            per_page: Some(10),
        };
        assert_eq!(query.offset(), 10);
    }

    #[test]
    fn offset_saturates_for_huge_pages() {
        let query = ListQuery {
            page: Some(i64::MAX),
            per_page: Some(20),
        };
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn serializes_camel_case() {
        let book = Book {
            id: Uuid::new_v4(),
            title: "Title".into(),
            description: "Description".into(),
            image_url: "images/cover.png".into(),
            count: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["imageUrl"], "images/cover.png");
        assert_eq!(json["count"], 2);
        assert!(json.get("createdAt").is_some());
    }
}
