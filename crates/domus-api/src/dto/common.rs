//! Envelope and query types shared by the back-office endpoints

use domus_core::traits::{PaginatedResponse, PaginationMeta};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PER_PAGE: i64 = 50;

/// Body of every successful response: `{"data": ..., "message"?: ...}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Attach a note for the operator, e.g. after a settings change
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// `?page=&per_page=` of the contract listing
///
/// Both values may arrive as numbers or as numeric text.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaginationParams {
    #[serde(default = "default_page", deserialize_with = "lenient_i64")]
    #[validate(range(min = 1))]
    pub page: i64,

    #[serde(default = "default_per_page", deserialize_with = "lenient_i64")]
    #[validate(range(min = 1, max = 500))]
    pub per_page: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationParams {
    /// Wrap one page of items with its position in the full listing
    pub fn paginate<T>(&self, data: Vec<T>, total: i64) -> PaginatedResponse<T> {
        PaginatedResponse {
            data,
            pagination: PaginationMeta::new(total, self.page, self.per_page),
        }
    }
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {:?}", text))),
    }
}

/// `?force_refresh=` flag shared by rate lookups
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RefreshParams {
    #[serde(default)]
    pub force_refresh: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers_from_json_and_text() {
        let params: PaginationParams =
            serde_json::from_str(r#"{"page": "2", "per_page": 10}"#).unwrap();
        assert_eq!((params.page, params.per_page), (2, 10));

        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!((params.page, params.per_page), (1, 50));

        assert!(serde_json::from_str::<PaginationParams>(r#"{"page": "two"}"#).is_err());
    }

    #[test]
    fn test_per_page_is_bounded() {
        let params = PaginationParams {
            page: 1,
            per_page: 501,
        };
        assert!(params.validate().is_err());
        assert!(PaginationParams::default().validate().is_ok());
    }

    #[test]
    fn test_paginate_counts_pages() {
        let params = PaginationParams {
            page: 3,
            per_page: 20,
        };
        let page = params.paginate(vec!["C-41", "C-42"], 42);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.page, 3);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn test_message_is_omitted_when_absent() {
        let body = serde_json::to_value(ApiResponse::success(7)).unwrap();
        assert_eq!(body, serde_json::json!({ "data": 7 }));

        let body = serde_json::to_value(ApiResponse::with_message(7, "Sequence settings updated"))
            .unwrap();
        assert_eq!(body["message"], "Sequence settings updated");
    }
}
