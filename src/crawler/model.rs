//! Harvested data model
//!
//! A `Record` is the flat union of a listing row and the detail page it
//! links to. Field names of the two halves never collide, so the serialized
//! record carries every field of both.

use serde::{Deserialize, Serialize};

/// A top-level subject grouping with its own listing and collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, also the destination collection name
    pub name: String,

    /// Relative path of page 1 of the listing
    pub listing_path: String,

    /// Number of listing pages (at least 1)
    pub page_count: u32,
}

impl Category {
    /// Relative path of one listing page
    pub fn page_path(&self, page_suffix: &str) -> String {
        format!("{}{}", self.listing_path, page_suffix)
    }
}

/// One summary row of a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRow {
    pub date: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub satisfactory: Option<f64>,
    pub rating: Option<f64>,
    pub views: u64,
    pub title: String,
    pub detail_path: String,
}

/// Fields of one article detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: i64,
    pub question_author: String,
    pub question_date: String,
    pub answer_author: String,
    pub answer_date: String,
    pub question_body: String,
    pub answer_body: String,
}

/// Persisted unit: a listing row merged with its detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub listing: ListingRow,

    #[serde(flatten)]
    pub detail: ArticleDetail,
}

impl Record {
    pub fn merge(listing: ListingRow, detail: ArticleDetail) -> Self {
        Self { listing, detail }
    }
}
