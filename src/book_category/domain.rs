//! Core types for the tags linking books to categories.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    book::BookId,
    category::{CategoryId, CategoryName},
};

/// Database identifier for a book-category tag.
pub type BookCategoryId = i64;

const MAX_RELEVANCE: f64 = 10.0;
const DEFAULT_RELEVANCE: f64 = 5.0;

/// How relevant a category is to a book, between 0 and 10.
///
/// Tags on a book are listed from most to least relevant.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RelevanceScore(f64);

impl RelevanceScore {
    /// Create a relevance score.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidRelevanceScore] if `score` is not between 0 and 10.
    pub fn new(score: f64) -> Result<Self, Error> {
        if (0.0..=MAX_RELEVANCE).contains(&score) {
            Ok(Self(score))
        } else {
            Err(Error::InvalidRelevanceScore(score))
        }
    }

    /// Create a relevance score without validation.
    pub fn new_unchecked(score: f64) -> Self {
        Self(score)
    }

    /// The raw score.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for RelevanceScore {
    fn default() -> Self {
        Self(DEFAULT_RELEVANCE)
    }
}

/// The data a tag carries that belongs to neither the book nor the category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TagMetadata {
    /// How relevant the category is to the book.
    pub relevance_score: RelevanceScore,
    /// Whether this is the book's primary category. A book has at most one.
    pub is_primary: bool,
}

impl TagMetadata {
    /// Metadata for a primary tag with the default relevance.
    pub fn primary() -> Self {
        Self {
            is_primary: true,
            ..Default::default()
        }
    }

    /// Metadata for a secondary tag with the given relevance.
    pub fn with_relevance(relevance_score: RelevanceScore) -> Self {
        Self {
            relevance_score,
            is_primary: false,
        }
    }
}

/// A tag linking one book to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookCategory {
    /// The ID of the tag. IDs increase in creation order.
    pub id: BookCategoryId,
    /// The tagged book.
    pub book_id: BookId,
    /// The category the book is tagged with.
    pub category_id: CategoryId,
    /// How relevant the category is to the book.
    pub relevance_score: RelevanceScore,
    /// Whether this is the book's primary category.
    pub is_primary: bool,
    /// When the tag was created.
    #[serde(with = "time::serde::rfc3339")]
    pub added_date: OffsetDateTime,
}

/// A category as listed on a book, with the tag's metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookCategoryEntry {
    /// The category's ID.
    pub category_id: CategoryId,
    /// The category's name.
    pub name: CategoryName,
    /// Whether this is the book's primary category.
    pub is_primary: bool,
    /// How relevant the category is to the book.
    pub relevance_score: RelevanceScore,
}
