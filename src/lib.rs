//! A book catalog that files books under a forest of nested categories.
//!
//! Categories form trees of bounded depth. Books are tagged with any number of
//! categories, each tag carrying a relevance score and an optional primary
//! flag. All reads and writes go through a [Catalog], which serializes them
//! behind one lock so that concurrent moves can never create a cycle.

#![warn(missing_docs)]

mod author;
mod book;
mod book_category;
mod catalog;
mod category;
mod config;
mod db;
mod error;
mod publisher;
mod validation;

pub use author::{Author, AuthorId, NewAuthor};
pub use book::{Book, BookId, Isbn, Language, NewBook};
pub use book_category::{BookCategory, BookCategoryEntry, BookCategoryId, RelevanceScore, TagMetadata};
pub use catalog::Catalog;
pub use category::{
    Category, CategoryId, CategoryName, CategoryNode, CategoryUpdate, DeletePolicy, DeleteReport,
    DisplayOrder, NewCategory, Slug,
};
pub use config::{CatalogConfig, DEFAULT_MAX_DEPTH, MAX_ALLOWED_DEPTH};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use publisher::{NewPublisher, Publisher, PublisherId};
