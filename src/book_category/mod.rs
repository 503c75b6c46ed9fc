//! Tags linking books to categories, each with its own metadata.

mod db;
mod domain;

pub(crate) use db::{
    create_book_category_table, delete_book_category, delete_tags_for_category,
    get_book_category, get_books_in_subtree, get_categories_for_book, get_category_book_count,
    get_tag_entries_for_book, insert_book_category, primary_tag_exists, tag_exists,
    update_book_category,
};
pub use domain::{BookCategory, BookCategoryEntry, BookCategoryId, RelevanceScore, TagMetadata};
