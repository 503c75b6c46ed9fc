//! Books, the things being categorised.

mod db;
mod domain;

pub(crate) use db::{
    book_exists, create_book_table, delete_book, get_all_books, get_book, insert_book,
    isbn_exists, map_book_row, title_and_author_exist,
};
pub use domain::{Book, BookId, Isbn, Language, NewBook};
