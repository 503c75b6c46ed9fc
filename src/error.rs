//! Defines the crate level error type and the mapping from SQLite errors.

use crate::{author::AuthorId, book::BookId, category::CategoryId, publisher::PublisherId};

/// The errors that may occur when reading or modifying the catalog.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The category ID does not refer to a category in the database.
    #[error("category {0} could not be found")]
    CategoryNotFound(CategoryId),

    /// The book ID does not refer to a book in the database.
    #[error("book {0} could not be found")]
    BookNotFound(BookId),

    /// The publisher ID does not refer to a publisher in the database.
    #[error("publisher {0} could not be found")]
    PublisherNotFound(PublisherId),

    /// The author ID does not refer to an author in the database.
    #[error("author {0} could not be found")]
    AuthorNotFound(AuthorId),

    /// The author is not credited on the book.
    #[error("author {author_id} is not credited on book {book_id}")]
    BookAuthorNotFound {
        /// The book side of the missing credit.
        book_id: BookId,
        /// The author side of the missing credit.
        author_id: AuthorId,
    },

    /// The author is already credited on the book.
    #[error("author {author_id} is already credited on book {book_id}")]
    DuplicateBookAuthor {
        /// The book side of the existing credit.
        book_id: BookId,
        /// The author side of the existing credit.
        author_id: AuthorId,
    },

    /// The book is not tagged with the category.
    #[error("book {book_id} is not tagged with category {category_id}")]
    TagNotFound {
        /// The book side of the missing tag.
        book_id: BookId,
        /// The category side of the missing tag.
        category_id: CategoryId,
    },

    /// Placing `category_id` under `parent_id` would make the category its own ancestor.
    #[error("placing category {category_id} under {parent_id} would create a cycle")]
    Cycle {
        /// The category being created or moved.
        category_id: CategoryId,
        /// The parent that was rejected.
        parent_id: CategoryId,
    },

    /// The category tree would become deeper than the configured limit.
    #[error("the category tree would reach depth {depth}, the maximum is {max_depth}")]
    MaxDepthExceeded {
        /// The depth the operation would have produced.
        depth: usize,
        /// The configured maximum depth.
        max_depth: usize,
    },

    /// The book is already tagged with the category.
    #[error("book {book_id} is already tagged with category {category_id}")]
    DuplicateTag {
        /// The book side of the existing tag.
        book_id: BookId,
        /// The category side of the existing tag.
        category_id: CategoryId,
    },

    /// The book already has a primary category.
    #[error("book {0} already has a primary category")]
    PrimaryCategoryExists(BookId),

    /// A category with active subcategories cannot be deactivated.
    #[error("category {0} has active subcategories and cannot be deactivated")]
    ActiveSubcategories(CategoryId),

    /// The category name is empty, too short/long or contains disallowed characters.
    #[error("invalid category name \"{0}\": {1}")]
    InvalidCategoryName(String, &'static str),

    /// The slug is empty, too long or contains characters that are not URL safe.
    #[error("invalid slug \"{0}\"")]
    InvalidSlug(String),

    /// The slug already belongs to another category.
    #[error("the slug \"{0}\" already exists in the database")]
    DuplicateSlug(String),

    /// The display order must be between 0 and 1000.
    #[error("display order {0} is outside the range 0-1000")]
    InvalidDisplayOrder(u32),

    /// The relevance score must be between 0 and 10.
    #[error("relevance score {0} is outside the range 0-10")]
    InvalidRelevanceScore(f64),

    /// An ISBN must be exactly 13 digits.
    #[error("invalid ISBN \"{0}\", expected 13 digits")]
    InvalidIsbn(String),

    /// The ISBN already belongs to another book.
    #[error("the ISBN {0} already exists in the database")]
    DuplicateIsbn(String),

    /// A book with the same title and author already exists.
    #[error("the book \"{title}\" by {author} already exists in the database")]
    DuplicateBook {
        /// The duplicated title.
        title: String,
        /// The duplicated author.
        author: String,
    },

    /// A book field failed validation, e.g. a negative price.
    #[error("invalid book: {0}")]
    InvalidBook(&'static str),

    /// A required text field was empty.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The storage engine rejected a write because of a constraint.
    ///
    /// The validation layer should catch these first, so seeing this error
    /// usually means the database was modified outside of this crate.
    #[error("a database constraint was violated: {0}")]
    ConstraintViolation(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl Error {
    /// Whether the error means some referenced record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound
                | Error::CategoryNotFound(_)
                | Error::BookNotFound(_)
                | Error::PublisherNotFound(_)
                | Error::AuthorNotFound(_)
                | Error::BookAuthorNotFound { .. }
                | Error::TagNotFound { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(desc))
                if sql_error.extended_code == 787 =>
            {
                Error::ConstraintViolation(desc)
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(desc))
                if sql_error.extended_code == 2067 =>
            {
                Error::ConstraintViolation(desc)
            }
            // Code 275 occurs when a CHECK constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(desc))
                if sql_error.extended_code == 275 =>
            {
                Error::ConstraintViolation(desc)
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::Error;

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch(
                "PRAGMA foreign_keys = ON;
                CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT UNIQUE);
                CREATE TABLE child (
                    id INTEGER PRIMARY KEY,
                    score INTEGER CHECK (score >= 0),
                    parent_id INTEGER REFERENCES parent(id)
                );",
            )
            .unwrap();
        connection
    }

    #[test]
    fn unique_failure_maps_to_constraint_violation() {
        let connection = get_test_connection();
        connection
            .execute("INSERT INTO parent (name) VALUES ('a')", ())
            .unwrap();

        let error: Error = connection
            .execute("INSERT INTO parent (name) VALUES ('a')", ())
            .unwrap_err()
            .into();

        assert!(matches!(error, Error::ConstraintViolation(_)));
    }

    #[test]
    fn foreign_key_failure_maps_to_constraint_violation() {
        let connection = get_test_connection();

        let error: Error = connection
            .execute("INSERT INTO child (score, parent_id) VALUES (1, 42)", ())
            .unwrap_err()
            .into();

        assert!(matches!(error, Error::ConstraintViolation(_)));
    }

    #[test]
    fn check_failure_maps_to_constraint_violation() {
        let connection = get_test_connection();

        let error: Error = connection
            .execute("INSERT INTO child (score) VALUES (-1)", ())
            .unwrap_err()
            .into();

        assert!(matches!(error, Error::ConstraintViolation(_)));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
        assert!(error.is_not_found());
    }

    #[test]
    fn is_not_found_covers_missing_records_only() {
        assert!(Error::AuthorNotFound(1).is_not_found());
        assert!(
            Error::BookAuthorNotFound {
                book_id: 1,
                author_id: 2
            }
            .is_not_found()
        );
        assert!(!Error::DuplicateSlug("fiction".to_owned()).is_not_found());
        assert!(!Error::DatabaseLockError.is_not_found());
    }
}
