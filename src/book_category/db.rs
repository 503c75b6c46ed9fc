//! Book-Category Junction Table Operations
//!
//! This module handles the many-to-many relationship between books and
//! categories. Each row is a tag carrying its own metadata. Uniqueness and
//! primary-category rules are checked by the validation layer before these
//! functions run; the table constraints are a backstop.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    book::{Book, BookId, map_book_row},
    book_category::{BookCategory, BookCategoryEntry, RelevanceScore, TagMetadata},
    category::{Category, CategoryId, CategoryName, level_limit, map_category_row},
};

/// Create the book_category junction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_book_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS book_category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            relevance_score REAL NOT NULL DEFAULT 5
                CHECK (relevance_score >= 0 AND relevance_score <= 10),
            is_primary INTEGER NOT NULL DEFAULT 0,
            added_date TEXT NOT NULL,
            FOREIGN KEY(book_id) REFERENCES book(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(book_id, category_id)
        );

        CREATE INDEX IF NOT EXISTS idx_book_category_book_id ON book_category(book_id);
        CREATE INDEX IF NOT EXISTS idx_book_category_category_id ON book_category(category_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_book_category_one_primary
            ON book_category(book_id) WHERE is_primary = 1;",
    )?;

    Ok(())
}

/// Tag a book with a category.
pub fn insert_book_category(
    book_id: BookId,
    category_id: CategoryId,
    metadata: &TagMetadata,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<BookCategory, Error> {
    connection.execute(
        "INSERT INTO book_category (book_id, category_id, relevance_score, is_primary, added_date)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            book_id,
            category_id,
            metadata.relevance_score.get(),
            metadata.is_primary,
            now,
        ),
    )?;

    get_book_category(book_id, category_id, connection)
}

/// Retrieve the tag linking `book_id` and `category_id`.
///
/// # Errors
/// Returns [Error::TagNotFound] if the book is not tagged with the category.
pub fn get_book_category(
    book_id: BookId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<BookCategory, Error> {
    connection
        .prepare(
            "SELECT id, book_id, category_id, relevance_score, is_primary, added_date
            FROM book_category WHERE book_id = ?1 AND category_id = ?2",
        )?
        .query_row((book_id, category_id), map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TagNotFound {
                book_id,
                category_id,
            },
            error => error.into(),
        })
}

/// Check whether the book is tagged with the category.
pub fn tag_exists(
    book_id: BookId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM book_category WHERE book_id = ?1 AND category_id = ?2)",
        (book_id, category_id),
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Check whether the book has a primary tag on a category other than `excluding`.
pub fn primary_tag_exists(
    book_id: BookId,
    excluding: Option<CategoryId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM book_category
            WHERE book_id = ?1 AND is_primary = 1 AND category_id IS NOT ?2
        )",
        (book_id, excluding),
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Replace the metadata on an existing tag.
///
/// # Errors
/// Returns [Error::TagNotFound] if the book is not tagged with the category.
pub fn update_book_category(
    book_id: BookId,
    category_id: CategoryId,
    metadata: &TagMetadata,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE book_category SET relevance_score = ?1, is_primary = ?2
        WHERE book_id = ?3 AND category_id = ?4",
        (
            metadata.relevance_score.get(),
            metadata.is_primary,
            book_id,
            category_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::TagNotFound {
            book_id,
            category_id,
        });
    }

    Ok(())
}

/// Remove a tag from a book.
///
/// # Errors
/// Returns [Error::TagNotFound] if the book is not tagged with the category.
pub fn delete_book_category(
    book_id: BookId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM book_category WHERE book_id = ?1 AND category_id = ?2",
        (book_id, category_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::TagNotFound {
            book_id,
            category_id,
        });
    }

    Ok(())
}

/// Remove every tag on a category, returning how many were removed.
pub fn delete_tags_for_category(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM book_category WHERE category_id = ?1",
        [category_id],
    )?;

    Ok(rows_affected)
}

/// Get the number of books tagged with a category.
pub fn get_category_book_count(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<i64, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM book_category WHERE category_id = ?1",
        [category_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Get the categories a book is tagged with.
///
/// The primary category comes first, then the rest by descending relevance.
/// Ties keep the order the tags were created in.
pub fn get_categories_for_book(
    book_id: BookId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT c.id, c.name, c.description, c.parent_id, c.slug, c.is_active,
                c.display_order, c.created_at, c.updated_at
            FROM category c
            INNER JOIN book_category bc ON c.id = bc.category_id
            WHERE bc.book_id = ?1
            ORDER BY bc.is_primary DESC, bc.relevance_score DESC, bc.id ASC",
        )?
        .query_map([book_id], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Get the categories a book is tagged with alongside each tag's metadata,
/// in the same order as [get_categories_for_book].
pub fn get_tag_entries_for_book(
    book_id: BookId,
    connection: &Connection,
) -> Result<Vec<BookCategoryEntry>, Error> {
    connection
        .prepare(
            "SELECT c.id, c.name, bc.is_primary, bc.relevance_score
            FROM category c
            INNER JOIN book_category bc ON c.id = bc.category_id
            WHERE bc.book_id = ?1
            ORDER BY bc.is_primary DESC, bc.relevance_score DESC, bc.id ASC",
        )?
        .query_map([book_id], |row| {
            let raw_name: String = row.get(1)?;

            Ok(BookCategoryEntry {
                category_id: row.get(0)?,
                name: CategoryName::new_unchecked(&raw_name),
                is_primary: row.get(2)?,
                relevance_score: RelevanceScore::new_unchecked(row.get(3)?),
            })
        })?
        .map(|maybe_entry| maybe_entry.map_err(|error| error.into()))
        .collect()
}

/// Get the books tagged with any category in the subtree rooted at
/// `category_id`, looking at most `max_levels` levels down.
///
/// Passing `max_levels = 1` only looks at direct tags. Each book appears
/// once, ordered by title.
pub fn get_books_in_subtree(
    category_id: CategoryId,
    max_levels: usize,
    connection: &Connection,
) -> Result<Vec<Book>, Error> {
    connection
        .prepare(
            "WITH RECURSIVE subtree(id, depth) AS (
                SELECT id, 1 FROM category WHERE id = ?1
                UNION ALL
                SELECT c.id, s.depth + 1
                FROM category c
                INNER JOIN subtree s ON c.parent_id = s.id
                WHERE s.depth < ?2
            )
            SELECT b.id, b.title, b.author, b.published_date, b.isbn, b.genre, b.summary,
                b.publisher_id, b.page_count, b.language, b.price, b.rating, b.is_bestseller
            FROM book b
            WHERE b.id IN (
                SELECT bc.book_id
                FROM book_category bc
                INNER JOIN subtree s ON bc.category_id = s.id
            )
            ORDER BY b.title ASC, b.id ASC",
        )?
        .query_map((category_id, level_limit(max_levels)), map_book_row)?
        .map(|maybe_book| maybe_book.map_err(|error| error.into()))
        .collect()
}

fn map_row(row: &Row) -> Result<BookCategory, rusqlite::Error> {
    Ok(BookCategory {
        id: row.get(0)?,
        book_id: row.get(1)?,
        category_id: row.get(2)?,
        relevance_score: RelevanceScore::new_unchecked(row.get(3)?),
        is_primary: row.get(4)?,
        added_date: row.get(5)?,
    })
}

#[cfg(test)]
mod book_category_query_tests {
    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        book::{Book, BookId, Isbn, insert_book},
        book_category::{RelevanceScore, TagMetadata},
        category::{Category, CategoryId, CategoryName, insert_category},
        db::initialize,
    };

    use super::{
        delete_book_category, get_book_category, get_books_in_subtree, get_categories_for_book,
        get_category_book_count, get_tag_entries_for_book, insert_book_category,
        primary_tag_exists, tag_exists, update_book_category,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn create_category(name: &str, parent_id: Option<CategoryId>, connection: &Connection) -> CategoryId {
        let mut new_category = Category::build(CategoryName::new_unchecked(name));
        new_category.parent_id = parent_id;

        insert_category(
            &new_category,
            &new_category.resolved_slug(),
            OffsetDateTime::now_utc(),
            connection,
        )
        .expect("Could not create test category")
        .id
    }

    fn create_book(title: &str, isbn: &str, connection: &Connection) -> BookId {
        let new_book = Book::build(title, "Anon", date!(2001 - 01 - 01), Isbn::new_unchecked(isbn))
            .genre("Misc");

        insert_book(&new_book, connection)
            .expect("Could not create test book")
            .id
    }

    fn tag(book_id: BookId, category_id: CategoryId, score: f64, connection: &Connection) {
        insert_book_category(
            book_id,
            category_id,
            &TagMetadata::with_relevance(RelevanceScore::new_unchecked(score)),
            OffsetDateTime::now_utc(),
            connection,
        )
        .expect("Could not tag test book");
    }

    #[test]
    fn insert_book_category_succeeds() {
        let connection = get_test_db_connection();
        let book_id = create_book("Dune", "9780441013593", &connection);
        let category_id = create_category("SciFi", None, &connection);

        let tag = insert_book_category(
            book_id,
            category_id,
            &TagMetadata::primary(),
            OffsetDateTime::now_utc(),
            &connection,
        )
        .unwrap();

        assert!(tag.id > 0);
        assert!(tag.is_primary);
        assert_eq!(tag.relevance_score.get(), 5.0);
        assert_eq!(tag_exists(book_id, category_id, &connection), Ok(true));
    }

    #[test]
    fn duplicate_tag_violates_unique_constraint() {
        let connection = get_test_db_connection();
        let book_id = create_book("Dune", "9780441013593", &connection);
        let category_id = create_category("SciFi", None, &connection);
        tag(book_id, category_id, 5.0, &connection);

        let result = insert_book_category(
            book_id,
            category_id,
            &TagMetadata::default(),
            OffsetDateTime::now_utc(),
            &connection,
        );

        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
    }

    #[test]
    fn second_primary_violates_partial_index() {
        let connection = get_test_db_connection();
        let book_id = create_book("Dune", "9780441013593", &connection);
        let scifi = create_category("SciFi", None, &connection);
        let classics = create_category("Classics", None, &connection);
        let now = OffsetDateTime::now_utc();
        insert_book_category(book_id, scifi, &TagMetadata::primary(), now, &connection).unwrap();

        let result =
            insert_book_category(book_id, classics, &TagMetadata::primary(), now, &connection);

        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
        assert_eq!(primary_tag_exists(book_id, None, &connection), Ok(true));
        assert_eq!(primary_tag_exists(book_id, Some(scifi), &connection), Ok(false));
    }

    #[test]
    fn categories_for_book_order_by_primary_then_relevance_then_creation() {
        let connection = get_test_db_connection();
        let book_id = create_book("Dune", "9780441013593", &connection);
        let low = create_category("Low", None, &connection);
        let tie_first = create_category("Tie First", None, &connection);
        let tie_second = create_category("Tie Second", None, &connection);
        let primary = create_category("Primary", None, &connection);
        tag(book_id, low, 1.0, &connection);
        tag(book_id, tie_first, 7.0, &connection);
        tag(book_id, tie_second, 7.0, &connection);
        insert_book_category(
            book_id,
            primary,
            &TagMetadata {
                relevance_score: RelevanceScore::new_unchecked(0.0),
                is_primary: true,
            },
            OffsetDateTime::now_utc(),
            &connection,
        )
        .unwrap();

        let ids: Vec<_> = get_categories_for_book(book_id, &connection)
            .unwrap()
            .into_iter()
            .map(|category| category.id)
            .collect();
        let entry_ids: Vec<_> = get_tag_entries_for_book(book_id, &connection)
            .unwrap()
            .into_iter()
            .map(|entry| entry.category_id)
            .collect();

        assert_eq!(ids, vec![primary, tie_first, tie_second, low]);
        assert_eq!(entry_ids, ids);
    }

    #[test]
    fn books_in_subtree_are_unique_and_respect_levels() {
        let connection = get_test_db_connection();
        let fiction = create_category("Fiction", None, &connection);
        let scifi = create_category("SciFi", Some(fiction), &connection);
        let dune = create_book("Dune", "9780441013593", &connection);
        let emma = create_book("Emma", "9780141439587", &connection);
        tag(dune, fiction, 5.0, &connection);
        tag(dune, scifi, 5.0, &connection);
        tag(emma, fiction, 5.0, &connection);
        let neuromancer = create_book("Neuromancer", "9780441569595", &connection);
        tag(neuromancer, scifi, 5.0, &connection);

        let direct: Vec<_> = get_books_in_subtree(fiction, 1, &connection)
            .unwrap()
            .into_iter()
            .map(|book| book.id)
            .collect();
        let all: Vec<_> = get_books_in_subtree(fiction, 32, &connection)
            .unwrap()
            .into_iter()
            .map(|book| book.id)
            .collect();

        assert_eq!(direct, vec![dune, emma]);
        assert_eq!(all, vec![dune, emma, neuromancer]);
    }

    #[test]
    fn update_and_delete_missing_tag_return_not_found() {
        let connection = get_test_db_connection();
        let expected = Err(Error::TagNotFound {
            book_id: 1,
            category_id: 2,
        });

        assert_eq!(
            update_book_category(1, 2, &TagMetadata::default(), &connection),
            expected
        );
        assert_eq!(delete_book_category(1, 2, &connection), expected);
        assert!(get_book_category(1, 2, &connection).is_err());
    }

    #[test]
    fn category_book_count_counts_direct_tags() {
        let connection = get_test_db_connection();
        let category_id = create_category("SciFi", None, &connection);
        let dune = create_book("Dune", "9780441013593", &connection);
        tag(dune, category_id, 5.0, &connection);

        assert_eq!(get_category_book_count(category_id, &connection), Ok(1));
    }
}
