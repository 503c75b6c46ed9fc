//! Database operations for books.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    book::{Book, BookId, Isbn, NewBook},
};

const SELECT_BOOK: &str = "SELECT id, title, author, published_date, isbn, genre, summary, \
    publisher_id, page_count, language, price, rating, is_bestseller FROM book";

/// Initialize the book table and indexes.
pub fn create_book_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS book (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            published_date TEXT NOT NULL,
            isbn TEXT NOT NULL UNIQUE CHECK (length(isbn) = 13),
            genre TEXT NOT NULL,
            summary TEXT,
            publisher_id INTEGER REFERENCES publisher(id) ON UPDATE CASCADE ON DELETE SET NULL,
            page_count INTEGER CHECK (page_count IS NULL OR page_count >= 1),
            language TEXT NOT NULL DEFAULT 'EN',
            price REAL CHECK (price IS NULL OR price >= 0),
            rating REAL CHECK (rating IS NULL OR (rating >= 0 AND rating <= 5)),
            is_bestseller INTEGER NOT NULL DEFAULT 0,
            UNIQUE(title, author)
        );

        CREATE INDEX IF NOT EXISTS idx_book_title ON book(title);
        CREATE INDEX IF NOT EXISTS idx_book_published_date ON book(published_date);
        CREATE INDEX IF NOT EXISTS idx_book_genre ON book(genre);
        CREATE INDEX IF NOT EXISTS idx_book_publisher_bestseller ON book(publisher_id, is_bestseller);
        CREATE INDEX IF NOT EXISTS idx_book_language ON book(language);",
    )?;

    Ok(())
}

/// Insert a book and return it with its generated ID.
///
/// Field validation and uniqueness checks are the caller's job, the
/// constraints on the table only act as a backstop.
pub fn insert_book(book: &NewBook, connection: &Connection) -> Result<Book, Error> {
    connection.execute(
        "INSERT INTO book (title, author, published_date, isbn, genre, summary, publisher_id,
            page_count, language, price, rating, is_bestseller)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        (
            book.title.trim(),
            book.author.trim(),
            book.published_date,
            book.isbn.as_ref(),
            book.genre.trim(),
            &book.summary,
            book.publisher_id,
            book.page_count,
            book.language,
            book.price,
            book.rating,
            book.is_bestseller,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_book(id, connection)
}

/// Retrieve a single book by ID.
///
/// # Errors
/// Returns [Error::BookNotFound] if there is no book with `book_id`.
pub fn get_book(book_id: BookId, connection: &Connection) -> Result<Book, Error> {
    connection
        .prepare(&format!("{SELECT_BOOK} WHERE id = :id;"))?
        .query_row(&[(":id", &book_id)], map_book_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::BookNotFound(book_id),
            error => error.into(),
        })
}

/// Retrieve all books ordered by title.
pub fn get_all_books(connection: &Connection) -> Result<Vec<Book>, Error> {
    connection
        .prepare(&format!("{SELECT_BOOK} ORDER BY title ASC, id ASC;"))?
        .query_map([], map_book_row)?
        .map(|maybe_book| maybe_book.map_err(|error| error.into()))
        .collect()
}

/// Check whether a book with `book_id` exists.
pub fn book_exists(book_id: BookId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM book WHERE id = ?1)",
        [book_id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Check whether a book with `isbn` exists.
pub fn isbn_exists(isbn: &Isbn, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM book WHERE isbn = ?1)",
        [isbn.as_ref()],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Check whether a book with the same title and author exists.
pub fn title_and_author_exist(
    title: &str,
    author: &str,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM book WHERE title = ?1 AND author = ?2)",
        (title.trim(), author.trim()),
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Delete a book by ID. Its tags are removed by the foreign key cascade.
///
/// # Errors
/// Returns [Error::BookNotFound] if the book doesn't exist.
pub fn delete_book(book_id: BookId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM book WHERE id = ?1", [book_id])?;

    if rows_affected == 0 {
        return Err(Error::BookNotFound(book_id));
    }

    Ok(())
}

/// Map a row with the book columns in table order.
pub(crate) fn map_book_row(row: &Row) -> Result<Book, rusqlite::Error> {
    let raw_isbn: String = row.get(4)?;

    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        published_date: row.get(3)?,
        isbn: Isbn::new_unchecked(&raw_isbn),
        genre: row.get(5)?,
        summary: row.get(6)?,
        publisher_id: row.get(7)?,
        page_count: row.get(8)?,
        language: row.get(9)?,
        price: row.get(10)?,
        rating: row.get(11)?,
        is_bestseller: row.get(12)?,
    })
}

#[cfg(test)]
mod book_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        book::{Book, Isbn, Language},
        db::initialize,
        publisher::{NewPublisher, delete_publisher, insert_publisher},
    };

    use super::{
        book_exists, delete_book, get_all_books, get_book, insert_book, isbn_exists,
        title_and_author_exist,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn new_book(title: &str, isbn: &str) -> crate::book::NewBook {
        Book::build(
            title,
            "Ursula K. Le Guin",
            date!(1969 - 03 - 01),
            Isbn::new_unchecked(isbn),
        )
        .genre("Science Fiction")
    }

    #[test]
    fn insert_book_succeeds() {
        let connection = get_test_db_connection();
        let new_book = new_book("The Left Hand of Darkness", "9780441478125")
            .page_count(304)
            .language(Language::En)
            .price(12.5)
            .rating(4.2);

        let book = insert_book(&new_book, &connection).expect("Could not create book");

        assert!(book.id > 0);
        assert_eq!(book.title, "The Left Hand of Darkness");
        assert_eq!(book.published_date, date!(1969 - 03 - 01));
        assert_eq!(book.page_count, Some(304));
        assert_eq!(book.price, Some(12.5));
        assert!(!book.is_long_book());
    }

    #[test]
    fn get_book_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();

        assert_eq!(get_book(7, &connection), Err(Error::BookNotFound(7)));
    }

    #[test]
    fn get_all_books_orders_by_title() {
        let connection = get_test_db_connection();
        let lathe = insert_book(&new_book("The Lathe of Heaven", "9780060512743"), &connection)
            .unwrap();
        let earthsea =
            insert_book(&new_book("A Wizard of Earthsea", "9780547773742"), &connection).unwrap();

        let books = get_all_books(&connection).unwrap();

        assert_eq!(books, vec![earthsea, lathe]);
    }

    #[test]
    fn uniqueness_helpers_detect_existing_books() {
        let connection = get_test_db_connection();
        insert_book(&new_book("The Dispossessed", "9780061054884"), &connection).unwrap();

        assert_eq!(
            isbn_exists(&Isbn::new_unchecked("9780061054884"), &connection),
            Ok(true)
        );
        assert_eq!(
            title_and_author_exist("The Dispossessed", "Ursula K. Le Guin", &connection),
            Ok(true)
        );
        assert_eq!(
            title_and_author_exist("The Dispossessed", "Someone Else", &connection),
            Ok(false)
        );
    }

    #[test]
    fn duplicate_isbn_violates_constraint() {
        let connection = get_test_db_connection();
        insert_book(&new_book("The Dispossessed", "9780061054884"), &connection).unwrap();

        let result = insert_book(&new_book("Another Title", "9780061054884"), &connection);

        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
    }

    #[test]
    fn deleting_publisher_detaches_books() {
        let connection = get_test_db_connection();
        let publisher = insert_publisher(
            NewPublisher {
                name: "Ace".to_owned(),
                website: None,
                address: None,
            },
            &connection,
        )
        .unwrap();
        let book = insert_book(
            &new_book("The Left Hand of Darkness", "9780441478125").publisher(publisher.id),
            &connection,
        )
        .unwrap();

        delete_publisher(publisher.id, &connection).unwrap();

        assert_eq!(get_book(book.id, &connection).unwrap().publisher_id, None);
    }

    #[test]
    fn delete_book_succeeds() {
        let connection = get_test_db_connection();
        let book = insert_book(&new_book("The Dispossessed", "9780061054884"), &connection)
            .unwrap();

        delete_book(book.id, &connection).unwrap();

        assert_eq!(book_exists(book.id, &connection), Ok(false));
        assert_eq!(delete_book(book.id, &connection), Err(Error::BookNotFound(book.id)));
    }
}
