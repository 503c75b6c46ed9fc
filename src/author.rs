//! Authors and the credits linking them to books.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, book::BookId};

/// Database identifier for an author.
pub type AuthorId = i64;

/// A person credited on one or more books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Author {
    /// The ID of the author.
    pub id: AuthorId,
    /// The author's name.
    pub name: String,
    /// A short biography.
    pub biography: Option<String>,
    /// The author's date of birth, if known.
    pub birth_date: Option<Date>,
}

/// An author that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthor {
    /// The author's name, must not be blank.
    pub name: String,
    /// A short biography.
    pub biography: Option<String>,
    /// The author's date of birth.
    pub birth_date: Option<Date>,
}

/// Initialize the author table.
pub fn create_author_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS author (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            biography TEXT,
            birth_date TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_author_name ON author(name);",
    )?;

    Ok(())
}

/// Initialize the junction table crediting authors on books.
///
/// Credits are removed along with either the book or the author.
pub fn create_book_author_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS book_author (
            book_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            PRIMARY KEY (book_id, author_id),
            FOREIGN KEY(book_id) REFERENCES book(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(author_id) REFERENCES author(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_book_author_author ON book_author(author_id);",
    )?;

    Ok(())
}

/// Create an author and return it with its generated ID.
///
/// # Errors
/// Returns [Error::EmptyField] if the name is blank.
pub fn insert_author(author: NewAuthor, connection: &Connection) -> Result<Author, Error> {
    let name = author.name.trim();

    if name.is_empty() {
        return Err(Error::EmptyField("author name"));
    }

    connection.execute(
        "INSERT INTO author (name, biography, birth_date) VALUES (?1, ?2, ?3);",
        (name, &author.biography, author.birth_date),
    )?;

    Ok(Author {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
        biography: author.biography,
        birth_date: author.birth_date,
    })
}

/// Retrieve a single author by ID.
///
/// # Errors
/// Returns [Error::AuthorNotFound] if there is no author with `author_id`.
pub fn get_author(author_id: AuthorId, connection: &Connection) -> Result<Author, Error> {
    connection
        .prepare("SELECT id, name, biography, birth_date FROM author WHERE id = :id;")?
        .query_row(&[(":id", &author_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AuthorNotFound(author_id),
            error => error.into(),
        })
}

/// Retrieve every author ordered by name.
pub fn get_all_authors(connection: &Connection) -> Result<Vec<Author>, Error> {
    connection
        .prepare("SELECT id, name, biography, birth_date FROM author ORDER BY name ASC, id ASC;")?
        .query_map([], map_row)?
        .map(|maybe_author| maybe_author.map_err(|error| error.into()))
        .collect()
}

/// Check whether an author with `author_id` exists.
pub fn author_exists(author_id: AuthorId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM author WHERE id = ?1)",
        [author_id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Delete an author along with their credits. The books are kept.
///
/// # Errors
/// Returns [Error::AuthorNotFound] if the author doesn't exist.
pub fn delete_author(author_id: AuthorId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM author WHERE id = ?1", [author_id])?;

    if rows_affected == 0 {
        return Err(Error::AuthorNotFound(author_id));
    }

    Ok(())
}

/// Credit an author on a book.
pub fn insert_book_author(
    book_id: BookId,
    author_id: AuthorId,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO book_author (book_id, author_id) VALUES (?1, ?2)",
        (book_id, author_id),
    )?;

    Ok(())
}

/// Check whether an author is credited on a book.
pub fn book_author_exists(
    book_id: BookId,
    author_id: AuthorId,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM book_author WHERE book_id = ?1 AND author_id = ?2)",
        (book_id, author_id),
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Remove an author's credit from a book.
///
/// # Errors
/// Returns [Error::BookAuthorNotFound] if the author is not credited on the book.
pub fn delete_book_author(
    book_id: BookId,
    author_id: AuthorId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM book_author WHERE book_id = ?1 AND author_id = ?2",
        (book_id, author_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::BookAuthorNotFound { book_id, author_id });
    }

    Ok(())
}

/// Retrieve the authors credited on a book, ordered by name.
pub fn get_authors_for_book(book_id: BookId, connection: &Connection) -> Result<Vec<Author>, Error> {
    connection
        .prepare(
            "SELECT a.id, a.name, a.biography, a.birth_date
            FROM author a
            INNER JOIN book_author ba ON ba.author_id = a.id
            WHERE ba.book_id = ?1
            ORDER BY a.name ASC, a.id ASC",
        )?
        .query_map([book_id], map_row)?
        .map(|maybe_author| maybe_author.map_err(|error| error.into()))
        .collect()
}

fn map_row(row: &Row) -> Result<Author, rusqlite::Error> {
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        biography: row.get(2)?,
        birth_date: row.get(3)?,
    })
}

#[cfg(test)]
mod author_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        book::{Book, BookId, Isbn, insert_book},
        db::initialize,
    };

    use super::{
        NewAuthor, author_exists, book_author_exists, delete_author, delete_book_author,
        get_all_authors, get_author, get_authors_for_book, insert_author, insert_book_author,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn new_author(name: &str) -> NewAuthor {
        NewAuthor {
            name: name.to_owned(),
            biography: None,
            birth_date: Some(date!(1929 - 10 - 21)),
        }
    }

    fn create_book(connection: &Connection) -> BookId {
        let new_book = Book::build(
            "Good Omens",
            "Terry Pratchett",
            date!(1990 - 05 - 01),
            Isbn::new_unchecked("9780060853983"),
        )
        .genre("Fantasy");

        insert_book(&new_book, connection)
            .expect("Could not create test book")
            .id
    }

    #[test]
    fn insert_author_round_trips() {
        let connection = get_test_db_connection();

        let author = insert_author(new_author(" Ursula K. Le Guin "), &connection).unwrap();

        assert_eq!(author.name, "Ursula K. Le Guin");
        assert_eq!(get_author(author.id, &connection), Ok(author));
    }

    #[test]
    fn insert_author_rejects_blank_name() {
        let connection = get_test_db_connection();

        let result = insert_author(new_author(" "), &connection);

        assert_eq!(result, Err(Error::EmptyField("author name")));
    }

    #[test]
    fn get_all_authors_orders_by_name() {
        let connection = get_test_db_connection();
        let pratchett = insert_author(new_author("Terry Pratchett"), &connection).unwrap();
        let gaiman = insert_author(new_author("Neil Gaiman"), &connection).unwrap();

        assert_eq!(get_all_authors(&connection), Ok(vec![gaiman, pratchett]));
    }

    #[test]
    fn authors_for_book_are_ordered_by_name() {
        let connection = get_test_db_connection();
        let book_id = create_book(&connection);
        let pratchett = insert_author(new_author("Terry Pratchett"), &connection).unwrap();
        let gaiman = insert_author(new_author("Neil Gaiman"), &connection).unwrap();
        insert_book_author(book_id, pratchett.id, &connection).unwrap();
        insert_book_author(book_id, gaiman.id, &connection).unwrap();

        let authors = get_authors_for_book(book_id, &connection).unwrap();

        assert_eq!(authors, vec![gaiman, pratchett]);
    }

    #[test]
    fn deleting_author_removes_credits_but_keeps_book() {
        let connection = get_test_db_connection();
        let book_id = create_book(&connection);
        let author = insert_author(new_author("Terry Pratchett"), &connection).unwrap();
        insert_book_author(book_id, author.id, &connection).unwrap();

        delete_author(author.id, &connection).unwrap();

        assert_eq!(author_exists(author.id, &connection), Ok(false));
        assert_eq!(book_author_exists(book_id, author.id, &connection), Ok(false));
        assert!(get_authors_for_book(book_id, &connection).unwrap().is_empty());
        assert_eq!(
            delete_author(author.id, &connection),
            Err(Error::AuthorNotFound(author.id))
        );
    }

    #[test]
    fn delete_missing_credit_returns_not_found() {
        let connection = get_test_db_connection();
        let book_id = create_book(&connection);

        assert_eq!(
            delete_book_author(book_id, 7, &connection),
            Err(Error::BookAuthorNotFound {
                book_id,
                author_id: 7
            })
        );
    }
}
