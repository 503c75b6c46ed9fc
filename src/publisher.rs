//! Publishers and their database operations.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Database identifier for a publisher.
pub type PublisherId = i64;

/// A company that publishes books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Publisher {
    /// The ID of the publisher.
    pub id: PublisherId,
    /// The publisher's name.
    pub name: String,
    /// The publisher's home page.
    pub website: Option<String>,
    /// The publisher's postal address.
    pub address: Option<String>,
}

/// A publisher that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublisher {
    /// The publisher's name, must not be blank.
    pub name: String,
    /// The publisher's home page.
    pub website: Option<String>,
    /// The publisher's postal address.
    pub address: Option<String>,
}

/// Initialize the publisher table.
pub fn create_publisher_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS publisher (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            website TEXT,
            address TEXT
        );",
    )?;

    Ok(())
}

/// Create a publisher and return it with its generated ID.
///
/// # Errors
/// Returns [Error::EmptyField] if the name is blank.
pub fn insert_publisher(publisher: NewPublisher, connection: &Connection) -> Result<Publisher, Error> {
    let name = publisher.name.trim();

    if name.is_empty() {
        return Err(Error::EmptyField("publisher name"));
    }

    connection.execute(
        "INSERT INTO publisher (name, website, address) VALUES (?1, ?2, ?3);",
        (name, &publisher.website, &publisher.address),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Publisher {
        id,
        name: name.to_owned(),
        website: publisher.website,
        address: publisher.address,
    })
}

/// Retrieve a single publisher by ID.
///
/// # Errors
/// Returns [Error::PublisherNotFound] if there is no publisher with `publisher_id`.
pub fn get_publisher(publisher_id: PublisherId, connection: &Connection) -> Result<Publisher, Error> {
    connection
        .prepare("SELECT id, name, website, address FROM publisher WHERE id = :id;")?
        .query_row(&[(":id", &publisher_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::PublisherNotFound(publisher_id),
            error => error.into(),
        })
}

/// Check whether a publisher with `publisher_id` exists.
pub fn publisher_exists(publisher_id: PublisherId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM publisher WHERE id = ?1)",
        [publisher_id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Delete a publisher. Its books are kept and lose their publisher.
///
/// # Errors
/// Returns [Error::PublisherNotFound] if the publisher doesn't exist.
pub fn delete_publisher(publisher_id: PublisherId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM publisher WHERE id = ?1", [publisher_id])?;

    if rows_affected == 0 {
        return Err(Error::PublisherNotFound(publisher_id));
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Publisher, rusqlite::Error> {
    Ok(Publisher {
        id: row.get(0)?,
        name: row.get(1)?,
        website: row.get(2)?,
        address: row.get(3)?,
    })
}

#[cfg(test)]
mod publisher_query_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::{
        NewPublisher, create_publisher_table, delete_publisher, get_publisher, insert_publisher,
        publisher_exists,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_publisher_table(&connection).expect("Could not create publisher table");
        connection
    }

    fn new_publisher(name: &str) -> NewPublisher {
        NewPublisher {
            name: name.to_owned(),
            website: Some("https://example.com".to_owned()),
            address: None,
        }
    }

    #[test]
    fn insert_publisher_trims_name() {
        let connection = get_test_db_connection();

        let publisher = insert_publisher(new_publisher("  Tor Books "), &connection).unwrap();

        assert!(publisher.id > 0);
        assert_eq!(publisher.name, "Tor Books");
        assert_eq!(get_publisher(publisher.id, &connection), Ok(publisher));
    }

    #[test]
    fn insert_publisher_rejects_blank_name() {
        let connection = get_test_db_connection();

        let result = insert_publisher(new_publisher("   "), &connection);

        assert_eq!(result, Err(Error::EmptyField("publisher name")));
    }

    #[test]
    fn delete_publisher_removes_row() {
        let connection = get_test_db_connection();
        let publisher = insert_publisher(new_publisher("Tor Books"), &connection).unwrap();

        delete_publisher(publisher.id, &connection).unwrap();

        assert_eq!(publisher_exists(publisher.id, &connection), Ok(false));
        assert_eq!(
            delete_publisher(publisher.id, &connection),
            Err(Error::PublisherNotFound(publisher.id))
        );
    }
}
