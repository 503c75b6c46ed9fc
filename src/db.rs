//! Creates the catalog's tables.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    author::{create_author_table, create_book_author_table},
    book::create_book_table,
    book_category::create_book_category_table,
    category::create_category_table,
    publisher::create_publisher_table,
};

/// Create the tables for the domain models if they do not exist and turn on
/// foreign key enforcement for `connection`.
///
/// # Errors
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Must happen outside of a transaction, where SQLite silently ignores it.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_publisher_table(&transaction)?;
    create_author_table(&transaction)?;
    create_book_table(&transaction)?;
    create_book_author_table(&transaction)?;
    create_category_table(&transaction)?;
    create_book_category_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
