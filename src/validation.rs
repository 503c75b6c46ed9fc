//! Checks that run inside a write transaction before the write happens.
//!
//! Every check reads through the same connection as the write it guards, so
//! as long as the caller holds the catalog lock nothing can change between
//! the check and the write.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::{
    Error,
    author::{AuthorId, author_exists, book_author_exists},
    book::{BookId, NewBook, book_exists, isbn_exists, title_and_author_exist},
    book_category::{TagMetadata, primary_tag_exists, tag_exists},
    category::{CategoryId, Slug, category_exists, get_parent_id, get_subtree, has_active_children, slug_exists},
    publisher::publisher_exists,
};

/// Check that a category exists.
pub fn ensure_category_exists(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    if category_exists(category_id, connection)? {
        Ok(())
    } else {
        Err(Error::CategoryNotFound(category_id))
    }
}

/// Check that a book exists.
pub fn ensure_book_exists(book_id: BookId, connection: &Connection) -> Result<(), Error> {
    if book_exists(book_id, connection)? {
        Ok(())
    } else {
        Err(Error::BookNotFound(book_id))
    }
}

/// Check that `parent_id` can become the parent of a subtree `subtree_height`
/// levels tall.
///
/// `category_id` is the root of the subtree being placed, or `None` for a
/// category that has not been inserted yet. The ancestor chain of `parent_id`
/// is walked upwards one step at a time, rejecting the placement if it
/// reaches `category_id`. The walk never takes more than `max_depth` steps.
///
/// # Errors
/// - [Error::CategoryNotFound] if `parent_id` does not exist,
/// - [Error::Cycle] if `category_id` is `parent_id` or one of its ancestors,
/// - [Error::MaxDepthExceeded] if the deepest node of the subtree would end up
///   deeper than `max_depth`.
pub fn check_parent(
    category_id: Option<CategoryId>,
    parent_id: CategoryId,
    subtree_height: usize,
    max_depth: usize,
    connection: &Connection,
) -> Result<(), Error> {
    let mut chain_length = 0;
    let mut visited = HashSet::new();
    let mut current = Some(parent_id);

    while let Some(ancestor_id) = current {
        if category_id == Some(ancestor_id) || !visited.insert(ancestor_id) {
            tracing::debug!(
                "rejected parent {parent_id} for category {ancestor_id}: ancestor chain loops"
            );
            return Err(Error::Cycle {
                category_id: ancestor_id,
                parent_id,
            });
        }

        if chain_length == max_depth {
            return Err(Error::MaxDepthExceeded {
                depth: chain_length + 1 + subtree_height,
                max_depth,
            });
        }

        chain_length += 1;
        current = get_parent_id(ancestor_id, connection)?;
    }

    let depth = chain_length + subtree_height;
    if depth > max_depth {
        tracing::debug!("rejected parent {parent_id}: depth {depth} exceeds {max_depth}");
        return Err(Error::MaxDepthExceeded { depth, max_depth });
    }

    Ok(())
}

/// The number of levels in the subtree rooted at `category_id`, 1 for a leaf.
///
/// Counting stops one level past `max_depth`, which is enough to tell that
/// the subtree is too tall.
pub fn subtree_height(
    category_id: CategoryId,
    max_depth: usize,
    connection: &Connection,
) -> Result<usize, Error> {
    let subtree = get_subtree(category_id, max_depth.saturating_add(1), connection)?;

    subtree
        .last()
        .map(|(_, depth)| *depth)
        .ok_or(Error::CategoryNotFound(category_id))
}

/// Check that no category other than `excluding` uses `slug`.
pub fn ensure_slug_available(
    slug: &Slug,
    excluding: Option<CategoryId>,
    connection: &Connection,
) -> Result<(), Error> {
    if slug_exists(slug, excluding, connection)? {
        return Err(Error::DuplicateSlug(slug.to_string()));
    }

    Ok(())
}

/// Check that a category has no active subcategories, so it may be deactivated.
pub fn ensure_can_deactivate(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    if has_active_children(category_id, connection)? {
        return Err(Error::ActiveSubcategories(category_id));
    }

    Ok(())
}

/// Check that both ends of a new tag exist, the tag is not a duplicate, and
/// that it would not give the book a second primary category.
pub fn ensure_can_tag(
    book_id: BookId,
    category_id: CategoryId,
    metadata: &TagMetadata,
    connection: &Connection,
) -> Result<(), Error> {
    ensure_book_exists(book_id, connection)?;
    ensure_category_exists(category_id, connection)?;

    if tag_exists(book_id, category_id, connection)? {
        tracing::debug!("book {book_id} is already tagged with category {category_id}");
        return Err(Error::DuplicateTag {
            book_id,
            category_id,
        });
    }

    ensure_primary_available(book_id, None, metadata, connection)
}

/// Check that setting `metadata` on a tag would not give the book a second
/// primary category. `excluding` is the category of the tag being updated.
pub fn ensure_primary_available(
    book_id: BookId,
    excluding: Option<CategoryId>,
    metadata: &TagMetadata,
    connection: &Connection,
) -> Result<(), Error> {
    if metadata.is_primary && primary_tag_exists(book_id, excluding, connection)? {
        return Err(Error::PrimaryCategoryExists(book_id));
    }

    Ok(())
}

/// Check that both the book and the author exist and that the author is not
/// already credited on the book.
pub fn ensure_can_credit_author(
    book_id: BookId,
    author_id: AuthorId,
    connection: &Connection,
) -> Result<(), Error> {
    ensure_book_exists(book_id, connection)?;

    if !author_exists(author_id, connection)? {
        return Err(Error::AuthorNotFound(author_id));
    }

    if book_author_exists(book_id, author_id, connection)? {
        return Err(Error::DuplicateBookAuthor { book_id, author_id });
    }

    Ok(())
}

/// Check a new book's fields, its publisher and that neither its ISBN nor its
/// title and author are taken.
pub fn ensure_can_insert_book(book: &NewBook, connection: &Connection) -> Result<(), Error> {
    book.validate()?;

    if let Some(publisher_id) = book.publisher_id
        && !publisher_exists(publisher_id, connection)?
    {
        return Err(Error::PublisherNotFound(publisher_id));
    }

    if isbn_exists(&book.isbn, connection)? {
        return Err(Error::DuplicateIsbn(book.isbn.to_string()));
    }

    if title_and_author_exist(&book.title, &book.author, connection)? {
        return Err(Error::DuplicateBook {
            title: book.title.trim().to_owned(),
            author: book.author.trim().to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        Error,
        category::{Category, CategoryId, CategoryName, insert_category},
        db::initialize,
    };

    use super::{check_parent, subtree_height};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn create_chain(length: usize, connection: &Connection) -> Vec<CategoryId> {
        let mut ids = Vec::new();

        for i in 0..length {
            let mut new_category = Category::build(CategoryName::new_unchecked(&format!("Level {i}")));
            new_category.parent_id = ids.last().copied();
            let category = insert_category(
                &new_category,
                &new_category.resolved_slug(),
                OffsetDateTime::now_utc(),
                connection,
            )
            .expect("Could not create test category");
            ids.push(category.id);
        }

        ids
    }

    #[test]
    fn check_parent_accepts_new_leaf() {
        let connection = get_test_db_connection();
        let chain = create_chain(2, &connection);

        assert_eq!(check_parent(None, chain[1], 1, 3, &connection), Ok(()));
    }

    #[test]
    fn check_parent_rejects_self() {
        let connection = get_test_db_connection();
        let chain = create_chain(1, &connection);

        let result = check_parent(Some(chain[0]), chain[0], 1, 32, &connection);

        assert_eq!(
            result,
            Err(Error::Cycle {
                category_id: chain[0],
                parent_id: chain[0]
            })
        );
    }

    #[test]
    fn check_parent_rejects_descendant() {
        let connection = get_test_db_connection();
        let chain = create_chain(4, &connection);

        let result = check_parent(Some(chain[1]), chain[3], 3, 32, &connection);

        assert!(matches!(result, Err(Error::Cycle { .. })));
    }

    #[test]
    fn check_parent_reports_cycle_before_depth() {
        let connection = get_test_db_connection();
        let chain = create_chain(3, &connection);

        let result = check_parent(Some(chain[0]), chain[2], 3, 3, &connection);

        assert!(matches!(result, Err(Error::Cycle { .. })));
    }

    #[test]
    fn check_parent_rejects_missing_parent() {
        let connection = get_test_db_connection();

        let result = check_parent(None, 99, 1, 32, &connection);

        assert_eq!(result, Err(Error::CategoryNotFound(99)));
    }

    #[test]
    fn check_parent_rejects_too_deep() {
        let connection = get_test_db_connection();
        let chain = create_chain(3, &connection);

        let result = check_parent(None, chain[2], 1, 3, &connection);

        assert_eq!(
            result,
            Err(Error::MaxDepthExceeded {
                depth: 4,
                max_depth: 3
            })
        );
    }

    #[test]
    fn check_parent_detects_loops_already_in_the_table() {
        let connection = get_test_db_connection();
        let chain = create_chain(2, &connection);
        connection
            .execute(
                "UPDATE category SET parent_id = ?1 WHERE id = ?2",
                (chain[1], chain[0]),
            )
            .unwrap();

        let result = check_parent(None, chain[1], 1, 32, &connection);

        assert!(matches!(result, Err(Error::Cycle { .. })));
    }

    #[test]
    fn subtree_height_counts_levels() {
        let connection = get_test_db_connection();
        let chain = create_chain(3, &connection);

        assert_eq!(subtree_height(chain[0], 32, &connection), Ok(3));
        assert_eq!(subtree_height(chain[2], 32, &connection), Ok(1));
        assert_eq!(subtree_height(chain[0], 1, &connection), Ok(2));
        assert_eq!(
            subtree_height(42, 32, &connection),
            Err(Error::CategoryNotFound(42))
        );
    }

    #[test]
    fn unbounded_depth_does_not_overflow() {
        let connection = get_test_db_connection();
        let chain = create_chain(3, &connection);

        assert_eq!(subtree_height(chain[0], usize::MAX, &connection), Ok(3));
        assert_eq!(
            check_parent(None, chain[2], 1, usize::MAX, &connection),
            Ok(())
        );
    }
}
