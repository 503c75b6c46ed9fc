//! Implements the shared, lock-guarded handle to the catalog database.
//!
//! Every operation takes the database lock for its whole duration. Mutations
//! additionally run inside one immediate SQL transaction, so a failed
//! validation or write leaves no trace.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error,
    author::{self, Author, AuthorId, NewAuthor},
    book::{self, Book, BookId, NewBook},
    book_category::{self, BookCategory, BookCategoryEntry, TagMetadata},
    category::{
        self, Category, CategoryId, CategoryNode, CategoryUpdate, DeletePolicy, DeleteReport,
        NewCategory, Slug,
    },
    config::CatalogConfig,
    db::initialize,
    publisher::{self, NewPublisher, Publisher, PublisherId},
    validation::{
        check_parent, ensure_book_exists, ensure_can_credit_author, ensure_can_deactivate,
        ensure_can_insert_book,
        ensure_can_tag, ensure_category_exists, ensure_primary_available, ensure_slug_available,
        subtree_height,
    },
};

/// The category forest, the books and the tags between them, behind one lock.
///
/// Cloning a [Catalog] is cheap and every clone shares the same connection.
#[derive(Debug, Clone)]
pub struct Catalog {
    connection: Arc<Mutex<Connection>>,
    config: CatalogConfig,
}

impl Catalog {
    /// Create a catalog backed by `connection`.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid or the database cannot be initialized.
    pub fn new(connection: Connection, config: CatalogConfig) -> Result<Self, Error> {
        let config = config.validate()?;
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            config,
        })
    }

    /// Create a catalog backed by a fresh in-memory database.
    pub fn open_in_memory(config: CatalogConfig) -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?, config)
    }

    /// The settings this catalog was created with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn read<T>(&self, operation: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        operation(&connection)
    }

    fn write<T>(&self, operation: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Returning early drops `transaction`, which rolls it back.
        let result = operation(&transaction)?;
        transaction.commit()?;

        Ok(result)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    /// Create a category, optionally nested under an existing parent.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::CategoryNotFound] if the parent does not exist,
    /// - [Error::Cycle] if the parent's ancestor chain already loops,
    /// - [Error::MaxDepthExceeded] if the category would be nested too deep,
    /// - [Error::InvalidSlug] or [Error::DuplicateSlug] if the slug is unusable.
    pub fn create_category(&self, new_category: NewCategory) -> Result<Category, Error> {
        let max_depth = self.config.max_depth;

        self.write(|connection| {
            let slug = Slug::new(new_category.resolved_slug().as_ref())?;
            ensure_slug_available(&slug, None, connection)?;

            if let Some(parent_id) = new_category.parent_id {
                check_parent(None, parent_id, 1, max_depth, connection)?;
            }

            let category =
                category::insert_category(&new_category, &slug, OffsetDateTime::now_utc(), connection)?;
            tracing::info!(
                "created category {} \"{}\" under {:?}",
                category.id,
                category.name,
                category.parent_id
            );

            Ok(category)
        })
    }

    /// Move a category, with its whole subtree, under `new_parent_id`, or make
    /// it a root when `new_parent_id` is `None`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::CategoryNotFound] if either category does not exist,
    /// - [Error::Cycle] if `new_parent_id` is `category_id` or one of its descendants,
    /// - [Error::MaxDepthExceeded] if part of the subtree would end up too deep.
    pub fn move_category(
        &self,
        category_id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> Result<Category, Error> {
        let max_depth = self.config.max_depth;

        self.write(|connection| {
            let category = category::get_category(category_id, connection)?;

            if let Some(parent_id) = new_parent_id {
                let height = subtree_height(category_id, max_depth, connection)?;
                check_parent(Some(category_id), parent_id, height, max_depth, connection)?;
            }

            if category.parent_id == new_parent_id {
                return Ok(category);
            }

            category::set_parent(
                category_id,
                new_parent_id,
                OffsetDateTime::now_utc(),
                connection,
            )?;
            tracing::info!(
                "moved category {category_id} from {:?} to {new_parent_id:?}",
                category.parent_id
            );

            category::get_category(category_id, connection)
        })
    }

    /// Delete a category and apply `policy` to its descendants.
    ///
    /// Every tag on a deleted category is removed as well.
    ///
    /// # Errors
    /// Returns [Error::CategoryNotFound] if the category does not exist.
    pub fn delete_category(
        &self,
        category_id: CategoryId,
        policy: DeletePolicy,
    ) -> Result<DeleteReport, Error> {
        let max_depth = self.config.max_depth;

        self.write(|connection| {
            let category = category::get_category(category_id, connection)?;
            let mut report = DeleteReport::default();

            match policy {
                DeletePolicy::Cascade => {
                    let subtree = category::get_subtree(category_id, max_depth, connection)?;

                    // Deepest first, so no row is deleted while it still has children.
                    for (id, _) in subtree.into_iter().rev() {
                        report.removed_tags += book_category::delete_tags_for_category(id, connection)?;
                        category::delete_category_row(id, connection)?;
                        report.deleted.push(id);
                    }
                }
                DeletePolicy::Reparent => {
                    report.reparented = category::reparent_children(
                        category_id,
                        category.parent_id,
                        OffsetDateTime::now_utc(),
                        connection,
                    )?;
                    report.removed_tags =
                        book_category::delete_tags_for_category(category_id, connection)?;
                    category::delete_category_row(category_id, connection)?;
                    report.deleted.push(category_id);
                }
            }

            tracing::info!(
                "deleted category {category_id} with policy {policy}: {} categories deleted, \
                {} reparented, {} tags removed",
                report.deleted.len(),
                report.reparented.len(),
                report.removed_tags
            );

            Ok(report)
        })
    }

    /// Change a category's name, description, slug or display order.
    ///
    /// # Errors
    /// Returns [Error::CategoryNotFound] if the category does not exist and
    /// [Error::DuplicateSlug] if the new slug belongs to another category.
    pub fn update_category(
        &self,
        category_id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category, Error> {
        self.write(|connection| {
            ensure_category_exists(category_id, connection)?;

            if let Some(slug) = &update.slug {
                ensure_slug_available(slug, Some(category_id), connection)?;
            }

            category::update_category(category_id, &update, OffsetDateTime::now_utc(), connection)?;
            tracing::info!("updated category {category_id}");

            category::get_category(category_id, connection)
        })
    }

    /// Activate or deactivate a category.
    ///
    /// # Errors
    /// Returns [Error::CategoryNotFound] if the category does not exist and
    /// [Error::ActiveSubcategories] when deactivating a category that still
    /// has active subcategories.
    pub fn set_category_active(
        &self,
        category_id: CategoryId,
        is_active: bool,
    ) -> Result<Category, Error> {
        self.write(|connection| {
            ensure_category_exists(category_id, connection)?;

            if !is_active {
                ensure_can_deactivate(category_id, connection)?;
            }

            category::set_active(category_id, is_active, OffsetDateTime::now_utc(), connection)?;
            tracing::info!("set category {category_id} active = {is_active}");

            category::get_category(category_id, connection)
        })
    }

    /// Retrieve a single category.
    pub fn get_category(&self, category_id: CategoryId) -> Result<Category, Error> {
        self.read(|connection| category::get_category(category_id, connection))
    }

    /// Retrieve every category ordered by display order then name.
    pub fn list_categories(&self) -> Result<Vec<Category>, Error> {
        self.read(category::get_all_categories)
    }

    /// Retrieve the direct subcategories of a category.
    pub fn get_subcategories(&self, category_id: CategoryId) -> Result<Vec<Category>, Error> {
        self.read(|connection| {
            ensure_category_exists(category_id, connection)?;
            category::get_children(category_id, connection)
        })
    }

    /// Count the direct subcategories of a category.
    pub fn subcategory_count(&self, category_id: CategoryId) -> Result<usize, Error> {
        self.read(|connection| {
            ensure_category_exists(category_id, connection)?;
            category::count_children(category_id, connection)
        })
    }

    /// Retrieve every descendant of a category in pre-order, siblings ordered
    /// by display order then name.
    pub fn get_all_subcategories(&self, category_id: CategoryId) -> Result<Vec<Category>, Error> {
        let node = self.get_category_tree(category_id)?;

        Ok(category::flatten_descendants(node))
    }

    /// Retrieve the ancestors of a category, root first.
    pub fn get_ancestors(&self, category_id: CategoryId) -> Result<Vec<Category>, Error> {
        let max_depth = self.config.max_depth;

        self.read(|connection| {
            ensure_category_exists(category_id, connection)?;
            category::get_ancestors(category_id, max_depth, connection)
        })
    }

    /// The names from the root down to the category, e.g. "Fiction > SciFi".
    pub fn get_full_path(&self, category_id: CategoryId) -> Result<String, Error> {
        let max_depth = self.config.max_depth;

        self.read(|connection| {
            let category = category::get_category(category_id, connection)?;
            let mut path = category::get_ancestors(category_id, max_depth, connection)?;
            path.push(category);

            Ok(category::format_path(&path))
        })
    }

    /// Retrieve the whole category forest as nested nodes.
    pub fn category_tree(&self) -> Result<Vec<CategoryNode>, Error> {
        let max_depth = self.config.max_depth;

        self.read(|connection| {
            let categories = category::get_all_categories(connection)?;
            Ok(category::build_forest(categories, max_depth))
        })
    }

    /// Retrieve the subtree rooted at a category as nested nodes.
    pub fn get_category_tree(&self, category_id: CategoryId) -> Result<CategoryNode, Error> {
        let max_depth = self.config.max_depth;

        self.read(|connection| {
            let root = category::get_category(category_id, connection)?;
            let subtree_ids: HashSet<CategoryId> =
                category::get_subtree(category_id, max_depth, connection)?
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect();
            let descendants = category::get_all_categories(connection)?
                .into_iter()
                .filter(|category| category.id != category_id && subtree_ids.contains(&category.id))
                .collect();

            Ok(category::build_subtree(root, descendants, max_depth))
        })
    }

    // ========================================================================
    // PUBLISHERS AND BOOKS
    // ========================================================================

    /// Create a publisher.
    pub fn create_publisher(&self, new_publisher: NewPublisher) -> Result<Publisher, Error> {
        self.write(|connection| {
            let publisher = publisher::insert_publisher(new_publisher, connection)?;
            tracing::info!("created publisher {} \"{}\"", publisher.id, publisher.name);

            Ok(publisher)
        })
    }

    /// Retrieve a single publisher.
    pub fn get_publisher(&self, publisher_id: PublisherId) -> Result<Publisher, Error> {
        self.read(|connection| publisher::get_publisher(publisher_id, connection))
    }

    /// Delete a publisher, keeping its books.
    pub fn delete_publisher(&self, publisher_id: PublisherId) -> Result<(), Error> {
        self.write(|connection| {
            publisher::delete_publisher(publisher_id, connection)?;
            tracing::info!("deleted publisher {publisher_id}");

            Ok(())
        })
    }

    /// Create a book.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::EmptyField] or [Error::InvalidBook] if a field is invalid,
    /// - [Error::PublisherNotFound] if the publisher does not exist,
    /// - [Error::DuplicateIsbn] or [Error::DuplicateBook] if the book already exists.
    pub fn create_book(&self, new_book: NewBook) -> Result<Book, Error> {
        self.write(|connection| {
            ensure_can_insert_book(&new_book, connection)?;

            let book = book::insert_book(&new_book, connection)?;
            tracing::info!("created book {} \"{}\"", book.id, book.title);

            Ok(book)
        })
    }

    /// Retrieve a single book.
    pub fn get_book(&self, book_id: BookId) -> Result<Book, Error> {
        self.read(|connection| book::get_book(book_id, connection))
    }

    /// Retrieve every book ordered by title.
    pub fn list_books(&self) -> Result<Vec<Book>, Error> {
        self.read(book::get_all_books)
    }

    /// Delete a book along with all of its tags.
    pub fn delete_book(&self, book_id: BookId) -> Result<(), Error> {
        self.write(|connection| {
            book::delete_book(book_id, connection)?;
            tracing::info!("deleted book {book_id}");

            Ok(())
        })
    }

    // ========================================================================
    // AUTHORS
    // ========================================================================

    /// Create an author.
    pub fn create_author(&self, new_author: NewAuthor) -> Result<Author, Error> {
        self.write(|connection| {
            let author = author::insert_author(new_author, connection)?;
            tracing::info!("created author {} \"{}\"", author.id, author.name);

            Ok(author)
        })
    }

    /// Retrieve a single author.
    pub fn get_author(&self, author_id: AuthorId) -> Result<Author, Error> {
        self.read(|connection| author::get_author(author_id, connection))
    }

    /// Retrieve every author ordered by name.
    pub fn list_authors(&self) -> Result<Vec<Author>, Error> {
        self.read(author::get_all_authors)
    }

    /// Delete an author and their credits, keeping their books.
    pub fn delete_author(&self, author_id: AuthorId) -> Result<(), Error> {
        self.write(|connection| {
            author::delete_author(author_id, connection)?;
            tracing::info!("deleted author {author_id}");

            Ok(())
        })
    }

    /// Credit an author on a book.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::BookNotFound] or [Error::AuthorNotFound] if either end is missing,
    /// - [Error::DuplicateBookAuthor] if the author is already credited.
    pub fn add_book_author(&self, book_id: BookId, author_id: AuthorId) -> Result<(), Error> {
        self.write(|connection| {
            ensure_can_credit_author(book_id, author_id, connection)?;

            author::insert_book_author(book_id, author_id, connection)?;
            tracing::info!("credited author {author_id} on book {book_id}");

            Ok(())
        })
    }

    /// Remove an author's credit from a book.
    pub fn remove_book_author(&self, book_id: BookId, author_id: AuthorId) -> Result<(), Error> {
        self.write(|connection| {
            author::delete_book_author(book_id, author_id, connection)?;
            tracing::info!("removed author {author_id} from book {book_id}");

            Ok(())
        })
    }

    /// The authors credited on a book, ordered by name.
    pub fn list_authors_for_book(&self, book_id: BookId) -> Result<Vec<Author>, Error> {
        self.read(|connection| {
            ensure_book_exists(book_id, connection)?;
            author::get_authors_for_book(book_id, connection)
        })
    }

    /// The names of the authors credited on a book, ordered by name.
    pub fn author_names(&self, book_id: BookId) -> Result<Vec<String>, Error> {
        let authors = self.list_authors_for_book(book_id)?;

        Ok(authors.into_iter().map(|author| author.name).collect())
    }

    // ========================================================================
    // TAGS
    // ========================================================================

    /// Tag a book with a category.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::BookNotFound] or [Error::CategoryNotFound] if either end is missing,
    /// - [Error::DuplicateTag] if the book is already tagged with the category,
    /// - [Error::PrimaryCategoryExists] if the tag is primary and the book
    ///   already has a primary category.
    pub fn tag(
        &self,
        book_id: BookId,
        category_id: CategoryId,
        metadata: TagMetadata,
    ) -> Result<BookCategory, Error> {
        self.write(|connection| {
            ensure_can_tag(book_id, category_id, &metadata, connection)?;

            let tag = book_category::insert_book_category(
                book_id,
                category_id,
                &metadata,
                OffsetDateTime::now_utc(),
                connection,
            )?;
            tracing::info!("tagged book {book_id} with category {category_id}");

            Ok(tag)
        })
    }

    /// Remove a tag from a book.
    ///
    /// # Errors
    /// Returns [Error::TagNotFound] if the book is not tagged with the category.
    pub fn untag(&self, book_id: BookId, category_id: CategoryId) -> Result<(), Error> {
        self.write(|connection| {
            book_category::delete_book_category(book_id, category_id, connection)?;
            tracing::info!("untagged book {book_id} from category {category_id}");

            Ok(())
        })
    }

    /// Replace the metadata on an existing tag.
    ///
    /// # Errors
    /// Returns [Error::TagNotFound] if the book is not tagged with the category
    /// and [Error::PrimaryCategoryExists] if another tag is already primary.
    pub fn update_tag(
        &self,
        book_id: BookId,
        category_id: CategoryId,
        metadata: TagMetadata,
    ) -> Result<BookCategory, Error> {
        self.write(|connection| {
            book_category::get_book_category(book_id, category_id, connection)?;
            ensure_primary_available(book_id, Some(category_id), &metadata, connection)?;

            book_category::update_book_category(book_id, category_id, &metadata, connection)?;
            tracing::info!("updated tag between book {book_id} and category {category_id}");

            book_category::get_book_category(book_id, category_id, connection)
        })
    }

    /// Retrieve the tag linking a book and a category.
    pub fn get_tag(&self, book_id: BookId, category_id: CategoryId) -> Result<BookCategory, Error> {
        self.read(|connection| book_category::get_book_category(book_id, category_id, connection))
    }

    /// The categories a book is tagged with: the primary category first, then
    /// by descending relevance, ties in the order the tags were made.
    pub fn list_categories_for_book(&self, book_id: BookId) -> Result<Vec<Category>, Error> {
        self.read(|connection| {
            ensure_book_exists(book_id, connection)?;
            book_category::get_categories_for_book(book_id, connection)
        })
    }

    /// Like [Catalog::list_categories_for_book], with each tag's metadata.
    pub fn list_tags_for_book(&self, book_id: BookId) -> Result<Vec<BookCategoryEntry>, Error> {
        self.read(|connection| {
            ensure_book_exists(book_id, connection)?;
            book_category::get_tag_entries_for_book(book_id, connection)
        })
    }

    /// The books tagged with a category, ordered by title.
    ///
    /// With `include_descendants`, books tagged with any category in the
    /// subtree are included too. Each book is listed once.
    pub fn list_books_for_category(
        &self,
        category_id: CategoryId,
        include_descendants: bool,
    ) -> Result<Vec<Book>, Error> {
        let levels = if include_descendants {
            self.config.max_depth
        } else {
            1
        };

        self.read(|connection| {
            ensure_category_exists(category_id, connection)?;
            tracing::debug!("listing books for category {category_id} over {levels} level(s)");
            book_category::get_books_in_subtree(category_id, levels, connection)
        })
    }

    /// The number of books tagged directly with a category.
    pub fn count_books_in_category(&self, category_id: CategoryId) -> Result<i64, Error> {
        self.read(|connection| {
            ensure_category_exists(category_id, connection)?;
            book_category::get_category_book_count(category_id, connection)
        })
    }
}
