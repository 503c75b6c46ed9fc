//! Database operations for categories.
//!
//! These functions do not check tree invariants. Callers go through
//! [Catalog](crate::Catalog), which runs the validation layer first.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, CategoryId, CategoryName, CategoryUpdate, DisplayOrder, NewCategory, Slug},
};

const SELECT_CATEGORY: &str = "SELECT id, name, description, parent_id, slug, is_active, \
    display_order, created_at, updated_at FROM category";

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            parent_id INTEGER REFERENCES category(id) ON UPDATE CASCADE,
            slug TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            display_order INTEGER NOT NULL DEFAULT 0 CHECK (display_order BETWEEN 0 AND 1000),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (parent_id IS NULL OR parent_id != id)
        );

        CREATE INDEX IF NOT EXISTS idx_category_parent_id ON category(parent_id);",
    )?;

    Ok(())
}

/// Insert a category and return it with its generated ID.
///
/// `slug` is passed separately so the caller can check it for uniqueness first.
pub fn insert_category(
    category: &NewCategory,
    slug: &Slug,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (name, description, parent_id, slug, is_active, display_order, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
        (
            category.name.as_ref(),
            &category.description,
            category.parent_id,
            slug.as_ref(),
            category.is_active,
            category.display_order.get(),
            now,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_category(id, connection)
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if there is no category with `category_id`.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(&format!("{SELECT_CATEGORY} WHERE id = :id;"))?
        .query_row(&[(":id", &category_id)], map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(category_id),
            error => error.into(),
        })
}

/// Check whether a category with `category_id` exists.
pub fn category_exists(category_id: CategoryId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1)",
        [category_id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Get the parent of a category.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if there is no category with `category_id`.
pub fn get_parent_id(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Option<CategoryId>, Error> {
    connection
        .query_row(
            "SELECT parent_id FROM category WHERE id = ?1",
            [category_id],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(category_id),
            error => error.into(),
        })
}

/// Retrieve all categories ordered by display order then name.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CATEGORY} ORDER BY display_order ASC, name ASC, id ASC;"
        ))?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the direct children of a category ordered by display order then name.
pub fn get_children(parent_id: CategoryId, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CATEGORY} WHERE parent_id = ?1 ORDER BY display_order ASC, name ASC, id ASC;"
        ))?
        .query_map([parent_id], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Count the direct children of a category.
pub fn count_children(parent_id: CategoryId, connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM category WHERE parent_id = ?1",
        [parent_id],
        |row| row.get(0),
    )?;

    Ok(count as usize)
}

/// Whether any direct child of the category is active.
pub fn has_active_children(parent_id: CategoryId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM category WHERE parent_id = ?1 AND is_active = 1)",
        [parent_id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Get the IDs in the subtree rooted at `root_id` with their depth below the
/// root (the root itself has depth 1), ordered shallowest first.
///
/// The traversal stops after `max_levels` levels.
pub fn get_subtree(
    root_id: CategoryId,
    max_levels: usize,
    connection: &Connection,
) -> Result<Vec<(CategoryId, usize)>, Error> {
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
            SELECT id, depth FROM subtree ORDER BY depth ASC, id ASC;",
        )?
        .query_map((root_id, level_limit(max_levels)), |row| {
            let id = row.get(0)?;
            let depth: i64 = row.get(1)?;
            Ok((id, depth as usize))
        })?
        .map(|maybe_row| maybe_row.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the ancestors of a category, root first, excluding the category itself.
///
/// The walk stops after `max_levels` levels.
pub fn get_ancestors(
    category_id: CategoryId,
    max_levels: usize,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "WITH RECURSIVE ancestor(id, parent_id, depth) AS (
                SELECT id, parent_id, 0 FROM category WHERE id = ?1
                UNION ALL
                SELECT c.id, c.parent_id, a.depth + 1
                FROM category c
                INNER JOIN ancestor a ON c.id = a.parent_id
                WHERE a.depth < ?2
            )
            SELECT c.id, c.name, c.description, c.parent_id, c.slug, c.is_active,
                c.display_order, c.created_at, c.updated_at
            FROM category c
            INNER JOIN ancestor a ON c.id = a.id
            WHERE a.depth > 0
            ORDER BY a.depth DESC;",
        )?
        .query_map((category_id, level_limit(max_levels)), map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Check whether `slug` is used by a category other than `excluding`.
pub fn slug_exists(
    slug: &Slug,
    excluding: Option<CategoryId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM category WHERE slug = ?1 AND id IS NOT ?2)",
        (slug.as_ref(), excluding),
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Point a category at a new parent.
pub fn set_parent(
    category_id: CategoryId,
    parent_id: Option<CategoryId>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
        (parent_id, now, category_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(category_id));
    }

    Ok(())
}

/// Move every direct child of `category_id` to `new_parent_id`, returning the moved IDs.
pub fn reparent_children(
    category_id: CategoryId,
    new_parent_id: Option<CategoryId>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Vec<CategoryId>, Error> {
    let children = connection
        .prepare("SELECT id FROM category WHERE parent_id = ?1 ORDER BY id ASC")?
        .query_map([category_id], |row| row.get(0))?
        .collect::<Result<Vec<CategoryId>, rusqlite::Error>>()?;

    connection.execute(
        "UPDATE category SET parent_id = ?1, updated_at = ?2 WHERE parent_id = ?3",
        (new_parent_id, now, category_id),
    )?;

    Ok(children)
}

/// Apply the changes in `update` to a category.
pub fn update_category(
    category_id: CategoryId,
    update: &CategoryUpdate,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let current = get_category(category_id, connection)?;

    let name: &CategoryName = update.name.as_ref().unwrap_or(&current.name);
    let description = match &update.description {
        Some(description) => description.as_deref(),
        None => current.description.as_deref(),
    };
    let slug: &Slug = update.slug.as_ref().unwrap_or(&current.slug);
    let display_order: DisplayOrder = update.display_order.unwrap_or(current.display_order);

    connection.execute(
        "UPDATE category
        SET name = ?1, description = ?2, slug = ?3, display_order = ?4, updated_at = ?5
        WHERE id = ?6",
        (
            name.as_ref(),
            description,
            slug.as_ref(),
            display_order.get(),
            now,
            category_id,
        ),
    )?;

    Ok(())
}

/// Set whether a category is active.
pub fn set_active(
    category_id: CategoryId,
    is_active: bool,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        (is_active, now, category_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(category_id));
    }

    Ok(())
}

/// Delete a single category row. The category must not have children.
pub fn delete_category_row(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(category_id));
    }

    Ok(())
}

/// Convert a level count into a query parameter, saturating at `i64::MAX`.
pub(crate) fn level_limit(max_levels: usize) -> i64 {
    i64::try_from(max_levels).unwrap_or(i64::MAX)
}

pub(crate) fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;
    let raw_slug: String = row.get(4)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        description: row.get(2)?,
        parent_id: row.get(3)?,
        slug: Slug::new_unchecked(&raw_slug),
        is_active: row.get(5)?,
        display_order: DisplayOrder::new_unchecked(row.get(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
