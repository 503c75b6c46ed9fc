//! Core category domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// Database identifier for a category.
pub type CategoryId = i64;

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;
const MAX_SLUG_LENGTH: usize = 120;
const MAX_DISPLAY_ORDER: u32 = 1000;

/// A validated category name.
///
/// Names are trimmed, 2-100 characters long and may only contain ASCII
/// letters, digits, spaces and hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidCategoryName] if `name` is
    /// too short, too long, has no letters or digits, or contains a character
    /// other than an ASCII alphanumeric, a space or a hyphen.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();
        let length = name.chars().count();

        if length < MIN_NAME_LENGTH {
            return Err(Error::InvalidCategoryName(
                name.to_owned(),
                "must be at least 2 characters long",
            ));
        }

        if length > MAX_NAME_LENGTH {
            return Err(Error::InvalidCategoryName(
                name.to_owned(),
                "must be at most 100 characters long",
            ));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(Error::InvalidCategoryName(
                name.to_owned(),
                "can only contain alphanumeric characters, spaces, and hyphens",
            ));
        }

        if !name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidCategoryName(
                name.to_owned(),
                "must contain at least one letter or digit",
            ));
        }

        Ok(Self(name.to_owned()))
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string satisfies the rules checked by [CategoryName::new].
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A URL-friendly, unique identifier for a category, e.g. "science-fiction".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Slug(String);

impl Slug {
    /// Create a slug.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidSlug] if `slug` is empty,
    /// longer than 120 characters or contains anything other than ASCII
    /// letters, digits, hyphens and underscores.
    pub fn new(slug: &str) -> Result<Self, Error> {
        let slug = slug.trim();

        let is_valid = !slug.is_empty()
            && slug.len() <= MAX_SLUG_LENGTH
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if is_valid {
            Ok(Self(slug.to_owned()))
        } else {
            Err(Error::InvalidSlug(slug.to_owned()))
        }
    }

    /// Derive a slug from a category name, e.g. "Science Fiction" -> "science-fiction".
    pub fn from_name(name: &CategoryName) -> Self {
        let slug = name
            .as_ref()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("-");

        Self(slug)
    }

    /// Create a slug without validation.
    pub fn new_unchecked(slug: &str) -> Self {
        Self(slug.to_owned())
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The position of a category among its siblings, between 0 and 1000.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct DisplayOrder(u32);

impl DisplayOrder {
    /// Create a display order.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDisplayOrder] if `order` is greater than 1000.
    pub fn new(order: u32) -> Result<Self, Error> {
        if order > MAX_DISPLAY_ORDER {
            Err(Error::InvalidDisplayOrder(order))
        } else {
            Ok(Self(order))
        }
    }

    /// Create a display order without validation.
    pub fn new_unchecked(order: u32) -> Self {
        Self(order)
    }

    /// The raw order value.
    pub fn get(self) -> u32 {
        self.0
    }
}

/// A node in the category forest, e.g. 'Fiction' or 'Science Fiction'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The display name.
    pub name: CategoryName,
    /// Free text describing what belongs in the category.
    pub description: Option<String>,
    /// The category this one is nested under, `None` for roots.
    pub parent_id: Option<CategoryId>,
    /// The unique, URL-friendly name.
    pub slug: Slug,
    /// Inactive categories are kept for history but hidden by clients.
    pub is_active: bool,
    /// Position among siblings.
    pub display_order: DisplayOrder,
    /// When the category was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the category was last modified, including moves.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Category {
    /// Start building a new category.
    ///
    /// Shortcut for [NewCategory] for discoverability.
    pub fn build(name: CategoryName) -> NewCategory {
        NewCategory {
            name,
            parent_id: None,
            description: None,
            slug: None,
            is_active: true,
            display_order: DisplayOrder::default(),
        }
    }
}

/// A category that has not been inserted yet.
///
/// Create one with [Category::build] and set the optional fields with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    /// The display name.
    pub name: CategoryName,
    /// The parent to nest the category under.
    pub parent_id: Option<CategoryId>,
    /// Free text description.
    pub description: Option<String>,
    /// The slug, derived from `name` when `None`.
    pub slug: Option<Slug>,
    /// Whether the category starts out active.
    pub is_active: bool,
    /// Position among siblings.
    pub display_order: DisplayOrder,
}

impl NewCategory {
    /// Nest the category under `parent_id`.
    pub fn parent(mut self, parent_id: CategoryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Use `slug` instead of deriving one from the name.
    pub fn slug(mut self, slug: Slug) -> Self {
        self.slug = Some(slug);
        self
    }

    /// Set the position among siblings.
    pub fn display_order(mut self, display_order: DisplayOrder) -> Self {
        self.display_order = display_order;
        self
    }

    /// Create the category as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// The slug that will be stored for this category.
    pub fn resolved_slug(&self) -> Slug {
        self.slug
            .clone()
            .unwrap_or_else(|| Slug::from_name(&self.name))
    }
}

/// Changes to a category's descriptive fields. `None` leaves a field unchanged.
///
/// Parent links are changed with `move_category` and the active flag with
/// `set_category_active`, since both carry tree invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
    /// The new name.
    pub name: Option<CategoryName>,
    /// The new description, `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// The new slug.
    pub slug: Option<Slug>,
    /// The new position among siblings.
    pub display_order: Option<DisplayOrder>,
}

/// What happens to the descendants of a deleted category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete the whole subtree along with every tag on it.
    Cascade,
    /// Move the direct children up to the deleted category's parent.
    Reparent,
}

impl Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletePolicy::Cascade => write!(f, "cascade"),
            DeletePolicy::Reparent => write!(f, "reparent"),
        }
    }
}

/// The outcome of deleting a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Every category that was removed, deepest first.
    pub deleted: Vec<CategoryId>,
    /// The children that were moved up a level.
    pub reparented: Vec<CategoryId>,
    /// How many book-category tags were removed.
    pub removed_tags: usize,
}

/// A category together with its nested subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    /// The category at this node.
    #[serde(flatten)]
    pub category: Category,
    /// The number of direct subcategories.
    pub subcategory_count: usize,
    /// The direct subcategories, ordered by display order then name.
    pub subcategories: Vec<CategoryNode>,
}
