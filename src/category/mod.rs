//! The category forest: nested categories used to classify books.

mod db;
mod domain;
mod tree;

pub(crate) use db::{
    category_exists, count_children, create_category_table, delete_category_row,
    get_all_categories, get_ancestors, get_category, get_children, get_parent_id, get_subtree,
    has_active_children, insert_category, level_limit, map_category_row, reparent_children,
    set_active, set_parent, slug_exists, update_category,
};
pub use domain::{
    Category, CategoryId, CategoryName, CategoryNode, CategoryUpdate, DeletePolicy, DeleteReport,
    DisplayOrder, NewCategory, Slug,
};
pub(crate) use tree::{build_forest, build_subtree, flatten_descendants, format_path};
