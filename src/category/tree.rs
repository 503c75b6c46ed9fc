//! Assembles flat category rows into nested trees.

use std::collections::HashMap;

use crate::category::{Category, CategoryId, CategoryNode};

/// Nest `categories` under their parents.
///
/// `categories` should already be sorted by display order then name; siblings
/// keep that order. Nodes deeper than `max_depth` are left out, and so is any
/// category whose parent is not in `categories`.
pub fn build_forest(categories: Vec<Category>, max_depth: usize) -> Vec<CategoryNode> {
    let mut children: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();

    for category in categories {
        children.entry(category.parent_id).or_default().push(category);
    }

    let roots = children.remove(&None).unwrap_or_default();

    roots
        .into_iter()
        .map(|root| build_node(root, &mut children, 1, max_depth))
        .collect()
}

/// Nest the subtree rooted at `root`, with `descendants` holding every other
/// category in the subtree in display order.
pub fn build_subtree(
    root: Category,
    descendants: Vec<Category>,
    max_depth: usize,
) -> CategoryNode {
    let mut children: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();

    for category in descendants {
        children.entry(category.parent_id).or_default().push(category);
    }

    build_node(root, &mut children, 1, max_depth)
}

fn build_node(
    category: Category,
    children: &mut HashMap<Option<CategoryId>, Vec<Category>>,
    depth: usize,
    max_depth: usize,
) -> CategoryNode {
    let direct_children = children.remove(&Some(category.id)).unwrap_or_default();
    let subcategory_count = direct_children.len();

    let subcategories = if depth < max_depth {
        direct_children
            .into_iter()
            .map(|child| build_node(child, children, depth + 1, max_depth))
            .collect()
    } else {
        Vec::new()
    };

    CategoryNode {
        category,
        subcategory_count,
        subcategories,
    }
}

/// Flatten a subtree in pre-order, excluding the root.
pub fn flatten_descendants(node: CategoryNode) -> Vec<Category> {
    let mut result = Vec::new();
    push_pre_order(node.subcategories, &mut result);
    result
}

fn push_pre_order(nodes: Vec<CategoryNode>, result: &mut Vec<Category>) {
    for node in nodes {
        result.push(node.category);
        push_pre_order(node.subcategories, result);
    }
}

/// Join the names along a path, e.g. "Fiction > Science Fiction > Space Opera".
pub fn format_path<'a>(path: impl IntoIterator<Item = &'a Category>) -> String {
    path.into_iter()
        .map(|category| category.name.as_ref())
        .collect::<Vec<_>>()
        .join(" > ")
}
