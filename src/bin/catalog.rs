use std::{error::Error, process::ExitCode};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, macros::format_description};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use book_catalog::{
    AuthorId, Book, BookId, Catalog, CatalogConfig, Category, CategoryId, CategoryName,
    DEFAULT_MAX_DEPTH, DeletePolicy, Error as CatalogError, Isbn, NewAuthor, RelevanceScore, Slug,
    TagMetadata,
};

/// Exit code used when the command refers to a record that does not exist.
const EXIT_NOT_FOUND: u8 = 2;

/// A command line tool for managing the book catalog's categories and tags.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path of the SQLite database.
    #[arg(long, short, env = "CATALOG_DB_PATH", default_value = "catalog.db")]
    db_path: String,

    /// The deepest a category may sit in its tree, counting roots as depth 1.
    #[arg(long, env = "CATALOG_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// What happens to subcategories when `delete-category` is not given a policy.
    #[arg(long, value_enum, env = "CATALOG_DELETE_POLICY", default_value_t = DeletePolicy::Reparent)]
    delete_policy: DeletePolicy,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database tables.
    Init,

    /// Create a category.
    AddCategory {
        /// The category's name.
        name: String,
        /// The ID of the category to nest it under.
        #[arg(long)]
        parent: Option<CategoryId>,
        /// A description of what belongs in the category.
        #[arg(long)]
        description: Option<String>,
        /// A custom slug, derived from the name if omitted.
        #[arg(long)]
        slug: Option<String>,
    },

    /// Move a category under another one, or make it a root.
    MoveCategory {
        /// The category to move.
        id: CategoryId,
        /// The new parent. The category becomes a root if omitted.
        #[arg(long)]
        parent: Option<CategoryId>,
    },

    /// Delete a category.
    DeleteCategory {
        /// The category to delete.
        id: CategoryId,
        /// What happens to its subcategories.
        #[arg(long, value_enum)]
        policy: Option<DeletePolicy>,
    },

    /// Print the category forest, or the subtree under one category, as JSON.
    Tree {
        /// Only print the subtree rooted at this category.
        #[arg(long)]
        root: Option<CategoryId>,
    },

    /// Add a book.
    AddBook {
        /// The title.
        #[arg(long)]
        title: String,
        /// The author.
        #[arg(long)]
        author: String,
        /// The publication date as YYYY-MM-DD.
        #[arg(long)]
        published: String,
        /// The 13 digit ISBN.
        #[arg(long)]
        isbn: String,
        /// The genre.
        #[arg(long)]
        genre: String,
    },

    /// Add an author.
    AddAuthor {
        /// The author's name.
        name: String,
        /// A short biography.
        #[arg(long)]
        biography: Option<String>,
        /// The date of birth as YYYY-MM-DD.
        #[arg(long)]
        born: Option<String>,
    },

    /// Credit an author on a book.
    Credit {
        /// The book to credit.
        book_id: BookId,
        /// The author to credit.
        author_id: AuthorId,
    },

    /// Tag a book with a category.
    Tag {
        /// The book to tag.
        book_id: BookId,
        /// The category to tag it with.
        category_id: CategoryId,
        /// Make this the book's primary category.
        #[arg(long)]
        primary: bool,
        /// How relevant the category is to the book, from 0 to 10.
        #[arg(long)]
        relevance: Option<f64>,
    },

    /// Remove a tag from a book.
    Untag {
        /// The tagged book.
        book_id: BookId,
        /// The category to remove.
        category_id: CategoryId,
    },

    /// List the books tagged with a category.
    Books {
        /// The category to list.
        category_id: CategoryId,
        /// Include books tagged with any subcategory.
        #[arg(long)]
        descendants: bool,
    },
}

fn main() -> ExitCode {
    setup_logging();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");

            match error.downcast_ref::<CatalogError>() {
                Some(error) if error.is_not_found() => ExitCode::from(EXIT_NOT_FOUND),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = CatalogConfig {
        max_depth: args.max_depth,
        delete_policy: args.delete_policy,
    };

    let connection = Connection::open(&args.db_path)?;
    let catalog = Catalog::new(connection, config)?;

    match args.command {
        Command::Init => {
            tracing::info!("initialized database at {}", args.db_path);
        }
        Command::AddCategory {
            name,
            parent,
            description,
            slug,
        } => {
            let mut new_category = Category::build(CategoryName::new(&name)?);
            new_category.parent_id = parent;
            new_category.description = description;
            new_category.slug = slug.as_deref().map(Slug::new).transpose()?;

            print_json(&catalog.create_category(new_category)?)?;
        }
        Command::MoveCategory { id, parent } => {
            print_json(&catalog.move_category(id, parent)?)?;
        }
        Command::DeleteCategory { id, policy } => {
            let policy = policy.unwrap_or(catalog.config().delete_policy);
            print_json(&catalog.delete_category(id, policy)?)?;
        }
        Command::Tree { root: Some(root) } => {
            print_json(&catalog.get_category_tree(root)?)?;
        }
        Command::Tree { root: None } => {
            print_json(&catalog.category_tree()?)?;
        }
        Command::AddBook {
            title,
            author,
            published,
            isbn,
            genre,
        } => {
            let published_date = parse_date(&published)?;
            let new_book = Book::build(&title, &author, published_date, Isbn::new(&isbn)?).genre(&genre);

            print_json(&catalog.create_book(new_book)?)?;
        }
        Command::AddAuthor {
            name,
            biography,
            born,
        } => {
            let new_author = NewAuthor {
                name,
                biography,
                birth_date: born.as_deref().map(parse_date).transpose()?,
            };

            print_json(&catalog.create_author(new_author)?)?;
        }
        Command::Credit { book_id, author_id } => {
            catalog.add_book_author(book_id, author_id)?;
            print_json(&catalog.author_names(book_id)?)?;
        }
        Command::Tag {
            book_id,
            category_id,
            primary,
            relevance,
        } => {
            let metadata = TagMetadata {
                relevance_score: relevance
                    .map(RelevanceScore::new)
                    .transpose()?
                    .unwrap_or_default(),
                is_primary: primary,
            };

            print_json(&catalog.tag(book_id, category_id, metadata)?)?;
        }
        Command::Untag {
            book_id,
            category_id,
        } => {
            catalog.untag(book_id, category_id)?;
        }
        Command::Books {
            category_id,
            descendants,
        } => {
            print_json(&catalog.list_books_for_category(category_id, descendants)?)?;
        }
    }

    Ok(())
}

fn parse_date(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_log)
        .init();
}
