//! Core book domain types.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, publisher::PublisherId};

/// Database identifier for a book.
pub type BookId = i64;

const LONG_BOOK_PAGES: u32 = 500;

/// A 13 digit International Standard Book Number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Isbn(String);

impl Isbn {
    /// Create an ISBN, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidIsbn] unless `isbn` is exactly 13 ASCII digits.
    pub fn new(isbn: &str) -> Result<Self, Error> {
        let isbn = isbn.trim();

        if isbn.len() == 13 && isbn.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(isbn.to_owned()))
        } else {
            Err(Error::InvalidIsbn(isbn.to_owned()))
        }
    }

    /// Create an ISBN without validation.
    pub fn new_unchecked(isbn: &str) -> Self {
        Self(isbn.to_owned())
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The language a book is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    /// English
    #[default]
    En,
    /// French
    Fr,
    /// Spanish
    Es,
    /// German
    De,
    /// Chinese
    Zh,
    /// Japanese
    Ja,
    /// Arabic
    Ar,
}

impl Language {
    /// The two letter code stored in the database, e.g. "EN".
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Fr => "FR",
            Language::Es => "ES",
            Language::De => "DE",
            Language::Zh => "ZH",
            Language::Ja => "JA",
            Language::Ar => "AR",
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EN" => Ok(Language::En),
            "FR" => Ok(Language::Fr),
            "ES" => Ok(Language::Es),
            "DE" => Ok(Language::De),
            "ZH" => Ok(Language::Zh),
            "JA" => Ok(Language::Ja),
            "AR" => Ok(Language::Ar),
            _ => Err(Error::InvalidBook("unknown language code")),
        }
    }
}

impl ToSql for Language {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Language {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A book in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// The ID of the book.
    pub id: BookId,
    /// The title, unique together with `author`.
    pub title: String,
    /// The author as displayed on the cover.
    pub author: String,
    /// The date the book was first published.
    pub published_date: Date,
    /// The unique 13 digit ISBN.
    pub isbn: Isbn,
    /// A free text genre, e.g. "Fantasy".
    pub genre: String,
    /// A short summary of the plot or content.
    pub summary: Option<String>,
    /// The publisher, if known.
    pub publisher_id: Option<PublisherId>,
    /// The number of pages, at least 1.
    pub page_count: Option<u32>,
    /// The language the book is written in.
    pub language: Language,
    /// The price, never negative.
    pub price: Option<f64>,
    /// The average rating between 0 and 5.
    pub rating: Option<f64>,
    /// Whether the book is marked as a bestseller.
    pub is_bestseller: bool,
}

impl Book {
    /// Start building a new book.
    ///
    /// Shortcut for [NewBook] for discoverability.
    pub fn build(title: &str, author: &str, published_date: Date, isbn: Isbn) -> NewBook {
        NewBook {
            title: title.to_owned(),
            author: author.to_owned(),
            published_date,
            isbn,
            genre: String::new(),
            summary: None,
            publisher_id: None,
            page_count: None,
            language: Language::default(),
            price: None,
            rating: None,
            is_bestseller: false,
        }
    }

    /// Whether the book has more than 500 pages.
    pub fn is_long_book(&self) -> bool {
        self.page_count.is_some_and(|pages| pages > LONG_BOOK_PAGES)
    }
}

/// A book that has not been inserted yet.
///
/// Create one with [Book::build] and set the optional fields with the builder methods.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    /// The title.
    pub title: String,
    /// The author.
    pub author: String,
    /// The publication date.
    pub published_date: Date,
    /// The ISBN.
    pub isbn: Isbn,
    /// The genre, must not be blank.
    pub genre: String,
    /// A short summary.
    pub summary: Option<String>,
    /// The publisher.
    pub publisher_id: Option<PublisherId>,
    /// The number of pages.
    pub page_count: Option<u32>,
    /// The language.
    pub language: Language,
    /// The price.
    pub price: Option<f64>,
    /// The rating.
    pub rating: Option<f64>,
    /// Whether the book is a bestseller.
    pub is_bestseller: bool,
}

impl NewBook {
    /// Set the genre.
    pub fn genre(mut self, genre: &str) -> Self {
        self.genre = genre.to_owned();
        self
    }

    /// Set the summary.
    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_owned());
        self
    }

    /// Set the publisher.
    pub fn publisher(mut self, publisher_id: PublisherId) -> Self {
        self.publisher_id = Some(publisher_id);
        self
    }

    /// Set the page count.
    pub fn page_count(mut self, page_count: u32) -> Self {
        self.page_count = Some(page_count);
        self
    }

    /// Set the language.
    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the price.
    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Set the rating.
    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Mark the book as a bestseller.
    pub fn bestseller(mut self) -> Self {
        self.is_bestseller = true;
        self
    }

    /// Check the field level rules that do not need the database.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmptyField] for a blank title, author or genre and
    /// [Error::InvalidBook] for an out of range page count, price or rating.
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::EmptyField("title"));
        }

        if self.author.trim().is_empty() {
            return Err(Error::EmptyField("author"));
        }

        if self.genre.trim().is_empty() {
            return Err(Error::EmptyField("genre"));
        }

        if self.page_count == Some(0) {
            return Err(Error::InvalidBook("page count must be at least 1"));
        }

        if self
            .price
            .is_some_and(|price| !price.is_finite() || price < 0.0)
        {
            return Err(Error::InvalidBook("price cannot be negative"));
        }

        if self
            .rating
            .is_some_and(|rating| !(0.0..=5.0).contains(&rating))
        {
            return Err(Error::InvalidBook("rating must be between 0 and 5"));
        }

        Ok(())
    }
}
