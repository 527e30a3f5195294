//! Book catalog.

use super::PAGE_SIZE;
use crate::db::{Book, Database};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const MIN_TITLE_CHARS: usize = 3;
const MAX_FIELD_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 1000;

/// New catalog entry as submitted by a librarian.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookDraft {
    /// Title.
    pub title: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// Publication year.
    #[serde(default)]
    pub year: String,
    /// ISBN.
    #[serde(default)]
    pub isbn: String,
    /// Language.
    #[serde(default)]
    pub language: String,
    /// Page count.
    #[serde(default)]
    pub pages: i64,
    /// Genre.
    #[serde(default)]
    pub genre: String,
    /// Publisher.
    #[serde(default)]
    pub publisher: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

impl From<BookDraft> for Book {
    fn from(draft: BookDraft) -> Self {
        Book {
            id: 0,
            title: draft.title,
            author: draft.author,
            year: draft.year,
            isbn: draft.isbn,
            language: draft.language,
            pages: draft.pages,
            genre: draft.genre,
            publisher: draft.publisher,
            description: draft.description,
            photos: Vec::new(),
            created_at: 0,
        }
    }
}

/// Partial book update. Only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookPatch {
    /// Title.
    pub title: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Publication year.
    pub year: Option<String>,
    /// ISBN.
    pub isbn: Option<String>,
    /// Language.
    pub language: Option<String>,
    /// Page count.
    pub pages: Option<i64>,
    /// Genre.
    pub genre: Option<String>,
    /// Publisher.
    pub publisher: Option<String>,
    /// Description.
    pub description: Option<String>,
}

impl BookPatch {
    fn apply(self, book: &mut Book) {
        let text_fields = [
            (self.title, &mut book.title),
            (self.author, &mut book.author),
            (self.year, &mut book.year),
            (self.isbn, &mut book.isbn),
            (self.language, &mut book.language),
            (self.genre, &mut book.genre),
            (self.publisher, &mut book.publisher),
            (self.description, &mut book.description),
        ];
        for (value, slot) in text_fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(pages) = self.pages {
            book.pages = pages;
        }
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Books on this page.
    pub books: Vec<Book>,
    /// Whether later pages exist.
    pub has_more: bool,
}

/// A window of the catalog for infinite scrolling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scroll {
    /// Books in this window.
    pub books: Vec<Book>,
    /// Cursor for the next window.
    pub next_cursor: i64,
}

/// Parse a `page` query value; anything unusable means the first page.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .max(1)
}

fn validate_book(book: &Book) -> Result<()> {
    let title_len = book.title.chars().count();
    if !(MIN_TITLE_CHARS..=MAX_FIELD_CHARS).contains(&title_len) {
        return Err(AppError::Validation(format!(
            "Title must be {}-{} characters",
            MIN_TITLE_CHARS, MAX_FIELD_CHARS
        )));
    }

    let short_fields = [
        ("Author", &book.author),
        ("Year", &book.year),
        ("ISBN", &book.isbn),
        ("Language", &book.language),
        ("Genre", &book.genre),
        ("Publisher", &book.publisher),
    ];
    for (name, value) in short_fields {
        if value.chars().count() > MAX_FIELD_CHARS {
            return Err(AppError::Validation(format!(
                "{} must be at most {} characters",
                name, MAX_FIELD_CHARS
            )));
        }
    }

    if book.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }

    if book.pages < 0 {
        return Err(AppError::Validation(
            "Pages cannot be negative".to_string(),
        ));
    }

    Ok(())
}

/// Catalog service.
#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    /// Create a new catalog service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add a book to the catalog.
    pub fn create(&self, draft: BookDraft) -> Result<Book> {
        let book = Book::from(draft);
        validate_book(&book)?;

        let book = self.db.create_book(&book)?;
        tracing::info!(id = book.id, title = %book.title, "Created book");
        Ok(book)
    }

    /// Get book by ID.
    pub fn get(&self, id: i64) -> Result<Book> {
        self.db
            .get_book(id)?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// The whole catalog.
    pub fn list(&self) -> Result<Vec<Book>> {
        self.db.list_books()
    }

    /// Page `page` (1-based, clamped) of the catalog.
    pub fn page(&self, page: i64) -> Result<Page> {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(PAGE_SIZE);
        let books = self.db.list_books_page(offset, PAGE_SIZE)?;
        let total = self.db.count_books()?;

        Ok(Page {
            books,
            has_more: total > page.saturating_mul(PAGE_SIZE),
        })
    }

    /// Up to a page of books with id at least `cursor`.
    pub fn scroll(&self, cursor: i64) -> Result<Scroll> {
        if cursor < 0 {
            return Err(AppError::Validation("Invalid cursor".to_string()));
        }

        Ok(Scroll {
            books: self.db.list_books_from(cursor, PAGE_SIZE)?,
            next_cursor: cursor.saturating_add(PAGE_SIZE),
        })
    }

    /// Apply a partial update.
    pub fn update(&self, id: i64, patch: BookPatch) -> Result<Book> {
        let mut book = self.get(id)?;
        patch.apply(&mut book);
        validate_book(&book)?;

        if !self.db.update_book(&book)? {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        tracing::info!(id, title = %book.title, "Updated book");
        Ok(book)
    }

    /// Record the stored photo paths of a book.
    pub fn set_photos(&self, id: i64, photos: &[String]) -> Result<()> {
        if !self.db.set_book_photos(id, photos)? {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        Ok(())
    }

    /// Remove a book and return it.
    pub fn delete(&self, id: i64) -> Result<Book> {
        let book = self.get(id)?;
        if !self.db.delete_book(id)? {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        tracing::info!(id, title = %book.title, "Deleted book");
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("-4")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("3")), 3);
    }

    #[test]
    fn test_patch_applies_present_fields_only() {
        let mut book = Book {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            pages: 412,
            ..Default::default()
        };
        let patch: BookPatch =
            serde_json::from_str(r#"{"author": "F. Herbert", "unknown": 1}"#).unwrap();
        patch.apply(&mut book);

        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "F. Herbert");
        assert_eq!(book.pages, 412);
    }

    #[test]
    fn test_patch_type_mismatch_rejected() {
        let parsed = serde_json::from_str::<BookPatch>(r#"{"pages": "many"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_title_bounds() {
        let mut book = Book {
            title: "ab".to_string(),
            ..Default::default()
        };
        assert!(validate_book(&book).is_err());

        book.title = "abc".to_string();
        assert!(validate_book(&book).is_ok());

        book.title = "t".repeat(100);
        assert!(validate_book(&book).is_ok());

        book.title = "t".repeat(101);
        assert!(validate_book(&book).is_err());
    }

    #[test]
    fn test_long_description_rejected() {
        let book = Book {
            title: "Valid title".to_string(),
            description: "d".repeat(1001),
            ..Default::default()
        };
        assert!(validate_book(&book).is_err());
    }
}
