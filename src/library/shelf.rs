//! Reading progress: books on a user's shelf.

use crate::db::{Database, Rank, ShelfEntry, UserBook};
use crate::error::{AppError, Result};
use serde::Serialize;

const MAX_GENRE_CHARS: usize = 100;

/// Result of putting a book on a shelf.
#[derive(Debug, Clone, Serialize)]
pub struct Shelved {
    /// The new shelf record.
    pub user_book: UserBook,
    /// The owner's rank after the addition.
    pub rank: Rank,
}

/// Shelf service.
#[derive(Debug, Clone)]
pub struct ShelfService {
    db: Database,
}

impl ShelfService {
    /// Create a new shelf service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn check_pages(pages_read: i64, book_pages: i64) -> Result<()> {
        if pages_read < 0 {
            return Err(AppError::Validation(
                "Pages read cannot be negative".to_string(),
            ));
        }
        if book_pages > 0 && pages_read > book_pages {
            return Err(AppError::Validation(format!(
                "Pages read cannot exceed the book's {} pages",
                book_pages
            )));
        }
        Ok(())
    }

    /// Recount the shelf and store the matching rank.
    pub fn refresh_rank(&self, user_id: i64) -> Result<Rank> {
        let rank = Rank::for_shelf_size(self.db.count_user_books(user_id)?);
        self.db.set_user_rank(user_id, rank)?;
        Ok(rank)
    }

    /// Put book `book_id` on the shelf of `user_id`.
    pub fn add(&self, user_id: i64, book_id: i64, pages_read: i64) -> Result<Shelved> {
        let book = self
            .db
            .get_book(book_id)?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
        Self::check_pages(pages_read, book.pages)?;

        let inserted = self.db.create_user_book(user_id, book_id, pages_read);
        let rank = self.refresh_rank(user_id)?;
        let user_book = inserted?;

        tracing::debug!(user_id, book_id, rank = %rank, "Shelved book");
        Ok(Shelved { user_book, rank })
    }

    /// The shelf of `user_id`.
    pub fn list(&self, user_id: i64) -> Result<Vec<ShelfEntry>> {
        self.db.get_shelf(user_id)
    }

    /// Load a shelf record that `actor` owns.
    fn owned(&self, actor: i64, id: i64) -> Result<UserBook> {
        let record = self
            .db
            .get_user_book(id)?
            .ok_or_else(|| AppError::NotFound("Book not found on shelf".to_string()))?;

        if record.user_id != actor {
            return Err(AppError::Auth(
                "This book belongs to another user's shelf".to_string(),
            ));
        }
        Ok(record)
    }

    /// Set the pages read on record `id`.
    pub fn update_pages(&self, actor: i64, id: i64, pages_read: i64) -> Result<UserBook> {
        let mut record = self.owned(actor, id)?;
        let book_pages = self
            .db
            .get_book(record.book_id)?
            .map(|b| b.pages)
            .unwrap_or(0);
        Self::check_pages(pages_read, book_pages)?;

        self.db.update_pages_read(id, pages_read)?;
        record.pages_read = pages_read;
        Ok(record)
    }

    /// Set or clear (with an empty string) the genre override on record `id`.
    pub fn update_genre(&self, actor: i64, id: i64, genre: &str) -> Result<UserBook> {
        let mut record = self.owned(actor, id)?;
        let genre = genre.trim();
        if genre.chars().count() > MAX_GENRE_CHARS {
            return Err(AppError::Validation(format!(
                "Genre must be at most {} characters",
                MAX_GENRE_CHARS
            )));
        }

        let genre = (!genre.is_empty()).then(|| genre.to_string());
        self.db.update_user_book_genre(id, genre.as_deref())?;
        record.genre = genre;
        Ok(record)
    }

    /// Take record `id` off the shelf.
    pub fn remove(&self, actor: i64, id: i64) -> Result<()> {
        self.owned(actor, id)?;
        if !self.db.delete_user_book(id)? {
            return Err(AppError::NotFound("Book not found on shelf".to_string()));
        }
        Ok(())
    }
}
