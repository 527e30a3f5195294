use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl ToSql for Rank {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Rank {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for FriendStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for FriendStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

const USER_COLUMNS: &str =
    "id, name, real_name, email, password_hash, rank, librarian, admin, profile_pic, created_at";

const BOOK_COLUMNS: &str =
    "id, title, author, year, isbn, language, pages, genre, publisher, description, photos_json, created_at";

const FRIEND_COLUMNS: &str =
    "id, sender_id, sender_name, receiver_id, receiver_name, status, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        real_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        rank: row.get(5)?,
        librarian: row.get(6)?,
        admin: row.get(7)?,
        profile_pic: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Reads the book columns starting at `offset`.
fn book_from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Book> {
    let photos_json: String = row.get(offset + 10)?;
    let photos = serde_json::from_str(&photos_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 10, Type::Text, Box::new(e))
    })?;
    Ok(Book {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        author: row.get(offset + 2)?,
        year: row.get(offset + 3)?,
        isbn: row.get(offset + 4)?,
        language: row.get(offset + 5)?,
        pages: row.get(offset + 6)?,
        genre: row.get(offset + 7)?,
        publisher: row.get(offset + 8)?,
        description: row.get(offset + 9)?,
        photos,
        created_at: row.get(offset + 11)?,
    })
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    book_from_row_at(row, 0)
}

fn user_book_from_row(row: &Row<'_>) -> rusqlite::Result<UserBook> {
    Ok(UserBook {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        pages_read: row.get(3)?,
        genre: row.get(4)?,
    })
}

fn friend_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequest> {
    Ok(FriendRequest {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        receiver_id: row.get(3)?,
        receiver_name: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn photos_to_json(photos: &[String]) -> String {
    serde_json::to_string(photos).unwrap_or_else(|_| "[]".to_string())
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                real_name TEXT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                rank TEXT NOT NULL DEFAULT 'Bronze',
                librarian INTEGER NOT NULL DEFAULT 0,
                admin INTEGER NOT NULL DEFAULT 0,
                profile_pic TEXT,
                created_at INTEGER NOT NULL
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT UNIQUE NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                isbn TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                pages INTEGER NOT NULL DEFAULT 0,
                genre TEXT NOT NULL DEFAULT '',
                publisher TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                photos_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );

            -- Shelf records
            CREATE TABLE IF NOT EXISTS user_books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                pages_read INTEGER NOT NULL DEFAULT 0,
                genre TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Friend requests, one row per unordered pair
            CREATE TABLE IF NOT EXISTS friend_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                sender_name TEXT NOT NULL,
                receiver_id INTEGER NOT NULL,
                receiver_name TEXT NOT NULL,
                user_low INTEGER NOT NULL,
                user_high INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                CHECK (sender_id <> receiver_id),
                UNIQUE (user_low, user_high),
                FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (receiver_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_user_books_user ON user_books(user_id);
            CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver ON friend_requests(receiver_id, status);
            CREATE INDEX IF NOT EXISTS idx_friend_requests_sender ON friend_requests(sender_id, status);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn.lock();
        let created_at = now_timestamp();
        conn.execute(
            "INSERT INTO users (name, real_name, email, password_hash, rank, librarian, admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.name,
                user.real_name,
                user.email,
                user.password_hash,
                Rank::Bronze,
                user.librarian,
                user.admin,
                created_at,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("User already exists".to_string())
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            name: user.name.clone(),
            real_name: user.real_name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            rank: Rank::Bronze,
            librarian: user.librarian,
            admin: user.admin,
            profile_pic: None,
            created_at,
        })
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by login name.
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE name = ?1", USER_COLUMNS),
            params![name],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], user_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Save every mutable user column. Friend requests pick up a new name.
    pub fn update_user(&self, user: &User) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let rows = tx
            .execute(
                "UPDATE users SET name = ?1, real_name = ?2, email = ?3, password_hash = ?4,
                    rank = ?5, librarian = ?6, admin = ?7, profile_pic = ?8
                 WHERE id = ?9",
                params![
                    user.name,
                    user.real_name,
                    user.email,
                    user.password_hash,
                    user.rank,
                    user.librarian,
                    user.admin,
                    user.profile_pic,
                    user.id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Name or email already in use".to_string())
                } else {
                    AppError::Internal(format!("Failed to update user: {}", e))
                }
            })?;

        tx.execute(
            "UPDATE friend_requests SET sender_name = ?1 WHERE sender_id = ?2",
            params![user.name, user.id],
        )
        .and_then(|_| {
            tx.execute(
                "UPDATE friend_requests SET receiver_name = ?1 WHERE receiver_id = ?2",
                params![user.name, user.id],
            )
        })
        .map_err(|e| AppError::Internal(format!("Failed to refresh friend names: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit user update: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user rank.
    pub fn set_user_rank(&self, id: i64, rank: Rank) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET rank = ?1 WHERE id = ?2",
                params![rank, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update rank: {}", e)))?;
        Ok(rows > 0)
    }

    /// Set or clear the profile photo path.
    pub fn set_profile_pic(&self, id: i64, path: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET profile_pic = ?1 WHERE id = ?2",
                params![path, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update profile photo: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete user by ID.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a book; the `id` field of `book` is ignored.
    pub fn create_book(&self, book: &Book) -> Result<Book> {
        let conn = self.conn.lock();
        let created_at = now_timestamp();
        conn.execute(
            "INSERT INTO books (title, author, year, isbn, language, pages, genre, publisher,
                description, photos_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                book.title,
                book.author,
                book.year,
                book.isbn,
                book.language,
                book.pages,
                book.genre,
                book.publisher,
                book.description,
                photos_to_json(&book.photos),
                created_at,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Book already exists".to_string())
            } else {
                AppError::Internal(format!("Failed to create book: {}", e))
            }
        })?;

        Ok(Book {
            id: conn.last_insert_rowid(),
            created_at,
            ..book.clone()
        })
    }

    /// Get book by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    fn query_books(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(args, book_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// List the whole catalog.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        self.query_books(
            &format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS),
            [],
        )
    }

    /// List `limit` books after skipping `offset`, in id order.
    pub fn list_books_page(&self, offset: i64, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books ORDER BY id LIMIT ?1 OFFSET ?2",
                BOOK_COLUMNS
            ),
            params![limit, offset],
        )
    }

    /// List up to `limit` books whose id is at least `from_id`.
    pub fn list_books_from(&self, from_id: i64, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books WHERE id >= ?1 ORDER BY id LIMIT ?2",
                BOOK_COLUMNS
            ),
            params![from_id, limit],
        )
    }

    /// Count catalog entries.
    pub fn count_books(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))
    }

    /// Save every book column.
    pub fn update_book(&self, book: &Book) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET title = ?1, author = ?2, year = ?3, isbn = ?4, language = ?5,
                    pages = ?6, genre = ?7, publisher = ?8, description = ?9, photos_json = ?10
                 WHERE id = ?11",
                params![
                    book.title,
                    book.author,
                    book.year,
                    book.isbn,
                    book.language,
                    book.pages,
                    book.genre,
                    book.publisher,
                    book.description,
                    photos_to_json(&book.photos),
                    book.id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Book already exists".to_string())
                } else {
                    AppError::Internal(format!("Failed to update book: {}", e))
                }
            })?;
        Ok(rows > 0)
    }

    /// Replace the stored photo list.
    pub fn set_book_photos(&self, id: i64, photos: &[String]) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET photos_json = ?1 WHERE id = ?2",
                params![photos_to_json(photos), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book photos: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete book.
    pub fn delete_book(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SHELF OPERATIONS ==========

    /// Put a book on a user's shelf.
    pub fn create_user_book(&self, user_id: i64, book_id: i64, pages_read: i64) -> Result<UserBook> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_books (user_id, book_id, pages_read, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, book_id, pages_read, now_timestamp()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("You already have this book".to_string())
            } else {
                AppError::Internal(format!("Failed to add book to shelf: {}", e))
            }
        })?;

        Ok(UserBook {
            id: conn.last_insert_rowid(),
            user_id,
            book_id,
            pages_read,
            genre: None,
        })
    }

    /// Get shelf record by ID.
    pub fn get_user_book(&self, id: i64) -> Result<Option<UserBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, pages_read, genre FROM user_books WHERE id = ?1",
            params![id],
            user_book_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get shelf record: {}", e)))
    }

    /// Count books on a user's shelf.
    pub fn count_user_books(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM user_books WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count shelf: {}", e)))
    }

    /// Update pages read.
    pub fn update_pages_read(&self, id: i64, pages_read: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE user_books SET pages_read = ?1 WHERE id = ?2",
                params![pages_read, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update pages read: {}", e)))?;
        Ok(rows > 0)
    }

    /// Set or clear the per-user genre override.
    pub fn update_user_book_genre(&self, id: i64, genre: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE user_books SET genre = ?1 WHERE id = ?2",
                params![genre, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update genre: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete shelf record.
    pub fn delete_user_book(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM user_books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete shelf record: {}", e)))?;
        Ok(rows > 0)
    }

    /// A user's shelf joined with the catalog, in shelving order.
    pub fn get_shelf(&self, user_id: i64) -> Result<Vec<ShelfEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT ub.id, ub.user_id, ub.book_id, ub.pages_read, ub.genre,
                        b.id, b.title, b.author, b.year, b.isbn, b.language, b.pages, b.genre,
                        b.publisher, b.description, b.photos_json, b.created_at
                 FROM user_books ub
                 JOIN books b ON b.id = ub.book_id
                 WHERE ub.user_id = ?1
                 ORDER BY ub.id",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map(params![user_id], |row| {
                let record = user_book_from_row(row)?;
                let book = book_from_row_at(row, 5)?;
                Ok(ShelfEntry::project(&record, &book))
            })
            .map_err(|e| AppError::Internal(format!("Failed to get shelf: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect shelf: {}", e)))?;

        Ok(entries)
    }

    // ========== FRIEND OPERATIONS ==========

    /// Store a pending request from `sender` to `receiver`.
    pub fn create_friend_request(&self, sender: &User, receiver: &User) -> Result<FriendRequest> {
        let conn = self.conn.lock();
        let created_at = now_timestamp();
        conn.execute(
            "INSERT INTO friend_requests
             (sender_id, sender_name, receiver_id, receiver_name, user_low, user_high, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                sender.id,
                sender.name,
                receiver.id,
                receiver.name,
                sender.id.min(receiver.id),
                sender.id.max(receiver.id),
                FriendStatus::Pending,
                created_at,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(
                    "A friend request is already pending, or you are already friends with this user"
                        .to_string(),
                )
            } else {
                AppError::Internal(format!("Failed to create friend request: {}", e))
            }
        })?;

        Ok(FriendRequest {
            id: conn.last_insert_rowid(),
            sender_id: sender.id,
            sender_name: sender.name.clone(),
            receiver_id: receiver.id,
            receiver_name: receiver.name.clone(),
            status: FriendStatus::Pending,
            created_at,
        })
    }

    /// The pending request between two users, in either direction.
    pub fn get_pending_between(&self, a: i64, b: i64) -> Result<Option<FriendRequest>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM friend_requests
                 WHERE user_low = ?1 AND user_high = ?2 AND status = ?3",
                FRIEND_COLUMNS
            ),
            params![a.min(b), a.max(b), FriendStatus::Pending],
            friend_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get friend request: {}", e)))
    }

    /// Mark a request as accepted.
    pub fn accept_friend_request(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE friend_requests SET status = ?1 WHERE id = ?2",
                params![FriendStatus::Accepted, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to accept friend request: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete the pending request sent by `sender_id` to `receiver_id`.
    pub fn delete_pending_request(&self, sender_id: i64, receiver_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM friend_requests
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND status = ?3",
                params![sender_id, receiver_id, FriendStatus::Pending],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete friend request: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete whatever request links two users.
    pub fn delete_requests_between(&self, a: i64, b: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM friend_requests WHERE user_low = ?1 AND user_high = ?2",
                params![a.min(b), a.max(b)],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete friend request: {}", e)))?;
        Ok(rows > 0)
    }

    fn query_friend_requests(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<FriendRequest>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let requests = stmt
            .query_map(args, friend_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list friend requests: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect friend requests: {}", e)))?;

        Ok(requests)
    }

    /// Pending requests addressed to a user.
    pub fn list_incoming_pending(&self, user_id: i64) -> Result<Vec<FriendRequest>> {
        self.query_friend_requests(
            &format!(
                "SELECT {} FROM friend_requests WHERE receiver_id = ?1 AND status = ?2 ORDER BY id",
                FRIEND_COLUMNS
            ),
            params![user_id, FriendStatus::Pending],
        )
    }

    /// Accepted requests in which a user takes part.
    pub fn list_accepted(&self, user_id: i64) -> Result<Vec<FriendRequest>> {
        self.query_friend_requests(
            &format!(
                "SELECT {} FROM friend_requests
                 WHERE (sender_id = ?1 OR receiver_id = ?1) AND status = ?2 ORDER BY id",
                FRIEND_COLUMNS
            ),
            params![user_id, FriendStatus::Accepted],
        )
    }

    /// Every stored request.
    pub fn list_friend_requests(&self) -> Result<Vec<FriendRequest>> {
        self.query_friend_requests(
            &format!("SELECT {} FROM friend_requests ORDER BY id", FRIEND_COLUMNS),
            [],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, name: &str) -> User {
        db.create_user(&NewUser {
            name: name.to_string(),
            real_name: None,
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            librarian: false,
            admin: false,
        })
        .unwrap()
    }

    #[test]
    fn test_book_created_at_round_trip() {
        let db = Database::open_memory().unwrap();
        let book = db
            .create_book(&Book {
                title: "Dune".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(book.created_at > 0);

        let loaded = db.get_book(book.id).unwrap().unwrap();
        assert_eq!(loaded.created_at, book.created_at);
    }

    #[test]
    fn test_corrupt_photos_column_is_an_error() {
        let db = Database::open_memory().unwrap();
        let book = db
            .create_book(&Book {
                title: "Dune".to_string(),
                ..Default::default()
            })
            .unwrap();
        db.conn
            .lock()
            .execute(
                "UPDATE books SET photos_json = 'not json' WHERE id = ?1",
                params![book.id],
            )
            .unwrap();

        assert!(matches!(db.get_book(book.id), Err(AppError::Internal(_))));
        assert!(matches!(db.list_books(), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_only_unique_violations_conflict() {
        let db = Database::open_memory().unwrap();
        let alice = user(&db, "alice");

        // Self request trips the CHECK constraint, not UNIQUE.
        assert!(matches!(
            db.create_friend_request(&alice, &alice),
            Err(AppError::Internal(_))
        ));

        let err = db
            .conn
            .lock()
            .execute(
                "INSERT INTO users (name, email, password_hash, created_at)
                 VALUES ('alice', 'other@example.com', 'hash', 0)",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
