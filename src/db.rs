mod schema;

pub use schema::Database;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reader rank derived from the size of a user's shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    /// Fewer than ten books.
    Bronze,
    /// Ten to twenty books, both inclusive.
    Silver,
    /// More than twenty books.
    Gold,
}

impl Rank {
    /// Rank for a shelf holding `books` entries.
    pub fn for_shelf_size(books: i64) -> Self {
        match books {
            i64::MIN..=9 => Rank::Bronze,
            10..=20 => Rank::Silver,
            _ => Rank::Gold,
        }
    }

    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Bronze => "Bronze",
            Rank::Silver => "Silver",
            Rank::Gold => "Gold",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Bronze" => Ok(Rank::Bronze),
            "Silver" => Ok(Rank::Silver),
            "Gold" => Ok(Rank::Gold),
            other => Err(format!("unknown rank '{}'", other)),
        }
    }
}

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login name.
    pub name: String,
    /// Display name.
    pub real_name: Option<String>,
    /// Email address.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Reader rank.
    pub rank: Rank,
    /// May manage the catalog.
    pub librarian: bool,
    /// May manage users.
    pub admin: bool,
    /// Path of the stored profile photo.
    pub profile_pic: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// New account, before it has an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login name.
    pub name: String,
    /// Display name.
    pub real_name: Option<String>,
    /// Email address.
    pub email: String,
    /// Argon2 password hash.
    pub password_hash: String,
    /// May manage the catalog.
    pub librarian: bool,
    /// May manage users.
    pub admin: bool,
}

/// Catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Book ID.
    pub id: i64,
    /// Title, unique across the catalog.
    pub title: String,
    /// Author.
    pub author: String,
    /// Publication year.
    pub year: String,
    /// ISBN.
    pub isbn: String,
    /// Language.
    pub language: String,
    /// Page count (0 when unknown).
    pub pages: i64,
    /// Genre.
    pub genre: String,
    /// Publisher.
    pub publisher: String,
    /// Description.
    pub description: String,
    /// Stored photo paths, in display order.
    pub photos: Vec<String>,
    /// Catalog insertion timestamp.
    pub created_at: i64,
}

/// A book on a user's shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBook {
    /// Record ID.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Shelved book.
    pub book_id: i64,
    /// Pages read so far.
    pub pages_read: i64,
    /// Per-user genre override.
    pub genre: Option<String>,
}

/// Shelf record joined with its book, as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfEntry {
    /// UserBook record ID.
    pub user_book_id: i64,
    /// Book ID.
    pub book_id: i64,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Publication year.
    pub year: String,
    /// ISBN.
    pub isbn: String,
    /// Language.
    pub language: String,
    /// Page count.
    pub pages: i64,
    /// Pages read so far.
    pub pages_read: i64,
    /// Effective genre (user override, else catalog genre).
    pub genre: String,
    /// Publisher.
    pub publisher: String,
    /// Description.
    pub description: String,
    /// Stored photo paths.
    pub photos: Vec<String>,
}

impl ShelfEntry {
    /// Assemble the client view of a shelf record.
    pub fn project(record: &UserBook, book: &Book) -> Self {
        Self {
            user_book_id: record.id,
            book_id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year.clone(),
            isbn: book.isbn.clone(),
            language: book.language.clone(),
            pages: book.pages,
            pages_read: record.pages_read,
            genre: record.genre.clone().unwrap_or_else(|| book.genre.clone()),
            publisher: book.publisher.clone(),
            description: book.description.clone(),
            photos: book.photos.clone(),
        }
    }
}

/// Friend request state. Rejected requests are deleted, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    /// Waiting for the receiver.
    Pending,
    /// Both users are friends.
    Accepted,
}

impl FriendStatus {
    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for FriendStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FriendStatus::Pending),
            "accepted" => Ok(FriendStatus::Accepted),
            other => Err(format!("unknown friend status '{}'", other)),
        }
    }
}

/// Directed friend request between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Request ID.
    pub id: i64,
    /// Sending user.
    pub sender_id: i64,
    /// Sender name at send time (refreshed on rename).
    pub sender_name: String,
    /// Receiving user.
    pub receiver_id: i64,
    /// Receiver name.
    pub receiver_name: String,
    /// Current state.
    pub status: FriendStatus,
    /// Creation timestamp.
    pub created_at: i64,
}

impl FriendRequest {
    /// The party of this request that is not `user_id`.
    pub fn other_party(&self, user_id: i64) -> Friend {
        if self.sender_id == user_id {
            Friend {
                id: self.receiver_id,
                name: self.receiver_name.clone(),
            }
        } else {
            Friend {
                id: self.sender_id,
                name: self.sender_name.clone(),
            }
        }
    }
}

/// Id/name pair shown in friend lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    /// User ID.
    pub id: i64,
    /// User name.
    pub name: String,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}
