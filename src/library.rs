mod catalog;
mod shelf;

pub use catalog::{BookDraft, BookPatch, CatalogService, Page, Scroll, parse_page};
pub use shelf::{ShelfService, Shelved};

/// Books per page for pagination and scrolling.
pub const PAGE_SIZE: i64 = 5;
