//! HTTP request handlers.

use crate::accounts::{Profile, Registration, UserPatch};
use crate::auth::AuthService;
use crate::db::{Book, Friend, FriendRequest, ShelfEntry, User, UserBook};
use crate::error::{AppError, Result};
use crate::library::{BookDraft, BookPatch, Page, Scroll, Shelved, parse_page};
use crate::server::AppState;
use crate::server::extract::{EntityId, Form, Params, Payload, single_file};
use crate::server::middleware::CurrentUser;
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Field holding an uploaded profile photo.
const PROFILE_PHOTO_FIELD: &str = "profile_pic";
/// Field holding an uploaded book photo.
const BOOK_PHOTO_FIELD: &str = "photos";

/// JSON envelope wrapping every response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Payload or status message.
    pub data: T,
}

type ApiResult<T> = Result<Json<Envelope<T>>>;

fn data<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data })
}

fn message(text: &str) -> Json<Envelope<String>> {
    data(text.to_string())
}

async fn serve_photo(state: &AppState, path: &str) -> Result<Response> {
    let (bytes, mime) = state.photos.read(&PathBuf::from(path)).await?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// Remove stored files, logging rather than failing.
async fn discard_photos(state: &AppState, paths: &[String]) {
    for path in paths {
        if let Err(e) = state.photos.remove(&PathBuf::from(path)).await {
            tracing::warn!(path = %path, error = %e, "Failed to remove photo");
        }
    }
}

// ============================================================================
// USERS
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    name: String,
    password: String,
}

/// Register a new account.
pub async fn register(
    State(state): State<AppState>,
    Payload(req): Payload<Registration>,
) -> ApiResult<User> {
    Ok(data(state.accounts.register(&req)?))
}

/// Log in and set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    Payload(req): Payload<LoginRequest>,
) -> Result<Response> {
    let (_user, token) = state.auth.login(&req.name, &req.password)?;
    let cookie = state.auth.session_cookie(&token);

    Ok(([(header::SET_COOKIE, cookie)], message("Login successful")).into_response())
}

/// Clear the session cookie.
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, AuthService::clear_cookie())],
        message("Logged out"),
    )
        .into_response()
}

/// Profile with friends and shelf.
pub async fn profile(State(state): State<AppState>, EntityId(id): EntityId) -> ApiResult<Profile> {
    Ok(data(state.accounts.profile(id)?))
}

/// Pending requests addressed to the caller.
pub async fn incoming_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Friend>> {
    Ok(data(state.social.incoming(user.id)?))
}

/// Send a friend request.
pub async fn send_friend_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> ApiResult<FriendRequest> {
    Ok(data(state.social.send(&user, id)?))
}

/// Accept a friend request from user `id`.
pub async fn accept_friend_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> ApiResult<FriendRequest> {
    Ok(data(state.social.accept(&user, id)?))
}

/// Reject the friend request from user `id`.
pub async fn reject_friend_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    state.social.reject(&user, id)?;
    Ok(message("Friend request rejected"))
}

/// Cancel a request to, or unfriend, user `id`.
pub async fn delete_friend_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    state.social.delete(&user, id)?;
    Ok(message("Friend request deleted"))
}

/// The caller's profile photo.
pub async fn get_profile_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response> {
    let path = user
        .profile_pic
        .ok_or_else(|| AppError::NotFound("No profile photo".to_string()))?;
    serve_photo(&state, &path).await
}

/// Upload the caller's profile photo.
pub async fn put_profile_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    form: Form,
) -> ApiResult<String> {
    let upload = single_file(form, PROFILE_PHOTO_FIELD).await?;
    let path = state.photos.save_profile(user.id, upload).await?;
    let path = path.to_string_lossy().into_owned();

    state.db.set_profile_pic(user.id, Some(&path))?;
    tracing::info!(user = %user.name, "Updated profile photo");
    Ok(data(path))
}

/// Remove the caller's profile photo.
pub async fn delete_profile_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<String> {
    let path = user
        .profile_pic
        .ok_or_else(|| AppError::NotFound("No profile photo".to_string()))?;

    state.photos.remove(&PathBuf::from(&path)).await?;
    state.db.set_profile_pic(user.id, None)?;
    Ok(message("Profile photo deleted"))
}

// ============================================================================
// BOOKS
// ============================================================================

/// Pagination query.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

/// Add-to-shelf request.
#[derive(Debug, Deserialize)]
pub struct AddUserBookRequest {
    book_id: i64,
    #[serde(default)]
    pages_read: i64,
}

/// Pages read update.
#[derive(Debug, Deserialize)]
pub struct EditPagesRequest {
    user_books_id: i64,
    pages_read: i64,
}

/// Genre override update.
#[derive(Debug, Deserialize)]
pub struct EditGenreRequest {
    user_books_id: i64,
    genre: String,
}

/// Whole catalog.
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Vec<Book>> {
    Ok(data(state.catalog.list()?))
}

/// One book.
pub async fn get_book(State(state): State<AppState>, EntityId(id): EntityId) -> ApiResult<Book> {
    Ok(data(state.catalog.get(id)?))
}

/// Catalog page.
pub async fn paginated_books(
    State(state): State<AppState>,
    Params(query): Params<PageQuery>,
) -> ApiResult<Page> {
    let page = parse_page(query.page.as_deref());
    Ok(data(state.catalog.page(page)?))
}

/// Catalog window starting at a book id.
pub async fn infinite_books(
    State(state): State<AppState>,
    Path(cursor): Path<String>,
) -> ApiResult<Scroll> {
    let cursor = cursor
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation(format!("Invalid cursor '{}'", cursor)))?;
    Ok(data(state.catalog.scroll(cursor)?))
}

/// A book's photo.
pub async fn get_book_photo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Response> {
    let book = state.catalog.get(id)?;
    let path = book
        .photos
        .first()
        .ok_or_else(|| AppError::NotFound("Book has no photo".to_string()))?;
    serve_photo(&state, path).await
}

/// The caller's shelf.
pub async fn my_shelf(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<ShelfEntry>> {
    Ok(data(state.shelf.list(user.id)?))
}

/// Another user's shelf.
pub async fn user_shelf(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> ApiResult<Vec<ShelfEntry>> {
    let user = state.accounts.get(id)?;
    Ok(data(state.shelf.list(user.id)?))
}

/// Put a book on the caller's shelf.
pub async fn add_user_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(req): Payload<AddUserBookRequest>,
) -> ApiResult<Shelved> {
    Ok(data(state.shelf.add(user.id, req.book_id, req.pages_read)?))
}

/// Take a book off the caller's shelf.
pub async fn remove_user_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    state.shelf.remove(user.id, id)?;
    Ok(message("Book removed from shelf"))
}

/// Update pages read.
pub async fn edit_pages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(req): Payload<EditPagesRequest>,
) -> ApiResult<UserBook> {
    Ok(data(state.shelf.update_pages(
        user.id,
        req.user_books_id,
        req.pages_read,
    )?))
}

/// Update the genre override.
pub async fn edit_genre(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(req): Payload<EditGenreRequest>,
) -> ApiResult<UserBook> {
    Ok(data(state.shelf.update_genre(
        user.id,
        req.user_books_id,
        &req.genre,
    )?))
}

// ============================================================================
// LIBRARIAN
// ============================================================================

/// Add a book to the catalog.
pub async fn create_book(
    State(state): State<AppState>,
    Payload(draft): Payload<BookDraft>,
) -> ApiResult<Book> {
    Ok(data(state.catalog.create(draft)?))
}

/// Edit a book.
pub async fn modify_book(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    Payload(patch): Payload<BookPatch>,
) -> ApiResult<Book> {
    Ok(data(state.catalog.update(id, patch)?))
}

/// Remove a book and its photo.
pub async fn delete_book(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    let book = state.catalog.delete(id)?;
    discard_photos(&state, &book.photos).await;
    Ok(message("Book deleted"))
}

/// Upload a book's photo.
pub async fn put_book_photo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    form: Form,
) -> ApiResult<Book> {
    let mut book = state.catalog.get(id)?;
    let upload = single_file(form, BOOK_PHOTO_FIELD).await?;
    let path = state.photos.save_book(id, upload).await?;

    book.photos = vec![path.to_string_lossy().into_owned()];
    state.catalog.set_photos(id, &book.photos)?;
    tracing::info!(id, "Updated book photo");
    Ok(data(book))
}

/// Remove a book's photo.
pub async fn delete_book_photo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    let book = state.catalog.get(id)?;
    if book.photos.is_empty() {
        return Err(AppError::NotFound("Book has no photo".to_string()));
    }

    for path in &book.photos {
        state.photos.remove(&PathBuf::from(path)).await?;
    }
    state.catalog.set_photos(id, &[])?;
    Ok(message("Book photo deleted"))
}

// ============================================================================
// ADMIN
// ============================================================================

/// Promotion options.
#[derive(Debug, Default, Deserialize)]
pub struct PromoteQuery {
    #[serde(default)]
    admin: bool,
}

/// All users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(data(state.accounts.list()?))
}

/// Grant the librarian role (and admin with `?admin=true`).
pub async fn promote_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    Params(query): Params<PromoteQuery>,
) -> ApiResult<User> {
    Ok(data(state.accounts.promote(id, query.admin)?))
}

/// Edit a user.
pub async fn modify_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    Payload(patch): Payload<UserPatch>,
) -> ApiResult<User> {
    Ok(data(state.accounts.modify(id, patch)?))
}

/// Delete a user and their profile photo.
pub async fn delete_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> ApiResult<String> {
    let user = state.accounts.delete(id)?;
    if let Some(path) = user.profile_pic {
        discard_photos(&state, &[path]).await;
    }
    Ok(message("User deleted"))
}

/// Every friend request.
pub async fn list_friend_requests(State(state): State<AppState>) -> ApiResult<Vec<FriendRequest>> {
    Ok(data(state.social.list_all()?))
}
