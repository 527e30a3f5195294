//! HTTP server and routes.

mod extract;
mod handlers;
pub mod middleware;
mod state;

pub use extract::{EntityId, Form, Params, Payload};
pub use handlers::Envelope;
pub use middleware::CurrentUser;
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Ignoring invalid allowed origin");
            layer
        }
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let user_public = Router::new()
        .route("/", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout));

    let user_session = Router::new()
        .route("/friends", get(handlers::incoming_requests))
        .route(
            "/send-friend-request/{id}",
            post(handlers::send_friend_request),
        )
        .route(
            "/accept-friend-request/{id}",
            put(handlers::accept_friend_request),
        )
        .route(
            "/reject-friend-request/{id}",
            delete(handlers::reject_friend_request),
        )
        .route(
            "/friend-request/{id}",
            delete(handlers::delete_friend_request),
        )
        .route(
            "/photo",
            get(handlers::get_profile_photo)
                .put(handlers::put_profile_photo)
                .delete(handlers::delete_profile_photo),
        )
        .route("/{id}", get(handlers::profile))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_login,
        ));

    let book_public = Router::new()
        .route("/", get(handlers::list_books))
        .route("/get-paginated", get(handlers::paginated_books))
        .route("/get-infinite/{id}", get(handlers::infinite_books))
        .route("/book-photo/{id}", get(handlers::get_book_photo))
        .route("/{id}", get(handlers::get_book));

    let book_session = Router::new()
        .route(
            "/user-books",
            get(handlers::my_shelf).post(handlers::add_user_book),
        )
        .route(
            "/user-books/{id}",
            get(handlers::user_shelf).delete(handlers::remove_user_book),
        )
        .route("/edit-pages", put(handlers::edit_pages))
        .route("/edit-genre", put(handlers::edit_genre))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_login,
        ));

    let librarian_routes = Router::new()
        .route("/create-book", post(handlers::create_book))
        .route("/modify-book/{id}", put(handlers::modify_book))
        .route("/delete-book/{id}", delete(handlers::delete_book))
        .route(
            "/book-photo/{id}",
            put(handlers::put_book_photo).delete(handlers::delete_book_photo),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_librarian,
        ));

    let admin_routes = Router::new()
        .route("/users", get(handlers::list_users))
        .route("/promote/{id}", put(handlers::promote_user))
        .route(
            "/users/{id}",
            put(handlers::modify_user).delete(handlers::delete_user),
        )
        .route("/book/{id}", delete(handlers::delete_book))
        .route("/friend-requests", get(handlers::list_friend_requests))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    let cors = cors_layer(&state.config.server.allowed_origin);

    Router::new()
        .nest("/api/users", user_public.merge(user_session))
        .nest("/api/books", book_public.merge(book_session))
        .nest("/api/librarian", librarian_routes)
        .nest("/api/admin", admin_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
