//! HTTP shell: page models as JSON, form posts for auth, and the selection
//! and community actions, all scoped to the device cookie.

pub mod auth;
pub mod cleanup;
pub mod community;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod selections;
pub mod state;

use axum::{
    Extension, Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use community::ItemKind;
pub use state::{AppState, AppStateInner};

/// Edit, save, delete and like routes for one kind of board item.
fn item_routes(prefix: &str, kind: ItemKind) -> Router<AppState> {
    Router::new()
        .route(
            &format!("{}/{{id}}", prefix),
            put(community::save_edit).delete(community::delete_item),
        )
        .route(&format!("{}/{{id}}/edit", prefix), post(community::begin_edit))
        .route(&format!("{}/{{id}}/like", prefix), post(community::toggle_like))
        .layer(Extension(kind))
}

pub fn router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(pages::landing))
        .route("/sparks", get(pages::sparks))
        .route("/signin", get(auth::sign_in_page).post(auth::sign_in))
        .route("/signup", get(auth::sign_up_page).post(auth::sign_up))
        .route("/signout", post(auth::sign_out));

    let sparks = Router::new()
        .route("/sparks/{id}/select", post(selections::select))
        .route("/sparks/commit", post(selections::commit));

    let community = Router::new()
        .route(
            "/community/posts",
            get(community::list_posts).post(community::create_post),
        )
        .route("/community/posts/{id}/replies", post(community::create_reply))
        .route(
            "/community/posts/{id}/replies/toggle",
            post(community::toggle_replies),
        )
        .route("/community/edit/cancel", post(community::cancel_edit))
        .merge(item_routes("/community/posts", ItemKind::Post))
        .merge(item_routes("/community/replies", ItemKind::Reply));

    Router::new()
        .merge(pages)
        .merge(sparks)
        .merge(community)
        .layer(axum_middleware::from_fn(middleware::device_cookie))
        .route("/health", get(pages::health))
        .with_state(state)
}
