pub mod handlers;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/list", get(handlers::list_content))
        .route("/stream", get(handlers::stream_file))
        .route("/playlists", get(handlers::list_playlists))
        .route(
            "/playlists/{name}",
            get(handlers::read_playlist)
                .post(handlers::create_playlist)
                .patch(handlers::rename_playlist)
                .delete(handlers::delete_playlist),
        )
        .route("/playlists/{name}/tracks", post(handlers::append_tracks))
        .route("/playlists/{name}/tracks/{index}", delete(handlers::remove_track))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
