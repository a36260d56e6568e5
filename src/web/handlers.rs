use crate::{
    content::ContentEntry,
    error::{AppError, LibraryError},
    playlist::parse_track_index,
    pls::Track,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub async fn root_handler() -> &'static str {
    "Media Server"
}

pub async fn list_content(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Vec<ContentEntry>>, AppError> {
    let entries = state.lister.list(&query.path).await?;
    Ok(Json(entries))
}

/// Send a whole file from the media root. Range requests are not honoured.
pub async fn stream_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AppError> {
    let confined = state.lister.sandbox().resolve(&query.path)?;
    let what = || format!("file '{}'", confined.relative_url_path());

    let file = File::open(confined.absolute())
        .await
        .map_err(|e| LibraryError::from_io(e, what()))?;
    let metadata = file.metadata().await.map_err(LibraryError::Io)?;
    if !metadata.is_file() {
        return Err(LibraryError::not_found(what()).into());
    }

    debug!("streaming {} ({} bytes)", confined.absolute().display(), metadata.len());

    let mime_type = mime_type_for(&confined.relative_url_path());
    let body = Body::from_stream(ReaderStream::with_capacity(file, 64 * 1024));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(body)?)
}

pub async fn list_playlists(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.playlists.list().await?))
}

pub async fn read_playlist(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Track>>, AppError> {
    Ok(Json(state.playlists.get(&name).await?))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.playlists.create(&name).await?;
    Ok(StatusCode::CREATED)
}

/// Append a JSON array of tracks.
pub async fn append_tracks(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Track>>, AppError> {
    if !body.is_array() {
        return Err(LibraryError::InvalidArgument("expected an array of tracks".to_string()).into());
    }
    let tracks: Vec<Track> = serde_json::from_value(body)
        .map_err(|e| LibraryError::InvalidArgument(format!("invalid track: {}", e)))?;

    Ok(Json(state.playlists.add(&name, tracks).await?))
}

pub async fn remove_track(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, String)>,
) -> Result<Json<Vec<Track>>, AppError> {
    let index = parse_track_index(&index)?;
    Ok(Json(state.playlists.remove(&name, index).await?))
}

pub async fn rename_playlist(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<StatusCode, AppError> {
    state.playlists.rename(&name, &request.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.playlists.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn mime_type_for(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("m4a") | Some("aac") => "audio/mp4",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}
