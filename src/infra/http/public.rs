use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{error::AppError, render::theme_by_name, stream::live_response},
    cache::Stylesheet,
    domain::posts::{PostId, PostSummary},
};

use super::{
    HttpState,
    middleware::{log_responses, set_request_context},
};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{id}", get(post_detail))
        .route("/sse", get(live_updates))
        .route("/syntax-theme/{theme}", get(syntax_theme))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeQuery {
    theme: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LiveQuery {
    post: Option<String>,
}

async fn list_posts(State(state): State<HttpState>) -> Json<Vec<PostSummary>> {
    let snapshot = state.content.all();
    Json(
        snapshot
            .posts()
            .iter()
            .map(|post| PostSummary::from(post.as_ref()))
            .collect(),
    )
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Query(query): Query<ThemeQuery>,
) -> Result<Response, AppError> {
    let post = state.content.get(&id).ok_or(AppError::NotFound)?;
    let theme = resolve_theme(query.theme.as_deref(), &state.default_theme);

    let renders = Arc::clone(&state.renders);
    let render_post = Arc::clone(&post);
    let render_theme = theme.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        renders.render_cached(&render_post.markdown, &render_post.fingerprint, &render_theme)
    })
    .await
    .map_err(|err| AppError::unexpected(format!("render task failed: {err}")))??;

    // Detached; the handle is dropped on purpose.
    state.warmer.warm_neighbours(&post.id, &theme);

    let mut response = Html(rendered.html.clone()).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

async fn live_updates(
    State(state): State<HttpState>,
    Query(query): Query<LiveQuery>,
) -> Result<Response, AppError> {
    let post_id = query
        .post
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("missing `post` query parameter"))?;

    Ok(live_response(
        Arc::clone(&state.notifier),
        PostId::new(post_id),
    ))
}

async fn syntax_theme(
    State(state): State<HttpState>,
    Path(theme): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let name = theme.strip_suffix(".css").unwrap_or(&theme);
    let stylesheet = state.stylesheets.stylesheet(name).ok_or(AppError::NotFound)?;
    Ok(stylesheet_response(&stylesheet, &headers))
}

fn resolve_theme(requested: Option<&str>, default_theme: &str) -> String {
    requested
        .map(str::trim)
        .filter(|name| theme_by_name(name).is_some())
        .unwrap_or(default_theme)
        .to_string()
}

fn stylesheet_response(stylesheet: &Stylesheet, headers: &HeaderMap) -> Response {
    let etag = format!("\"{}\"", stylesheet.etag);
    let fresh = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').any(|tag| tag.trim() == etag));

    let builder = Response::builder()
        .header(ETAG, etag.as_str())
        .header(CACHE_CONTROL, "public, max-age=3600");

    let response = if fresh {
        builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())
    } else {
        builder
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/css; charset=utf-8")
            .body(Body::from(stylesheet.css.clone()))
    };

    response.unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
