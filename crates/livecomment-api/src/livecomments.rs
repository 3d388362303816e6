use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use livecomment_types::api::{Claims, LivecommentQuery, PostLivecommentRequest};

use crate::error::Error;
use crate::handler::{parse_id, run_blocking};
use crate::state::AppState;

/// GET /streams/{livestream_id}/comments?limit=N
pub async fn get_livecomments(
    State(state): State<AppState>,
    Path(livestream_id): Path<String>,
    Query(query): Query<LivecommentQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, Error> {
    let livestream_id = parse_id(&livestream_id, "livestream_id")?;
    let limit = match query.limit.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            Error::validation("limit query parameter must be a non-negative integer")
        })?),
    };

    let livecomments = run_blocking(claims.sub, move |caller| {
        state.service.list(&caller, livestream_id, limit)
    })
    .await?;

    Ok(Json(livecomments))
}

/// POST /streams/{livestream_id}/comments
pub async fn post_livecomment(
    State(state): State<AppState>,
    Path(livestream_id): Path<String>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<PostLivecommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let livestream_id = parse_id(&livestream_id, "livestream_id")?;
    let Json(req) =
        body.map_err(|_| Error::validation("failed to decode the request body as json"))?;

    let livecomment = run_blocking(claims.sub, move |caller| {
        state.service.create(&caller, livestream_id, &req)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(livecomment)))
}

/// POST /streams/{livestream_id}/comments/{livecomment_id}/report
pub async fn report_livecomment(
    State(state): State<AppState>,
    Path((livestream_id, livecomment_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, Error> {
    let livestream_id = parse_id(&livestream_id, "livestream_id")?;
    let livecomment_id = parse_id(&livecomment_id, "livecomment_id")?;

    let report = run_blocking(claims.sub, move |caller| {
        state.service.report(&caller, livestream_id, livecomment_id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}
