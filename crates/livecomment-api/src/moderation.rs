use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use livecomment_types::api::{Claims, ModerateRequest, ModerateResponse};

use crate::error::Error;
use crate::handler::{parse_id, run_blocking};
use crate::state::AppState;

/// POST /streams/{livestream_id}/moderate. Only the stream owner may call it.
pub async fn moderate(
    State(state): State<AppState>,
    Path(livestream_id): Path<String>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<ModerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let livestream_id = parse_id(&livestream_id, "livestream_id")?;
    let Json(req) =
        body.map_err(|_| Error::validation("failed to decode the request body as json"))?;

    let word_id = run_blocking(claims.sub, move |caller| {
        state.service.moderate(&caller, livestream_id, &req.ng_word)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ModerateResponse { word_id })))
}

/// GET /streams/{livestream_id}/ngwords
pub async fn get_ng_words(
    State(state): State<AppState>,
    Path(livestream_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, Error> {
    let livestream_id = parse_id(&livestream_id, "livestream_id")?;

    let ng_words = run_blocking(claims.sub, move |caller| {
        state.service.list_ng_words(&caller, livestream_id)
    })
    .await?;

    Ok(Json(ng_words))
}
