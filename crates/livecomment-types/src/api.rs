use serde::{Deserialize, Serialize};

// -- Session --

/// JWT claims issued by the session service. `sub` is the caller's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub exp: usize,
}

// -- Livecomments --

#[derive(Debug, Deserialize)]
pub struct PostLivecommentRequest {
    pub comment: String,
    pub tip: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LivecommentQuery {
    /// Kept as text so a non-integer value maps to our own validation error.
    pub limit: Option<String>,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub ng_word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerateResponse {
    pub word_id: i64,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
