use std::sync::Arc;

use crate::service::CommentService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: CommentService,
    pub jwt_secret: String,
}
