//! Database row types. These map directly to SQLite rows and stay
//! independent of the wire models in livecomment-types.

/// A user joined with their theme and, if uploaded, their icon hash.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub theme_id: i64,
    pub dark_mode: bool,
    pub icon_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LivestreamRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub playlist_url: String,
    pub thumbnail_url: String,
    pub start_at: i64,
    pub end_at: i64,
}

#[derive(Debug, Clone)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LivecommentRow {
    pub id: i64,
    pub user_id: i64,
    pub livestream_id: i64,
    pub comment: String,
    pub tip: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct LivecommentReportRow {
    pub id: i64,
    pub user_id: i64,
    pub livestream_id: i64,
    pub livecomment_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NgWordRow {
    pub id: i64,
    pub user_id: i64,
    pub livestream_id: i64,
    pub word: String,
    pub created_at: i64,
}

pub struct NewLivestream<'a> {
    pub user_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub playlist_url: &'a str,
    pub thumbnail_url: &'a str,
    pub start_at: i64,
    pub end_at: i64,
}
