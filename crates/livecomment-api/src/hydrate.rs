//! Turns store rows into the nested wire models.

use std::path::Path;

use anyhow::{Context, anyhow};
use rusqlite::Connection;

use livecomment_db::models::{LivecommentReportRow, LivecommentRow, LivestreamRow, UserRow};
use livecomment_db::queries;
use livecomment_types::models::{Livecomment, LivecommentReport, Livestream, Tag, Theme, User};

use crate::error::Error;

/// Icon hash reported for users who never uploaded an icon: the SHA-256 of
/// the default image.
#[derive(Debug, Clone)]
pub struct FallbackIcon {
    hash: String,
}

impl FallbackIcon {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let image = std::fs::read(path)
            .with_context(|| format!("failed to read fallback image {}", path.display()))?;
        Ok(Self::from_image(&image))
    }

    pub fn from_image(image: &[u8]) -> Self {
        Self {
            hash: queries::icon_hash(image),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

pub fn fill_user(row: UserRow, fallback: &FallbackIcon) -> User {
    User {
        id: row.id,
        name: row.name,
        display_name: row.display_name,
        description: row.description,
        theme: Theme {
            id: row.theme_id,
            dark_mode: row.dark_mode,
        },
        icon_hash: row.icon_hash.unwrap_or_else(|| fallback.hash().to_string()),
    }
}

pub fn load_user(conn: &Connection, user_id: i64, fallback: &FallbackIcon) -> Result<User, Error> {
    let row = queries::get_user(conn, user_id)?
        .ok_or_else(|| anyhow!("user {} referenced but missing", user_id))?;
    Ok(fill_user(row, fallback))
}

pub fn fill_livestream(
    conn: &Connection,
    row: LivestreamRow,
    fallback: &FallbackIcon,
) -> Result<Livestream, Error> {
    let owner = load_user(conn, row.user_id, fallback)?;
    let tags = queries::get_livestream_tags(conn, row.id)?
        .into_iter()
        .map(|t| Tag { id: t.id, name: t.name })
        .collect();

    Ok(Livestream {
        id: row.id,
        owner,
        title: row.title,
        description: row.description,
        playlist_url: row.playlist_url,
        thumbnail_url: row.thumbnail_url,
        tags,
        start_at: row.start_at,
        end_at: row.end_at,
    })
}

pub fn load_livestream(
    conn: &Connection,
    livestream_id: i64,
    fallback: &FallbackIcon,
) -> Result<Livestream, Error> {
    let row = queries::get_livestream(conn, livestream_id)?
        .ok_or_else(|| anyhow!("livestream {} referenced but missing", livestream_id))?;
    fill_livestream(conn, row, fallback)
}

pub fn fill_livecomment(
    conn: &Connection,
    row: LivecommentRow,
    fallback: &FallbackIcon,
) -> Result<Livecomment, Error> {
    let user = load_user(conn, row.user_id, fallback)?;
    let livestream = load_livestream(conn, row.livestream_id, fallback)?;

    Ok(Livecomment {
        id: row.id,
        user,
        livestream,
        comment: row.comment,
        tip: row.tip,
        created_at: row.created_at,
    })
}

pub fn fill_livecomment_report(
    conn: &Connection,
    row: LivecommentReportRow,
    fallback: &FallbackIcon,
) -> Result<LivecommentReport, Error> {
    let reporter = load_user(conn, row.user_id, fallback)?;
    let livecomment_row = queries::get_livecomment(conn, row.livecomment_id)?
        .ok_or_else(|| anyhow!("livecomment {} referenced but missing", row.livecomment_id))?;
    let livecomment = fill_livecomment(conn, livecomment_row, fallback)?;

    Ok(LivecommentReport {
        id: row.id,
        reporter,
        livecomment,
        created_at: row.created_at,
    })
}
