use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use sha2::{Digest, Sha256};

use crate::models::{LivecommentRow, LivestreamRow, NewLivestream, NgWordRow, TagRow, UserRow};

/// Keeps each DELETE well under SQLite's bound-parameter limit.
const DELETE_BATCH_SIZE: usize = 500;

// Columns read by `user_from_row`, in order. Expects aliases u, t and i for
// users, themes and icons.
const USER_COLUMNS: &str =
    "u.id, u.name, u.display_name, u.description, t.id, t.dark_mode, i.hash";

// -- Users --

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM users u
         INNER JOIN themes t ON t.user_id = u.id
         LEFT JOIN icons i ON i.user_id = u.id
         WHERE u.id = ?1"
    );
    let row = conn
        .query_row(&sql, [id], |row| user_from_row(row, 0))
        .optional()?;
    Ok(row)
}

#[cfg(test)]
pub fn get_user_by_name(conn: &Connection, name: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM users u
         INNER JOIN themes t ON t.user_id = u.id
         LEFT JOIN icons i ON i.user_id = u.id
         WHERE u.name = ?1"
    );
    let row = conn
        .query_row(&sql, [name], |row| user_from_row(row, 0))
        .optional()?;
    Ok(row)
}

/// Create a user together with their theme row. Returns the new user id.
pub fn insert_user(
    conn: &Connection,
    name: &str,
    display_name: &str,
    description: &str,
    dark_mode: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (name, display_name, description) VALUES (?1, ?2, ?3)",
        (name, display_name, description),
    )?;
    let user_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO themes (user_id, dark_mode) VALUES (?1, ?2)",
        (user_id, dark_mode),
    )?;
    Ok(user_id)
}

/// Store (or replace) a user's icon. Returns the hex SHA-256 of the image.
pub fn set_user_icon(conn: &Connection, user_id: i64, image: &[u8]) -> Result<String> {
    let hash = icon_hash(image);
    conn.execute("DELETE FROM icons WHERE user_id = ?1", [user_id])?;
    conn.execute(
        "INSERT INTO icons (user_id, image, hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, image, &hash],
    )?;
    Ok(hash)
}

/// Hex-encoded SHA-256 of an icon image.
pub fn icon_hash(image: &[u8]) -> String {
    hex::encode(Sha256::digest(image))
}

// -- Livestreams --

pub fn get_livestream(conn: &Connection, id: i64) -> Result<Option<LivestreamRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, title, description, playlist_url, thumbnail_url, start_at, end_at
             FROM livestreams WHERE id = ?1",
            [id],
            livestream_from_row,
        )
        .optional()?;
    Ok(row)
}

/// The livestream only if `user_id` owns it.
pub fn get_owned_livestream(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> Result<Option<LivestreamRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, title, description, playlist_url, thumbnail_url, start_at, end_at
             FROM livestreams WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
            livestream_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn insert_livestream(conn: &Connection, new: &NewLivestream<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO livestreams (user_id, title, description, playlist_url, thumbnail_url, start_at, end_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            new.user_id,
            new.title,
            new.description,
            new.playlist_url,
            new.thumbnail_url,
            new.start_at,
            new.end_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// -- Tags --

pub fn get_livestream_tags(conn: &Connection, livestream_id: i64) -> Result<Vec<TagRow>> {
    let mut stmt = conn.prepare(
        "SELECT tags.id, tags.name
         FROM livestream_tags
         INNER JOIN tags ON tags.id = livestream_tags.tag_id
         WHERE livestream_tags.livestream_id = ?1
         ORDER BY livestream_tags.id",
    )?;

    let rows = stmt
        .query_map([livestream_id], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn insert_tag(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT INTO tags (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn tag_livestream(conn: &Connection, livestream_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO livestream_tags (livestream_id, tag_id) VALUES (?1, ?2)",
        [livestream_id, tag_id],
    )?;
    Ok(())
}

// -- Livecomments --

pub fn get_livecomment(conn: &Connection, id: i64) -> Result<Option<LivecommentRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, livestream_id, comment, tip, created_at
             FROM livecomments WHERE id = ?1",
            [id],
            |row| livecomment_from_row(row, 0),
        )
        .optional()?;
    Ok(row)
}

/// Comments on a livestream, newest first, each with its author.
///
/// `limit` is applied by the query itself; `None` returns every comment.
pub fn list_livecomments_with_authors(
    conn: &Connection,
    livestream_id: i64,
    limit: Option<u64>,
) -> Result<Vec<(LivecommentRow, UserRow)>> {
    // JOIN the author, theme and icon in one query (no N+1)
    let sql = format!(
        "SELECT c.id, c.user_id, c.livestream_id, c.comment, c.tip, c.created_at, {USER_COLUMNS}
         FROM livecomments c
         INNER JOIN users u ON u.id = c.user_id
         INNER JOIN themes t ON t.user_id = u.id
         LEFT JOIN icons i ON i.user_id = u.id
         WHERE c.livestream_id = ?1
         ORDER BY c.created_at DESC, c.id DESC
         LIMIT ?2"
    );
    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![livestream_id, limit], |row| {
            Ok((livecomment_from_row(row, 0)?, user_from_row(row, 6)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Every comment on a livestream, in id order. Used by the NG-word purge.
pub fn list_livecomments_for_livestream(
    conn: &Connection,
    livestream_id: i64,
) -> Result<Vec<LivecommentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, livestream_id, comment, tip, created_at
         FROM livecomments WHERE livestream_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([livestream_id], |row| livecomment_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn insert_livecomment(
    conn: &Connection,
    user_id: i64,
    livestream_id: i64,
    comment: &str,
    tip: i64,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO livecomments (user_id, livestream_id, comment, tip, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user_id, livestream_id, comment, tip, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete exactly the given comments, restricted to one livestream.
/// Ids belonging to other livestreams are left untouched. Returns the number
/// of rows removed.
pub fn delete_livecomments(conn: &Connection, livestream_id: i64, ids: &[i64]) -> Result<usize> {
    let mut deleted = 0;

    for batch in ids.chunks(DELETE_BATCH_SIZE) {
        let placeholders: Vec<String> = (2..=batch.len() + 1).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "DELETE FROM livecomments WHERE livestream_id = ?1 AND id IN ({})",
            placeholders.join(", ")
        );

        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(batch.len() + 1);
        params.push(&livestream_id);
        params.extend(batch.iter().map(|id| id as &dyn ToSql));

        deleted += conn.execute(&sql, params.as_slice())?;
    }

    Ok(deleted)
}

// -- Reports --

pub fn insert_livecomment_report(
    conn: &Connection,
    user_id: i64,
    livestream_id: i64,
    livecomment_id: i64,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO livecomment_reports (user_id, livestream_id, livecomment_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        [user_id, livestream_id, livecomment_id, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub fn list_reports_for_livecomment(
    conn: &Connection,
    livecomment_id: i64,
) -> Result<Vec<crate::models::LivecommentReportRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, livestream_id, livecomment_id, created_at
         FROM livecomment_reports WHERE livecomment_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([livecomment_id], |row| {
            Ok(crate::models::LivecommentReportRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                livestream_id: row.get(2)?,
                livecomment_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- NG words --

pub fn insert_ng_word(
    conn: &Connection,
    user_id: i64,
    livestream_id: i64,
    word: &str,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ng_words (user_id, livestream_id, word, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, livestream_id, word, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// NG words `user_id` registered for a livestream, newest first.
pub fn list_ng_words(conn: &Connection, user_id: i64, livestream_id: i64) -> Result<Vec<NgWordRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, livestream_id, word, created_at
         FROM ng_words WHERE user_id = ?1 AND livestream_id = ?2
         ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt
        .query_map([user_id, livestream_id], ng_word_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// All NG words registered for a livestream by anyone, oldest first.
pub fn list_ng_words_for_livestream(conn: &Connection, livestream_id: i64) -> Result<Vec<NgWordRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, livestream_id, word, created_at
         FROM ng_words WHERE livestream_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([livestream_id], ng_word_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Row mapping --

fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        display_name: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        theme_id: row.get(offset + 4)?,
        dark_mode: row.get(offset + 5)?,
        icon_hash: row.get(offset + 6)?,
    })
}

fn livestream_from_row(row: &Row<'_>) -> rusqlite::Result<LivestreamRow> {
    Ok(LivestreamRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        playlist_url: row.get(4)?,
        thumbnail_url: row.get(5)?,
        start_at: row.get(6)?,
        end_at: row.get(7)?,
    })
}

fn livecomment_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<LivecommentRow> {
    Ok(LivecommentRow {
        id: row.get(offset)?,
        user_id: row.get(offset + 1)?,
        livestream_id: row.get(offset + 2)?,
        comment: row.get(offset + 3)?,
        tip: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
    })
}

fn ng_word_from_row(row: &Row<'_>) -> rusqlite::Result<NgWordRow> {
    Ok(NgWordRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        livestream_id: row.get(2)?,
        word: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
