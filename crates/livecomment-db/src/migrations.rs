use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // A failed step must not leave tables behind at version 0
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE themes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL UNIQUE REFERENCES users(id),
                dark_mode   INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE icons (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL UNIQUE REFERENCES users(id),
                image       BLOB NOT NULL,
                hash        TEXT NOT NULL
            );

            CREATE TABLE livestreams (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                playlist_url    TEXT NOT NULL,
                thumbnail_url   TEXT NOT NULL,
                start_at        INTEGER NOT NULL,
                end_at          INTEGER NOT NULL
            );

            CREATE INDEX idx_livestreams_owner ON livestreams(id, user_id);

            CREATE TABLE tags (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE livestream_tags (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                livestream_id   INTEGER NOT NULL REFERENCES livestreams(id),
                tag_id          INTEGER NOT NULL REFERENCES tags(id)
            );

            CREATE INDEX idx_livestream_tags_livestream ON livestream_tags(livestream_id);

            CREATE TABLE livecomments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                livestream_id   INTEGER NOT NULL REFERENCES livestreams(id),
                comment         TEXT NOT NULL,
                tip             INTEGER NOT NULL DEFAULT 0 CHECK (tip >= 0),
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_livecomments_livestream
                ON livecomments(livestream_id, created_at);

            -- livecomment_id carries no foreign key: a purge may delete reported comments
            CREATE TABLE livecomment_reports (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                livestream_id   INTEGER NOT NULL,
                livecomment_id  INTEGER NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE ng_words (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                livestream_id   INTEGER NOT NULL REFERENCES livestreams(id),
                word            TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_ng_words_owner
                ON ng_words(user_id, livestream_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
