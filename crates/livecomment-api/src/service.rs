use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use livecomment_db::Database;
use livecomment_db::models::{LivecommentReportRow, LivecommentRow};
use livecomment_db::queries;
use livecomment_moderation::{PurgeCandidate, find_ng_word, purge_targets};
use livecomment_types::api::PostLivecommentRequest;
use livecomment_types::models::{Livecomment, LivecommentReport, NgWord};

use crate::cache::LivecommentCache;
use crate::error::Error;
use crate::hydrate::{self, FallbackIcon};

/// The verified identity a request runs as, plus a token cancelled when the
/// request is abandoned.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: i64,
    cancel: CancellationToken,
}

impl Caller {
    pub fn new(user_id: i64) -> Self {
        Self::with_cancel(user_id, CancellationToken::new())
    }

    pub fn with_cancel(user_id: i64, cancel: CancellationToken) -> Self {
        Self { user_id, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checked right before commit so an abandoned request rolls back.
    fn ensure_active(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Comment listing, posting, reporting and NG-word moderation.
///
/// Every operation runs in one store transaction. The listing cache is
/// invalidated inside the write transaction and once more after commit, and
/// is filled only after a read transaction commits.
pub struct CommentService {
    db: Database,
    cache: LivecommentCache,
    fallback_icon: FallbackIcon,
}

impl CommentService {
    pub fn new(db: Database, cache: LivecommentCache, fallback_icon: FallbackIcon) -> Self {
        Self {
            db,
            cache,
            fallback_icon,
        }
    }

    #[cfg(test)]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Comments on a livestream, newest first. An unknown livestream yields
    /// an empty list.
    pub fn list(
        &self,
        _caller: &Caller,
        livestream_id: i64,
        limit: Option<u64>,
    ) -> Result<Vec<Livecomment>, Error> {
        // Only the unlimited list is cached; a limit is a prefix of it
        if let Some(cached) = self.cache.get(livestream_id) {
            debug!(livestream_id, "livecomment cache hit");
            let take = limit.map_or(cached.len(), |l| usize::try_from(l).unwrap_or(usize::MAX));
            return Ok(cached.iter().take(take).cloned().collect());
        }

        let ticket = self.cache.ticket();
        let livecomments = self.db.read_tx(|tx| -> Result<Option<Vec<Livecomment>>, Error> {
            let Some(livestream_row) = queries::get_livestream(tx, livestream_id)? else {
                return Ok(None);
            };
            let livestream = hydrate::fill_livestream(tx, livestream_row, &self.fallback_icon)?;

            let livecomments = queries::list_livecomments_with_authors(tx, livestream_id, limit)?
                .into_iter()
                .map(|(row, author)| Livecomment {
                    id: row.id,
                    user: hydrate::fill_user(author, &self.fallback_icon),
                    livestream: livestream.clone(),
                    comment: row.comment,
                    tip: row.tip,
                    created_at: row.created_at,
                })
                .collect::<Vec<_>>();

            Ok(Some(livecomments))
        })?;

        let Some(livecomments) = livecomments else {
            return Ok(Vec::new());
        };

        if limit.is_none() && !self.cache.put(livestream_id, ticket, livecomments.clone()) {
            debug!(livestream_id, "skipped caching list read before a concurrent write");
        }
        Ok(livecomments)
    }

    /// Post a comment after checking it against the stream owner's NG words.
    pub fn create(
        &self,
        caller: &Caller,
        livestream_id: i64,
        req: &PostLivecommentRequest,
    ) -> Result<Livecomment, Error> {
        if req.tip < 0 {
            return Err(Error::validation("tip must be a non-negative integer"));
        }

        let livecomment = self.db.write_tx(|tx| -> Result<Livecomment, Error> {
            let livestream = queries::get_livestream(tx, livestream_id)?
                .ok_or(Error::NotFound("livestream"))?;

            let ng_words: Vec<String> = queries::list_ng_words(tx, livestream.user_id, livestream.id)?
                .into_iter()
                .map(|w| w.word)
                .collect();
            if let Some(word) = find_ng_word(&req.comment, &ng_words) {
                info!(livestream_id, user_id = caller.user_id, "comment rejected as spam");
                return Err(Error::SpamDetected {
                    word: word.to_string(),
                });
            }
            debug!(livestream_id, checked = ng_words.len(), "comment passed NG word filter");

            let created_at = Utc::now().timestamp();
            let id = queries::insert_livecomment(
                tx,
                caller.user_id,
                livestream_id,
                &req.comment,
                req.tip,
                created_at,
            )?;

            let livecomment = hydrate::fill_livecomment(
                tx,
                LivecommentRow {
                    id,
                    user_id: caller.user_id,
                    livestream_id,
                    comment: req.comment.clone(),
                    tip: req.tip,
                    created_at,
                },
                &self.fallback_icon,
            )?;

            self.cache.invalidate(livestream_id);
            caller.ensure_active()?;
            Ok(livecomment)
        })?;
        self.cache.invalidate(livestream_id);

        info!(
            livestream_id,
            livecomment_id = livecomment.id,
            tip = livecomment.tip,
            "livecomment posted"
        );
        Ok(livecomment)
    }

    /// Record a report against a comment. Repeated reports are all kept.
    pub fn report(
        &self,
        caller: &Caller,
        livestream_id: i64,
        livecomment_id: i64,
    ) -> Result<LivecommentReport, Error> {
        let report = self.db.write_tx(|tx| -> Result<LivecommentReport, Error> {
            queries::get_livestream(tx, livestream_id)?.ok_or(Error::NotFound("livestream"))?;
            queries::get_livecomment(tx, livecomment_id)?.ok_or(Error::NotFound("livecomment"))?;

            let created_at = Utc::now().timestamp();
            let id = queries::insert_livecomment_report(
                tx,
                caller.user_id,
                livestream_id,
                livecomment_id,
                created_at,
            )?;

            let report = hydrate::fill_livecomment_report(
                tx,
                LivecommentReportRow {
                    id,
                    user_id: caller.user_id,
                    livestream_id,
                    livecomment_id,
                    created_at,
                },
                &self.fallback_icon,
            )?;

            caller.ensure_active()?;
            Ok(report)
        })?;

        info!(livestream_id, livecomment_id, report_id = report.id, "livecomment reported");
        Ok(report)
    }

    /// Register an NG word on a livestream the caller owns and purge every
    /// existing comment on it that matches any of its NG words. Returns the
    /// new word's id.
    pub fn moderate(&self, caller: &Caller, livestream_id: i64, word: &str) -> Result<i64, Error> {
        if word.is_empty() {
            return Err(Error::validation("ng_word must not be empty"));
        }

        let (word_id, deleted) = self.db.write_tx(|tx| -> Result<(i64, usize), Error> {
            queries::get_owned_livestream(tx, livestream_id, caller.user_id)?.ok_or_else(|| {
                Error::Authorization(
                    "A streamer can't moderate livestreams that other streamers own".into(),
                )
            })?;

            let word_id = queries::insert_ng_word(
                tx,
                caller.user_id,
                livestream_id,
                word,
                Utc::now().timestamp(),
            )?;

            let ng_words: Vec<String> = queries::list_ng_words_for_livestream(tx, livestream_id)?
                .into_iter()
                .map(|w| w.word)
                .collect();
            let livecomments = queries::list_livecomments_for_livestream(tx, livestream_id)?;
            let targets = purge_targets(
                livecomments.iter().map(|c| PurgeCandidate {
                    id: c.id,
                    livestream_id: c.livestream_id,
                    text: &c.comment,
                }),
                livestream_id,
                &ng_words,
            );
            let deleted = queries::delete_livecomments(tx, livestream_id, &targets)?;

            self.cache.invalidate(livestream_id);
            caller.ensure_active()?;
            Ok((word_id, deleted))
        })?;
        self.cache.invalidate(livestream_id);

        info!(livestream_id, word_id, deleted, "NG word registered");
        Ok(word_id)
    }

    /// NG words the caller registered for a livestream, newest first.
    pub fn list_ng_words(&self, caller: &Caller, livestream_id: i64) -> Result<Vec<NgWord>, Error> {
        let rows = self
            .db
            .read_tx(|tx| queries::list_ng_words(tx, caller.user_id, livestream_id))?;

        Ok(rows
            .into_iter()
            .map(|w| NgWord {
                id: w.id,
                user_id: w.user_id,
                livestream_id: w.livestream_id,
                word: w.word,
                created_at: w.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use livecomment_db::models::NewLivestream;

    struct Fixture {
        service: CommentService,
        owner: i64,
        viewer: i64,
        livestream_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let (owner, viewer, livestream_id) = db
            .write_tx(|tx| -> anyhow::Result<_> {
                let owner = queries::insert_user(tx, "streamer", "Streamer", "owner", false)?;
                let viewer = queries::insert_user(tx, "viewer", "Viewer", "fan", true)?;
                let livestream_id = new_livestream(tx, owner)?;
                Ok((owner, viewer, livestream_id))
            })
            .unwrap();

        Fixture {
            service: CommentService::new(
                db,
                LivecommentCache::default(),
                FallbackIcon::from_image(b"NoImage"),
            ),
            owner,
            viewer,
            livestream_id,
        }
    }

    fn new_livestream(conn: &rusqlite::Connection, owner: i64) -> anyhow::Result<i64> {
        queries::insert_livestream(
            conn,
            &NewLivestream {
                user_id: owner,
                title: "evening stream",
                description: "just chatting",
                playlist_url: "https://media.example/live.m3u8",
                thumbnail_url: "https://media.example/live.jpg",
                start_at: 1_700_000_000,
                end_at: 1_700_003_600,
            },
        )
    }

    fn post(text: &str, tip: i64) -> PostLivecommentRequest {
        PostLivecommentRequest {
            comment: text.to_string(),
            tip,
        }
    }

    fn texts(list: &[Livecomment]) -> Vec<&str> {
        list.iter().map(|c| c.comment.as_str()).collect()
    }

    #[test]
    fn post_then_moderate_scenario() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        let owner = Caller::new(f.owner);

        let posted = f
            .service
            .create(&viewer, f.livestream_id, &post("hello world", 0))
            .unwrap();
        assert_eq!(posted.user.id, f.viewer);
        assert_eq!(posted.livestream.owner.id, f.owner);
        assert_eq!(posted.user.icon_hash, queries::icon_hash(b"NoImage"));

        let list = f.service.list(&viewer, f.livestream_id, None).unwrap();
        assert_eq!(list[0], posted);

        let word_id = f.service.moderate(&owner, f.livestream_id, "world").unwrap();
        assert!(word_id > 0);

        let list = f.service.list(&viewer, f.livestream_id, None).unwrap();
        assert!(list.iter().all(|c| c.id != posted.id));
    }

    #[test]
    fn list_is_newest_first_and_repeatable() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        for text in ["one", "two", "three"] {
            f.service.create(&viewer, f.livestream_id, &post(text, 10)).unwrap();
        }

        let first = f.service.list(&viewer, f.livestream_id, None).unwrap();
        let second = f.service.list(&viewer, f.livestream_id, None).unwrap();
        assert_eq!(texts(&first), vec!["three", "two", "one"]);
        assert_eq!(first, second);
    }

    #[test]
    fn limit_caps_results_with_and_without_cache() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        for text in ["a", "b", "c"] {
            f.service.create(&viewer, f.livestream_id, &post(text, 0)).unwrap();
        }

        let uncached = f.service.list(&viewer, f.livestream_id, Some(2)).unwrap();
        assert_eq!(texts(&uncached), vec!["c", "b"]);

        // A limited read must not populate the cache with a partial list
        let full = f.service.list(&viewer, f.livestream_id, None).unwrap();
        assert_eq!(full.len(), 3);

        let cached = f.service.list(&viewer, f.livestream_id, Some(2)).unwrap();
        assert_eq!(cached, uncached);
        assert!(f.service.list(&viewer, f.livestream_id, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn create_invalidates_cached_list() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        f.service.create(&viewer, f.livestream_id, &post("before", 0)).unwrap();
        assert_eq!(f.service.list(&viewer, f.livestream_id, None).unwrap().len(), 1);

        f.service.create(&viewer, f.livestream_id, &post("after", 0)).unwrap();
        let list = f.service.list(&viewer, f.livestream_id, None).unwrap();
        assert_eq!(texts(&list), vec!["after", "before"]);
    }

    #[test]
    fn unknown_livestream_lists_empty() {
        let f = fixture();
        let list = f.service.list(&Caller::new(f.viewer), 9999, None).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn create_on_unknown_livestream_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .create(&Caller::new(f.viewer), 9999, &post("hi", 0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("livestream")));
    }

    #[test]
    fn negative_tip_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .create(&Caller::new(f.viewer), f.livestream_id, &post("hi", -5))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn spam_is_rejected_and_not_stored() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        f.service.moderate(&Caller::new(f.owner), f.livestream_id, "buy now").unwrap();

        let err = f
            .service
            .create(&viewer, f.livestream_id, &post("cheap pills, buy now!", 500))
            .unwrap_err();
        assert!(matches!(err, Error::SpamDetected { ref word } if word == "buy now"));

        assert!(f.service.list(&viewer, f.livestream_id, None).unwrap().is_empty());
        f.service.create(&viewer, f.livestream_id, &post("buy later", 0)).unwrap();
    }

    #[test]
    fn moderate_purges_all_registered_words_on_that_stream_only() {
        let f = fixture();
        let owner = Caller::new(f.owner);
        let other_stream = f
            .service
            .db()
            .write_tx(|tx| new_livestream(tx, f.owner))
            .unwrap();

        f.service.moderate(&owner, f.livestream_id, "spam").unwrap();

        // Rows that predate the filter, written straight to the store
        f.service
            .db()
            .write_tx(|tx| -> anyhow::Result<()> {
                queries::insert_livecomment(tx, f.viewer, f.livestream_id, "old spam", 0, 1)?;
                queries::insert_livecomment(tx, f.viewer, f.livestream_id, "old junk", 0, 2)?;
                queries::insert_livecomment(tx, f.viewer, f.livestream_id, "fine", 0, 3)?;
                queries::insert_livecomment(tx, f.viewer, other_stream, "junk elsewhere", 0, 4)?;
                Ok(())
            })
            .unwrap();

        // Warm the cache so the purge must invalidate it
        assert_eq!(f.service.list(&owner, f.livestream_id, None).unwrap().len(), 3);

        f.service.moderate(&owner, f.livestream_id, "junk").unwrap();

        let left = f.service.list(&owner, f.livestream_id, None).unwrap();
        assert_eq!(texts(&left), vec!["fine"]);

        let elsewhere = f.service.list(&owner, other_stream, None).unwrap();
        assert_eq!(texts(&elsewhere), vec!["junk elsewhere"]);
    }

    #[test]
    fn non_owner_cannot_moderate() {
        let f = fixture();
        let err = f
            .service
            .moderate(&Caller::new(f.viewer), f.livestream_id, "anything")
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));

        let stored = f
            .service
            .db()
            .read_tx(|tx| queries::list_ng_words_for_livestream(tx, f.livestream_id))
            .unwrap();
        assert!(stored.is_empty());

        let err = f
            .service
            .moderate(&Caller::new(f.owner), 9999, "anything")
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[test]
    fn empty_ng_word_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .moderate(&Caller::new(f.owner), f.livestream_id, "")
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn ng_words_listed_newest_first_for_caller() {
        let f = fixture();
        let owner = Caller::new(f.owner);
        let first = f.service.moderate(&owner, f.livestream_id, "first").unwrap();
        let second = f.service.moderate(&owner, f.livestream_id, "second").unwrap();

        let words = f.service.list_ng_words(&owner, f.livestream_id).unwrap();
        let ids: Vec<i64> = words.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(words.iter().all(|w| w.user_id == f.owner && w.livestream_id == f.livestream_id));

        let viewer_words = f.service.list_ng_words(&Caller::new(f.viewer), f.livestream_id).unwrap();
        assert!(viewer_words.is_empty());
    }

    #[test]
    fn report_embeds_reporter_and_comment() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        let owner = Caller::new(f.owner);
        let posted = f.service.create(&viewer, f.livestream_id, &post("rude", 0)).unwrap();

        let report = f.service.report(&owner, f.livestream_id, posted.id).unwrap();
        assert_eq!(report.livecomment.id, posted.id);
        assert_eq!(report.reporter.id, f.owner);
        assert_eq!(report.livecomment.user.id, f.viewer);

        // Duplicate reports are accepted
        let again = f.service.report(&owner, f.livestream_id, posted.id).unwrap();
        assert_ne!(again.id, report.id);
    }

    #[test]
    fn report_requires_existing_stream_and_comment() {
        let f = fixture();
        let viewer = Caller::new(f.viewer);
        let posted = f.service.create(&viewer, f.livestream_id, &post("hi", 0)).unwrap();

        let err = f.service.report(&viewer, 9999, posted.id).unwrap_err();
        assert!(matches!(err, Error::NotFound("livestream")));

        let err = f.service.report(&viewer, f.livestream_id, 9999).unwrap_err();
        assert!(matches!(err, Error::NotFound("livecomment")));
    }

    #[test]
    fn cancelled_request_rolls_back() {
        let f = fixture();
        let token = CancellationToken::new();
        let caller = Caller::with_cancel(f.viewer, token.clone());
        token.cancel();

        let err = f
            .service
            .create(&caller, f.livestream_id, &post("never lands", 0))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let err = f
            .service
            .moderate(&Caller::with_cancel(f.owner, token), f.livestream_id, "x")
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let viewer = Caller::new(f.viewer);
        assert!(f.service.list(&viewer, f.livestream_id, None).unwrap().is_empty());
        assert!(f.service.list_ng_words(&Caller::new(f.owner), f.livestream_id).unwrap().is_empty());
    }

    #[test]
    fn concurrent_posts_and_reads() {
        let f = fixture();
        let service = Arc::new(f.service);
        let livestream_id = f.livestream_id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                let user = if i % 2 == 0 { f.viewer } else { f.owner };
                std::thread::spawn(move || {
                    let caller = Caller::new(user);
                    service
                        .create(&caller, livestream_id, &post(&format!("msg {i}"), i))
                        .unwrap();
                    service.list(&caller, livestream_id, None).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let list = service.list(&Caller::new(f.viewer), livestream_id, None).unwrap();
        assert_eq!(list.len(), 8);
    }
}
