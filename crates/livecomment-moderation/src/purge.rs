use crate::filter::is_spam;

/// An existing comment considered for removal.
#[derive(Debug, Clone, Copy)]
pub struct PurgeCandidate<'a> {
    pub id: i64,
    pub livestream_id: i64,
    pub text: &'a str,
}

/// Select the ids of comments on `livestream_id` whose text contains any of
/// `ng_words`.
///
/// Candidates from other streams are ignored, so the caller may scan as wide
/// as it likes. Ids are returned in input order.
pub fn purge_targets<'a, I, W>(candidates: I, livestream_id: i64, ng_words: &[W]) -> Vec<i64>
where
    I: IntoIterator<Item = PurgeCandidate<'a>>,
    W: AsRef<str>,
{
    if ng_words.is_empty() {
        return Vec::new();
    }

    candidates
        .into_iter()
        .filter(|c| c.livestream_id == livestream_id)
        .filter(|c| is_spam(c.text, ng_words))
        .map(|c| c.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, livestream_id: i64, text: &str) -> PurgeCandidate<'_> {
        PurgeCandidate { id, livestream_id, text }
    }

    #[test]
    fn selects_matches_on_target_stream_only() {
        let comments = vec![
            candidate(1, 42, "hello world"),
            candidate(2, 42, "good evening"),
            candidate(3, 7, "another world"),
            candidate(4, 42, "worldwide"),
        ];
        let ids = purge_targets(comments, 42, &["world"]);
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn any_registered_word_triggers_removal() {
        let comments = vec![
            candidate(1, 1, "first spam"),
            candidate(2, 1, "second junk"),
            candidate(3, 1, "clean"),
        ];
        let words = vec!["spam".to_string(), "junk".to_string()];
        assert_eq!(purge_targets(comments, 1, &words), vec![1, 2]);
    }

    #[test]
    fn comment_matching_several_words_listed_once() {
        let comments = vec![candidate(9, 1, "spam and junk")];
        assert_eq!(purge_targets(comments, 1, &["spam", "junk"]), vec![9]);
    }

    #[test]
    fn no_words_purges_nothing() {
        let comments = vec![candidate(1, 1, "hello")];
        let words: [&str; 0] = [];
        assert!(purge_targets(comments, 1, &words).is_empty());
    }
}
