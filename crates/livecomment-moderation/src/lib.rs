//! NG-word moderation: the post-time spam filter and the selection of
//! existing comments to purge when a stream gains a new NG word.
//!
//! Patterns are literal text. Matching is plain substring containment with no
//! wildcard or case folding.

pub mod filter;
pub mod purge;

pub use filter::{find_ng_word, is_spam};
pub use purge::{PurgeCandidate, purge_targets};
