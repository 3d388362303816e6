/// Return the first NG word, in list order, that occurs in `text`.
///
/// Stops at the first hit. An empty word list never matches; an empty word
/// matches every text.
pub fn find_ng_word<'a, W: AsRef<str>>(text: &str, ng_words: &'a [W]) -> Option<&'a str> {
    ng_words
        .iter()
        .map(|word| word.as_ref())
        .find(|word| text.contains(word))
}

/// True if any NG word occurs in `text`.
pub fn is_spam<W: AsRef<str>>(text: &str, ng_words: &[W]) -> bool {
    find_ng_word(text, ng_words).is_some()
}
