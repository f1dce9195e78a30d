//! Pure answer-normalization pipeline (spec.md §4.3), applied before all
//! comparisons. Kept free of I/O so it is cheaply unit- and proptest-able.

const LEADING_ARTICLES: [&str; 3] = ["a", "an", "the"];

const CONTRACTIONS: &[(&str, &str)] = &[
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("can't", "cannot"),
    ("couldn't", "could not"),
    ("won't", "will not"),
    ("wouldn't", "would not"),
    ("shouldn't", "should not"),
    ("haven't", "have not"),
    ("hasn't", "has not"),
    ("hadn't", "had not"),
    ("i'm", "i am"),
    ("you're", "you are"),
    ("we're", "we are"),
    ("they're", "they are"),
    ("it's", "it is"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("i've", "i have"),
    ("i'll", "i will"),
    ("i'd", "i would"),
];

/// `strip leading/trailing whitespace -> lowercase -> collapse inner
/// whitespace -> strip terminal punctuation -> expand contractions`.
pub fn normalize_answer(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let collapsed = collapse_whitespace(&lower);
    let stripped = strip_terminal_punctuation(&collapsed);
    expand_contractions(&stripped)
}

/// Strips a single leading article, applied only by callers that opt into
/// leading-article forgiveness (spec.md §4.3 `fill_blank`).
pub fn strip_leading_article(normalized: &str) -> Option<&str> {
    for article in LEADING_ARTICLES {
        let prefix = format!("{article} ");
        if let Some(rest) = normalized.strip_prefix(&prefix) {
            return Some(rest);
        }
    }
    None
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_terminal_punctuation(s: &str) -> String {
    s.trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .to_string()
}

fn expand_contractions(s: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for word in s.split(' ') {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
        if let Some((_, expansion)) = CONTRACTIONS.iter().find(|(c, _)| *c == cleaned) {
            words.push(expansion.to_string());
        } else {
            words.push(word.to_string());
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_normalization() {
        assert_eq!(normalize_answer("  The Dog.  "), "the dog");
        assert_eq!(normalize_answer("don't"), "do not");
        assert_eq!(normalize_answer("A   Cat!!"), "a cat");
    }

    #[test]
    fn strips_leading_article_for_fill_blank() {
        let normalized = normalize_answer("a house");
        assert_eq!(strip_leading_article(&normalized), Some("house"));
        assert_eq!(strip_leading_article("house"), None);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in ".{0,60}") {
            let once = normalize_answer(&raw);
            let twice = normalize_answer(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
