//! Canonical skill taxonomy (spec.md §4.1).
//!
//! The taxonomy and alias table are embedded assets, not generated at
//! runtime: reviewing them is part of release (spec.md §9).

use learning_types::TagType;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

const TAXONOMY_TOML: &str = include_str!("../assets/taxonomy.toml");
const ALIASES_TOML: &str = include_str!("../assets/aliases.toml");

#[derive(Debug, serde::Deserialize)]
struct RawTopic {
    tags: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawTaxonomy {
    grammar: HashMap<String, RawTopic>,
    vocabulary: HashMap<String, RawTopic>,
    pronunciation: HashMap<String, RawTopic>,
    conversation: HashMap<String, RawTopic>,
}

#[derive(Debug, serde::Deserialize)]
struct RawAliases {
    aliases: HashMap<String, String>,
}

/// The fixed skill-tag hierarchy plus alias table.
pub struct Taxonomy {
    by_type: HashMap<TagType, HashSet<String>>,
    aliases: HashMap<String, String>,
}

static TAXONOMY: Lazy<Taxonomy> = Lazy::new(Taxonomy::load_embedded);

impl Taxonomy {
    fn load_embedded() -> Self {
        let raw: RawTaxonomy =
            toml::from_str(TAXONOMY_TOML).expect("embedded taxonomy.toml must parse");
        let raw_aliases: RawAliases =
            toml::from_str(ALIASES_TOML).expect("embedded aliases.toml must parse");

        let mut by_type = HashMap::new();
        by_type.insert(TagType::Grammar, flatten(&raw.grammar));
        by_type.insert(TagType::Vocabulary, flatten(&raw.vocabulary));
        by_type.insert(TagType::Pronunciation, flatten(&raw.pronunciation));
        by_type.insert(TagType::Conversation, flatten(&raw.conversation));

        Taxonomy {
            by_type,
            aliases: raw_aliases.aliases,
        }
    }

    /// The canonical tags legal for a given tag type. Used to constrain
    /// generator prompts (spec.md §4.1).
    pub fn canonical_tags_for(&self, tag_type: TagType) -> &HashSet<String> {
        self.by_type
            .get(&tag_type)
            .expect("every TagType variant has a taxonomy entry")
    }

    pub fn is_canonical(&self, tag: &str) -> bool {
        self.by_type.values().any(|tags| tags.contains(tag))
    }

    /// Pure, deterministic normalization: apply the alias table, otherwise
    /// return the input unchanged (spec.md §4.1).
    pub fn normalize(&self, raw: &str) -> String {
        match self.aliases.get(raw) {
            Some(canonical) => canonical.clone(),
            None => {
                if !self.is_canonical(raw) {
                    tracing::warn!(raw_tag = raw, "unmapped skill tag");
                }
                raw.to_string()
            }
        }
    }
}

fn flatten(topics: &HashMap<String, RawTopic>) -> HashSet<String> {
    topics
        .values()
        .flat_map(|topic| topic.tags.iter().cloned())
        .collect()
}

/// Canonical tags for a tag type, from the embedded global taxonomy.
pub fn canonical_tags_for(tag_type: TagType) -> &'static HashSet<String> {
    TAXONOMY.canonical_tags_for(tag_type)
}

/// Normalize a raw, possibly free-form skill tag into its canonical form.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)` holds because every
/// alias target is itself a canonical tag with no alias table entry of its
/// own (enforced by the property test below).
pub fn normalize(raw: &str) -> String {
    TAXONOMY.normalize(raw)
}

pub fn is_canonical(tag: &str) -> bool {
    TAXONOMY.is_canonical(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(normalize("grammar_articles_indefinite"), "articles_indefinite");
        assert_eq!(normalize("articles_a_an_usage"), "articles_indefinite");
        assert_eq!(
            normalize("grammar_articles_sentence_structure"),
            "word_order"
        );
    }

    #[test]
    fn unknown_tag_passes_through() {
        assert_eq!(normalize("grammar_rule"), "grammar_rule");
    }

    #[test]
    fn alias_targets_are_all_canonical() {
        for (raw, canonical) in TAXONOMY.aliases.iter() {
            assert!(
                TAXONOMY.is_canonical(canonical),
                "alias {raw} maps to non-canonical {canonical}"
            );
        }
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "[a-z_]{1,40}") {
            let once = normalize(&raw);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
