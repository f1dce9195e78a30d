//! Extracts spaced-repetition items from a completed lesson (spec.md §4.7
//! post-class pipeline step 1, "best-effort").

use learner_store::{LessonSkillTag, SpacedItem, SpacedItemKind, TagType};
use learning_types::StudentId;

/// Grammar/pronunciation/conversation tags become learning points;
/// vocabulary tags become vocabulary cards. One item per distinct tag
/// value, freshly scheduled via `SpacedItem::new`.
pub fn extract_spaced_items(student_id: StudentId, tags: &[LessonSkillTag]) -> Vec<SpacedItem> {
    tags.iter()
        .map(|tag| {
            let kind = match tag.tag_type {
                TagType::Vocabulary => SpacedItemKind::VocabularyCard,
                TagType::Grammar | TagType::Pronunciation | TagType::Conversation => {
                    SpacedItemKind::LearningPoint
                }
            };
            SpacedItem::new(0, student_id, kind, tag.tag_value.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use learning_types::Cefr;

    #[test]
    fn vocabulary_tags_become_cards_others_become_points() {
        let tags = vec![
            LessonSkillTag {
                lesson_id: 1,
                tag_type: TagType::Vocabulary,
                tag_value: "everyday_greetings".into(),
                cefr_level: Cefr::A1,
            },
            LessonSkillTag {
                lesson_id: 1,
                tag_type: TagType::Grammar,
                tag_value: "word_order".into(),
                cefr_level: Cefr::A1,
            },
        ];
        let items = extract_spaced_items(1, &tags);
        assert_eq!(items[0].kind, SpacedItemKind::VocabularyCard);
        assert_eq!(items[1].kind, SpacedItemKind::LearningPoint);
    }
}
