//! Pure, stateless signal classification (§4.5): thread-message text →
//! `{frustration, thanks, follow_up, none}` via an ordered rule sequence,
//! emoji reaction → `{positive_reaction, negative_reaction, none}` via
//! fixed allow-lists. `LazyLock`-compiled regexes, as `SPEC_FULL.md`'s
//! ambient-stack note directs for this component.

use std::sync::LazyLock;

use regex::RegexSet;

use crate::domain::SignalType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalClassification {
    pub signal_type: SignalType,
    pub value: f64,
}

static FRUSTRATION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bdoesn'?t work\b",
        r"(?i)\bnot working\b",
        r"(?i)\bstill (broken|failing|wrong)\b",
        r"(?i)\bthis is (wrong|incorrect|broken)\b",
        r"(?i)\bfrustrat",
        r"(?i)\bwtf\b",
    ])
    .unwrap()
});

static THANKS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bthanks?\b",
        r"(?i)\bthank you\b",
        r"(?i)\bexactly what i needed\b",
        r"(?i)\bappreciate",
    ])
    .unwrap()
});

static FOLLOW_UP_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^(what|how|why|when|where|who|can|could|does|is|are)\b.*\?",
        r"(?i)\bwhat about\b",
        r"(?i)\bhow about\b",
    ])
    .unwrap()
});

const POSITIVE_REACTIONS: &[&str] = &["thumbsup", "+1", "tada", "heart", "clap", "raised_hands"];
const NEGATIVE_REACTIONS: &[&str] = &["thumbsdown", "-1", "confused", "x", "cry"];

/// Classifies free text per the ordered rule sequence: frustration wins over
/// gratitude wins over question. Same input always produces the same output.
pub fn classify_text(text: &str) -> Option<SignalClassification> {
    if FRUSTRATION_PATTERNS.is_match(text) {
        return Some(SignalClassification {
            signal_type: SignalType::Frustration,
            value: -0.5,
        });
    }
    if THANKS_PATTERNS.is_match(text) {
        return Some(SignalClassification {
            signal_type: SignalType::Thanks,
            value: 0.4,
        });
    }
    if FOLLOW_UP_PATTERNS.is_match(text) {
        return Some(SignalClassification {
            signal_type: SignalType::FollowUp,
            value: -0.3,
        });
    }
    None
}

/// Classifies an emoji reaction name (without surrounding colons).
pub fn classify_reaction(reaction: &str) -> Option<SignalClassification> {
    let reaction = reaction.trim_matches(':');
    if POSITIVE_REACTIONS.contains(&reaction) {
        return Some(SignalClassification {
            signal_type: SignalType::PositiveReaction,
            value: 0.5,
        });
    }
    if NEGATIVE_REACTIONS.contains(&reaction) {
        return Some(SignalClassification {
            signal_type: SignalType::NegativeReaction,
            value: -0.5,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thanks_message_classifies_as_gratitude() {
        let result = classify_text("Thanks, that's exactly what I needed!").unwrap();
        assert_eq!(result.signal_type, SignalType::Thanks);
        assert_eq!(result.value, 0.4);
    }

    #[test]
    fn frustration_message_classifies_correctly() {
        let result = classify_text("this doesn't work").unwrap();
        assert_eq!(result.signal_type, SignalType::Frustration);
        assert_eq!(result.value, -0.5);
    }

    #[test]
    fn question_classifies_as_follow_up() {
        let result = classify_text("How about the staging env?").unwrap();
        assert_eq!(result.signal_type, SignalType::FollowUp);
        assert_eq!(result.value, -0.3);
    }

    #[test]
    fn positive_and_negative_reactions_classify() {
        assert_eq!(classify_reaction("thumbsup").unwrap().value, 0.5);
        assert_eq!(classify_reaction("thumbsdown").unwrap().value, -0.5);
        assert_eq!(classify_reaction("tada").unwrap().signal_type, SignalType::PositiveReaction);
    }

    #[test]
    fn classification_is_pure() {
        let a = classify_text("Thanks so much!");
        let b = classify_text("Thanks so much!");
        assert_eq!(a, b);
    }

    #[test]
    fn frustration_wins_over_gratitude() {
        let result = classify_text("thanks but this is wrong and doesn't work").unwrap();
        assert_eq!(result.signal_type, SignalType::Frustration);
    }
}
