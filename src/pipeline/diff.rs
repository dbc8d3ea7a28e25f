//! Sentence and word level change detection.
//!
//! Two snapshots of a page are split into sentences, paired up, and each
//! differing pair is diffed word by word. Only words present on the new side
//! are reported; a pair whose new side contains no inserted words yields
//! nothing.
//!
//! ```text
//! old: the price is 10 dollars.
//! new: the price is 15 dollars now.
//!                   ^^ ^^^^^^^ ^^^^
//! context: price is <b>15</b> <b>dollars</b> <b>now.</b>
//! ```

use chrono::{DateTime, Utc};
use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::models::{Change, ChangeAction, SentenceAlignment};
use crate::pipeline::text::sentences;
use crate::utils::markup;

/// Words of context kept on each side of the changed span.
pub const CONTEXT_WORDS: usize = 2;

/// Word-level differ for a single pair of sentences.
#[derive(Debug, Clone, Copy)]
pub struct WordDiffer {
    context_words: usize,
}

impl Default for WordDiffer {
    fn default() -> Self {
        Self::new(CONTEXT_WORDS)
    }
}

impl WordDiffer {
    /// Create a differ keeping `context_words` words around the changed span.
    pub fn new(context_words: usize) -> Self {
        Self { context_words }
    }

    /// Diff two sentences and describe the words inserted into `new`.
    ///
    /// Returns `None` when `new` has no inserted words (identical sentences,
    /// pure deletions).
    pub fn diff(&self, old: &str, new: &str, observed_at: DateTime<Utc>) -> Option<Change> {
        let old_words: Vec<&str> = old.split_whitespace().collect();
        let new_words: Vec<&str> = new.split_whitespace().collect();

        let mut inserted = vec![false; new_words.len()];
        for op in capture_diff_slices(Algorithm::Myers, &old_words, &new_words) {
            let (tag, _, new_range) = op.as_tag_tuple();
            if matches!(tag, DiffTag::Insert | DiffTag::Replace) {
                for idx in new_range {
                    inserted[idx] = true;
                }
            }
        }

        let first = inserted.iter().position(|&changed| changed)?;
        let last = inserted.iter().rposition(|&changed| changed)?;
        let start = first.saturating_sub(self.context_words);
        let end = last
            .saturating_add(self.context_words)
            .saturating_add(1)
            .min(new_words.len());

        let context = (start..end)
            .map(|idx| {
                let word = markup::escape(new_words[idx]);
                if inserted[idx] {
                    markup::bold(&word)
                } else {
                    word
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let changed_text = new_words
            .iter()
            .zip(&inserted)
            .filter(|(_, changed)| **changed)
            .map(|(word, _)| *word)
            .collect::<Vec<_>>()
            .join(" ");

        Some(Change {
            changed_text,
            action: ChangeAction::Added,
            context,
            observed_at,
        })
    }

    /// Describe a sentence that disappeared entirely.
    fn removed(&self, sentence: &str, observed_at: DateTime<Utc>) -> Change {
        Change {
            changed_text: sentence.to_string(),
            action: ChangeAction::Removed,
            context: markup::escape(sentence),
            observed_at,
        }
    }
}

/// Produces the ordered change list between two full page texts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeAggregator {
    differ: WordDiffer,
    alignment: SentenceAlignment,
}

impl ChangeAggregator {
    /// Create an aggregator with the default word differ.
    pub fn new(alignment: SentenceAlignment) -> Self {
        Self::with_differ(WordDiffer::default(), alignment)
    }

    pub fn with_differ(differ: WordDiffer, alignment: SentenceAlignment) -> Self {
        Self { differ, alignment }
    }

    /// Compute the changes from `old_text` to `new_text`, in sentence order.
    pub fn aggregate(
        &self,
        old_text: &str,
        new_text: &str,
        observed_at: DateTime<Utc>,
    ) -> Vec<Change> {
        match self.alignment {
            SentenceAlignment::Positional => self.positional(old_text, new_text, observed_at),
            SentenceAlignment::Aligned => self.aligned(old_text, new_text, observed_at),
        }
    }

    /// Pair sentences by index; surplus sentences on either side are ignored.
    fn positional(&self, old_text: &str, new_text: &str, observed_at: DateTime<Utc>) -> Vec<Change> {
        sentences(old_text)
            .zip(sentences(new_text))
            .filter(|(old, new)| old != new)
            .filter_map(|(old, new)| self.differ.diff(old, new, observed_at))
            .collect()
    }

    /// Align sentences by LCS, then word-diff the replaced runs.
    fn aligned(&self, old_text: &str, new_text: &str, observed_at: DateTime<Utc>) -> Vec<Change> {
        let old: Vec<&str> = sentences(old_text).collect();
        let new: Vec<&str> = sentences(new_text).collect();
        let mut changes = Vec::new();

        for op in capture_diff_slices(Algorithm::Lcs, &old, &new) {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => {}
                DiffTag::Delete => {
                    for sentence in &old[old_range] {
                        changes.push(self.differ.removed(sentence, observed_at));
                    }
                }
                DiffTag::Insert => {
                    for sentence in &new[new_range] {
                        changes.extend(self.differ.diff("", sentence, observed_at));
                    }
                }
                DiffTag::Replace => {
                    self.pair_run(&old[old_range], &new[new_range], observed_at, &mut changes);
                }
            }
        }

        changes
    }

    fn pair_run(
        &self,
        old: &[&str],
        new: &[&str],
        observed_at: DateTime<Utc>,
        changes: &mut Vec<Change>,
    ) {
        for (old_sentence, new_sentence) in old.iter().zip(new) {
            if old_sentence != new_sentence {
                changes.extend(self.differ.diff(old_sentence, new_sentence, observed_at));
            }
        }

        let paired = old.len().min(new.len());
        for sentence in &new[paired..] {
            changes.extend(self.differ.diff("", sentence, observed_at));
        }
        for sentence in &old[paired..] {
            changes.push(self.differ.removed(sentence, observed_at));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positional() -> ChangeAggregator {
        ChangeAggregator::new(SentenceAlignment::Positional)
    }

    fn aligned() -> ChangeAggregator {
        ChangeAggregator::new(SentenceAlignment::Aligned)
    }

    #[test]
    fn test_price_example() {
        let change = WordDiffer::default()
            .diff(
                "the price is 10 dollars.",
                "the price is 15 dollars now.",
                Utc::now(),
            )
            .unwrap();

        assert_eq!(change.action, ChangeAction::Added);
        assert!(change.changed_text.contains("15"));
        assert!(change.changed_text.contains("now."));
        assert!(change.context.starts_with("price is <b>15</b>"));
        assert!(change.context.ends_with("<b>now.</b>"));
    }

    #[test]
    fn test_context_window_is_bounded() {
        let change = WordDiffer::default()
            .diff("a b c d e f g", "a b c x d e f g", Utc::now())
            .unwrap();

        assert_eq!(change.changed_text, "x");
        assert_eq!(change.context, "b c <b>x</b> d e");
    }

    #[test]
    fn test_context_window_clamps_at_sentence_start() {
        let change = WordDiffer::default()
            .diff("b c d e", "a b c d e", Utc::now())
            .unwrap();
        assert_eq!(change.context, "<b>a</b> b c");
    }

    #[test]
    fn test_unbounded_context_covers_whole_sentence() {
        let change = WordDiffer::new(usize::MAX)
            .diff("a b c d", "a b x c d", Utc::now())
            .unwrap();
        assert_eq!(change.context, "a b <b>x</b> c d");
    }

    #[test]
    fn test_context_spans_all_changes() {
        let change = WordDiffer::default()
            .diff("one two three four five six", "zero one two three four five six seven", Utc::now())
            .unwrap();
        assert_eq!(change.changed_text, "zero seven");
        assert_eq!(
            change.context,
            "<b>zero</b> one two three four five six <b>seven</b>"
        );
    }

    #[test]
    fn test_pure_deletion_reports_nothing() {
        let change = WordDiffer::default().diff("the old price was 10", "the price was 10", Utc::now());
        assert!(change.is_none());
    }

    #[test]
    fn test_context_is_escaped() {
        let change = WordDiffer::default()
            .diff("a < b", "a < b & c", Utc::now())
            .unwrap();
        assert_eq!(change.changed_text, "& c");
        assert_eq!(change.context, "&lt; b <b>&amp;</b> <b>c</b>");
    }

    #[test]
    fn test_identical_texts_produce_no_changes() {
        let text = "first sentence. second one! third? trailing fragment";
        assert!(positional().aggregate(text, text, Utc::now()).is_empty());
        assert!(aligned().aggregate(text, text, Utc::now()).is_empty());
        assert!(positional().aggregate("", "", Utc::now()).is_empty());
    }

    #[test]
    fn test_changes_keep_sentence_order() {
        let old = "alpha one. beta two. gamma three.";
        let new = "alpha one more. beta two. gamma three again.";
        let changes = positional().aggregate(old, new, Utc::now());

        let texts: Vec<&str> = changes.iter().map(|c| c.changed_text.as_str()).collect();
        assert_eq!(texts, vec!["one more.", "three again."]);
    }

    #[test]
    fn test_positional_ignores_surplus_sentences() {
        let changes = positional().aggregate("one. two.", "one. two. three.", Utc::now());
        assert!(changes.is_empty());

        let changes = positional().aggregate("one. two. three.", "one. two.", Utc::now());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_positional_never_reports_removals() {
        let changes = positional().aggregate(
            "intro here. body text.",
            "body text. footer.",
            Utc::now(),
        );
        assert!(changes.iter().all(|c| c.action == ChangeAction::Added));
    }

    #[test]
    fn test_aligned_reports_inserted_sentence_only() {
        let old = "alpha beta. gamma delta.";
        let new = "new intro. alpha beta. gamma delta.";

        // positional pairing shifts every sentence
        assert_eq!(positional().aggregate(old, new, Utc::now()).len(), 2);

        let changes = aligned().aggregate(old, new, Utc::now());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Added);
        assert_eq!(changes[0].changed_text, "new intro.");
        assert_eq!(changes[0].context, "<b>new</b> <b>intro.</b>");
    }

    #[test]
    fn test_aligned_reports_removed_sentence() {
        let changes = aligned().aggregate("keep this. drop this.", "keep this.", Utc::now());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Removed);
        assert_eq!(changes[0].changed_text, "drop this.");
    }

    #[test]
    fn test_aligned_word_diffs_replaced_sentence() {
        let changes = aligned().aggregate(
            "header. the price is 10 dollars. footer.",
            "header. the price is 15 dollars. footer.",
            Utc::now(),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Added);
        assert!(changes[0].context.contains("<b>15</b>"));
    }
}
