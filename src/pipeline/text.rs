// src/pipeline/text.rs

//! Text normalization and sentence splitting.

use std::collections::HashSet;

/// Normalize fetched page text for comparison and keyword matching.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
}

/// Case-fold keywords, dropping blanks and duplicates (first occurrence wins).
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Split text into trimmed, non-empty sentences.
///
/// A boundary is whitespace that directly follows `.`, `!` or `?`. Text after
/// the last boundary is yielded as the final sentence.
pub fn sentences(text: &str) -> Sentences<'_> {
    Sentences { rest: text }
}

/// Iterator over the sentences of a text. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while !self.rest.is_empty() {
            let (sentence, rest) = split_first(self.rest);
            self.rest = rest;

            let sentence = sentence.trim();
            if !sentence.is_empty() {
                return Some(sentence);
            }
        }
        None
    }
}

fn split_first(text: &str) -> (&str, &str) {
    let mut after_terminal = false;
    for (idx, ch) in text.char_indices() {
        if after_terminal && ch.is_whitespace() {
            return (&text[..idx], text[idx..].trim_start());
        }
        after_terminal = matches!(ch, '.' | '!' | '?');
    }
    (text, "")
}
