//! Notification message rendering.
//!
//! Messages use HTML parse mode with bold, italic and newlines only. Every
//! rendered message passes through [`bound`], which enforces the transport's
//! hard size ceiling.

use chrono::{DateTime, Utc};

use crate::models::{Change, ChangeAction};
use crate::utils::markup::{bold, escape, italic};

/// Longest message the transport accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Length an oversized message is cut down to before the notice is appended.
pub const TRUNCATED_CHARS: usize = 4000;

pub const TRUNCATION_NOTICE: &str = "\n\n... (message truncated due to length)";

/// Number of update-log entries listed under "Previous Changes".
pub const HISTORY_LIMIT: usize = 5;

/// Timestamp format shown to recipients.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Message announcing newly found keywords.
pub fn keyword_found_message(url: &str, keywords: &[String], found_at: DateTime<Utc>) -> String {
    let found_at = found_at.format(TIME_FORMAT);
    let url = escape(url);

    let message = match keywords {
        [keyword] => format!(
            "🔔 {}\n\n{} {}\n{} {}\n{} {}",
            bold("Keyword Found!"),
            bold("Keyword:"),
            escape(keyword),
            bold("URL:"),
            url,
            bold("Found at:"),
            found_at
        ),
        _ => {
            let list = keywords
                .iter()
                .map(|k| format!("• {}", escape(k)))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "🔔 {}\n\n{}\n{}\n\n{} {}\n{} {}",
                bold("Multiple Keywords Found!"),
                bold("Keywords:"),
                list,
                bold("URL:"),
                url,
                bold("Found at:"),
                found_at
            )
        }
    };

    bound(message)
}

/// Detailed change message: this cycle's changes plus recent history.
///
/// `update_log` is the full log, already including `new_changes`.
pub fn detailed_update_message(url: &str, new_changes: &[Change], update_log: &[Change]) -> String {
    let mut message = format!(
        "🔄 {}\n\n{} {}\n\n",
        bold("Website Changes Detected"),
        bold("URL:"),
        escape(url)
    );

    if !new_changes.is_empty() {
        message.push_str(&bold("New Changes:"));
        message.push('\n');
        for change in new_changes {
            push_change(&mut message, change);
        }
        message.push('\n');
    }

    if !update_log.is_empty() {
        message.push_str(&bold("Previous Changes:"));
        message.push('\n');
        let skip = update_log.len().saturating_sub(HISTORY_LIMIT);
        for change in &update_log[skip..] {
            push_change(&mut message, change);
        }
    }

    bound(message)
}

/// Short change notice used when detailed updates are disabled.
pub fn summary_update_message(url: &str, detected_at: DateTime<Utc>) -> String {
    bound(format!(
        "🔄 {}\n\n{} {}\n{} {}\n\nℹ️ Detailed updates are available but not shown. Enable detailed updates to see them.",
        bold("Website Changes Detected"),
        bold("URL:"),
        escape(url),
        bold("Changes detected at:"),
        detected_at.format(TIME_FORMAT)
    ))
}

fn push_change(message: &mut String, change: &Change) {
    let marker = match change.action {
        ChangeAction::Added => "🟢",
        ChangeAction::Removed => "🔴",
    };
    message.push_str(&format!(
        "{} {} {}\n",
        marker,
        bold(&format!("{}:", change.action.label())),
        escape(&change.changed_text)
    ));
    if !change.context.is_empty() {
        // context already carries its own markup
        message.push_str(&format!("   {} {}\n", italic("Context:"), change.context));
    }
}

/// Enforce the transport size ceiling.
///
/// Messages longer than [`MAX_MESSAGE_CHARS`] become their first
/// [`TRUNCATED_CHARS`] characters followed by [`TRUNCATION_NOTICE`].
/// The cut is exact and may land inside a tag or entity.
pub fn bound(message: String) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message;
    }
    let mut truncated: String = message.chars().take(TRUNCATED_CHARS).collect();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}
