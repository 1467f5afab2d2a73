//! Markdown rendering for provider payloads.
//!
//! The provider enforces no schema, so rendering starts with an explicit
//! classification step ([`classify`]) over the recognized payload shapes,
//! then dispatches to one renderer per shape. Anything unrecognized falls
//! back to a pretty-printed JSON dump rather than an error.
//!
//! [`format_note`] is pure: all I/O-free, deterministic given the record,
//! date, and generation timestamp.

use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate};
use serde_json::{Map, Value};

/// Which pipeline produced the note; rendered into the metadata footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Daily,
    Bulk,
    Retry,
}

impl ImportMode {
    pub fn label(&self) -> &'static str {
        match self {
            ImportMode::Daily => "Daily Sync",
            ImportMode::Bulk => "Bulk Historical Import",
            ImportMode::Retry => "Retry Import",
        }
    }
}

/// Recognized payload shapes, classified before rendering.
#[derive(Debug)]
pub enum RecordShape<'a> {
    /// Ordered list of lifelog entries with typed content items
    Lifelogs(&'a [Value]),
    /// Object with a `conversations` array
    Conversations(&'a [Value]),
    /// Object with an `events` array
    Events(&'a [Value]),
    /// Object with a plain `transcript` string
    Transcript(&'a str),
    /// Object with a `daily_summary` plus arbitrary extra keys
    DailySummary(&'a Map<String, Value>),
    /// Object matching none of the above
    RawObject(&'a Map<String, Value>),
    /// Non-list, non-object payload
    Scalar(&'a Value),
}

/// Classify a raw record into one of the recognized shapes.
pub fn classify(record: &Value) -> RecordShape<'_> {
    match record {
        Value::Array(entries) => RecordShape::Lifelogs(entries),
        Value::Object(map) => {
            if let Some(conversations) = map.get("conversations").and_then(Value::as_array) {
                RecordShape::Conversations(conversations)
            } else if let Some(events) = map.get("events").and_then(Value::as_array) {
                RecordShape::Events(events)
            } else if let Some(transcript) = map.get("transcript").and_then(Value::as_str) {
                RecordShape::Transcript(transcript)
            } else if map.contains_key("daily_summary") {
                RecordShape::DailySummary(map)
            } else {
                RecordShape::RawObject(map)
            }
        }
        other => RecordShape::Scalar(other),
    }
}

/// Render a raw record into the full note document for one date.
pub fn format_note(
    record: &Value,
    date: NaiveDate,
    mode: ImportMode,
    generated_at: DateTime<Local>,
) -> String {
    let timestamp = generated_at.format("%Y-%m-%d %H:%M:%S");

    let mut out = format!(
        "# Daily Notes - {title}\n\n\
         **Date**: {iso}\n\
         **Day**: {weekday}\n\
         **Import Time**: {timestamp}\n\n\
         ---\n\n",
        title = date.format("%B %d, %Y"),
        iso = date.format("%Y-%m-%d"),
        weekday = date.format("%A"),
    );

    match classify(record) {
        RecordShape::Lifelogs(entries) => {
            out.push_str("## Lifelogs\n\n");
            render_lifelogs(&mut out, entries);
        }
        RecordShape::Conversations(conversations) => {
            out.push_str("## Transcript\n\n");
            render_conversations(&mut out, conversations);
        }
        RecordShape::Events(events) => {
            out.push_str("## Transcript\n\n");
            render_events(&mut out, events);
        }
        RecordShape::Transcript(transcript) => {
            out.push_str("## Transcript\n\n");
            out.push_str(transcript);
            out.push('\n');
        }
        RecordShape::DailySummary(map) => {
            out.push_str("## Transcript\n\n");
            render_daily_summary(&mut out, map);
        }
        RecordShape::RawObject(map) => {
            out.push_str("## Transcript\n\n");
            let _ = write!(
                out,
                "### Raw Data\n\n```json\n{}\n```\n",
                pretty_json(&Value::Object(map.clone()))
            );
        }
        RecordShape::Scalar(value) => {
            out.push_str("## Transcript\n\n");
            out.push_str(&scalar_to_string(value));
            out.push('\n');
        }
    }

    if let Some(stats) = render_statistics(record) {
        out.push_str(&stats);
    }

    let _ = write!(
        out,
        "\n---\n\n\
         ## Metadata\n\n\
         - **Source**: Limitless Pendant\n\
         - **Import Type**: {mode}\n\
         - **API Version**: v1\n\
         - **Imported**: {timestamp}\n\n\
         ---\n\n\
         *This note was automatically generated by lifelog-sync*\n",
        mode = mode.label(),
    );

    out
}

/// Render lifelog entries: one numbered subsection per entry, then the
/// type-tag rule for each content item.
fn render_lifelogs(out: &mut String, entries: &[Value]) {
    for (idx, entry) in entries.iter().enumerate() {
        let _ = write!(out, "\n### Lifelog {}\n", idx + 1);

        if let Some(contents) = entry.get("contents").and_then(Value::as_array) {
            for item in contents {
                render_content_item(out, item);
            }
        }

        out.push_str("\n---\n");
    }
}

fn render_content_item(out: &mut String, item: &Value) {
    let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
    let content = item.get("content").and_then(Value::as_str).unwrap_or("");

    match item_type {
        "heading1" => {
            let _ = write!(out, "\n# {}\n", content);
        }
        "heading2" => {
            let _ = write!(out, "\n## {}\n", content);
        }
        "blockquote" => {
            let speaker = item
                .get("speakerName")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");

            // Malformed start times degrade to a speaker-only prefix
            let time_prefix = item
                .get("startTime")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|t| format!("[{}] ", t.format("%H:%M:%S")));

            let _ = write!(
                out,
                "\n**{}{}:**\n> {}\n",
                time_prefix.as_deref().unwrap_or(""),
                speaker,
                content
            );
        }
        _ => {
            let _ = write!(out, "\n{}\n", content);
        }
    }
}

fn render_conversations(out: &mut String, conversations: &[Value]) {
    for (idx, conversation) in conversations.iter().enumerate() {
        let _ = write!(out, "\n### Conversation {}\n", idx + 1);

        if let Some(timestamp) = conversation.get("timestamp") {
            let _ = writeln!(out, "**Time**: {}", scalar_to_string(timestamp));
        }
        if let Some(duration) = conversation.get("duration") {
            let _ = writeln!(out, "**Duration**: {}", scalar_to_string(duration));
        }
        if let Some(participants) = conversation.get("participants").and_then(Value::as_array) {
            let _ = writeln!(out, "**Participants**: {}", join_strings(participants));
        }

        let text = conversation
            .get("text")
            .or_else(|| conversation.get("transcript"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let _ = write!(out, "\n{}\n\n", text);

        if let Some(tags) = conversation.get("tags").and_then(Value::as_array) {
            let _ = write!(out, "**Tags**: {}\n\n", join_strings(tags));
        }
    }
}

fn render_events(out: &mut String, events: &[Value]) {
    for (idx, event) in events.iter().enumerate() {
        let _ = write!(out, "\n### Event {}\n", idx + 1);

        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("Unknown");
        let _ = writeln!(out, "**Type**: {}", event_type);

        let timestamp = event
            .get("timestamp")
            .map(scalar_to_string)
            .unwrap_or_else(|| "N/A".to_string());
        let _ = write!(out, "**Time**: {}\n\n", timestamp);

        let description = event
            .get("description")
            .or_else(|| event.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let _ = write!(out, "{}\n\n", description);
    }
}

fn render_daily_summary(out: &mut String, map: &Map<String, Value>) {
    out.push_str("### Daily Summary\n\n");
    if let Some(summary) = map.get("daily_summary") {
        out.push_str(&scalar_to_string(summary));
    }
    out.push_str("\n\n");

    for (key, value) in map {
        if key == "daily_summary" || !is_truthy(value) {
            continue;
        }

        let _ = write!(out, "### {}\n\n", title_case(key));
        match value {
            Value::Array(_) | Value::Object(_) => {
                let _ = write!(out, "```json\n{}\n```\n\n", pretty_json(value));
            }
            scalar => {
                let _ = write!(out, "{}\n\n", scalar_to_string(scalar));
            }
        }
    }
}

/// Statistics line joining the present summary fields, when any exist.
fn render_statistics(record: &Value) -> Option<String> {
    let map = record.as_object()?;

    let mut stats = Vec::new();
    if let Some(words) = map.get("word_count") {
        stats.push(format!("Words: {}", scalar_to_string(words)));
    }
    if let Some(duration) = map.get("duration_minutes") {
        stats.push(format!("Duration: {} min", scalar_to_string(duration)));
    }
    if let Some(count) = map.get("conversation_count") {
        stats.push(format!("Conversations: {}", scalar_to_string(count)));
    }

    if stats.is_empty() {
        return None;
    }

    Some(format!(
        "\n---\n\n## Statistics\n\n{}\n",
        stats.join(" | ")
    ))
}

/// Render a scalar JSON value without surrounding quotes for strings.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn join_strings(values: &[Value]) -> String {
    values
        .iter()
        .map(scalar_to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Python-style truthiness: nulls, empty containers, empty strings,
/// false, and zero do not get their own subsection.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `word_count` -> `Word Count`
fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn render(record: &Value) -> String {
        format_note(record, test_date(), ImportMode::Bulk, Local::now())
    }

    fn assert_common_structure(note: &str) {
        assert!(note.contains("# Daily Notes - January 15, 2024"));
        assert!(note.contains("**Date**: 2024-01-15"));
        assert!(note.contains("**Day**: Monday"));
        assert!(note.contains("- **Source**: Limitless Pendant"));
        assert!(note.contains("- **API Version**: v1"));
    }

    #[test]
    fn test_lifelogs_shape() {
        let record = json!([
            {
                "contents": [
                    {"type": "heading1", "content": "Morning Standup"},
                    {"type": "heading2", "content": "Action Items"},
                    {
                        "type": "blockquote",
                        "content": "Let's ship it today.",
                        "speakerName": "Alice",
                        "startTime": "2024-01-15T09:30:05Z"
                    },
                    {"type": "text", "content": "General discussion followed."}
                ]
            }
        ]);

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("## Lifelogs"));
        assert!(note.contains("### Lifelog 1"));
        assert!(note.contains("# Morning Standup"));
        assert!(note.contains("## Action Items"));
        assert!(note.contains("**[09:30:05] Alice:**\n> Let's ship it today."));
        assert!(note.contains("General discussion followed."));
    }

    #[test]
    fn test_blockquote_malformed_start_time_degrades() {
        let record = json!([
            {
                "contents": [
                    {
                        "type": "blockquote",
                        "content": "hello",
                        "speakerName": "Bob",
                        "startTime": "not-a-timestamp"
                    }
                ]
            }
        ]);

        let note = render(&record);
        assert!(note.contains("**Bob:**\n> hello"));
        assert!(!note.contains('['));
    }

    #[test]
    fn test_blockquote_missing_speaker_defaults_to_unknown() {
        let record = json!([
            {"contents": [{"type": "blockquote", "content": "who said this"}]}
        ]);

        let note = render(&record);
        assert!(note.contains("**Unknown:**\n> who said this"));
    }

    #[test]
    fn test_conversations_shape() {
        let record = json!({
            "conversations": [
                {
                    "timestamp": "2024-01-15T10:00:00Z",
                    "duration": "25m",
                    "participants": ["Alice", "Bob"],
                    "text": "We discussed the roadmap.",
                    "tags": ["planning", "roadmap"]
                },
                {
                    "transcript": "Fallback body text."
                }
            ]
        });

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("### Conversation 1"));
        assert!(note.contains("**Time**: 2024-01-15T10:00:00Z"));
        assert!(note.contains("**Duration**: 25m"));
        assert!(note.contains("**Participants**: Alice, Bob"));
        assert!(note.contains("We discussed the roadmap."));
        assert!(note.contains("**Tags**: planning, roadmap"));
        // `text` missing falls back to `transcript`
        assert!(note.contains("### Conversation 2"));
        assert!(note.contains("Fallback body text."));
    }

    #[test]
    fn test_events_shape() {
        let record = json!({
            "events": [
                {"type": "meeting", "timestamp": "10:00", "description": "Team sync"},
                {"text": "Untyped event"}
            ]
        });

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("### Event 1"));
        assert!(note.contains("**Type**: meeting"));
        assert!(note.contains("Team sync"));
        assert!(note.contains("**Type**: Unknown"));
        assert!(note.contains("**Time**: N/A"));
        assert!(note.contains("Untyped event"));
    }

    #[test]
    fn test_transcript_shape() {
        let record = json!({"transcript": "Verbatim transcript text."});

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("Verbatim transcript text."));
    }

    #[test]
    fn test_daily_summary_shape() {
        let record = json!({
            "daily_summary": "A productive day.",
            "key_topics": ["rust", "sync"],
            "mood": "good",
            "empty_field": "",
            "skipped_null": null
        });

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("### Daily Summary\n\nA productive day."));
        assert!(note.contains("### Key Topics"));
        assert!(note.contains("```json"));
        assert!(note.contains("### Mood\n\ngood"));
        assert!(!note.contains("Empty Field"));
        assert!(!note.contains("Skipped Null"));
    }

    #[test]
    fn test_raw_fallback_shape() {
        let record = json!({"unrecognized": {"nested": true}});

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("### Raw Data"));
        assert!(note.contains("```json"));
        assert!(note.contains("\"unrecognized\""));
    }

    #[test]
    fn test_scalar_shape() {
        let record = json!("just a string");

        let note = render(&record);
        assert_common_structure(&note);
        assert!(note.contains("just a string"));
    }

    #[test]
    fn test_statistics_line() {
        let record = json!({
            "transcript": "text",
            "word_count": 1200,
            "duration_minutes": 45,
            "conversation_count": 3
        });

        let note = render(&record);
        assert!(note.contains("## Statistics"));
        assert!(note.contains("Words: 1200 | Duration: 45 min | Conversations: 3"));
    }

    #[test]
    fn test_statistics_partial_fields() {
        let record = json!({"transcript": "text", "word_count": 10});

        let note = render(&record);
        assert!(note.contains("Words: 10"));
        assert!(!note.contains(" | "));
    }

    #[test]
    fn test_no_statistics_without_fields() {
        let note = render(&json!({"transcript": "text"}));
        assert!(!note.contains("## Statistics"));
    }

    #[test]
    fn test_import_mode_labels() {
        assert_eq!(ImportMode::Daily.label(), "Daily Sync");
        assert_eq!(ImportMode::Bulk.label(), "Bulk Historical Import");
        assert_eq!(ImportMode::Retry.label(), "Retry Import");

        let note = format_note(
            &json!({"transcript": "x"}),
            test_date(),
            ImportMode::Daily,
            Local::now(),
        );
        assert!(note.contains("- **Import Type**: Daily Sync"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("word_count"), "Word Count");
        assert_eq!(title_case("mood"), "Mood");
    }
}
