//! Entity extraction: transcript to structured command
//!
//! The chat model is instructed to reply with a single JSON object; the
//! first balanced `{...}` span of the reply is parsed and normalized into
//! a [`Command`]. Categorical fields are clamped to their closed
//! vocabularies here, never trusted from the model.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::{Exam, ExamType, NewExam, NewReminder, Reminder};
use crate::llm::{ChatMessage, SharedChatBackend};
use crate::{Error, Result};

/// Kind of record a delete request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Reminder,
    Exam,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Exam => "exam",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reminder" | "reminders" | "assignment" | "assignments" => Some(Self::Reminder),
            "exam" | "exams" => Some(Self::Exam),
            _ => None,
        }
    }
}

/// Records selected for deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub kind: ItemKind,
    pub ids: Vec<String>,
}

/// Structured command produced by extraction
#[derive(Debug, Clone)]
pub enum Command {
    CreateReminder(NewReminder),
    CreateExam(NewExam),
    Delete(DeleteTarget),
    Clarification(String),
}

/// Raw JSON shape the model is asked to emit
#[derive(Debug, Default, Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    subject: Option<String>,
    date: Option<String>,
    time: Option<String>,
    exam_type: Option<String>,
    description: Option<String>,
    message: Option<String>,
    item_type: Option<String>,
    #[serde(default)]
    item_ids: Vec<String>,
}

/// Turns transcripts into [`Command`]s via the chat model
pub struct Extractor {
    backend: SharedChatBackend,
}

impl Extractor {
    /// Create a new extractor
    #[must_use]
    pub fn new(backend: SharedChatBackend) -> Self {
        Self { backend }
    }

    /// Extract a creation command from the transcript
    ///
    /// The model may instead return a clarification, or a bare delete
    /// command when the utterance actually asks for removal (the caller
    /// then re-routes to the delete flow).
    ///
    /// # Errors
    ///
    /// Returns `MalformedModelOutput` if the reply holds no JSON object,
    /// or the upstream error from the chat call
    pub async fn extract_create(
        &self,
        transcript: &str,
        history: &[ChatMessage],
        today: NaiveDate,
    ) -> Result<Command> {
        let prompt = create_prompt(transcript, today);
        let reply = self.invoke(&prompt, history).await?;
        parse_command(&reply, today)
    }

    /// Select records to delete, given the caller's own open records
    ///
    /// # Errors
    ///
    /// Returns `MalformedModelOutput` if the reply holds no JSON object,
    /// or the upstream error from the chat call
    pub async fn extract_delete(
        &self,
        transcript: &str,
        history: &[ChatMessage],
        reminders: &[Reminder],
        exams: &[Exam],
        today: NaiveDate,
    ) -> Result<Command> {
        if reminders.is_empty() && exams.is_empty() {
            return Ok(Command::Clarification(
                "You don't have any open reminders or exams to delete.".to_string(),
            ));
        }

        let prompt = delete_prompt(transcript, reminders, exams);
        let reply = self.invoke(&prompt, history).await?;
        parse_command(&reply, today)
    }

    async fn invoke(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let mut messages = vec![ChatMessage::system(
            "You are a voice command parser. Always respond with a single valid JSON object and nothing else.",
        )];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));

        self.backend.complete(&messages).await
    }
}

/// Prompt for the create branch
fn create_prompt(transcript: &str, today: NaiveDate) -> String {
    format!(
        r#"Extract structured information from this voice command: "{transcript}"

Today's date is {today}.

Determine what the user wants:
1. An EXAM: about a test. The words exam, test, quiz, viva, mid-sem or final ALWAYS mean an exam.
2. A REMINDER: about work to submit. The words assignment, homework or task ALWAYS mean a reminder.
3. A DELETE: the user wants existing items removed or cancelled.

Return JSON with this structure:
{{
  "type": "exam" or "reminder" or "delete",
  "title": "extracted title (reminders only)",
  "subject": "extracted subject name",
  "date": "YYYY-MM-DD format; use the current year when the user gives none",
  "time": "HH:MM format (exams only, omit if not mentioned)",
  "exam_type": "one of exactly: Internal Test, Viva, Mid-Sem, Final",
  "description": "any additional details"
}}

If required information is missing or unclear even considering the
conversation so far, return: {{ "type": "clarification", "message": "what you need to clarify" }}"#
    )
}

/// Prompt for the delete branch, with the caller's own open records
fn delete_prompt(transcript: &str, reminders: &[Reminder], exams: &[Exam]) -> String {
    let mut listing = String::new();

    if !reminders.is_empty() {
        listing.push_str("Your open reminders:\n");
        for r in reminders {
            listing.push_str(&format!(
                "- id={} title={} subject={} deadline={}\n",
                r.id,
                r.title,
                r.subject,
                r.deadline.date_naive()
            ));
        }
    }
    if !exams.is_empty() {
        listing.push_str("Your open exams:\n");
        for e in exams {
            listing.push_str(&format!(
                "- id={} subject={} type={} date={}\n",
                e.id,
                e.subject,
                e.exam_type,
                e.exam_date.date_naive()
            ));
        }
    }

    format!(
        r#"The user said: "{transcript}"

They want to delete some of their records. Select every record matching
the request (subjects match case-insensitively; "all maths assignments"
means every reminder whose subject is maths).

{listing}
Return JSON: {{ "type": "delete", "item_type": "reminder" or "exam", "item_ids": ["id", ...] }}

If the request is ambiguous or matches nothing, return:
{{ "type": "clarification", "message": "what you need to clarify" }}"#
    )
}

/// Parse a model reply into a normalized [`Command`]
///
/// # Errors
///
/// Returns `MalformedModelOutput` when no balanced JSON object is found
/// or it cannot be deserialized
pub fn parse_command(reply: &str, today: NaiveDate) -> Result<Command> {
    let span = extract_json(reply)
        .ok_or_else(|| Error::MalformedModelOutput("no JSON object in reply".to_string()))?;

    let raw: RawCommand = serde_json::from_str(span)
        .map_err(|e| Error::MalformedModelOutput(format!("bad JSON object: {e}")))?;

    match raw.kind.as_deref() {
        Some("reminder") => normalize_reminder(&raw, today),
        Some("exam") => normalize_exam(&raw, today),
        Some("delete") => {
            let kind = raw
                .item_type
                .as_deref()
                .and_then(ItemKind::parse)
                .unwrap_or(ItemKind::Reminder);
            Ok(Command::Delete(DeleteTarget {
                kind,
                ids: raw.item_ids,
            }))
        }
        Some("clarification") => Ok(Command::Clarification(
            raw.message
                .unwrap_or_else(|| "Could you give me a bit more detail?".to_string()),
        )),
        other => Err(Error::MalformedModelOutput(format!(
            "unknown command type: {other:?}"
        ))),
    }
}

fn normalize_reminder(raw: &RawCommand, today: NaiveDate) -> Result<Command> {
    let Some(subject) = non_empty(raw.subject.as_deref()) else {
        return Ok(Command::Clarification(
            "Which subject is this assignment for?".to_string(),
        ));
    };
    let Some(date) = raw.date.as_deref().and_then(|d| parse_date(d, today)) else {
        return Ok(Command::Clarification(format!(
            "When is the {subject} assignment due?"
        )));
    };

    let title = non_empty(raw.title.as_deref())
        .map_or_else(|| format!("{subject} assignment"), String::from);

    // Deadlines land at end of day
    let deadline = date
        .and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.into())
        .and_utc();

    Ok(Command::CreateReminder(NewReminder {
        title,
        subject,
        deadline,
        description: non_empty(raw.description.as_deref()),
    }))
}

fn normalize_exam(raw: &RawCommand, today: NaiveDate) -> Result<Command> {
    let Some(subject) = non_empty(raw.subject.as_deref()) else {
        return Ok(Command::Clarification(
            "Which subject is the exam for?".to_string(),
        ));
    };
    let Some(date) = raw.date.as_deref().and_then(|d| parse_date(d, today)) else {
        return Ok(Command::Clarification(format!(
            "What date is the {subject} exam?"
        )));
    };

    let time = raw
        .time
        .as_deref()
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());

    let exam_type = ExamType::coerce(raw.exam_type.as_deref().unwrap_or_default());

    Ok(Command::CreateExam(NewExam {
        subject,
        exam_date: date.and_time(time).and_utc(),
        exam_type,
        description: non_empty(raw.description.as_deref()),
    }))
}

/// Parse `YYYY-MM-DD`; a date without a year gets the current one
fn parse_date(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    // MM-DD leniency for models that drop the instructed year
    NaiveDate::parse_from_str(&format!("{}-{s}", today.format("%Y")), "%Y-%m-%d").ok()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Locate the first balanced `{...}` span in free text
///
/// Braces inside JSON strings are skipped; returns `None` when the text
/// holds no object or the first object never closes.
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    #[test]
    fn test_extract_json_spans() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
        assert_eq!(
            extract_json(r#"Sure! Here you go: {"a": {"b": 2}} hope that helps"#),
            Some(r#"{"a": {"b": 2}}"#)
        );
        // Braces inside strings don't count
        assert_eq!(
            extract_json(r#"{"a": "}{"}"#),
            Some(r#"{"a": "}{"}"#)
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json(r#"{"never": "closes""#), None);
    }

    #[test]
    fn test_parse_reminder() {
        let reply = r#"{"type":"reminder","title":"Maths HW","subject":"Maths","date":"2025-11-20"}"#;
        let Command::CreateReminder(new) = parse_command(reply, today()).unwrap() else {
            panic!("expected reminder");
        };
        assert_eq!(new.title, "Maths HW");
        assert_eq!(new.subject, "Maths");
        assert_eq!(new.deadline.date_naive().to_string(), "2025-11-20");
    }

    #[test]
    fn test_parse_exam_coerces_type() {
        let reply = r#"{"type":"exam","subject":"Java","date":"2025-12-01","time":"14:30","exam_type":"pop quiz"}"#;
        let Command::CreateExam(new) = parse_command(reply, today()).unwrap() else {
            panic!("expected exam");
        };
        assert_eq!(new.exam_type, ExamType::InternalTest);
        assert_eq!(new.exam_date.time().to_string(), "14:30:00");
    }

    #[test]
    fn test_exam_time_defaults() {
        let reply = r#"{"type":"exam","subject":"Java","date":"2025-12-01","exam_type":"Viva"}"#;
        let Command::CreateExam(new) = parse_command(reply, today()).unwrap() else {
            panic!("expected exam");
        };
        assert_eq!(new.exam_type, ExamType::Viva);
        assert_eq!(new.exam_date.time().to_string(), "09:00:00");
    }

    #[test]
    fn test_missing_date_becomes_clarification() {
        let reply = r#"{"type":"exam","subject":"Java"}"#;
        let Command::Clarification(msg) = parse_command(reply, today()).unwrap() else {
            panic!("expected clarification");
        };
        assert!(msg.contains("Java"));
    }

    #[test]
    fn test_date_without_year_gets_current_year() {
        let reply = r#"{"type":"reminder","title":"HW","subject":"Maths","date":"11-20"}"#;
        let Command::CreateReminder(new) = parse_command(reply, today()).unwrap() else {
            panic!("expected reminder");
        };
        assert_eq!(new.deadline.date_naive().to_string(), "2025-11-20");
    }

    #[test]
    fn test_parse_delete() {
        let reply = r#"{"type":"delete","item_type":"reminder","item_ids":["a","b"]}"#;
        let Command::Delete(target) = parse_command(reply, today()).unwrap() else {
            panic!("expected delete");
        };
        assert_eq!(target.kind, ItemKind::Reminder);
        assert_eq!(target.ids, vec!["a", "b"]);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse_command("I could not understand that.", today()),
            Err(Error::MalformedModelOutput(_))
        ));
        assert!(matches!(
            parse_command(r#"{"type":"dance"}"#, today()),
            Err(Error::MalformedModelOutput(_))
        ));
    }
}
