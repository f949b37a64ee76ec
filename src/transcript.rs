//! Transcript — the ordered, append-only list of exchanged messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Entries render top-to-bottom in insertion order. Past entries are never
/// edited; the only way to drop them is [`TranscriptLog::clear`].
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn all(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended at or after position `from`.
    pub fn since(&self, from: usize) -> &[TranscriptEntry] {
        self.entries.get(from..).unwrap_or(&[])
    }

    /// The most recent `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> &[TranscriptEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut log = TranscriptLog::new();
        log.append(TranscriptEntry::assistant("¿Cuál es tu nombre completo?"));
        log.append(TranscriptEntry::user("Ana Pérez"));
        log.append(TranscriptEntry::assistant("¿Cuál es tu teléfono?"));

        let roles: Vec<Role> = log.all().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(log.all()[1].text, "Ana Pérez");
    }

    #[test]
    fn since_and_tail() {
        let mut log = TranscriptLog::new();
        for i in 0..5 {
            log.append(TranscriptEntry::user(format!("m{i}")));
        }
        assert_eq!(log.since(3).len(), 2);
        assert!(log.since(10).is_empty());
        let tail: Vec<&str> = log.tail(2).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(log.tail(50).len(), 5);
    }

    #[test]
    fn clear_empties() {
        let mut log = TranscriptLog::new();
        log.append(TranscriptEntry::user("hola"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        let entry = TranscriptEntry::assistant("hola");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["text"], "hola");
    }
}
