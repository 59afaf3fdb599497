//! Ordered buffer of sampled event records.
//!
//! Records are appended in capture order and handed out all at once by
//! [`EventBuffer::drain`] when a batch is sent.

use crate::collector::EventKind;
use std::collections::VecDeque;

/// Separator placed between serialized rows in the `info` field.
pub const INFO_SEPARATOR: &str = "|||";

/// Percent-encode the characters that would break a row apart: whitespace,
/// `|` and `%` itself.
pub fn escape_target(target: &str) -> String {
    let mut escaped = String::with_capacity(target.len());
    for c in target.chars() {
        match c {
            '%' | '|' => escaped.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_ascii_whitespace() => escaped.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_whitespace() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("%{byte:02X}"));
                }
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// One observed, sampled interaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    cursor_id: u32,
    timestamp_ms: u64,
    x: u32,
    y: u32,
    kind: EventKind,
    target: String,
}

impl EventRecord {
    pub fn new(
        cursor_id: u32,
        timestamp_ms: u64,
        x: u32,
        y: u32,
        kind: EventKind,
        target: impl AsRef<str>,
    ) -> Self {
        Self {
            cursor_id,
            timestamp_ms,
            x,
            y,
            kind,
            target: escape_target(target.as_ref()),
        }
    }

    /// Multi-touch discriminator; 0 for non-touch input.
    pub fn cursor_id(&self) -> u32 {
        self.cursor_id
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Space-joined row: `cursorId timestamp x y eventKind targetLocator`.
impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.cursor_id, self.timestamp_ms, self.x, self.y, self.kind, self.target
        )
    }
}

/// Serialize records into the `info` field, preserving their order.
pub fn serialize_info(records: &[EventRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(INFO_SEPARATOR)
}

/// Append-only buffer of event records, cleared in one step at send time.
#[derive(Debug, Default)]
pub struct EventBuffer {
    records: VecDeque<EventRecord>,
    /// Optional cap; `None` lets the buffer grow between sends
    max_records: Option<usize>,
}

impl EventBuffer {
    /// Create an unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that evicts its oldest record once `max_records` is reached.
    pub fn with_capacity_limit(max_records: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            max_records: max_records.filter(|&m| m > 0),
        }
    }

    /// Append a record.
    ///
    /// Returns the evicted record when a capacity limit is set and was hit.
    pub fn append(&mut self, record: EventRecord) -> Option<EventRecord> {
        let evicted = match self.max_records {
            Some(max) if self.records.len() >= max => self.records.pop_front(),
            _ => None,
        };
        self.records.push_back(record);
        evicted
    }

    /// Take every record currently held, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        Vec::from(std::mem::take(&mut self.records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }
}
