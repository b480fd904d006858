//! Record types exchanged with the plugin layer

use crate::error::StoreError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Record kinds that have a storage encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind { A, Txt }

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Txt => "TXT",
        }
    }
}

impl FromStr for RecordKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordKind::A),
            "TXT" => Ok(RecordKind::Txt),
            other => Err(StoreError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS resource record as seen by callers.
///
/// `id` is empty until the record has been persisted. `priority` is carried
/// through `append` but the table has no column for it, so records read back
/// from storage always have priority 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub rtype: String,
    pub name: String,
    pub value: String,
    pub ttl: Duration,
    pub priority: u16,
}

impl Record {
    pub fn new(rtype: impl Into<String>, name: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            rtype: rtype.into(),
            name: name.into(),
            value: value.into(),
            ttl,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = if self.id.is_empty() { "-" } else { &self.id };
        write!(f, "[{}] {} {} IN {} {}", id, self.name, self.ttl.as_secs(), self.rtype, self.value)
    }
}
