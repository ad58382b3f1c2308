use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Stable note identifier. New ids are ULIDs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct NoteId(String);

impl Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NoteId(s.to_string()))
    }
}

impl Deref for NoteId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(fr: &str) -> Self {
        NoteId(fr.to_string())
    }
}

impl From<String> for NoteId {
    fn from(fr: String) -> Self {
        NoteId(fr)
    }
}

impl NoteId {
    #[inline]
    pub fn new() -> NoteId {
        NoteId(rusty_ulid::generate_ulid_string())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

/// Note category assigned by the classifier.
///
/// Declaration order is significant: it fixes where each category's anchor
/// sits on the layout circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Meeting,
    Task,
    Email,
    Idea,
    Diary,
    Travel,
    #[default]
    Unclassified,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 7] = [
        Category::Meeting,
        Category::Task,
        Category::Email,
        Category::Idea,
        Category::Diary,
        Category::Travel,
        Category::Unclassified,
    ];

    /// Position of this category in [`Category::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Meeting => "meeting",
            Category::Task => "task",
            Category::Email => "email",
            Category::Idea => "idea",
            Category::Diary => "diary",
            Category::Travel => "travel",
            Category::Unclassified => "unclassified",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown category '{s}', expected one of: {}",
                    Category::ALL.map(Category::as_str).join(", ")
                )
            })
    }
}

/// A voice note as seen by the similarity engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default)]
    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Hash of the text the embedding was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Note {}

impl Note {
    pub fn new(category: Category) -> Self {
        Self {
            id: NoteId::new(),
            title: None,
            transcript: None,
            summary: None,
            category,
            embedding: None,
            content_hash: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text fields used for lexical matching, in match priority order.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        [&self.title, &self.transcript, &self.summary]
            .into_iter()
            .filter_map(|field| field.as_deref())
    }
}
