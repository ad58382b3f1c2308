//! File-backed note store used by the command-line host.
//!
//! The similarity engine itself only reads notes; this store exists so the
//! binary has something to load from and to persist back-filled embeddings to.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::notes::{Note, NoteId};

const NOTES_FILE_NAME: &str = "notes.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notes file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait NoteStore: Send + Sync {
    /// All notes, newest first.
    fn list(&self) -> Result<Vec<Note>, StoreError>;
    /// Replace the stored collection.
    fn save_all(&self, notes: &[Note]) -> Result<(), StoreError>;
}

/// Write through a temp file and rename so readers never see a torn file.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("data");
    let temp_path = path.with_file_name(format!("{}-{file_name}", NoteId::new()));

    std::fs::write(&temp_path, data)?;

    std::fs::rename(&temp_path, path)
}

#[derive(Clone, Debug)]
pub struct JsonNoteStore {
    path: PathBuf,
}

impl JsonNoteStore {
    pub fn new(base_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(base_dir)?;
        Ok(Self {
            path: base_dir.join(NOTES_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NoteStore for JsonNoteStore {
    fn list(&self) -> Result<Vec<Note>, StoreError> {
        let now = Instant::now();

        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("No notes at {}, starting empty", self.path.display());
                return Ok(vec![]);
            }
            Err(err) => return Err(err.into()),
        };

        let mut notes: Vec<Note> = serde_json::from_slice(&data)?;
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        log::debug!(
            "took {}ms to read {} notes",
            now.elapsed().as_micros() as f64 / 1000.0,
            notes.len()
        );

        Ok(notes)
    }

    fn save_all(&self, notes: &[Note]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(notes)?;
        atomic_write(&self.path, &data)?;
        Ok(())
    }
}
