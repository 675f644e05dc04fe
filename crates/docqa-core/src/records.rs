//! Loader for ingestion input produced by the external chunking pipeline.
//!
//! Input is one JSON object per line (`{filename, page, chunk_id, content}`)
//! in `.jsonl` files. Files are read in sorted path order and records keep
//! their line order, so ingestion order is reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::ChunkRecord;

#[derive(Debug, Default)]
pub struct RecordLoader {
    skip_empty: bool,
}

impl RecordLoader {
    pub fn new() -> Self {
        Self { skip_empty: true }
    }

    /// Keep records whose content is blank instead of dropping them.
    pub fn keep_empty(mut self) -> Self {
        self.skip_empty = false;
        self
    }

    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<ChunkRecord>> {
        let files = self.list_jsonl_files(data_dir);
        if files.is_empty() {
            debug!("no .jsonl files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        let mut all = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            all.extend(self.load_file(file_path)?);
        }
        debug!("loaded {} records from {} files", all.len(), files.len());
        Ok(all)
    }

    pub fn load_file(&self, file_path: &Path) -> Result<Vec<ChunkRecord>> {
        let content = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(_) => {
                let bytes = fs::read(file_path)
                    .map_err(|e| Error::NotFound(format!("{}: {e}", file_path.display())))?;
                String::from_utf8_lossy(&bytes).to_string()
            }
        };
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: ChunkRecord = serde_json::from_str(line).map_err(|e| {
                Error::Operation(format!("{}:{}: malformed record: {e}", file_path.display(), line_no + 1))
            })?;
            if self.skip_empty && record.content.trim().is_empty() {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    fn list_jsonl_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
            .collect();
        files.sort();
        files
    }
}
