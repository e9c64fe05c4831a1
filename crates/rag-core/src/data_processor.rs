//! Turns a directory of `.txt`/`.md` files into sentence-level chunks with
//! sequential ids, the shape sentence-window expansion relies on.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Chunk, ChunkId, FILENAME_KEY, HEADER_KEY, SOURCE_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Sentences shorter than this (in characters) are glued to the next one.
    pub min_chars: usize,
    /// File extensions picked up by `process_directory`, without the dot.
    pub extensions: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { min_chars: 12, extensions: vec!["txt".to_string(), "md".to_string()] }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Chunk every matching file under `data_dir`, numbering chunks from `first_id`.
    pub fn process_directory(&self, data_dir: &Path, first_id: ChunkId) -> Result<Vec<Chunk>> {
        let files = self.list_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no input files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        let mut next_id = first_id;
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = read_file_content(file_path)?;
            let chunks = self.chunk_document(&content, file_path, next_id);
            next_id += chunks.len() as ChunkId;
            all_chunks.extend(chunks);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "processed input directory");
        Ok(all_chunks)
    }

    /// Split one document into sentence chunks. The current markdown heading
    /// becomes `header`; text before any heading uses the file stem.
    pub fn chunk_document(&self, content: &str, file_path: &Path, first_id: ChunkId) -> Vec<Chunk> {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = file_path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.clone());
        let source = file_path.to_string_lossy().to_string();

        let mut header = stem;
        let mut chunks = Vec::new();
        let normalized = content.replace("\r\n", "\n");
        for block in normalized.split("\n\n") {
            let mut body = String::new();
            for line in block.lines() {
                let trimmed = line.trim();
                if let Some(title) = trimmed.strip_prefix('#') {
                    let title = title.trim_start_matches('#').trim();
                    if !title.is_empty() {
                        // Text above the heading belongs to the previous section.
                        self.emit(&mut chunks, &body, &header, &filename, &source, first_id);
                        body.clear();
                        header = title.to_string();
                    }
                    continue;
                }
                if trimmed.is_empty() { continue; }
                if !body.is_empty() { body.push(' '); }
                body.push_str(trimmed);
            }
            self.emit(&mut chunks, &body, &header, &filename, &source, first_id);
        }
        chunks
    }

    fn emit(&self, chunks: &mut Vec<Chunk>, body: &str, header: &str, filename: &str, source: &str, first_id: ChunkId) {
        for sentence in self.split_sentences(body) {
            let id = first_id + chunks.len() as ChunkId;
            chunks.push(
                Chunk::new(id, sentence)
                    .with_meta(HEADER_KEY, header)
                    .with_meta(FILENAME_KEY, filename)
                    .with_meta(SOURCE_KEY, source),
            );
        }
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace());
            if at_boundary && current.trim().chars().count() >= self.chunking_config.min_chars {
                sentences.push(current.trim().to_string());
                current.clear();
            }
        }
        let rest = current.trim();
        if !rest.is_empty() {
            match sentences.last_mut() {
                Some(last) if rest.chars().count() < self.chunking_config.min_chars => {
                    last.push(' ');
                    last.push_str(rest);
                }
                _ => sentences.push(rest.to_string()),
            }
        }
        sentences
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.chunking_config.extensions.iter().any(|e| e == ext));
            if matches { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_fragments_join_previous_sentence() {
        let processor = DataProcessor::new();
        let sentences = processor.split_sentences("This sentence is long enough. Ok.");
        assert_eq!(sentences, vec!["This sentence is long enough. Ok.".to_string()]);
    }

    #[test]
    fn decimals_do_not_split() {
        let processor = DataProcessor::new();
        let sentences = processor.split_sentences("Release 3.5 improves latency. Slicing is new here.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Release 3.5 improves latency.");
    }

    #[test]
    fn heading_inside_a_paragraph_starts_a_new_section() {
        let content = "# Water\nBoil water for one minute before drinking.\n## Power\nSolar panels lose output in shade.";
        let chunks = DataProcessor::new().chunk_document(content, Path::new("notes.md"), 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Boil water for one minute before drinking.");
        assert_eq!(chunks[0].header(), Some("Water"));
        assert_eq!(chunks[1].header(), Some("Power"));
        assert_eq!(chunks[1].id, 1);
    }

    #[test]
    fn crlf_documents_split_paragraphs_and_sections() {
        let content = "Stored rain needs a lid.\r\n\r\n# Filters\r\nCeramic filters remove bacteria.\r\n\r\n# Storage\r\nRotate stored water every six months.\r\n";
        let chunks = DataProcessor::new().chunk_document(content, Path::new("water.md"), 10);
        let headers: Vec<_> = chunks.iter().map(|c| c.header()).collect();
        assert_eq!(headers, vec![Some("water"), Some("Filters"), Some("Storage")]);
        assert_eq!(chunks[2].text, "Rotate stored water every six months.");
        assert_eq!(chunks.iter().map(|c| c.id).collect::<Vec<_>>(), vec![10, 11, 12]);
    }
}
