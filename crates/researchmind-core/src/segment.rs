//! Plain-text document segmentation into overlapping word windows.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId};

#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Segmenter {
    fn default() -> Self { Self { chunk_size: 300, overlap: 50 } }
}

impl Segmenter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_size must be positive and larger than overlap (got {chunk_size}/{overlap})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn overlap(&self) -> usize { self.overlap }

    /// Splits `text` into windows of `chunk_size` words, each starting
    /// `chunk_size - overlap` words after the previous one.
    ///
    /// `end_word` is the nominal window end and may run past the last word.
    pub fn segment(&self, text: &str, first_chunk_id: ChunkId) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut next_id = first_chunk_id;
        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            let window = &words[start..end];
            chunks.push(Chunk {
                chunk_id: next_id,
                text: window.join(" "),
                word_count: window.len(),
                start_word: start,
                end_word: start + self.chunk_size,
            });
            next_id += 1;
            if end == words.len() { break; }
            start += step;
        }
        chunks
    }

    pub fn segment_file(&self, path: &Path, first_chunk_id: ChunkId) -> Result<Vec<Chunk>> {
        let content = read_file_content(path)?;
        let chunks = self.segment(&content, first_chunk_id);
        debug!(file = %path.display(), chunks = chunks.len(), "segmented file");
        Ok(chunks)
    }

    /// Segments every `.txt` file below `dir` (sorted by path) into one
    /// id-contiguous chunk list.
    pub fn segment_directory(&self, dir: &Path, first_chunk_id: ChunkId) -> Result<Vec<Chunk>> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("directory {}", dir.display())));
        }
        let files = list_txt_files(dir);
        let mut all_chunks = Vec::new();
        let mut next_id = first_chunk_id;
        for (i, file) in files.iter().enumerate() {
            debug!(file = %file.display(), n = i + 1, total = files.len(), "processing file");
            let chunks = self.segment_file(file, next_id)?;
            next_id += chunks.len() as ChunkId;
            all_chunks.extend(chunks);
        }
        info!(files = files.len(), chunks = all_chunks.len(), dir = %dir.display(), "segmented directory");
        Ok(all_chunks)
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
        Err(e) => Err(e.into()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String { (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ") }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(Segmenter::default().segment("  \n\t ", 0).is_empty());
    }

    #[test]
    fn windows_overlap_by_fifty_words() {
        let chunks = Segmenter::default().segment(&words(600), 10);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_word).collect();
        assert_eq!(starts, vec![0, 250, 500]);
        assert_eq!(chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(chunks[0].word_count, 300);
        assert_eq!(chunks[2].word_count, 100);
        assert!(chunks[1].text.starts_with("w250 "));
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = Segmenter::default().segment("alpha beta gamma", 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta gamma");
        assert_eq!(chunks[0].word_count, 3);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(Segmenter::new(50, 50).is_err());
        assert!(Segmenter::new(0, 0).is_err());
        assert!(Segmenter::new(10, 2).is_ok());
    }
}
