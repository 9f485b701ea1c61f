//! Word-window chunking
//!
//! Text is split on whitespace and cut into windows of `size` words, each
//! starting `size - overlap` words after the previous one. The last window
//! may be short. Output depends only on the text and the two parameters.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Requires `size > 0` and `overlap < size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if overlap >= size {
            return Err(Error::InvalidParameter(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts, always >= 1
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }

    /// Split `text` into overlapping fragments. No words, no fragments.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();

        (0..words.len())
            .step_by(self.step())
            .map(|start| {
                let end = (start + self.size).min(words.len());
                words[start..end].join(" ")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(Chunker::new(0, 0), Err(Error::InvalidParameter(_))));
        assert!(matches!(Chunker::new(10, 10), Err(Error::InvalidParameter(_))));
        assert!(matches!(Chunker::new(10, 11), Err(Error::InvalidParameter(_))));
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn test_empty_text_has_no_chunks() -> Result<()> {
        let chunker = Chunker::new(800, 100)?;
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk(" \n\t  ").is_empty());
        Ok(())
    }

    #[test]
    fn test_short_text_is_one_chunk() -> Result<()> {
        let chunker = Chunker::new(800, 100)?;
        let chunks = chunker.chunk("  alpha\nbravo \t charlie ");
        assert_eq!(chunks, vec!["alpha bravo charlie".to_string()]);
        Ok(())
    }

    #[test]
    fn test_801_words_make_two_chunks() -> Result<()> {
        let chunker = Chunker::new(800, 100)?;
        let chunks = chunker.chunk(&words(801));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].split_whitespace().count(), 800);
        // second window starts at word 700 and carries the overlap tail
        let second: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(second.len(), 101);
        assert_eq!(second[0], "w700");
        assert_eq!(second[100], "w800");
        Ok(())
    }

    #[test]
    fn test_overlap_words_are_shared() -> Result<()> {
        let chunker = Chunker::new(4, 2)?;
        let chunks = chunker.chunk(&words(7));
        assert_eq!(
            chunks,
            vec![
                "w0 w1 w2 w3".to_string(),
                "w2 w3 w4 w5".to_string(),
                "w4 w5 w6".to_string(),
                "w6".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<()> {
        let chunker = Chunker::new(7, 3)?;
        let text = words(53);
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
        Ok(())
    }

    #[test]
    fn test_non_overlapping_parts_reconstruct_text() -> Result<()> {
        for (size, overlap, n) in [(5, 0, 23), (5, 4, 23), (8, 3, 8), (8, 3, 9), (800, 100, 1701), (3, 1, 1)] {
            let chunker = Chunker::new(size, overlap)?;
            let text = words(n);
            let chunks = chunker.chunk(&text);

            let mut rebuilt: Vec<String> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let ws = chunk.split_whitespace().map(String::from);
                if i + 1 < chunks.len() {
                    rebuilt.extend(ws.take(chunker.step()));
                } else {
                    rebuilt.extend(ws);
                }
            }

            let original: Vec<String> = text.split_whitespace().map(String::from).collect();
            assert_eq!(rebuilt, original, "size={} overlap={} n={}", size, overlap, n);
        }
        Ok(())
    }
}
