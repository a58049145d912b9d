//! Caption segmentation for the static text overlay.

/// Words per caption line.
pub const WORDS_PER_CHUNK: usize = 4;

/// One caption line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionChunk {
    pub words: Vec<String>,
}

impl CaptionChunk {
    pub fn line(&self) -> String {
        self.words.join(" ")
    }
}

/// Split a script into consecutive groups of [`WORDS_PER_CHUNK`] words.
pub fn segment(script: &str) -> Vec<CaptionChunk> {
    let words: Vec<&str> = script.split_whitespace().collect();
    words
        .chunks(WORDS_PER_CHUNK)
        .map(|chunk| CaptionChunk {
            words: chunk.iter().map(|w| w.to_string()).collect(),
        })
        .collect()
}

/// Full caption block: one line per chunk, joined with newlines.
///
/// Empty or whitespace-only scripts yield an empty string.
pub fn caption_text(script: &str) -> String {
    segment(script)
        .iter()
        .map(CaptionChunk::line)
        .collect::<Vec<_>>()
        .join("\n")
}
