//! Text/code attachment processing (§4.9). Decodes as UTF-8 with a
//! `latin-1` fallback (every byte sequence is valid latin-1, so this never
//! fails), records line/character counts, and infers a language from MIME.

use crate::attachments::language::detect_language;

const EMBED_PREFIX_BYTES: usize = 5 * 1024;

pub struct TextProcessingResult {
    pub text: String,
    pub line_count: usize,
    pub char_count: usize,
    pub language: Option<String>,
    pub embed_excerpt: String,
}

pub fn process_text(bytes: &[u8], mime_type: &str, filename: &str) -> TextProcessingResult {
    let text = decode_text(bytes);
    let line_count = text.lines().count();
    let char_count = text.chars().count();
    let language = infer_language(mime_type, filename);

    let embed_excerpt: String = text.chars().take(EMBED_PREFIX_BYTES).collect();

    TextProcessingResult { text, line_count, char_count, language, embed_excerpt }
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn infer_language(mime_type: &str, filename: &str) -> Option<String> {
    if let Some(language) = detect_language(filename) {
        return Some(format!("{language:?}").to_lowercase());
    }
    match mime_type {
        "text/markdown" => Some("markdown".to_string()),
        "application/json" => Some("json".to_string()),
        "text/csv" => Some("csv".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_text_counts_lines_and_chars() {
        let result = process_text(b"line one\nline two\n", "text/plain", "notes.txt");
        assert_eq!(result.line_count, 2);
        assert_eq!(result.char_count, "line one\nline two\n".chars().count());
    }

    #[test]
    fn process_text_falls_back_to_latin1_on_invalid_utf8() {
        let bytes = [0x68, 0x69, 0xff, 0xfe];
        let result = process_text(&bytes, "text/plain", "bin.txt");
        assert_eq!(result.text.chars().count(), 4);
    }

    #[test]
    fn process_text_infers_language_from_extension() {
        let result = process_text(b"fn main() {}", "text/plain", "main.rs");
        assert_eq!(result.language.as_deref(), Some("rust"));
    }

    #[test]
    fn process_text_infers_language_from_mime_when_no_extension_match() {
        let result = process_text(b"{}", "application/json", "payload");
        assert_eq!(result.language.as_deref(), Some("json"));
    }
}
