//! File-extension language detection for text/code attachment tagging (§4.9).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    TypeScriptTsx,
    Go,
    Java,
    C,
    Cpp,
}

/// Detects a source language from a file path's extension. Returns `None`
/// for unknown or missing extensions.
pub fn detect_language(source_path: &str) -> Option<SupportedLanguage> {
    let path = source_path.to_lowercase();
    let extension = path.rsplit('.').next()?;

    match extension {
        "rs" => Some(SupportedLanguage::Rust),
        "py" => Some(SupportedLanguage::Python),
        "js" | "jsx" => Some(SupportedLanguage::JavaScript),
        "ts" => Some(SupportedLanguage::TypeScript),
        "tsx" => Some(SupportedLanguage::TypeScriptTsx),
        "go" => Some(SupportedLanguage::Go),
        "java" => Some(SupportedLanguage::Java),
        "c" | "h" => Some(SupportedLanguage::C),
        "cpp" | "hpp" | "cc" | "cxx" => Some(SupportedLanguage::Cpp),
        _ => None,
    }
}
