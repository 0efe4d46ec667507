//! Upload filename policy for digital goods.

use shopbox_common::{Error, Result};

/// Extensions accepted for uploaded product files.
const ALLOWED_EXTENSIONS: &[&str] = &[
    // Archives
    "zip", "rar", "7z", "tar", "gz",
    // Documents
    "pdf", "doc", "docx", "txt", "rtf",
    // Images
    "jpg", "jpeg", "png", "gif", "webp",
    // Audio
    "mp3", "wav", "ogg", "flac", "m4a",
    // Video
    "mp4", "avi", "mov", "wmv", "flv", "webm",
    // E-books
    "epub", "mobi", "azw", "azw3",
    // Spreadsheets and presentations
    "xls", "xlsx", "csv", "ppt", "pptx",
    // Web assets
    "css", "js", "json", "xml",
];

/// Patterns rejected anywhere in a filename, catching double-extension
/// tricks like `shell.php.zip`.
const BLOCKED_PATTERNS: &[&str] = &[
    ".php", ".phtml", ".asp", ".aspx", ".jsp", ".cgi", ".pl", ".py", ".exe", ".com", ".bat",
    ".cmd", ".scr", ".vbs", ".jar", ".sh", ".bash", ".zsh", ".fish", ".htaccess", ".htpasswd",
];

/// Check a filename against the allowed-extension and blocked-pattern
/// policy.
///
/// Enforcement belongs to the upload collaborator; the core's upload
/// path does not call this, it only provides the shared policy.
pub fn validate_filename(filename: &str) -> Result<()> {
    let lowered = filename.to_lowercase();
    let extension = lowered.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    if !ALLOWED_EXTENSIONS.contains(&extension) {
        return Err(Error::Upload(format!(
            "file type '{}' is not allowed",
            extension
        )));
    }

    for pattern in BLOCKED_PATTERNS {
        if lowered.contains(pattern) {
            return Err(Error::Upload(format!(
                "filename contains blocked pattern '{}'",
                pattern
            )));
        }
    }

    Ok(())
}
