//! Input validation for free-text fields and audio uploads.
//!
//! Text fields go through a denylist of injection-prone tokens followed by a
//! character allow-list. The denylist matches case-insensitive substrings, so
//! ordinary words that contain a keyword ("Walter" contains "alter") are
//! rejected too. Callers rely on that conservative outcome; do not relax it
//! here.

use std::path::Path;

use crate::config::UploadConfig;
use crate::error::{ValidationError, ValidationResult};

/// Maximum length of a BDR display name.
pub const MAX_BDR_NAME_LEN: usize = 50;
/// Maximum length of the prospect name and company fields.
pub const MAX_PROSPECT_FIELD_LEN: usize = 100;
/// Maximum length of the commercial insight field.
pub const MAX_INSIGHT_LEN: usize = 500;
/// Default length ceiling when a caller has no field-specific limit.
pub const DEFAULT_MAX_TEXT_LEN: usize = 1000;

/// Substrings rejected anywhere in a text field (compared lowercase).
pub const FORBIDDEN_TOKENS: &[&str] = &[
    "<", ">", "\"", "'", "&", ";", "--", "/*", "*/", "xp_", "sp_", "exec", "select", "insert",
    "update", "delete", "drop", "create", "alter", "union", "script", "javascript", "vbscript",
    "onload", "onerror", "onclick",
];

/// Accented letters accepted in text fields.
const ACCENTED_LETTERS: &str = "áàâãéèêíìîóòôõúùûçÁÀÂÃÉÈÊÍÌÎÓÒÔÕÚÙÛÇ";

/// Punctuation accepted in text fields.
const ALLOWED_PUNCTUATION: &str = "-.,!?()";

/// Substrings rejected in upload file names.
pub const UNSAFE_FILENAME_TOKENS: &[&str] = &["..", "/", "\\", "<", ">", ":", "\"", "|", "?", "*"];

/// An uploaded audio file as received from the caller.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    /// Create an upload from a file name and its contents.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read an upload from disk, keeping only the final path component as the
    /// file name.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased text after the last `.` (the whole name when there is none).
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Validate a free-text field.
///
/// Rules are checked in order: empty or whitespace-only, longer than
/// `max_length` characters, contains a [`FORBIDDEN_TOKENS`] entry, contains a
/// character outside the allow-list.
pub fn validate_text(value: &str, field_name: &str, max_length: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: field_name.to_string(),
        });
    }

    let length = value.chars().count();
    if length > max_length {
        return Err(ValidationError::TooLong {
            field: field_name.to_string(),
            length,
            max_length,
        });
    }

    let lowered = value.to_lowercase();
    if let Some(token) = FORBIDDEN_TOKENS.iter().find(|t| lowered.contains(*t)) {
        return Err(ValidationError::ForbiddenToken {
            field: field_name.to_string(),
            token: (*token).to_string(),
        });
    }

    if let Some(character) = value.chars().find(|c| !is_allowed_char(*c)) {
        return Err(ValidationError::DisallowedCharacter {
            field: field_name.to_string(),
            character,
        });
    }

    Ok(())
}

/// Validate a field that may be left blank. Blank values pass; anything else
/// goes through [`validate_text`].
pub fn validate_optional_text(
    value: Option<&str>,
    field_name: &str,
    max_length: usize,
) -> ValidationResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => validate_text(v, field_name, max_length),
        _ => Ok(()),
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ACCENTED_LETTERS.contains(c)
        || ALLOWED_PUNCTUATION.contains(c)
}

/// Validate an audio upload against the configured limits.
///
/// Rules are checked in order: missing file, blank name, extension outside
/// the allow-list, larger than the ceiling, zero bytes, unsafe name.
pub fn validate_audio(upload: Option<&AudioUpload>, limits: &UploadConfig) -> ValidationResult<()> {
    let upload = upload.ok_or(ValidationError::MissingFile)?;

    if upload.file_name.trim().is_empty() {
        return Err(ValidationError::EmptyFileName);
    }

    let extension = upload.extension();
    if !limits
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(ValidationError::UnsupportedExtension {
            extension,
            allowed: limits.allowed_extensions.join(", "),
        });
    }

    let size = upload.size();
    if size > limits.max_file_size_bytes() {
        return Err(ValidationError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: limits.max_file_size_mb,
        });
    }

    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }

    if let Some(token) = UNSAFE_FILENAME_TOKENS
        .iter()
        .find(|t| upload.file_name.contains(*t))
    {
        return Err(ValidationError::UnsafeFileName {
            token: (*token).to_string(),
        });
    }

    Ok(())
}

/// Strip markup and SQL comment markers from text before it is written.
pub fn sanitize_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | ';'))
        .collect();
    stripped
        .replace("--", "")
        .replace("/*", "")
        .replace("*/", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> UploadConfig {
        UploadConfig::default()
    }

    #[test]
    fn test_accepts_accents_hyphens_parentheses() {
        assert!(validate_text("João Conceição-Araújo (Diretor)", "Prospect name", 100).is_ok());
        assert!(validate_text("Ação Comercial, fase 2!", "Company", 100).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(
            validate_text("", "BDR name", 50),
            Err(ValidationError::Empty {
                field: "BDR name".to_string()
            })
        );
        assert!(matches!(
            validate_text("   \n\t", "BDR name", 50),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_rejects_too_long() {
        let value = "a".repeat(51);
        assert!(matches!(
            validate_text(&value, "BDR name", 50),
            Err(ValidationError::TooLong {
                length: 51,
                max_length: 50,
                ..
            })
        ));
        assert!(validate_text(&"a".repeat(50), "BDR name", 50).is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let value = "ã".repeat(50);
        assert!(validate_text(&value, "BDR name", 50).is_ok());
    }

    #[test]
    fn test_rejects_every_forbidden_token() {
        for token in FORBIDDEN_TOKENS {
            let value = format!("abc {} def", token);
            assert!(
                matches!(
                    validate_text(&value, "Field", 100),
                    Err(ValidationError::ForbiddenToken { .. })
                ),
                "expected '{}' to be rejected",
                token
            );
        }
    }

    #[test]
    fn test_forbidden_tokens_are_case_insensitive() {
        assert_eq!(
            validate_text("SeLeCt", "Field", 100),
            Err(ValidationError::ForbiddenToken {
                field: "Field".to_string(),
                token: "select".to_string()
            })
        );
    }

    #[test]
    fn test_forbidden_tokens_match_inside_words() {
        assert!(matches!(
            validate_text("Walter", "Prospect name", 100),
            Err(ValidationError::ForbiddenToken { token, .. }) if token == "alter"
        ));
        assert!(matches!(
            validate_text("Recreate Ltda", "Company", 100),
            Err(ValidationError::ForbiddenToken { token, .. }) if token == "create"
        ));
    }

    #[test]
    fn test_rejects_characters_outside_allow_list() {
        assert_eq!(
            validate_text("Ana@empresa", "Prospect name", 100),
            Err(ValidationError::DisallowedCharacter {
                field: "Prospect name".to_string(),
                character: '@'
            })
        );
        assert!(matches!(
            validate_text("Zoë", "Prospect name", 100),
            Err(ValidationError::DisallowedCharacter { character: 'ë', .. })
        ));
        assert!(matches!(
            validate_text("50% off", "Insight", 500),
            Err(ValidationError::DisallowedCharacter { character: '%', .. })
        ));
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(None, "Insight", 500).is_ok());
        assert!(validate_optional_text(Some("  "), "Insight", 500).is_ok());
        assert!(validate_optional_text(Some("drop it"), "Insight", 500).is_err());
    }

    #[test]
    fn test_audio_accepts_small_wav() {
        let upload = AudioUpload::new("call.wav", vec![0u8; 1024]);
        assert!(validate_audio(Some(&upload), &limits()).is_ok());

        let upload = AudioUpload::new("Call.MP3", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits()).is_ok());
    }

    #[test]
    fn test_audio_rejects_missing_file() {
        assert_eq!(
            validate_audio(None, &limits()),
            Err(ValidationError::MissingFile)
        );
    }

    #[test]
    fn test_audio_rejects_blank_name() {
        let upload = AudioUpload::new("  ", vec![1u8; 10]);
        assert_eq!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::EmptyFileName)
        );
    }

    #[test]
    fn test_audio_rejects_empty_file() {
        let upload = AudioUpload::new("call.wav", Vec::new());
        assert_eq!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::EmptyFile)
        );
    }

    #[test]
    fn test_audio_rejects_oversized_file() {
        let max = limits().max_file_size_bytes() as usize;
        let upload = AudioUpload::new("call.wav", vec![0u8; max + 1]);
        assert!(matches!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::FileTooLarge { max_mb: 25, .. })
        ));

        let upload = AudioUpload::new("call.wav", vec![0u8; max]);
        assert!(validate_audio(Some(&upload), &limits()).is_ok());
    }

    #[test]
    fn test_audio_rejects_disallowed_extension() {
        let upload = AudioUpload::new("call.ogg", vec![1u8; 10]);
        assert!(matches!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::UnsupportedExtension { extension, .. }) if extension == "ogg"
        ));

        let upload = AudioUpload::new("wav", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits()).is_ok());

        let upload = AudioUpload::new("recording", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits()).is_err());
    }

    #[test]
    fn test_audio_rejects_path_traversal() {
        let upload = AudioUpload::new("..hidden.wav", vec![1u8; 10]);
        assert!(matches!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::UnsafeFileName { token }) if token == ".."
        ));

        let upload = AudioUpload::new("calls/monday.wav", vec![1u8; 10]);
        assert!(matches!(
            validate_audio(Some(&upload), &limits()),
            Err(ValidationError::UnsafeFileName { token }) if token == "/"
        ));

        let upload = AudioUpload::new("call|rm.wav", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits()).is_err());
    }

    #[test]
    fn test_audio_respects_configured_extensions() {
        let limits = UploadConfig {
            allowed_extensions: vec!["ogg".to_string()],
            max_file_size_mb: 1,
        };
        let upload = AudioUpload::new("call.ogg", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits).is_ok());
        let upload = AudioUpload::new("call.wav", vec![1u8; 10]);
        assert!(validate_audio(Some(&upload), &limits).is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Hello</b>; 'x' \"y\"  "), "bHello/b x y");
        assert_eq!(sanitize_text("a -- b /* c */"), "a  b  c");
        assert_eq!(sanitize_text("Precisa de mais descoberta."), "Precisa de mais descoberta.");
        assert_eq!(sanitize_text(""), "");
    }

    #[tokio::test]
    async fn test_upload_from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting.m4a");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let upload = AudioUpload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "meeting.m4a");
        assert_eq!(upload.size(), 3);
        assert_eq!(upload.extension(), "m4a");
    }
}
