//! Pre-flight validation and filename sanitization.
//!
//! Everything here runs before a single byte is sent. Checks accumulate:
//! a file with three problems reports three errors.

use humansize::{BINARY, format_size};
use indexmap::IndexMap;
use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use bucketfile_core::path::FORBIDDEN_CHARS;
use bucketfile_core::{FileDescriptor, TransferError, UploadLimits, ValidationResult};

/// Device names reserved on Windows, compared case-insensitively.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn has_forbidden_chars(name: &str) -> bool {
    name.contains(FORBIDDEN_CHARS)
}

/// Length in UTF-16 code units, the unit browsers and most stores count in.
fn name_length(name: &str) -> usize {
    name.encode_utf16().count()
}

/// Validate a single file.
pub fn validate_file(file: Option<&FileDescriptor>, limits: &UploadLimits) -> ValidationResult {
    let Some(file) = file else {
        return ValidationResult::from_errors(vec!["No file provided".to_string()]);
    };

    let mut errors = Vec::new();

    if file.name.is_empty() {
        errors.push("File name is required".to_string());
    }

    if file.size > limits.max_file_size {
        errors.push(format!(
            "File size ({}) exceeds the maximum of {}",
            format_size(file.size, BINARY),
            format_size(limits.max_file_size, BINARY)
        ));
    }

    if file.size == 0 {
        errors.push("File is empty".to_string());
    }

    if has_forbidden_chars(&file.name) {
        errors.push("File name contains invalid characters".to_string());
    }

    if name_length(&file.name) > limits.max_name_length {
        errors.push(format!(
            "File name is too long (max {} characters)",
            limits.max_name_length
        ));
    }

    if file.name.starts_with('.') {
        errors.push("Hidden files are not allowed".to_string());
    }

    ValidationResult::from_errors(errors)
}

/// Validate a batch of files.
pub fn validate_files(files: &[FileDescriptor], limits: &UploadLimits) -> ValidationResult {
    let mut errors = Vec::new();

    if files.is_empty() {
        errors.push("No files provided".to_string());
    }

    if files.len() > limits.max_files_per_batch {
        errors.push(format!(
            "Too many files ({}); at most {} can be uploaded at once",
            files.len(),
            limits.max_files_per_batch
        ));
    }

    let duplicates: Vec<&str> = files
        .iter()
        .map(|f| f.name.as_str())
        .duplicates()
        .collect();
    if !duplicates.is_empty() {
        errors.push(format!("Duplicate file names: {}", duplicates.join(", ")));
    }

    let mut stored_as: IndexMap<String, Vec<&str>> = IndexMap::new();
    for file in files {
        if let Ok(clean) = sanitize_filename(&file.name) {
            let originals = stored_as.entry(clean).or_default();
            if !originals.contains(&file.name.as_str()) {
                originals.push(&file.name);
            }
        }
    }
    for (clean, originals) in stored_as.iter().filter(|(_, o)| o.len() > 1) {
        errors.push(format!(
            "{} would all be stored as '{clean}'",
            originals.join(", ")
        ));
    }

    let per_file = files.iter().flat_map(|file| {
        validate_file(Some(file), limits)
            .errors
            .into_iter()
            .map(move |e| format!("{}: {e}", display_name(&file.name)))
    });
    errors.extend(per_file);

    ValidationResult::from_errors(errors)
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(unnamed)" } else { name }
}

/// Validate a name for a new folder.
pub fn validate_folder_name(name: &str) -> ValidationResult {
    let mut errors = Vec::new();
    let trimmed = name.trim();

    if trimmed.is_empty() {
        errors.push("Folder name is required".to_string());
    }

    if has_forbidden_chars(name) {
        errors.push("Folder name contains invalid characters".to_string());
    }

    if name_length(name) > bucketfile_core::MAX_NAME_LENGTH {
        errors.push(format!(
            "Folder name is too long (max {} characters)",
            bucketfile_core::MAX_NAME_LENGTH
        ));
    }

    let base = trimmed.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(base)) {
        errors.push(format!("'{trimmed}' is a reserved name"));
    }

    if trimmed.starts_with('.') {
        errors.push("Folder name cannot start with a dot".to_string());
    }

    ValidationResult::from_errors(errors)
}

/// Unicode whitespace variants that are turned into a plain space.
fn is_unicode_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Symbol, letterlike, currency, arrow, math, dingbat and emoji blocks.
fn is_symbol_block(c: char) -> bool {
    matches!(
        c,
        '\u{20A0}'..='\u{20CF}'      // Currency Symbols
            | '\u{2100}'..='\u{214F}' // Letterlike Symbols
            | '\u{2190}'..='\u{21FF}' // Arrows
            | '\u{2200}'..='\u{22FF}' // Mathematical Operators
            | '\u{2300}'..='\u{23FF}' // Miscellaneous Technical
            | '\u{2600}'..='\u{26FF}' // Miscellaneous Symbols
            | '\u{2700}'..='\u{27BF}' // Dingbats
            | '\u{FE00}'..='\u{FE0F}' // Variation Selectors
            | '\u{1F000}'..='\u{1FAFF}' // Emoji and pictographs
    )
}

/// Sanitize a user-supplied file name for use inside a storage key.
///
/// Decomposes the name, drops diacritics and symbol characters, removes
/// forbidden characters, `..` and control characters, and collapses
/// whitespace. Fails when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Result<String, TransferError> {
    let cleaned: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if is_unicode_space(c) { ' ' } else { c })
        .filter(|c| !is_symbol_block(*c))
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .filter(|c| !c.is_control())
        .collect();

    let mut without_dots = cleaned;
    while without_dots.contains("..") {
        without_dots = without_dots.replace("..", "");
    }

    let sanitized = without_dots.split_whitespace().join(" ");

    if sanitized.is_empty() {
        return Err(TransferError::validation([format!(
            "File name '{name}' contains no usable characters"
        )]));
    }

    Ok(sanitized)
}
