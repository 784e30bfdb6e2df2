use std::borrow::Cow;

use qqbot_admin_client::MemoryRecord;

pub const PREVIEW_FIELD_LIMIT: usize = 2;
pub const PREVIEW_CHAR_LIMIT: usize = 30;
pub const EMPTY_PREVIEW: &str = "(empty)";
pub const EMPTY_DETAIL: &str = "(no content)";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    pub max_fields: usize,
    pub max_chars: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            max_fields: PREVIEW_FIELD_LIMIT,
            max_chars: PREVIEW_CHAR_LIMIT,
        }
    }
}

/// One-line summary of a memory record: the first fields as `key: value`,
/// each value cut to `max_chars` characters and suffixed with `...` when cut.
#[must_use]
pub fn memory_preview(record: &MemoryRecord, options: PreviewOptions) -> String {
    if record.is_empty() {
        return EMPTY_PREVIEW.to_string();
    }
    record
        .fields()
        .take(options.max_fields)
        .map(|(key, value)| format!("{key}: {}", truncate_chars(&value, options.max_chars)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every field, `key:` on its own line followed by the value, fields
/// separated by a blank line.
#[must_use]
pub fn memory_detail(record: &MemoryRecord) -> String {
    if record.is_empty() {
        return EMPTY_DETAIL.to_string();
    }
    record
        .fields()
        .map(|(key, value)| format!("{key}:\n{value}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// Counts chars, not bytes, so CJK text never splits mid-codepoint.
fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{ELLIPSIS}", text[..cut].trim_end())),
    }
}
