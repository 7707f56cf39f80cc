use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

const KB: u64 = 1000;
const MB: u64 = 1000 * KB;
const GB: u64 = 1000 * MB;

/// Layout of history keys, e.g. `16/10/2026 14:03:22`.
const HISTORY_KEY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");

/// Layout used in the name of extraction directories, e.g. `16_10_2026 14:03:22`.
const DIRECTORY_STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]_[month]_[year] [hour]:[minute]:[second]");

/// Render a byte count with decimal (not binary) units.
pub fn readable_size(size: u64) -> String {
    match size {
        s if s < KB => format!("{s} o"),
        s if s < MB => format!("{:.1} Ko", s as f64 / KB as f64),
        s if s < GB => format!("{:.1} Mo", s as f64 / MB as f64),
        s => format!("{:.1} Go", s as f64 / GB as f64),
    }
}

/// Current wall-clock time in the local offset, falling back to UTC when the
/// offset cannot be determined.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn history_key(at: OffsetDateTime) -> String {
    at.format(HISTORY_KEY_FORMAT)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Parse a key produced by [`history_key`].
pub fn parse_history_key(key: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(key, HISTORY_KEY_FORMAT).ok()
}

pub fn directory_stamp(at: OffsetDateTime) -> String {
    at.format(DIRECTORY_STAMP_FORMAT)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
