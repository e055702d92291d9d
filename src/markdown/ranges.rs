//! Missing line range formatting

use crate::config::Repository;
use crate::coverage::LineRange;

const SEPARATOR: &str = " ";
const ELLIPSIS: &str = " &hellip;";

/// Blob URL of a file at `revision`, optionally below `source_dir`
pub fn file_url(
    server_url: &str,
    repository: &Repository,
    source_dir: Option<&str>,
    filename: &str,
    revision: &str,
) -> String {
    let dir = source_dir.unwrap_or("");
    let dir = dir.strip_suffix('/').unwrap_or(dir);
    let dir = dir.strip_prefix('/').unwrap_or(dir);
    let path = if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    };

    format!(
        "{}/{}/{}/blob/{}/{}",
        server_url.trim_end_matches('/'),
        repository.owner,
        repository.name,
        revision,
        path
    )
}

pub fn format_range_text(range: &LineRange) -> String {
    if range.is_single() {
        range.start.to_string()
    } else {
        format!("{}-{}", range.start, range.end)
    }
}

/// Number of ranges kept under `max_length`, and whether any were dropped.
///
/// Every entry counts with its leading separator. The first entry is
/// always kept.
fn crop_len(texts: &[String], max_length: i64) -> (usize, bool) {
    if max_length <= 0 {
        return (texts.len(), false);
    }
    let mut accumulated = 0usize;
    for (index, text) in texts.iter().enumerate() {
        accumulated += SEPARATOR.len() + text.len();
        if index == 0 {
            continue;
        }
        if accumulated as i64 > max_length {
            return (index, true);
        }
    }
    (texts.len(), false)
}

fn link_range(file_url: &str, range: &LineRange, wrapped: &str) -> String {
    let anchor = if range.is_single() {
        format!("L{}", range.start)
    } else {
        format!("L{}-L{}", range.start, range.end)
    };
    // plain=1 keeps GitHub from showing the rendered view, which has no line anchors
    format!("[{}]({}?plain=1#{})", wrapped, file_url, anchor)
}

/// Render missing line ranges as inline code, cropped to `max_length`
/// characters of plain text and optionally linked to `file_url`.
///
/// Never returns an empty string: an empty list renders as a single space
/// so table cells keep their shape.
pub fn format_missing_lines(
    file_url: &str,
    ranges: &[LineRange],
    max_length: i64,
    with_links: bool,
) -> String {
    let texts: Vec<String> = ranges.iter().map(format_range_text).collect();
    // Crop before adding backticks and links so markup is not counted
    let (kept, cropped) = crop_len(&texts, max_length);

    let rendered: Vec<String> = texts[..kept]
        .iter()
        .zip(ranges)
        .map(|(text, range)| {
            let wrapped = format!("`{}`", text);
            if with_links {
                link_range(file_url, range, &wrapped)
            } else {
                wrapped
            }
        })
        .collect();

    let mut joined = rendered.join(SEPARATOR);
    if cropped {
        joined.push_str(ELLIPSIS);
    }
    if joined.is_empty() {
        " ".to_string()
    } else {
        joined
    }
}
