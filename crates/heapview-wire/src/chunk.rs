use std::sync::atomic::{AtomicU64, Ordering};

pub const CHUNK_START_PREFIX: &str = "__heapview_chunk_start__:";
pub const CHUNK_PART_PREFIX: &str = "__heapview_chunk_part__:";
pub const CHUNK_END_PREFIX: &str = "__heapview_chunk_end__:";
pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024;
pub const MIN_CHUNK_BYTES: usize = 1024;

static CHUNK_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Splits `text` into the text frames to send.
///
/// Payloads up to `max_bytes` go out as a single frame. Larger ones become
/// a start frame, numbered part frames, and an end frame, all tagged with
/// the same message id. Parts never split a UTF-8 character.
pub fn frame_text(text: &str, max_bytes: usize) -> Vec<String> {
    let max_bytes = max_bytes.max(MIN_CHUNK_BYTES);
    if text.len() <= max_bytes {
        return vec![text.to_string()];
    }

    let message_id = CHUNK_MESSAGE_ID.fetch_add(1, Ordering::Relaxed);
    let parts = char_bounded_parts(text, max_bytes)
        .enumerate()
        .map(|(index, part)| format!("{CHUNK_PART_PREFIX}{message_id}:{index}:{part}"));
    std::iter::once(format!("{CHUNK_START_PREFIX}{message_id}"))
        .chain(parts)
        .chain(std::iter::once(format!("{CHUNK_END_PREFIX}{message_id}")))
        .collect()
}

/// Reassembles frames produced by [`frame_text`] for a single payload.
pub fn reassemble_frames(frames: &[String]) -> Option<String> {
    match frames {
        [] => None,
        [single] if !single.starts_with(CHUNK_START_PREFIX) => Some(single.clone()),
        [start, parts @ .., end] => {
            let id = start.strip_prefix(CHUNK_START_PREFIX)?;
            if end.strip_prefix(CHUNK_END_PREFIX)? != id {
                return None;
            }
            let mut out = String::new();
            for (expected, part) in parts.iter().enumerate() {
                let rest = part.strip_prefix(CHUNK_PART_PREFIX)?;
                let (part_id, rest) = rest.split_once(':')?;
                let (index, body) = rest.split_once(':')?;
                if part_id != id || index.parse::<usize>().ok()? != expected {
                    return None;
                }
                out.push_str(body);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Cuts `text` into slices of at most `max_bytes`, backing each cut off to
/// the previous char boundary. `max_bytes` must be at least 4.
fn char_bounded_parts(text: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut cut = max_bytes.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (part, tail) = rest.split_at(cut);
        rest = tail;
        Some(part)
    })
}
