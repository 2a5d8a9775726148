//! Byte-offset slicing of the reference text.
//!
//! Record offsets are byte offsets into a UTF-8 file and may land in the
//! middle of a multi-byte character. Extraction never fails: bytes that do
//! not decode are dropped.

/// Extract `buffer[start..end]` as text.
///
/// `start` is clamped to 0, `end` to at least `start`, and both to the
/// buffer length.
pub fn extract(buffer: &[u8], start: i64, end: i64) -> String {
    let start = start.max(0);
    let end = end.max(start);
    let len = buffer.len() as u64;
    let start = (start as u64).min(len) as usize;
    let end = (end as u64).min(len) as usize;
    decode_utf8_dropping_invalid(&buffer[start..end])
}

/// Decode UTF-8, skipping every invalid or truncated sequence.
pub fn decode_utf8_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match err.error_len() {
                    Some(skip) => bytes = &rest[skip..],
                    // Incomplete sequence at the end of the slice.
                    None => return out,
                }
            }
        }
    }
}
