//! Text decoder adapter. The Unicode tables and validation rules of a
//! particular encoding are treated as an external collaborator; this module
//! only implements the adapter that buffers a trailing partial multi-byte
//! sequence across producer chunks, the one piece that is actually
//! core-owned state.

/// Converts raw byte chunks into text, holding back an incomplete trailing
/// sequence until the next chunk arrives.
pub trait Decoder: Send {
    /// Feed raw bytes in. Returns decoded text; may be empty if the whole
    /// chunk was absorbed into a still-incomplete pending sequence.
    fn decode(&mut self, chunk: &[u8]) -> String;

    /// Flush any pending partial sequence at end-of-stream. The default
    /// replaces it with the Unicode replacement character, matching how
    /// `String::from_utf8_lossy` treats a truncated tail.
    fn finish(&mut self) -> String {
        String::new()
    }
}

/// Default decoder for `Config::decoder(..)` when the caller wants UTF-8
/// text chunks instead of raw bytes.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Decoder for Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        if self.pending.is_empty() {
            // Fast path: no carry-over, try to decode the chunk directly
            // without a copy into `pending`.
            match std::str::from_utf8(chunk) {
                Ok(s) => return s.to_string(),
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    let out = chunk[..valid_up_to].to_vec();
                    let out = unsafe { String::from_utf8_unchecked(out) };
                    if e.error_len().is_some() {
                        // A genuinely invalid sequence, not just a
                        // truncated one: drop the bad byte and keep going
                        // rather than stalling forever waiting for bytes
                        // that will never arrive.
                        self.pending.clear();
                    } else {
                        self.pending.extend_from_slice(&chunk[valid_up_to..]);
                    }
                    return out;
                }
            }
        }

        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let out = s.to_string();
                self.pending.clear();
                out
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                let out =
                    std::str::from_utf8(&self.pending[..valid_up_to]).unwrap().to_string();
                if e.error_len().is_some() {
                    self.pending = self.pending.split_off(valid_up_to + e.error_len().unwrap());
                } else {
                    self.pending = self.pending.split_off(valid_up_to);
                }
                out
            }
        }
    }

    fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
