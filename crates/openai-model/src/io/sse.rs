use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    // Trailing bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    /// Returns the data of the next event, or `None` when the stream ends.
    ///
    /// Comment-only events (keep-alives) are skipped. An incomplete event
    /// at the end of the stream is discarded.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending.extend_from_slice(bytes);
        let valid = match str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        let mut text =
            str::from_utf8(&self.pending[..valid]).unwrap_or_default();
        // A trailing `\r` may be the first half of a `\r\n`.
        if let Some(stripped) = text.strip_suffix('\r') {
            text = stripped;
        }
        let consumed = text.len();
        if text.contains('\r') {
            self.buf.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buf.push_str(text);
        }
        self.pending.drain(..consumed);
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event = *( comment / field ) end-of-line
        // field = 1*name-char [ colon [ space ] *any-char ] end-of-line
        while let Some(end) = self.buf.find("\n\n") {
            let block: String = self.buf.drain(..end + 2).collect();

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match field {
                    "data" => {
                        let data = data.get_or_insert_with(String::new);
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    _ => trace!("ignoring sse field: {field}"),
                }
            }

            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}
