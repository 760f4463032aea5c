//! Server-Sent Events framing parser.
//!
//! Responses from the tool server may arrive SSE-framed inside an ordinary
//! HTTP response body. The transport runs one parse pass per body: `feed`
//! yields every event terminated by a blank line, and `finish` flushes a
//! trailing event that the server did not terminate.

/// A single SSE event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

/// SSE parser that processes text into events.
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed a chunk of text and return any complete events.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        // Complete event blocks are separated by blank lines
        while let Some(pos) = self.buffer.find("\n\n") {
            let block = self.buffer[..pos].to_string();
            self.buffer = self.buffer[pos + 2..].to_string();

            if let Some(event) = Self::parse_block(&block) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing event that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return None;
        }
        Self::parse_block(&rest)
    }

    /// Parse one event block into an event.
    fn parse_block(block: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                // Comment line, skip
                continue;
            }

            if let Some((field, value)) = line.split_once(':') {
                // Trim leading space from value per SSE spec
                let value = value.strip_prefix(' ').unwrap_or(value);
                match field {
                    "event" => event_type = Some(value.to_string()),
                    "data" => data_lines.push(value.to_string()),
                    _ => {} // Ignore unknown fields
                }
            } else if line == "data" {
                // Field with no value
                data_lines.push(String::new());
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
        })
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}
