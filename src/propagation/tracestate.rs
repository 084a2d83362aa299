//! W3C `tracestate` vendor-entry codec.
//!
//! A `tracestate` header is a comma-separated list of `key=value` entries,
//! each owned by one tracing vendor. This codec isolates a single configured
//! vendor key: parsing hands that entry's value to a caller-supplied handler
//! and returns the remaining entries ready for re-emission; writing puts the
//! vendor entry first, followed by whatever entries other vendors sent.
//!
//! Optional whitespace (spaces and tabs) is trimmed around keys only; values
//! are taken verbatim, so an empty or whitespace-only value survives. When
//! the same vendor key appears more than once, the first occurrence is the
//! entry and later occurrences pass through with the other vendors' entries.

/// Parses and writes one vendor's entry within a `tracestate` header.
#[derive(Debug, Clone)]
pub struct TracestateFormat {
    key: String,
}

impl TracestateFormat {
    /// Creates a codec isolating entries whose key equals `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The vendor key this codec isolates.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Scans `header`, invoking `handler` with `(header, begin, end)` spanning
    /// this vendor's value when found. Returns the other vendors' entries
    /// comma-joined, or `None` if there were none.
    ///
    /// If the handler returns `false`, scanning halts and everything after
    /// the matched entry is preserved as-is among the other entries.
    pub fn parse_with<F>(&self, header: &str, mut handler: F) -> Option<String>
    where
        F: FnMut(&str, usize, usize) -> bool,
    {
        let mut others: Vec<&str> = Vec::new();
        let mut matched = false;
        let mut pos = 0;

        while pos <= header.len() {
            let end = header[pos..]
                .find(',')
                .map(|i| pos + i)
                .unwrap_or(header.len());
            let entry = &header[pos..end];

            if entry.trim_matches([' ', '\t']).is_empty() {
                // empty list members are tolerated and dropped
            } else if let (false, Some(eq)) = (matched, entry.find('=')) {
                let key = entry[..eq].trim_matches([' ', '\t']);
                if key == self.key {
                    matched = true;
                    if !handler(header, pos + eq + 1, end) {
                        if end < header.len() {
                            others.push(&header[end + 1..]);
                        }
                        break;
                    }
                } else {
                    others.push(entry.trim_start_matches([' ', '\t']));
                }
            } else {
                // already matched, a duplicate vendor key, or a keyless
                // fragment: pass through untouched
                others.push(entry.trim_start_matches([' ', '\t']));
            }

            if end == header.len() {
                break;
            }
            pos = end + 1;
        }

        if others.is_empty() {
            None
        } else {
            Some(others.join(","))
        }
    }

    /// Convenience over [`parse_with`](Self::parse_with): returns this
    /// vendor's value and the other entries.
    pub fn extract(&self, header: &str) -> (Option<String>, Option<String>) {
        let mut value = None;
        let others = self.parse_with(header, |header, begin, end| {
            value = Some(header[begin..end].to_string());
            true
        });
        (value, others)
    }

    /// Renders a header with this vendor's entry first, then `others`.
    ///
    /// The recommendation is to keep the whole header within 512 characters;
    /// longer output is emitted anyway, with a warning.
    pub fn write(&self, value: &str, others: Option<&str>) -> String {
        let mut out = String::with_capacity(
            self.key.len() + 1 + value.len() + others.map_or(0, |o| o.len() + 1),
        );
        out.push_str(&self.key);
        out.push('=');
        out.push_str(value);
        if let Some(others) = others.filter(|o| !o.is_empty()) {
            out.push(',');
            out.push_str(others);
        }
        if out.len() > 512 {
            tracing::warn!(
                len = out.len(),
                "tracestate header exceeds the recommended 512 characters"
            );
        }
        out
    }
}
