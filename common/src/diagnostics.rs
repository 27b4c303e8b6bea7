/// Longest stored line in bytes; longer lines are cut at a char boundary.
pub const MAX_LINE_BYTES: usize = 150;

/// Bounded, append-only list of timestamped event lines.
///
/// Admission stops once the free part of the byte budget drops below the
/// reserve. Nothing already stored is evicted, so a full log keeps the oldest
/// lines and drops new ones.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    lines: Vec<String>,
    used_bytes: usize,
    budget_bytes: usize,
    reserve_bytes: usize,
}

impl DiagnosticLog {
    pub fn new(budget_bytes: usize, reserve_bytes: usize) -> Self {
        Self {
            lines: Vec::new(),
            used_bytes: 0,
            budget_bytes,
            reserve_bytes,
        }
    }

    pub fn free_bytes(&self) -> usize {
        self.budget_bytes.saturating_sub(self.used_bytes)
    }

    /// Appends `line` if there is room. Returns whether it was stored.
    pub fn push(&mut self, line: &str) -> bool {
        if self.free_bytes() <= self.reserve_bytes {
            return false;
        }
        let line = truncate_at_boundary(line, MAX_LINE_BYTES);
        self.used_bytes += line.len() + 1;
        self.lines.push(line.to_string());
        true
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn len(&self) -> usize {
        self.lines.len()
    }
}

fn truncate_at_boundary(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Pull-based reader that hands out the log in caller-sized chunks.
///
/// A call with `index == 0` starts over and fixes the number of lines to send,
/// so lines appended while a transfer is running are left for the next one.
/// Each line is followed by `\n`. A return shorter than the buffer means the
/// stream is finished.
#[derive(Debug, Clone, Default)]
pub struct LogStream {
    line: usize,
    offset: usize,
    end: usize,
}

impl LogStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&mut self, log: &DiagnosticLog, buf: &mut [u8], index: usize) -> usize {
        if index == 0 {
            self.line = 0;
            self.offset = 0;
            self.end = log.len();
        }

        let mut filled = 0;
        while filled < buf.len() && self.line < self.end {
            let Some(text) = log.lines().get(self.line) else {
                break;
            };
            let bytes = text.as_bytes();

            if self.offset < bytes.len() {
                let count = (bytes.len() - self.offset).min(buf.len() - filled);
                buf[filled..filled + count]
                    .copy_from_slice(&bytes[self.offset..self.offset + count]);
                filled += count;
                self.offset += count;
            } else {
                buf[filled] = b'\n';
                filled += 1;
                self.line += 1;
                self.offset = 0;
            }
        }
        filled
    }
}
