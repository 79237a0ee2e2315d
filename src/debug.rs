use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::view::View;

/// Render pass a node event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Measure,
    Layout,
    Draw,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::Measure => "measure",
            Pass::Layout => "layout",
            Pass::Draw => "draw",
        }
    }
}

/// JSON-lines trace of a render: one record per visited node plus a
/// per-render summary of counters.
#[derive(Clone)]
pub struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: Box<dyn Write + Send>,
    counters: BTreeMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: Box::new(writer),
                counters: BTreeMap::new(),
            })),
        }
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    /// Records one node visit with its measured size and placed bounds.
    pub fn log_node(&self, pass: Pass, depth: usize, view: &dyn View) {
        let core = view.core();
        let measured = core.measured();
        let bounds = core.bounds();
        let id = core
            .id()
            .map(|id| format!("\"{}\"", json_escape(id)))
            .unwrap_or_else(|| "null".to_string());
        self.log_json(&format!(
            "{{\"type\":\"view.{}\",\"depth\":{},\"view\":\"{}\",\"id\":{},\"measured\":[{},{}],\"bounds\":[{},{},{},{}]}}",
            pass.name(),
            depth,
            json_escape(view.type_name()),
            id,
            measured.width,
            measured.height,
            bounds.left,
            bounds.top,
            bounds.right,
            bounds.bottom
        ));
        self.increment(&format!("{}.nodes", pass.name()), 1);
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Writes the accumulated counters and resets them.
    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let counts = counters
                .iter()
                .map(|(key, value)| format!("\"{}\":{}", json_escape(key), value))
                .collect::<Vec<_>>()
                .join(",");
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{{{}}}}}",
                json_escape(context),
                counts
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl std::fmt::Debug for DebugLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugLogger").finish_non_exhaustive()
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(pub(crate) Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{PlainView, ViewExt};

    #[test]
    fn escapes_quotes_and_controls() {
        assert_eq!(json_escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(json_escape("\u{1}"), "\\u0001");
    }

    #[test]
    fn node_records_carry_geometry() {
        let buffer = SharedBuffer::default();
        let logger = DebugLogger::from_writer(buffer.clone());
        let mut view = PlainView::new();
        view.core_mut().set_id("root");
        view.layout(1, 2, 11, 22).unwrap();
        logger.log_node(Pass::Layout, 0, &view);
        assert_eq!(
            buffer.lines(),
            ["{\"type\":\"view.layout\",\"depth\":0,\"view\":\"View\",\"id\":\"root\",\"measured\":[0,0],\"bounds\":[1,2,11,22]}"]
        );
    }

    #[test]
    fn summary_drains_counters_in_key_order() {
        let buffer = SharedBuffer::default();
        let logger = DebugLogger::from_writer(buffer.clone());
        logger.increment("b", 2);
        logger.increment("a", 1);
        logger.increment("b", 3);
        logger.emit_summary("render");
        logger.emit_summary("render");
        assert_eq!(
            buffer.lines(),
            [
                "{\"type\":\"debug.summary\",\"context\":\"render\",\"counts\":{\"a\":1,\"b\":5}}",
                "{\"type\":\"debug.summary\",\"context\":\"render\",\"counts\":{}}",
            ]
        );
    }

    #[test]
    fn writes_to_a_file() {
        let path = std::env::temp_dir().join(format!("lightetch_debug_{}.jsonl", std::process::id()));
        let logger = DebugLogger::new(&path).unwrap();
        logger.log_json("{}");
        logger.flush();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(written, "{}\n");
    }
}
