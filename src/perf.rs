use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debug::json_escape;

/// Timing log for render passes and output backends.
///
/// Each span and count is written as a JSON line as it happens. When the
/// last clone is dropped, the totals are ranked into a sibling
/// `<stem>_hot.log`.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    /// Runs `f` and logs its wall time under `name`.
    pub fn span<T>(&self, name: &str, page: Option<usize>, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.log_span_ms(name, page, started.elapsed().as_secs_f64() * 1000.0);
        out
    }

    pub fn log_span_ms(&self, name: &str, page: Option<usize>, ms: f64) {
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"page\":{},\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            page_json(page),
            ms
        );
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn log_counts(&self, name: &str, page: Option<usize>, counts: &[(&str, u64)]) {
        let fields = counts
            .iter()
            .map(|(key, value)| format!("\"{}\":{}", json_escape(key), value))
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(
            "{{\"type\":\"perf.counts\",\"name\":\"{}\",\"page\":{},\"counts\":{{{}}}}}",
            json_escape(name),
            page_json(page),
            fields
        );
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl std::fmt::Debug for PerfLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerfLogger").finish_non_exhaustive()
    }
}

fn page_json(page: Option<usize>) -> String {
    page.map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let hot_path = hot_path_for(&self.path);
        let Ok(file) = File::create(&hot_path) else {
            log::warn!("could not create {}", hot_path.display());
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| {
            b.1.partial_cmp(a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        for (rank, (name, ms)) in spans.into_iter().take(100).enumerate() {
            let count = self.span_counts.get(name).copied().unwrap_or(1).max(1);
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.span\",\"rank\":{},\"name\":\"{}\",\"ms\":{:.3},\"count\":{},\"avg_ms\":{:.3}}}",
                rank + 1,
                json_escape(name),
                ms,
                count,
                ms / count as f64
            );
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().take(100).enumerate() {
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.count\",\"rank\":{},\"name\":\"{}\",\"value\":{}}}",
                rank + 1,
                json_escape(name),
                value
            );
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("lightetch_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_path_replaces_extension() {
        assert_eq!(
            hot_path_for(Path::new("/tmp/run.log")),
            PathBuf::from("/tmp/run_hot.log")
        );
        assert_eq!(
            hot_path_for(Path::new("/tmp/trace")),
            PathBuf::from("/tmp/trace_hot.log")
        );
    }

    #[test]
    fn spans_and_counts_are_logged_and_ranked_on_drop() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("lightetch_perf_{}.log", std::process::id()));
        let hot = hot_path_for(&path);
        {
            let logger = PerfLogger::new(&path).unwrap();
            logger.log_span_ms("draw", Some(0), 2.0);
            logger.log_span_ms("measure", None, 5.0);
            logger.log_span_ms("draw", Some(1), 4.0);
            logger.log_counts("render", Some(0), &[("views", 3)]);
            assert_eq!(logger.span("layout", None, || 7), 7);
        }
        let log = std::fs::read_to_string(&path).unwrap();
        let hot_log = std::fs::read_to_string(&hot).unwrap();
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&hot);

        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "{\"type\":\"perf.span\",\"name\":\"draw\",\"page\":0,\"unit\":\"ms\",\"ms\":2.000}"
        );
        assert_eq!(
            lines[3],
            "{\"type\":\"perf.counts\",\"name\":\"render\",\"page\":0,\"counts\":{\"views\":3}}"
        );

        let hot_lines: Vec<&str> = hot_log.lines().collect();
        assert!(hot_lines[0].contains("\"name\":\"draw\",\"ms\":6.000,\"count\":2,\"avg_ms\":3.000"));
        assert!(hot_lines[1].contains("\"name\":\"measure\""));
        assert!(hot_log.contains("\"name\":\"render.views\",\"value\":3"));
    }
}
