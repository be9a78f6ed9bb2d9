use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::catalog::{LogCatalog, LogTarget};
use crate::{Error, Result};

/// Maximum number of trailing lines taken from each log file.
pub const TAIL_LINES: usize = 15;

pub const DIRECTORY_NOT_FOUND: &str = "未能定位日志目录。";
pub const EMPTY_LOGS: &str = "日志文件为空";

const CHUNK_SIZE: u64 = 8 * 1024;

/// Upper bound on the bytes read from the end of one log file.
pub const MAX_SCAN_BYTES: u64 = 1024 * 1024;

/// What could be recovered from one expected log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileExcerpt {
    /// Non-blank tail lines, oldest first.
    Lines { file: String, lines: Vec<String> },
    Missing { file: String },
    Unreadable { file: String, reason: String },
}

impl FileExcerpt {
    pub fn file(&self) -> &str {
        match self {
            FileExcerpt::Lines { file, .. }
            | FileExcerpt::Missing { file }
            | FileExcerpt::Unreadable { file, .. } => file,
        }
    }

    fn render_into(&self, out: &mut Vec<String>) {
        match self {
            FileExcerpt::Lines { file, lines } => {
                out.push(format!("[{}]", file));
                out.extend(lines.iter().cloned());
            }
            FileExcerpt::Missing { file } => out.push(format!("文件 {} 不存在", file)),
            FileExcerpt::Unreadable { file, reason } => {
                out.push(format!("读取 {} 报错: {}", file, reason))
            }
        }
    }
}

/// Tail excerpts of a service's log files, read fresh for a single alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBundle {
    pub files: Vec<FileExcerpt>,
}

impl LogBundle {
    /// Render the bundle as the multi-line evidence block used in prompts.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        for excerpt in &self.files {
            excerpt.render_into(&mut out);
        }

        if out.is_empty() {
            EMPTY_LOGS.to_string()
        } else {
            out.join("\n")
        }
    }
}

/// Source of log evidence for a service.
///
/// `Err(Error::LogUnavailable)` means there is no log directory to read for
/// the service at all. Per-file problems are reported inside the bundle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogContextSource: Send + Sync {
    async fn collect(&self, service: &str) -> Result<LogBundle>;
}

pub struct LogContextReader {
    catalog: LogCatalog,
}

impl LogContextReader {
    pub fn new(catalog: LogCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &LogCatalog {
        &self.catalog
    }

    async fn read_excerpt(dir: &Path, file: &str) -> FileExcerpt {
        let path = dir.join(file);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Log file {} does not exist", path.display());
                return FileExcerpt::Missing {
                    file: file.to_string(),
                };
            }
            Err(e) => {
                return FileExcerpt::Unreadable {
                    file: file.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        if !metadata.is_file() {
            return FileExcerpt::Unreadable {
                file: file.to_string(),
                reason: "not a regular file".to_string(),
            };
        }

        match read_tail(path.clone()).await {
            Ok(lines) => FileExcerpt::Lines {
                file: file.to_string(),
                lines,
            },
            Err(e) => {
                warn!("Failed to read log file {}: {}", path.display(), e);
                FileExcerpt::Unreadable {
                    file: file.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl LogContextSource for LogContextReader {
    async fn collect(&self, service: &str) -> Result<LogBundle> {
        let source = match self.catalog.resolve(service) {
            LogTarget::Known(source) => source,
            LogTarget::Unknown => {
                info!("No log directory registered for service {}", service);
                return Err(Error::LogUnavailable(format!(
                    "service {} has no registered log directory",
                    service
                )));
            }
        };

        info!(
            "Reading recent logs for service {} from {}",
            service,
            source.dir.display()
        );

        let is_dir = tokio::fs::metadata(&source.dir)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::LogUnavailable(format!(
                "log directory {} does not exist",
                source.dir.display()
            )));
        }

        let mut files = Vec::with_capacity(2);
        for file in source.files() {
            files.push(Self::read_excerpt(&source.dir, file).await);
        }

        Ok(LogBundle { files })
    }
}

async fn read_tail(path: PathBuf) -> io::Result<Vec<String>> {
    let lines = tokio::task::spawn_blocking(move || tail_lines(&path, TAIL_LINES))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

    Ok(lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Return the last `limit` lines of a file, reading backwards from the end.
///
/// At most [`MAX_SCAN_BYTES`] from the end of the file are examined, so an
/// overlong first line comes back truncated to its tail. A final line
/// terminator does not start another line. Bytes that are not valid UTF-8
/// are replaced.
fn tail_lines(path: &Path, limit: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let floor = len.saturating_sub(MAX_SCAN_BYTES);

    let mut pos = len;
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut newlines = 0;

    // One terminator more than `limit` guarantees the earliest kept line is whole.
    while pos > floor && newlines <= limit {
        let read = CHUNK_SIZE.min(pos - floor);
        pos -= read;

        let mut chunk = vec![0u8; read as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk)?;
        newlines += count_newlines(&chunk);
        chunks.push(chunk);
    }

    chunks.reverse();
    let buf = chunks.concat();

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }

    let start = lines.len().saturating_sub(limit);
    Ok(lines[start..].iter().map(|line| line.to_string()).collect())
}

fn count_newlines(buf: &[u8]) -> usize {
    buf.iter().filter(|&&b| b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogSource;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    fn reader_for(dir: &Path) -> LogContextReader {
        LogContextReader::new(LogCatalog::empty().with_service(
            "kodbox",
            LogSource::new(dir, "kodbox_access_ssl.log", "kodbox_error_ssl.log"),
        ))
    }

    #[tokio::test]
    async fn test_unknown_service_is_unavailable() {
        let reader = LogContextReader::new(LogCatalog::builtin());
        let result = reader.collect("通用业务").await;
        assert!(matches!(result, Err(Error::LogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let reader = reader_for(&tmp.path().join("absent"));
        let result = reader.collect("kodbox").await;
        assert!(matches!(result, Err(Error::LogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_regular_file_as_directory_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("kodbox");
        std::fs::write(&not_a_dir, "just a file").unwrap();

        let result = reader_for(&not_a_dir).collect("kodbox").await;
        assert!(matches!(result, Err(Error::LogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_tail_keeps_last_lines_and_drops_blanks() {
        let tmp = TempDir::new().unwrap();

        // 100 lines, every fifth one blank.
        let mut content = String::new();
        for i in 0..100 {
            if i % 5 == 4 {
                content.push_str("   \n");
            } else {
                writeln!(content, "GET /line/{} 200", i).unwrap();
            }
        }
        std::fs::write(tmp.path().join("kodbox_access_ssl.log"), &content).unwrap();

        let bundle = reader_for(tmp.path()).collect("kodbox").await.unwrap();
        match &bundle.files[0] {
            FileExcerpt::Lines { file, lines } => {
                assert_eq!(file, "kodbox_access_ssl.log");
                assert!(lines.len() <= TAIL_LINES);
                // The last 15 lines are 85..=99, of which 89, 94 and 99 are blank.
                let expected: Vec<String> = (85..100)
                    .filter(|i| i % 5 != 4)
                    .map(|i| format!("GET /line/{} 200", i))
                    .collect();
                assert_eq!(lines, &expected);
            }
            other => panic!("expected lines, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_and_unreadable_files_degrade_to_placeholders() {
        let tmp = TempDir::new().unwrap();
        // A directory where the error log should be cannot be read as a file.
        std::fs::create_dir(tmp.path().join("kodbox_error_ssl.log")).unwrap();

        let bundle = reader_for(tmp.path()).collect("kodbox").await.unwrap();
        assert_eq!(
            bundle.files[0],
            FileExcerpt::Missing {
                file: "kodbox_access_ssl.log".to_string()
            }
        );
        assert!(matches!(
            &bundle.files[1],
            FileExcerpt::Unreadable { file, .. } if file == "kodbox_error_ssl.log"
        ));

        let rendered = bundle.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "文件 kodbox_access_ssl.log 不存在");
        assert!(lines[1].starts_with("读取 kodbox_error_ssl.log 报错: "));
    }

    #[tokio::test]
    async fn test_render_labels_each_file_in_fixed_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("kodbox_error_ssl.log"), "boom\n\n").unwrap();
        std::fs::write(tmp.path().join("kodbox_access_ssl.log"), "GET / 200").unwrap();

        let bundle = reader_for(tmp.path()).collect("kodbox").await.unwrap();
        assert_eq!(
            bundle.render(),
            "[kodbox_access_ssl.log]\nGET / 200\n[kodbox_error_ssl.log]\nboom"
        );
    }

    #[test]
    fn test_empty_bundle_renders_placeholder() {
        assert_eq!(LogBundle::default().render(), EMPTY_LOGS);
    }

    #[test]
    fn test_tail_lines_across_chunk_boundaries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.log");

        let line = "x".repeat(1000);
        let mut content = String::new();
        for i in 0..50 {
            writeln!(content, "{} {}", i, line).unwrap();
        }
        std::fs::write(&path, &content).unwrap();

        let lines = tail_lines(&path, TAIL_LINES).unwrap();
        assert_eq!(lines.len(), TAIL_LINES);
        assert_eq!(lines[0], format!("35 {}", line));
        assert_eq!(lines[14], format!("49 {}", line));
    }

    #[test]
    fn test_tail_lines_without_terminators_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("one_line.log");
        std::fs::write(&path, vec![b'x'; 3 * MAX_SCAN_BYTES as usize]).unwrap();

        let started = std::time::Instant::now();
        let lines = tail_lines(&path, TAIL_LINES).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_SCAN_BYTES as usize);
    }

    #[test]
    fn test_tail_lines_truncates_overlong_first_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mixed.log");
        let mut content = vec![b'x'; 2 * MAX_SCAN_BYTES as usize];
        content.extend_from_slice(b"\nGET /a 200\nGET /b 502\n");
        std::fs::write(&path, content).unwrap();

        let lines = tail_lines(&path, TAIL_LINES).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), MAX_SCAN_BYTES as usize - 23);
        assert_eq!(&lines[1..], &["GET /a 200".to_string(), "GET /b 502".to_string()]);
    }

    #[test]
    fn test_tail_lines_short_and_empty_files() {
        let tmp = TempDir::new().unwrap();
        let short = tmp.path().join("short.log");
        std::fs::write(&short, "a\r\nb\n").unwrap();
        assert_eq!(tail_lines(&short, TAIL_LINES).unwrap(), vec!["a\r", "b"]);

        let empty = tmp.path().join("empty.log");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(tail_lines(&empty, TAIL_LINES).unwrap(), vec![""]);
    }
}
