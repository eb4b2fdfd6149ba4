//! Loading the revision sheet, with at most one fetch in flight.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use reqwest::blocking::Client;
use thiserror::Error;

use crate::config::SourceOptions;
use crate::records::{parse, Record};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reading {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Somewhere the raw CSV text comes from.
pub trait CsvSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch_csv(&self) -> Result<String, FetchError>;
}

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(options: &SourceOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: options.url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            url: options.url.clone(),
        })
    }
}

impl CsvSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch_csv(&self) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(transport)
    }
}

/// Reads CSV from a local file, or from stdin when the path is `-`.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

impl CsvSource for FileSource {
    fn describe(&self) -> String {
        if self.is_stdin() {
            "stdin".to_string()
        } else {
            self.path.display().to_string()
        }
    }

    fn fetch_csv(&self) -> Result<String, FetchError> {
        let io_error = |source| FetchError::Io {
            path: self.describe(),
            source,
        };
        if self.is_stdin() {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(io_error)?;
            return Ok(buf);
        }
        fs::read_to_string(&self.path).map_err(io_error)
    }
}

/// Local file when one is given, the configured sheet URL otherwise.
pub fn build_source(
    options: &SourceOptions,
    file: Option<PathBuf>,
) -> Result<Arc<dyn CsvSource>, FetchError> {
    match file {
        Some(path) => Ok(Arc::new(FileSource::new(path))),
        None => Ok(Arc::new(HttpSource::new(options)?)),
    }
}

pub fn fetch_blocking(source: &dyn CsvSource) -> Result<Vec<Record>, FetchError> {
    let body = source.fetch_csv()?;
    let records = parse(&body);
    tracing::info!(source = %source.describe(), rows = records.len(), "loaded revision sheet");
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Loaded { records: Vec<Record> },
    Failed { message: String },
}

/// Runs fetches on a worker thread. A request made while another fetch is
/// still outstanding is dropped, not queued.
pub struct Fetcher {
    source: Arc<dyn CsvSource>,
    busy: Arc<AtomicBool>,
    tx: Sender<FetchEvent>,
    rx: Receiver<FetchEvent>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn CsvSource>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            source,
            busy: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts a fetch unless one is already running. Returns whether a fetch
    /// was started.
    pub fn request(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("fetch already in flight, dropping request");
            return false;
        }

        let source = Arc::clone(&self.source);
        let busy = Arc::clone(&self.busy);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("revisit-fetch".into())
            .spawn(move || {
                let event = match fetch_blocking(source.as_ref()) {
                    Ok(records) => FetchEvent::Loaded { records },
                    Err(err) => {
                        tracing::warn!(error = %err, "fetching revision sheet failed");
                        FetchEvent::Failed {
                            message: err.to_string(),
                        }
                    }
                };
                busy.store(false, Ordering::Release);
                let _ = tx.send(event);
            });

        match spawned {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(?err, "failed to spawn fetch worker");
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn try_recv(&self) -> Option<FetchEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const SHEET: &str = "Algebra,01-06-2024,3,http://x\nbroken row\nGeometry,02-06-2024,1,\n";

    struct GatedSource {
        gate: Receiver<()>,
    }

    impl CsvSource for GatedSource {
        fn describe(&self) -> String {
            "gated".into()
        }

        fn fetch_csv(&self) -> Result<String, FetchError> {
            let _ = self.gate.recv();
            Ok(SHEET.to_string())
        }
    }

    struct MissingSource;

    impl CsvSource for MissingSource {
        fn describe(&self) -> String {
            "missing".into()
        }

        fn fetch_csv(&self) -> Result<String, FetchError> {
            Err(FetchError::Io {
                path: "missing.csv".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            })
        }
    }

    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                let mut stream = reader.into_inner();
                let response = format!(
                    "{status_line}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/sheet.csv")
    }

    fn wait_for(fetcher: &Fetcher) -> Option<FetchEvent> {
        fetcher.rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    fn options_for(url: String) -> SourceOptions {
        SourceOptions {
            url,
            timeout: Duration::from_secs(5),
            ..SourceOptions::default()
        }
    }

    #[test]
    fn second_request_while_busy_is_dropped() {
        let (release, gate) = crossbeam_channel::bounded(1);
        let fetcher = Fetcher::new(Arc::new(GatedSource { gate }));

        assert!(fetcher.request());
        assert!(fetcher.is_busy());
        assert!(!fetcher.request());

        release.send(()).expect("release gate");
        let event = wait_for(&fetcher)
            .expect("fetch completes");
        assert_matches!(event, FetchEvent::Loaded { records } if records.len() == 2);
        assert!(!fetcher.is_busy());
        assert!(fetcher.try_recv().is_none());

        assert!(fetcher.request());
        release.send(()).expect("release gate");
        assert!(wait_for(&fetcher).is_some());
    }

    #[test]
    fn failures_surface_as_events() {
        let fetcher = Fetcher::new(Arc::new(MissingSource));
        assert!(fetcher.request());
        let event = wait_for(&fetcher)
            .expect("fetch completes");
        assert_matches!(event, FetchEvent::Failed { message } if message.contains("missing.csv"));
    }

    #[test]
    fn file_source_reads_local_sheet() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(SHEET.as_bytes())?;
        let source = FileSource::new(file.path().to_path_buf());
        let records = fetch_blocking(&source)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Geometry");
        Ok(())
    }

    #[test]
    fn file_source_reports_missing_files() {
        let source = FileSource::new(PathBuf::from("/definitely/not/here.csv"));
        assert_matches!(source.fetch_csv(), Err(FetchError::Io { .. }));
    }

    #[test]
    fn http_source_downloads_csv() -> anyhow::Result<()> {
        let url = serve_once("HTTP/1.1 200 OK", SHEET);
        let source = HttpSource::new(&options_for(url))?;
        let records = fetch_blocking(&source)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Algebra");
        Ok(())
    }

    #[test]
    fn http_source_rejects_error_status() -> anyhow::Result<()> {
        let url = serve_once("HTTP/1.1 404 Not Found", "gone");
        let source = HttpSource::new(&options_for(url))?;
        assert_matches!(source.fetch_csv(), Err(FetchError::Status { status: 404, .. }));
        Ok(())
    }
}
