//! Append-only event log on disk.
//!
//! Layout: `<dir>/<category>/<subject>_<yyyyMMdd>.log`. Events outside the
//! `system` category are mirrored into `<dir>/system/system_<yyyyMMdd>.log`
//! prefixed with their category. Each line is `[yyyy-MM-dd HH:mm:ss] message`.
//!
//! Old files can be zipped into `<dir>/archive/logs_before_<yyyyMMdd>.zip`.
//!
//! [`EventSink::publish`] only enqueues; a background task owns the files.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{EventCategory, EventRecord, EventSink};
use crate::error::GridError;

const DATE_FORMAT: &str = "%Y%m%d";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ARCHIVE_DIR: &str = "archive";

enum WriterCommand {
    Write(EventRecord),
    Flush(oneshot::Sender<()>),
}

pub struct FileEventLog {
    dir: PathBuf,
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl FileEventLog {
    /// Creates the directory layout and starts the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, GridError> {
        let dir = dir.into();
        for category in EventCategory::ALL {
            fs::create_dir_all(dir.join(category.to_string())).await?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(dir.clone(), rx));
        Ok(Self { dir, tx })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Waits until every event published so far has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub async fn all_files(&self) -> Result<Vec<PathBuf>, GridError> {
        let mut files = Vec::new();
        for category in EventCategory::ALL {
            let category_dir = self.dir.join(category.to_string());
            if !fs::try_exists(&category_dir).await? {
                continue;
            }
            let mut entries = fs::read_dir(&category_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Log files whose file name contains `keyword`.
    pub async fn search(&self, keyword: &str) -> Result<Vec<PathBuf>, GridError> {
        Ok(self
            .all_files()
            .await?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.contains(keyword) && name.ends_with(".log"))
            })
            .collect())
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<String>, GridError> {
        let content = fs::read_to_string(path).await?;
        Ok(content.lines().map(str::to_owned).collect())
    }

    /// Deletes every log file dated strictly before `before`. Returns how many were removed.
    pub async fn delete_before(&self, before: NaiveDate) -> Result<usize, GridError> {
        let mut removed = 0;
        for path in self.all_files().await? {
            match file_date(&path) {
                Some(date) if date < before => {
                    fs::remove_file(&path).await?;
                    debug!(path = %path.display(), "deleted log file");
                    removed += 1;
                }
                Some(_) => {}
                None => warn!(path = %path.display(), "failed to parse log file date"),
            }
        }
        Ok(removed)
    }

    /// Zips every log file dated strictly before `before` and removes the originals.
    ///
    /// Entries are named `<category>/<file>`. Returns the archive path.
    pub async fn archive_before(&self, before: NaiveDate) -> Result<PathBuf, GridError> {
        let archive_dir = self.dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive_dir).await?;
        let archive = archive_dir.join(format!("logs_before_{}.zip", before.format(DATE_FORMAT)));

        let files: Vec<PathBuf> = self
            .all_files()
            .await?
            .into_iter()
            .filter(|path| file_date(path).is_some_and(|date| date < before))
            .collect();

        let target = archive.clone();
        let entries = files.clone();
        tokio::task::spawn_blocking(move || write_archive(&target, &entries))
            .await
            .map_err(|e| GridError::Io(std::io::Error::other(e)))??;

        for path in &files {
            fs::remove_file(path).await?;
        }
        info!(archive = %archive.display(), files = files.len(), "archived log files");
        Ok(archive)
    }

    /// Removes all log files, including today's.
    pub async fn clear(&self) -> Result<usize, GridError> {
        let tomorrow = Local::now().date_naive() + chrono::Duration::days(1);
        self.delete_before(tomorrow).await
    }
}

impl EventSink for FileEventLog {
    fn publish(&self, event: EventRecord) {
        if self.tx.send(WriterCommand::Write(event)).is_err() {
            warn!(dir = %self.dir.display(), "event log writer stopped, dropping event");
        }
    }
}

async fn writer_loop(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<WriterCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriterCommand::Write(event) => write_event(&dir, &event).await,
            WriterCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn write_event(dir: &Path, event: &EventRecord) {
    let date = event.timestamp.format(DATE_FORMAT).to_string();
    let file = dir
        .join(event.category.to_string())
        .join(format!("{}_{date}.log", sanitize(&event.subject)));
    append_line(&file, event, &event.message).await;

    if event.category != EventCategory::System {
        let system_file = dir
            .join(EventCategory::System.to_string())
            .join(format!("system_{date}.log"));
        let mirrored = format!("{}: {}", event.category.to_string().to_uppercase(), event.message);
        append_line(&system_file, event, &mirrored).await;
    }
}

async fn append_line(path: &Path, event: &EventRecord, message: &str) {
    let line = format!("[{}] {message}\n", event.timestamp.format(TIME_FORMAT));
    let result = async {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        error!(path = %path.display(), error = %e, "failed to write to log file");
    }
}

fn write_archive(target: &Path, files: &[PathBuf]) -> Result<(), GridError> {
    let mut zip = ZipWriter::new(std::fs::File::create(target)?);
    let options = SimpleFileOptions::default();
    for path in files {
        let category = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        zip.start_file(format!("{category}/{name}"), options)?;
        zip.write_all(&std::fs::read(path)?)?;
    }
    zip.finish()?;
    Ok(())
}

fn sanitize(subject: &str) -> String {
    subject
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Parses the `yyyyMMdd` suffix of `<subject>_<yyyyMMdd>.log`.
fn file_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let (_, date) = stem.rsplit_once('_')?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}
