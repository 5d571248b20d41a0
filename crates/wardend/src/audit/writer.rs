//! Mirror-backed append-only audit log.
//!
//! Workers and the dispatcher append records to a mirror file in the working
//! directory while holding an exclusive advisory lock. The dispatcher
//! periodically copies everything past its read cursor to the permanent log
//! and truncates the mirror once the copy has succeeded. Archival can be
//! paused (`stop`), resumed (`start`) and the permanent log rotated to a
//! timestamped archive name.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use tempfile::Builder;
use tracing::{debug, info, warn};

use super::errors::AuditLogError;
use super::{AUDIT_TARGET, timestamp};

const COPY_CHUNK: usize = 16 * 1024;
const MIRROR_PREFIX: &str = "warden";
const MIRROR_SUFFIX: &str = ".log.tmp";

/// How the permanent log is treated when the daemon starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LogStartup {
    /// Copy mirror records into the permanent log.
    pub(crate) archive: bool,
    /// Move an existing permanent log to an archive name first.
    pub(crate) rotate_existing: bool,
}

/// Mirror removal attempts made while closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RemovalRetry {
    pub(crate) attempts: u32,
    pub(crate) delay: Duration,
}

impl Default for RemovalRetry {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_secs(1),
        }
    }
}

/// The durable audit log.
#[derive(Debug)]
pub(crate) struct AuditLog {
    log_path: PathBuf,
    mirror_path: PathBuf,
    mirror: File,
    mirror_position: u64,
    permanent: Option<File>,
    archiving: bool,
    /// Set by `stop`: the mirror keeps its records until archival resumes.
    paused: bool,
}

impl AuditLog {
    /// Creates the mirror in `work_dir` and opens the permanent log.
    pub(crate) fn open(
        log_path: &Path,
        work_dir: &Path,
        startup: LogStartup,
    ) -> Result<Self, AuditLogError> {
        let (mirror, mirror_path) = create_mirror(work_dir)?;
        let mut log = Self {
            log_path: log_path.to_path_buf(),
            mirror_path,
            mirror,
            mirror_position: 0,
            permanent: None,
            archiving: startup.archive,
            paused: false,
        };
        if startup.archive {
            match open_existing(log_path)? {
                Some(file) => {
                    log.permanent = Some(file);
                    if startup.rotate_existing {
                        log.archive_current(false)?;
                    } else {
                        log.write_start_marker()?;
                    }
                }
                None => log.create_permanent()?,
            }
        }
        info!(
            target: AUDIT_TARGET,
            log = %log.log_path.display(),
            mirror = %log.mirror_path.display(),
            archiving = log.archiving,
            "audit log opened"
        );
        Ok(log)
    }

    pub(crate) fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }

    pub(crate) const fn is_archiving(&self) -> bool {
        self.archiving
    }

    pub(crate) const fn mirror_position(&self) -> u64 {
        self.mirror_position
    }

    /// Whether new workers may be admitted without losing records.
    ///
    /// While archiving, the permanent log must be open and the last flush
    /// must have truncated the mirror.
    pub(crate) const fn is_healthy(&self) -> bool {
        !self.archiving || (self.permanent.is_some() && self.mirror_position == 0)
    }

    /// Appends `record` to the mirror under the advisory lock.
    pub(crate) fn write(&mut self, record: &[u8]) -> Result<(), AuditLogError> {
        let _lock = MirrorLock::acquire(&self.mirror, &self.mirror_path)?;
        let mut handle = &self.mirror;
        handle
            .seek(SeekFrom::End(0))
            .and_then(|_| handle.write_all(record))
            .map_err(|source| AuditLogError::Write {
                path: self.mirror_path.clone(),
                source,
            })
    }

    /// Appends `<tag attrs>TS</tag>` to the mirror.
    pub(crate) fn write_record(
        &mut self,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<(), AuditLogError> {
        let record = element(tag, attributes, &timestamp::now()?);
        self.write(record.as_bytes())
    }

    /// Moves unread mirror bytes to the permanent log and truncates the mirror.
    ///
    /// While paused by `stop` the mirror is left untouched so the backlog is
    /// archived on resume. With archival disabled the mirror is truncated
    /// without copying.
    pub(crate) fn flush(&mut self) -> Result<(), AuditLogError> {
        if self.paused {
            return Ok(());
        }
        let _lock = MirrorLock::acquire(&self.mirror, &self.mirror_path)?;
        if self.archiving {
            let permanent = self.permanent.as_mut().ok_or(AuditLogError::NotOpen)?;
            let copied = copy_from(
                &self.mirror,
                &self.mirror_path,
                self.mirror_position,
                permanent,
                &self.log_path,
            );
            match copied {
                Ok(count) => self.mirror_position += count,
                Err((count, error)) => {
                    self.mirror_position += count;
                    return Err(error);
                }
            }
        }
        match self.mirror.set_len(0) {
            Ok(()) => self.mirror_position = 0,
            Err(error) => {
                warn!(
                    target: AUDIT_TARGET,
                    error = %error,
                    "mirror truncation failed; keeping read cursor at end"
                );
                let mut handle = &self.mirror;
                if let Ok(end) = handle.seek(SeekFrom::End(0)) {
                    self.mirror_position = end;
                }
            }
        }
        Ok(())
    }

    /// Archives the permanent log and starts a fresh one.
    ///
    /// Returns the archive path when an existing log was moved aside.
    pub(crate) fn rotate(&mut self) -> Result<Option<PathBuf>, AuditLogError> {
        let flushed = self.flush();
        if self.archiving {
            flushed?;
        }
        let archived = if self.permanent.is_some() {
            Some(self.archive_current(true)?)
        } else {
            match open_existing(&self.log_path)? {
                Some(file) => {
                    self.permanent = Some(file);
                    Some(self.archive_current(false)?)
                }
                None => {
                    self.create_permanent()?;
                    None
                }
            }
        };
        self.resume()?;
        Ok(archived)
    }

    /// Pauses archival: flushes, writes the stop marker and closes the log.
    pub(crate) fn stop(&mut self) -> Result<(), AuditLogError> {
        if self.archiving {
            if self.permanent.is_none() {
                return Err(AuditLogError::NotOpen);
            }
            self.flush()?;
            self.write_marker("stop")?;
            self.permanent = None;
            self.paused = true;
        }
        self.archiving = false;
        info!(target: AUDIT_TARGET, "audit archival paused");
        Ok(())
    }

    /// Resumes archival, reopening or creating the permanent log.
    ///
    /// Records written while paused follow the new start marker.
    pub(crate) fn start(&mut self) -> Result<(), AuditLogError> {
        if let Err(error) = self.flush() {
            debug!(target: AUDIT_TARGET, error = %error, "flush before resume failed");
        }
        if self.permanent.is_none() {
            match open_existing(&self.log_path)? {
                Some(file) => {
                    self.permanent = Some(file);
                    self.write_start_marker()?;
                }
                None => self.create_permanent()?,
            }
        }
        self.resume()?;
        info!(target: AUDIT_TARGET, "audit archival resumed");
        Ok(())
    }

    /// Re-enables archival and copies any backlog kept while paused.
    fn resume(&mut self) -> Result<(), AuditLogError> {
        self.archiving = true;
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.flush()
    }

    /// Flushes, records the stop and removes the mirror.
    pub(crate) fn close(
        mut self,
        signal: Option<i32>,
        retry: RemovalRetry,
    ) -> Result<(), AuditLogError> {
        if self.archiving {
            if self.permanent.is_none() {
                return Err(AuditLogError::NotOpen);
            }
            self.flush()?;
            if let Some(signal) = signal {
                self.append_permanent(format!("<signal>{signal}</signal>").as_bytes())?;
            }
            self.write_marker("stop")?;
        }
        let Self {
            mirror,
            mirror_path,
            permanent,
            ..
        } = self;
        drop(permanent);
        drop(mirror);
        remove_with_retry(&mirror_path, retry);
        info!(target: AUDIT_TARGET, "audit log closed");
        Ok(())
    }

    fn create_permanent(&mut self) -> Result<(), AuditLogError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)
            .map_err(|source| AuditLogError::Open {
                path: self.log_path.clone(),
                source,
            })?;
        self.permanent = Some(file);
        self.write_start_marker()
    }

    fn archive_current(&mut self, write_stop: bool) -> Result<PathBuf, AuditLogError> {
        let stamp = timestamp::now()?;
        let archive = archive_path(&self.log_path, &stamp);
        match fs::remove_file(&archive) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                debug!(target: AUDIT_TARGET, error = %error, "stale archive not removed");
            }
            _ => {}
        }
        if write_stop {
            self.append_marker(element("stop", &[], &stamp).as_bytes())?;
        }
        self.permanent = None;
        fs::rename(&self.log_path, &archive).map_err(|source| AuditLogError::Rename {
            from: self.log_path.clone(),
            to: archive.clone(),
            source,
        })?;
        self.create_permanent()?;
        info!(
            target: AUDIT_TARGET,
            archive = %archive.display(),
            "audit log rotated"
        );
        Ok(archive)
    }

    fn write_start_marker(&mut self) -> Result<(), AuditLogError> {
        let record = start_marker(&timestamp::now()?);
        self.append_marker(record.as_bytes())
    }

    fn write_marker(&mut self, tag: &str) -> Result<(), AuditLogError> {
        let record = element(tag, &[], &timestamp::now()?);
        self.append_marker(record.as_bytes())
    }

    fn append_marker(&mut self, bytes: &[u8]) -> Result<(), AuditLogError> {
        self.append_permanent(bytes).map_err(|error| match error {
            AuditLogError::Write { path, source } => AuditLogError::Marker { path, source },
            other => other,
        })
    }

    fn append_permanent(&mut self, bytes: &[u8]) -> Result<(), AuditLogError> {
        let file = self.permanent.as_mut().ok_or(AuditLogError::NotOpen)?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|source| AuditLogError::Write {
                path: self.log_path.clone(),
                source,
            })
    }
}

/// Exclusive advisory lock on the mirror, released on drop.
struct MirrorLock<'a> {
    file: &'a File,
}

impl<'a> MirrorLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self, AuditLogError> {
        FileExt::lock_exclusive(file).map_err(|source| AuditLogError::Mirror {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for MirrorLock<'_> {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(self.file) {
            warn!(target: AUDIT_TARGET, error = %error, "failed to unlock mirror");
        }
    }
}

fn create_mirror(work_dir: &Path) -> Result<(File, PathBuf), AuditLogError> {
    let mirror_error = |source| AuditLogError::MirrorCreate {
        dir: work_dir.to_path_buf(),
        source,
    };
    let temp = Builder::new()
        .prefix(MIRROR_PREFIX)
        .suffix(MIRROR_SUFFIX)
        .tempfile_in(work_dir)
        .map_err(mirror_error)?;
    temp.keep().map_err(|error| mirror_error(error.error))
}

fn open_existing(path: &Path) -> Result<Option<File>, AuditLogError> {
    match OpenOptions::new().append(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AuditLogError::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Copies from `position` to the end of the mirror.
///
/// On failure the number of bytes already copied is returned with the error
/// so the cursor never replays them.
fn copy_from(
    mirror: &File,
    mirror_path: &Path,
    position: u64,
    permanent: &mut File,
    log_path: &Path,
) -> Result<u64, (u64, AuditLogError)> {
    let mut reader = mirror;
    let mirror_error = |source| AuditLogError::Mirror {
        path: mirror_path.to_path_buf(),
        source,
    };
    reader
        .seek(SeekFrom::Start(position))
        .map_err(|source| (0, mirror_error(source)))?;
    let mut chunk = vec![0_u8; COPY_CHUNK];
    let mut copied = 0_u64;
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err((copied, mirror_error(source))),
        };
        let bytes = chunk.get(..read).unwrap_or_default();
        permanent.write_all(bytes).map_err(|source| {
            (
                copied,
                AuditLogError::Write {
                    path: log_path.to_path_buf(),
                    source,
                },
            )
        })?;
        copied += u64::try_from(read).unwrap_or(u64::MAX);
    }
    permanent.flush().map_err(|source| {
        (
            copied,
            AuditLogError::Write {
                path: log_path.to_path_buf(),
                source,
            },
        )
    })?;
    Ok(copied)
}

fn remove_with_retry(path: &Path, retry: RemovalRetry) {
    for attempt in 1..=retry.attempts.max(1) {
        match fs::remove_file(path) {
            Ok(()) => return,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return,
            Err(error) => {
                debug!(
                    target: AUDIT_TARGET,
                    attempt,
                    error = %error,
                    "mirror removal failed"
                );
                if attempt < retry.attempts {
                    thread::sleep(retry.delay);
                }
            }
        }
    }
    warn!(
        target: AUDIT_TARGET,
        mirror = %path.display(),
        "giving up on removing mirror file"
    );
}

/// Inserts `_<stamp>` before the extension of the file name.
pub(crate) fn archive_path(log_path: &Path, stamp: &str) -> PathBuf {
    let name = log_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archived = match name.rsplit_once('.') {
        Some((stem, extension)) => format!("{stem}_{stamp}.{extension}"),
        None => format!("{name}_{stamp}"),
    };
    log_path.with_file_name(archived)
}

fn element(tag: &str, attributes: &[(&str, &str)], text: &str) -> String {
    let mut record = format!("<{tag}");
    for (name, value) in attributes {
        record.push_str(&format!(" {name}=\"{}\"", escape_attribute(value)));
    }
    record.push_str(&format!(">{text}</{tag}>"));
    record
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(unix)]
fn start_marker(stamp: &str) -> String {
    use nix::unistd::{geteuid, getuid};

    let pid = std::process::id().to_string();
    let uid = getuid().as_raw().to_string();
    let euid = geteuid().as_raw().to_string();
    element(
        "start",
        &[("pid", &pid), ("uid", &uid), ("euid", &euid)],
        stamp,
    )
}

#[cfg(not(unix))]
fn start_marker(stamp: &str) -> String {
    element("start", &[], stamp)
}
