use crate::config::{ConfigError, LogFileConfig};
use crate::event::LoggingEvent;
use crate::sink::{EventSink, SinkError};
use chrono::{NaiveDate, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::iter::Peekable;
use std::path::PathBuf;
use std::str::Chars;
use std::sync::{Mutex, PoisonError};

/// Size-and-time rolling writer for the dedicated method log.
///
/// One line is rendered per event according to the configured pattern.
/// Rotation triggers when the active file has grown past the size
/// threshold or when a calendar-day boundary is crossed, whichever comes
/// first. Rotated segments are gzipped under
/// `<filename>.<yyyy-MM-dd>.<index>.gz` and the archive count is bounded
/// by the configured history, oldest pruned first.
///
/// All writes and rotation checks happen under one mutex, so concurrent
/// observers never interleave lines and rotation is atomic with respect
/// to other writers.
pub struct FileSink {
    dir: PathBuf,
    filename: String,
    pattern: String,
    max_size: u64,
    max_history: usize,
    state: Mutex<SinkState>,
}

struct SinkState {
    file: Option<File>,
    size: u64,
    open_day: NaiveDate,
    create_error_reported: bool,
}

impl FileSink {
    /// Build a sink from file settings. Only configuration problems (an
    /// unparsable size threshold) fail construction; directory or file
    /// creation is attempted lazily on first append and reported without
    /// blocking the caller.
    pub fn new(config: &LogFileConfig) -> Result<Self, ConfigError> {
        let max_size = config.max_size_bytes()?;
        Ok(FileSink {
            dir: config.path.clone(),
            filename: config.filename.clone(),
            pattern: config.pattern.clone(),
            max_size,
            max_history: config.max_history,
            state: Mutex::new(SinkState {
                file: None,
                size: 0,
                open_day: Utc::now().date_naive(),
                create_error_reported: false,
            }),
        })
    }

    /// Path of the active (non-archived) log file.
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    fn ensure_open(&self, state: &mut SinkState) -> std::io::Result<()> {
        if state.file.is_some() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        state.size = file.metadata()?.len();
        state.open_day = Utc::now().date_naive();
        state.file = Some(file);
        Ok(())
    }

    fn rotate(&self, state: &mut SinkState) -> std::io::Result<()> {
        // Close the handle before archiving so the rename/removal below
        // operates on a fully flushed file.
        state.file = None;

        let active = self.active_path();
        let day = state.open_day;
        let index = self.next_archive_index(day);
        let archive = self
            .dir
            .join(format!("{}.{}.{}.gz", self.filename, day.format("%Y-%m-%d"), index));

        let mut input = File::open(&active)?;
        let mut encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        fs::remove_file(&active)?;

        self.prune_archives()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active)?;
        state.size = 0;
        state.open_day = Utc::now().date_naive();
        state.file = Some(file);
        Ok(())
    }

    /// Smallest unused rolling index for the given day.
    fn next_archive_index(&self, day: NaiveDate) -> u32 {
        self.archives()
            .into_iter()
            .filter(|(d, _, _)| *d == day)
            .map(|(_, i, _)| i + 1)
            .max()
            .unwrap_or(0)
    }

    /// Archived segments as `(date, index, path)`, oldest first.
    fn archives(&self) -> Vec<(NaiveDate, u32, PathBuf)> {
        let mut found = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return found,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some((date, index)) = self.parse_archive_name(&name) {
                found.push((date, index, entry.path()));
            }
        }
        found.sort_by_key(|(date, index, _)| (*date, *index));
        found
    }

    fn parse_archive_name(&self, name: &str) -> Option<(NaiveDate, u32)> {
        let rest = name.strip_prefix(&self.filename)?.strip_prefix('.')?;
        let rest = rest.strip_suffix(".gz")?;
        let (date_part, index_part) = rest.rsplit_once('.')?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        let index = index_part.parse().ok()?;
        Some((date, index))
    }

    fn prune_archives(&self) -> std::io::Result<()> {
        let archives = self.archives();
        if archives.len() <= self.max_history {
            return Ok(());
        }
        let excess = archives.len() - self.max_history;
        for (_, _, path) in archives.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Render one line for the event according to the configured pattern.
    fn render(&self, event: &LoggingEvent) -> String {
        let mut out = String::with_capacity(self.pattern.len() + 64);
        let mut chars = self.pattern.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('d') => {
                    let fmt = take_braced(&mut chars)
                        .map(|f| java_time_format(&f))
                        .unwrap_or_else(|| "%Y-%m-%d %H:%M:%S".to_string());
                    let _ = write!(out, "{}", event.timestamp.format(&fmt));
                }
                Some('p') => {
                    let _ = write!(out, "{}", event.log_level);
                }
                Some('m') => out.push_str(&status_message(event)),
                Some('n') => out.push('\n'),
                Some('X') => {
                    if let Some(key) = take_braced(&mut chars) {
                        match key.as_str() {
                            "status" => {
                                let _ = write!(out, "{}", event.status());
                            }
                            "class" => out.push_str(&event.class_name),
                            "method" => out.push_str(&event.method_name),
                            other => out.push_str(
                                event
                                    .additional_context
                                    .get(other)
                                    .map(String::as_str)
                                    .unwrap_or(""),
                            ),
                        }
                    }
                }
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    #[cfg(test)]
    fn backdate_open_day(&self, day: NaiveDate) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.open_day = day;
    }
}

impl EventSink for FileSink {
    fn append(&self, event: &LoggingEvent) -> Result<(), SinkError> {
        let line = self.render(event);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = self.ensure_open(&mut state) {
            if !state.create_error_reported {
                state.create_error_reported = true;
                eprintln!(
                    "kafka-method-log: cannot open log file {}: {e}",
                    self.active_path().display()
                );
            }
            return Err(e.into());
        }

        if state.size >= self.max_size || Utc::now().date_naive() != state.open_day {
            self.rotate(&mut state)?;
        }

        if let Some(file) = state.file.as_mut() {
            file.write_all(line.as_bytes())?;
            state.size += line.len() as u64;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Message body for a file line: the status phrase, then duration,
/// broker context, free-form context and exception summary, each only
/// when present.
fn status_message(event: &LoggingEvent) -> String {
    let mut msg = event.status().message().to_string();
    if let Some(ms) = event.execution_time_ms() {
        let _ = write!(msg, " in {ms} ms");
    }
    if let Some(ctx) = &event.message_context {
        let _ = write!(msg, " | {ctx}");
    }
    if !event.additional_context.is_empty() {
        let tags: Vec<String> = event
            .additional_context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let _ = write!(msg, " | context: {{{}}}", tags.join(", "));
    }
    if let Some(err) = &event.exception {
        let _ = write!(msg, " | exception: {err}");
    }
    msg
}

/// Consume a `{...}` group if one follows, returning its contents.
fn take_braced(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    if chars.peek() != Some(&'{') {
        return None;
    }
    chars.next();
    let mut group = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            break;
        }
        group.push(c);
    }
    Some(group)
}

/// Translate the subset of Java date tokens used by file patterns into
/// chrono format specifiers.
fn java_time_format(fmt: &str) -> String {
    fmt.replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("HH", "%H")
        .replace("SSS", "%3f")
        .replace("mm", "%M")
        .replace("ss", "%S")
}
