/// Append-only log of event occurrences, the durable source of truth for
/// every tracker.
///
/// On disk each record is one tab-separated line:
///   `<ISO-8601 timestamp>\t<kind>`
/// Lines starting with `#` are comments. Timestamps without an offset (older
/// logs) are interpreted in the configured [`DefaultZone`].
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};

use crate::error::{MonitorError, Result};

pub const HEADER: &str = "# timestamp\tkind";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// One occurrence of a tracked event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub at: DateTime<Utc>,
    pub kind: String,
}

impl LogRecord {
    pub fn new(at: DateTime<Utc>, kind: impl Into<String>) -> Self {
        Self { at, kind: kind.into() }
    }
}

/// Durable store of [`LogRecord`]s.
pub trait EventLog: Send {
    fn append(&mut self, record: &LogRecord) -> Result<()>;

    /// Every well-formed record in file order. Malformed lines are skipped.
    fn read_all(&self) -> Result<Box<dyn Iterator<Item = LogRecord>>>;
}

// ── Time zones ─────────────────────────────────────────────────────────────────

/// Zone used to read timestamps that carry no offset and to write new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultZone {
    /// The host's local time zone, DST included.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl FromStr for DefaultZone {
    type Err = MonitorError;

    /// Accepts `local`, `UTC`/`Z`, or an offset such as `+02:00`, `-0530`, `+01`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(DefaultZone::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(DefaultZone::Fixed(utc_offset()));
        }
        parse_offset(s)
            .map(DefaultZone::Fixed)
            .ok_or_else(|| MonitorError::InvalidConfiguration(format!("unrecognised time zone {s:?}")))
    }
}

impl DefaultZone {
    /// Interprets a wall-clock time in this zone. Returns `None` for times that
    /// do not exist (DST gap); ambiguous times resolve to the earlier instant.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DefaultZone::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DefaultZone::Fixed(offset) => offset
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// RFC 3339 rendering with this zone's offset, to whole seconds.
    pub fn render(&self, at: DateTime<Utc>) -> String {
        match self {
            DefaultZone::Local => at.with_timezone(&Local).to_rfc3339_opts(SecondsFormat::Secs, false),
            DefaultZone::Fixed(offset) => {
                at.with_timezone(offset).to_rfc3339_opts(SecondsFormat::Secs, false)
            }
        }
    }

    /// Parses an ISO-8601 timestamp, localizing it if it has no offset.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .and_then(|naive| self.localize(&naive))
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Parses `±HH`, `±HHMM` or `±HH:MM`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// ── Line format ────────────────────────────────────────────────────────────────

/// Rejects kinds that would break the one-record-per-line format or not read
/// back identically: [`parse_line`] trims the kind column.
pub fn validate_kind(kind: &str) -> Result<()> {
    let bad = kind.trim().is_empty()
        || kind != kind.trim()
        || kind.starts_with('#')
        || kind.contains(['\t', '\n', '\r']);
    if bad {
        return Err(MonitorError::InvalidKind(kind.to_string()));
    }
    Ok(())
}

pub fn format_line(record: &LogRecord, zone: &DefaultZone) -> String {
    format!("{}\t{}\n", zone.render(record.at), record.kind)
}

/// Parses one log line. Comments, blank lines and malformed lines yield `None`.
pub fn parse_line(line: &str, zone: &DefaultZone) -> Option<LogRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }
    let Some((timestamp, rest)) = line.split_once('\t') else {
        log::debug!("Skipping log line without a tab: {line:?}");
        return None;
    };
    let kind = rest.split('\t').next().unwrap_or_default().trim();
    if kind.is_empty() {
        log::debug!("Skipping log line without a kind: {line:?}");
        return None;
    }
    match zone.parse_timestamp(timestamp) {
        Some(at) => Some(LogRecord::new(at, kind)),
        None => {
            log::debug!("Skipping log line with unreadable timestamp: {line:?}");
            None
        }
    }
}

// ── File-backed log ────────────────────────────────────────────────────────────

/// Tab-separated event log on disk.
pub struct FileEventLog {
    path: PathBuf,
    zone: DefaultZone,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>, zone: DefaultZone) -> Self {
        Self { path: path.into(), zone }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for FileEventLog {
    /// Creates the file (with a comment header) and its parent directories on
    /// first use.
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        validate_kind(&record.kind)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{HEADER}")?;
        }
        file.write_all(format_line(record, &self.zone).as_bytes())?;
        Ok(())
    }

    /// A missing file reads as an empty log.
    fn read_all(&self) -> Result<Box<dyn Iterator<Item = LogRecord>>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(e.into()),
        };
        let zone = self.zone;
        let records = BufReader::new(file)
            .split(b'\n')
            .map_while(|chunk| match chunk {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!("Stopped reading event log early: {e}");
                    None
                }
            })
            .filter_map(move |bytes| parse_line(&String::from_utf8_lossy(&bytes), &zone));
        Ok(Box::new(records))
    }
}

#[cfg(test)]
pub use memory::MemoryEventLog;


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc() -> DefaultZone {
        DefaultZone::Fixed(utc_offset())
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    // ── DefaultZone ───────────────────────────────────────────────────────────

    #[test]
    fn zone_from_str_variants() {
        assert_eq!("local".parse::<DefaultZone>().unwrap(), DefaultZone::Local);
        assert_eq!("UTC".parse::<DefaultZone>().unwrap(), utc());
        assert_eq!(
            "+02:00".parse::<DefaultZone>().unwrap(),
            DefaultZone::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
        assert_eq!(
            "-0530".parse::<DefaultZone>().unwrap(),
            DefaultZone::Fixed(FixedOffset::east_opt(-(5 * 3600 + 30 * 60)).unwrap())
        );
        assert_eq!(
            "+01".parse::<DefaultZone>().unwrap(),
            DefaultZone::Fixed(FixedOffset::east_opt(3600).unwrap())
        );
    }

    #[test]
    fn zone_from_str_rejects_garbage() {
        assert!("Europe/Berlin".parse::<DefaultZone>().is_err());
        assert!("+2".parse::<DefaultZone>().is_err());
        assert!("+24:00".parse::<DefaultZone>().is_err());
        assert!("+02:75".parse::<DefaultZone>().is_err());
        assert!("".parse::<DefaultZone>().is_err());
    }

    #[test]
    fn naive_timestamp_is_localized_to_zone() {
        let zone: DefaultZone = "+02:00".parse().unwrap();
        let parsed = zone.parse_timestamp("2026-10-19 14:00:00").unwrap();
        assert_eq!(parsed, at(12, 0, 0));
    }

    #[test]
    fn timestamp_with_offset_ignores_zone() {
        let zone: DefaultZone = "+05:00".parse().unwrap();
        assert_eq!(zone.parse_timestamp("2026-10-19T12:00:00Z"), Some(at(12, 0, 0)));
        assert_eq!(zone.parse_timestamp("2026-10-19T13:30:00+01:30"), Some(at(12, 0, 0)));
        assert_eq!(zone.parse_timestamp("2026-10-19 14:00:00+02:00"), Some(at(12, 0, 0)));
    }

    #[test]
    fn timestamp_accepts_t_separator_and_fraction() {
        let parsed = utc().parse_timestamp("2026-10-19T12:00:00.250").unwrap();
        assert_eq!(parsed.timestamp_millis(), at(12, 0, 0).timestamp_millis() + 250);
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert!(utc().parse_timestamp("yesterday").is_none());
        assert!(utc().parse_timestamp("2026-13-40 99:00:00").is_none());
    }

    #[test]
    fn render_uses_zone_offset() {
        let zone: DefaultZone = "+02:00".parse().unwrap();
        assert_eq!(zone.render(at(12, 0, 0)), "2026-10-19T14:00:00+02:00");
    }

    #[test]
    fn localize_fixed_is_unambiguous() {
        let naive = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(utc().localize(&naive), Some(at(12, 0, 0)));
    }

    // ── parse_line ────────────────────────────────────────────────────────────

    #[test]
    fn parse_line_reads_record() {
        let rec = parse_line("2026-10-19T12:00:00+00:00\tpooped\n", &utc()).unwrap();
        assert_eq!(rec, LogRecord::new(at(12, 0, 0), "pooped"));
    }

    #[test]
    fn parse_line_reads_legacy_boolean() {
        let rec = parse_line("2026-10-19 12:00:00\tTrue", &utc()).unwrap();
        assert_eq!(rec.kind, "True");
        assert_eq!(rec.at, at(12, 0, 0));
    }

    #[test]
    fn parse_line_skips_comments_and_junk() {
        let zone = utc();
        assert!(parse_line(HEADER, &zone).is_none());
        assert!(parse_line("# 2026-10-19 12:00:00\tpooped", &zone).is_none());
        assert!(parse_line("", &zone).is_none());
        assert!(parse_line("no tab here", &zone).is_none());
        assert!(parse_line("2026-10-19 12:00:00\t", &zone).is_none());
        assert!(parse_line("not a time\tpeed", &zone).is_none());
    }

    #[test]
    fn parse_line_ignores_extra_columns_and_crlf() {
        let rec = parse_line("2026-10-19 12:00:00\tpeed\textra\r\n", &utc()).unwrap();
        assert_eq!(rec.kind, "peed");
    }

    #[test]
    fn validate_kind_rules() {
        assert!(validate_kind("pooped").is_ok());
        assert!(validate_kind("went outside").is_ok());
        assert!(validate_kind("").is_err());
        assert!(validate_kind("  ").is_err());
        assert!(validate_kind("#comment").is_err());
        assert!(validate_kind("a\tb").is_err());
        assert!(validate_kind("a\nb").is_err());
        assert!(validate_kind("peed ").is_err());
        assert!(validate_kind(" peed").is_err());
    }

    #[test]
    fn appended_kind_reads_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileEventLog::new(dir.path().join("log.tsv"), utc());
        assert!(log.append(&LogRecord::new(at(7, 0, 0), "peed ")).is_err());
        log.append(&LogRecord::new(at(7, 0, 0), "went outside")).unwrap();
        let kinds: Vec<_> = log.read_all().unwrap().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["went outside"]);
        assert_eq!(log.path(), dir.path().join("log.tsv").as_path());
    }

    // ── FileEventLog ──────────────────────────────────────────────────────────

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileEventLog::new(dir.path().join("absent.tsv"), utc());
        assert_eq!(log.read_all().unwrap().count(), 0);
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileEventLog::new(dir.path().join("log.tsv"), utc());
        log.append(&LogRecord::new(at(8, 0, 0), "pooped")).unwrap();
        log.append(&LogRecord::new(at(9, 30, 0), "peed")).unwrap();

        let records: Vec<_> = log.read_all().unwrap().collect();
        assert_eq!(
            records,
            vec![LogRecord::new(at(8, 0, 0), "pooped"), LogRecord::new(at(9, 30, 0), "peed")]
        );
    }

    #[test]
    fn append_writes_header_once_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.tsv");
        let mut log = FileEventLog::new(&path, utc());
        log.append(&LogRecord::new(at(8, 0, 0), "peed")).unwrap();
        log.append(&LogRecord::new(at(9, 0, 0), "peed")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(HEADER).count(), 1);
        assert!(content.starts_with(HEADER));
        assert!(content.contains("2026-10-19T08:00:00+00:00\tpeed\n"));
    }

    #[test]
    fn append_rejects_invalid_kind_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        let mut log = FileEventLog::new(&path, utc());
        let err = log.append(&LogRecord::new(at(8, 0, 0), "bad\tkind")).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidKind(_)));
        assert!(!path.exists());
    }

    #[test]
    fn read_skips_malformed_lines_in_mixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        std::fs::write(
            &path,
            "# legacy log\n\
             2026-10-19 07:00:00\tFalse\n\
             garbage line\n\
             2026-10-19 08:00:00\tTrue\n\
             \n\
             2026-10-19T09:00:00+00:00\tpeed\n",
        )
        .unwrap();
        let log = FileEventLog::new(&path, utc());
        let kinds: Vec<_> = log.read_all().unwrap().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["False", "True", "peed"]);
    }

    #[test]
    fn read_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        let mut bytes = b"2026-10-19 07:00:00\tpeed\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\t', b'x', b'\n']);
        bytes.extend_from_slice(b"2026-10-19 08:00:00\tpooped\n");
        std::fs::write(&path, bytes).unwrap();

        let log = FileEventLog::new(&path, utc());
        assert_eq!(log.read_all().unwrap().count(), 2);
    }
}
