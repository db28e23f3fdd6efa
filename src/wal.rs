use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Upper bound on one encoded event. A property carries at most a few
/// thousand ranges, so anything larger is a corrupt length prefix.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
/// Length prefix plus checksum.
const FRAME_OVERHEAD: u64 = 8;

/// Append-only log of property events.
///
/// Frame layout: `[u32 len][bincode Event][u32 crc32]`, little-endian, where
/// `len` counts the payload only. A torn or corrupt frame ends replay.
///
/// The file never keeps bytes past the last successful `flush_sync`: a failed
/// batch is cut back with `rollback`, and a torn tail left by a crash is cut
/// off on open.
pub struct Wal {
    out: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length and append count as of the last successful sync.
    committed_len: u64,
    committed_appends: u64,
    /// Set when a rollback fails. The tail is unknown, so nothing more may
    /// be appended.
    poisoned: bool,
}

fn open_for_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

/// Where a compaction snapshot is staged before it replaces the log.
fn snapshot_path(log: &Path) -> PathBuf {
    log.with_extension("wal.tmp")
}

fn write_frame(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload = bincode::serialize(event)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "wal frame too large"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

impl Wal {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::recover(path).map(|(wal, _)| wal)
    }

    /// Replay `path`, cut any torn or corrupt tail off the file and open it
    /// for appending. New frames land right after the last intact one.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let (events, intact_len) = scan(path)?;
        let out = open_for_append(path)?;
        let file_len = out.get_ref().metadata()?.len();
        if file_len > intact_len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = file_len - intact_len,
                "wal: truncating damaged tail"
            );
            out.get_ref().set_len(intact_len)?;
            out.get_ref().sync_all()?;
        }
        let wal = Self {
            out,
            path: path.to_path_buf(),
            appends_since_compact: 0,
            committed_len: intact_len,
            committed_appends: 0,
            poisoned: false,
        };
        Ok((wal, events))
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("wal is poisoned by a failed rollback"));
        }
        write_frame(&mut self.out, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("wal is poisoned by a failed rollback"));
        }
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        self.committed_len = self.out.get_ref().metadata()?.len();
        self.committed_appends = self.appends_since_compact;
        Ok(())
    }

    /// Discard everything appended since the last successful `flush_sync`,
    /// both still-buffered bytes and any partial frame that reached the file.
    /// If this fails the log is poisoned.
    pub fn rollback(&mut self) -> io::Result<()> {
        let result = self.truncate_to_committed();
        if let Err(ref e) = result {
            tracing::error!(path = %self.path.display(), "wal rollback failed, refusing further appends: {e}");
            self.poisoned = true;
        }
        result
    }

    fn truncate_to_committed(&mut self) -> io::Result<()> {
        let stale = std::mem::replace(&mut self.out, open_for_append(&self.path)?);
        // Dropping a BufWriter flushes it; take the file out and drop the
        // buffer instead.
        let (_file, _unwritten) = stale.into_parts();
        let file = self.out.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()?;
        self.appends_since_compact = self.committed_appends;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Stage `events` as a fresh log next to `log` and fsync it. The live log
    /// is untouched until `swap_compact_file`.
    pub fn write_compact_file(log: &Path, events: &[Event]) -> io::Result<()> {
        let mut staged = BufWriter::new(File::create(snapshot_path(log))?);
        events.iter().try_for_each(|event| write_frame(&mut staged, event))?;
        staged.flush()?;
        staged.get_ref().sync_all()
    }

    /// Move the staged snapshot over the log and continue appending to it.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.flush_sync()?;
        fs::rename(snapshot_path(&self.path), &self.path)?;
        self.out = open_for_append(&self.path)?;
        self.appends_since_compact = 0;
        self.committed_len = self.out.get_ref().metadata()?.len();
        self.committed_appends = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Every intact event in the log, in append order. A missing file is an
    /// empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        scan(path).map(|(events, _)| events)
    }
}

/// Intact events and the byte length they occupy.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let mut input = match File::open(path) {
        Ok(file) => BufReader::new(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };

    let mut events = Vec::new();
    let mut intact_len = 0u64;
    while let Some(payload) = read_frame(&mut input)? {
        let Ok(event) = bincode::deserialize::<Event>(&payload) else {
            tracing::warn!(path = %path.display(), replayed = events.len(), "wal: undecodable entry, discarding tail");
            break;
        };
        intact_len += FRAME_OVERHEAD + payload.len() as u64;
        events.push(event);
    }
    Ok((events, intact_len))
}

/// Next verified payload, or `None` at end of log or at the first torn or
/// corrupt frame.
fn read_frame(input: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut word = [0u8; 4];
    if !fill(input, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_FRAME_LEN {
        tracing::warn!(len, "wal: oversized frame, discarding tail");
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !fill(input, &mut payload)? || !fill(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        tracing::warn!(len, "wal: checksum mismatch, discarding tail");
        return Ok(None);
    }
    Ok(Some(payload))
}

/// `read_exact` that reports a short read as `false` instead of an error.
fn fill(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
