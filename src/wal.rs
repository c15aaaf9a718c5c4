use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Largest payload we write or trust on replay. A length prefix above this is
/// treated as corruption, not as an allocation request.
pub const MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

/// Length prefix plus CRC trailer.
const FRAME_OVERHEAD: u64 = 8;

/// Encode a single event to `[len][bincode][crc32]`. Returns the bytes written.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "WAL record too large"));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(FRAME_OVERHEAD + u64::from(len))
}

/// Read exactly `buf.len()` bytes; `Ok(false)` on a clean or torn end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decode the next record and its framed size. `Ok(None)` means the log ends
/// here: EOF, a torn tail from a crash, an oversized length, a CRC mismatch,
/// or an undecodable payload.
fn decode_next(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        tracing::warn!("WAL: record length {len} exceeds limit, discarding tail");
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        tracing::warn!("WAL: CRC mismatch, discarding tail");
        return Ok(None);
    }
    match bincode::deserialize::<Event>(&payload) {
        Ok(event) => Ok(Some((event, FRAME_OVERHEAD + len as u64))),
        Err(e) => {
            tracing::warn!("WAL: undecodable record, discarding tail: {e}");
            Ok(None)
        }
    }
}

/// Append-only write-ahead log of floor-plan and booking events.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`, little endian.
/// `len` covers the payload only. A truncated last entry is cut off on replay.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length after the last successful `flush_sync`.
    durable_len: u64,
    /// Bytes buffered or written since then.
    pending_len: u64,
    /// Set when a failed batch could not be rolled back; every later append
    /// fails rather than land after bytes of unknown state.
    poisoned: bool,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let durable_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            durable_len,
            pending_len: 0,
            poisoned: false,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("WAL poisoned by an earlier failed rollback"));
        }
        let mut frame = Vec::new();
        let written = encode_event(&mut frame, event)?;
        self.pending_len += written;
        self.writer.write_all(&frame)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.durable_len += self.pending_len;
        self.pending_len = 0;
        Ok(())
    }

    /// Discard everything since the last successful `flush_sync`: drop the
    /// buffer unwritten and cut the file back to its durable length. Callers
    /// of a failed batch are told it failed, so none of it may survive a
    /// restart. If the cut itself fails the log is poisoned.
    pub fn rollback(&mut self) -> io::Result<()> {
        let result = self.truncate_to_durable();
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn truncate_to_durable(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let (_, _unwritten) = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.durable_len)?;
        file.sync_all()?;
        self.pending_len = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write compacted events to a temp file next to the log and fsync.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the log and reopen for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.durable_len = file.metadata()?.len();
        self.pending_len = 0;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        // The rewritten log holds only applied state.
        self.poisoned = false;
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the log from disk, returning every intact event in order.
    ///
    /// Anything after the last intact record is cut off and the file synced,
    /// so appends made after recovery never land behind a torn record.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(&file);
        let mut events = Vec::new();
        let mut intact_len = 0u64;
        while let Some((event, framed)) = decode_next(&mut reader)? {
            events.push(event);
            intact_len += framed;
        }
        drop(reader);

        if intact_len < file_len {
            tracing::warn!(
                "WAL: truncating {} trailing bytes after {} intact records",
                file_len - intact_len,
                events.len()
            );
            file.set_len(intact_len)?;
            file.sync_all()?;
        }
        Ok(events)
    }
}
