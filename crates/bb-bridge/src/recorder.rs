//! Side channel for per-point packets.
//!
//! A recorder appends one serialized packet per call and makes it visible to
//! external readers before returning. Writes go through a mutex, so
//! concurrent callers never interleave records.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use bb_types::{BridgeError, BridgeResult};

/// Append-only packet sink.
pub trait Recorder {
    /// Durably append `packet`. Returns only once the record is flushed.
    fn record<P: Serialize + ?Sized>(&self, packet: &P) -> BridgeResult<()>;

    /// Flush and release the underlying sink. Later `record` calls fail.
    fn close(&self) -> BridgeResult<()>;

    /// Number of packets appended so far.
    fn records_written(&self) -> u64;
}

fn recorder_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Recorder {
        message: e.to_string(),
    }
}

// ---- JSON-lines journal ----

struct JournalState {
    writer: Option<BufWriter<File>>,
    written: u64,
}

/// Appends packets as JSON lines to a file opened once for the whole run.
///
/// The file is opened in append mode, so several runs can share a journal.
/// Dropping the recorder flushes whatever is pending.
pub struct JournalRecorder {
    path: PathBuf,
    state: Mutex<JournalState>,
    sync: bool,
}

impl JournalRecorder {
    pub fn open<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| recorder_error(format!("cannot open {}: {e}", path.display())))?;
        info!("Opened packet journal at {}", path.display());

        Ok(Self {
            path,
            state: Mutex::new(JournalState {
                writer: Some(BufWriter::new(file)),
                written: 0,
            }),
            sync: false,
        })
    }

    /// Also `fsync` the file after every record.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Recorder for JournalRecorder {
    fn record<P: Serialize + ?Sized>(&self, packet: &P) -> BridgeResult<()> {
        let mut state = self.state.lock();
        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| recorder_error("journal already closed"))?;

        serde_json::to_writer(&mut *writer, packet).map_err(recorder_error)?;
        writer.write_all(b"\n").map_err(recorder_error)?;
        writer.flush().map_err(recorder_error)?;
        if self.sync {
            writer.get_ref().sync_data().map_err(recorder_error)?;
        }

        state.written += 1;
        Ok(())
    }

    fn close(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(recorder_error)?;
            writer.get_ref().sync_data().map_err(recorder_error)?;
            debug!(
                records = state.written,
                "Closed packet journal at {}",
                self.path.display()
            );
        }
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.state.lock().written
    }
}

/// Read back every packet from a journal, e.g. for post-run analysis.
///
/// A missing file yields an empty list.
pub fn load_journal<P: DeserializeOwned>(path: impl AsRef<Path>) -> BridgeResult<Vec<P>> {
    let file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut packets = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        packets.push(serde_json::from_str(line)?);
    }
    Ok(packets)
}

// ---- In-memory ----

/// Keeps packets in memory as JSON values.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    packets: Vec<serde_json::Value>,
    closed: bool,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn packets(&self) -> Vec<serde_json::Value> {
        self.state.lock().packets.clone()
    }
}

impl Recorder for MemoryRecorder {
    fn record<P: Serialize + ?Sized>(&self, packet: &P) -> BridgeResult<()> {
        let value = serde_json::to_value(packet).map_err(recorder_error)?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(recorder_error("recorder already closed"));
        }
        state.packets.push(value);
        Ok(())
    }

    fn close(&self) -> BridgeResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.state.lock().packets.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        point: Vec<f64>,
        fw: f64,
        cw: f64,
    }

    fn sample(i: usize) -> Sample {
        Sample {
            point: vec![i as f64, 2.0],
            fw: i as f64 * 0.5,
            cw: -1.0,
        }
    }

    #[test]
    fn journal_records_are_visible_before_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packets.jsonl");
        let recorder = JournalRecorder::open(&path).unwrap();

        recorder.record(&sample(1)).unwrap();
        recorder.record(&sample(2)).unwrap();

        // Read while the recorder is still open.
        let loaded: Vec<Sample> = load_journal(&path).unwrap();
        assert_eq!(loaded, vec![sample(1), sample(2)]);
        assert_eq!(recorder.records_written(), 2);
    }

    #[test]
    fn journal_appends_across_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packets.jsonl");

        let first = JournalRecorder::open(&path).unwrap();
        first.record(&sample(1)).unwrap();
        first.close().unwrap();

        let second = JournalRecorder::open(&path).unwrap().with_sync(true);
        second.record(&sample(2)).unwrap();
        drop(second);

        let loaded: Vec<Sample> = load_journal(&path).unwrap();
        assert_eq!(loaded, vec![sample(1), sample(2)]);
    }

    #[test]
    fn journal_rejects_writes_after_close() {
        let dir = TempDir::new().unwrap();
        let recorder = JournalRecorder::open(dir.path().join("p.jsonl")).unwrap();
        recorder.close().unwrap();
        recorder.close().unwrap();
        assert!(matches!(
            recorder.record(&sample(0)),
            Err(BridgeError::Recorder { .. })
        ));
    }

    #[test]
    fn journal_open_failure_is_recorder_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no-such-dir").join("p.jsonl");
        assert!(matches!(
            JournalRecorder::open(missing),
            Err(BridgeError::Recorder { .. })
        ));
    }

    #[test]
    fn concurrent_writers_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packets.jsonl");
        let recorder = Arc::new(JournalRecorder::open(&path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for i in 0..25 {
                        recorder.record(&sample(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded: Vec<Sample> = load_journal(&path).unwrap();
        assert_eq!(loaded.len(), 100);
        assert_eq!(recorder.records_written(), 100);
    }

    #[test]
    fn missing_journal_loads_empty() {
        let dir = TempDir::new().unwrap();
        let loaded: Vec<Sample> = load_journal(dir.path().join("absent.jsonl")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn memory_recorder_keeps_order() {
        let recorder = MemoryRecorder::new();
        for i in 0..3 {
            recorder.record(&sample(i)).unwrap();
        }
        let fws: Vec<f64> = recorder
            .packets()
            .iter()
            .map(|p| p["fw"].as_f64().unwrap())
            .collect();
        assert_eq!(fws, vec![0.0, 0.5, 1.0]);
        assert_eq!(recorder.records_written(), 3);
    }

    #[test]
    fn memory_recorder_refuses_packets_after_close() {
        let recorder = Arc::new(MemoryRecorder::new());

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    (0..50)
                        .filter(|i| recorder.record(&sample(t * 100 + i)).is_ok())
                        .count()
                })
            })
            .collect();
        recorder.close().unwrap();
        let written_at_close = recorder.records_written();

        let accepted: usize = writers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted as u64, written_at_close);
        assert_eq!(recorder.packets().len(), accepted);
        assert!(matches!(
            recorder.record(&sample(0)),
            Err(BridgeError::Recorder { .. })
        ));
    }
}
