//! Bulk process enumeration.
//!
//! The native query fills a caller-supplied buffer with a chain of
//! variable-length records. [`RecordCursor`] walks that chain over an owned
//! byte buffer with every field read bounds-checked, so a malformed or
//! truncated buffer ends the walk instead of reading out of range.

use log::{debug, warn};

use super::record::{RawProcessSample, SystemTimes};
use crate::error::{Result, TelemetryError};

/// NTSTATUS returned when the supplied buffer is too small.
pub const STATUS_INFO_LENGTH_MISMATCH: u32 = 0xC000_0004;

const MAX_QUERY_ATTEMPTS: usize = 32;
const BUFFER_SLACK: usize = 64 * 1024;

/// Source of whole-system process snapshots.
pub trait ProcessSnapshotSource: Send {
    /// Cumulative system kernel+user time.
    fn system_times(&mut self) -> Result<SystemTimes>;

    /// Every live process except pid 0, in one consistent capture.
    /// Either the whole snapshot is returned or an error; never a partial list.
    fn capture_all(&mut self) -> Result<Vec<RawProcessSample>>;
}

/// Field offsets of one process information record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub record_size: usize,
    pub pointer_size: usize,
    pub thread_count: usize,
    pub create_time: usize,
    pub user_time: usize,
    pub kernel_time: usize,
    pub image_name_length: usize,
    pub image_name_buffer: usize,
    pub pid: usize,
    pub parent_pid: usize,
    pub handle_count: usize,
    pub session_id: usize,
    pub working_set: usize,
    pub private_page_count: usize,
    pub read_operations: usize,
    pub write_operations: usize,
    pub read_transfer: usize,
    pub write_transfer: usize,
}

impl RecordLayout {
    pub const X64: RecordLayout = RecordLayout {
        record_size: 256,
        pointer_size: 8,
        thread_count: 4,
        create_time: 32,
        user_time: 40,
        kernel_time: 48,
        image_name_length: 56,
        image_name_buffer: 64,
        pid: 80,
        parent_pid: 88,
        handle_count: 96,
        session_id: 100,
        working_set: 144,
        private_page_count: 200,
        read_operations: 208,
        write_operations: 216,
        read_transfer: 232,
        write_transfer: 240,
    };

    pub const X86: RecordLayout = RecordLayout {
        record_size: 184,
        pointer_size: 4,
        thread_count: 4,
        create_time: 32,
        user_time: 40,
        kernel_time: 48,
        image_name_length: 56,
        image_name_buffer: 60,
        pid: 68,
        parent_pid: 72,
        handle_count: 76,
        session_id: 80,
        working_set: 104,
        private_page_count: 132,
        read_operations: 136,
        write_operations: 144,
        read_transfer: 160,
        write_transfer: 168,
    };

    /// Layout matching the pointer width of the running binary.
    pub const fn native() -> RecordLayout {
        if std::mem::size_of::<usize>() == 8 {
            Self::X64
        } else {
            Self::X86
        }
    }
}

/// Iterator over the record chain of a process information buffer.
///
/// `base_addr` is the address the buffer occupied when the OS filled it;
/// image-name pointers are translated relative to it.
pub struct RecordCursor<'a> {
    buf: &'a [u8],
    base_addr: usize,
    layout: RecordLayout,
    offset: Option<usize>,
}

impl<'a> RecordCursor<'a> {
    pub fn new(buf: &'a [u8], base_addr: usize, layout: RecordLayout) -> Self {
        Self {
            buf,
            base_addr,
            layout,
            offset: if buf.is_empty() { None } else { Some(0) },
        }
    }

    fn u16_at(&self, at: usize) -> Option<u16> {
        let bytes = self.buf.get(at..at.checked_add(2)?)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        let bytes = self.buf.get(at..at.checked_add(4)?)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Some(u32::from_le_bytes(raw))
    }

    fn u64_at(&self, at: usize) -> Option<u64> {
        let bytes = self.buf.get(at..at.checked_add(8)?)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Some(u64::from_le_bytes(raw))
    }

    /// Pointer-sized field widened to u64.
    fn ptr_at(&self, at: usize) -> Option<u64> {
        if self.layout.pointer_size == 8 {
            self.u64_at(at)
        } else {
            self.u32_at(at).map(u64::from)
        }
    }

    fn image_name(&self, start: usize, pid: u32) -> String {
        let decoded = self.decode_image_name(start);
        match decoded {
            Some(name) if !name.is_empty() => name,
            _ if pid == 0 => "Idle".to_string(),
            _ => "System".to_string(),
        }
    }

    fn decode_image_name(&self, start: usize) -> Option<String> {
        let length = self.u16_at(start + self.layout.image_name_length)? as usize;
        let ptr = self.ptr_at(start + self.layout.image_name_buffer)?;
        if length == 0 || ptr == 0 {
            return None;
        }
        let relative = usize::try_from(ptr).ok()?.checked_sub(self.base_addr)?;
        let bytes = self.buf.get(relative..relative.checked_add(length)?)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }

    fn parse_at(&self, start: usize) -> Option<RawProcessSample> {
        let layout = &self.layout;
        let pid = self.ptr_at(start + layout.pid)? as u32;
        let parent_pid = self.ptr_at(start + layout.parent_pid)? as u32;
        let private_pages = self.ptr_at(start + layout.private_page_count)?;

        Some(RawProcessSample {
            pid,
            parent_pid,
            name: self.image_name(start, pid),
            create_time: self.u64_at(start + layout.create_time)?,
            kernel_time: self.u64_at(start + layout.kernel_time)?,
            user_time: self.u64_at(start + layout.user_time)?,
            working_set_bytes: self.ptr_at(start + layout.working_set)?,
            private_bytes: private_pages,
            thread_count: self.u32_at(start + layout.thread_count)?,
            handle_count: self.u32_at(start + layout.handle_count)?,
            session_id: self.u32_at(start + layout.session_id)?,
            read_bytes: self.u64_at(start + layout.read_transfer)?,
            write_bytes: self.u64_at(start + layout.write_transfer)?,
            read_operations: self.u64_at(start + layout.read_operations)?,
            write_operations: self.u64_at(start + layout.write_operations)?,
        })
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = RawProcessSample;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset.take()?;
        let record_end = start.checked_add(self.layout.record_size)?;
        if record_end > self.buf.len() {
            warn!(
                "Process record at offset {} overruns buffer of {} bytes",
                start,
                self.buf.len()
            );
            return None;
        }

        let sample = self.parse_at(start)?;
        let next = self.u32_at(start)? as usize;

        self.offset = if next == 0 {
            None
        } else if next < self.layout.record_size {
            debug!("Malformed next-entry offset {} at {}", next, start);
            None
        } else {
            start.checked_add(next).filter(|&at| at < self.buf.len())
        };

        Some(sample)
    }
}

/// Parse a filled process information buffer, skipping pid 0.
pub fn parse_process_buffer(buf: &[u8], base_addr: usize, layout: RecordLayout) -> Vec<RawProcessSample> {
    RecordCursor::new(buf, base_addr, layout)
        .filter(|sample| sample.pid != 0)
        .collect()
}

/// Outcome of one attempt at a size-negotiated native query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Data written; the value is the number of bytes filled.
    Filled(usize),
    /// Buffer too small; the value is the size the OS reported it needs.
    TooSmall(usize),
    Failed(u32),
}

/// Heap buffer with 8-byte alignment, as the native query requires.
#[derive(Debug, Default)]
pub struct AlignedBuffer {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBuffer {
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialized bytes and u8 has no alignment requirement.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        // SAFETY: as above; the borrow of `self` is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    pub fn base_addr(&self) -> usize {
        self.words.as_ptr() as usize
    }
}

/// Run a size-negotiated query: probe with an empty buffer, allocate what the
/// OS asks for plus slack, and retry for as long as the data keeps growing.
pub fn query_with_growing_buffer<F>(mut query: F) -> Result<AlignedBuffer>
where
    F: FnMut(&mut AlignedBuffer) -> QueryStatus,
{
    let mut buffer = AlignedBuffer::default();

    for attempt in 0..MAX_QUERY_ATTEMPTS {
        match query(&mut buffer) {
            QueryStatus::Filled(len) => {
                buffer.truncate(len);
                return Ok(buffer);
            }
            QueryStatus::TooSmall(required) => {
                let grown = required.max(buffer.len().saturating_mul(2)) + BUFFER_SLACK;
                debug!("Process query attempt {} needs {} bytes, allocating {}", attempt, required, grown);
                buffer = AlignedBuffer::with_len(grown);
            }
            QueryStatus::Failed(status) => {
                return Err(TelemetryError::system_query(status, "process enumeration"));
            }
        }
    }

    Err(TelemetryError::system_query(
        STATUS_INFO_LENGTH_MISMATCH,
        format!("buffer still too small after {} attempts", MAX_QUERY_ATTEMPTS),
    ))
}
