//! Index file layout: naming, integrity footers and mapped access.
//!
//! Every index file ends with a 16-byte footer:
//! `[crc32(payload): u32 LE][payload length (low 32 bits): u32 LE][magic: u64 LE]`.
//! The footer is validated when a file is opened; a reader that fails
//! validation degrades to its not-ready state instead of serving
//! potentially truncated data.
//!
//! File names carry the index variant and a generation tag. A reindex
//! writes a complete `next` generation alongside the live `current` one;
//! the swap promotes `next` files by rename before the new snapshot is
//! opened.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
#[cfg(unix)]
use memmap2::Advice;

use crate::error::{CrocusError, Result};

pub(crate) const FOOTER_LEN: usize = 16;

pub(crate) const WORDS_MAGIC: u64 = u64::from_le_bytes(*b"crocwrd1");
pub(crate) const DOCS_FULL_MAGIC: u64 = u64::from_le_bytes(*b"crocdoc1");
pub(crate) const DOCS_PRIO_MAGIC: u64 = u64::from_le_bytes(*b"crocpri1");
pub(crate) const POSITIONS_MAGIC: u64 = u64::from_le_bytes(*b"crocpos1");

/// Which reverse index variant a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Full,
    Prio,
}

impl IndexKind {
    fn tag(self) -> &'static str {
        match self {
            IndexKind::Full => "full",
            IndexKind::Prio => "prio",
        }
    }
}

/// Live generation or the staged one awaiting a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexGeneration {
    Current,
    Next,
}

impl IndexGeneration {
    fn tag(self) -> &'static str {
        match self {
            IndexGeneration::Current => "current",
            IndexGeneration::Next => "next",
        }
    }
}

/// Path of the word table file for an index variant and generation.
pub fn words_file(dir: &Path, kind: IndexKind, generation: IndexGeneration) -> PathBuf {
    dir.join(format!("rev-words-{}-{}.dat", kind.tag(), generation.tag()))
}

/// Path of the documents file for an index variant and generation.
pub fn docs_file(dir: &Path, kind: IndexKind, generation: IndexGeneration) -> PathBuf {
    dir.join(format!("rev-docs-{}-{}.dat", kind.tag(), generation.tag()))
}

/// Path of the positions file for a generation.
pub fn positions_file(dir: &Path, generation: IndexGeneration) -> PathBuf {
    dir.join(format!("positions-{}.dat", generation.tag()))
}

/// Promote every staged `next` file present in `dir` over its `current`
/// counterpart. Renames are atomic on a POSIX file system, so a crash
/// mid-promotion leaves each file either old or new, never truncated.
pub fn promote_next(dir: &Path) -> Result<()> {
    let mut pairs = Vec::new();
    for kind in [IndexKind::Full, IndexKind::Prio] {
        pairs.push((
            words_file(dir, kind, IndexGeneration::Next),
            words_file(dir, kind, IndexGeneration::Current),
        ));
        pairs.push((
            docs_file(dir, kind, IndexGeneration::Next),
            docs_file(dir, kind, IndexGeneration::Current),
        ));
    }
    pairs.push((
        positions_file(dir, IndexGeneration::Next),
        positions_file(dir, IndexGeneration::Current),
    ));

    for (next, current) in pairs {
        if next.exists() {
            std::fs::rename(&next, &current)?;
        }
    }
    Ok(())
}

/// Append the integrity footer to a complete file payload.
pub(crate) fn append_footer(payload: &mut Vec<u8>, magic: u64) {
    let crc = crc32fast::hash(payload);
    let len = payload.len() as u64;

    let mut footer = [0u8; FOOTER_LEN];
    LittleEndian::write_u32(&mut footer[0..4], crc);
    LittleEndian::write_u32(&mut footer[4..8], len as u32);
    LittleEndian::write_u64(&mut footer[8..16], magic);
    payload.extend_from_slice(&footer);
}

/// Validate the footer of an in-memory file image and return the payload.
pub(crate) fn validate_footer(bytes: &[u8], magic: u64) -> Result<&[u8]> {
    if bytes.len() < FOOTER_LEN {
        return Err(CrocusError::corrupt("file too short for footer"));
    }
    let payload = &bytes[..bytes.len() - FOOTER_LEN];
    let footer = &bytes[bytes.len() - FOOTER_LEN..];

    let stored_magic = LittleEndian::read_u64(&footer[8..16]);
    if stored_magic != magic {
        return Err(CrocusError::corrupt(format!(
            "bad file magic {stored_magic:#018x}"
        )));
    }
    let stored_len = LittleEndian::read_u32(&footer[4..8]);
    if stored_len != payload.len() as u32 {
        return Err(CrocusError::corrupt("footer length mismatch"));
    }
    let stored_crc = LittleEndian::read_u32(&footer[0..4]);
    if stored_crc != crc32fast::hash(payload) {
        return Err(CrocusError::corrupt("footer checksum mismatch"));
    }

    Ok(payload)
}

/// Validate the footer of an unmapped file by streaming it through the
/// checksum. Returns the payload length.
pub(crate) fn validate_file_footer(file: &File, magic: u64) -> Result<u64> {
    let total = file.metadata()?.len();
    if total < FOOTER_LEN as u64 {
        return Err(CrocusError::corrupt("file too short for footer"));
    }
    let payload_len = total - FOOTER_LEN as u64;

    let mut footer = [0u8; FOOTER_LEN];
    read_exact_at(file, &mut footer, payload_len)?;

    let stored_magic = LittleEndian::read_u64(&footer[8..16]);
    if stored_magic != magic {
        return Err(CrocusError::corrupt(format!(
            "bad file magic {stored_magic:#018x}"
        )));
    }
    let stored_len = LittleEndian::read_u32(&footer[4..8]);
    if stored_len != payload_len as u32 {
        return Err(CrocusError::corrupt("footer length mismatch"));
    }

    let mut hasher = crc32fast::Hasher::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut pos = 0u64;
    while pos < payload_len {
        let take = chunk.len().min((payload_len - pos) as usize);
        read_exact_at(file, &mut chunk[..take], pos)?;
        hasher.update(&chunk[..take]);
        pos += take as u64;
    }
    let stored_crc = LittleEndian::read_u32(&footer[0..4]);
    if stored_crc != hasher.finalize() {
        return Err(CrocusError::corrupt("footer checksum mismatch"));
    }

    Ok(payload_len)
}

/// Positioned read that fills the whole buffer.
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(buf, offset)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            filled += n;
        }
        Ok(())
    }
}

/// A read-only memory-mapped index file with a validated footer.
///
/// The map is shared and immutable; concurrent readers need no
/// synchronization.
pub(crate) struct MappedFile {
    map: Mmap,
    payload_len: usize,
}

impl MappedFile {
    /// Map `path` and validate its footer.
    pub fn open(path: &Path, magic: u64) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and index files are
        // write-once; they are replaced by rename, never modified or
        // truncated in place while mapped.
        let map = unsafe { Mmap::map(&file)? };

        // The reader's access pattern is point lookups, not scans.
        #[cfg(unix)]
        let _ = map.advise(Advice::Random);

        let payload_len = validate_footer(&map, magic)?.len();
        Ok(MappedFile { map, payload_len })
    }

    /// The file payload, excluding the footer.
    pub fn payload(&self) -> &[u8] {
        &self.map[..self.payload_len]
    }

    /// Read the little-endian u64 at word index `idx` of the payload.
    pub fn get_u64(&self, idx: usize) -> u64 {
        LittleEndian::read_u64(&self.payload()[idx * 8..idx * 8 + 8])
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("payload_len", &self.payload_len)
            .finish()
    }
}
