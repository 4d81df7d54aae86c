//! fs/mod.rs
//! The filesystem surface, path based.
//!
//! Every entry point first asks "does this virtual path exist as-is under
//! the backing root?" and passes straight through if so. Only when it does
//! not is the name treated as a transcoded file and mapped back to its
//! source. The `fuse` module adapts this to the kernel's inode protocol.

mod cache;
pub mod fuse;
mod handles;
pub mod mount;

use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, warn};

use crate::config::Params;
use crate::core::decode::Codec;
use crate::core::encode::{Encoder, WavEncoder};
use crate::core::library::PathResolver;
use crate::core::transcode::{TranscodeError, Transcoder};

use cache::StatCache;
use handles::HandleTable;

/// What the shim needs from a transcoding driver.
pub trait Driver: Send {
    fn init(&mut self) -> Result<(), TranscodeError>;
    fn get_size(&self) -> u64;
    fn read(&mut self, offset: u64, size: u32) -> Result<Vec<u8>, TranscodeError>;
    fn mtime(&self) -> SystemTime;
}

pub trait DriverFactory: Send + Sync {
    fn create(&self, source: &Path, codec: Codec) -> Box<dyn Driver>;
}

impl<E: Encoder + 'static> Driver for Transcoder<E> {
    fn init(&mut self) -> Result<(), TranscodeError> {
        Transcoder::init(self)
    }

    fn get_size(&self) -> u64 {
        Transcoder::get_size(self)
    }

    fn read(&mut self, offset: u64, size: u32) -> Result<Vec<u8>, TranscodeError> {
        Transcoder::read(self, offset, size)
    }

    fn mtime(&self) -> SystemTime {
        Transcoder::mtime(self)
    }
}

/// Binds every source to a WAV transcoder.
pub struct TranscoderFactory;

impl DriverFactory for TranscoderFactory {
    fn create(&self, source: &Path, codec: Codec) -> Box<dyn Driver> {
        Box::new(Transcoder::new(source, codec, WavEncoder::new()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    RegularFile,
    Symlink,
    NamedPipe,
    CharDevice,
    BlockDevice,
    Socket,
}

/// `lstat` result, with size and blocks possibly replaced by the encoded
/// size of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub ino: u64,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: u64,
    pub blocks: u64,
    pub blksize: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Attributes {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            FileKind::Directory
        } else if ft.is_symlink() {
            FileKind::Symlink
        } else if ft.is_fifo() {
            FileKind::NamedPipe
        } else if ft.is_char_device() {
            FileKind::CharDevice
        } else if ft.is_block_device() {
            FileKind::BlockDevice
        } else if ft.is_socket() {
            FileKind::Socket
        } else {
            FileKind::RegularFile
        };

        Self {
            ino: meta.ino(),
            kind,
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            size: meta.size(),
            blocks: meta.blocks(),
            blksize: meta.blksize() as u32,
            atime: unix_time(meta.atime(), meta.atime_nsec()),
            mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
            ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
        }
    }

    fn set_size(&mut self, size: u64) {
        self.size = size;
        self.blocks = size.div_ceil(512);
    }
}

fn unix_time(secs: i64, nsec: i64) -> SystemTime {
    let nsec = nsec.clamp(0, 999_999_999) as u32;
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + Duration::new(secs as u64, nsec)
    } else {
        SystemTime::UNIX_EPOCH - Duration::new(secs.unsigned_abs(), 0) + Duration::new(0, nsec)
    }
}

/// `statvfs` numbers for the backing filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn os_error(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

pub struct FilesystemShim {
    resolver: PathResolver,
    factory: Box<dyn DriverFactory>,
    handles: HandleTable,
    stat_cache: StatCache,
}

impl FilesystemShim {
    pub fn new(params: &Params, factory: Box<dyn DriverFactory>) -> Self {
        Self {
            resolver: PathResolver::new(
                &params.basepath,
                params.target_ext.clone(),
                params.bindings.clone(),
            ),
            factory,
            handles: HandleTable::new(),
            stat_cache: StatCache::new(params.stat_cache_size),
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn attributes(&self, virtual_path: &Path) -> io::Result<Attributes> {
        debug!(path = %virtual_path.display(), "attributes");
        let candidate = self.resolver.to_real_candidate(virtual_path);
        if let Ok(meta) = fs::symlink_metadata(&candidate) {
            return Ok(Attributes::from_metadata(&meta));
        }

        let source = self.resolver.find_source(&candidate);
        let meta = fs::symlink_metadata(&source)?;
        let mut attr = Attributes::from_metadata(&meta);
        if meta.file_type().is_file() {
            if let Some(codec) = self.resolver.decoder_for(&source) {
                if let Some(size) = self.encoded_size(&source, codec, &meta) {
                    attr.set_size(size);
                }
            }
        }
        Ok(attr)
    }

    fn encoded_size(&self, source: &Path, codec: Codec, meta: &Metadata) -> Option<u64> {
        let mtime = meta.modified().ok()?;
        if let Some(size) = self.stat_cache.get(source, mtime, meta.len()) {
            return Some(size);
        }

        let mut driver = self.factory.create(source, codec);
        if let Err(e) = driver.init() {
            warn!(source = %source.display(), "cannot estimate encoded size: {e}");
            return None;
        }
        let size = driver.get_size();
        self.stat_cache.insert(source, mtime, meta.len(), size);
        Some(size)
    }

    pub fn link_target(&self, virtual_path: &Path) -> io::Result<PathBuf> {
        debug!(path = %virtual_path.display(), "link_target");
        let source = self.resolver.resolve(virtual_path);
        let target = fs::read_link(&source)?;
        if self.resolver.decoder_for(&target).is_some() {
            return Ok(target.with_extension(self.resolver.target_ext()));
        }
        Ok(target)
    }

    /// Entries of a directory under their virtual names, in host order.
    /// Attributes are the raw `lstat` of each real entry.
    pub fn list_directory(&self, virtual_path: &Path) -> io::Result<Vec<(OsString, Attributes)>> {
        debug!(path = %virtual_path.display(), "list_directory");
        let dir = self.resolver.resolve(virtual_path);

        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let meta = match fs::symlink_metadata(entry.path()) {
                Ok(meta) => meta,
                Err(e) => {
                    // removed between readdir and lstat
                    debug!(entry = ?name, "skipping entry: {e}");
                    continue;
                }
            };
            let ft = meta.file_type();
            let is_file_or_symlink = ft.is_file() || ft.is_symlink();
            if let Some(listed) = self.resolver.listed_name(&dir, &name, is_file_or_symlink) {
                out.push((listed, Attributes::from_metadata(&meta)));
            }
        }
        Ok(out)
    }

    /// Returns the handle of the transcoder serving this file, or `None`
    /// when the file passes straight through.
    pub fn open(&self, virtual_path: &Path, flags: i32) -> io::Result<Option<u64>> {
        debug!(path = %virtual_path.display(), flags, "open");
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(os_error(libc::EROFS));
        }

        let candidate = self.resolver.to_real_candidate(virtual_path);
        match File::open(&candidate) {
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let source = self.resolver.find_source(&candidate);
        let Some(codec) = self.resolver.decoder_for(&source) else {
            return Err(os_error(libc::ENOENT));
        };

        let mut driver = self.factory.create(&source, codec);
        if let Err(e) = driver.init() {
            error!(source = %source.display(), "cannot open transcoder: {e}");
            return Err(os_error(libc::EIO));
        }
        if let Ok(meta) = fs::symlink_metadata(&source) {
            self.stat_cache
                .insert(&source, driver.mtime(), meta.len(), driver.get_size());
        }

        let id = self.handles.insert(driver);
        debug!(source = %source.display(), handle = id, codec = codec.name(), "transcoder opened");
        Ok(Some(id))
    }

    pub fn read(
        &self,
        virtual_path: &Path,
        handle: Option<u64>,
        offset: u64,
        size: u32,
    ) -> io::Result<Vec<u8>> {
        debug!(path = %virtual_path.display(), offset, size, "read");
        let candidate = self.resolver.to_real_candidate(virtual_path);
        match File::open(&candidate) {
            Ok(file) => return pread(&file, offset, size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let Some(driver) = handle.and_then(|h| self.handles.get(h)) else {
            error!(path = %virtual_path.display(), ?handle, "read of a transcoded file without an open transcoder");
            return Err(os_error(libc::EIO));
        };
        let mut driver = lock(&driver);
        driver.read(offset, size).map_err(|e| {
            error!(path = %virtual_path.display(), offset, "transcode read failed: {e}");
            os_error(libc::EIO)
        })
    }

    pub fn release(&self, handle: u64) -> io::Result<()> {
        debug!(handle, "release");
        if handle != 0 && self.handles.remove(handle).is_none() {
            debug!(handle, "release of unknown handle");
        }
        Ok(())
    }

    pub fn statfs(&self, virtual_path: &Path) -> io::Result<FsStats> {
        debug!(path = %virtual_path.display(), "statfs");
        let candidate = self.resolver.to_real_candidate(virtual_path);
        let stats = match nix::sys::statvfs::statvfs(candidate.as_path()) {
            Ok(stats) => stats,
            Err(_) => nix::sys::statvfs::statvfs(self.resolver.find_source(&candidate).as_path())
                .map_err(io::Error::from)?,
        };
        Ok(FsStats {
            blocks: stats.blocks() as u64,
            bfree: stats.blocks_free() as u64,
            bavail: stats.blocks_available() as u64,
            files: stats.files() as u64,
            ffree: stats.files_free() as u64,
            bsize: stats.block_size() as u32,
            namelen: stats.name_max() as u32,
            frsize: stats.fragment_size() as u32,
        })
    }

    #[cfg(test)]
    fn open_handles(&self) -> usize {
        self.handles.len()
    }
}

/// Read up to `size` bytes at `offset`; short only at end of file.
fn pread(file: &File, offset: u64, size: u32) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size as usize];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}
