//! rfuse3 raw (inode based) adapter over [`FilesystemShim`].
//!
//! The kernel talks in inodes, the shim in virtual paths. An inode is handed
//! out when a lookup or readdirplus first names a path and dropped once the
//! kernel forgets every reference to it. Every shim call touches the disk, so
//! it runs on tokio's blocking pool.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::num::NonZeroU32;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use rfuse3::raw::Filesystem;
use rfuse3::raw::Request;
use rfuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, FileAttr, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyDirectoryPlus, ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs,
};
use rfuse3::{Errno, FileType, Result as FuseResult, Timestamp};
use tracing::{error, trace};

use super::{Attributes, FileKind, FilesystemShim, lock};

const TTL: Duration = Duration::from_secs(1);
const ROOT_INODE: u64 = 1;
/// Reported by readdir for names the kernel holds no reference to.
const UNKNOWN_INODE: u64 = 0xffff_ffff;

/// Inode <-> virtual path map with the kernel's lookup count per inode.
struct InodeTable {
    paths: HashMap<u64, (PathBuf, u64)>,
    inodes: HashMap<PathBuf, u64>,
    next: u64,
}

impl InodeTable {
    fn new() -> Self {
        let root = PathBuf::from("/");
        Self {
            paths: HashMap::from([(ROOT_INODE, (root.clone(), 1))]),
            inodes: HashMap::from([(root, ROOT_INODE)]),
            next: ROOT_INODE + 1,
        }
    }

    fn path_of(&self, ino: u64) -> Option<PathBuf> {
        self.paths.get(&ino).map(|(path, _)| path.clone())
    }

    fn known(&self, path: &Path) -> Option<u64> {
        self.inodes.get(path).copied()
    }

    /// The inode for `path`, assigned if new, with one more kernel reference.
    fn remember(&mut self, path: &Path) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            if let Some((_, lookups)) = self.paths.get_mut(&ino) {
                *lookups += 1;
            }
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, (path.to_path_buf(), 1));
        self.inodes.insert(path.to_path_buf(), ino);
        ino
    }

    /// Drop `nlookup` references; the inode goes away at zero. The root
    /// stays for the life of the mount.
    fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INODE {
            return;
        }
        let Some((path, lookups)) = self.paths.get_mut(&ino) else {
            return;
        };
        *lookups = lookups.saturating_sub(nlookup);
        if *lookups == 0 {
            let path = path.clone();
            self.paths.remove(&ino);
            self.inodes.remove(&path);
        }
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}

pub struct WavFs {
    shim: Arc<FilesystemShim>,
    inodes: Mutex<InodeTable>,
}

impl WavFs {
    pub fn new(shim: Arc<FilesystemShim>) -> Self {
        Self {
            shim,
            inodes: Mutex::new(InodeTable::new()),
        }
    }

    fn path_of(&self, ino: u64) -> FuseResult<PathBuf> {
        lock(&self.inodes)
            .path_of(ino)
            .ok_or_else(|| libc::ENOENT.into())
    }

    fn remember(&self, path: &Path) -> u64 {
        lock(&self.inodes).remember(path)
    }

    /// Inode for a readdir entry; never takes a reference.
    fn listed_inode(&self, path: &Path) -> u64 {
        lock(&self.inodes).known(path).unwrap_or(UNKNOWN_INODE)
    }

    fn parent_inode(&self, path: &Path) -> u64 {
        match path.parent() {
            Some(parent) => self.listed_inode(parent),
            None => ROOT_INODE,
        }
    }

    /// Run a shim call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> FuseResult<T>
    where
        F: FnOnce(&FilesystemShim) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shim = Arc::clone(&self.shim);
        match tokio::task::spawn_blocking(move || f(&shim)).await {
            Ok(result) => result.map_err(|e| errno(&e)),
            Err(e) => {
                error!("blocking filesystem task failed: {e}");
                Err(libc::EIO.into())
            }
        }
    }
}

fn errno(e: &io::Error) -> Errno {
    e.raw_os_error().unwrap_or(libc::EIO).into()
}

fn fuse_kind(kind: FileKind) -> FileType {
    match kind {
        FileKind::Directory => FileType::Directory,
        FileKind::RegularFile => FileType::RegularFile,
        FileKind::Symlink => FileType::Symlink,
        FileKind::NamedPipe => FileType::NamedPipe,
        FileKind::CharDevice => FileType::CharDevice,
        FileKind::BlockDevice => FileType::BlockDevice,
        FileKind::Socket => FileType::Socket,
    }
}

fn fuse_attr(attr: &Attributes, ino: u64) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: Timestamp::from(attr.atime),
        mtime: Timestamp::from(attr.mtime),
        ctime: Timestamp::from(attr.ctime),
        #[cfg(target_os = "macos")]
        crtime: Timestamp::from(attr.ctime),
        kind: fuse_kind(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: attr.rdev,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: attr.blksize,
    }
}

impl Filesystem for WavFs {
    type DirEntryStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntry>> + Send + 'a>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntryPlus>> + Send + 'a>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> FuseResult<ReplyInit> {
        let max_write = NonZeroU32::new(128 * 1024).unwrap_or(NonZeroU32::MIN);
        Ok(ReplyInit { max_write })
    }

    async fn destroy(&self, _req: Request) {}

    async fn lookup(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        let path = self.path_of(parent)?.join(name);
        let lookup_path = path.clone();
        let attr = self.blocking(move |fs| fs.attributes(&lookup_path)).await?;
        let ino = self.remember(&path);
        Ok(ReplyEntry {
            ttl: TTL,
            attr: fuse_attr(&attr, ino),
            generation: 0,
        })
    }

    async fn forget(&self, _req: Request, inode: u64, nlookup: u64) {
        let mut inodes = lock(&self.inodes);
        inodes.forget(inode, nlookup);
        trace!(inode, nlookup, live = inodes.len(), "forget");
    }

    async fn batch_forget(&self, _req: Request, forgets: &[(u64, u64)]) {
        let mut inodes = lock(&self.inodes);
        for &(inode, nlookup) in forgets {
            inodes.forget(inode, nlookup);
        }
        trace!(count = forgets.len(), live = inodes.len(), "batch forget");
    }

    async fn getattr(
        &self,
        _req: Request,
        ino: u64,
        _fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        let path = self.path_of(ino)?;
        let attr = self.blocking(move |fs| fs.attributes(&path)).await?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: fuse_attr(&attr, ino),
        })
    }

    async fn readlink(&self, _req: Request, ino: u64) -> FuseResult<ReplyData> {
        let path = self.path_of(ino)?;
        let target = self.blocking(move |fs| fs.link_target(&path)).await?;
        Ok(ReplyData {
            data: Bytes::from(target.into_os_string().into_vec()),
        })
    }

    async fn open(&self, _req: Request, ino: u64, flags: u32) -> FuseResult<ReplyOpen> {
        let path = self.path_of(ino)?;
        let handle = self
            .blocking(move |fs| fs.open(&path, flags as i32))
            .await?;
        Ok(ReplyOpen {
            fh: handle.unwrap_or(0),
            flags: 0,
        })
    }

    async fn read(
        &self,
        _req: Request,
        ino: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        let path = self.path_of(ino)?;
        let handle = (fh != 0).then_some(fh);
        let data = self
            .blocking(move |fs| fs.read(&path, handle, offset, size))
            .await?;
        Ok(ReplyData {
            data: Bytes::from(data),
        })
    }

    async fn release(
        &self,
        _req: Request,
        _inode: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> FuseResult<()> {
        self.blocking(move |fs| fs.release(fh)).await
    }

    async fn opendir(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        let path = self.path_of(ino)?;
        let attr = self.blocking(move |fs| fs.attributes(&path)).await?;
        if attr.kind != FileKind::Directory {
            return Err(libc::ENOTDIR.into());
        }
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let path = self.path_of(ino)?;
        let list_path = path.clone();
        let entries = self.blocking(move |fs| fs.list_directory(&list_path)).await?;

        let mut all = Vec::with_capacity(entries.len() + 2);
        all.push(DirectoryEntry {
            inode: ino,
            kind: FileType::Directory,
            name: OsString::from("."),
            offset: 1,
        });
        all.push(DirectoryEntry {
            inode: self.parent_inode(&path),
            kind: FileType::Directory,
            name: OsString::from(".."),
            offset: 2,
        });
        for (i, (name, attr)) in entries.into_iter().enumerate() {
            all.push(DirectoryEntry {
                inode: self.listed_inode(&path.join(&name)),
                kind: fuse_kind(attr.kind),
                name,
                offset: i as i64 + 3,
            });
        }

        let start = usize::try_from(offset).unwrap_or(0).min(all.len());
        let entries: Self::DirEntryStream<'a> =
            Box::pin(stream::iter(all.split_off(start).into_iter().map(Ok)));
        Ok(ReplyDirectory { entries })
    }

    async fn readdirplus<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> FuseResult<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        let path = self.path_of(ino)?;
        let list_path = path.clone();
        // Children go through `attributes` so transcoded files carry their
        // encoded size.
        let (this, parent, entries) = self
            .blocking(move |fs| {
                let this = fs.attributes(&list_path)?;
                let parent = match list_path.parent() {
                    Some(p) => fs.attributes(p)?,
                    None => this.clone(),
                };
                let entries = fs
                    .list_directory(&list_path)?
                    .into_iter()
                    .map(|(name, raw)| {
                        let attr = fs.attributes(&list_path.join(&name)).unwrap_or(raw);
                        (name, attr)
                    })
                    .collect::<Vec<_>>();
                Ok((this, parent, entries))
            })
            .await?;

        let plus = |inode: u64, name: OsString, attr: &Attributes, offset: i64| DirectoryEntryPlus {
            inode,
            generation: 0,
            kind: fuse_kind(attr.kind),
            name,
            offset,
            attr: fuse_attr(attr, inode),
            entry_ttl: TTL,
            attr_ttl: TTL,
        };

        // The kernel takes a reference on every child entry it receives but
        // not on `.` or `..`. Children are counted as the reply pulls them.
        let parent_ino = self.parent_inode(&path);
        let start = usize::try_from(offset).unwrap_or(0);
        let dots = [
            (OsString::from("."), this, Some(ino)),
            (OsString::from(".."), parent, Some(parent_ino)),
        ];
        let children = entries.into_iter().map(|(name, attr)| (name, attr, None));
        let listing = dots
            .into_iter()
            .chain(children)
            .enumerate()
            .skip(start)
            .map(move |(i, (name, attr, dot_ino))| {
                let inode = dot_ino.unwrap_or_else(|| self.remember(&path.join(&name)));
                Ok(plus(inode, name, &attr, i as i64 + 1))
            });
        let entries: Self::DirEntryPlusStream<'a> = Box::pin(stream::iter(listing));
        Ok(ReplyDirectoryPlus { entries })
    }

    async fn releasedir(&self, _req: Request, _inode: u64, _fh: u64, _flags: u32) -> FuseResult<()> {
        Ok(())
    }

    async fn statfs(&self, _req: Request, ino: u64) -> FuseResult<ReplyStatFs> {
        let path = self.path_of(ino)?;
        let stats = self.blocking(move |fs| fs.statfs(&path)).await?;
        Ok(ReplyStatFs {
            blocks: stats.blocks,
            bfree: stats.bfree,
            bavail: stats.bavail,
            files: stats.files,
            ffree: stats.ffree,
            bsize: stats.bsize,
            namelen: stats.namelen,
            frsize: stats.frsize,
        })
    }
}
