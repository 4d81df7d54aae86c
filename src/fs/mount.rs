//! Mount helpers over rfuse3's raw session.
//!
//! Unprivileged mounts go through fusermount3, which must be on PATH.

use std::path::Path;

use rfuse3::MountOptions;
use rfuse3::raw::MountHandle;

use super::fuse::WavFs;

fn mount_options(allow_other: bool) -> MountOptions {
    let mut mo = MountOptions::default();
    mo.fs_name("wavfs").read_only(true).allow_other(allow_other);
    mo
}

#[cfg(target_os = "linux")]
pub async fn mount(
    fs: WavFs,
    mount_point: impl AsRef<Path>,
    allow_other: bool,
    privileged: bool,
) -> std::io::Result<MountHandle> {
    let session = rfuse3::raw::Session::new(mount_options(allow_other));
    if privileged {
        session.mount(fs, mount_point).await
    } else {
        session.mount_with_unprivileged(fs, mount_point).await
    }
}

#[cfg(not(target_os = "linux"))]
pub async fn mount(
    _fs: WavFs,
    _mount_point: impl AsRef<Path>,
    _allow_other: bool,
    _privileged: bool,
) -> std::io::Result<MountHandle> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "FUSE mount is only supported on Linux",
    ))
}
