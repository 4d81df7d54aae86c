//! core/library.rs
//! Virtual <-> real path identity.
//!
//! A virtual path is the backing-root relative path the mount exposes. A
//! source file `a.flac` appears as `a.<target>`; everything else appears
//! under its own name. None of these calls ever fail: lookups that find
//! nothing just mean "not this one".

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use super::decode::Codec;

/// One declared source extension and the codec that decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub extension: String,
    pub codec: Codec,
}

impl Binding {
    pub fn new(extension: impl Into<String>, codec: Codec) -> Self {
        Self {
            extension: extension.into(),
            codec,
        }
    }
}

/// The bindings used when none are configured, in tie-break order.
pub fn default_bindings() -> Vec<Binding> {
    vec![
        Binding::new("flac", Codec::Flac),
        Binding::new("ogg", Codec::Vorbis),
        Binding::new("oga", Codec::Vorbis),
    ]
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    basepath: PathBuf,
    target_ext: String,
    bindings: Vec<Binding>,
}

impl PathResolver {
    pub fn new(basepath: impl Into<PathBuf>, target_ext: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self {
            basepath: basepath.into(),
            target_ext: target_ext.into(),
            bindings,
        }
    }

    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    pub fn target_ext(&self) -> &str {
        &self.target_ext
    }

    fn binding_for(&self, path: &Path) -> Option<&Binding> {
        let ext = path.extension()?;
        self.bindings.iter().find(|b| ext == OsStr::new(&b.extension))
    }

    fn has_target_ext(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.target_ext))
    }

    /// Name a real directory entry is listed under. Only regular files and
    /// symlinks with a source extension are renamed.
    pub fn resolve_virtual(&self, name: &OsStr, is_file_or_symlink: bool) -> OsString {
        let path = Path::new(name);
        if is_file_or_symlink && self.binding_for(path).is_some() {
            return path.with_extension(&self.target_ext).into_os_string();
        }
        name.to_os_string()
    }

    /// The optimistic guess: backing root + virtual path, nothing rewritten.
    pub fn to_real_candidate(&self, virtual_path: &Path) -> PathBuf {
        let relative: PathBuf = virtual_path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.basepath.join(relative)
    }

    /// The true backing file for a candidate that did not exist as named.
    ///
    /// Only target-extension names are rewritten. Source extensions are
    /// tried in declaration order and the first that exists (without
    /// following symlinks) wins; if none does the candidate comes back
    /// unchanged.
    pub fn find_source(&self, candidate: &Path) -> PathBuf {
        if !self.has_target_ext(candidate) {
            return candidate.to_path_buf();
        }
        self.bindings
            .iter()
            .map(|b| candidate.with_extension(&b.extension))
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or_else(|| candidate.to_path_buf())
    }

    /// Candidate plus source lookup in one go.
    pub fn resolve(&self, virtual_path: &Path) -> PathBuf {
        let candidate = self.to_real_candidate(virtual_path);
        if candidate.symlink_metadata().is_ok() {
            return candidate;
        }
        self.find_source(&candidate)
    }

    pub fn decoder_for(&self, real_path: &Path) -> Option<Codec> {
        self.binding_for(real_path).map(|b| b.codec)
    }

    /// Name to list for entry `name` of real directory `dir`, or `None` when
    /// another entry owns that virtual name.
    ///
    /// An entry is listed only if resolving its virtual name lands back on
    /// it: a real `x.<target>` hides `x.flac`, and among sources the first
    /// declared extension wins.
    pub fn listed_name(&self, dir: &Path, name: &OsStr, is_file_or_symlink: bool) -> Option<OsString> {
        let virtual_name = self.resolve_virtual(name, is_file_or_symlink);
        if virtual_name.as_os_str() == name {
            return Some(virtual_name);
        }
        let candidate = dir.join(&virtual_name);
        if candidate.symlink_metadata().is_ok() {
            return None;
        }
        (self.find_source(&candidate) == dir.join(name)).then_some(virtual_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver(root: &Path) -> PathResolver {
        PathResolver::new(root, "wav", default_bindings())
    }

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn source_names_are_rewritten() {
        let r = resolver(Path::new("/music"));
        assert_eq!(r.resolve_virtual(OsStr::new("a.flac"), true), "a.wav");
        assert_eq!(r.resolve_virtual(OsStr::new("b.ogg"), true), "b.wav");
        assert_eq!(r.resolve_virtual(OsStr::new("cover.jpg"), true), "cover.jpg");
        assert_eq!(r.resolve_virtual(OsStr::new("c.flac"), false), "c.flac");
        // exact extension match
        assert_eq!(r.resolve_virtual(OsStr::new("d.FLAC"), true), "d.FLAC");
    }

    #[test]
    fn candidate_is_rooted_at_basepath() {
        let r = resolver(Path::new("/music"));
        assert_eq!(
            r.to_real_candidate(Path::new("/x/a.wav")),
            PathBuf::from("/music/x/a.wav")
        );
        assert_eq!(r.to_real_candidate(Path::new("/")), PathBuf::from("/music"));
        assert_eq!(
            r.to_real_candidate(Path::new("x/../y.wav")),
            PathBuf::from("/music/x/y.wav")
        );
    }

    #[test]
    fn every_source_extension_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        for ext in ["flac", "ogg", "oga"] {
            let real = dir.path().join(format!("song-{ext}.{ext}"));
            touch(&real);
            let virtual_name = r.resolve_virtual(real.file_name().unwrap(), true);
            let candidate = dir.path().join(virtual_name);
            assert_eq!(r.find_source(&candidate), real);
            assert_eq!(r.resolve(Path::new(candidate.file_name().unwrap())), real);
        }
    }

    #[test]
    fn first_declared_extension_wins() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("a.ogg"));
        for _ in 0..3 {
            assert_eq!(r.find_source(&dir.path().join("a.wav")), dir.path().join("a.flac"));
        }
    }

    #[test]
    fn missing_or_foreign_names_come_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        let missing = dir.path().join("none.wav");
        assert_eq!(r.find_source(&missing), missing);

        touch(&dir.path().join("a.flac"));
        let other = dir.path().join("a.mp3");
        assert_eq!(r.find_source(&other), other);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        std::os::unix::fs::symlink("/nowhere/at/all", dir.path().join("a.ogg")).unwrap();
        assert_eq!(r.find_source(&dir.path().join("a.wav")), dir.path().join("a.ogg"));
    }

    #[test]
    fn decoder_follows_extension() {
        let r = resolver(Path::new("/music"));
        assert_eq!(r.decoder_for(Path::new("/music/a.flac")), Some(Codec::Flac));
        assert_eq!(r.decoder_for(Path::new("/music/a.oga")), Some(Codec::Vorbis));
        assert_eq!(r.decoder_for(Path::new("/music/a.wav")), None);
        assert_eq!(r.decoder_for(Path::new("/music/flac")), None);
    }

    #[test]
    fn listing_collisions_resolve_to_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path());
        for name in ["x.flac", "x.wav", "y.flac", "y.ogg", "z.ogg"] {
            touch(&dir.path().join(name));
        }
        let listed = |name: &str| r.listed_name(dir.path(), OsStr::new(name), true);

        assert_eq!(listed("x.wav"), Some("x.wav".into()));
        assert_eq!(listed("x.flac"), None);
        assert_eq!(listed("y.flac"), Some("y.wav".into()));
        assert_eq!(listed("y.ogg"), None);
        assert_eq!(listed("z.ogg"), Some("z.wav".into()));
    }
}
