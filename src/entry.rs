//! Format-agnostic archive entries.
//!
//! An [`ArchiveEntry`] describes one archive member the same way regardless of which archive
//! format it was read from.  Whatever the format-specific reader knew about the member and that
//! does not fit the canonical shape travels along as an opaque entry object, which code that knows
//! the concrete format can downcast to get at the original descriptor.

use std::{any::Any, fmt, sync::Arc};

/// All permission bits an [`ArchiveEntry`] carries: read, write and execute for user, group and
/// other.  File type bits and the setuid/setgid/sticky bits of a raw mode are outside this range.
pub const FULL_PERMISSION_BITS: u32 = 0o777;

/// Whose access a permission bit governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAccess {
    User,
    Group,
    Other,
}

/// The kind of access a permission bit grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionType {
    Read,
    Write,
    Execute,
}

/// Permission bits of an archive entry, always within [`FULL_PERMISSION_BITS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FilePermissions {
    bits: u32,
}

impl FilePermissions {
    /// Builds permissions from a raw mode integer, discarding everything outside
    /// [`FULL_PERMISSION_BITS`].
    pub fn from_mode(mode: u32) -> Self {
        FilePermissions {
            bits: mode & FULL_PERMISSION_BITS,
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns true if the given kind of access is granted to the given party.
    pub fn is_set(&self, access: PermissionAccess, kind: PermissionType) -> bool {
        let shift = match access {
            PermissionAccess::User => 6,
            PermissionAccess::Group => 3,
            PermissionAccess::Other => 0,
        };
        let bit = match kind {
            PermissionType::Read => 0o4,
            PermissionType::Write => 0o2,
            PermissionType::Execute => 0o1,
        };
        self.bits & (bit << shift) != 0
    }
}

/// Formats as the familiar `rwxr-xr-x` string.
impl fmt::Display for FilePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for access in [
            PermissionAccess::User,
            PermissionAccess::Group,
            PermissionAccess::Other,
        ] {
            for (kind, c) in [
                (PermissionType::Read, 'r'),
                (PermissionType::Write, 'w'),
                (PermissionType::Execute, 'x'),
            ] {
                let c = if self.is_set(access, kind) { c } else { '-' };
                fmt::Write::write_char(f, c)?;
            }
        }
        Ok(())
    }
}

/// A single archive member, described independently of the archive format.
///
/// Cloning is cheap in the sense that the entry object is shared, not copied.
#[derive(Clone)]
pub struct ArchiveEntry {
    path: String,
    directory: bool,
    mtime: i64,
    size: u64,
    permissions: FilePermissions,
    owner: String,
    group: String,
    entry_object: Option<Arc<dyn Any + Send + Sync>>,
}

impl ArchiveEntry {
    /// Creates an entry with no permission bits, empty owner and group, and no entry object.
    ///
    /// `mtime` is in seconds since the Unix epoch.
    pub fn new(path: impl Into<String>, directory: bool, mtime: i64, size: u64) -> Self {
        ArchiveEntry {
            path: path.into(),
            directory,
            mtime,
            size,
            permissions: FilePermissions::default(),
            owner: String::new(),
            group: String::new(),
            entry_object: None,
        }
    }

    pub fn set_permissions(&mut self, permissions: FilePermissions) {
        self.permissions = permissions;
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = group.into();
    }

    /// Attaches the format-specific descriptor this entry was built from.
    pub fn set_entry_object<T: Any + Send + Sync>(&mut self, object: T) {
        self.entry_object = Some(Arc::new(object));
    }

    /// The full path of the entry inside the archive, as stored (directories usually keep their
    /// trailing `/`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last component of [`path()`](Self::path), ignoring a trailing `/`.
    pub fn name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        }
    }

    /// The number of non-empty path components, so `a` has depth 1 and `a/b/` has depth 2.
    pub fn depth(&self) -> usize {
        self.path.split('/').filter(|c| !c.is_empty()).count()
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Modification time in seconds since the Unix epoch.
    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn permissions(&self) -> FilePermissions {
        self.permissions
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the format-specific descriptor if one is attached and it is a `T`.
    pub fn entry_object<T: Any>(&self) -> Option<&T> {
        self.entry_object.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("path", &self.path)
            .field("directory", &self.directory)
            .field("mtime", &self.mtime)
            .field("size", &self.size)
            .field("permissions", &self.permissions.to_string())
            .field("owner", &self.owner)
            .field("group", &self.group)
            .field("entry_object", &self.entry_object.is_some())
            .finish()
    }
}
