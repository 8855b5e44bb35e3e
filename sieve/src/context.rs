//! Per-file evaluation context.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::fs::{self, Metadata};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::attributes::{Attribute, FileType};
use crate::Result;

const MOUNTS_FILE: &str = "/proc/self/mounts";

/// Snapshot of one file's metadata, built once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub path: PathBuf,
    /// Final path component (the whole path when there is none, e.g. `.`).
    pub name: String,
    pub size: i64,
    /// Unix seconds.
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub uid: u32,
    pub gid: u32,
    /// Account name, or the numeric id when it has no entry.
    pub user: String,
    pub group: String,
    pub file_type: FileType,
    pub mode: u32,
    pub link_target: Option<PathBuf>,
    pub filesystem: String,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub empty: bool,
}

impl FileContext {
    /// A context with zeroed metadata, to be filled in by the caller.
    pub fn new(path: impl Into<PathBuf>, file_type: FileType) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self {
            path,
            name,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            uid: 0,
            gid: 0,
            user: String::new(),
            group: String::new(),
            file_type,
            mode: 0,
            link_target: None,
            filesystem: String::new(),
            readable: false,
            writable: false,
            executable: false,
            empty: false,
        }
    }

    /// Value of a flag attribute.
    pub fn flag(&self, attribute: Attribute) -> Option<bool> {
        match attribute {
            Attribute::Readable => Some(self.readable),
            Attribute::Writable => Some(self.writable),
            Attribute::Executable => Some(self.executable),
            Attribute::Empty => Some(self.empty),
            _ => None,
        }
    }
}

fn file_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub point: PathBuf,
    pub fs_type: String,
}

/// Builds [`FileContext`]s, caching account names and the mount table.
#[derive(Debug, Default)]
pub struct ContextBuilder {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
    mounts: Vec<Mount>,
    cwd: Option<PathBuf>,
}

impl ContextBuilder {
    /// Create a builder, reading the mount table of the current process.
    pub fn new() -> Self {
        let mounts = match fs::read_to_string(MOUNTS_FILE) {
            Ok(text) => parse_mounts(&text),
            Err(e) => {
                tracing::debug!(error = %e, "mount table unavailable, filesystem will be empty");
                Vec::new()
            }
        };
        Self::with_mounts(mounts)
    }

    /// Create a builder with an explicit mount table.
    pub fn with_mounts(mounts: Vec<Mount>) -> Self {
        Self {
            users: HashMap::new(),
            groups: HashMap::new(),
            mounts,
            cwd: std::env::current_dir().ok(),
        }
    }

    /// Build the context of `path` from its (not followed) metadata.
    pub fn build(&mut self, path: &Path, metadata: &Metadata) -> Result<FileContext> {
        let file_type = FileType::from_std(metadata.file_type());
        let uid = metadata.uid();
        let gid = metadata.gid();

        let link_target = match file_type {
            FileType::Link => fs::read_link(path).ok(),
            _ => None,
        };

        let empty = match file_type {
            FileType::File => metadata.len() == 0,
            FileType::Directory => match fs::read_dir(path) {
                Ok(mut entries) => entries.next().is_none(),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "cannot list directory");
                    false
                }
            },
            _ => false,
        };

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        Ok(FileContext {
            path: path.to_path_buf(),
            name: file_name(path),
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            atime: metadata.atime(),
            mtime: metadata.mtime(),
            ctime: metadata.ctime(),
            uid,
            gid,
            user: self.user_name(uid),
            group: self.group_name(gid),
            file_type,
            mode: metadata.mode(),
            link_target,
            filesystem: self.filesystem(path),
            readable: access(&c_path, libc::R_OK),
            writable: access(&c_path, libc::W_OK),
            executable: access(&c_path, libc::X_OK),
            empty,
        })
    }

    fn user_name(&mut self, uid: u32) -> String {
        self.users
            .entry(uid)
            .or_insert_with(|| lookup_user(uid).unwrap_or_else(|| uid.to_string()))
            .clone()
    }

    fn group_name(&mut self, gid: u32) -> String {
        self.groups
            .entry(gid)
            .or_insert_with(|| lookup_group(gid).unwrap_or_else(|| gid.to_string()))
            .clone()
    }

    /// Type of the filesystem with the longest mount point containing `path`.
    fn filesystem(&self, path: &Path) -> String {
        let absolute = match (&self.cwd, path.is_absolute()) {
            (Some(cwd), false) => cwd.join(path),
            _ => path.to_path_buf(),
        };
        self.mounts
            .iter()
            .filter(|m| absolute.starts_with(&m.point))
            .max_by_key(|m| m.point.components().count())
            .map(|m| m.fs_type.clone())
            .unwrap_or_default()
    }
}

fn access(path: &CStr, mode: libc::c_int) -> bool {
    unsafe { libc::access(path.as_ptr(), mode) == 0 }
}

/// Parse `/proc/self/mounts` style text.
pub fn parse_mounts(text: &str) -> Vec<Mount> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let point = fields.next()?;
            let fs_type = fields.next()?;
            Some(Mount {
                point: PathBuf::from(unescape_mount(point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the octal escapes (`\040` for space) used in the mount table.
fn unescape_mount(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("");
            if let Ok(value) = u8::from_str_radix(digits, 8) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1 << 20;

fn lookup_user(uid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; INITIAL_BUFFER];
    loop {
        let mut entry = MaybeUninit::<libc::passwd>::uninit();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(uid, entry.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        let entry = unsafe { entry.assume_init() };
        let name = unsafe { CStr::from_ptr(entry.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

fn lookup_group(gid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; INITIAL_BUFFER];
    loop {
        let mut entry = MaybeUninit::<libc::group>::uninit();
        let mut result: *mut libc::group = std::ptr::null_mut();
        let rc = unsafe {
            libc::getgrgid_r(gid, entry.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        let entry = unsafe { entry.assume_init() };
        let name = unsafe { CStr::from_ptr(entry.gr_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}
