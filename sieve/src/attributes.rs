//! Attribute and unit tables.
//!
//! Both tables are static. The parser receives them as plain values
//! instead of reaching for globals.

use std::fmt;

use crate::{Error, Result};

/// File attributes usable in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Name,
    IName,
    Regex,
    IRegex,
    Size,
    Atime,
    Mtime,
    Ctime,
    Type,
    User,
    Uid,
    Group,
    Gid,
    Filesystem,
    Readable,
    Writable,
    Executable,
    Empty,
}

impl Attribute {
    /// Canonical expression name.
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::IName => "iname",
            Attribute::Regex => "regex",
            Attribute::IRegex => "iregex",
            Attribute::Size => "size",
            Attribute::Atime => "atime",
            Attribute::Mtime => "mtime",
            Attribute::Ctime => "ctime",
            Attribute::Type => "type",
            Attribute::User => "user",
            Attribute::Uid => "uid",
            Attribute::Group => "group",
            Attribute::Gid => "gid",
            Attribute::Filesystem => "filesystem",
            Attribute::Readable => "readable",
            Attribute::Writable => "writable",
            Attribute::Executable => "executable",
            Attribute::Empty => "empty",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic type of an attribute or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    String,
    Integer,
    Size,
    Time,
    FileType,
    Flag,
}

impl SemanticType {
    /// Integer, Size and Time values are mutually comparable.
    pub fn is_numeric(self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::Size | SemanticType::Time)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::Size => "size",
            SemanticType::Time => "time",
            SemanticType::FileType => "file type",
            SemanticType::Flag => "flag",
        };
        f.write_str(name)
    }
}

/// How a string attribute is compared against its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatch {
    Exact,
    Glob,
    Pattern,
}

/// Static description of one attribute.
#[derive(Debug, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub attribute: Attribute,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub ty: SemanticType,
    pub matching: StringMatch,
    pub case_insensitive: bool,
}

impl AttributeDescriptor {
    const fn new(attribute: Attribute, name: &'static str, ty: SemanticType) -> Self {
        Self {
            attribute,
            name,
            aliases: &[],
            ty,
            matching: StringMatch::Exact,
            case_insensitive: false,
        }
    }

    const fn matching(mut self, matching: StringMatch, case_insensitive: bool) -> Self {
        self.matching = matching;
        self.case_insensitive = case_insensitive;
        self
    }

    const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Check whether this descriptor answers to `name`.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

static BUILTIN_ATTRIBUTES: [AttributeDescriptor; 18] = [
    AttributeDescriptor::new(Attribute::Name, "name", SemanticType::String)
        .matching(StringMatch::Glob, false),
    AttributeDescriptor::new(Attribute::IName, "iname", SemanticType::String)
        .matching(StringMatch::Glob, true),
    AttributeDescriptor::new(Attribute::Regex, "regex", SemanticType::String)
        .matching(StringMatch::Pattern, false),
    AttributeDescriptor::new(Attribute::IRegex, "iregex", SemanticType::String)
        .matching(StringMatch::Pattern, true),
    AttributeDescriptor::new(Attribute::Size, "size", SemanticType::Size),
    AttributeDescriptor::new(Attribute::Atime, "atime", SemanticType::Time),
    AttributeDescriptor::new(Attribute::Mtime, "mtime", SemanticType::Time),
    AttributeDescriptor::new(Attribute::Ctime, "ctime", SemanticType::Time),
    AttributeDescriptor::new(Attribute::Type, "type", SemanticType::FileType),
    AttributeDescriptor::new(Attribute::User, "user", SemanticType::String),
    AttributeDescriptor::new(Attribute::Uid, "uid", SemanticType::Integer),
    AttributeDescriptor::new(Attribute::Group, "group", SemanticType::String),
    AttributeDescriptor::new(Attribute::Gid, "gid", SemanticType::Integer),
    AttributeDescriptor::new(Attribute::Filesystem, "filesystem", SemanticType::String)
        .aliases(&["fs"]),
    AttributeDescriptor::new(Attribute::Readable, "readable", SemanticType::Flag),
    AttributeDescriptor::new(Attribute::Writable, "writable", SemanticType::Flag),
    AttributeDescriptor::new(Attribute::Executable, "executable", SemanticType::Flag),
    AttributeDescriptor::new(Attribute::Empty, "empty", SemanticType::Flag),
];

/// Registry of attribute names, plus the unit table used to normalize
/// literals compared against them.
#[derive(Debug, Clone, Copy)]
pub struct AttributeTable {
    descriptors: &'static [AttributeDescriptor],
    units: UnitTable,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AttributeTable {
    /// The standard attribute set.
    pub fn builtin() -> Self {
        Self {
            descriptors: &BUILTIN_ATTRIBUTES,
            units: UnitTable::builtin(),
        }
    }

    /// Resolve an attribute name or alias.
    pub fn resolve(&self, name: &str) -> Result<&'static AttributeDescriptor> {
        self.lookup(name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), without an error for unknown names.
    pub fn lookup(&self, name: &str) -> Option<&'static AttributeDescriptor> {
        self.descriptors.iter().find(|d| d.answers_to(name))
    }

    /// Descriptor of a known attribute.
    pub fn descriptor(&self, attribute: Attribute) -> Option<&'static AttributeDescriptor> {
        self.descriptors.iter().find(|d| d.attribute == attribute)
    }

    pub fn units(&self) -> &UnitTable {
        &self.units
    }
}

/// File types recognized by the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
    Block,
    Character,
    Pipe,
    Link,
    Socket,
}

impl FileType {
    pub const ALL: [FileType; 7] = [
        FileType::File,
        FileType::Directory,
        FileType::Block,
        FileType::Character,
        FileType::Pipe,
        FileType::Link,
        FileType::Socket,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "directory",
            FileType::Block => "block",
            FileType::Character => "character",
            FileType::Pipe => "pipe",
            FileType::Link => "link",
            FileType::Socket => "socket",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Map a `std::fs::FileType` (as reported by `lstat`/`stat`).
    pub fn from_std(ft: std::fs::FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if ft.is_symlink() {
            FileType::Link
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_block_device() {
            FileType::Block
        } else if ft.is_char_device() {
            FileType::Character
        } else if ft.is_fifo() {
            FileType::Pipe
        } else if ft.is_socket() {
            FileType::Socket
        } else {
            FileType::File
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A normalized time literal: an offset in seconds plus the size of the
/// unit it was written in. The granularity turns `mtime=6days` into the
/// bucket `[6d, 7d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub seconds: i64,
    pub granularity: i64,
}

struct Unit {
    words: &'static [&'static str],
    suffixes: &'static [&'static str],
    multiplier: i64,
}

impl Unit {
    fn matches(&self, unit: &str) -> bool {
        self.suffixes.contains(&unit)
            || self.words.iter().any(|w| w.eq_ignore_ascii_case(unit))
    }
}

const KIB: i64 = 1024;

static SIZE_UNITS: [Unit; 4] = [
    Unit {
        words: &["byte", "bytes"],
        suffixes: &["b"],
        multiplier: 1,
    },
    Unit {
        words: &["kb", "kilobyte", "kilobytes"],
        suffixes: &["k", "K"],
        multiplier: KIB,
    },
    Unit {
        words: &["mb", "megabyte", "megabytes"],
        suffixes: &["M"],
        multiplier: KIB * KIB,
    },
    Unit {
        words: &["gb", "gigabyte", "gigabytes"],
        suffixes: &["G", "g"],
        multiplier: KIB * KIB * KIB,
    },
];

const MINUTE: i64 = 60;
const DAY: i64 = 86_400;

static TIME_UNITS: [Unit; 3] = [
    Unit {
        words: &["minute", "minutes"],
        suffixes: &[],
        multiplier: MINUTE,
    },
    Unit {
        words: &["hour", "hours"],
        suffixes: &[],
        multiplier: 3_600,
    },
    Unit {
        words: &["day", "days"],
        suffixes: &[],
        multiplier: DAY,
    },
];

/// Size and time unit vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitTable {
    _private: (),
}

impl UnitTable {
    pub fn builtin() -> Self {
        Self { _private: () }
    }

    /// Check whether `word` names any size or time unit.
    pub fn is_unit(&self, word: &str) -> bool {
        SIZE_UNITS.iter().chain(TIME_UNITS.iter()).any(|u| u.matches(word))
    }

    /// Convert `number` written in `unit` to bytes. No unit means bytes.
    pub fn normalize_size(&self, number: i64, unit: Option<&str>) -> Result<i64> {
        let multiplier = match unit {
            None => 1,
            Some(unit) => lookup_unit(&SIZE_UNITS, unit, "size")?,
        };
        number.checked_mul(multiplier).ok_or_else(|| Error::UnitParse {
            unit: format!("{}{}", number, unit.unwrap_or("")),
            dimension: "size",
        })
    }

    /// Convert `number` written in `unit` to seconds. No unit means minutes.
    pub fn normalize_time(&self, number: i64, unit: Option<&str>) -> Result<TimeSpan> {
        let granularity = match unit {
            None => MINUTE,
            Some(unit) => lookup_unit(&TIME_UNITS, unit, "time")?,
        };
        let seconds = number.checked_mul(granularity).ok_or_else(|| Error::UnitParse {
            unit: format!("{}{}", number, unit.unwrap_or("")),
            dimension: "time",
        })?;
        Ok(TimeSpan { seconds, granularity })
    }
}

fn lookup_unit(units: &[Unit], unit: &str, dimension: &'static str) -> Result<i64> {
    units
        .iter()
        .find(|u| u.matches(unit))
        .map(|u| u.multiplier)
        .ok_or_else(|| Error::UnitParse {
            unit: unit.to_string(),
            dimension,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_attributes() {
        let table = AttributeTable::builtin();
        assert_eq!(table.resolve("size").unwrap().ty, SemanticType::Size);
        assert_eq!(table.resolve("iname").unwrap().matching, StringMatch::Glob);
        assert!(table.resolve("iname").unwrap().case_insensitive);
        assert_eq!(table.resolve("fs").unwrap().attribute, Attribute::Filesystem);
    }

    #[test]
    fn test_resolve_unknown_attribute() {
        let table = AttributeTable::builtin();
        let err = table.resolve("colour").unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute(name) if name == "colour"));
    }

    #[test]
    fn test_size_units() {
        let units = UnitTable::builtin();
        assert_eq!(units.normalize_size(720, None).unwrap(), 720);
        assert_eq!(units.normalize_size(720, Some("bytes")).unwrap(), 720);
        assert_eq!(units.normalize_size(1, Some("kb")).unwrap(), 1024);
        assert_eq!(units.normalize_size(5, Some("Kilobytes")).unwrap(), 5120);
        assert_eq!(units.normalize_size(5, Some("M")).unwrap(), 5 * 1024 * 1024);
        assert_eq!(units.normalize_size(2, Some("gigabytes")).unwrap(), 2 << 30);
        assert_eq!(units.normalize_size(1, Some("g")).unwrap(), 1 << 30);
    }

    #[test]
    fn test_size_unit_errors() {
        let units = UnitTable::builtin();
        assert!(matches!(
            units.normalize_size(1, Some("days")),
            Err(Error::UnitParse { dimension: "size", .. })
        ));
        // single-letter suffixes are case-sensitive; `m` is not megabytes
        assert!(units.normalize_size(1, Some("m")).is_err());
        assert!(units.normalize_size(i64::MAX, Some("G")).is_err());
    }

    #[test]
    fn test_time_units() {
        let units = UnitTable::builtin();
        assert_eq!(
            units.normalize_time(6, Some("days")).unwrap(),
            TimeSpan { seconds: 6 * 86_400, granularity: 86_400 }
        );
        assert_eq!(units.normalize_time(96, Some("hours")).unwrap().seconds, 96 * 3_600);
        assert_eq!(units.normalize_time(1, Some("minute")).unwrap().granularity, 60);
        assert_eq!(
            units.normalize_time(2, None).unwrap(),
            TimeSpan { seconds: 120, granularity: 60 }
        );
        assert!(matches!(
            units.normalize_time(1, Some("kb")),
            Err(Error::UnitParse { dimension: "time", .. })
        ));
    }

    #[test]
    fn test_file_type_names() {
        for ft in FileType::ALL {
            assert_eq!(FileType::from_name(ft.name()), Some(ft));
        }
        assert_eq!(FileType::from_name("fifo"), None);
    }
}
