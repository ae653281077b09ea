//! # PDS3 / PVL label model
//!
//! A label is a tree of containers. The implicit root holds top-level keywords, `OBJECT`s and
//! `GROUP`s, in source order. Keyword lookups are case-insensitive, as PDS names are.
//!
//! ## Overview
//!
//! - [`keyword`]: [`Keyword`] and [`PvlValue`], with typed accessors.
//! - [`parser`]: [`parse_label`], the byte-level parser that stops at `END`.
//! - [`display`]: canonical emission (`impl Display for Label`).
//! - [`fixups`]: textual repairs for mission labels that are not valid PVL.
//!
//! ## Lookups
//!
//! | method                          | scope                                  |
//! |---------------------------------|----------------------------------------|
//! | [`PvlContainer::keyword`]       | direct children only                   |
//! | [`PvlContainer::traverse_keyword`] | whole subtree, pre-order, first match |
//! | [`PvlContainer::find_object`] / [`PvlContainer::find_group`] | direct children |
//! | [`PvlContainer::traverse_container`] | whole subtree                      |
//! | [`PvlContainer::path`]          | nested container names from `self`     |
//!
//! ## Example
//!
//! ```rust
//! use pds2cube::label::Label;
//!
//! let label: Label = "PDS_VERSION_ID = PDS3\nOBJECT = IMAGE\n LINES = 2\nEND_OBJECT\nEND\n"
//!     .parse()
//!     .unwrap();
//! assert_eq!(label.traverse_keyword("lines").unwrap().as_i64().unwrap(), 2);
//! ```

pub mod display;
pub mod fixups;
pub mod keyword;
pub mod parser;

use std::io::{BufRead, BufReader, Read};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use camino::Utf8Path;

pub use keyword::{Keyword, PvlValue, ValueForm, ValueStyle};
pub use parser::parse_label;

use crate::ingest_errors::IngestError;

/// Upper bound on the bytes scanned for an attached label before giving up on finding `END`.
pub const MAX_LABEL_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Root,
    Object,
    Group,
}

impl ContainerKind {
    pub fn begin_keyword(&self) -> &'static str {
        match self {
            ContainerKind::Root => "",
            ContainerKind::Object => "Object",
            ContainerKind::Group => "Group",
        }
    }

    pub fn end_keyword(&self) -> &'static str {
        match self {
            ContainerKind::Root => "End",
            ContainerKind::Object => "End_Object",
            ContainerKind::Group => "End_Group",
        }
    }
}

/// A child of a container, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum PvlEntry {
    Keyword(Keyword),
    Container(PvlContainer),
}

/// The root, an `OBJECT` or a `GROUP`.
#[derive(Debug, Clone)]
pub struct PvlContainer {
    pub kind: ContainerKind,
    pub name: String,
    pub entries: Vec<PvlEntry>,
    /// Comments written before the opening statement.
    pub comments: Vec<String>,
    /// Comments written before the closing statement.
    pub end_comments: Vec<String>,
}

impl PartialEq for PvlContainer {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.entries == other.entries
    }
}

impl PvlContainer {
    pub fn new(kind: ContainerKind, name: impl Into<String>) -> Self {
        PvlContainer {
            kind,
            name: name.into(),
            entries: Vec::new(),
            comments: Vec::new(),
            end_comments: Vec::new(),
        }
    }

    pub fn root() -> Self {
        PvlContainer::new(ContainerKind::Root, "Root")
    }

    pub fn new_object(name: impl Into<String>) -> Self {
        PvlContainer::new(ContainerKind::Object, name)
    }

    pub fn new_group(name: impl Into<String>) -> Self {
        PvlContainer::new(ContainerKind::Group, name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.entries.iter().filter_map(|e| match e {
            PvlEntry::Keyword(k) => Some(k),
            PvlEntry::Container(_) => None,
        })
    }

    pub fn containers(&self) -> impl Iterator<Item = &PvlContainer> {
        self.entries.iter().filter_map(|e| match e {
            PvlEntry::Container(c) => Some(c),
            PvlEntry::Keyword(_) => None,
        })
    }

    pub fn containers_mut(&mut self) -> impl Iterator<Item = &mut PvlContainer> {
        self.entries.iter_mut().filter_map(|e| match e {
            PvlEntry::Container(c) => Some(c),
            PvlEntry::Keyword(_) => None,
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &PvlContainer> {
        self.containers().filter(|c| c.kind == ContainerKind::Object)
    }

    pub fn groups(&self) -> impl Iterator<Item = &PvlContainer> {
        self.containers().filter(|c| c.kind == ContainerKind::Group)
    }

    /// First direct keyword named `name`.
    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords().find(|k| k.is_named(name))
    }

    pub fn keyword_mut(&mut self, name: &str) -> Option<&mut Keyword> {
        self.entries.iter_mut().find_map(|e| match e {
            PvlEntry::Keyword(k) if k.is_named(name) => Some(k),
            _ => None,
        })
    }

    pub fn has_keyword(&self, name: &str) -> bool {
        self.keyword(name).is_some()
    }

    /// Direct keyword that must be present.
    pub fn require(&self, name: &str) -> Result<&Keyword, IngestError> {
        self.keyword(name).ok_or_else(|| IngestError::missing(name))
    }

    /// Every direct keyword named `name`, for repeated keywords.
    pub fn keywords_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Keyword> + 'a {
        self.keywords().filter(move |k| k.is_named(name))
    }

    pub fn find_object(&self, name: &str) -> Option<&PvlContainer> {
        self.objects().find(|c| c.is_named(name))
    }

    pub fn find_group(&self, name: &str) -> Option<&PvlContainer> {
        self.groups().find(|c| c.is_named(name))
    }

    pub fn find_object_mut(&mut self, name: &str) -> Option<&mut PvlContainer> {
        self.containers_mut()
            .find(|c| c.kind == ContainerKind::Object && c.is_named(name))
    }

    pub fn find_group_mut(&mut self, name: &str) -> Option<&mut PvlContainer> {
        self.containers_mut()
            .find(|c| c.kind == ContainerKind::Group && c.is_named(name))
    }

    /// First keyword named `name` in a pre-order walk of the subtree.
    pub fn traverse_keyword(&self, name: &str) -> Option<&Keyword> {
        self.entries.iter().find_map(|e| match e {
            PvlEntry::Keyword(k) if k.is_named(name) => Some(k),
            PvlEntry::Keyword(_) => None,
            PvlEntry::Container(c) => c.traverse_keyword(name),
        })
    }

    /// First container named `name` (optionally of a given kind) in a pre-order walk.
    pub fn traverse_container(&self, name: &str, kind: Option<ContainerKind>) -> Option<&Self> {
        self.containers().find_map(|c| {
            if c.is_named(name) && kind.is_none_or(|k| k == c.kind) {
                Some(c)
            } else {
                c.traverse_container(name, kind)
            }
        })
    }

    pub fn traverse_container_mut(
        &mut self,
        name: &str,
        kind: Option<ContainerKind>,
    ) -> Option<&mut Self> {
        for c in self.containers_mut() {
            if c.is_named(name) && kind.is_none_or(|k| k == c.kind) {
                return Some(c);
            }
            if let Some(found) = c.traverse_container_mut(name, kind) {
                return Some(found);
            }
        }
        None
    }

    /// Follow nested container names from `self`; an empty path or `["ROOT"]` is `self`.
    pub fn path<S: AsRef<str>>(&self, names: &[S]) -> Option<&Self> {
        match names.split_first() {
            None => Some(self),
            Some((first, rest)) if first.as_ref().eq_ignore_ascii_case("ROOT") => self.path(rest),
            Some((first, rest)) => self
                .containers()
                .find(|c| c.is_named(first.as_ref()))
                .and_then(|c| c.path(rest)),
        }
    }

    /// Follow `path`, creating the missing containers on the way.
    pub fn path_or_create(&mut self, path: &[(ContainerKind, &str)]) -> &mut Self {
        let Some(((kind, name), rest)) = path.split_first() else {
            return self;
        };
        let index = self.entries.iter().position(|e| {
            matches!(e, PvlEntry::Container(c) if c.kind == *kind && c.is_named(name))
        });
        let index = match index {
            Some(i) => i,
            None => {
                self.entries
                    .push(PvlEntry::Container(PvlContainer::new(*kind, *name)));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[index] {
            PvlEntry::Container(c) => c.path_or_create(rest),
            PvlEntry::Keyword(_) => unreachable!("index points at a container"),
        }
    }

    /// Append a keyword, keeping any existing one with the same name.
    pub fn add_keyword(&mut self, keyword: Keyword) {
        self.entries.push(PvlEntry::Keyword(keyword));
    }

    /// Replace the first keyword with the same name, or append.
    pub fn set_keyword(&mut self, keyword: Keyword) {
        match self.keyword_mut(&keyword.name) {
            Some(existing) => {
                existing.values = keyword.values;
                existing.form = keyword.form;
            }
            None => self.add_keyword(keyword),
        }
    }

    pub fn remove_keyword(&mut self, name: &str) -> Option<Keyword> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, PvlEntry::Keyword(k) if k.is_named(name)))?;
        match self.entries.remove(index) {
            PvlEntry::Keyword(k) => Some(k),
            PvlEntry::Container(_) => None,
        }
    }

    pub fn add_container(&mut self, container: PvlContainer) {
        self.entries.push(PvlEntry::Container(container));
    }

    /// Replace the first container with the same kind and name, or append.
    pub fn put_container(&mut self, container: PvlContainer) {
        let existing = self.entries.iter_mut().find_map(|e| match e {
            PvlEntry::Container(c) if c.kind == container.kind && c.is_named(&container.name) => {
                Some(c)
            }
            _ => None,
        });
        match existing {
            Some(slot) => *slot = container,
            None => self.add_container(container),
        }
    }

    pub fn remove_container(&mut self, kind: ContainerKind, name: &str) -> Option<PvlContainer> {
        let index = self.entries.iter().position(
            |e| matches!(e, PvlEntry::Container(c) if c.kind == kind && c.is_named(name)),
        )?;
        match self.entries.remove(index) {
            PvlEntry::Container(c) => Some(c),
            PvlEntry::Keyword(_) => None,
        }
    }
}

/// A parsed label.
#[derive(Debug, Clone)]
pub struct Label {
    pub root: PvlContainer,
    /// Byte offset just past the `END` line, when the label had one.
    pub end_offset: Option<u64>,
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Default for Label {
    fn default() -> Self {
        Label {
            root: PvlContainer::root(),
            end_offset: None,
        }
    }
}

impl Deref for Label {
    type Target = PvlContainer;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl DerefMut for Label {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.root
    }
}

impl FromStr for Label {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(s.as_bytes())
    }
}

impl Label {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IngestError> {
        parse_label(bytes)
    }

    /// Read and parse the label at the head of `path`.
    ///
    /// Only the label text is read: lines are consumed until the `END` statement, so an attached
    /// label in front of a large image does not pull the pixels into memory.
    pub fn from_file(path: &Utf8Path) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path)?;
        let bytes = read_label_bytes(file)?;
        parse_label(&bytes)
    }
}

/// Read from `reader` up to and including the `END` line.
pub fn read_label_bytes(reader: impl Read) -> Result<Vec<u8>, IngestError> {
    let mut reader = BufReader::new(reader);
    let mut bytes = Vec::new();
    loop {
        let start = bytes.len();
        let n = reader.read_until(b'\n', &mut bytes)?;
        if n == 0 || bytes.len() > MAX_LABEL_BYTES {
            break;
        }
        if bytes[start..].trim_ascii().eq_ignore_ascii_case(b"END") {
            break;
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod test_label {
    use super::*;

    fn sample() -> Label {
        "PDS_VERSION_ID = PDS3\n\
         OBJECT = IMAGE_MAP_PROJECTION\n\
           A_AXIS_RADIUS = 3396.19 <KM>\n\
         END_OBJECT = IMAGE_MAP_PROJECTION\n\
         OBJECT = IMAGE\n\
           GROUP = BAND\n\
             LINES = 3\n\
           END_GROUP = BAND\n\
           LINES = 4\n\
         END_OBJECT = IMAGE\n\
         END\n"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_traverse_is_preorder() {
        let label = sample();
        assert_eq!(label.traverse_keyword("LINES").unwrap().as_i64().unwrap(), 3);
        assert!(label.keyword("LINES").is_none());
        assert_eq!(
            label.path(&["IMAGE"]).unwrap().keyword("lines").unwrap().as_i64().unwrap(),
            4
        );
        assert!(label
            .traverse_container("band", Some(ContainerKind::Group))
            .is_some());
        assert!(label
            .traverse_container("band", Some(ContainerKind::Object))
            .is_none());
    }

    #[test]
    fn test_set_keyword_replaces() {
        let mut label = sample();
        label.set_keyword(Keyword::new("PDS_VERSION_ID", "PDS4"));
        label.set_keyword(Keyword::new("NEW", "1"));
        assert_eq!(label.keywords_named("PDS_VERSION_ID").count(), 1);
        assert_eq!(label.keyword("PDS_VERSION_ID").unwrap().as_str().unwrap(), "PDS4");
        assert!(label.has_keyword("new"));
    }

    #[test]
    fn test_path_or_create() {
        let mut label = Label::default();
        let group = label.path_or_create(&[
            (ContainerKind::Object, "IsisCube"),
            (ContainerKind::Group, "Instrument"),
        ]);
        group.set_keyword(Keyword::new("SpacecraftName", "Mars_Reconnaissance_Orbiter"));
        let again = label.path_or_create(&[
            (ContainerKind::Object, "IsisCube"),
            (ContainerKind::Group, "Instrument"),
        ]);
        assert!(again.has_keyword("SpacecraftName"));
        assert_eq!(label.containers().count(), 1);
    }

    #[test]
    fn test_read_label_bytes_stops_at_end() {
        let mut data = b"LINES = 1\nEND\n".to_vec();
        data.extend_from_slice(&[0xFF; 64]);
        let bytes = read_label_bytes(data.as_slice()).unwrap();
        assert_eq!(bytes, b"LINES = 1\nEND\n");
    }
}
