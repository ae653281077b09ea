//! # Canonical PVL emission
//!
//! `Label` and `PvlContainer` implement [`Display`](std::fmt::Display) with one canonical layout:
//!
//! ```text
//! Object = IsisCube
//!   Group = Dimensions
//!     Samples = 5039
//!     Lines   = 2
//!   End_Group
//! End_Object
//! End
//! ```
//!
//! * two spaces of indentation per nesting level,
//! * keyword names padded to the longest keyword name of their container,
//! * sequences as `(a, b)`, sets as `{a, b}`, units as ` <UNIT>` after each value,
//! * comments as `/* text */` on their own line before what they annotate.
//!
//! Emitting is deterministic, so reading a label written by this module and emitting it again
//! reproduces the same bytes.

use std::fmt;

use itertools::Itertools;

use super::keyword::{Keyword, ValueForm};
use super::{ContainerKind, Label, PvlContainer, PvlEntry};

const INDENT: &str = "  ";

fn write_comments(f: &mut fmt::Formatter<'_>, comments: &[String], depth: usize) -> fmt::Result {
    for comment in comments {
        writeln!(f, "{}/* {} */", INDENT.repeat(depth), comment)?;
    }
    Ok(())
}

/// Value part of a keyword, without the name.
pub fn format_values(keyword: &Keyword) -> String {
    let joined = keyword.values.iter().map(|v| v.to_string()).join(", ");
    match keyword.form {
        ValueForm::Scalar if keyword.values.len() == 1 => joined,
        ValueForm::Set => format!("{{{joined}}}"),
        _ => format!("({joined})"),
    }
}

fn write_keyword(
    f: &mut fmt::Formatter<'_>,
    keyword: &Keyword,
    depth: usize,
    width: usize,
) -> fmt::Result {
    write_comments(f, &keyword.comments, depth)?;
    let pad = INDENT.repeat(depth);
    if keyword.values.is_empty() && keyword.form == ValueForm::Scalar {
        return writeln!(f, "{pad}{}", keyword.name);
    }
    writeln!(
        f,
        "{pad}{:<width$} = {}",
        keyword.name,
        format_values(keyword)
    )
}

fn write_entries(f: &mut fmt::Formatter<'_>, container: &PvlContainer, depth: usize) -> fmt::Result {
    let width = container
        .keywords()
        .map(|k| k.name.len())
        .max()
        .unwrap_or(0);
    for entry in &container.entries {
        match entry {
            PvlEntry::Keyword(k) => write_keyword(f, k, depth, width)?,
            PvlEntry::Container(c) => write_container(f, c, depth)?,
        }
    }
    Ok(())
}

fn write_container(f: &mut fmt::Formatter<'_>, container: &PvlContainer, depth: usize) -> fmt::Result {
    if container.kind == ContainerKind::Root {
        write_comments(f, &container.comments, depth)?;
        write_entries(f, container, depth)?;
        write_comments(f, &container.end_comments, depth)?;
        return Ok(());
    }
    let pad = INDENT.repeat(depth);
    write_comments(f, &container.comments, depth)?;
    writeln!(
        f,
        "{pad}{} = {}",
        container.kind.begin_keyword(),
        container.name
    )?;
    write_entries(f, container, depth + 1)?;
    write_comments(f, &container.end_comments, depth + 1)?;
    writeln!(f, "{pad}{}", container.kind.end_keyword())
}

impl fmt::Display for PvlContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_container(f, self, 0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_container(f, &self.root, 0)?;
        writeln!(f, "End")
    }
}

#[cfg(test)]
mod test_display {
    use super::*;
    use crate::label::keyword::PvlValue;
    use crate::label::parse_label;

    fn cube_label() -> Label {
        let mut label = Label::default();
        let mut cube = PvlContainer::new_object("IsisCube");
        let mut dims = PvlContainer::new_group("Dimensions");
        dims.add_keyword(Keyword::new("Samples", "5039"));
        dims.add_keyword(Keyword::new("Lines", "2"));
        cube.add_container(dims);
        let mut bandbin = PvlContainer::new_group("BandBin");
        bandbin.add_keyword(Keyword::with_units("Center", "0.65", "micrometers"));
        bandbin.add_keyword(Keyword::sequence("FilterName", ["RED", "NEAR INFRARED"]));
        cube.add_container(bandbin);
        label.add_container(cube);
        label
    }

    #[test]
    fn test_canonical_layout() {
        let text = cube_label().to_string();
        assert_eq!(
            text,
            "Object = IsisCube\n\
             \x20 Group = Dimensions\n\
             \x20   Samples = 5039\n\
             \x20   Lines   = 2\n\
             \x20 End_Group\n\
             \x20 Group = BandBin\n\
             \x20   Center     = 0.65 <micrometers>\n\
             \x20   FilterName = (RED, \"NEAR INFRARED\")\n\
             \x20 End_Group\n\
             End_Object\n\
             End\n"
        );
    }

    #[test]
    fn test_emit_parse_emit_is_stable() {
        let label = cube_label();
        let first = label.to_string();
        let reparsed = parse_label(first.as_bytes()).unwrap();
        assert_eq!(reparsed, label);
        assert_eq!(reparsed.to_string(), first);
    }

    #[test]
    fn test_comments_and_sets_survive() {
        let text = "/* header */\nOBJECT = IMAGE\n  /* count */\n  ITEMS = {1, 2}\nEND_OBJECT\nEND\n";
        let label = parse_label(text.as_bytes()).unwrap();
        let emitted = label.to_string();
        let again = parse_label(emitted.as_bytes()).unwrap();
        assert_eq!(again, label);
        let items = again.find_object("IMAGE").unwrap().keyword("ITEMS").unwrap();
        assert_eq!(items.form, ValueForm::Set);
        assert_eq!(items.comments, vec!["count".to_string()]);
        assert_eq!(again.find_object("IMAGE").unwrap().comments, vec!["header".to_string()]);
    }

    #[test]
    fn test_flag_and_single_element_sequence() {
        let mut label = Label::default();
        label.add_keyword(Keyword::flag("Auto"));
        label.add_keyword(Keyword::sequence("InputKey", [PvlValue::new("FILTER")]));
        assert_eq!(label.to_string(), "Auto\nInputKey = (FILTER)\nEnd\n");
    }
}
