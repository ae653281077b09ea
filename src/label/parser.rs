//! # PVL label parser
//!
//! Parses the ODL/PVL text that heads every PDS3 product (or sits in a detached `.lbl`) into a
//! [`Label`]. The input is a byte slice: attached labels are followed by binary data, so parsing
//! stops at the `END` statement and the byte offset just past that line is recorded in
//! [`Label::end_offset`].
//!
//! ## Grammar accepted
//!
//! ```text
//! statement := NAME [ "=" value ] EOL
//!            | ("OBJECT" | "GROUP") "=" NAME EOL
//!            | ("END_OBJECT" | "END_GROUP") [ "=" NAME ] EOL
//!            | "END"
//! value     := element | "(" element {"," element} ")" [units] | "{" ... "}" [units]
//! element   := (quoted | bare | nested-sequence) [units]
//! units     := "<" text ">"
//! ```
//!
//! Comments are `/* ... */` on a single line or `#` to the end of the line. An unterminated
//! `/*` comments out the rest of its line.
//!
//! Every failure is reported as [`IngestError::BadLabel`] with the 1-based line, the byte offset,
//! what was expected and a short excerpt of what was found.

use nom::{
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::char,
    sequence::delimited,
    IResult, Parser,
};

use super::keyword::{Keyword, PvlValue, ValueForm, ValueStyle};
use super::{ContainerKind, Label, PvlContainer, PvlEntry};
use crate::constants::ValueList;
use crate::ingest_errors::IngestError;

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'^' | b':' | b'-' | b'.')
}

fn is_bare_char(c: u8) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, b',' | b')' | b'}' | b'(' | b'{' | b'<' | b'"' | b'\'')
}

fn is_inline_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\x0c' | 0)
}

fn parse_name(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_name_char).parse(input)
}

fn parse_units(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(char('<'), take_while(|c| c != b'>' && c != b'\n'), char('>')).parse(input)
}

/// `/* text */` or an unterminated `/* text` running to the end of the line.
fn parse_block_comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag("/*").parse(input)?;
    let line_len = input.iter().position(|&c| c == b'\n').unwrap_or(input.len());
    let line = &input[..line_len];
    match take_until::<_, _, nom::error::Error<&[u8]>>("*/").parse(line) {
        Ok((_, text)) => Ok((&input[text.len() + 2..], text)),
        Err(_) => Ok((&input[line_len..], line)),
    }
}

fn parse_hash_comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag("#").parse(input)?;
    take_while(|c| c != b'\n').parse(input)
}

fn parse_comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    match parse_block_comment(input) {
        Ok(res) => Ok(res),
        Err(_) => parse_hash_comment(input),
    }
}

/// Bare token; stops before a comment opener.
fn parse_bare(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (_, token) = take_while1(is_bare_char).parse(input)?;
    let len = token
        .windows(2)
        .position(|w| w == b"/*")
        .unwrap_or(token.len());
    if len == 0 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeWhile1,
        )));
    }
    Ok((&input[len..], &input[..len]))
}

fn text_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Stateful cursor over the label bytes.
struct LabelParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> LabelParser<'a> {
    fn new(src: &'a [u8]) -> Self {
        LabelParser { src, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.rest().first().copied()
    }

    fn advance_to(&mut self, rest: &'a [u8]) {
        self.pos = self.src.len() - rest.len();
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, expected: &str) -> IngestError {
        let line = self.src[..self.pos].iter().filter(|&&c| c == b'\n').count() + 1;
        let rest = self.rest();
        let excerpt_len = rest
            .iter()
            .take(24)
            .position(|&c| c == b'\n')
            .unwrap_or(rest.len().min(24));
        let got = if rest.is_empty() {
            "end of input".to_string()
        } else if excerpt_len == 0 {
            "end of line".to_string()
        } else {
            text_of(&rest[..excerpt_len])
        };
        IngestError::BadLabel {
            line,
            byte: self.pos,
            expected: expected.to_string(),
            got,
        }
    }

    /// Skip blanks, newlines and comments, collecting comment text.
    fn skip_trivia(&mut self, comments: &mut Vec<String>) {
        loop {
            let skipped = self
                .rest()
                .iter()
                .take_while(|&&c| c.is_ascii_whitespace() || c == 0)
                .count();
            self.pos += skipped;
            match parse_comment(self.rest()) {
                Ok((after, text)) => {
                    comments.push(text_of(text).trim().to_string());
                    self.advance_to(after);
                }
                Err(_) => break,
            }
        }
    }

    /// Skip spaces and comments without crossing a newline.
    fn skip_inline(&mut self, comments: &mut Vec<String>) {
        loop {
            let rest = self.rest();
            let skipped = rest.iter().take_while(|&&c| is_inline_space(c)).count();
            self.pos += skipped;
            match parse_comment(self.rest()) {
                Ok((after, text)) => {
                    comments.push(text_of(text).trim().to_string());
                    self.advance_to(after);
                }
                Err(_) => break,
            }
        }
    }

    /// Consume the end of a statement: trailing blanks and comments then a newline or EOF.
    fn end_of_statement(&mut self, comments: &mut Vec<String>) -> Result<(), IngestError> {
        self.skip_inline(comments);
        match self.peek() {
            None => Ok(()),
            Some(b'\n') => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.error("end of line")),
        }
    }

    fn name(&mut self, expected: &str) -> Result<String, IngestError> {
        match parse_name(self.rest()) {
            Ok((rest, name)) => {
                self.advance_to(rest);
                Ok(text_of(name))
            }
            Err(_) => Err(self.error(expected)),
        }
    }

    fn expect_equals(&mut self) -> Result<(), IngestError> {
        let mut ignored = Vec::new();
        self.skip_inline(&mut ignored);
        if self.peek() == Some(b'=') {
            self.bump();
            Ok(())
        } else {
            Err(self.error("'='"))
        }
    }

    /// Name of an OBJECT or GROUP, bare or quoted.
    fn container_name(&mut self) -> Result<String, IngestError> {
        let mut ignored = Vec::new();
        self.skip_inline(&mut ignored);
        match self.peek() {
            Some(b'"') | Some(b'\'') => self.quoted(),
            _ => self.name("container name"),
        }
    }

    fn quoted(&mut self) -> Result<String, IngestError> {
        let Some(quote) = self.peek() else {
            return Err(self.error("quoted string"));
        };
        let body = &self.rest()[1..];
        match body.iter().position(|&c| c == quote) {
            Some(end) => {
                let text = text_of(&body[..end]);
                self.pos += end + 2;
                Ok(text)
            }
            None => Err(self.error("closing quote")),
        }
    }

    fn units(&mut self) -> Result<Option<String>, IngestError> {
        let mut ignored = Vec::new();
        let save = self.pos;
        self.skip_inline(&mut ignored);
        if self.peek() != Some(b'<') {
            self.pos = save;
            return Ok(None);
        }
        match parse_units(self.rest()) {
            Ok((rest, units)) => {
                self.advance_to(rest);
                Ok(Some(text_of(units).trim().to_string()))
            }
            Err(_) => Err(self.error("'>' closing the units")),
        }
    }

    /// One element: quoted string, nested sequence kept verbatim, or bare token; then units.
    fn element(&mut self) -> Result<PvlValue, IngestError> {
        let (text, style) = match self.peek() {
            Some(b'"') | Some(b'\'') => (self.quoted()?, ValueStyle::Quoted),
            Some(open @ (b'(' | b'{')) => {
                let close = if open == b'(' { b')' } else { b'}' };
                let (_, values) = self.collection(open, close)?;
                let inner = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("{}{inner}{}", open as char, close as char),
                    ValueStyle::Nested,
                )
            }
            _ => match parse_bare(self.rest()) {
                Ok((rest, token)) => {
                    self.advance_to(rest);
                    (text_of(token), ValueStyle::Bare)
                }
                Err(_) => return Err(self.error("value")),
            },
        };
        let units = self.units()?;
        Ok(PvlValue { text, units, style })
    }

    /// Sequence or set; may span lines. Units after the closing bracket apply to every element
    /// that has none of its own.
    fn collection(
        &mut self,
        open: u8,
        close: u8,
    ) -> Result<(Vec<String>, ValueList<PvlValue>), IngestError> {
        debug_assert_eq!(self.peek(), Some(open));
        self.bump();
        let mut comments = Vec::new();
        let mut values = ValueList::new();
        let closing = format!("'{}'", close as char);
        self.skip_trivia(&mut comments);
        if self.peek() == Some(close) {
            self.bump();
        } else {
            loop {
                self.skip_trivia(&mut comments);
                if self.peek().is_none() {
                    return Err(self.error(&closing));
                }
                values.push(self.element()?);
                self.skip_trivia(&mut comments);
                match self.peek() {
                    Some(b',') => self.bump(),
                    Some(c) if c == close => {
                        self.bump();
                        break;
                    }
                    _ => return Err(self.error(&format!("',' or {closing}"))),
                }
            }
        }
        if let Some(units) = self.units()? {
            for value in values.iter_mut().filter(|v| v.units.is_none()) {
                value.units = Some(units.clone());
            }
        }
        Ok((comments, values))
    }

    fn keyword_value(
        &mut self,
        comments: &mut Vec<String>,
    ) -> Result<(ValueForm, ValueList<PvlValue>), IngestError> {
        self.skip_inline(comments);
        match self.peek() {
            None | Some(b'\n') => Err(self.error("value")),
            Some(b'(') => {
                let (inner, values) = self.collection(b'(', b')')?;
                comments.extend(inner);
                Ok((ValueForm::Sequence, values))
            }
            Some(b'{') => {
                let (inner, values) = self.collection(b'{', b'}')?;
                comments.extend(inner);
                Ok((ValueForm::Set, values))
            }
            Some(_) => {
                let mut values = ValueList::new();
                values.push(self.element()?);
                Ok((ValueForm::Scalar, values))
            }
        }
    }

    fn parse(mut self) -> Result<Label, IngestError> {
        let mut stack: Vec<PvlContainer> = vec![PvlContainer::root()];
        let mut pending: Vec<String> = Vec::new();
        let mut end_offset = None;

        loop {
            self.skip_trivia(&mut pending);
            if self.rest().is_empty() {
                if let Some(open) = stack.last().filter(|_| stack.len() > 1) {
                    return Err(self.error(&format!(
                        "{} closing {}",
                        open.kind.end_keyword().to_ascii_uppercase(),
                        open.name
                    )));
                }
                break;
            }

            let name = self.name("keyword name")?;
            let upper = name.to_ascii_uppercase();
            match upper.as_str() {
                "END" => {
                    if stack.len() > 1 {
                        return Err(self.error("END_OBJECT or END_GROUP before END"));
                    }
                    let mut ignored = Vec::new();
                    self.skip_inline(&mut ignored);
                    if let Some(newline) = self.rest().iter().position(|&c| c == b'\n') {
                        self.pos += newline + 1;
                    } else {
                        self.pos = self.src.len();
                    }
                    end_offset = Some(self.pos as u64);
                    break;
                }
                "OBJECT" | "GROUP" | "BEGIN_OBJECT" | "BEGIN_GROUP" => {
                    self.expect_equals()?;
                    let cname = self.container_name()?;
                    let kind = if upper.ends_with("OBJECT") {
                        ContainerKind::Object
                    } else {
                        ContainerKind::Group
                    };
                    let mut container = PvlContainer::new(kind, cname);
                    container.comments = std::mem::take(&mut pending);
                    self.end_of_statement(&mut container.comments)?;
                    stack.push(container);
                }
                "END_OBJECT" | "ENDOBJECT" | "END_GROUP" | "ENDGROUP" => {
                    let kind = if upper.ends_with("OBJECT") {
                        ContainerKind::Object
                    } else {
                        ContainerKind::Group
                    };
                    let mut ignored = Vec::new();
                    self.skip_inline(&mut ignored);
                    let closing_name = if self.peek() == Some(b'=') {
                        self.bump();
                        Some(self.container_name()?)
                    } else {
                        None
                    };
                    if stack.len() < 2 {
                        return Err(self.error("keyword before unmatched end of container"));
                    }
                    let open = stack.last().map(|c| (c.kind, c.name.clone()));
                    if let Some((open_kind, open_name)) = open {
                        let name_matches = closing_name
                            .as_deref()
                            .is_none_or(|n| n.eq_ignore_ascii_case(&open_name));
                        if open_kind != kind || !name_matches {
                            return Err(self.error(&format!(
                                "{} closing {open_name}",
                                open_kind.end_keyword().to_ascii_uppercase()
                            )));
                        }
                    }
                    self.end_of_statement(&mut ignored)?;
                    if let Some(mut done) = stack.pop() {
                        done.end_comments = std::mem::take(&mut pending);
                        if let Some(parent) = stack.last_mut() {
                            parent.entries.push(PvlEntry::Container(done));
                        }
                    }
                }
                _ => {
                    let mut keyword = Keyword::flag(name);
                    keyword.comments = std::mem::take(&mut pending);
                    self.skip_inline(&mut keyword.comments);
                    match self.peek() {
                        Some(b'=') => {
                            self.bump();
                            let (form, values) = self.keyword_value(&mut keyword.comments)?;
                            keyword.form = form;
                            keyword.values = values;
                            self.end_of_statement(&mut keyword.comments)?;
                        }
                        None | Some(b'\n') => self.end_of_statement(&mut keyword.comments)?,
                        Some(_) => return Err(self.error("'='")),
                    }
                    if let Some(current) = stack.last_mut() {
                        current.entries.push(PvlEntry::Keyword(keyword));
                    }
                }
            }
        }

        let mut root = stack.pop().unwrap_or_else(PvlContainer::root);
        root.end_comments = pending;
        Ok(Label { root, end_offset })
    }
}

/// Parse a PVL label from raw bytes.
///
/// Arguments
/// -----------------
/// * `input`: label text, possibly followed by binary data after `END`.
///
/// Return
/// ----------
/// * The parsed [`Label`], with `end_offset` set to the byte just past the `END` line when
///   present, or [`IngestError::BadLabel`].
pub fn parse_label(input: &[u8]) -> Result<Label, IngestError> {
    LabelParser::new(input).parse()
}
