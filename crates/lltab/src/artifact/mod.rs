//! # Binary Artifact
//!
//! The serialized product of a build, loaded by the generic runtime. An
//! artifact has three concatenated segments:
//!
//! 1. **Matcher list** - a count-prefixed sequence; each matcher is a
//!    type tag (0 = literal, 1 = regex, 2 = regex-exclude), its source
//!    string, and for tag 2 a count-prefixed list of excluded ids.
//! 2. **Start symbol** - one serialized symbol.
//! 3. **Parse table** - per nonterminal, an inner map of lookahead
//!    symbol to right-hand side.
//!
//! ## Framing
//!
//! Two byte values are reserved: `EOS` (-2, end of segment/collection)
//! and `SPLIT` (-3, element separator). Every sequence or map element is
//! preceded by `SPLIT` and every collection is closed by `EOS`, so the
//! decoder only ever inspects sentinel bytes at element boundaries.
//! Strings are raw bytes closed by `EOS` and must not contain either
//! sentinel; integers are fixed-width little-endian u64; symbols are a
//! tag byte (0 = terminal, 1 = nonterminal, 2 = end) followed by a u64
//! payload for tags 0 and 1.
//!
//! Rows and cells are written in sorted id order, so equal tables encode
//! to identical bytes.
//!
//! Nonterminal names are a build-time artifact of their own: they are
//! not serialized, but kept on the in-memory [`Artifact`] for header
//! generation and diagnostics.

use crate::error::ArtifactError;
use crate::grammar::{Symbol, SymbolSeq, Terminal};
use crate::intern::{Name, NameTable};
use crate::table::LlTable;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// End-of-segment sentinel (`-2` as a byte).
pub const EOS: u8 = 0xFE;
/// Element separator sentinel (`-3` as a byte).
pub const SPLIT: u8 = 0xFD;

const TAG_LITERAL: u8 = 0;
const TAG_REGEX: u8 = 1;
const TAG_REGEX_EXCLUDE: u8 = 2;

const TAG_TERMINAL: u8 = 0;
const TAG_NON_TERMINAL: u8 = 1;
const TAG_END: u8 = 2;

/// A build product: matcher list, parse table, and (build-side only)
/// the nonterminal names behind the table's dense ids.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub matchers: Vec<Terminal>,
    pub table: LlTable<usize>,
    /// Nonterminal names by id. Populated by [`Artifact::from_build`];
    /// empty on a decoded artifact.
    pub non_terminal_names: Vec<CompactString>,
}

impl Artifact {
    /// Map a built table onto dense nonterminal ids and package it with
    /// its matcher list.
    #[must_use]
    pub fn from_build(table: &LlTable<Name>, matchers: &[Terminal], names: &NameTable) -> Self {
        // Dense ids in interning order: deterministic for a given
        // grammar and factory.
        let mut seen: Vec<Name> = Vec::new();
        let mut collect = |name: Name, seen: &mut Vec<Name>| {
            if !seen.contains(&name) {
                seen.push(name);
            }
        };
        collect(table.start(), &mut seen);
        for (&left, row) in table.rows() {
            collect(left, &mut seen);
            for (lookahead, right) in row {
                if let Symbol::NonTerminal(name) = lookahead {
                    collect(*name, &mut seen);
                }
                for symbol in right {
                    if let Symbol::NonTerminal(name) = symbol {
                        collect(*name, &mut seen);
                    }
                }
            }
        }
        seen.sort_by_key(|name| name.index());

        let id_of: HashMap<Name, usize> =
            seen.iter().enumerate().map(|(id, &name)| (name, id)).collect();
        let map_symbol = |symbol: &Symbol<Name>| -> Symbol<usize> {
            match symbol {
                Symbol::Terminal(id) => Symbol::Terminal(*id),
                Symbol::NonTerminal(name) => Symbol::NonTerminal(id_of[name]),
                Symbol::End => Symbol::End,
            }
        };

        let mut mapped = LlTable::new(id_of[&table.start()]);
        for (&left, row) in table.rows() {
            for (lookahead, right) in row {
                mapped.insert(
                    id_of[&left],
                    map_symbol(lookahead),
                    right.iter().map(&map_symbol).collect(),
                );
            }
        }

        Self {
            matchers: matchers.to_vec(),
            table: mapped,
            non_terminal_names: seen
                .iter()
                .map(|&name| CompactString::from(names.resolve(name)))
                .collect(),
        }
    }

    /// Serialize to the three-segment binary layout.
    pub fn encode(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut out = Vec::new();

        // Segment 1: matcher list.
        write_u64(&mut out, self.matchers.len() as u64);
        for matcher in &self.matchers {
            out.push(SPLIT);
            match matcher {
                Terminal::Literal(text) => {
                    out.push(TAG_LITERAL);
                    write_str(&mut out, text)?;
                }
                Terminal::Regex(pattern) => {
                    out.push(TAG_REGEX);
                    write_str(&mut out, pattern)?;
                }
                Terminal::RegexExclude { pattern, excludes } => {
                    out.push(TAG_REGEX_EXCLUDE);
                    write_str(&mut out, pattern)?;
                    write_u64(&mut out, excludes.len() as u64);
                    for &id in excludes {
                        out.push(SPLIT);
                        write_u64(&mut out, id as u64);
                    }
                    out.push(EOS);
                }
            }
        }
        out.push(EOS);

        // Segment 2: start symbol.
        write_symbol(&mut out, &Symbol::NonTerminal(self.table.start()));
        out.push(EOS);

        // Segment 3: parse table, rows and cells in sorted order.
        let mut rows: Vec<(usize, Vec<(Symbol<usize>, &SymbolSeq<usize>)>)> = self
            .table
            .rows()
            .map(|(&left, row)| {
                let mut cells: Vec<(Symbol<usize>, &SymbolSeq<usize>)> =
                    row.iter().map(|(&symbol, right)| (symbol, right)).collect();
                cells.sort_by_key(|(symbol, _)| *symbol);
                (left, cells)
            })
            .collect();
        rows.sort_by_key(|(left, _)| *left);

        for (left, cells) in rows {
            out.push(SPLIT);
            write_u64(&mut out, left as u64);
            for (lookahead, right) in cells {
                out.push(SPLIT);
                write_symbol(&mut out, &lookahead);
                write_u64(&mut out, right.len() as u64);
                for symbol in right {
                    out.push(SPLIT);
                    write_symbol(&mut out, symbol);
                }
                out.push(EOS);
            }
            out.push(EOS);
        }
        out.push(EOS);

        Ok(out)
    }

    /// Decode the three-segment layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let mut cursor = Cursor { bytes, pos: 0 };

        // Segment 1: matcher list.
        let count = cursor.read_u64()? as usize;
        let mut matchers = Vec::with_capacity(count);
        while cursor.peek()? != EOS {
            cursor.expect(SPLIT)?;
            let tag = cursor.next()?;
            let matcher = match tag {
                TAG_LITERAL => Terminal::Literal(cursor.read_str()?),
                TAG_REGEX => Terminal::Regex(cursor.read_str()?),
                TAG_REGEX_EXCLUDE => {
                    let pattern = cursor.read_str()?;
                    let _len = cursor.read_u64()?;
                    let mut excludes = SmallVec::new();
                    while cursor.peek()? != EOS {
                        cursor.expect(SPLIT)?;
                        excludes.push(cursor.read_u64()? as usize);
                    }
                    cursor.next()?;
                    Terminal::RegexExclude { pattern, excludes }
                }
                tag => {
                    return Err(ArtifactError::UnknownTag {
                        tag,
                        pos: cursor.pos - 1,
                    })
                }
            };
            matchers.push(matcher);
        }
        cursor.next()?;

        // Segment 2: start symbol.
        let start = match cursor.read_symbol()? {
            Symbol::NonTerminal(id) => id,
            _ => {
                return Err(ArtifactError::UnknownTag {
                    tag: TAG_END,
                    pos: cursor.pos,
                })
            }
        };
        cursor.expect(EOS)?;

        // Segment 3: parse table.
        let mut table = LlTable::new(start);
        while cursor.peek()? != EOS {
            cursor.expect(SPLIT)?;
            let left = cursor.read_u64()? as usize;
            while cursor.peek()? != EOS {
                cursor.expect(SPLIT)?;
                let lookahead = cursor.read_symbol()?;
                let len = cursor.read_u64()? as usize;
                let mut right = SymbolSeq::with_capacity(len);
                while cursor.peek()? != EOS {
                    cursor.expect(SPLIT)?;
                    right.push(cursor.read_symbol()?);
                }
                cursor.next()?;
                table.insert(left, lookahead, right);
            }
            cursor.next()?;
        }
        cursor.next()?;

        Ok(Self {
            matchers,
            table,
            non_terminal_names: Vec::new(),
        })
    }
}

fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_str(out: &mut Vec<u8>, text: &str) -> Result<(), ArtifactError> {
    if text.bytes().any(|b| b == EOS || b == SPLIT) {
        return Err(ArtifactError::ReservedByte {
            text: text.to_string(),
        });
    }
    out.extend_from_slice(text.as_bytes());
    out.push(EOS);
    Ok(())
}

fn write_symbol(out: &mut Vec<u8>, symbol: &Symbol<usize>) {
    match symbol {
        Symbol::Terminal(id) => {
            out.push(TAG_TERMINAL);
            write_u64(out, *id as u64);
        }
        Symbol::NonTerminal(id) => {
            out.push(TAG_NON_TERMINAL);
            write_u64(out, *id as u64);
        }
        Symbol::End => out.push(TAG_END),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Result<u8, ArtifactError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(ArtifactError::Truncated { pos: self.pos })
    }

    fn next(&mut self) -> Result<u8, ArtifactError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, sentinel: u8) -> Result<(), ArtifactError> {
        if self.next()? == sentinel {
            Ok(())
        } else {
            Err(ArtifactError::MissingSentinel { pos: self.pos - 1 })
        }
    }

    fn read_u64(&mut self) -> Result<u64, ArtifactError> {
        let end = self.pos + 8;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(ArtifactError::Truncated { pos: self.pos })?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(slice);
        self.pos = end;
        Ok(u64::from_le_bytes(raw))
    }

    fn read_str(&mut self) -> Result<CompactString, ArtifactError> {
        let start = self.pos;
        while self.peek()? != EOS {
            self.pos += 1;
        }
        let text = CompactString::from(String::from_utf8_lossy(&self.bytes[start..self.pos]));
        self.pos += 1;
        Ok(text)
    }

    fn read_symbol(&mut self) -> Result<Symbol<usize>, ArtifactError> {
        match self.next()? {
            TAG_TERMINAL => Ok(Symbol::Terminal(self.read_u64()? as usize)),
            TAG_NON_TERMINAL => Ok(Symbol::NonTerminal(self.read_u64()? as usize)),
            TAG_END => Ok(Symbol::End),
            tag => Err(ArtifactError::UnknownTag {
                tag,
                pos: self.pos - 1,
            }),
        }
    }
}
