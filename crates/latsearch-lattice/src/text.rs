// Compact lattice text format.
//
//   src dst word graph,acoustic[,id_id_...]    arc
//   src dst word                               arc with weight one
//   state graph,acoustic[,id_id_...]           final state
//   state                                      final state with weight one
//
// The first source state is the start state; blank lines are ignored.

use std::fmt::Write as _;

use latsearch_fst::text::{parse_state, parse_token};
use latsearch_fst::{Arc, FstError, Label, Semiring};

use crate::weight::{CompactLattice, CompactLatticeWeight};

pub fn parse_compact_lattice(
    text: &str,
    first_line: usize,
) -> Result<CompactLattice, FstError> {
    parse_compact_lattice_lines(text.lines(), first_line)
}

/// [`parse_compact_lattice`] over pre-split lines, as read from an archive.
pub fn parse_compact_lattice_lines<'a, I>(
    lines: I,
    first_line: usize,
) -> Result<CompactLattice, FstError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut lat = CompactLattice::new();
    for (offset, raw) in lines.into_iter().enumerate() {
        let line = first_line + offset;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        let src = parse_state(fields[0], line, lat.num_states())?;
        lat.ensure_state(src);
        if lat.start().is_none() {
            lat.set_start(src);
        }

        match fields.len() {
            1 => lat.set_final(src, CompactLatticeWeight::one()),
            2 => lat.set_final(src, CompactLatticeWeight::parse(fields[1], line)?),
            3 | 4 => {
                let dst = parse_state(fields[1], line, lat.num_states())?;
                let word: Label = parse_token(fields[2], line, "word")?;
                let weight = match fields.get(3) {
                    Some(tok) => CompactLatticeWeight::parse(tok, line)?,
                    None => CompactLatticeWeight::one(),
                };
                lat.ensure_state(dst);
                lat.add_arc(src, Arc::new(word, word, weight, dst));
            }
            n => {
                return Err(FstError::Parse {
                    line,
                    message: format!("expected 1 to 4 fields in a compact lattice line, got {n}"),
                });
            }
        }
    }
    Ok(lat)
}

/// Render a compact lattice, start state first, every weight written out.
pub fn write_compact_lattice(lat: &CompactLattice) -> String {
    let mut out = String::new();
    let Some(start) = lat.start() else {
        return out;
    };
    let order = std::iter::once(start).chain(lat.states().filter(|&s| s != start));
    for s in order {
        for arc in lat.arcs(s) {
            let _ = writeln!(out, "{}\t{}\t{}\t{}", s, arc.nextstate, arc.olabel, arc.weight);
        }
        if lat.is_final(s) {
            let _ = writeln!(out, "{}\t{}", s, lat.final_weight(s));
        }
    }
    out
}
