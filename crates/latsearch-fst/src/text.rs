// AT&T / OpenFst text format for scalar-weighted automata.
//
// One line per arc or final state:
//
//   src dst ilabel olabel [weight]    transducer arc
//   src dst label                     acceptor arc (ilabel = olabel)
//   state [weight]                    final state
//
// The source state of the first line is the start state. Missing weights are
// `one()`. Blank lines are ignored. Labels are numeric; no symbol tables.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::semiring::ScalarWeight;
#[cfg(test)]
use crate::semiring::Semiring;
use crate::vector::{Arc, StateId, VectorFst};
use crate::FstError;

/// Parse one whitespace-separated token, naming it in the error.
pub fn parse_token<T: FromStr>(token: &str, line: usize, what: &str) -> Result<T, FstError> {
    token.parse().map_err(|_| FstError::Parse {
        line,
        message: format!("invalid {what} {token:?}"),
    })
}

/// Largest distance a state id may reach past the states seen so far.
/// Ids are expected to be dense; a larger jump is rejected rather than
/// allocating every state in between.
pub const MAX_STATE_GAP: usize = 1 << 16;

/// Parse a state id for an automaton that currently has `num_states` states.
pub fn parse_state(token: &str, line: usize, num_states: usize) -> Result<StateId, FstError> {
    let state: StateId = parse_token(token, line, "state")?;
    if state as usize >= num_states + MAX_STATE_GAP {
        return Err(FstError::Parse {
            line,
            message: format!("state id {state} too far past the {num_states} states seen so far"),
        });
    }
    Ok(state)
}

/// Parse a cost. `inf` is allowed and means zero; NaN and `-inf` are not
/// weights of either semiring.
pub fn parse_cost(token: &str, line: usize, what: &str) -> Result<f64, FstError> {
    let cost: f64 = parse_token(token, line, what)?;
    if cost.is_nan() || cost == f64::NEG_INFINITY {
        return Err(FstError::Parse {
            line,
            message: format!("invalid {what} {token:?}"),
        });
    }
    Ok(cost)
}

/// Parse an automaton from text. `first_line` is the line number of the first
/// line of `text` in its enclosing file, used in error messages.
pub fn parse_fst<W: ScalarWeight>(
    text: &str,
    first_line: usize,
) -> Result<VectorFst<W>, FstError> {
    parse_fst_lines(text.lines(), first_line)
}

/// [`parse_fst`] over pre-split lines.
pub fn parse_fst_lines<'a, W, I>(lines: I, first_line: usize) -> Result<VectorFst<W>, FstError>
where
    W: ScalarWeight,
    I: IntoIterator<Item = &'a str>,
{
    let mut fst = VectorFst::new();
    for (offset, raw) in lines.into_iter().enumerate() {
        let line = first_line + offset;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        let src = parse_state(fields[0], line, fst.num_states())?;
        fst.ensure_state(src);
        if fst.start().is_none() {
            fst.set_start(src);
        }

        match fields.len() {
            1 | 2 => {
                let weight = match fields.get(1) {
                    Some(tok) => W::from_cost(parse_cost(tok, line, "weight")?),
                    None => W::one(),
                };
                fst.set_final(src, weight);
            }
            3..=5 => {
                let dst = parse_state(fields[1], line, fst.num_states())?;
                let ilabel = parse_token(fields[2], line, "label")?;
                let olabel = match fields.get(3) {
                    Some(tok) => parse_token(tok, line, "label")?,
                    None => ilabel,
                };
                let weight = match fields.get(4) {
                    Some(tok) => W::from_cost(parse_cost(tok, line, "weight")?),
                    None => W::one(),
                };
                fst.ensure_state(dst);
                fst.add_arc(src, Arc::new(ilabel, olabel, weight, dst));
            }
            n => {
                return Err(FstError::Parse {
                    line,
                    message: format!("expected 1 to 5 fields, got {n}"),
                });
            }
        }
    }
    Ok(fst)
}

/// Render an automaton in transducer text format, start state first.
///
/// `one()` weights are omitted, so the output reads back to the same
/// automaton via [`parse_fst`].
pub fn write_fst<W: ScalarWeight>(fst: &VectorFst<W>) -> String {
    let mut out = String::new();
    let Some(start) = fst.start() else {
        return out;
    };
    let order = std::iter::once(start).chain(fst.states().filter(|&s| s != start));
    for s in order {
        for arc in fst.arcs(s) {
            let _ = write!(out, "{}\t{}\t{}\t{}", s, arc.nextstate, arc.ilabel, arc.olabel);
            if arc.weight != W::one() {
                let _ = write!(out, "\t{}", arc.weight.cost());
            }
            out.push('\n');
        }
        if fst.is_final(s) {
            let w = fst.final_weight(s);
            if *w == W::one() {
                let _ = writeln!(out, "{s}");
            } else {
                let _ = writeln!(out, "{}\t{}", s, w.cost());
            }
        }
    }
    out
}
