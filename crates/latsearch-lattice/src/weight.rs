// Two-stream lattice weights.
//
// A lattice arc carries a graph cost (language model, pronunciation and
// transition probabilities baked into the decoding graph) and an acoustic
// cost, kept apart so they can be rescaled independently. The compact form
// additionally carries the string of frame-level ids aligned to the arc.

use std::cmp::Ordering;
use std::fmt;

use latsearch_fst::{FstError, Semiring, VectorFst};
use latsearch_fst::text::{parse_cost, parse_token};

/// `(graph, acoustic)` cost pair. Zero is `(+inf, +inf)`, one is `(0, 0)`.
///
/// `plus` keeps the alternative with the lower total cost; ties go to the
/// lower graph cost, so the choice is deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeWeight {
    pub graph: f64,
    pub acoustic: f64,
}

impl LatticeWeight {
    #[inline]
    pub const fn new(graph: f64, acoustic: f64) -> Self {
        LatticeWeight { graph, acoustic }
    }

    /// Rank two weights: `Less` means `self` is the better (cheaper) one.
    pub fn compare(&self, other: &Self) -> Ordering {
        let (a, b) = (self.cost(), other.cost());
        a.total_cmp(&b)
            .then_with(|| self.graph.total_cmp(&other.graph))
    }

    /// Multiply graph and acoustic costs independently. Zero stays zero, so
    /// a zero scale never turns `inf` into NaN.
    pub fn scale(self, graph_scale: f64, acoustic_scale: f64) -> Self {
        if self.is_zero() {
            return self;
        }
        LatticeWeight::new(self.graph * graph_scale, self.acoustic * acoustic_scale)
    }
}

impl Semiring for LatticeWeight {
    const NAME: &'static str = "lattice";

    #[inline]
    fn zero() -> Self {
        LatticeWeight::new(f64::INFINITY, f64::INFINITY)
    }

    #[inline]
    fn one() -> Self {
        LatticeWeight::new(0.0, 0.0)
    }

    fn plus(&self, other: &Self) -> Self {
        if self.compare(other) != Ordering::Greater {
            *self
        } else {
            *other
        }
    }

    fn times(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        LatticeWeight::new(self.graph + other.graph, self.acoustic + other.acoustic)
    }

    #[inline]
    fn cost(&self) -> f64 {
        self.graph + self.acoustic
    }
}

impl fmt::Display for LatticeWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.graph, self.acoustic)
    }
}

/// A [`LatticeWeight`] together with the id string aligned to the arc.
///
/// `times` concatenates strings; `plus` keeps the better weight, and among
/// equal weights the shorter (then lexicographically smaller) string.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactLatticeWeight {
    pub weight: LatticeWeight,
    pub string: Vec<u32>,
}

impl CompactLatticeWeight {
    pub fn new(weight: LatticeWeight, string: Vec<u32>) -> Self {
        CompactLatticeWeight { weight, string }
    }

    /// Weight with an empty string.
    pub fn from_costs(graph: f64, acoustic: f64) -> Self {
        CompactLatticeWeight::new(LatticeWeight::new(graph, acoustic), Vec::new())
    }

    /// Parse the `graph,acoustic[,id_id_...]` text form.
    pub fn parse(token: &str, line: usize) -> Result<Self, FstError> {
        let mut parts = token.split(',');
        let (Some(graph), Some(acoustic)) = (parts.next(), parts.next()) else {
            return Err(FstError::Parse {
                line,
                message: format!(
                    "invalid lattice weight {token:?}: expected graph,acoustic[,string]"
                ),
            });
        };
        let weight = LatticeWeight::new(
            parse_cost(graph, line, "graph cost")?,
            parse_cost(acoustic, line, "acoustic cost")?,
        );
        let string = match parts.next() {
            Some("") | None => Vec::new(),
            Some(ids) => ids
                .split('_')
                .map(|id| parse_token(id, line, "string id"))
                .collect::<Result<_, _>>()?,
        };
        if parts.next().is_some() {
            return Err(FstError::Parse {
                line,
                message: format!("invalid lattice weight {token:?}: too many fields"),
            });
        }
        Ok(CompactLatticeWeight::new(weight, string))
    }
}

impl Semiring for CompactLatticeWeight {
    const NAME: &'static str = "compact-lattice";

    fn zero() -> Self {
        CompactLatticeWeight::new(LatticeWeight::zero(), Vec::new())
    }

    fn one() -> Self {
        CompactLatticeWeight::new(LatticeWeight::one(), Vec::new())
    }

    fn plus(&self, other: &Self) -> Self {
        let order = self.weight.compare(&other.weight).then_with(|| {
            self.string
                .len()
                .cmp(&other.string.len())
                .then_with(|| self.string.cmp(&other.string))
        });
        if order != Ordering::Greater {
            self.clone()
        } else {
            other.clone()
        }
    }

    fn times(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut string = Vec::with_capacity(self.string.len() + other.string.len());
        string.extend_from_slice(&self.string);
        string.extend_from_slice(&other.string);
        CompactLatticeWeight::new(self.weight.times(&other.weight), string)
    }

    #[inline]
    fn cost(&self) -> f64 {
        self.weight.cost()
    }
}

impl fmt::Display for CompactLatticeWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.weight)?;
        for (i, id) in self.string.iter().enumerate() {
            if i > 0 {
                f.write_str("_")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Word lattice in compact form: `ilabel == olabel == word`, with the
/// two-stream weight and id string on every arc.
pub type CompactLattice = VectorFst<CompactLatticeWeight>;
