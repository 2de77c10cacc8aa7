// Semiring weights: the trait shared by every automaton algorithm, plus the
// tropical (min, +) and log (-log-sum-exp, +) instantiations.

use std::cmp::Ordering;
use std::fmt;

/// A semiring `(K, plus, times, zero, one)` over costs (lower is better).
///
/// Laws every implementation must satisfy:
/// - `plus` is commutative and associative with identity `zero()`
/// - `times` is associative with identity `one()`
/// - `times` distributes over `plus`
/// - `zero()` annihilates `times`
///
/// None of the operations may produce NaN when an operand is `zero()`.
pub trait Semiring: Clone + fmt::Debug + PartialEq {
    /// Short name used in log output (`"tropical"`, `"log"`, ...).
    const NAME: &'static str;

    /// Additive identity: the weight of "no path".
    fn zero() -> Self;
    /// Multiplicative identity: the weight of the empty path.
    fn one() -> Self;
    /// Combine two alternative paths.
    fn plus(&self, other: &Self) -> Self;
    /// Extend a path by another segment.
    fn times(&self, other: &Self) -> Self;
    /// Scalar cost of the weight. `+inf` for `zero()`.
    fn cost(&self) -> f64;

    #[inline]
    fn is_zero(&self) -> bool {
        self.cost() == f64::INFINITY
    }

    /// Equality up to `delta` in cost space, used as a convergence test.
    fn approx_eq(&self, other: &Self, delta: f64) -> bool {
        let (a, b) = (self.cost(), other.cost());
        if a == b {
            return true;
        }
        (a - b).abs() <= delta
    }
}

/// A semiring whose elements are a single scalar cost.
///
/// The tropical and log semirings share the same carrier set, so a weight can
/// be moved between them without changing its value; only `plus` differs.
pub trait ScalarWeight: Semiring + Copy {
    fn from_cost(cost: f64) -> Self;

    /// Reinterpret the cost in another scalar semiring.
    #[inline]
    fn convert<T: ScalarWeight>(self) -> T {
        T::from_cost(self.cost())
    }
}

/// Tropical semiring weight: `(R ∪ {+inf}, min, +, +inf, 0)`.
///
/// `plus` keeps the cheaper alternative, so a total weight is the cost of the
/// single best path (Viterbi scoring).
#[derive(Clone, Copy)]
pub struct TropicalWeight(pub f64);

impl TropicalWeight {
    #[inline]
    pub const fn new(value: f64) -> Self {
        TropicalWeight(value)
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Semiring for TropicalWeight {
    const NAME: &'static str = "tropical";

    #[inline]
    fn zero() -> Self {
        TropicalWeight(f64::INFINITY)
    }

    #[inline]
    fn one() -> Self {
        TropicalWeight(0.0)
    }

    #[inline]
    fn plus(&self, other: &Self) -> Self {
        TropicalWeight(self.0.min(other.0))
    }

    #[inline]
    fn times(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        TropicalWeight(self.0 + other.0)
    }

    #[inline]
    fn cost(&self) -> f64 {
        self.0
    }
}

impl ScalarWeight for TropicalWeight {
    #[inline]
    fn from_cost(cost: f64) -> Self {
        TropicalWeight(cost)
    }
}

/// Log semiring weight: `(R ∪ {+inf}, -log(e^-a + e^-b), +, +inf, 0)`.
///
/// Values are negative log probabilities, so `plus` adds the probability mass
/// of alternative paths (forward scoring). Unlike the tropical semiring,
/// `plus` is not idempotent: `a ⊕ a = a - ln 2`.
#[derive(Clone, Copy)]
pub struct LogWeight(pub f64);

impl LogWeight {
    #[inline]
    pub const fn new(value: f64) -> Self {
        LogWeight(value)
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// Numerically stable `-ln(exp(-a) + exp(-b))`.
///
/// Factors out the smaller cost: `min - ln(1 + exp(-(max - min)))`.
#[inline]
fn log_plus(a: f64, b: f64) -> f64 {
    if a == f64::INFINITY {
        return b;
    }
    if b == f64::INFINITY {
        return a;
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return lo;
    }
    lo - (-(hi - lo)).exp().ln_1p()
}

impl Semiring for LogWeight {
    const NAME: &'static str = "log";

    #[inline]
    fn zero() -> Self {
        LogWeight(f64::INFINITY)
    }

    #[inline]
    fn one() -> Self {
        LogWeight(0.0)
    }

    #[inline]
    fn plus(&self, other: &Self) -> Self {
        LogWeight(log_plus(self.0, other.0))
    }

    #[inline]
    fn times(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        LogWeight(self.0 + other.0)
    }

    #[inline]
    fn cost(&self) -> f64 {
        self.0
    }
}

impl ScalarWeight for LogWeight {
    #[inline]
    fn from_cost(cost: f64) -> Self {
        LogWeight(cost)
    }
}

macro_rules! scalar_weight_traits {
    ($ty:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        // total_cmp keeps Eq/Ord lawful even for NaN payloads
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.0.total_cmp(&other.0) == Ordering::Equal
            }
        }

        impl Eq for $ty {}

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.total_cmp(&other.0)
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                <$ty as Semiring>::one()
            }
        }
    };
}

scalar_weight_traits!(TropicalWeight);
scalar_weight_traits!(LogWeight);
