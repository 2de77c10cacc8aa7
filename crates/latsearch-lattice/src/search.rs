// Query scoring against lattices.
//
// For each lattice the searcher runs the transform pipeline once, computes
// its total likelihood L, then for each query restricts the lattice to the
// query by composition and takes the likelihood Q of the result. The score
// is the log-likelihood ratio Q - L (the log posterior of the query).

use latsearch_fst::{ArcSortKey, ScalarWeight, TropicalWeight, VectorFst, compose, likelihood};
use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::SearchError;
use crate::transform::{add_insertion_penalty, convert_lattice, prune_lattice, scale_lattice};
use crate::weight::CompactLattice;

/// Lattice preprocessing and scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchOptions {
    /// Multiplier on acoustic costs.
    pub acoustic_scale: f64,
    /// Multiplier on graph costs.
    pub graph_scale: f64,
    /// Added to the graph cost of every word-emitting arc.
    pub insertion_penalty: f64,
    /// Pruning beam; `+inf` disables pruning.
    pub beam: f64,
    /// Sum over paths (log semiring) instead of taking the best (tropical).
    pub use_log: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            acoustic_scale: 1.0,
            graph_scale: 1.0,
            insertion_penalty: 0.0,
            beam: f64::INFINITY,
            use_log: true,
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.beam.is_nan() || self.beam <= 0.0 {
            return Err(SearchError::InvalidOption(format!(
                "beam must be positive, got {}",
                self.beam
            )));
        }
        for (name, value) in [
            ("acoustic scale", self.acoustic_scale),
            ("graph scale", self.graph_scale),
            ("insertion penalty", self.insertion_penalty),
        ] {
            if !value.is_finite() {
                return Err(SearchError::InvalidOption(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    fn prunes(&self) -> bool {
        self.beam != f64::INFINITY
    }
}

/// A query automaton ready for composition: validated, moved into the
/// scoring semiring, and sorted by input label.
#[derive(Debug, Clone)]
pub struct Query<W> {
    key: Option<String>,
    fst: VectorFst<W>,
}

impl<W: ScalarWeight> Query<W> {
    pub fn new(key: Option<String>, fst: &VectorFst<TropicalWeight>) -> Result<Self, SearchError> {
        fst.validate().map_err(|source| SearchError::MalformedQuery {
            query: key.clone().unwrap_or_else(|| "<query>".to_string()),
            source,
        })?;
        let mut fst = fst.map_weights(|w| w.convert::<W>());
        fst.ensure_arc_sorted(ArcSortKey::Input);
        Ok(Query { key, fst })
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn fst(&self) -> &VectorFst<W> {
        &self.fst
    }
}

/// Score of one query against one lattice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryScore {
    #[serde(rename = "lattice")]
    pub lattice_key: String,
    #[serde(rename = "query", skip_serializing_if = "Option::is_none")]
    pub query_key: Option<String>,
    /// Log-likelihood ratio, `<= 0` unless the lattice has no path.
    pub score: f64,
}

/// All query scores for one lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeScores {
    /// Total log-likelihood of the transformed lattice.
    pub total: f64,
    pub scores: Vec<QueryScore>,
}

/// Runs the lattice pipeline and scores queries in semiring `W`.
///
/// The semiring is fixed per searcher: `LatticeSearcher<LogWeight>` sums over
/// paths, `LatticeSearcher<TropicalWeight>` keeps the best one.
#[derive(Debug, Clone)]
pub struct LatticeSearcher<W> {
    options: SearchOptions,
    _semiring: std::marker::PhantomData<W>,
}

impl<W: ScalarWeight> LatticeSearcher<W> {
    pub fn new(options: SearchOptions) -> Result<Self, SearchError> {
        options.validate()?;
        Ok(LatticeSearcher {
            options,
            _semiring: std::marker::PhantomData,
        })
    }

    /// Rescale, add the insertion penalty, prune, and convert to a scalar
    /// automaton sorted by output label.
    pub fn transform(&self, mut lattice: CompactLattice) -> Result<VectorFst<W>, SearchError> {
        lattice.validate().map_err(SearchError::MalformedLattice)?;
        let opts = &self.options;

        {
            let _span = debug_span!("scale").entered();
            scale_lattice(&mut lattice, opts.graph_scale, opts.acoustic_scale);
        }
        {
            let _span = debug_span!("insertion_penalty").entered();
            add_insertion_penalty(&mut lattice, opts.insertion_penalty);
        }
        if opts.prunes() {
            let _span = debug_span!("prune", beam = opts.beam).entered();
            prune_lattice(&mut lattice, opts.beam);
        }
        let _span = debug_span!("convert", semiring = W::NAME).entered();
        Ok(convert_lattice(&lattice))
    }

    /// Score every query in `queries` against `lattice`.
    pub fn score(
        &self,
        lattice_key: &str,
        lattice: CompactLattice,
        queries: &[Query<W>],
    ) -> Result<LatticeScores, SearchError> {
        let _span = debug_span!("lattice", key = lattice_key).entered();
        let fst = self.transform(lattice)?;
        let total = likelihood(&fst);
        debug!(
            states = fst.num_states(),
            arcs = fst.total_arcs(),
            total,
            "transformed lattice"
        );
        if total == f64::NEG_INFINITY {
            warn!(lattice = lattice_key, "lattice has no successful path, reporting score 0");
        }

        let scores = queries
            .iter()
            .map(|query| QueryScore {
                lattice_key: lattice_key.to_string(),
                query_key: query.key.clone(),
                score: self.score_query(lattice_key, &fst, total, query),
            })
            .collect();
        Ok(LatticeScores { total, scores })
    }

    fn score_query(
        &self,
        lattice_key: &str,
        fst: &VectorFst<W>,
        total: f64,
        query: &Query<W>,
    ) -> f64 {
        let restricted = compose(fst, &query.fst);
        let mut query_likelihood = likelihood(&restricted);
        if query_likelihood > total {
            warn!(
                lattice = lattice_key,
                query = query.key().unwrap_or("<query>"),
                query_likelihood = %format!("{query_likelihood:e}"),
                total = %format!("{total:e}"),
                "query likelihood exceeds lattice likelihood, clamping"
            );
            query_likelihood = total;
        }
        debug!(query = query.key().unwrap_or("<query>"), query_likelihood, "scored query");
        log_likelihood_ratio(query_likelihood, total)
    }
}

/// `query - total`, with the conventions for empty automata: a lattice with
/// no successful path scores `0`, and a query matching no path of a
/// non-empty lattice scores `-inf`.
pub fn log_likelihood_ratio(query: f64, total: f64) -> f64 {
    if total == f64::NEG_INFINITY {
        return 0.0;
    }
    query - total
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::text::parse_compact_lattice;
    use latsearch_fst::text::parse_fst;
    use latsearch_fst::{LogWeight, Semiring};
    use tracing_subscriber::fmt::MakeWriter;

    /// cat (label 1) at total cost 1, dog (label 2) at total cost 2.
    fn cat_dog() -> CompactLattice {
        parse_compact_lattice("0 1 1 0.5,0.5\n0 1 2 1,1\n1\n", 1).unwrap()
    }

    fn scores<W: ScalarWeight>(
        options: SearchOptions,
        lattice: CompactLattice,
        queries: &[(&str, &str)],
    ) -> LatticeScores {
        let searcher = LatticeSearcher::<W>::new(options).unwrap();
        let queries: Vec<Query<W>> = queries
            .iter()
            .map(|(key, text)| {
                Query::new(Some(key.to_string()), &parse_fst(text, 1).unwrap()).unwrap()
            })
            .collect();
        searcher.score("lat1", lattice, &queries).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn tropical_best_path_scores() {
        let result = scores::<TropicalWeight>(
            SearchOptions { use_log: false, ..SearchOptions::default() },
            cat_dog(),
            &[("cat", "0 1 1 1\n1\n"), ("dog", "0 1 2 2\n1\n")],
        );
        assert_eq!(result.total, -1.0);
        assert_eq!(result.scores[0].score, 0.0);
        assert_eq!(result.scores[1].score, -1.0);
        assert_eq!(result.scores[1].query_key.as_deref(), Some("dog"));
        assert_eq!(result.scores[1].lattice_key, "lat1");
    }

    #[test]
    fn log_scores_are_posteriors() {
        let result = scores::<LogWeight>(
            SearchOptions::default(),
            cat_dog(),
            &[("cat", "0 1 1 1\n1\n"), ("dog", "0 1 2 2\n1\n")],
        );
        let total = -1.0 + (1.0 + (-1.0_f64).exp()).ln();
        assert!(close(result.total, total));
        assert!(close(result.total, -0.686738));
        let p_cat = result.scores[0].score.exp();
        let p_dog = result.scores[1].score.exp();
        assert!(close(p_cat + p_dog, 1.0));
        assert!(close(result.scores[0].score, -1.0 - total));
    }

    #[test]
    fn pass_through_query_scores_zero() {
        let result = scores::<LogWeight>(
            SearchOptions::default(),
            cat_dog(),
            &[("any", "0 0 1 1\n0 0 2 2\n0\n")],
        );
        assert!(close(result.scores[0].score, 0.0));
    }

    #[test]
    fn unmatched_query_scores_negative_infinity() {
        let fish = [("fish", "0 1 7 7\n1\n")];
        let result = scores::<LogWeight>(SearchOptions::default(), cat_dog(), &fish);
        assert_eq!(result.scores[0].score, f64::NEG_INFINITY);
    }

    #[test]
    fn beam_prunes_before_scoring() {
        let result = scores::<LogWeight>(
            SearchOptions { beam: 0.5, ..SearchOptions::default() },
            cat_dog(),
            &[("cat", "0 1 1 1\n1\n"), ("dog", "0 1 2 2\n1\n")],
        );
        assert_eq!(result.total, -1.0);
        assert!(close(result.scores[0].score, 0.0));
        assert_eq!(result.scores[1].score, f64::NEG_INFINITY);
    }

    #[test]
    fn default_pipeline_is_identity() {
        let searcher = LatticeSearcher::<TropicalWeight>::new(SearchOptions::default()).unwrap();
        let fst = searcher.transform(cat_dog()).unwrap();
        let mut expected: VectorFst<TropicalWeight> =
            parse_fst("0 1 1 1 1\n0 1 2 2 2\n1\n", 1).unwrap();
        expected.sort_arcs_by_output();
        assert_eq!(fst, expected);
    }

    #[test]
    fn scales_and_penalty_change_total() {
        let opts = SearchOptions {
            acoustic_scale: 2.0,
            graph_scale: 0.5,
            insertion_penalty: 1.0,
            use_log: false,
            ..SearchOptions::default()
        };
        // cat: 0.5*0.5 + 0.5*2 + 1 = 2.25; dog: 1*0.5 + 1*2 + 1 = 3.5.
        let result = scores::<TropicalWeight>(opts, cat_dog(), &[("dog", "0 1 2 2\n1\n")]);
        assert!(close(result.total, -2.25));
        assert!(close(result.scores[0].score, -1.25));
    }

    /// Collects formatted log output for inspection.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn weighted_query_is_clamped() {
        // A query with negative cost makes Q exceed L: Q = 4, L = -1.
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || {
            scores::<TropicalWeight>(
                SearchOptions { use_log: false, ..SearchOptions::default() },
                cat_dog(),
                &[("cheat", "0 1 1 1 -5\n1\n")],
            )
        });
        assert_eq!(result.scores[0].score, 0.0);

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("clamping"), "{logs}");
        assert!(logs.contains("query=cheat"), "{logs}");
        assert!(logs.contains("query_likelihood=4e0"), "{logs}");
        assert!(logs.contains("total=-1e0"), "{logs}");
    }

    #[test]
    fn empty_lattice_scores_zero() {
        let lattice = parse_compact_lattice("0 1 1 0,0\n", 1).unwrap();
        let cat = [("cat", "0 1 1 1\n1\n")];
        let result = scores::<LogWeight>(SearchOptions::default(), lattice, &cat);
        assert_eq!(result.total, f64::NEG_INFINITY);
        assert_eq!(result.scores[0].score, 0.0);
    }

    #[test]
    fn malformed_lattice_is_an_error() {
        let mut lattice = cat_dog();
        lattice.add_arc(1, latsearch_fst::Arc::new(3, 3, crate::CompactLatticeWeight::one(), 9));
        let searcher = LatticeSearcher::<LogWeight>::new(SearchOptions::default()).unwrap();
        let err = searcher.score("bad", lattice, &[]).unwrap_err();
        assert!(matches!(err, SearchError::MalformedLattice(_)));
    }

    #[test]
    fn malformed_query_is_an_error() {
        let mut fst: VectorFst<TropicalWeight> = parse_fst("0 1 1 1\n1\n", 1).unwrap();
        fst.add_arc(0, latsearch_fst::Arc::new(2, 2, TropicalWeight::new(0.0), 5));
        let err = Query::<LogWeight>::new(Some("q".into()), &fst).unwrap_err();
        assert!(matches!(err, SearchError::MalformedQuery { ref query, .. } if query == "q"));
    }

    #[test]
    fn query_is_sorted_on_input() {
        let fst: VectorFst<TropicalWeight> = parse_fst("0 1 5 5\n0 1 2 2\n1\n", 1).unwrap();
        let q = Query::<LogWeight>::new(None, &fst).unwrap();
        assert!(q.fst().is_arc_sorted(ArcSortKey::Input));
        assert_eq!(q.key(), None);
    }

    #[test]
    fn options_reject_bad_beam() {
        for beam in [0.0, -1.0, f64::NAN] {
            let opts = SearchOptions { beam, ..SearchOptions::default() };
            assert!(matches!(opts.validate(), Err(SearchError::InvalidOption(_))));
        }
        assert!(SearchOptions::default().validate().is_ok());
    }

    #[test]
    fn ratio_conventions() {
        assert_eq!(log_likelihood_ratio(f64::NEG_INFINITY, f64::NEG_INFINITY), 0.0);
        assert_eq!(log_likelihood_ratio(f64::NEG_INFINITY, -3.0), f64::NEG_INFINITY);
        assert_eq!(log_likelihood_ratio(-4.0, -3.0), -1.0);
    }

    #[test]
    fn scores_serialize_without_missing_query_key() {
        let score = QueryScore { lattice_key: "utt1".into(), query_key: None, score: -0.5 };
        assert_eq!(serde_json::to_string(&score).unwrap(), r#"{"lattice":"utt1","score":-0.5}"#);
        let score = QueryScore {
            lattice_key: "utt1".into(),
            query_key: Some("q".into()),
            score: f64::NEG_INFINITY,
        };
        assert_eq!(
            serde_json::to_string(&score).unwrap(),
            r#"{"lattice":"utt1","query":"q","score":null}"#
        );
    }
}
