use crate::engine::{DeriveMetrics, Engine};
use crate::term::Term;
use std::time::Duration;

/// Options that bound a derivation.
///
/// Everything is unbounded by default. Hitting a bound is not an error: the
/// derivation stops, logs a warning and sets [`DeriveMetrics::truncated`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Maximum number of states popped from the stack.
    pub max_steps: Option<usize>,
    /// Maximum number of states waiting on the stack; extra branches are dropped.
    pub max_frontier: Option<usize>,
    /// Stop after this many distinct forms.
    pub max_results: Option<usize>,
}

impl Options {
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = Some(max);
        self
    }

    pub fn with_max_frontier(mut self, max: usize) -> Self {
        self.max_frontier = Some(max);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// Result from [`derive`] and [`derive_with`].
#[derive(Debug, Clone)]
pub struct DeriveResult {
    /// Distinct terminal forms, in discovery order.
    pub forms: Vec<String>,
    /// Total elapsed time spent deriving.
    pub elapsed: Duration,
    pub metrics: DeriveMetrics,
}

/// One `(rule, position)` application in a form's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub rule: String,
    pub index: usize,
}

/// A terminal form together with how it was reached.
#[derive(Debug, Clone)]
pub struct Form {
    pub text: String,
    /// Surface text of each term of the terminal state.
    pub terms: Vec<String>,
    /// Applications from first to last, including declined and blocking rules.
    pub history: Vec<Step>,
}

/// Result from [`derive_verbose_with`].
#[derive(Debug, Clone)]
pub struct DeriveResultVerbose {
    pub forms: Vec<Form>,
    pub elapsed: Duration,
    pub metrics: DeriveMetrics,
}

/// Derive every form of `terms` with default [`Options`].
///
/// # Example
/// ```
/// use prakriya::{Engine, Filter, Operator, Rule, Term, derive};
///
/// let guna = Rule::new("7.3.84", vec![], Some(Filter::last("u")), vec![], Operator::set_last("guna", "o")).unwrap();
/// let engine = Engine::from_rules(vec![guna]).unwrap();
///
/// let out = derive(&engine, vec![Term::new("Bu")]);
/// assert_eq!(out.forms, vec!["Bo".to_string()]);
/// ```
pub fn derive(engine: &Engine, terms: Vec<Term>) -> DeriveResult {
    derive_with(engine, terms, &Options::default())
}

/// Derive every form of `terms`, bounded by `options`.
pub fn derive_with(engine: &Engine, terms: Vec<Term>, options: &Options) -> DeriveResult {
    let mut run = engine.derive_with_options(terms, options);
    let forms: Vec<String> = run.by_ref().collect();
    let metrics = run.metrics().clone();

    DeriveResult { forms, elapsed: metrics.elapsed, metrics }
}

/// Like [`derive_with`], but keeps each form's terms and application history.
///
/// This is meant for debugging rule tables; the plain path does not build
/// these traces.
pub fn derive_verbose_with(engine: &Engine, terms: Vec<Term>, options: &Options) -> DeriveResultVerbose {
    let mut run = engine.derive_with_options(terms, options);
    let mut forms = Vec::new();
    while let Some(state) = run.next_state() {
        let history = state
            .history()
            .entries()
            .into_iter()
            .map(|(rule, index)| Step { rule: rule.to_string(), index })
            .collect();
        forms.push(Form {
            text: state.render(),
            terms: state.iter().map(|t| t.text().to_string()).collect(),
            history,
        });
    }
    let metrics = run.metrics().clone();

    DeriveResultVerbose { forms, elapsed: metrics.elapsed, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::operator::Operator;
    use crate::rule::Rule;

    fn engine() -> Engine {
        let a =
            Rule::new("1.1.1", vec![], Some(Filter::value(["a"])), vec![], Operator::set_value("to_b", "b")).unwrap();
        let b = Rule::new("1.1.2", vec![], Some(Filter::value(["b"])), vec![], Operator::set_value("to_c", "c"))
            .unwrap()
            .optional();
        Engine::from_rules(vec![a, b]).unwrap()
    }

    #[test]
    fn derive_with_collects_forms_and_metrics() {
        let res = derive_with(&engine(), vec![Term::new("a")], &Options::default());
        assert_eq!(res.forms, vec!["c".to_string(), "b".to_string()]);
        assert_eq!(res.metrics.forms, 2);
        assert_eq!(res.elapsed, res.metrics.elapsed);
        assert!(!res.metrics.truncated);
    }

    #[test]
    fn max_results_stops_early() {
        let res = derive_with(&engine(), vec![Term::new("a")], &Options::default().with_max_results(1));
        assert_eq!(res.forms, vec!["c".to_string()]);
        assert!(res.metrics.truncated);
    }

    #[test]
    fn verbose_includes_history() {
        let res = derive_verbose_with(&engine(), vec![Term::new("a")], &Options::default());
        assert_eq!(res.forms.len(), 2);
        let first = &res.forms[0];
        assert_eq!(first.text, "c");
        assert_eq!(first.terms, vec!["c".to_string()]);
        assert_eq!(
            first.history,
            vec![Step { rule: "1.1.1".into(), index: 0 }, Step { rule: "1.1.2".into(), index: 0 }]
        );
    }
}
