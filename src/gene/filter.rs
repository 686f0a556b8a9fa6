//! Boolean filter queries over named transcript predicates, e.g.
//! `HAS_ORF and not (NMD or FRAGMENT)`.

use super::{NoveltyClass, Transcript};
use crate::utils::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, verify},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};
use std::collections::{BTreeMap, BTreeSet};

/// Downstream A content above which a mono-exonic transcript is considered
/// internally primed.
pub const INTERNAL_PRIMING_A_CONTENT: f64 = 0.5;
/// Minimal direct repeat at a noncanonical junction to flag template switching.
pub const MIN_TEMPLATE_SWITCH_REPEAT: usize = 4;

const KEYWORDS: [&str; 3] = ["and", "or", "not"];

/// Parsed filter query, with predicate names still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Name(String),
    Not(Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(kw), not(satisfy(is_name_char)))
}

fn name(input: &str) -> IResult<&str, FilterExpr> {
    map(
        verify(take_while1(is_name_char), |s: &str| !KEYWORDS.contains(&s)),
        |s: &str| FilterExpr::Name(s.to_string()),
    )
    .parse(input)
}

fn factor(input: &str) -> IResult<&str, FilterExpr> {
    alt((
        map(preceded(ws(keyword("not")), factor), |e| FilterExpr::Not(Box::new(e))),
        delimited(ws(char('(')), expr, ws(char(')'))),
        ws(name),
    ))
    .parse(input)
}

fn term(input: &str) -> IResult<&str, FilterExpr> {
    map(separated_list1(keyword("and"), factor), |mut factors| {
        if factors.len() == 1 {
            factors.remove(0)
        } else {
            FilterExpr::And(factors)
        }
    })
    .parse(input)
}

fn expr(input: &str) -> IResult<&str, FilterExpr> {
    map(separated_list1(keyword("or"), term), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::Or(terms)
        }
    })
    .parse(input)
}

impl FilterExpr {
    pub fn parse(query: &str) -> Result<Self> {
        all_consuming(expr)
            .parse(query)
            .map(|(_, parsed)| parsed)
            .map_err(|e| Error::Config(format!("Invalid filter query '{}': {}", query, e)))
    }

    /// Predicate names used by the query.
    pub fn names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            FilterExpr::Name(name) => {
                names.insert(name.as_str());
            }
            FilterExpr::Not(inner) => inner.collect_names(names),
            FilterExpr::And(items) | FilterExpr::Or(items) => {
                items.iter().for_each(|item| item.collect_names(names))
            }
        }
    }
}

pub type Predicate = fn(&Transcript) -> bool;

#[derive(Debug, Clone)]
enum Compiled {
    Predicate(Predicate),
    Not(Box<Compiled>),
    And(Vec<Compiled>),
    Or(Vec<Compiled>),
}

impl Compiled {
    fn eval(&self, transcript: &Transcript) -> bool {
        match self {
            Compiled::Predicate(predicate) => predicate(transcript),
            Compiled::Not(inner) => !inner.eval(transcript),
            Compiled::And(items) => items.iter().all(|item| item.eval(transcript)),
            Compiled::Or(items) => items.iter().any(|item| item.eval(transcript)),
        }
    }
}

/// Filter query with all names resolved against a registry.
#[derive(Debug, Clone)]
pub struct TranscriptFilter {
    query: String,
    compiled: Compiled,
}

impl TranscriptFilter {
    pub fn matches(&self, transcript: &Transcript) -> bool {
        self.compiled.eval(transcript)
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Named transcript predicates available to filter queries.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    predicates: BTreeMap<String, Predicate>,
}

fn is_fragment(t: &Transcript) -> bool {
    t.fragments.as_ref().is_some_and(|f| !f.is_empty())
}

fn has_noncanonical_splicing(t: &Transcript) -> bool {
    t.noncanonical_splicing.as_ref().is_some_and(|n| !n.is_empty())
}

fn is_monoexon(t: &Transcript) -> bool {
    t.is_monoexon()
}

fn is_internally_primed(t: &Transcript) -> bool {
    t.is_monoexon()
        && t
            .downstream_a_content
            .is_some_and(|a| a > INTERNAL_PRIMING_A_CONTENT)
}

fn is_novel(t: &Transcript) -> bool {
    t.annotation
        .as_ref()
        .map_or(true, |a| a.class != NoveltyClass::Fsm)
}

fn has_orf(t: &Transcript) -> bool {
    t.orf.is_some()
}

fn is_nmd(t: &Transcript) -> bool {
    t.orf.as_ref().is_some_and(|orf| orf.info.nmd)
}

fn is_template_switching(t: &Transcript) -> bool {
    let (Some(noncanonical), Some(repeats)) = (&t.noncanonical_splicing, &t.direct_repeat_len) else {
        return false;
    };
    noncanonical.iter().any(|(intron, _)| {
        repeats
            .get(*intron)
            .is_some_and(|&len| len >= MIN_TEMPLATE_SWITCH_REPEAT)
    })
}

fn has_cds(t: &Transcript) -> bool {
    t.cds.is_some()
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predicates for long-read transcripts.
    pub fn transcript_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("FRAGMENT", is_fragment);
        registry.insert("NONCANONICAL_SPLICING", has_noncanonical_splicing);
        registry.insert("MONOEXON", is_monoexon);
        registry.insert("INTERNAL_PRIMING", is_internally_primed);
        registry.insert("NOVEL", is_novel);
        registry.insert("HAS_ORF", has_orf);
        registry.insert("NMD", is_nmd);
        registry.insert("TEMPLATE_SWITCHING", is_template_switching);
        registry
    }

    /// Predicates for reference transcripts.
    pub fn reference_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("HAS_CDS", has_cds);
        registry.insert("MONOEXON", is_monoexon);
        registry
    }

    pub fn insert(&mut self, name: &str, predicate: Predicate) {
        self.predicates.insert(name.to_string(), predicate);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(|name| name.as_str())
    }

    fn resolve(&self, expr: &FilterExpr) -> Compiled {
        match expr {
            FilterExpr::Name(name) => Compiled::Predicate(self.predicates[name.as_str()]),
            FilterExpr::Not(inner) => Compiled::Not(Box::new(self.resolve(inner))),
            FilterExpr::And(items) => Compiled::And(items.iter().map(|i| self.resolve(i)).collect()),
            FilterExpr::Or(items) => Compiled::Or(items.iter().map(|i| self.resolve(i)).collect()),
        }
    }

    /// Parses `query` and resolves its names. Unknown names are a
    /// configuration error.
    pub fn compile(&self, query: &str) -> Result<TranscriptFilter> {
        let expr = FilterExpr::parse(query)?;
        let unknown: Vec<&str> = expr
            .names()
            .into_iter()
            .filter(|name| !self.predicates.contains_key(*name))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::Config(format!(
                "Unknown filter rules: {}. Valid rules are: {}",
                unknown.join(", "),
                self.names().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(TranscriptFilter {
            query: query.to_string(),
            compiled: self.resolve(&expr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{Orf, OrfInfo};
    use crate::utils::Interval;

    fn name(n: &str) -> FilterExpr {
        FilterExpr::Name(n.to_string())
    }

    #[test]
    fn precedence_of_boolean_operators() {
        let parsed = FilterExpr::parse("A or B and not C").unwrap();
        assert_eq!(
            parsed,
            FilterExpr::Or(vec![
                name("A"),
                FilterExpr::And(vec![name("B"), FilterExpr::Not(Box::new(name("C")))]),
            ])
        );
        let parsed = FilterExpr::parse(" (A or B)and C ").unwrap();
        assert_eq!(
            parsed,
            FilterExpr::And(vec![FilterExpr::Or(vec![name("A"), name("B")]), name("C")])
        );
    }

    #[test]
    fn names_starting_with_keywords() {
        assert_eq!(FilterExpr::parse("NOVEL").unwrap(), name("NOVEL"));
        assert_eq!(FilterExpr::parse("notable").unwrap(), name("notable"));
        assert_eq!(
            FilterExpr::parse("not order").unwrap(),
            FilterExpr::Not(Box::new(name("order")))
        );
    }

    #[test]
    fn malformed_queries_are_rejected() {
        for query in ["", "A and", "(A or B", "A B", "and"] {
            assert!(
                matches!(FilterExpr::parse(query), Err(Error::Config(_))),
                "{}",
                query
            );
        }
    }

    #[test]
    fn unknown_rules_are_config_errors() {
        let registry = FilterRegistry::transcript_defaults();
        match registry.compile("HAS_ORF and UNKNOWN_RULE") {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("UNKNOWN_RULE"));
                assert!(msg.contains("HAS_ORF"));
            }
            _ => panic!("expected a configuration error"),
        }
        assert!(FilterRegistry::reference_defaults().compile("HAS_ORF").is_err());
    }

    #[test]
    fn compiled_filter_evaluates_predicates() {
        let registry = FilterRegistry::transcript_defaults();
        let filter = registry.compile("HAS_ORF and not NMD").unwrap();
        let mut transcript = Transcript::new("t1", vec![Interval::new(0, 100).unwrap()]);
        assert!(!filter.matches(&transcript));

        let orf = Orf {
            start: 10,
            end: 40,
            info: OrfInfo {
                five_utr_len: 10,
                cds_len: 30,
                three_utr_len: 60,
                start_codon: "ATG".to_string(),
                stop_codon: "TAA".to_string(),
                nmd: false,
                upstream_start_codons: 0,
                kozak: None,
                hexamer: None,
                fickett: None,
                ref_ids: Vec::new(),
            },
        };
        transcript.orf = Some(orf);
        assert!(filter.matches(&transcript));
        assert_eq!(filter.query(), "HAS_ORF and not NMD");

        transcript.downstream_a_content = Some(0.8);
        assert!(registry.compile("INTERNAL_PRIMING").unwrap().matches(&transcript));
        assert!(registry.compile("NOVEL").unwrap().matches(&transcript));
    }

    #[test]
    fn template_switching_needs_a_repeat_at_a_noncanonical_junction() {
        let mut transcript = Transcript::new(
            "t1",
            vec![Interval::new(0, 10).unwrap(), Interval::new(20, 30).unwrap()],
        );
        transcript.noncanonical_splicing = Some(vec![(0, "GCAG".to_string())]);
        transcript.direct_repeat_len = Some(vec![2]);
        assert!(!is_template_switching(&transcript));
        transcript.direct_repeat_len = Some(vec![7]);
        assert!(is_template_switching(&transcript));
    }
}
