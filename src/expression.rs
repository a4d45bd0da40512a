//! Boolean key expressions and their reduction
//!
//! A [`BooleanKeyExpression`] is a conjunction of [`KeyClause`]s, one per
//! attribute in the data policy. Each clause lists the KAS URIs granted to the
//! attribute's values and carries the attribute rule as its operator.
//! [`BooleanKeyExpression::reduce`] normalizes it into a [`ReducedExpression`]:
//! a conjunction of sorted, duplicate-free [`Disjunction`]s, each of which
//! becomes one key share in the split plan.

use crate::policy::AttributeRule;
use std::fmt;

/// Rendering of the placeholder for grantless terms
pub const DEFAULT_TERM: &str = "DEFAULT";

/// Operator joining the KAS terms of one clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseOperator {
    AllOf,
    AnyOf,
    Hierarchy,
    /// Reduced like `AllOf`
    Unspecified,
}

impl From<AttributeRule> for ClauseOperator {
    fn from(rule: AttributeRule) -> Self {
        match rule {
            AttributeRule::AllOf => ClauseOperator::AllOf,
            AttributeRule::AnyOf => ClauseOperator::AnyOf,
            AttributeRule::Hierarchy => ClauseOperator::Hierarchy,
            AttributeRule::Unspecified => ClauseOperator::Unspecified,
        }
    }
}

impl ClauseOperator {
    fn symbol(&self) -> &'static str {
        match self {
            ClauseOperator::AnyOf => "⋁",
            _ => "⋀",
        }
    }
}

/// One leaf of a key clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KasTerm {
    /// No grant is known for the term; the default KAS list applies
    Default,
    Kas(String),
}

impl KasTerm {
    pub fn kas_uri(&self) -> Option<&str> {
        match self {
            KasTerm::Default => None,
            KasTerm::Kas(uri) => Some(uri),
        }
    }
}

impl fmt::Display for KasTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KasTerm::Default => write!(f, "[{DEFAULT_TERM}]"),
            KasTerm::Kas(uri) => f.write_str(uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyClause {
    pub operator: ClauseOperator,
    pub terms: Vec<KasTerm>,
}

impl fmt::Display for KeyClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.as_slice() {
            [KasTerm::Default] => write!(f, "[{DEFAULT_TERM}]"),
            [only] => write!(f, "({only})"),
            terms => {
                f.write_str("(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(self.operator.symbol())?;
                    }
                    write!(f, "{term}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Conjunction of key clauses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BooleanKeyExpression {
    pub clauses: Vec<KeyClause>,
}

impl BooleanKeyExpression {
    pub fn new(clauses: Vec<KeyClause>) -> Self {
        Self { clauses }
    }

    /// Total number of terms across all clauses
    pub fn len(&self) -> usize {
        self.clauses.iter().map(|c| c.terms.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reduce to an irredundant conjunction of disjunctions.
    ///
    /// `anyOf` clauses become one disjunction of their KAS URIs. Every other
    /// operator contributes each KAS as its own singleton disjunction.
    /// `DEFAULT` terms are dropped, and a disjunction equal to one already in
    /// the conjunction is not added again.
    pub fn reduce(&self) -> ReducedExpression {
        let mut conjunction: Vec<Disjunction> = Vec::new();
        let mut push = |d: Disjunction| {
            if !d.is_empty() && !conjunction.contains(&d) {
                conjunction.push(d);
            }
        };
        for clause in &self.clauses {
            match clause.operator {
                ClauseOperator::AnyOf => push(Disjunction::from_terms(&clause.terms)),
                ClauseOperator::AllOf | ClauseOperator::Hierarchy | ClauseOperator::Unspecified => {
                    for term in &clause.terms {
                        push(Disjunction::from_terms(std::slice::from_ref(term)));
                    }
                }
            }
        }
        ReducedExpression { disjunctions: conjunction }
    }
}

impl fmt::Display for BooleanKeyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// Sorted, duplicate-free list of KAS URIs, any one of which can unwrap
/// the share.
///
/// Ordering compares element-wise from the first KAS, then by length.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Disjunction(Vec<String>);

impl Disjunction {
    pub fn from_terms(terms: &[KasTerm]) -> Self {
        let mut kases: Vec<String> = terms
            .iter()
            .filter_map(KasTerm::kas_uri)
            .map(str::to_string)
            .collect();
        kases.sort();
        kases.dedup();
        Self(kases)
    }

    pub fn kases(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Disjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(ClauseOperator::AnyOf.symbol()))
    }
}

/// Conjunction of disjunctions produced by [`BooleanKeyExpression::reduce`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReducedExpression {
    disjunctions: Vec<Disjunction>,
}

impl ReducedExpression {
    pub fn disjunctions(&self) -> &[Disjunction] {
        &self.disjunctions
    }

    /// Total number of KAS entries across all disjunctions
    pub fn len(&self) -> usize {
        self.disjunctions.iter().map(Disjunction::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.disjunctions.is_empty()
    }
}

impl fmt::Display for ReducedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.disjunctions.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}
