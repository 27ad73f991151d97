//! RDF-style statement model.
//!
//! Delta files describe graph mutations as ordered change-sets of
//! statements. A statement is a `(subject, predicate, object)` triple where
//! the object is either a named node or a literal with an optional datatype
//! or language tag.
//!
//! Statements implement `Hash`/`Eq` so stores can apply set semantics:
//! re-applying the same change-set converges to the same graph content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An RDF term in object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Term {
    /// A named node (IRI).
    NamedNode {
        /// The IRI value.
        value: String,
    },
    /// A literal value with optional datatype or language tag.
    Literal {
        /// The lexical form of the literal.
        value: String,
        /// Datatype IRI, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        /// Language tag, if any. Mutually exclusive with `datatype`.
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Term {
    /// Creates a named-node term.
    #[must_use]
    pub fn named_node(value: impl Into<String>) -> Self {
        Self::NamedNode {
            value: value.into(),
        }
    }

    /// Creates a plain literal term.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Creates a typed literal term.
    #[must_use]
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Creates a language-tagged literal term.
    #[must_use]
    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Returns the lexical value of the term.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::NamedNode { value } | Self::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for Term {
    /// Renders the term in N-Triples syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedNode { value } => write!(f, "<{value}>"),
            Self::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", escape_literal(value))?;
                if let Some(language) = language {
                    write!(f, "@{language}")
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{datatype}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Escapes a literal lexical form for N-Triples / SPARQL embedding.
fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A single `(subject, predicate, object)` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    /// Subject IRI.
    pub subject: String,
    /// Predicate IRI.
    pub predicate: String,
    /// Object term.
    pub object: Term,
}

impl Statement {
    /// Creates a new statement.
    #[must_use]
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

impl fmt::Display for Statement {
    /// Renders the statement as an N-Triples line (without trailing newline).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}> <{}> {} .",
            self.subject, self.predicate, self.object
        )
    }
}

/// One atomic unit of change within a delta file.
///
/// Deletions are applied before insertions, and change-sets are never
/// reordered or merged: a change-set that removes and re-adds statements for
/// the same subject converges to the re-added state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Statements to remove, in arrival order.
    pub deletions: Vec<Statement>,
    /// Statements to add, in arrival order.
    pub insertions: Vec<Statement>,
}

impl ChangeSet {
    /// Creates a change-set from deletion and insertion lists.
    #[must_use]
    pub fn new(deletions: Vec<Statement>, insertions: Vec<Statement>) -> Self {
        Self {
            deletions,
            insertions,
        }
    }

    /// Returns true if the change-set carries no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty()
    }

    /// Returns the total number of statements in the change-set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletions.len() + self.insertions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_node_renders_angle_brackets() {
        let term = Term::named_node("http://example.org/o1");
        assert_eq!(term.to_string(), "<http://example.org/o1>");
    }

    #[test]
    fn plain_literal_renders_quoted() {
        let term = Term::literal("hello");
        assert_eq!(term.to_string(), "\"hello\"");
    }

    #[test]
    fn typed_literal_renders_datatype() {
        let term = Term::typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer");
        assert_eq!(
            term.to_string(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn lang_literal_renders_tag() {
        let term = Term::lang_literal("bonjour", "fr");
        assert_eq!(term.to_string(), "\"bonjour\"@fr");
    }

    #[test]
    fn literal_escaping_covers_control_characters() {
        let term = Term::literal("line1\nline2\t\"quoted\" \\slash");
        assert_eq!(
            term.to_string(),
            "\"line1\\nline2\\t\\\"quoted\\\" \\\\slash\""
        );
    }

    #[test]
    fn statement_renders_ntriples_line() {
        let statement = Statement::new(
            "http://example.org/s1",
            "http://example.org/p1",
            Term::named_node("http://example.org/o1"),
        );
        assert_eq!(
            statement.to_string(),
            "<http://example.org/s1> <http://example.org/p1> <http://example.org/o1> ."
        );
    }

    #[test]
    fn change_set_len_counts_both_sides() {
        let s = Statement::new("s", "p", Term::literal("o"));
        let change_set = ChangeSet::new(vec![s.clone()], vec![s.clone(), s]);
        assert_eq!(change_set.len(), 3);
        assert!(!change_set.is_empty());
    }

    #[test]
    fn identical_statements_are_equal() {
        let a = Statement::new("s", "p", Term::typed_literal("1", "xsd:int"));
        let b = Statement::new("s", "p", Term::typed_literal("1", "xsd:int"));
        assert_eq!(a, b);
    }
}
