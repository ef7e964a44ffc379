//! Specification matching and test-result evaluation
//!
//! Everything here is a pure function of its inputs. A result is compared
//! against the first specification sharing its name: numeric standards are a
//! closed interval test on the parsed value, textual standards a
//! case-insensitive equality. Units are carried for display only.
use chrono::Utc;

use super::types::TimeStamp;

/// How a specification judges a result.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Criterion {
    #[n(0)]
    Range {
        #[n(0)]
        lower: f64,
        #[n(1)]
        upper: f64,
    },
    #[n(1)]
    Expected {
        #[n(0)]
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStandard {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub criterion: Criterion,
    #[n(2)]
    pub unit: String,
    #[n(3)]
    pub mandatory: bool,
}

impl TestStandard {
    pub fn numeric(name: &str, lower: f64, upper: f64, unit: &str, mandatory: bool) -> Self {
        Self {
            name: name.to_string(),
            criterion: Criterion::Range { lower, upper },
            unit: unit.to_string(),
            mandatory,
        }
    }
    pub fn textual(name: &str, expected: &str, unit: &str, mandatory: bool) -> Self {
        Self {
            name: name.to_string(),
            criterion: Criterion::Expected {
                value: expected.to_string(),
            },
            unit: unit.to_string(),
            mandatory,
        }
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self.criterion, Criterion::Range { .. })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    #[n(0)]
    Passed,
    #[n(1)]
    Failed,
    #[n(2)]
    InfoNoStandard,
}

/// An evaluated entry of a passport's quality history.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[n(0)]
    pub standard_name: String,
    #[n(1)]
    pub result: String,
    #[n(2)]
    pub unit: String,
    #[n(3)]
    pub recording_org: String,
    #[n(4)]
    pub recording_site: String,
    #[n(5)]
    pub timestamp: TimeStamp<Utc>,
    #[n(6)]
    pub evaluation_outcome: Outcome,
    #[n(7)]
    pub evaluation_comment: String,
}

/// What evaluating one result against a specification list produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub comment: String,
    /// Set when a specification matched and it is mandatory.
    pub mandatory: bool,
}

pub fn find_standard<'a>(name: &str, specifications: &'a [TestStandard]) -> Option<&'a TestStandard> {
    specifications.iter().find(|spec| spec.name == name)
}

/// Parses a raw result as a finite number. NaN and infinities are not numeric.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn evaluate(standard_name: &str, result: &str, specifications: &[TestStandard]) -> Evaluation {
    let Some(standard) = find_standard(standard_name, specifications) else {
        return Evaluation {
            outcome: Outcome::InfoNoStandard,
            comment: format!("No specification named '{standard_name}' on this passport"),
            mandatory: false,
        };
    };

    let (outcome, comment) = match &standard.criterion {
        Criterion::Range { lower, upper } => match parse_numeric(result) {
            None => (
                Outcome::Failed,
                format!("Result '{result}' is not numeric"),
            ),
            Some(value) if value < *lower || value > *upper => (
                Outcome::Failed,
                format!("Value {value} outside [{lower}, {upper}] {}", standard.unit),
            ),
            Some(value) => (
                Outcome::Passed,
                format!("Value {value} within [{lower}, {upper}] {}", standard.unit),
            ),
        },
        Criterion::Expected { value } => {
            if result.to_lowercase() == value.to_lowercase() {
                (Outcome::Passed, format!("Matches expected '{value}'"))
            } else {
                (
                    Outcome::Failed,
                    format!("Expected '{value}', got '{result}'"),
                )
            }
        }
    };

    tracing::debug!(
        standard = standard_name,
        result,
        outcome = ?outcome,
        "evaluated test result"
    );

    Evaluation {
        outcome,
        comment: comment.trim_end().to_string(),
        mandatory: standard.mandatory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<TestStandard> {
        vec![
            TestStandard::numeric("Tensile", 10.0, 15.0, "MPa", true),
            TestStandard::textual("Visual", "OK", "", false),
        ]
    }

    #[test]
    fn numeric_inside_range_passes() {
        let eval = evaluate("Tensile", "12.3", &specs());
        assert_eq!(eval.outcome, Outcome::Passed);
        assert!(eval.mandatory);
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        assert_eq!(evaluate("Tensile", "10.0", &specs()).outcome, Outcome::Passed);
        assert_eq!(evaluate("Tensile", "15", &specs()).outcome, Outcome::Passed);
        assert_eq!(evaluate("Tensile", "15.0001", &specs()).outcome, Outcome::Failed);
    }

    #[test]
    fn numeric_below_range_fails() {
        let eval = evaluate("Tensile", "9.99", &specs());
        assert_eq!(eval.outcome, Outcome::Failed);
        assert!(eval.comment.contains("outside"));
    }

    #[test]
    fn non_numeric_result_fails() {
        let eval = evaluate("Tensile", "abc", &specs());
        assert_eq!(eval.outcome, Outcome::Failed);
        assert!(eval.comment.contains("not numeric"));
    }

    #[test]
    fn nan_counts_as_not_numeric() {
        let eval = evaluate("Tensile", "NaN", &specs());
        assert_eq!(eval.outcome, Outcome::Failed);
        assert!(eval.comment.contains("not numeric"));
    }

    #[test]
    fn string_match_is_case_insensitive() {
        assert_eq!(evaluate("Visual", "ok", &specs()).outcome, Outcome::Passed);

        let eval = evaluate("Visual", "NOT_OK", &specs());
        assert_eq!(eval.outcome, Outcome::Failed);
        assert!(eval.comment.contains("'OK'"));
        assert!(eval.comment.contains("'NOT_OK'"));
    }

    #[test]
    fn unknown_standard_is_informational() {
        let eval = evaluate("Humidity", "42", &specs());
        assert_eq!(eval.outcome, Outcome::InfoNoStandard);
        assert!(eval.comment.contains("Humidity"));
        assert!(!eval.mandatory);
    }

    #[test]
    fn first_matching_standard_wins() {
        let specs = vec![
            TestStandard::numeric("Tensile", 10.0, 15.0, "MPa", true),
            TestStandard::numeric("Tensile", 0.0, 1.0, "MPa", false),
        ];
        assert_eq!(evaluate("Tensile", "12", &specs).outcome, Outcome::Passed);
    }
}
