//! Survey Rules
//!
//! Compiles declarative "if the answer is X then skip to Y" descriptors into
//! [`CompiledRule`]s. A rule only ever tests the recorded answer of the step
//! that owns it.
//!
//! Defaulting is deterministic:
//! - operator: explicit, else `eq` when an expected answer is given, else `de`
//! - result identifier: rule, else the owning group
//! - skip identifier: rule, else the owning group, else [`NULL_STEP_IDENTIFIER`]

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::answer::AnswerValue;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::item_type::FormSubtype;
use crate::result::{QuestionResult, StepResult};

/// Reserved skip target meaning "no special jump, continue normally".
pub const NULL_STEP_IDENTIFIER: &str = "survey-flow.step.null";

/// Rule operators with their configuration tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "de", alias = "skip")]
    Skip,
    #[serde(rename = "eq", alias = "equal")]
    Equal,
    #[serde(rename = "ne", alias = "notEqual")]
    NotEqual,
    #[serde(rename = "lt", alias = "lessThan")]
    LessThan,
    #[serde(rename = "gt", alias = "greaterThan")]
    GreaterThan,
    #[serde(rename = "le", alias = "lessThanEqual")]
    LessThanEqual,
    #[serde(rename = "ge", alias = "greaterThanEqual")]
    GreaterThanEqual,
    #[serde(rename = "ot", alias = "otherThan")]
    OtherThan,
}

impl RuleOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "de",
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::LessThan => "lt",
            Self::GreaterThan => "gt",
            Self::LessThanEqual => "le",
            Self::GreaterThanEqual => "ge",
            Self::OtherThan => "ot",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::GreaterThan | Self::LessThanEqual | Self::GreaterThanEqual
        )
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule as written in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_subtype: Option<FormSubtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_identifier: Option<String>,
    #[serde(
        default,
        rename = "value",
        alias = "expectedAnswer",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_answer: Option<AnswerValue>,
    #[serde(
        default,
        rename = "operator",
        alias = "ruleOperator",
        skip_serializing_if = "Option::is_none"
    )]
    pub operator: Option<RuleOperator>,
}

impl RuleDescriptor {
    /// Skip-to rule matching `value`, with every other field defaulted.
    pub fn skip_when(value: impl Into<AnswerValue>, skip_identifier: impl Into<String>) -> Self {
        Self {
            expected_answer: Some(value.into()),
            skip_identifier: Some(skip_identifier.into()),
            ..Self::default()
        }
    }
}

/// One configured rule. Entries that do not parse as a rule descriptor are
/// kept so the group compiler can report them without losing the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Rule(RuleDescriptor),
    Malformed(serde_json::Value),
}

impl From<RuleDescriptor> for RuleEntry {
    fn from(descriptor: RuleDescriptor) -> Self {
        RuleEntry::Rule(descriptor)
    }
}

/// Identifiers inherited from the step that owns a group of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleGroupDefaults {
    pub result_identifier: Option<String>,
    pub skip_identifier: Option<String>,
}

/// Configuration errors raised while compiling a rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("operator '{0}' requires an expected answer")]
    MissingExpectedAnswer(RuleOperator),

    #[error("operator '{0}' requires a form subtype")]
    MissingFormSubtype(RuleOperator),

    #[error("rule has no result identifier and the group provides none")]
    MissingResultIdentifier,

    #[error("operator '{operator}' is not supported for {subtype} answers")]
    UnsupportedOperator {
        operator: RuleOperator,
        subtype: FormSubtype,
    },

    #[error("unrecognized rule: {0}")]
    MalformedRule(String),
}

impl RuleError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            RuleError::MissingExpectedAnswer(_) => DiagnosticCode::MissingExpectedAnswer,
            RuleError::MissingFormSubtype(_) => DiagnosticCode::MissingFormSubtype,
            RuleError::MissingResultIdentifier => DiagnosticCode::MissingResultIdentifier,
            RuleError::UnsupportedOperator { .. } => DiagnosticCode::UnsupportedOperator,
            RuleError::MalformedRule(_) => DiagnosticCode::MalformedRule,
        }
    }
}

/// Predicate over a single recorded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum RuleExpression {
    /// Answer is absent
    Skip,
    Equal(AnswerValue),
    NotEqual(AnswerValue),
    /// Choice answers: value is not one of the selected choices
    NotMember(AnswerValue),
    LessThan(AnswerValue),
    LessEqual(AnswerValue),
    GreaterThan(AnswerValue),
    GreaterEqual(AnswerValue),
}

impl RuleExpression {
    /// Evaluate against a recorded answer. An absent answer satisfies `Skip`,
    /// `NotEqual` and `NotMember` only.
    pub fn evaluate(&self, answer: Option<&AnswerValue>) -> bool {
        match (self, answer) {
            (RuleExpression::Skip, answer) => answer.is_none(),
            (RuleExpression::NotEqual(_), None) | (RuleExpression::NotMember(_), None) => true,
            (_, None) => false,
            (RuleExpression::Equal(v), Some(a)) => a == v,
            (RuleExpression::NotEqual(v), Some(a)) => a != v,
            (RuleExpression::NotMember(v), Some(a)) => !a.contains(v),
            (RuleExpression::LessThan(v), Some(a)) => a < v,
            (RuleExpression::LessEqual(v), Some(a)) => a <= v,
            (RuleExpression::GreaterThan(v), Some(a)) => a > v,
            (RuleExpression::GreaterEqual(v), Some(a)) => a >= v,
        }
    }
}

/// A rule ready for evaluation during navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub result_identifier: String,
    pub skip_identifier: String,
    pub expression: RuleExpression,
}

impl CompiledRule {
    /// Evaluate against the owning step's recorded result.
    pub fn evaluate(&self, step_result: Option<&StepResult>) -> bool {
        let answer = step_result
            .and_then(|r| r.result(&self.result_identifier))
            .and_then(QuestionResult::answer_value);
        self.expression.evaluate(answer)
    }

    /// Whether the skip target is the "continue normally" sentinel.
    pub fn targets_null_step(&self) -> bool {
        self.skip_identifier == NULL_STEP_IDENTIFIER
    }
}

/// Compile a single rule descriptor.
pub fn compile_rule(
    descriptor: &RuleDescriptor,
    subtype: Option<FormSubtype>,
    defaults: &RuleGroupDefaults,
) -> Result<CompiledRule, RuleError> {
    let value = descriptor.expected_answer.clone();
    let operator = descriptor.operator.unwrap_or(if value.is_some() {
        RuleOperator::Equal
    } else {
        RuleOperator::Skip
    });

    let expression = match (operator, value) {
        (RuleOperator::Skip, _) => RuleExpression::Skip,
        (op, None) => return Err(RuleError::MissingExpectedAnswer(op)),
        (op, Some(value)) => {
            let subtype = descriptor
                .form_subtype
                .or(subtype)
                .ok_or(RuleError::MissingFormSubtype(op))?;
            build_expression(op, value, subtype)?
        }
    };

    let result_identifier = descriptor
        .result_identifier
        .clone()
        .or_else(|| defaults.result_identifier.clone())
        .ok_or(RuleError::MissingResultIdentifier)?;

    let skip_identifier = descriptor
        .skip_identifier
        .clone()
        .or_else(|| defaults.skip_identifier.clone())
        .unwrap_or_else(|| NULL_STEP_IDENTIFIER.to_string());

    Ok(CompiledRule {
        result_identifier,
        skip_identifier,
        expression,
    })
}

fn build_expression(
    operator: RuleOperator,
    value: AnswerValue,
    subtype: FormSubtype,
) -> Result<RuleExpression, RuleError> {
    let is_choice = subtype.is_choice();
    if is_choice && operator.is_ordering() {
        return Err(RuleError::UnsupportedOperator { operator, subtype });
    }

    // Choice answers are recorded as a list of selected values
    let compared = if is_choice { value.clone().into_list() } else { value.clone() };

    Ok(match operator {
        RuleOperator::Skip => RuleExpression::Skip,
        RuleOperator::Equal => RuleExpression::Equal(compared),
        RuleOperator::NotEqual => RuleExpression::NotEqual(compared),
        RuleOperator::OtherThan if is_choice => RuleExpression::NotMember(value),
        RuleOperator::OtherThan => RuleExpression::NotEqual(value),
        RuleOperator::LessThan => RuleExpression::LessThan(value),
        RuleOperator::LessThanEqual => RuleExpression::LessEqual(value),
        RuleOperator::GreaterThan => RuleExpression::GreaterThan(value),
        RuleOperator::GreaterThanEqual => RuleExpression::GreaterEqual(value),
    })
}

/// Compile every rule of a group. Rules that fail to parse or compile are
/// reported to `diagnostics` and dropped; an empty result means the group has
/// no rules.
pub fn compile_rule_group(
    rules: &[RuleEntry],
    subtype: Option<FormSubtype>,
    defaults: &RuleGroupDefaults,
    diagnostics: &mut Diagnostics,
) -> Vec<CompiledRule> {
    rules
        .iter()
        .map(|entry| match entry {
            RuleEntry::Rule(rule) => compile_rule(rule, subtype, defaults),
            RuleEntry::Malformed(value) => Err(RuleError::MalformedRule(value.to_string())),
        })
        .filter_map(|compiled| match compiled {
            Ok(compiled) => Some(compiled),
            Err(err) => {
                let mut diagnostic = Diagnostic::warning(err.code(), err.to_string());
                if let Some(id) = &defaults.result_identifier {
                    diagnostic = diagnostic.for_step(id.clone());
                }
                diagnostics.push(diagnostic);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(id: &str) -> RuleGroupDefaults {
        RuleGroupDefaults {
            result_identifier: Some(id.to_string()),
            skip_identifier: None,
        }
    }

    fn answered(id: &str, answer: Option<AnswerValue>) -> StepResult {
        StepResult::new(id, vec![QuestionResult::answer(id, answer)])
    }

    #[test]
    fn test_equal_on_single_choice_wraps_value() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::Equal),
            expected_answer: Some(AnswerValue::Bool(true)),
            ..Default::default()
        };
        let rule = compile_rule(&descriptor, Some(FormSubtype::SingleChoice), &defaults("q1"))
            .unwrap();

        assert!(rule.evaluate(Some(&answered("q1", Some(vec![true].into())))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(vec![false].into())))));
        assert!(!rule.evaluate(Some(&answered("q1", None))));
        assert!(!rule.evaluate(None));
    }

    #[test]
    fn test_no_operator_no_value_is_skip() {
        let rule = compile_rule(&RuleDescriptor::default(), None, &defaults("q1")).unwrap();

        assert_eq!(rule.expression, RuleExpression::Skip);
        assert!(rule.evaluate(None));
        assert!(rule.evaluate(Some(&answered("q1", None))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::Integer(0))))));
    }

    #[test]
    fn test_value_without_operator_defaults_to_equal() {
        let descriptor = RuleDescriptor {
            expected_answer: Some(AnswerValue::Integer(3)),
            ..Default::default()
        };
        let rule =
            compile_rule(&descriptor, Some(FormSubtype::Integer), &defaults("q1")).unwrap();
        assert_eq!(rule.expression, RuleExpression::Equal(AnswerValue::Integer(3)));
    }

    #[test]
    fn test_comparison_without_value_is_rejected() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::GreaterThan),
            ..Default::default()
        };
        let err = compile_rule(&descriptor, Some(FormSubtype::Integer), &defaults("q1"))
            .unwrap_err();
        assert_eq!(err, RuleError::MissingExpectedAnswer(RuleOperator::GreaterThan));
    }

    #[test]
    fn test_ordering_on_choice_is_rejected() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::LessThan),
            expected_answer: Some(AnswerValue::Integer(2)),
            ..Default::default()
        };
        let err = compile_rule(&descriptor, Some(FormSubtype::MultipleChoice), &defaults("q1"))
            .unwrap_err();
        assert!(matches!(err, RuleError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_value_without_subtype_is_rejected() {
        let descriptor = RuleDescriptor {
            expected_answer: Some(AnswerValue::Bool(true)),
            ..Default::default()
        };
        let err = compile_rule(&descriptor, None, &defaults("q1")).unwrap_err();
        assert_eq!(err, RuleError::MissingFormSubtype(RuleOperator::Equal));
    }

    #[test]
    fn test_result_identifier_required() {
        let err = compile_rule(&RuleDescriptor::default(), None, &RuleGroupDefaults::default())
            .unwrap_err();
        assert_eq!(err, RuleError::MissingResultIdentifier);
    }

    #[test]
    fn test_skip_identifier_resolution_order() {
        let group = RuleGroupDefaults {
            result_identifier: Some("q1".to_string()),
            skip_identifier: Some("groupTarget".to_string()),
        };
        let own = RuleDescriptor {
            skip_identifier: Some("ruleTarget".to_string()),
            ..Default::default()
        };

        let rule = compile_rule(&own, None, &group).unwrap();
        assert_eq!(rule.skip_identifier, "ruleTarget");

        let rule = compile_rule(&RuleDescriptor::default(), None, &group).unwrap();
        assert_eq!(rule.skip_identifier, "groupTarget");

        let rule = compile_rule(&RuleDescriptor::default(), None, &defaults("q1")).unwrap();
        assert!(rule.targets_null_step());
    }

    #[test]
    fn test_other_than_on_choice_checks_membership() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::OtherThan),
            expected_answer: Some(AnswerValue::from("none")),
            ..Default::default()
        };
        let rule = compile_rule(&descriptor, Some(FormSubtype::MultipleChoice), &defaults("q1"))
            .unwrap();

        assert!(rule.evaluate(Some(&answered("q1", Some(vec!["a", "b"].into())))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(vec!["a", "none"].into())))));
    }

    #[test]
    fn test_other_than_on_scalar_is_inequality() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::OtherThan),
            expected_answer: Some(AnswerValue::Integer(5)),
            ..Default::default()
        };
        let rule =
            compile_rule(&descriptor, Some(FormSubtype::Integer), &defaults("q1")).unwrap();
        assert!(rule.evaluate(Some(&answered("q1", Some(AnswerValue::Integer(4))))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::Integer(5))))));
    }

    #[test]
    fn test_numeric_ordering() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::GreaterThanEqual),
            expected_answer: Some(AnswerValue::Integer(7)),
            ..Default::default()
        };
        let rule =
            compile_rule(&descriptor, Some(FormSubtype::Scale), &defaults("q1")).unwrap();
        assert!(rule.evaluate(Some(&answered("q1", Some(AnswerValue::Integer(7))))));
        assert!(rule.evaluate(Some(&answered("q1", Some(AnswerValue::Decimal(9.5))))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::Integer(6))))));
        assert!(!rule.evaluate(Some(&answered("q1", None))));
    }

    #[test]
    fn test_not_equal_on_single_choice_wraps_value() {
        let descriptor = RuleDescriptor {
            operator: Some(RuleOperator::NotEqual),
            expected_answer: Some(AnswerValue::Bool(true)),
            ..Default::default()
        };
        let rule = compile_rule(&descriptor, Some(FormSubtype::SingleChoice), &defaults("q1"))
            .unwrap();

        assert_eq!(
            rule.expression,
            RuleExpression::NotEqual(AnswerValue::from(vec![true]))
        );
        assert!(rule.evaluate(Some(&answered("q1", Some(vec![false].into())))));
        assert!(!rule.evaluate(Some(&answered("q1", Some(vec![true].into())))));
        assert!(rule.evaluate(Some(&answered("q1", None))));
    }

    #[test]
    fn test_strict_and_lower_bounds() {
        let compile = |operator: RuleOperator, subtype: FormSubtype| {
            let descriptor = RuleDescriptor {
                operator: Some(operator),
                expected_answer: Some(AnswerValue::Integer(5)),
                ..Default::default()
            };
            compile_rule(&descriptor, Some(subtype), &defaults("q1")).unwrap()
        };
        let at = |n: i64| answered("q1", Some(AnswerValue::Integer(n)));

        let less = compile(RuleOperator::LessThan, FormSubtype::Integer);
        assert_eq!(less.expression, RuleExpression::LessThan(AnswerValue::Integer(5)));
        assert!(less.evaluate(Some(&at(4))));
        assert!(!less.evaluate(Some(&at(5))));
        assert!(less.evaluate(Some(&answered("q1", Some(AnswerValue::Decimal(4.5))))));

        let at_most = compile(RuleOperator::LessThanEqual, FormSubtype::Scale);
        assert!(at_most.evaluate(Some(&at(5))));
        assert!(!at_most.evaluate(Some(&at(6))));

        let greater = compile(RuleOperator::GreaterThan, FormSubtype::Integer);
        assert!(greater.evaluate(Some(&at(6))));
        assert!(!greater.evaluate(Some(&at(5))));
        assert!(!greater.evaluate(None));
    }

    #[test]
    fn test_ordering_against_unordered_answer_is_false() {
        for operator in [
            RuleOperator::LessThan,
            RuleOperator::LessThanEqual,
            RuleOperator::GreaterThan,
            RuleOperator::GreaterThanEqual,
        ] {
            let descriptor = RuleDescriptor {
                operator: Some(operator),
                expected_answer: Some(AnswerValue::Integer(5)),
                ..Default::default()
            };
            let rule =
                compile_rule(&descriptor, Some(FormSubtype::Integer), &defaults("q1")).unwrap();

            assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::from("7"))))));
            assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::from("3"))))));
            assert!(!rule.evaluate(Some(&answered("q1", Some(vec![7i64].into())))));
            assert!(!rule.evaluate(Some(&answered("q1", Some(AnswerValue::Bool(true))))));
        }
    }

    #[test]
    fn test_group_drops_malformed_rules() {
        let rules: Vec<RuleEntry> = vec![
            RuleDescriptor::skip_when(true, "end").into(),
            RuleDescriptor {
                operator: Some(RuleOperator::LessThan),
                ..Default::default()
            }
            .into(),
        ];
        let mut diagnostics = Diagnostics::new();
        let compiled = compile_rule_group(
            &rules,
            Some(FormSubtype::Boolean),
            &defaults("q1"),
            &mut diagnostics,
        );

        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].skip_identifier, "end");
        assert_eq!(
            diagnostics
                .with_code(DiagnosticCode::MissingExpectedAnswer)
                .len(),
            1
        );
    }

    #[test]
    fn test_group_of_only_malformed_rules_is_empty() {
        let rules: Vec<RuleEntry> = vec![RuleDescriptor {
            operator: Some(RuleOperator::Equal),
            ..Default::default()
        }
        .into()];
        let mut diagnostics = Diagnostics::new();
        let compiled = compile_rule_group(&rules, None, &defaults("q1"), &mut diagnostics);
        assert!(compiled.is_empty());
        assert!(diagnostics.has_warnings());
    }

    #[test]
    fn test_unparseable_rule_entry_is_reported() {
        let yaml = r#"
- operator: between
  value: 3
- formSubtype: bogus
  value: 1
- value: 2
  skipIdentifier: done
"#;
        let rules: Vec<RuleEntry> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(rules[0], RuleEntry::Malformed(_)));
        assert!(matches!(rules[1], RuleEntry::Malformed(_)));
        assert!(matches!(rules[2], RuleEntry::Rule(_)));

        let mut diagnostics = Diagnostics::new();
        let compiled = compile_rule_group(
            &rules,
            Some(FormSubtype::Scale),
            &defaults("mood"),
            &mut diagnostics,
        );

        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].skip_identifier, "done");
        let malformed = diagnostics.with_code(DiagnosticCode::MalformedRule);
        assert_eq!(malformed.len(), 2);
        assert_eq!(malformed[0].step_identifier.as_deref(), Some("mood"));
    }

    #[test]
    fn test_operator_tokens_deserialize() {
        let rule: RuleDescriptor =
            serde_yaml::from_str("operator: ot\nvalue: 2\nskipIdentifier: done\n").unwrap();
        assert_eq!(rule.operator, Some(RuleOperator::OtherThan));
        assert_eq!(rule.expected_answer, Some(AnswerValue::Integer(2)));

        let rule: RuleDescriptor =
            serde_json::from_str(r#"{"ruleOperator": "greaterThan", "expectedAnswer": 1.5}"#)
                .unwrap();
        assert_eq!(rule.operator, Some(RuleOperator::GreaterThan));
    }
}
