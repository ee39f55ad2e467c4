//! Pure validation rules for checklist answers.

use crate::model::{Answer, Question};
use std::collections::HashMap;
use std::fmt;

/// Why a question fails validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMessage {
    /// A required question was left unanswered.
    Required,
    /// The question was answered No without the mandatory observation.
    ObservationRequiredOnNo,
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "This question is required"),
            Self::ObservationRequiredOnNo => {
                write!(f, "An observation is required when answering No")
            }
        }
    }
}

/// Result of validating one execution's answers.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: HashMap<String, ValidationMessage>,
}

/// Evaluate every question against the current answers.
///
/// Per question, a required one with no answer reports `Required` and
/// nothing else; otherwise, one flagged observation-on-No that was answered
/// No with an empty (trimmed) observation reports `ObservationRequiredOnNo`.
/// Questions are independent, so evaluation order never affects the result.
pub fn validate(questions: &[Question], answers: &HashMap<String, Answer>) -> ValidationReport {
    let mut errors = HashMap::new();
    for q in questions {
        let answer = answers.get(&q.id);
        let value = answer.and_then(|a| a.value);

        if q.required && value.is_none() {
            errors.insert(q.id.clone(), ValidationMessage::Required);
            continue;
        }

        if q.observation_required_on_no
            && value == Some(false)
            && answer.is_none_or(|a| a.observation.trim().is_empty())
        {
            errors.insert(q.id.clone(), ValidationMessage::ObservationRequiredOnNo);
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Answer;

    fn question(id: &str, required: bool, obs_on_no: bool) -> Question {
        Question {
            id: id.into(),
            template_id: "t1".into(),
            order_index: 0,
            text: format!("Question {id}"),
            required,
            observation_required_on_no: obs_on_no,
        }
    }

    fn answered(value: Option<bool>, observation: &str) -> Answer {
        Answer {
            value,
            observation: observation.into(),
        }
    }

    #[test]
    fn test_all_required_answered_is_valid() {
        // Three required questions, none needing observation-on-No.
        let questions = vec![
            question("q1", true, false),
            question("q2", true, false),
            question("q3", true, false),
        ];
        let answers = HashMap::from([
            ("q1".into(), answered(Some(true), "")),
            ("q2".into(), answered(Some(false), "")),
            ("q3".into(), answered(Some(true), "")),
        ]);

        let report = validate(&questions, &answers);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_no_without_observation_fails() {
        let questions = vec![
            question("q1", true, false),
            question("q2", true, true),
            question("q3", true, false),
        ];
        let answers = HashMap::from([
            ("q1".into(), answered(Some(true), "")),
            ("q2".into(), answered(Some(false), "")),
            ("q3".into(), answered(Some(true), "")),
        ]);

        let report = validate(&questions, &answers);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.errors.get("q2"),
            Some(&ValidationMessage::ObservationRequiredOnNo)
        );
    }

    #[test]
    fn test_whitespace_observation_counts_as_empty() {
        let questions = vec![question("q1", true, true)];
        let answers = HashMap::from([("q1".into(), answered(Some(false), "   \n\t"))]);

        let report = validate(&questions, &answers);
        assert_eq!(
            report.errors.get("q1"),
            Some(&ValidationMessage::ObservationRequiredOnNo)
        );
    }

    #[test]
    fn test_required_shortcircuits_observation_rule() {
        // Unanswered + both flags: only the Required error is reported.
        let questions = vec![question("q1", true, true)];
        let answers = HashMap::new();

        let report = validate(&questions, &answers);
        assert_eq!(report.errors.get("q1"), Some(&ValidationMessage::Required));
    }

    #[test]
    fn test_answering_required_question_only_removes_its_error() {
        let questions = vec![question("q1", true, false), question("q2", true, false)];
        let mut answers: HashMap<String, Answer> = HashMap::new();

        let before = validate(&questions, &answers);
        assert_eq!(before.errors.get("q1"), Some(&ValidationMessage::Required));

        // Answering q1 removes its error and introduces nothing new for it.
        answers.insert("q1".into(), answered(Some(true), ""));
        let after = validate(&questions, &answers);
        assert!(!after.errors.contains_key("q1"));
        assert_eq!(after.errors.get("q2"), Some(&ValidationMessage::Required));
    }

    #[test]
    fn test_optional_unanswered_question_is_fine() {
        let questions = vec![question("q1", false, true)];
        let answers = HashMap::new();

        let report = validate(&questions, &answers);
        assert!(report.is_valid);
    }

    #[test]
    fn test_no_with_observation_passes() {
        let questions = vec![question("q1", true, true)];
        let answers = HashMap::from([("q1".into(), answered(Some(false), "valve leaking"))]);

        let report = validate(&questions, &answers);
        assert!(report.is_valid);
    }

    #[test]
    fn test_empty_question_list_is_vacuously_valid() {
        let report = validate(&[], &HashMap::new());
        assert!(report.is_valid);
    }
}
