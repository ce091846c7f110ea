//! Grading rules, one pure function per question variant

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::{Answer, Question};
use super::normalize::normalize;

/// How free-text (`input`) answers are matched against the expected string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMatchPolicy {
    /// Normalized equality, or the submission contains the expected answer.
    /// Matches the product's shipped behavior; accepts superstrings like
    /// "la inversión" for "inversion".
    #[default]
    Lenient,
    /// Normalized equality only
    Exact,
}

/// Grade a submitted answer against its question.
///
/// A variant mismatch between question and answer grades as incorrect; the
/// session machine never produces one.
pub fn grade(question: &Question, answer: &Answer, policy: InputMatchPolicy) -> bool {
    match (question, answer) {
        (Question::Choice { correct_index, .. }, Answer::Choice(selected)) => {
            selected == correct_index
        }
        (Question::Cloze { correct, .. }, Answer::Cloze(fillers)) => {
            fillers.len() == correct.len()
                && fillers.iter().zip(correct.iter()).all(|(got, want)| got == want)
        }
        (Question::Input { correct, .. }, Answer::Input(text)) => {
            grade_input(text, correct, policy)
        }
        (Question::Pairs { correct_relations, .. }, Answer::Pairs(relations)) => {
            grade_pairs(relations, correct_relations)
        }
        _ => false,
    }
}

fn grade_input(submitted: &str, expected: &str, policy: InputMatchPolicy) -> bool {
    let submitted = normalize(submitted);
    let expected = normalize(expected);
    match policy {
        InputMatchPolicy::Lenient => submitted == expected || submitted.contains(&expected),
        InputMatchPolicy::Exact => submitted == expected,
    }
}

/// Exact relation-map equality: every left item paired to its designated
/// right item, no extras, no omissions.
fn grade_pairs(relations: &[(String, String)], expected: &[(String, String)]) -> bool {
    if relations.len() != expected.len() {
        return false;
    }
    let want: HashMap<&str, &str> =
        expected.iter().map(|(l, r)| (l.as_str(), r.as_str())).collect();
    relations.iter().all(|(l, r)| want.get(l.as_str()) == Some(&r.as_str()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::quiz::model::GAP_MARKER;

    fn choice_question() -> Question {
        Question::Choice {
            id: "q1".into(),
            title: "¿Que es el flujo de caja?".into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 1,
        }
    }

    fn cloze_question() -> Question {
        Question::Cloze {
            id: "q2".into(),
            title: "Completa".into(),
            sentence: format!("A {GAP_MARKER} and a {GAP_MARKER}."),
            pool: vec!["cat".into(), "dog".into(), "bird".into()],
            correct: vec!["cat".into(), "dog".into()],
        }
    }

    fn input_question(correct: &str) -> Question {
        Question::Input {
            id: "q3".into(),
            title: "Termina la frase".into(),
            placeholder: "...".into(),
            correct: correct.into(),
        }
    }

    fn pairs_question() -> Question {
        Question::Pairs {
            id: "q4".into(),
            title: "Une los conceptos".into(),
            left_items: vec!["ingresos".into(), "gastos".into()],
            right_items: vec!["salidas".into(), "entradas".into()],
            correct_relations: vec![
                ("ingresos".into(), "entradas".into()),
                ("gastos".into(), "salidas".into()),
            ],
        }
    }

    #[test]
    fn choice_correct_iff_index_matches() {
        let q = choice_question();
        for i in 0..4 {
            let want = i == 1;
            assert_eq!(grade(&q, &Answer::Choice(i), InputMatchPolicy::default()), want);
        }
    }

    #[test]
    fn cloze_is_order_sensitive() {
        let q = cloze_question();
        let policy = InputMatchPolicy::default();
        assert!(grade(&q, &Answer::Cloze(vec!["cat".into(), "dog".into()]), policy));
        assert!(!grade(&q, &Answer::Cloze(vec!["dog".into(), "cat".into()]), policy));
    }

    #[test]
    fn cloze_partial_fill_is_incorrect() {
        let q = cloze_question();
        assert!(!grade(&q, &Answer::Cloze(vec!["cat".into()]), InputMatchPolicy::default()));
    }

    #[test]
    fn input_accepts_diacritic_and_superstring_variants() {
        let q = input_question("inversion");
        let policy = InputMatchPolicy::Lenient;
        assert!(grade(&q, &Answer::Input("inversion".into()), policy));
        assert!(grade(&q, &Answer::Input("la inversión".into()), policy));
        assert!(!grade(&q, &Answer::Input("invers".into()), policy));
    }

    #[test]
    fn input_exact_policy_rejects_superstrings() {
        let q = input_question("inversion");
        assert!(grade(&q, &Answer::Input("Inversión".into()), InputMatchPolicy::Exact));
        assert!(!grade(&q, &Answer::Input("la inversión".into()), InputMatchPolicy::Exact));
    }

    #[test]
    fn input_empty_is_never_correct() {
        let q = input_question("inversion");
        assert!(!grade(&q, &Answer::Input(String::new()), InputMatchPolicy::Lenient));
        assert!(!grade(&q, &Answer::Input(String::new()), InputMatchPolicy::Exact));
    }

    #[test]
    fn pairs_require_exact_relation_map() {
        let q = pairs_question();
        let policy = InputMatchPolicy::default();
        let right = vec![
            ("gastos".to_string(), "salidas".to_string()),
            ("ingresos".to_string(), "entradas".to_string()),
        ];
        // Relation order does not matter, the mapping does
        assert!(grade(&q, &Answer::Pairs(right), policy));

        let swapped = vec![
            ("ingresos".to_string(), "salidas".to_string()),
            ("gastos".to_string(), "entradas".to_string()),
        ];
        assert!(!grade(&q, &Answer::Pairs(swapped), policy));

        let incomplete = vec![("ingresos".to_string(), "entradas".to_string())];
        assert!(!grade(&q, &Answer::Pairs(incomplete), policy));
    }

    #[test]
    fn variant_mismatch_grades_incorrect() {
        let q = choice_question();
        assert!(!grade(&q, &Answer::Input("b".into()), InputMatchPolicy::default()));
    }

    proptest! {
        #[test]
        fn choice_only_the_correct_index_passes(selected in 0usize..16) {
            let q = choice_question();
            let got = grade(&q, &Answer::Choice(selected), InputMatchPolicy::default());
            prop_assert_eq!(got, selected == 1);
        }

        #[test]
        fn input_expected_answer_is_reflexively_correct(expected in "[a-zA-Záéíóúñ]{1,24}") {
            let q = input_question(&expected);
            let answer = Answer::Input(expected.clone());
            prop_assert!(grade(&q, &answer, InputMatchPolicy::Lenient));
            prop_assert!(grade(&q, &answer, InputMatchPolicy::Exact));
        }

        #[test]
        fn input_empty_submission_never_passes(expected in "[a-z]{1,24}") {
            let q = input_question(&expected);
            prop_assert!(!grade(&q, &Answer::Input(String::new()), InputMatchPolicy::Lenient));
        }
    }
}
