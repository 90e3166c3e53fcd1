use std::collections::HashMap;

use serde_json::Value;

use crate::db::models::AnswerEntry;
use crate::db::types::QuestionType;
use crate::repositories::exams::ExamQuestionRow;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-question score when an exam's total is split evenly across its
/// questions.
pub(crate) fn even_split(total_score: f64, question_count: usize) -> f64 {
    if question_count == 0 {
        return 0.0;
    }
    round2(total_score / question_count as f64)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Canonical form of a selection: each element stringified, sorted,
/// comma-joined. Makes ["a","b"] and ["b","a"] compare equal.
fn join_sorted(items: &[Value]) -> String {
    let mut parts: Vec<String> = items.iter().map(stringify).collect();
    parts.sort();
    parts.join(",")
}

/// A multiple-choice key as stored: a JSON array, or a JSON-encoded array
/// inside a string. Anything else is unreadable.
fn selection_key(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => Some(join_sorted(items)),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Some(join_sorted(&items)),
            _ => None,
        },
        _ => None,
    }
}

/// A submitted selection. A scalar counts as selecting one option.
fn selection_answer(value: &Value) -> String {
    match value {
        Value::Array(items) => join_sorted(items),
        other => stringify(other),
    }
}

/// Score a single answer against the stored key. Choice and true/false
/// questions are graded exactly and case-sensitively; fill-blank and essay
/// answers score zero here and wait for manual grading. A key the grader
/// cannot interpret scores zero rather than failing the whole submission.
pub(crate) fn grade_answer(question: &ExamQuestionRow, answer: &Value) -> f64 {
    let key = &question.correct_answer.0;
    if key.is_null() {
        return 0.0;
    }

    let correct = match question.question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            stringify(answer) == stringify(key)
        }
        QuestionType::MultipleChoice => match selection_key(key) {
            Some(expected) => selection_answer(answer) == expected,
            None => false,
        },
        QuestionType::FillBlank | QuestionType::Essay => false,
    };

    if correct {
        question.score
    } else {
        0.0
    }
}

/// Auto-grade a full submission. Answers for questions not attached to the
/// exam are ignored; attached questions the student skipped score zero.
pub(crate) fn grade_submission(questions: &[ExamQuestionRow], answers: &[AnswerEntry]) -> f64 {
    let by_question: HashMap<&str, &Value> = answers
        .iter()
        .map(|entry| (entry.question_id.as_str(), &entry.answer))
        .collect();

    let total: f64 = questions
        .iter()
        .map(|question| {
            by_question
                .get(question.question_id.as_str())
                .map(|answer| grade_answer(question, answer))
                .unwrap_or(0.0)
        })
        .sum();

    round2(total)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::types::Json;

    use super::*;

    fn question(
        id: &str,
        question_type: QuestionType,
        correct_answer: Value,
        score: f64,
    ) -> ExamQuestionRow {
        ExamQuestionRow {
            question_id: id.to_string(),
            title: format!("question {id}"),
            content: String::new(),
            question_type,
            options: Json(vec!["A".to_string(), "B".to_string()]),
            correct_answer: Json(correct_answer),
            explanation: None,
            difficulty: 1,
            category: "general".to_string(),
            score,
            order_num: 1,
        }
    }

    fn answer(question_id: &str, value: Value) -> AnswerEntry {
        AnswerEntry { question_id: question_id.to_string(), answer: value }
    }

    #[test]
    fn even_split_rounds_to_two_decimals() {
        assert_eq!(even_split(100.0, 3), 33.33);
        assert_eq!(even_split(100.0, 4), 25.0);
        assert_eq!(even_split(10.0, 0), 0.0);
    }

    #[test]
    fn single_choice_requires_exact_match() {
        let q = question("q1", QuestionType::SingleChoice, json!("A"), 5.0);
        assert_eq!(grade_answer(&q, &json!("A")), 5.0);
        assert_eq!(grade_answer(&q, &json!("a")), 0.0);
        assert_eq!(grade_answer(&q, &json!("B")), 0.0);
    }

    #[test]
    fn true_false_compares_stringified_values() {
        let q = question("q1", QuestionType::TrueFalse, json!(true), 2.0);
        assert_eq!(grade_answer(&q, &json!(true)), 2.0);
        assert_eq!(grade_answer(&q, &json!("true")), 2.0);
        assert_eq!(grade_answer(&q, &json!(false)), 0.0);
    }

    #[test]
    fn multiple_choice_is_order_independent() {
        let q = question("q1", QuestionType::MultipleChoice, json!(["a", "b"]), 4.0);
        assert_eq!(grade_answer(&q, &json!(["b", "a"])), 4.0);
        assert_eq!(grade_answer(&q, &json!(["a", "b"])), 4.0);
    }

    #[test]
    fn multiple_choice_is_all_or_nothing() {
        let q = question("q1", QuestionType::MultipleChoice, json!(["a", "b", "c"]), 6.0);
        assert_eq!(grade_answer(&q, &json!(["a", "b"])), 0.0);
        assert_eq!(grade_answer(&q, &json!(["a", "b", "c", "d"])), 0.0);
    }

    #[test]
    fn json_encoded_multiple_choice_key_is_parsed() {
        let q = question("q1", QuestionType::MultipleChoice, json!("[\"a\",\"b\"]"), 4.0);
        assert_eq!(grade_answer(&q, &json!(["b", "a"])), 4.0);
        assert_eq!(grade_answer(&q, &json!(["a"])), 0.0);
    }

    #[test]
    fn scalar_answer_counts_as_single_selection() {
        let q = question("q1", QuestionType::MultipleChoice, json!(["a"]), 4.0);
        assert_eq!(grade_answer(&q, &json!("a")), 4.0);
        assert_eq!(grade_answer(&q, &json!("b")), 0.0);
    }

    #[test]
    fn essay_scores_zero_until_graded_manually() {
        let q = question("q1", QuestionType::Essay, json!("model answer"), 10.0);
        assert_eq!(grade_answer(&q, &json!("model answer")), 0.0);
    }

    #[test]
    fn fill_blank_scores_zero_until_graded_manually() {
        let q = question("q1", QuestionType::FillBlank, json!("42"), 5.0);
        assert_eq!(grade_answer(&q, &json!("42")), 0.0);
    }

    #[test]
    fn malformed_answer_key_scores_zero() {
        let q = question("q1", QuestionType::MultipleChoice, json!("not an array"), 4.0);
        assert_eq!(grade_answer(&q, &json!(["a"])), 0.0);

        let q = question("q2", QuestionType::SingleChoice, Value::Null, 4.0);
        assert_eq!(grade_answer(&q, &json!("anything")), 0.0);
    }

    #[test]
    fn submission_sums_attached_questions_only() {
        let questions = vec![
            question("q1", QuestionType::SingleChoice, json!("A"), 5.0),
            question("q2", QuestionType::TrueFalse, json!(false), 5.0),
            question("q3", QuestionType::Essay, json!("free text"), 10.0),
        ];
        let answers = vec![
            answer("q1", json!("A")),
            answer("q2", json!(false)),
            answer("q3", json!("my essay")),
            answer("unattached", json!("A")),
        ];
        assert_eq!(grade_submission(&questions, &answers), 10.0);
    }

    #[test]
    fn skipped_questions_score_zero() {
        let questions = vec![
            question("q1", QuestionType::SingleChoice, json!("A"), 5.0),
            question("q2", QuestionType::SingleChoice, json!("B"), 5.0),
        ];
        let answers = vec![answer("q1", json!("A"))];
        assert_eq!(grade_submission(&questions, &answers), 5.0);
    }

    #[test]
    fn grading_is_deterministic() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, json!(["1", "3"]), 3.34),
            question("q2", QuestionType::TrueFalse, json!(false), 3.33),
            question("q3", QuestionType::SingleChoice, json!("C"), 3.33),
        ];
        let answers = vec![
            answer("q3", json!("C")),
            answer("q1", json!(["3", "1"])),
            answer("q2", json!(false)),
        ];
        for _ in 0..10 {
            assert_eq!(grade_submission(&questions, &answers), 10.0);
        }
    }
}
