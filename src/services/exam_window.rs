use time::{Duration, PrimitiveDateTime};

/// The moment a student's submission window closes: the exam-wide end time or
/// their personal clock running out, whichever comes first.
pub(crate) fn submit_deadline(
    record_start: PrimitiveDateTime,
    exam_end: PrimitiveDateTime,
    duration_minutes: i32,
) -> PrimitiveDateTime {
    let personal_deadline = record_start + Duration::minutes(duration_minutes as i64);
    if personal_deadline < exam_end {
        personal_deadline
    } else {
        exam_end
    }
}

/// Submissions are accepted up to `grace_seconds` past the deadline to absorb
/// network latency at the buzzer.
pub(crate) fn within_submit_window(
    now: PrimitiveDateTime,
    deadline: PrimitiveDateTime,
    grace_seconds: i64,
) -> bool {
    now <= deadline + Duration::seconds(grace_seconds)
}

pub(crate) fn within_start_window(
    now: PrimitiveDateTime,
    exam_start: PrimitiveDateTime,
    exam_end: PrimitiveDateTime,
) -> bool {
    now >= exam_start && now < exam_end
}
