// src/scoring.rs

/// Inputs for the completion-score formula, gathered once when a session's
/// last question is answered.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput {
    /// Wall-clock seconds between session start and completion.
    pub elapsed_secs: i64,
    /// Number of questions in the quiz.
    pub question_count: i64,
    /// Answer slots whose chosen option is flagged correct.
    pub correct_count: i64,
    /// Sum of the quiz's question time allowances, captured at session start.
    pub time_allotted_secs: i64,
}

/// Time multiplier: the unused share of the allotted budget after subtracting
/// a fixed per-question handling overhead.
///
/// Negative when the taker blew the budget, above 1.0 when they finished
/// implausibly fast; both pass through unclamped. A zero allotment yields 0.0
/// instead of dividing by zero.
pub fn time_ratio(input: ScoreInput, overhead_secs_per_question: i64) -> f64 {
    if input.time_allotted_secs == 0 {
        return 0.0;
    }
    let overhead = overhead_secs_per_question * input.question_count;
    let play_time = input.elapsed_secs - overhead;
    (input.time_allotted_secs - play_time) as f64 / input.time_allotted_secs as f64
}

/// Session score computed exactly once at completion:
/// `base * correct_count * time_ratio`, rounded to the nearest integer.
pub fn completion_score(input: ScoreInput, overhead_secs_per_question: i64, base: i64) -> i64 {
    let ratio = time_ratio(input, overhead_secs_per_question);
    ((base * input.correct_count) as f64 * ratio).round() as i64
}
