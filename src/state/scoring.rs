//! Pure scoring rules turning correctness and answer latency into points.

/// Tunables for [`score_answer`].
///
/// The default `speed_weight` of 0.5 halves the latency penalty: a correct
/// answer at the deadline still earns `1 - 0.5 = 0.5` of the base points, so the
/// `min_fraction` floor only bites for response times past the question duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    /// Points awarded for an instant correct answer.
    pub base_points: u32,
    /// Lower bound of the speed fraction for a correct answer.
    pub min_fraction: f64,
    /// How strongly latency eats into the score (1.0 = linear over the whole duration).
    pub speed_weight: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_points: 1000,
            min_fraction: 0.5,
            speed_weight: 0.5,
        }
    }
}

/// Compute the points awarded for one answer.
///
/// Incorrect answers are always worth zero. Correct answers earn
/// `base_points * fraction`, where the fraction shrinks with the reported
/// response time and is clamped into `[min_fraction, 1.0]`.
pub fn score_answer(
    is_correct: bool,
    response_time_ms: u64,
    duration_seconds: u32,
    policy: &ScoringPolicy,
) -> u32 {
    if !is_correct {
        return 0;
    }

    let min_fraction = policy.min_fraction.clamp(0.0, 1.0);
    let duration_ms = f64::from(duration_seconds) * 1000.0;
    let fraction = if duration_ms > 0.0 {
        let elapsed = response_time_ms as f64 / duration_ms;
        (1.0 - policy.speed_weight * elapsed).clamp(min_fraction, 1.0)
    } else {
        min_fraction
    };

    (f64::from(policy.base_points) * fraction).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_answers_score_zero() {
        let policy = ScoringPolicy::default();
        assert_eq!(score_answer(false, 0, 20, &policy), 0);
        assert_eq!(score_answer(false, 19_999, 20, &policy), 0);
    }

    #[test]
    fn four_seconds_into_a_twenty_second_question_is_worth_ninety_percent() {
        let policy = ScoringPolicy::default();
        assert_eq!(score_answer(true, 4_000, 20, &policy), 900);
    }

    #[test]
    fn instant_answer_earns_base_points() {
        let policy = ScoringPolicy::default();
        assert_eq!(score_answer(true, 0, 30, &policy), 1000);
    }

    #[test]
    fn late_answers_are_floored_at_min_fraction() {
        let policy = ScoringPolicy {
            speed_weight: 1.0,
            ..ScoringPolicy::default()
        };
        assert_eq!(score_answer(true, 19_000, 20, &policy), 500);
        assert_eq!(score_answer(true, 60_000, 20, &policy), 500);
    }

    #[test]
    fn linear_weight_matches_plain_ratio() {
        let policy = ScoringPolicy {
            speed_weight: 1.0,
            ..ScoringPolicy::default()
        };
        assert_eq!(score_answer(true, 4_000, 20, &policy), 800);
    }

    #[test]
    fn faster_correct_answers_never_score_less() {
        let policy = ScoringPolicy::default();
        let mut previous = u32::MAX;
        for response_time_ms in (0..=25_000).step_by(250) {
            let score = score_answer(true, response_time_ms, 20, &policy);
            assert!(score <= previous, "score increased at {response_time_ms}ms");
            previous = score;
        }
    }

    #[test]
    fn default_weight_halves_the_latency_penalty() {
        let policy = ScoringPolicy::default();
        assert_eq!(score_answer(true, 10_000, 20, &policy), 750);
        assert_eq!(score_answer(true, 20_000, 20, &policy), 500);
        assert_eq!(score_answer(true, 40_000, 20, &policy), 500);
    }

    #[test]
    fn zero_duration_falls_back_to_min_fraction() {
        let policy = ScoringPolicy::default();
        assert_eq!(score_answer(true, 0, 0, &policy), 500);
    }
}
