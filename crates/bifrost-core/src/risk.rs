// bifrost-core/src/risk.rs
// ============================================================================
// Module: Bifrost Risk Assessment
// Description: Pure, cheap advisory risk scoring over a ward evaluation.
// Purpose: Attach a deterministic risk score/tier to a rune without pulling
//          in an AI-assisted analysis call, which remains an external
//          collaborator (see spec.md §1's scope exclusion for AI-assisted
//          analysis).
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! Spec.md §4.3 step 4 calls for "an optional risk score (pure, cheap)"
//! computed for every call, separate from the optional AI-assisted analysis
//! that only runs when enabled and the score clears a threshold. This module
//! is the pure half: [`assess`] derives a 0-100 score and a tier label from
//! the winning decision and how many wards matched, with no I/O and no
//! external call, so it can run unconditionally on the hot path.

use crate::model::WardDecision;
use crate::model::WardEvaluation;

/// Upper bound of the 0-100 advisory risk score.
const MAX_SCORE: u8 = 100;

/// Score contributed by the winning decision alone.
const fn decision_base_score(decision: WardDecision) -> u8 {
    match decision {
        WardDecision::Pass => 5,
        WardDecision::Reshape => 45,
        WardDecision::Halt => 75,
    }
}

/// Score added per matched ward, capped so a long ward chain cannot alone
/// push a PASS decision into a high tier.
const PER_MATCH_BONUS: u8 = 5;

/// Ceiling on the total bonus contributed by matched-ward count.
const MAX_MATCH_BONUS: u8 = 20;

/// A pure, cheap advisory risk assessment attached to a rune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAssessment {
    /// Advisory score in the range `0..=100`.
    pub score: u8,
    /// Tier label derived from `score`: `low`, `medium`, `high`, `critical`.
    pub tier: &'static str,
}

impl RiskAssessment {
    /// Returns `true` when `threshold` is met or exceeded, the condition
    /// spec.md §4.3 step 4 uses to decide whether an AI-assisted analysis
    /// would be warranted.
    #[must_use]
    pub const fn meets_threshold(self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// Derives a [`RiskAssessment`] from a ward evaluation: the winning
/// decision sets a base score, and each additional matched ward nudges it
/// up, capped at [`MAX_MATCH_BONUS`]. Always total; never fails.
#[must_use]
pub fn assess(eval: &WardEvaluation) -> RiskAssessment {
    let base = decision_base_score(eval.decision);
    let match_count = u8::try_from(eval.matched_wards.len()).unwrap_or(u8::MAX);
    let bonus = match_count.saturating_mul(PER_MATCH_BONUS).min(MAX_MATCH_BONUS);
    let score = base.saturating_add(bonus).min(MAX_SCORE);
    RiskAssessment { score, tier: tier_for(score) }
}

/// Maps a 0-100 score onto a tier label.
const fn tier_for(score: u8) -> &'static str {
    match score {
        0..=24 => "low",
        25..=49 => "medium",
        50..=79 => "high",
        _ => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::WardId;
    use crate::model::WardChainStep;

    fn eval(decision: WardDecision, matched: usize) -> WardEvaluation {
        let matched_wards: Vec<WardId> = (0..matched).map(|index| WardId::new(format!("w{index}"))).collect();
        WardEvaluation {
            decision,
            matched_wards,
            ward_chain: Vec::<WardChainStep>::new(),
            rationale: "test".to_string(),
            reshaped_arguments: None,
            evaluation_duration_ms: 0,
        }
    }

    #[test]
    fn pass_with_no_matches_is_low_tier() {
        let assessment = assess(&eval(WardDecision::Pass, 0));
        assert_eq!(assessment.tier, "low");
        assert!(assessment.score < 25);
    }

    #[test]
    fn halt_is_at_least_high_tier() {
        let assessment = assess(&eval(WardDecision::Halt, 1));
        assert!(assessment.score >= 50);
        assert!(matches!(assessment.tier, "high" | "critical"));
    }

    #[test]
    fn reshape_ranks_between_pass_and_halt() {
        let pass = assess(&eval(WardDecision::Pass, 0));
        let reshape = assess(&eval(WardDecision::Reshape, 0));
        let halt = assess(&eval(WardDecision::Halt, 0));
        assert!(pass.score < reshape.score);
        assert!(reshape.score < halt.score);
    }

    #[test]
    fn match_bonus_is_capped() {
        let few = assess(&eval(WardDecision::Pass, 1));
        let many = assess(&eval(WardDecision::Pass, 50));
        assert!(many.score - few.score <= MAX_MATCH_BONUS);
    }

    #[test]
    fn score_never_exceeds_max() {
        let assessment = assess(&eval(WardDecision::Halt, 50));
        assert_eq!(assessment.score, MAX_SCORE);
    }

    #[test]
    fn meets_threshold_is_inclusive() {
        let assessment = RiskAssessment { score: 60, tier: "high" };
        assert!(assessment.meets_threshold(60));
        assert!(!assessment.meets_threshold(61));
    }
}
