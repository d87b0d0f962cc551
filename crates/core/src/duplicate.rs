use std::cmp::Ordering;
use std::collections::HashSet;

use crate::record::{ThesisPlan, ThesisSummary};
use crate::similarity::similarity;

pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.6;

/// A known thesis flagged as a likely duplicate of a plan.
#[derive(Debug, Clone)]
pub struct DuplicateHit {
    pub thesis: ThesisSummary,
    /// Fraction of the larger student set that both theses share.
    pub overlap: f64,
    pub title_similarity: Option<f64>,
    pub reason: String,
}

/// Flag known theses that look like the same piece of work as `plan`.
///
/// The hard rule is type equality plus at least one shared student id.
/// Title similarity at or above `title_threshold` is appended to the
/// reason for the operator's benefit but never decides inclusion: two
/// theses with the same type and student are reported even when their
/// titles share nothing.
pub fn find_similar_theses(
    plan: &ThesisPlan,
    theses: &[ThesisSummary],
    title_threshold: f64,
) -> Vec<DuplicateHit> {
    let plan_students: HashSet<i64> = plan.student_ids.iter().copied().collect();
    let mut hits = Vec::new();
    for thesis in theses {
        if thesis.thesis_type != plan.thesis_type {
            continue;
        }
        let common = thesis
            .student_ids
            .iter()
            .filter(|id| plan_students.contains(id))
            .count();
        if common == 0 {
            continue;
        }
        let denom = plan.student_ids.len().max(thesis.student_ids.len()).max(1);
        let overlap = common as f64 / denom as f64;
        let mut reasons = vec![
            "same type".to_string(),
            format!("{common} student(s) match"),
        ];
        let title_similarity = match (plan.title.as_deref(), thesis.title.as_deref()) {
            (Some(a), Some(b)) => {
                let sim = similarity(a, b);
                if sim >= title_threshold {
                    reasons.push(format!("title similarity: {:.0}%", sim * 100.0));
                }
                Some(sim)
            }
            _ => None,
        };
        hits.push(DuplicateHit {
            thesis: thesis.clone(),
            overlap,
            title_similarity,
            reason: reasons.join(", "),
        });
    }
    hits.sort_by(|a, b| {
        b.overlap
            .partial_cmp(&a.overlap)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.title_similarity
                    .unwrap_or(0.0)
                    .partial_cmp(&a.title_similarity.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.thesis.id.cmp(&b.thesis.id))
    });
    hits
}
