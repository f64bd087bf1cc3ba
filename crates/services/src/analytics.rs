//! Client-side aggregation over attempt history.

use std::collections::BTreeMap;

use crate::quiz_service::HistoryEntry;

/// Per-subject rollup within a history summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectBreakdown {
    pub subject_name: String,
    pub attempts: u32,
    pub average_score: f64,
    pub best_score: u32,
}

/// Aggregate view over a user's attempt history, computed locally so the
/// history screen needs no extra backend round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub attempts: u32,
    pub average_score: f64,
    pub best_score: u32,
    pub accuracy_percent: f64,
    pub subjects: Vec<SubjectBreakdown>,
}

impl HistorySummary {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            attempts: 0,
            average_score: 0.0,
            best_score: 0,
            accuracy_percent: 0.0,
            subjects: Vec::new(),
        }
    }
}

/// Summarize history entries. An empty history yields all-zero figures
/// rather than NaN.
#[must_use]
pub fn summarize(entries: &[HistoryEntry]) -> HistorySummary {
    if entries.is_empty() {
        return HistorySummary::empty();
    }

    let attempts = entries.len() as u32;
    let score_sum: u64 = entries.iter().map(|e| u64::from(e.score)).sum();
    let best_score = entries.iter().map(|e| e.score).max().unwrap_or(0);

    let correct: u64 = entries.iter().map(|e| u64::from(e.correct)).sum();
    let asked: u64 = entries.iter().map(|e| u64::from(e.total_questions)).sum();
    let accuracy_percent = if asked == 0 {
        0.0
    } else {
        correct as f64 / asked as f64 * 100.0
    };

    let mut by_subject: BTreeMap<&str, Vec<&HistoryEntry>> = BTreeMap::new();
    for entry in entries {
        by_subject.entry(&entry.subject_name).or_default().push(entry);
    }
    let subjects = by_subject
        .into_iter()
        .map(|(name, group)| {
            let sum: u64 = group.iter().map(|e| u64::from(e.score)).sum();
            SubjectBreakdown {
                subject_name: name.to_owned(),
                attempts: group.len() as u32,
                average_score: sum as f64 / group.len() as f64,
                best_score: group.iter().map(|e| e.score).max().unwrap_or(0),
            }
        })
        .collect();

    HistorySummary {
        attempts,
        average_score: score_sum as f64 / f64::from(attempts),
        best_score,
        accuracy_percent,
        subjects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::AttemptId;
    use quiz_core::time::fixed_now;

    fn entry(attempt: u64, subject: &str, score: u32, correct: u32, total: u32) -> HistoryEntry {
        HistoryEntry {
            attempt_id: AttemptId::new(attempt),
            subject_name: subject.to_owned(),
            score,
            correct,
            total_questions: total,
            taken_at: fixed_now(),
        }
    }

    #[test]
    fn empty_history_is_all_zero() {
        assert_eq!(summarize(&[]), HistorySummary::empty());
    }

    #[test]
    fn summary_aggregates_across_subjects() {
        let entries = vec![
            entry(1, "Physics", 80, 8, 10),
            entry(2, "Physics", 60, 6, 10),
            entry(3, "Biology", 90, 9, 10),
        ];
        let summary = summarize(&entries);

        assert_eq!(summary.attempts, 3);
        assert!((summary.average_score - 230.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.best_score, 90);
        assert!((summary.accuracy_percent - 23.0 / 30.0 * 100.0).abs() < 1e-9);

        assert_eq!(summary.subjects.len(), 2);
        let physics = summary
            .subjects
            .iter()
            .find(|s| s.subject_name == "Physics")
            .unwrap();
        assert_eq!(physics.attempts, 2);
        assert!((physics.average_score - 70.0).abs() < 1e-9);
        assert_eq!(physics.best_score, 80);
    }
}
