use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::models::{Category, Learner};

/// Boundary between "recently active" and "inactive", relative to now.
/// Recomputed at every evaluation so the window never goes stale over a
/// long-running stream.
pub fn inactive_cutoff(inactive_days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(inactive_days.max(1))
}

/// How a learner's progress field resolved: absent, a usable percentage, or
/// present but unparsable.
enum Progress {
    Absent,
    Percent(f64),
    Malformed,
}

fn resolve_progress(learner: &Learner) -> Progress {
    let raw = match learner
        .program_data
        .as_ref()
        .and_then(|p| p.progress_status.as_ref())
    {
        Some(value) => value,
        None => return Progress::Absent,
    };

    match raw {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) => Progress::Percent(v),
            None => Progress::Malformed,
        },
        serde_json::Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) => Progress::Percent(v),
            Err(_) => Progress::Malformed,
        },
        _ => Progress::Malformed,
    }
}

fn eligible(learner: &Learner) -> bool {
    let has_id = learner.id.as_deref().is_some_and(|s| !s.is_empty());
    let has_email = learner.email.as_deref().is_some_and(|s| !s.is_empty());
    if !has_id || !has_email {
        warn!(id = ?learner.id, "skipping learner without _id or email");
        return false;
    }
    true
}

/// A learner is inactive when they have never logged in, or their last login
/// is strictly before `cutoff`. Completed learners (progress exactly 100)
/// are never inactive. Unparsable login dates are conservative: unknown is
/// not flagged.
pub fn classify_inactive(learner: &Learner, cutoff: DateTime<Utc>) -> bool {
    if !eligible(learner) {
        return false;
    }

    match resolve_progress(learner) {
        Progress::Percent(v) if v == 100.0 => return false,
        Progress::Malformed => {
            warn!(id = ?learner.id, "unparsable progress_status, treating as not completed");
        }
        _ => {}
    }

    let last_login = match learner.last_login.as_deref() {
        None | Some("") => return true,
        Some(raw) => raw,
    };

    match DateTime::parse_from_rfc3339(last_login) {
        Ok(ts) => ts.with_timezone(&Utc) < cutoff,
        Err(_) => {
            warn!(id = ?learner.id, last_login, "invalid last_loggedin_date");
            false
        }
    }
}

/// A learner is low-scoring when their progress (0 when absent) is below
/// `threshold` and they have not completed the program.
pub fn classify_low_score(learner: &Learner, threshold: f64) -> bool {
    if !eligible(learner) {
        return false;
    }

    let progress = match resolve_progress(learner) {
        Progress::Absent => 0.0,
        Progress::Percent(v) => v,
        Progress::Malformed => {
            warn!(id = ?learner.id, "unparsable progress_status, not flagging as low score");
            return false;
        }
    };

    if progress >= 100.0 {
        return false;
    }
    progress < threshold
}

/// Mutually exclusive classification with inactivity taking precedence over
/// low score.
pub fn classify(learner: &Learner, cutoff: DateTime<Utc>, threshold: f64) -> Option<Category> {
    if classify_inactive(learner, cutoff) {
        Some(Category::Inactive)
    } else if classify_low_score(learner, threshold) {
        Some(Category::LowScore)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgramData;

    fn learner(id: &str, email: &str, last_login_days_ago: Option<i64>, progress: i64) -> Learner {
        Learner {
            id: Some(id.to_string()),
            email: Some(email.to_string()),
            first_name: Some("Avery".to_string()),
            last_login: last_login_days_ago
                .map(|days| (Utc::now() - Duration::days(days)).to_rfc3339()),
            program_data: Some(ProgramData {
                progress_status: Some(serde_json::json!(progress)),
            }),
        }
    }

    fn cutoff() -> DateTime<Utc> {
        inactive_cutoff(14)
    }

    #[test]
    fn stale_login_is_inactive() {
        assert!(classify_inactive(&learner("1", "e1", Some(40), 80), cutoff()));
    }

    #[test]
    fn recent_login_is_not_inactive() {
        assert!(!classify_inactive(&learner("2", "e2", Some(1), 10), cutoff()));
    }

    #[test]
    fn never_logged_in_is_inactive() {
        assert!(classify_inactive(&learner("3", "e3", None, 10), cutoff()));
    }

    #[test]
    fn completed_is_never_flagged() {
        let done = learner("4", "e4", Some(400), 100);
        assert!(!classify_inactive(&done, cutoff()));
        assert!(!classify_low_score(&done, 50.0));
        assert_eq!(classify(&done, cutoff(), 50.0), None);
    }

    #[test]
    fn completed_as_numeric_string_is_never_flagged() {
        let mut done = learner("5", "e5", Some(400), 0);
        done.program_data = Some(ProgramData {
            progress_status: Some(serde_json::json!("100")),
        });
        assert!(!classify_inactive(&done, cutoff()));
        assert!(!classify_low_score(&done, 50.0));
    }

    #[test]
    fn missing_identity_is_ineligible() {
        let mut no_email = learner("6", "e6", Some(40), 10);
        no_email.email = None;
        assert!(!classify_inactive(&no_email, cutoff()));
        assert!(!classify_low_score(&no_email, 50.0));

        let mut no_id = learner("7", "e7", Some(40), 10);
        no_id.id = None;
        assert!(!classify_inactive(&no_id, cutoff()));
        assert!(!classify_low_score(&no_id, 50.0));
    }

    #[test]
    fn malformed_login_date_is_not_inactive() {
        let mut bad = learner("8", "e8", None, 10);
        bad.last_login = Some("not-a-date".to_string());
        assert!(!classify_inactive(&bad, cutoff()));
    }

    #[test]
    fn malformed_progress_still_evaluates_inactivity() {
        let mut bad = learner("9", "e9", Some(40), 0);
        bad.program_data = Some(ProgramData {
            progress_status: Some(serde_json::json!({"nested": true})),
        });
        assert!(classify_inactive(&bad, cutoff()));
        assert!(!classify_low_score(&bad, 50.0));
    }

    #[test]
    fn absent_progress_defaults_to_zero() {
        let mut fresh = learner("10", "e10", Some(1), 0);
        fresh.program_data = None;
        assert!(classify_low_score(&fresh, 50.0));
    }

    #[test]
    fn low_score_respects_threshold() {
        assert!(classify_low_score(&learner("11", "e11", Some(1), 49), 50.0));
        assert!(!classify_low_score(&learner("12", "e12", Some(1), 50), 50.0));
    }

    #[test]
    fn inactivity_takes_precedence() {
        let both = learner("13", "e13", Some(40), 10);
        assert_eq!(classify(&both, cutoff(), 50.0), Some(Category::Inactive));
    }

    #[test]
    fn predicates_are_idempotent() {
        let record = learner("14", "e14", Some(40), 10);
        let fixed = cutoff();
        assert_eq!(
            classify_inactive(&record, fixed),
            classify_inactive(&record, fixed)
        );
        assert_eq!(
            classify_low_score(&record, 50.0),
            classify_low_score(&record, 50.0)
        );
    }
}
