use serde::Deserialize;

/// One learner record as the LMS API returns it. The payload is
/// semi-structured, so everything beyond the object shape is optional and
/// validated at classification time rather than at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Learner {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "last_loggedin_date")]
    pub last_login: Option<String>,
    #[serde(default)]
    pub program_data: Option<ProgramData>,
}

/// Progress arrives as a number or a numeric string depending on the
/// upstream record's age, so it is kept raw until parsed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramData {
    pub progress_status: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Inactive,
    LowScore,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Inactive => "inactive",
            Category::LowScore => "low_score",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub records_seen: u64,
    pub records_skipped: u64,
    pub inactive_flagged: u64,
    pub low_score_flagged: u64,
    pub batches_dispatched: u64,
    pub batches_failed: u64,
}
