use serde::{Deserialize, Serialize};

/// Categorical screening outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(alias = "shortlisted", alias = "SHORTLISTED")]
    Shortlisted,
    #[serde(alias = "maybe", alias = "MAYBE")]
    Maybe,
    #[serde(alias = "rejected", alias = "REJECTED")]
    Rejected,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Self::Shortlisted => "Shortlisted",
            Self::Maybe => "Maybe",
            Self::Rejected => "Rejected",
        }
    }

    /// Client-side fallback when the server does not supply a verdict.
    pub fn from_score(score: u32, thresholds: &VerdictThresholds) -> Self {
        if score >= thresholds.shortlist {
            Self::Shortlisted
        } else if score >= thresholds.maybe {
            Self::Maybe
        } else {
            Self::Rejected
        }
    }
}

/// Score cut-offs for the verdict fallback. `shortlist >= maybe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictThresholds {
    pub shortlist: u32,
    pub maybe: u32,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            shortlist: 60,
            maybe: 40,
        }
    }
}

/// One scored candidate from a bulk or reverse batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub index: u32,
    pub filename: String,
    pub score: u32, // 0 – 100
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default, alias = "matchingSkills")]
    pub matching_skills: Vec<String>,
    #[serde(default, alias = "missingSkills")]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ScreeningResult {
    /// The server's verdict, or one derived from the score.
    pub fn effective_verdict(&self, thresholds: &VerdictThresholds) -> Verdict {
        self.verdict
            .unwrap_or_else(|| Verdict::from_score(self.score, thresholds))
    }
}

/// Response of the single resume-vs-JD analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAnalysis {
    pub score: u32,
    #[serde(default, alias = "matchingSkills")]
    pub matching_skills: Vec<String>,
    #[serde(default, alias = "missingSkills")]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_from_score_thresholds() {
        let t = VerdictThresholds::default();
        assert_eq!(Verdict::from_score(60, &t), Verdict::Shortlisted);
        assert_eq!(Verdict::from_score(59, &t), Verdict::Maybe);
        assert_eq!(Verdict::from_score(40, &t), Verdict::Maybe);
        assert_eq!(Verdict::from_score(39, &t), Verdict::Rejected);
    }

    #[test]
    fn test_server_verdict_wins_over_fallback() {
        let result: ScreeningResult = serde_json::from_value(json!({
            "index": 1,
            "filename": "a.pdf",
            "score": 90,
            "verdict": "Rejected"
        }))
        .unwrap();
        assert_eq!(
            result.effective_verdict(&VerdictThresholds::default()),
            Verdict::Rejected
        );
    }

    #[test]
    fn test_result_accepts_camel_case_skills() {
        let result: ScreeningResult = serde_json::from_value(json!({
            "index": 2,
            "filename": "b.pdf",
            "score": 70,
            "matchingSkills": ["rust"],
            "missingSkills": ["kafka"]
        }))
        .unwrap();
        assert_eq!(result.matching_skills, vec!["rust"]);
        assert_eq!(result.missing_skills, vec!["kafka"]);
        assert!(result.verdict.is_none());
        assert!(result.summary.is_none());
    }

    #[test]
    fn test_lowercase_verdict_alias() {
        let v: Verdict = serde_json::from_value(json!("maybe")).unwrap();
        assert_eq!(v, Verdict::Maybe);
    }
}
