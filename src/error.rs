use thiserror::Error;

/// Failure taxonomy for one digest run.
///
/// `Authentication` and `Discovery` are fatal and abort before any further
/// side effect. `ProjectFetch` is recovered at the collector boundary: the
/// project is dropped from the report and siblings continue. `Delivery`
/// means the digest was computed but could not be sent.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("project discovery failed: {0}")]
    Discovery(String),

    #[error("metrics fetch failed for project {project_id}: {reason}")]
    ProjectFetch { project_id: String, reason: String },

    #[error("delivery failed after {attempts} attempt(s): {reason}")]
    Delivery { attempts: u32, reason: String },
}

impl DigestError {
    pub fn project_fetch(project_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DigestError::ProjectFetch {
            project_id: project_id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DigestError::Authentication("invalid API key".to_string());
        assert_eq!(err.to_string(), "authentication rejected: invalid API key");

        let err = DigestError::project_fetch("42", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "metrics fetch failed for project 42: HTTP 500"
        );

        let err = DigestError::Delivery {
            attempts: 3,
            reason: "rate limited".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "delivery failed after 3 attempt(s): rate limited"
        );
    }
}
