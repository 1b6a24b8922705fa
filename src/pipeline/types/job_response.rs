use serde::{Deserialize, Serialize};

use crate::pipeline::types::JobId;

/// What the caller of a job receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResponse {
    Success {
        job_id: JobId,
        product_name: String,
        frame_ref: String,
        segmented_ref: String,
        enhanced_refs: Vec<String>,
        elapsed_seconds: f64,
    },
    Error {
        job_id: JobId,
        message: String,
    },
}

impl JobResponse {
    pub fn job_id(&self) -> JobId {
        match self {
            JobResponse::Success { job_id, .. } | JobResponse::Error { job_id, .. } => *job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResponse::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_shape() {
        let response = JobResponse::Error {
            job_id: JobId::new(),
            message: "No frames extracted from video".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "No frames extracted from video");
        assert!(value.get("enhanced_refs").is_none());
    }

    #[test]
    fn test_success_shape() {
        let response = JobResponse::Success {
            job_id: JobId::new(),
            product_name: "Desk Lamp".to_string(),
            frame_ref: "/static/j/frames/frame_003.jpg".to_string(),
            segmented_ref: "/static/j/segmented.png".to_string(),
            enhanced_refs: vec!["/static/j/enhanced/enhanced_studio.png".to_string()],
            elapsed_seconds: 1.5,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["enhanced_refs"].as_array().unwrap().len(), 1);
        assert!(response.is_success());
    }
}
