use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Kind of work a job asks the worker to perform.
///
/// The tag set is closed: payloads carrying any other `type` fail to decode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "job_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Transcode,
    Thumbnail,
    ExtractMeta,
}

impl Display for JobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobType::Transcode => write!(f, "transcode"),
            JobType::Thumbnail => write!(f, "thumbnail"),
            JobType::ExtractMeta => write!(f, "extract_meta"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "job_state", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Row of the `processing_jobs` table.
///
/// The Redis list is the delivery mechanism; this table is bookkeeping only
/// and its `priority` is not consulted when popping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProcessingJob {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub job_type: JobType,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub priority: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queue payload: `{"id": .., "assetId": .., "type": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Opaque to the worker; producers here mint UUIDs but any string is accepted.
    pub id: String,
    pub asset_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

impl Job {
    pub fn new(asset_id: Uuid, job_type: JobType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            asset_id,
            job_type,
        }
    }

    pub fn transcode(asset_id: Uuid) -> Self {
        Self::new(asset_id, JobType::Transcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_wire_format_uses_camel_case_and_type_tag() {
        let asset_id = Uuid::new_v4();
        let job = Job::transcode(asset_id);
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["assetId"], asset_id.to_string());
        assert_eq!(value["type"], "transcode");
        assert_eq!(value["id"], job.id.as_str());
        assert!(Uuid::parse_str(&job.id).is_ok());
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn extract_meta_tag_is_snake_case() {
        let payload = format!(
            r#"{{"id":"{}","assetId":"{}","type":"extract_meta"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let job: Job = serde_json::from_str(&payload).unwrap();
        assert_eq!(job.job_type, JobType::ExtractMeta);
    }

    #[test]
    fn non_uuid_job_id_is_accepted() {
        let asset_id = Uuid::new_v4();
        let payload = format!(
            r#"{{"id":"job-42","assetId":"{}","type":"transcode"}}"#,
            asset_id
        );
        let job: Job = serde_json::from_str(&payload).unwrap();
        assert_eq!(job.id, "job-42");
        assert_eq!(job.asset_id, asset_id);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let payload = format!(
            r#"{{"id":"{}","assetId":"{}","type":"watermark"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<Job>(&payload).is_err());
    }
}
