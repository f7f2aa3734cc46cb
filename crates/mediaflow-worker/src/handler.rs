use async_trait::async_trait;
use mediaflow_core::models::{Job, JobType};
use mediaflow_processing::Processor;

/// Executes one decoded job.
///
/// Errors are reported to the pool, which logs them; the job is not retried.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

#[async_trait]
impl JobHandler for Processor {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        match job.job_type {
            JobType::Transcode => self.transcode_video(job.asset_id).await?,
            JobType::Thumbnail => self.generate_thumbnail(job.asset_id).await?,
            JobType::ExtractMeta => self.extract_metadata(job.asset_id).await?,
        }
        Ok(())
    }
}
