pub mod asset;
pub mod job;

pub use asset::{
    Asset, AssetKind, AssetMeta, AssetRecord, AssetState, AssetVariant, NewAsset, NewAssetVariant,
};
pub use job::{Job, JobState, JobType, ProcessingJob};
