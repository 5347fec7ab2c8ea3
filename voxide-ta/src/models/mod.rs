//! Data model for the transcript-analytics coordinator

mod analysis;
mod job_set;

pub use analysis::{
    AnalysisMetadata, ConsolidatedAnalysis, Entity, EntitySet, KeyPhrase, KeyPhraseSet, Sentiment,
    SentimentResult, SentimentScore, TranscriptReference,
};
pub use job_set::{AnalysisJobSet, JobSetState, JobSlot, SlotStatus};
