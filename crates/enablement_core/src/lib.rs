pub mod assembler;
pub mod domain;
pub mod fallback;
pub mod lesson_media;
pub mod persistence;
pub mod pipeline;
pub mod plan;
pub mod ports;
pub mod sequence;
pub mod storage;
pub mod throttle;

pub use domain::{
    AssetOrigin, Difficulty, GenerationMetadata, GenerationOptions, GenerationSummary, Lesson,
    LessonMedia, LessonPlan, LessonType, MediaAsset, MediaKind, MultimediaModule, PlanSource,
    SaveOptions,
};
pub use fallback::FallbackChain;
pub use lesson_media::{LessonMediaGenerator, MediaChains};
pub use persistence::{PersistOutcome, PersistenceGateway};
pub use pipeline::{GenerationReport, GenerationRequest, PipelineError, PipelineOrchestrator, PipelineSettings};
pub use ports::{
    FailureKind, LessonPlanService, MediaProvider, MediaRequest, ModuleFilter, ModuleStore,
    ModuleSummary, PortError, PortResult, ProviderFailure, ProviderOutput, ProviderResult,
    StorageStats,
};
pub use sequence::ImageSequenceStrategy;
pub use storage::MediaStorage;
pub use throttle::ProviderThrottle;
