pub mod db;
pub mod elevenlabs;
pub mod hf_image;
pub mod http;
pub mod lesson_llm;
pub mod openai_errors;
pub mod openai_image;
pub mod tts;
pub mod video;

pub use db::PgModuleStore;
pub use elevenlabs::ElevenLabsAdapter;
pub use hf_image::HuggingFaceImageAdapter;
pub use lesson_llm::OpenAiLessonPlanAdapter;
pub use openai_image::OpenAiImageAdapter;
pub use tts::OpenAiTtsAdapter;
pub use video::HttpVideoAdapter;
