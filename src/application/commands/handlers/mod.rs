//! 命令处理器

mod generation_handlers;
mod outline_handlers;
mod rewrite_handlers;
mod story_handlers;

pub use generation_handlers::{GenerationSettings, StartGenerationHandler};
pub use generation_handlers::CancelGenerationHandler;
pub use outline_handlers::{OutlineSynthesizer, SynthesizerSettings};
pub use rewrite_handlers::{RefineChapterHandler, RewriteSettings};
pub use story_handlers::CreateStoryHandler;
