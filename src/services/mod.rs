pub mod extract;
pub mod interpret;
pub mod prompt;
pub mod router;
pub mod summarize;

pub use extract::ExtractionService;
pub use prompt::PromptBuilder;
pub use router::ContentRouter;
pub use summarize::SummarizationService;
