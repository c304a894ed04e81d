pub mod mock;
pub mod openai;
pub mod prompt;

pub use mock::MockProvider;
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use prompt::{build_request, PromptReading};
