//! HTTP implementations of the generation and web-search collaborators.

mod openai;
mod tavily;

pub use openai::OpenAiCompatibleGenerator;
pub use tavily::TavilySearch;
