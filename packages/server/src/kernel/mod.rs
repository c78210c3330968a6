// Kernel - core infrastructure
//
// Crypto, HTTP, web search, and LLM provider plumbing. Dependency injection
// happens through the Base* traits so domains stay testable.
//
// IMPORTANT: Kernel is for INFRASTRUCTURE only, not business logic.
// Business logic belongs in domain layers.

pub mod crypto;
pub mod http;
pub mod llm_request;
pub mod providers;
pub mod search;
pub mod test_dependencies;

pub use crypto::{decrypt, CryptoError};
pub use http::{FetchError, HttpError, HttpFetcher};
pub use llm_request::LlmRequest;
pub use providers::{
    choose_provider, AiPurpose, BaseAi, BaseAiFactory, Provider, ProviderAi, ProviderAiFactory,
    RotationMode,
};
pub use search::{BaseSearchService, GoogleSearchClient, NoopSearchService, SearchResult};
pub use test_dependencies::{MockAi, MockSearchService, ScriptedAiFactory};
