pub mod browser;
pub mod llm;
pub mod parse;
pub mod proxy;
pub mod publisher;
pub mod session;
pub mod source;

pub use browser::BrowserExtractor;
pub use llm::OpenAiFormatter;
pub use proxy::ProxyConfig;
pub use publisher::{HttpListingPublisher, JsonLinesPublisher};
pub use session::SessionConfig;
pub use source::{FileWorkItemSource, HttpWorkItemSource};
