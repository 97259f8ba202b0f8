//! Intake stage: reference parsing, content fetching, and job extraction.

pub mod extract;
pub mod fetch;
pub mod reference;

pub use extract::{JobExtractor, OpenAiExtractor};
pub use fetch::{Fetcher, HttpFetcher};
pub use reference::ParsedReference;
