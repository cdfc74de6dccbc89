//! Remote collaborator clients: chat completion, field descriptor lookup,
//! record search, and the shared access-token seam. Everything here is
//! `Arc`-shareable and safe for concurrent use by independent pipeline runs.

pub mod descriptor;
pub mod llm;
pub mod records;
pub mod token;

pub use descriptor::{DescriptorClientConfig, ToolSessionDescriptorClient};
pub use llm::{ChatCompletionClient, ChatCompletionConfig};
pub use records::{RecordSearchClient, RecordSearchConfig};
pub use token::{InMemoryTokenStore, TokenStore};
