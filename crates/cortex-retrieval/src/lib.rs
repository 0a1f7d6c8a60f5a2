pub mod citations;
pub mod engine;
pub mod followup;
pub mod preprocess;

pub use citations::{chunk_title, citation_for, numbered_citations, sources_section};
pub use engine::RetrievalEngine;
pub use followup::enhance_query_with_context;
pub use preprocess::preprocess_query;
