pub mod completion;
pub mod formatter;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod router;

pub use completion::{OpenAiCompatibleCompleter, RetryingCompleter};
pub use formatter::{format_error, format_response, Block, FormattedResponse};
pub use orchestrator::{ChannelType, InboundEvent, Orchestrator, OrchestratorOutcome, OrchestratorSettings};
pub use prompt::{PromptManager, RenderedPrompt};
pub use registry::SkillRegistry;
pub use router::{select_function, RouteOverrides};
