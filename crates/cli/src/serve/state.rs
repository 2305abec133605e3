//! Application state shared across request handlers.

use shelter_adoption::AdoptionWorkflow;
use shelter_storage::MemoryStorage;

pub(crate) type Workflow = AdoptionWorkflow<MemoryStorage>;

pub(crate) struct AppState {
    pub(crate) workflow: Workflow,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
