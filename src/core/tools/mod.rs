//! Tool call dispatch.
//!
//! Function-call requests from the model are executed against an external
//! tool executor and every request is answered with exactly one
//! function-call output.

mod dispatcher;
mod executor;

pub use dispatcher::{DEFAULT_TOOL_TIMEOUT, ToolDispatcher, ToolOutcome};
pub use executor::{
    HttpToolExecutor, SharedToolExecutor, TOOL_EXECUTE_PATH, ToolExecutionError, ToolExecutor,
    ToolRequest, ToolResponse, UnavailableToolExecutor,
};
