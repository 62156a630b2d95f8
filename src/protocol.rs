//! Wire contracts shared with the agent service
//!
//! Everything here is plain serde data: requests, tagged responses, the
//! versioned document format and the dynamic input schema.

mod document;
mod request;
mod response;
mod schema;

pub use document::{
    Block, ChartSpec, ChartType, Document, Series, DOCUMENT_VERSION_V1,
};
pub use request::{ExecuteRequest, UserInput};
pub use response::{ExecuteResponse, Outcome, Output, ResponseStatus};
pub use schema::{FieldSpec, FieldType, InputSchema};
