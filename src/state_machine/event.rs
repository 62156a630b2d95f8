//! Events that can occur in a conversation

use crate::protocol::{ExecuteResponse, UserInput};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    SendQuery {
        text: String,
    },
    SubmitForm {
        execution_id: String,
        values: UserInput,
    },

    // Transport events
    ResponseReceived {
        response: ExecuteResponse,
    },
    /// The transport call itself broke down (as opposed to the agent
    /// reporting FAILED)
    TransportFault {
        message: String,
    },
}
