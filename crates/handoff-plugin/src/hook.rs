//! The contract the host agent framework implements, so this crate never
//! depends on any concrete framework's request/response types.
//!
//! A framework integration implements [`FrameworkCall`] once per hook point:
//! the hook itself stays synchronous from the framework's point of view
//! (see [`crate::coordinator::PluginCoordinator::intercept_blocking`]), and
//! the trait only has to describe how to turn the framework's request into
//! bytes and how to turn a reply's bytes back into the framework's response
//! type.

use handoff_core::BridgeResult;

/// One interceptable call out of the host agent framework.
pub trait FrameworkCall: Send + 'static {
    /// The framework's own response type, reconstructed from the payload a
    /// human (or another automated responder) supplies.
    type Response: Send + 'static;

    /// Name of the agent that produced this call. Selective interception
    /// (`PluginConfig::target_agents`) is applied against this value.
    fn agent_name(&self) -> &str;

    /// Serialize the framework's request object into the opaque payload
    /// carried on the wire by the request event.
    fn to_payload(&self) -> Vec<u8>;

    /// Deserialize a response payload back into the framework's own
    /// response type.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` is not a well-formed encoding of
    /// `Self::Response`.
    fn from_payload(payload: Vec<u8>) -> BridgeResult<Self::Response>;
}

/// Outcome of offering a call to the coordinator.
#[derive(Debug)]
pub enum InterceptOutcome<R> {
    /// The call was routed through a session and answered.
    Intercepted(R),
    /// `target_agents` excluded this agent; the caller should invoke the
    /// framework's normal, un-intercepted path instead.
    PassThrough,
}

impl<R> InterceptOutcome<R> {
    /// Returns the intercepted response, or `None` for `PassThrough`.
    #[must_use]
    pub fn into_intercepted(self) -> Option<R> {
        match self {
            Self::Intercepted(response) => Some(response),
            Self::PassThrough => None,
        }
    }

    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}
