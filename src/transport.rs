use std::future::Future;

use agent_wire::{AgentMessageRequest, AgentWireClient, AgentWireError, ByteStream, CancellationSignal};

/// Opens the streamed response body for one outbound message.
pub trait Transport {
    fn open(
        &self,
        request: &AgentMessageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<ByteStream, AgentWireError>>;
}

impl Transport for AgentWireClient {
    fn open(
        &self,
        request: &AgentMessageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<ByteStream, AgentWireError>> {
        AgentWireClient::open(self, request, cancellation)
    }
}
