#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::{ready, Future};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_wire::{AgentMessageRequest, AgentWireError, ByteStream, CancellationSignal};
use assistant_stream::{SessionController, SessionOptions, Timeline, Transport};
use futures_util::stream::{self, StreamExt};
use session_store::MemorySessionStore;

/// One scripted response body.
pub enum Script {
    /// Body chunks delivered in order, then end of body.
    Body(Vec<Vec<u8>>),
    /// Body chunks delivered in order, then a transport failure.
    Interrupted(Vec<Vec<u8>>),
    /// The request itself fails.
    Refused(AgentWireError),
}

#[derive(Default)]
pub struct TransportTrace {
    pub requests: Vec<AgentMessageRequest>,
    pub scripts: VecDeque<Script>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportTrace>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> (Self, Arc<Mutex<TransportTrace>>) {
        let state = Arc::new(Mutex::new(TransportTrace {
            requests: Vec::new(),
            scripts: scripts.into(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        request: &AgentMessageRequest,
        _cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<ByteStream, AgentWireError>> {
        let mut state = lock_unpoisoned(&self.state);
        state.requests.push(request.clone());
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| Script::Body(Vec::new()));

        let result: Result<ByteStream, AgentWireError> = match script {
            Script::Body(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Script::Interrupted(chunks) => Ok(stream::iter(
                chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(AgentWireError::Cancelled))),
            )
            .boxed()),
            Script::Refused(error) => Err(error),
        };
        ready(result)
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// NDJSON body with one record per line.
pub fn ndjson(records: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for record in records {
        body.push_str(record);
        body.push('\n');
    }
    body.into_bytes()
}

pub type TestController = SessionController<ScriptedTransport, MemorySessionStore>;

pub fn controller(scripts: Vec<Script>) -> (TestController, Arc<Mutex<TransportTrace>>) {
    let (transport, trace) = ScriptedTransport::new(scripts);
    let store = MemorySessionStore::new(Some("jwt-test".to_string()));
    (
        SessionController::new(transport, store, SessionOptions::default()),
        trace,
    )
}

/// Record every published snapshot.
pub fn record_snapshots(controller: &mut TestController) -> Arc<Mutex<Vec<Timeline>>> {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    controller.subscribe(move |timeline| lock_unpoisoned(&sink).push(timeline.clone()));
    snapshots
}
