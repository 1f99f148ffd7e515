mod config;
mod render;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_wire::{AgentWireClient, CancellationSignal};
use assistant_stream::{view_items, SessionController, SessionOptions, TurnOutcome};
use session_store::{FileSessionStore, MemorySessionStore, SessionPersistence};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::render::{current_turn, render_items};

#[tokio::main]
async fn main() -> io::Result<()> {
    init_logging();

    let config = CliConfig::from_env().map_err(io::Error::other)?;
    let wire_config = config.wire_config();
    let options = SessionOptions::from(&wire_config);
    let client = AgentWireClient::new(wire_config).map_err(io::Error::other)?;
    tracing::info!(
        endpoint = client.endpoint(),
        persistent = config.session_file.is_some(),
        "assistant session ready"
    );

    match config.session_file.as_deref() {
        Some(path) => {
            let mut store = FileSessionStore::open(path).map_err(io::Error::other)?;
            if let Some(token) = config.session_token.as_deref() {
                store.set_session_token(token).map_err(io::Error::other)?;
            }
            run(SessionController::new(client, store, options)).await
        }
        None => {
            let store = MemorySessionStore::new(config.session_token.clone());
            run(SessionController::new(client, store, options)).await
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// One user turn per stdin line until end of input. Ctrl-C cancels the turn
/// in flight.
async fn run<P>(mut controller: SessionController<AgentWireClient, P>) -> io::Result<()>
where
    P: SessionPersistence,
{
    let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(Arc::clone(&cancel));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        cancel.store(false, Ordering::SeqCst);
        match controller.send_with_cancel(&line, Some(&cancel)).await {
            TurnOutcome::Ignored => continue,
            TurnOutcome::Completed => {}
            TurnOutcome::TransportFailed(message) => eprintln!("request failed: {message}"),
        }

        let items = view_items(&controller.timeline());
        let rendered = render_items(current_turn(&items));
        if !rendered.is_empty() {
            println!("{rendered}");
        }
    }
    Ok(())
}

fn spawn_interrupt_listener(cancel: CancellationSignal) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });
}
