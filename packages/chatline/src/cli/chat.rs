use anyhow::{Context, Result};
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use chat_protocol::UploadedFile;

use crate::config::Settings;
use crate::connection::{ConnectionEvent, ConnectionHandle, ConnectionManager};
use crate::session::SessionId;
use crate::upload::{UploadClient, UploadError};
use crate::view::{ConversationView, ViewAction, render};

type UploadResult = Result<Vec<UploadedFile>, UploadError>;

/// Run the interactive chat screen until the user quits.
pub async fn run_chat(settings: &Settings, session: SessionId) -> Result<()> {
    use std::io::IsTerminal;
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("chat needs an interactive terminal; try `chatline upload` or `chatline health`");
    }

    let url = settings.server.ws_url(&session)?;
    let uploader = UploadClient::new(&settings.server, &settings.upload)?;
    info!(session_id = %session, url = %url, "starting chat");

    let (handle, events) = ConnectionManager::new(url, &settings.connection).start();

    let mut terminal = ratatui::init();
    let result = chat_loop(&mut terminal, &handle, events, uploader, session).await;
    ratatui::restore();

    handle.shutdown().await;
    result
}

async fn chat_loop(
    terminal: &mut DefaultTerminal,
    handle: &ConnectionHandle,
    mut events: mpsc::Receiver<ConnectionEvent>,
    uploader: UploadClient,
    session: SessionId,
) -> Result<()> {
    let mut view = ConversationView::new();
    let (upload_tx, mut upload_rx) = mpsc::channel::<UploadResult>(4);

    // Blocking terminal reader (polls so it can notice shutdown)
    let (input_tx, mut input_rx) = mpsc::channel::<Event>(64);
    let input_shutdown = Arc::new(AtomicBool::new(false));
    let input_shutdown_thread = input_shutdown.clone();
    std::thread::spawn(move || {
        while !input_shutdown_thread.load(Ordering::Relaxed) {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(_) => break,
            }
            let Ok(ev) = event::read() else { break };
            let forward = match &ev {
                Event::Key(key) => key.kind == KeyEventKind::Press,
                Event::Resize(..) => true,
                _ => false,
            };
            if forward && input_tx.blocking_send(ev).is_err() {
                break;
            }
        }
    });

    let result = loop {
        if let Err(e) = terminal.draw(|frame| render(frame, &view)) {
            break Err(e).context("failed to draw chat screen");
        }

        tokio::select! {
            ev = input_rx.recv() => {
                let Some(ev) = ev else {
                    debug!("terminal input closed");
                    break Ok(());
                };
                if let Event::Key(key) = ev {
                    match view.handle_key(key, handle) {
                        ViewAction::Quit => break Ok(()),
                        ViewAction::Upload(paths) => {
                            let uploader = uploader.clone();
                            let session = session.clone();
                            let tx = upload_tx.clone();
                            info!(files = paths.len(), "upload started");
                            tokio::spawn(async move {
                                let result = uploader.upload(&paths, &session).await;
                                let _ = tx.send(result).await;
                            });
                        }
                        ViewAction::None => {}
                    }
                }
            }

            Some(ev) = events.recv() => apply_connection_event(&mut view, ev),

            Some(result) = upload_rx.recv() => match result {
                Ok(files) => view.upload_succeeded(&files),
                Err(e) => view.upload_failed(&e),
            },
        }
    };

    input_shutdown.store(true, Ordering::Relaxed);
    result
}

/// Fold one connection event into the view.
pub(crate) fn apply_connection_event(view: &mut ConversationView, event: ConnectionEvent) {
    match event {
        ConnectionEvent::StateChanged(state) => {
            debug!(%state, "connection state");
            view.set_connection(state);
        }
        ConnectionEvent::Frame(frame) => {
            view.apply_frame(&frame);
        }
    }
}
