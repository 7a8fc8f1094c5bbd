//! # Terminal Front End
//!
//! A line-oriented adapter over the session core. It owns the I/O: reading
//! stdin, printing the transcript, spawning transport and encoding tasks.
//! All state changes go through [`update`]; this module only executes the
//! returned [`Effect`]s.
//!
//! ```text
//!   stdin thread ──Line──┐
//!   transport tasks ─────┼──▶ mpsc ──▶ Cli::handle ──▶ update() ──▶ Effect
//!   encode tasks ────────┘                  │
//!                                           └──▶ print (if the viewport follows)
//! ```

pub mod command;
pub mod render;

use log::{debug, info, warn};
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use crate::core::action::{Action, Effect, update};
use crate::core::attachment::{self, PendingUpload};
use crate::core::config::ResolvedConfig;
use crate::core::message::Message;
use crate::core::state::{Session, SessionListener, SessionStatus};
use crate::core::transcript;
use crate::core::viewport::{ScrollCommand, Viewport};
use crate::transport::{HttpTransport, StreamEvent, Transport, TransportRequest};
use command::Command;

/// Rows of transcript shown by `/up`, `/down` and `/latest`.
const PAGE_LINES: u32 = 20;

/// Viewport units per transcript line, so pixel-sized thresholds carry over.
const LINE_HEIGHT: u32 = 20;

/// Everything the event loop reacts to.
pub enum LoopEvent {
    Line(String),
    Action(Action),
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What the live output line currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Live {
    Idle,
    Reasoning,
    Text,
}

/// What to print once an action has been applied.
enum Echo {
    Quiet,
    Event(StreamEvent),
    Complete,
    Failed,
    UploadFailed,
    ToolCall(String),
    NewMessages(usize),
}

/// Logs session notifications.
struct LogListener;

impl SessionListener for LogListener {
    fn message_sent(&self, text: &str) {
        info!("Message sent ({} chars)", text.chars().count());
    }

    fn response_received(&self, text: &str) {
        info!("Response received ({} chars)", text.chars().count());
    }

    fn error(&self, error: &dyn std::error::Error) {
        warn!("Session error: {}", error);
    }
}

pub struct Cli<W: Write> {
    session: Session,
    viewport: Viewport,
    transport: Arc<dyn Transport>,
    tx: mpsc::Sender<LoopEvent>,
    out: W,
    staged: Vec<PathBuf>,
    active_abort_handles: Vec<tokio::task::AbortHandle>,
    show_reasoning: bool,
    enable_file_upload: bool,
    live: Live,
    input_closed: bool,
}

impl<W: Write> Cli<W> {
    pub fn new(
        config: &ResolvedConfig,
        transport: Arc<dyn Transport>,
        history: Option<Vec<Message>>,
        tx: mpsc::Sender<LoopEvent>,
        out: W,
    ) -> Self {
        let session = Session::new(config.settings.clone(), Arc::new(LogListener), history);
        let mut viewport = Viewport::new(config.near_bottom_threshold);
        viewport.resize(PAGE_LINES * LINE_HEIGHT);
        let mut cli = Self {
            session,
            viewport,
            transport,
            tx,
            out,
            staged: Vec::new(),
            active_abort_handles: Vec::new(),
            show_reasoning: config.show_reasoning_steps,
            enable_file_upload: config.enable_file_upload,
            live: Live::Idle,
            input_closed: false,
        };
        cli.refresh_viewport();
        cli
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Prints the greeting and the tail of any loaded history.
    pub fn start(&mut self, endpoint: &str) -> io::Result<()> {
        self.say(format!("parley - talking to {endpoint} (/help for commands)"))?;
        if !self.session.messages.is_empty() {
            self.print_window()?;
        }
        self.out.flush()
    }

    pub fn handle(&mut self, event: LoopEvent) -> io::Result<Flow> {
        let flow = match event {
            LoopEvent::Line(line) => self.handle_line(&line)?,
            LoopEvent::Action(action) => {
                self.dispatch(action)?;
                Flow::Continue
            }
            LoopEvent::InputClosed => {
                debug!("Input closed");
                self.input_closed = true;
                Flow::Continue
            }
        };
        self.out.flush()?;

        // With stdin gone, stay only as long as there is work in flight
        if self.input_closed && !self.has_work() {
            return Ok(Flow::Quit);
        }
        Ok(flow)
    }

    /// Uploads paused by an error only resume on user input, so they don't count.
    fn has_work(&self) -> bool {
        self.session.is_busy()
            || (self.session.status != SessionStatus::Error
                && !self.session.pending_uploads.is_empty())
    }

    fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let Some(command) = command::parse(line) else {
            return Ok(Flow::Continue);
        };
        debug!("Command: {:?}", command);
        match command {
            Command::Say(text) => {
                let files = mem::take(&mut self.staged);
                self.submit(text, files)?;
            }
            Command::Send => {
                if self.staged.is_empty() {
                    self.say("! nothing staged (use /attach <path>)")?;
                } else {
                    let files = mem::take(&mut self.staged);
                    self.submit(String::new(), files)?;
                }
            }
            Command::Attach(path) => self.stage(path)?,
            Command::Detach(name) => self.detach(&name)?,
            Command::Cancel => {
                if self.session.status != SessionStatus::Streaming {
                    self.say("! nothing to cancel")?;
                }
                self.dispatch(Action::Cancel)?;
            }
            Command::Retry => {
                self.dispatch(Action::Retry)?;
            }
            Command::Dismiss => {
                self.dispatch(Action::DismissError)?;
            }
            Command::Approve(id) => {
                self.dispatch(Action::ApproveToolCall(id))?;
            }
            Command::Reject(id) => {
                self.dispatch(Action::RejectToolCall(id))?;
            }
            Command::Up(n) => {
                let offset = self.viewport.offset().saturating_sub(n * LINE_HEIGHT);
                self.viewport.on_scroll(offset);
                self.print_window()?;
            }
            Command::Down(n) => {
                let offset = self.viewport.offset().saturating_add(n * LINE_HEIGHT);
                self.viewport.on_scroll(offset);
                self.print_window()?;
            }
            Command::Latest => {
                self.viewport.jump_to_latest();
                self.print_window()?;
            }
            Command::Save(path) => self.save(&path)?,
            Command::Help => self.say(render::HELP)?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Invalid(message) => self.say(format!("! {message}"))?,
        }
        Ok(Flow::Continue)
    }

    fn submit(&mut self, text: String, files: Vec<PathBuf>) -> io::Result<()> {
        let action = Action::Submit {
            text,
            files: files.clone(),
        };
        if !self.dispatch(action)? {
            // Refused submissions keep their files staged
            self.staged = files;
        }
        Ok(())
    }

    fn stage(&mut self, path: PathBuf) -> io::Result<()> {
        if !self.enable_file_upload {
            return self.say("! file uploads are disabled");
        }
        let name = PendingUpload::new(path.clone()).name;
        self.staged.push(path);
        self.say(format!("staged {name} ({} file(s) staged)", self.staged.len()))
    }

    fn detach(&mut self, name: &str) -> io::Result<()> {
        let before = self.staged.len();
        self.staged.retain(|p| {
            p.as_os_str() != name && p.file_name().is_none_or(|f| f != name)
        });
        if self.staged.len() != before {
            return self.say(format!("unstaged {name}"));
        }

        let queued = self
            .session
            .pending_uploads
            .iter()
            .find(|u| u.id == name || u.name == name)
            .map(|u| u.id.clone());
        match queued {
            Some(id) => {
                self.dispatch(Action::RemoveAttachment(id))?;
                self.say(format!("removed {name} from the upload queue"))
            }
            None => self.say(format!("! no staged or queued file named {name}")),
        }
    }

    fn save(&mut self, path: &Path) -> io::Result<()> {
        match transcript::save(path, &self.session.messages) {
            Ok(()) => self.say(format!("saved {} message(s) to {}", self.session.messages.len(), path.display())),
            Err(e) => {
                warn!("Save failed: {}", e);
                self.say(format!("! {e}"))
            }
        }
    }

    fn is_current(&self, request_id: u64) -> bool {
        self.session.active_request == Some(request_id)
    }

    /// Applies an action and runs its effect. Returns false if it was refused.
    pub fn dispatch(&mut self, action: Action) -> io::Result<bool> {
        let echo = match &action {
            Action::TransportEvent { request_id, event } if self.is_current(*request_id) => {
                Echo::Event(event.clone())
            }
            Action::TransportComplete { request_id } if self.is_current(*request_id) => {
                Echo::Complete
            }
            Action::TransportFailed { request_id, .. } if self.is_current(*request_id) => {
                Echo::Failed
            }
            Action::AttachmentFailed { .. } => Echo::UploadFailed,
            Action::ApproveToolCall(id)
            | Action::RejectToolCall(id)
            | Action::ToolCallUpdate { id, .. } => Echo::ToolCall(id.clone()),
            Action::Retry | Action::AttachmentEncoded { .. } => {
                Echo::NewMessages(self.session.messages.len())
            }
            _ => Echo::Quiet,
        };

        let effect = match update(&mut self.session, action) {
            Ok(effect) => effect,
            Err(e) => {
                self.say(format!("! {e}"))?;
                return Ok(false);
            }
        };
        self.run_effect(effect);
        self.refresh_viewport_and_hint()?;
        self.echo(echo)?;
        Ok(true)
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::SpawnRequest(request_id) => {
                self.abort_active();
                self.active_abort_handles = spawn_request(
                    self.session.messages.clone(),
                    self.transport.clone(),
                    request_id,
                    self.tx.clone(),
                );
            }
            Effect::StopTransport => self.abort_active(),
            Effect::EncodeAttachment(upload) => spawn_encode(upload, self.tx.clone()),
            // The service runs tools; the decision is already on the tool call
            Effect::ToolDecision { id, approved } => {
                debug!("Tool decision for {}: approved={}", id, approved);
            }
        }
    }

    fn abort_active(&mut self) {
        for handle in self.active_abort_handles.drain(..) {
            handle.abort();
        }
    }

    /// Stops any in-flight request.
    pub fn shutdown(&mut self) {
        self.abort_active();
    }

    pub fn save_to(&self, path: &Path) -> Result<(), transcript::TranscriptError> {
        transcript::save(path, &self.session.messages)
    }

    fn transcript(&self) -> Vec<String> {
        render::transcript_lines(&self.session.messages, self.show_reasoning)
    }

    fn refresh_viewport(&mut self) -> ScrollCommand {
        let height = self.transcript().len() as u32 * LINE_HEIGHT;
        self.viewport.content_changed(height)
    }

    fn refresh_viewport_and_hint(&mut self) -> io::Result<()> {
        let had_jump = self.viewport.show_jump();
        self.refresh_viewport();
        if self.viewport.show_jump() && !had_jump {
            self.say("-- new content below (/latest to jump) --")?;
        }
        Ok(())
    }

    fn print_window(&mut self) -> io::Result<()> {
        let lines = self.transcript();
        let start = (self.viewport.offset() / LINE_HEIGHT) as usize;
        let end = (start + PAGE_LINES as usize).min(lines.len());
        self.end_live()?;
        for line in lines.get(start..end).unwrap_or_default() {
            writeln!(self.out, "{line}")?;
        }
        if end < lines.len() {
            writeln!(self.out, "-- {} more line(s) below --", lines.len() - end)?;
        }
        Ok(())
    }

    fn echo(&mut self, echo: Echo) -> io::Result<()> {
        // Errors are always shown; everything else only while following
        match echo {
            Echo::Failed => {
                let error = self.session.error.clone().unwrap_or_default();
                return self.say(format!("! {error} (/retry or /dismiss)"));
            }
            Echo::UploadFailed => {
                if let Some(failure) = self.session.upload_failures.last() {
                    let line = format!("! upload skipped: {}", failure.message);
                    return self.say(line);
                }
                return Ok(());
            }
            _ => {}
        }
        if !self.viewport.auto_follow() {
            self.live = Live::Idle;
            return Ok(());
        }

        match echo {
            Echo::Event(StreamEvent::TextDelta(delta)) => self.stream(Live::Text, "ai: ", &delta),
            Echo::Event(StreamEvent::ReasoningDelta(delta)) => {
                if self.show_reasoning {
                    self.stream(Live::Reasoning, "ai: (thinking) ", &delta)
                } else {
                    Ok(())
                }
            }
            Echo::Event(StreamEvent::ToolCall { id, .. })
            | Echo::Event(StreamEvent::ToolOutput { id, .. })
            | Echo::Event(StreamEvent::ToolError { id, .. })
            | Echo::ToolCall(id) => self.print_tool_call(&id),
            Echo::Complete => self.end_live(),
            Echo::NewMessages(from) => {
                let lines: Vec<String> = self.session.messages[from.min(self.session.messages.len())..]
                    .iter()
                    .flat_map(|m| render::message_lines(m, self.show_reasoning))
                    .collect();
                for line in lines {
                    self.say(line)?;
                }
                Ok(())
            }
            Echo::Quiet | Echo::Failed | Echo::UploadFailed => Ok(()),
        }
    }

    fn print_tool_call(&mut self, id: &str) -> io::Result<()> {
        let line = self
            .session
            .messages
            .iter()
            .rev()
            .flat_map(|m| m.tool_calls.iter())
            .find(|tc| tc.id == id)
            .map(|tc| {
                let mut line = render::tool_call_line(tc);
                if let Some(error) = &tc.error {
                    line.push_str(&format!(": {error}"));
                } else if let Some(result) = &tc.result {
                    line.push_str(&format!(" -> {result}"));
                }
                line
            });
        match line {
            Some(line) => self.say(line),
            None => Ok(()),
        }
    }

    fn stream(&mut self, section: Live, prefix: &str, delta: &str) -> io::Result<()> {
        if self.live != section {
            self.end_live()?;
            write!(self.out, "{prefix}")?;
            self.live = section;
        }
        write!(self.out, "{delta}")
    }

    fn end_live(&mut self) -> io::Result<()> {
        if self.live != Live::Idle {
            writeln!(self.out)?;
            self.live = Live::Idle;
        }
        Ok(())
    }

    fn say(&mut self, line: impl Display) -> io::Result<()> {
        self.end_live()?;
        writeln!(self.out, "{line}")
    }
}

/// Reads stdin lines on a plain thread; stdin has no async story worth the cost here.
fn spawn_input_reader(tx: mpsc::Sender<LoopEvent>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(LoopEvent::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        if tx.send(LoopEvent::InputClosed).is_err() {
            debug!("Input closed after event loop exit");
        }
    });
}

pub fn build_transport(config: &ResolvedConfig) -> Arc<dyn Transport> {
    Arc::new(HttpTransport::new(
        config.endpoint.clone(),
        config.api_key.clone(),
        config.headers.clone(),
    ))
}

/// Runs the interactive loop until `/quit` or end of input.
pub fn run(
    config: &ResolvedConfig,
    history: Option<Vec<Message>>,
    save_on_exit: Option<PathBuf>,
) -> io::Result<()> {
    let transport = build_transport(config);
    info!("Using {} transport at {}", transport.name(), config.endpoint);

    let (tx, rx) = mpsc::channel();
    let mut cli = Cli::new(config, transport, history, tx.clone(), io::stdout());
    spawn_input_reader(tx);
    cli.start(&config.endpoint)?;

    while let Ok(event) = rx.recv() {
        if cli.handle(event)? == Flow::Quit {
            break;
        }
    }
    cli.shutdown();

    if let Some(path) = save_on_exit {
        cli.save_to(&path).map_err(io::Error::other)?;
        info!("Saved conversation to {}", path.display());
    }
    Ok(())
}

fn spawn_encode(upload: PendingUpload, tx: mpsc::Sender<LoopEvent>) {
    info!("Encoding {} (upload={})", upload.name, upload.id);
    tokio::spawn(async move {
        let action = match attachment::encode(&upload.path).await {
            Ok(attachment) => Action::AttachmentEncoded {
                upload_id: upload.id,
                attachment,
            },
            Err(error) => Action::AttachmentFailed {
                upload_id: upload.id,
                error,
            },
        };
        if tx.send(LoopEvent::Action(action)).is_err() {
            warn!("Failed to send upload result: receiver dropped");
        }
    });
}

/// Starts a transport request and forwards its events into the loop.
///
/// The outcome is reported only after every event has been forwarded, so
/// `TransportComplete`/`TransportFailed` never overtake a delta.
fn spawn_request(
    messages: Vec<Message>,
    transport: Arc<dyn Transport>,
    request_id: u64,
    tx: mpsc::Sender<LoopEvent>,
) -> Vec<tokio::task::AbortHandle> {
    info!(
        "Spawning request {} ({} messages)",
        request_id,
        messages.len()
    );

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<StreamEvent>(100);
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let stream_handle = tokio::spawn(async move {
        let request = TransportRequest {
            messages: &messages,
        };
        let outcome = transport.stream(request, event_tx).await;
        if done_tx.send(outcome).is_err() {
            debug!("Request {} outcome dropped: forwarder gone", request_id);
        }
    });

    let forward_handle = tokio::spawn(async move {
        let mut forwarded = 0usize;
        while let Some(event) = event_rx.recv().await {
            forwarded += 1;
            debug!("Forwarding {} (request={})", event.label(), request_id);
            let action = Action::TransportEvent { request_id, event };
            if tx.send(LoopEvent::Action(action)).is_err() {
                warn!("Failed to forward stream event: receiver dropped");
                return;
            }
        }

        let action = match done_rx.await {
            Ok(Ok(())) => {
                info!("Request {} complete: {} events", request_id, forwarded);
                Action::TransportComplete { request_id }
            }
            Ok(Err(error)) => {
                info!("Request {} failed after {} events: {}", request_id, forwarded, error);
                Action::TransportFailed { request_id, error }
            }
            // Stream task aborted; nobody is waiting for this request
            Err(_) => return,
        };
        if tx.send(LoopEvent::Action(action)).is_err() {
            warn!("Failed to send request outcome: receiver dropped");
        }
    });

    vec![stream_handle.abort_handle(), forward_handle.abort_handle()]
}
