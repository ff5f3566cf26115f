//! Interactive line-editing front end.
//!
//! Questions and confirmations are read through one rustyline editor with a
//! persistent history. The editor blocks, so it lives on its own input
//! thread and the async side talks to it over channels.
//!
//! Ctrl-C on a non-empty line discards the line; on an empty line it ends the
//! session like Ctrl-D.

use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler, KeyEvent,
    RepeatCount,
};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::db::QueryResult;
use crate::error::{AskError, Result};
use crate::render::{render_summary, render_table};
use crate::safety::SafetyLevel;
use crate::session::{Confirmer, Orchestrator, SessionReporter};

/// Prompt shown before each question.
pub const QUESTION_PROMPT: &str = "> ";

/// Prompt shown before a statement runs.
pub const CONFIRM_PROMPT: &str = "Execute this query? (y/N): ";

/// What a line typed at the question prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Question(String),
    Skip,
    Exit,
}

/// Interprets a line typed at the question prompt.
pub fn parse_input(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        ConsoleInput::Skip
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        ConsoleInput::Exit
    } else {
        ConsoleInput::Question(line.to_string())
    }
}

/// Returns true only for an explicit yes.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Result of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C on a non-empty line.
    Interrupted,
    /// Ctrl-D, or Ctrl-C on an empty line.
    Eof,
}

/// A blocking line source. Runs on the console's input thread.
pub trait LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;

    fn add_history(&mut self, _line: &str) {}
}

/// Returns the history file location, next to the log file.
pub fn history_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("askdb").join("history.txt"))
}

/// Maps Ctrl-C on an empty line to end of input.
struct InterruptHandler;

impl ConditionalEventHandler for InterruptHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext,
    ) -> Option<Cmd> {
        if ctx.line().is_empty() {
            Some(Cmd::EndOfFile)
        } else {
            Some(Cmd::Interrupt)
        }
    }
}

/// Terminal editor with a history file.
pub struct ReadlineEditor {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl ReadlineEditor {
    pub fn new(history_path: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new()
            .map_err(|e| AskError::internal(format!("Failed to initialize readline: {e}")))?;
        editor.bind_sequence(
            KeyEvent::ctrl('C'),
            EventHandler::Conditional(Box::new(InterruptHandler)),
        );

        if let Some(path) = &history_path {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("Could not create history directory: {e}");
                }
            }
            if let Err(e) = editor.load_history(path) {
                debug!("No history loaded from {}: {e}", path.display());
            }
        }

        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl LineEditor for ReadlineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(AskError::internal(format!("Failed to read input: {e}"))),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            warn!("Could not add history entry: {e}");
            return;
        }
        if let Some(path) = &self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                warn!("Could not save history to {}: {e}", path.display());
            }
        }
    }
}

enum Request {
    Read {
        prompt: String,
        reply: oneshot::Sender<Result<ReadOutcome>>,
    },
    Remember(String),
}

/// Async handle to the input thread, shared by the question loop and the
/// confirmation gate.
pub struct Console {
    requests: mpsc::UnboundedSender<Request>,
}

impl Console {
    /// Starts the input thread and builds the editor on it.
    pub async fn start<E, F>(make_editor: F) -> Result<Self>
    where
        E: LineEditor + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        let (requests, mut incoming) = mpsc::unbounded_channel::<Request>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("askdb-input".to_string())
            .spawn(move || {
                let mut editor = match make_editor() {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(request) = incoming.blocking_recv() {
                    match request {
                        Request::Read { prompt, reply } => {
                            let _ = reply.send(editor.read_line(&prompt));
                        }
                        Request::Remember(line) => editor.add_history(&line),
                    }
                }
            })
            .map_err(|e| AskError::internal(format!("Failed to start input thread: {e}")))?;

        ready_rx
            .await
            .map_err(|_| AskError::internal("Input thread exited during startup"))??;

        Ok(Self { requests })
    }

    /// Starts a console on the terminal.
    pub async fn terminal() -> Result<Self> {
        Self::start(|| ReadlineEditor::new(history_path())).await
    }

    /// Shows `prompt` and reads one line.
    pub async fn read(&self, prompt: &str) -> Result<ReadOutcome> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Read {
                prompt: prompt.to_string(),
                reply,
            })
            .map_err(|_| input_closed())?;

        response.await.map_err(|_| input_closed())?
    }

    /// Adds a line to the history.
    pub fn remember(&self, line: &str) {
        if self.requests.send(Request::Remember(line.to_string())).is_err() {
            warn!("Input thread is gone, history entry dropped");
        }
    }
}

fn input_closed() -> AskError {
    AskError::internal("Input thread stopped")
}

#[async_trait]
impl Confirmer for Console {
    async fn confirm(&self, _sql: &str) -> Result<bool> {
        // Ctrl-C and end of input count as a no.
        Ok(matches!(
            self.read(CONFIRM_PROMPT).await?,
            ReadOutcome::Line(answer) if is_affirmative(&answer)
        ))
    }
}

/// Prints session progress and results to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl SessionReporter for ConsoleReporter {
    fn attempt_started(&self, attempt: u32, max_attempts: u32) {
        println!("Generating SQL query (attempt {attempt}/{max_attempts})...");
    }

    fn sql_generated(&self, _attempt: u32, sql: &str, _safety: SafetyLevel) {
        println!("Generated SQL: {sql}\n");
    }

    fn auto_executing(&self, _sql: &str) {
        println!("Auto-executing read-only retry query...");
    }

    fn query_failed(&self, _attempt: u32, error: &str) {
        println!("Query failed: {error}");
    }

    fn retrying(&self, _next_attempt: u32, _max_attempts: u32) {
        println!("Trying to fix the query...\n");
    }

    fn results(&self, result: &QueryResult) {
        println!("Results:");
        println!("{}", render_table(result));
        println!("\n{}\n", render_summary(result));
    }

    fn declined(&self) {
        println!("Query execution cancelled.\n");
    }
}

/// Runs the question loop until `exit`, `quit` or end of input.
///
/// Errors from a single question are printed and the loop continues.
/// Returns the number of questions processed.
pub async fn run(
    orchestrator: &Orchestrator,
    console: &Console,
    reporter: &dyn SessionReporter,
) -> Result<usize> {
    let mut processed = 0;

    loop {
        let line = match console.read(QUESTION_PROMPT).await? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted => continue,
            ReadOutcome::Eof => break,
        };

        match parse_input(&line) {
            ConsoleInput::Skip => continue,
            ConsoleInput::Exit => break,
            ConsoleInput::Question(question) => {
                console.remember(&question);
                processed += 1;
                if let Err(e) = orchestrator.process(&question, console, reporter).await {
                    error!("{}: {}", e.category(), e);
                    println!("{}: {}\n", e.category(), e);
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(processed)
}
