//! Operator input for broadcast sessions

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::error::{DockiError, Result};

/// One read from the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl+C at the prompt
    Interrupt,
    /// Ctrl+D or a closed terminal
    End,
}

/// Source of operator lines
pub trait OperatorInput {
    fn next_event(&mut self, prompt: &str) -> InputEvent;
}

/// Line editor with persistent history
pub struct LineEditor {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl LineEditor {
    /// History is loaded from and saved to `history` when given
    pub fn new(history: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new().map_err(|e| DockiError::Multiplexer(e.to_string()))?;
        if let Some(path) = &history {
            // Missing on first use
            let _ = editor.load_history(path);
        }
        Ok(Self { editor, history })
    }
}

impl OperatorInput for LineEditor {
    fn next_event(&mut self, prompt: &str) -> InputEvent {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                InputEvent::Line(line)
            }
            Err(ReadlineError::Interrupted) => InputEvent::Interrupt,
            Err(ReadlineError::Eof) => InputEvent::End,
            Err(e) => {
                warn!(error = %e, "reading operator input failed");
                InputEvent::End
            }
        }
    }
}

impl Drop for LineEditor {
    fn drop(&mut self) {
        if let Some(path) = &self.history {
            if let Err(e) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %e, "failed to save history");
            }
        }
    }
}

/// Replays fixed events, then reports end of input
#[cfg(test)]
pub struct ScriptedInput(pub std::collections::VecDeque<InputEvent>);

#[cfg(test)]
impl OperatorInput for ScriptedInput {
    fn next_event(&mut self, _prompt: &str) -> InputEvent {
        self.0.pop_front().unwrap_or(InputEvent::End)
    }
}
