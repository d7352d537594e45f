//! Labeling of collected segments.

use crate::core::{FinalizedSegment, Label};
use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Decides the label of a segment during data collection.
pub trait Labeler {
    /// `None` stops collection.
    fn label(&mut self, segment: &FinalizedSegment) -> Option<Label>;
}

/// Asks on the terminal.
pub struct PromptLabeler<R, W> {
    input: R,
    output: W,
}

impl PromptLabeler<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptLabeler<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Labeler for PromptLabeler<R, W> {
    fn label(&mut self, segment: &FinalizedSegment) -> Option<Label> {
        loop {
            let _ = write!(
                self.output,
                "Movement detected ({} samples, {} ms). 1. Open / 0. Close / 2. Ignore: ",
                segment.len(),
                segment.duration().num_milliseconds()
            );
            let _ = self.output.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match Label::from_csv(&line) {
                Some(label) => return Some(label),
                None => {
                    let _ = writeln!(self.output, "Please enter 1, 0 or 2.");
                }
            }
        }
    }
}

/// Gives every segment the same label.
#[derive(Debug, Clone, Copy)]
pub struct FixedLabeler(pub Label);

impl Labeler for FixedLabeler {
    fn label(&mut self, _segment: &FinalizedSegment) -> Option<Label> {
        Some(self.0)
    }
}

/// Hands out labels from a list, then stops collection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLabeler {
    labels: VecDeque<Label>,
}

impl ScriptedLabeler {
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.labels.len()
    }
}

impl Labeler for ScriptedLabeler {
    fn label(&mut self, _segment: &FinalizedSegment) -> Option<Label> {
        self.labels.pop_front()
    }
}
