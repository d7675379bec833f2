//! Line oriented console interaction used by reconciliation: reading answers, the numbered label
//! menu and `hhmm` time input.

use std::io::{self, BufRead, Write};

use chrono::NaiveTime;

use super::error::ReconcileError;

/// Line based terminal. Abstracted so prompts can be driven by scripted input in tests.
pub trait Console {
    /// Reads one line. Returns an empty string on end of input.
    fn read_line(&mut self) -> io::Result<String>;

    /// Writes text without adding a new line and flushes it.
    fn write(&mut self, text: &str) -> io::Result<()>;
}

pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }
}

/// Reads a line and strips surrounding whitespace.
pub fn read_answer(console: &mut dyn Console) -> Result<String, ReconcileError> {
    Ok(console.read_line()?.trim().to_string())
}

/// Parses `hhmm` 24-hour input. Anything other than four digits forming a valid time is rejected.
pub fn parse_hhmm(input: &str) -> Result<NaiveTime, ReconcileError> {
    let invalid = || ReconcileError::InvalidTime(input.to_string());
    if input.len() != 4 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hour = input[..2].parse::<u32>().map_err(|_| invalid())?;
    let minute = input[2..].parse::<u32>().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Explicit bounds entered for a gap. `None` keeps the bound of the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeInput {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl RangeInput {
    pub fn is_explicit(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Parses `hhmm-hhmm`. Either side may be blank, so `0900`, `-0930` and an empty line are all
/// accepted.
pub fn parse_range(input: &str) -> Result<RangeInput, ReconcileError> {
    let parse_segment = |segment: &str| {
        let segment = segment.trim();
        if segment.is_empty() {
            Ok(None)
        } else {
            parse_hhmm(segment).map(Some)
        }
    };

    let segments = input.split('-').collect::<Vec<_>>();
    match segments.as_slice() {
        [start] => Ok(RangeInput {
            start: parse_segment(*start)?,
            end: None,
        }),
        [start, end] => Ok(RangeInput {
            start: parse_segment(*start)?,
            end: parse_segment(*end)?,
        }),
        _ => Err(ReconcileError::InvalidTime(input.to_string())),
    }
}

/// Resolves an answer to the label menu. A number picks from the listing, otherwise the first
/// label starting with the answer wins, otherwise the answer becomes a new label.
pub fn resolve_label(answer: &str, labels: &[String], default_label: &str) -> String {
    if answer.is_empty() {
        return default_label.to_string();
    }

    if let Ok(number) = answer.parse::<usize>() {
        if (1..=labels.len()).contains(&number) {
            return labels[number - 1].clone();
        }
    }

    labels
        .iter()
        .find(|label| label.starts_with(answer))
        .cloned()
        .unwrap_or_else(|| answer.to_string())
}

/// Prints the numbered label menu and reads the choice. `default_label` is what a blank answer
/// resolves to.
pub fn choose_label(
    console: &mut dyn Console,
    labels: &[String],
    default_label: &str,
) -> Result<String, ReconcileError> {
    let menu = labels
        .iter()
        .enumerate()
        .map(|(index, label)| format!("{}:{label}, ", index + 1))
        .collect::<String>();
    console.write(&menu)?;
    let answer = read_answer(console)?;
    Ok(resolve_label(&answer, labels, default_label))
}

#[cfg(test)]
pub mod testing {
    use std::{collections::VecDeque, io};

    use super::Console;

    /// Console fed from a fixed list of answers. Running out of answers is an error, which makes
    /// unexpected prompts fail the test.
    #[derive(Default)]
    pub struct ScriptedConsole {
        answers: VecDeque<String>,
        pub output: String,
        pub reads: usize,
    }

    impl ScriptedConsole {
        pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
            Self {
                answers: answers.into_iter().map(String::from).collect(),
                ..Default::default()
            }
        }

        pub fn remaining(&self) -> usize {
            self.answers.len()
        }
    }

    impl Console for ScriptedConsole {
        fn read_line(&mut self) -> io::Result<String> {
            self.reads += 1;
            self.answers.pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left")
            })
        }

        fn write(&mut self, text: &str) -> io::Result<()> {
            self.output.push_str(text);
            Ok(())
        }
    }
}
