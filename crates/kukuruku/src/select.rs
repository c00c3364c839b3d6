//! Fuzzy selection through an external line-oriented selector (fzf by default).

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use nucleo_matcher::{
    Config, Matcher, Utf32Str,
    pattern::{AtomKind, CaseMatching, Normalization, Pattern},
};

use crate::error::KukurukuError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub prompt: String,
    /// Candidate labels in display order.
    pub labels: Vec<String>,
}

impl SelectionRequest {
    pub fn new(prompt: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            labels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Index into `SelectionRequest::labels`.
    Chosen(usize),
    Cancelled,
}

/// Synchronous selection capability.
pub trait Selector {
    fn select(&self, request: &SelectionRequest) -> Result<Selection, KukurukuError>;
}

/// Runs the selector program with labels on stdin and reads the chosen line from stdout.
#[derive(Debug, Clone)]
pub struct FzfSelector {
    program: String,
    args: Vec<String>,
}

impl FzfSelector {
    /// `command` is the program followed by extra arguments.
    pub fn new(command: &[String]) -> Self {
        let (program, args) = command
            .split_first()
            .map(|(p, a)| (p.clone(), a.to_vec()))
            .unwrap_or_else(|| (crate::constants::DEFAULT_SELECTOR.to_string(), Vec::new()));
        Self { program, args }
    }
}

impl Selector for FzfSelector {
    fn select(&self, request: &SelectionRequest) -> Result<Selection, KukurukuError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--prompt={}", request.prompt))
            .arg("--no-sort")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| KukurukuError::Selector(format!("failed to run {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            for label in &request.labels {
                if let Err(e) = writeln!(stdin, "{label}") {
                    // the user may already have aborted the selector
                    if e.kind() != ErrorKind::BrokenPipe {
                        tracing::warn!("failed writing candidates to {}: {}", self.program, e);
                    }
                    break;
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| KukurukuError::Selector(format!("{} did not finish: {}", self.program, e)))?;

        if !output.status.success() {
            tracing::debug!("{} exited with {}; selection cancelled", self.program, output.status);
            return Ok(Selection::Cancelled);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_choice(&stdout, &request.labels))
    }
}

/// Map the selector's output back onto the candidate list.
pub fn parse_choice(output: &str, labels: &[String]) -> Selection {
    let Some(line) = output.lines().next().map(|l| l.trim_end_matches('\r')) else {
        return Selection::Cancelled;
    };
    if line.is_empty() {
        return Selection::Cancelled;
    }

    match labels.iter().position(|label| label == line) {
        Some(index) => Selection::Chosen(index),
        None => {
            tracing::warn!("selector returned an unknown line {:?}", line);
            Selection::Cancelled
        }
    }
}

/// Narrow `keys` by a user query, keeping input order.
///
/// No query keeps everything. An exact key match wins outright; otherwise every key the
/// query fuzzy-matches is kept. Nothing matching is an error.
pub fn narrow(keys: &[String], query: Option<&str>) -> Result<Vec<usize>, KukurukuError> {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok((0..keys.len()).collect());
    };

    if let Some(exact) = keys.iter().position(|k| k == query) {
        return Ok(vec![exact]);
    }

    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::new(query, CaseMatching::Smart, Normalization::Smart, AtomKind::Fuzzy);
    let mut buf = Vec::new();

    let matches: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| {
            pattern
                .score(Utf32Str::new(key, &mut buf), &mut matcher)
                .is_some()
        })
        .map(|(idx, _)| idx)
        .collect();

    if matches.is_empty() {
        Err(KukurukuError::NoMatch(query.to_string()))
    } else {
        Ok(matches)
    }
}

/// Ask the selector to choose among `indices` of `labels`. Returns the chosen original
/// index, or `None` when the user cancelled.
pub fn select_index(
    selector: &dyn Selector,
    prompt: &str,
    labels: &[String],
    indices: &[usize],
) -> Result<Option<usize>, KukurukuError> {
    let request = SelectionRequest::new(
        prompt,
        indices.iter().map(|&i| labels[i].clone()).collect(),
    );

    match selector.select(&request)? {
        Selection::Chosen(pos) => Ok(indices.get(pos).copied()),
        Selection::Cancelled => Ok(None),
    }
}

/// Narrow by query, skip the selector for a single candidate, otherwise ask.
pub fn pick(
    selector: &dyn Selector,
    prompt: &str,
    keys: &[String],
    labels: &[String],
    query: Option<&str>,
) -> Result<Option<usize>, KukurukuError> {
    let candidates = narrow(keys, query)?;
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => select_index(selector, prompt, labels, &candidates),
    }
}
