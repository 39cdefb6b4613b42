// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing error taxonomy and consistent error formatting.
//!
//! Every failure the pipeline can report to a requester maps onto one
//! [`VidrunError`] variant. `Display` gives the short line sent back to the
//! requester; [`VidrunError::explain`] renders the long form with possible
//! causes and fixes for terminal output.

use std::fmt;

/// Hint appended to every long-form error.
pub const HELP_HINT: &str = "Run `vidrun --help` for usage.";

/// Formats an error message with title, causes and fixes.
///
/// # Example
///
/// ```
/// use vidrun::error::format_error;
///
/// let error = format_error(
///     "Failed to create generation task",
///     &["API key rejected", "Model not enabled for this account"],
///     &["Check the key: vidrun config"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n\n", title);

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(HELP_HINT);
    output
}

/// Builder for constructing formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

/// Failures reported back to whoever asked for a video.
#[derive(Debug, Clone, PartialEq)]
pub enum VidrunError {
    /// Configuration is missing or malformed. Raised before any network call.
    Config(Vec<String>),
    /// Generate was called with an empty prompt.
    MissingPrompt,
    /// The creation call did not return a task id.
    Submission(String),
    /// Polling ended without a usable result.
    Generation(String),
    /// Result could not be fetched to local storage.
    Download(String),
    /// Play was called without an id or name.
    MissingIdentifier,
    /// No catalog entry matches the identifier.
    VideoNotFound(String),
    /// The catalog knows the video but its file is gone.
    MissingFile(String),
    /// Model selection outside `1..=max` or not a number.
    InvalidModelIndex { input: String, max: usize },
    /// Video storage directory or catalog unusable.
    Storage(String),
}

impl fmt::Display for VidrunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(errors) => write!(f, "Configuration error: {}", errors.join("; ")),
            Self::MissingPrompt => write!(
                f,
                "Please describe the video, e.g. `vidrun generate a kitten chasing a ball`"
            ),
            Self::Submission(_) => write!(
                f,
                "Failed to create the video generation task, check the configuration or retry later"
            ),
            Self::Generation(_) => write!(f, "Video generation failed or timed out, please retry later"),
            Self::Download(_) => write!(f, "Video download failed"),
            Self::MissingIdentifier => write!(
                f,
                "Please give a video number or name, e.g. `vidrun play 1` or `vidrun play kitten`"
            ),
            Self::VideoNotFound(id) => write!(f, "Video not found: '{}'", id),
            Self::MissingFile(name) => write!(f, "Video file does not exist: {}", name),
            Self::InvalidModelIndex { max, .. } => {
                write!(f, "Invalid model number, valid range is 1-{}", max)
            }
            Self::Storage(_) => write!(f, "Video storage is not available"),
        }
    }
}

impl std::error::Error for VidrunError {}

impl VidrunError {
    /// Long-form rendering with causes and fixes.
    pub fn explain(&self) -> String {
        match self {
            Self::Config(errors) => {
                let mut builder = ErrorBuilder::new("Invalid configuration");
                for e in errors {
                    builder = builder.cause(e.clone());
                }
                builder
                    .fix("Edit ~/.vidrun/config.json")
                    .fix("Or export VIDRUN_API_KEY=<your key>")
                    .build()
            }
            Self::Submission(detail) => ErrorBuilder::new(self.to_string())
                .cause(detail.clone())
                .cause("API key rejected or expired")
                .cause("Model not enabled for this account")
                .fix("List models: vidrun models")
                .fix("Verify api.api_base and api.api_key in the config")
                .build(),
            Self::Generation(detail) => ErrorBuilder::new(self.to_string())
                .cause(detail.clone())
                .fix("Increase settings.max_wait_time")
                .fix("Try a shorter duration or draft mode")
                .build(),
            Self::Download(detail) => ErrorBuilder::new(self.to_string())
                .cause(detail.clone())
                .fix("Check free disk space and settings.download_dir")
                .build(),
            Self::InvalidModelIndex { input, .. } => ErrorBuilder::new(self.to_string())
                .cause(format!("Got '{}'", input))
                .fix("List models: vidrun models")
                .build(),
            Self::Storage(detail) => ErrorBuilder::new(self.to_string())
                .cause(detail.clone())
                .fix("Check settings.download_dir points to a writable directory")
                .build(),
            Self::VideoNotFound(_) => ErrorBuilder::new(self.to_string())
                .fix("List stored videos: vidrun list")
                .build(),
            _ => format_error(&self.to_string(), &[], &[]),
        }
    }
}
