// src/error.rs
//! Error handling for the whole crate.
//!
//! - One enum, cheap to match, allocations only on error paths.
//! - Construction errors (bad spawn dimensions) are distinct from config and
//!   collaborator (audio) failures so callers can decide what is fatal.

use std::fmt;
use thiserror::Error;

/// Main error type. Send + Sync + 'static.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O errors (config files, sound clips).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON config (de)serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A shape dimension that is zero, negative, or not finite.
    #[error("invalid {what}: {value} (must be positive and finite)")]
    InvalidDimension { what: &'static str, value: f32 },

    /// Semantically invalid configuration values.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Audio collaborator failure. Never fatal to the simulation.
    #[error("audio playback failed: {0}")]
    Audio(String),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn format(args: fmt::Arguments) -> Self {
        Self::Custom(fmt::format(args))
    }

    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    #[inline]
    pub fn audio<S: fmt::Display>(err: S) -> Self {
        Self::Audio(err.to_string())
    }

    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    #[inline]
    pub fn is_invalid_dimension(&self) -> bool {
        match self {
            Error::InvalidDimension { .. } => true,
            Error::WithContext { source, .. } => source.is_invalid_dimension(),
            _ => false,
        }
    }

    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Json(_))
    }

    #[inline]
    pub fn is_audio(&self) -> bool {
        matches!(self, Error::Audio(_))
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
