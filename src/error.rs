//! Rich diagnostic error types for the semgrav pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the semgrav pipeline.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SemgravError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("node not found: \"{word}\"")]
    #[diagnostic(
        code(semgrav::graph::node_not_found),
        help(
            "The word has no corresponding node in the association graph. \
             It may have been filtered during normalization, or the graph \
             was built from a different seed corpus."
        )
    )]
    NodeNotFound { word: String },

    #[error("invalid graph snapshot: {detail}")]
    #[diagnostic(
        code(semgrav::graph::invalid_snapshot),
        help(
            "The snapshot violates an edge-attribute invariant (a scored edge \
             must carry weight in (0,1] and logprob <= 0). The checkpoint or \
             export it came from is damaged or was written by an incompatible \
             version."
        )
    )]
    InvalidSnapshot { detail: String },

    #[error("unsupported snapshot schema version {found} (expected {expected})")]
    #[diagnostic(
        code(semgrav::graph::schema_version),
        help(
            "This checkpoint was written by a different semgrav release. \
             Re-run the phase from scratch or convert the checkpoint."
        )
    )]
    SchemaVersion { found: u32, expected: u32 },
}

// ---------------------------------------------------------------------------
// Checkpoint store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("checkpoint I/O error at {path}: {source}")]
    #[diagnostic(
        code(semgrav::store::io),
        help(
            "A filesystem operation failed. Check that the checkpoint directory \
             exists, has correct permissions, and that the disk is not full. \
             The previous checkpoint (if any) is still the valid resume point."
        )
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(
        code(semgrav::store::serde),
        help(
            "Failed to serialize checkpoint data to JSON. This indicates a bug \
             in the payload types rather than a recoverable runtime condition."
        )
    )]
    Serialization { message: String },

    #[error("corrupt checkpoint at {path}: {message}")]
    #[diagnostic(
        code(semgrav::store::corrupt),
        help(
            "The checkpoint payload is unreadable or malformed. Delete it with \
             `semgrav checkpoints delete` to fall back to an earlier checkpoint, \
             or start the phase fresh with --no-resume."
        )
    )]
    Corrupt { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("inference request failed: {message}")]
    #[diagnostic(
        code(semgrav::infer::transport),
        help(
            "The inference endpoint could not be reached or returned an error \
             status. Check that the server is running and the [engine] base_url \
             in the config points at it."
        )
    )]
    Transport { message: String },

    #[error("malformed inference response: {message}")]
    #[diagnostic(
        code(semgrav::infer::malformed_response),
        help(
            "The endpoint answered, but the payload did not match the \
             OpenAI-compatible chat completion schema semgrav expects."
        )
    )]
    MalformedResponse { message: String },

    #[error("logprobs missing from scoring response")]
    #[diagnostic(
        code(semgrav::infer::missing_logprobs),
        help(
            "Edge scoring requires token logprobs. Ensure the serving backend \
             supports the `logprobs` and `top_logprobs` request parameters."
        )
    )]
    MissingLogprobs,
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("phase {phase} has no completed input to work from")]
    #[diagnostic(
        code(semgrav::pipeline::phase_not_ready),
        help(
            "Each phase consumes the previous phase's final checkpoint. \
             Run `semgrav build` before `score`, and `score` before `analyze`."
        )
    )]
    PhaseNotReady { phase: u8 },
}

/// Convenience alias for functions returning semgrav results.
pub type SemgravResult<T> = std::result::Result<T, SemgravError>;
