pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of the library API.
///
/// Malformed diagram text never produces one of these; the parser drops what
/// it cannot classify and the editor ignores unknown ids.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported direction '{0}' (expected TB, TD or LR)")]
    UnsupportedDirection(String),

    #[error("unknown arrow style '{0}' (expected single or bidirectional)")]
    UnknownArrow(String),

    #[error("unknown node kind '{0}' (expected start, end, process, decision, action or default)")]
    UnknownNodeKind(String),

    #[error("font size must be a positive finite number, got {0}")]
    InvalidFontSize(f32),

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("theme error: {message}")]
    Theme { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("export error: {message}")]
    Export { message: String },
}
