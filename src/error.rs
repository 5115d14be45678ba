use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    SchemaConstruction(String),
    #[error("{0}")]
    FieldResolution(String),
    #[error("cannot parse `{literal}` as {kind}: {reason}")]
    ValueParse {
        kind: &'static str,
        literal: String,
        reason: String,
    },
    #[error("{}: {message}", path.display())]
    XsdLoad { path: PathBuf, message: String },
    #[error("{0}")]
    XmlParse(String),
    #[error("document ended with {open} unclosed element(s)")]
    UnterminatedDocument { open: usize },
    #[error("{0}")]
    SchemaFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Taxonomy label shown by the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SchemaConstruction(_) => "SchemaConstructionError",
            Error::FieldResolution(_) => "FieldResolutionError",
            Error::ValueParse { .. } => "ValueParseError",
            Error::XsdLoad { .. } => "XsdLoadError",
            Error::XmlParse(_) => "XmlParseError",
            Error::UnterminatedDocument { .. } => "UnterminatedDocumentError",
            Error::SchemaFormat(_) => "SchemaFormatError",
            Error::Io(_) => "IoError",
        }
    }

    pub(crate) fn value_parse(kind: &'static str, literal: &str, reason: impl ToString) -> Self {
        Error::ValueParse { kind, literal: literal.to_string(), reason: reason.to_string() }
    }
}
