use std::fmt;

// Errors for key sequences handed to the index from outside.
// A sequence that comes out of the flattener is always well formed, so these only
// arise at the public entry points that accept raw keys.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyError {
    // There were no keys at all.
    Empty,

    // The arities promised more subtrees than there were keys left.
    // `missing` counts the subtrees still owed when the sequence ran out.
    Truncated { missing: usize },

    // A complete tree was parsed before `position`, but keys remain.
    Trailing { position: usize },

    // The key at `position` has an arity its kind can't have, like a projection
    // without the projected value.
    BadArity { position: usize },

    // The star at `position` has an id too large to name a metavariable.
    StarOutOfRange { position: usize },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyError::Empty => write!(f, "empty key sequence"),
            KeyError::Truncated { missing } => {
                write!(f, "key sequence ends with {} argument(s) missing", missing)
            }
            KeyError::Trailing { position } => {
                write!(f, "key sequence has trailing keys from position {}", position)
            }
            KeyError::BadArity { position } => {
                write!(f, "key at position {} has an impossible arity", position)
            }
            KeyError::StarOutOfRange { position } => {
                write!(f, "star at position {} has an id out of range", position)
            }
        }
    }
}

impl std::error::Error for KeyError {}

// A failure to read the textual expression syntax.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    // Byte offset into the input.
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

// A configuration document that could not be read.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError(format!("{}", error))
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError(format!("{}", error))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Any error the index reports to its callers.
#[derive(Debug)]
pub enum IndexError {
    Key(KeyError),
    Parse(ParseError),
    Config(ConfigError),
}

impl From<KeyError> for IndexError {
    fn from(error: KeyError) -> Self {
        IndexError::Key(error)
    }
}

impl From<ParseError> for IndexError {
    fn from(error: ParseError) -> Self {
        IndexError::Parse(error)
    }
}

impl From<ConfigError> for IndexError {
    fn from(error: ConfigError) -> Self {
        IndexError::Config(error)
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndexError::Key(e) => write!(f, "{}", e),
            IndexError::Parse(e) => write!(f, "{}", e),
            IndexError::Config(e) => write!(f, "config error: {}", e),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<IndexError> for String {
    fn from(error: IndexError) -> Self {
        error.to_string()
    }
}
