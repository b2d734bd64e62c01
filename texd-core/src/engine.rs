use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::CoreError;

/// The external typesetting engine a deployment compiles with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Engine {
    /// `xelatex`, run in batch mode.
    #[default]
    XeLaTeX,
    /// `tectonic`, which never prompts on errors.
    Tectonic,
}

impl Engine {
    /// Human-facing engine name, e.g. `"XeLaTeX"`.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::XeLaTeX => "XeLaTeX",
            Self::Tectonic => "Tectonic",
        }
    }

    /// Lowercase slug used for the default binary name and sandbox prefix.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::XeLaTeX => "xelatex",
            Self::Tectonic => "tectonic",
        }
    }

    /// Extension of the staged markup file.
    #[must_use]
    pub const fn source_extension(self) -> &'static str {
        "tex"
    }

    /// Extension of the artifact the engine produces.
    #[must_use]
    pub const fn artifact_extension(self) -> &'static str {
        "pdf"
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Engine {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xelatex" => Ok(Self::XeLaTeX),
            "tectonic" => Ok(Self::Tectonic),
            _ => Err(CoreError::UnknownEngine { name: s.to_owned() }),
        }
    }
}

impl Serialize for Engine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}
