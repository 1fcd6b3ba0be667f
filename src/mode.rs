//! Parsing of symbolization directives such as `local:force` or
//! `remote:demangle=full`.

use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::log::warn;
use crate::Warning;


/// The grammar of a symbolization directive, for diagnostics.
pub const DIRECTIVE_GRAMMAR: &str =
    "[local|fastlocal|remote|none][:force][:demangle=[none|full|templates|default]]";


/// How function names should be demangled and simplified.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DemangleMode {
    /// Demangle and strip parameter as well as template parameter
    /// lists.
    #[default]
    Default,
    /// Demangle, keeping parameters, template parameters, and return
    /// types, but strip compiler generated clone suffixes.
    Full,
    /// Do not demangle at all.
    None,
    /// Demangle and strip parameter lists, but keep template
    /// parameters.
    Templates,
}

impl DemangleMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "full" => Some(Self::Full),
            "none" => Some(Self::None),
            "templates" => Some(Self::Templates),
            _ => None,
        }
    }
}

impl Display for DemangleMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::Default => "default",
            Self::Full => "full",
            Self::None => "none",
            Self::Templates => "templates",
        };
        f.write_str(s)
    }
}


/// The configuration of a single symbolization run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Mode {
    /// Whether symbolization should happen at all.
    ///
    /// If `false`, profiles are left untouched, including function
    /// names.
    pub enabled: bool,
    /// Whether to resolve addresses using locally available binaries.
    pub local: bool,
    /// Whether the object inspector should favor speed over
    /// accuracy.
    pub fast: bool,
    /// Whether to fall back to remote symbol services.
    pub remote: bool,
    /// Whether to re-symbolize already symbolized mappings and
    /// re-normalize already simplified names.
    pub force: bool,
    /// How to demangle function names.
    pub demangle: DemangleMode,
}

impl Default for Mode {
    fn default() -> Self {
        Self {
            enabled: true,
            local: true,
            fast: false,
            remote: true,
            force: false,
            demangle: DemangleMode::Default,
        }
    }
}

impl Mode {
    /// A mode disabling symbolization altogether.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            local: false,
            remote: false,
            ..Self::default()
        }
    }

    /// Parse a directive string into a [`Mode`].
    ///
    /// Directives are colon separated, case-insensitive tokens. Later
    /// tokens take precedence over earlier ones, except for `none`
    /// (or `no`), which disables symbolization immediately. Tokens
    /// that are not understood are reported as
    /// [`Warning::UnrecognizedOption`] and otherwise ignored.
    pub fn parse(directive: &str) -> (Self, Vec<Warning>) {
        let mut mode = Self::default();
        let mut warnings = Vec::new();

        for token in directive.to_lowercase().split(':') {
            match token {
                "none" | "no" => return (Self::disabled(), warnings),
                "local" | "fastlocal" => {
                    mode.local = true;
                    mode.remote = false;
                    mode.fast = token == "fastlocal";
                }
                "remote" => {
                    mode.local = false;
                    mode.remote = true;
                }
                "" | "force" => mode.force = true,
                _ => match token.strip_prefix("demangle=").and_then(DemangleMode::parse) {
                    Some(DemangleMode::Default) => (),
                    Some(demangle) => {
                        mode.demangle = demangle;
                        mode.force = true;
                    }
                    None => {
                        let warning = Warning::UnrecognizedOption {
                            option: token.to_string(),
                        };
                        warn!("{warning}");
                        let () = warnings.push(warning);
                    }
                },
            }
        }
        (mode, warnings)
    }
}
