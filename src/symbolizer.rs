use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::inspect::Inspect;
use crate::local;
use crate::log::debug;
use crate::log::warn;
use crate::normalize::demangle_profile;
use crate::remote;
use crate::remote::MappingSources;
use crate::remote::Post;
use crate::Error;
use crate::ErrorExt as _;
use crate::Mode;
use crate::Profile;
use crate::Result;
use crate::DIRECTIVE_GRAMMAR;


/// A non-fatal problem encountered while symbolizing a profile.
///
/// Warnings are logged as they happen and are additionally collected in
/// the [`Report`] of a symbolization run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Warning {
    /// The file name of the profile's main binary is unknown.
    MainBinaryUnavailable,
    /// The binary backing a mapping could not be opened.
    OpenFailed {
        /// The path of the binary.
        path: String,
        /// A description of the failure.
        error: String,
    },
    /// The binary found on disk does not match the one the profile was
    /// taken from.
    BuildIdMismatch {
        /// The path of the binary.
        path: String,
        /// The build ID recorded in the profile.
        expected: String,
        /// The build ID of the binary on disk.
        actual: String,
    },
    /// The file names of one or more shared objects are unknown.
    MissingBinaries,
    /// A directive contained an option that is not understood.
    UnrecognizedOption {
        /// The offending option.
        option: String,
    },
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MainBinaryUnavailable => f.write_str(
                "main binary filename not available; supply the binary explicitly to symbolize it",
            ),
            Self::OpenFailed { path, error } => {
                write!(f, "local symbolization failed for `{path}`: {error}")
            }
            Self::BuildIdMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "build ID mismatch for `{path}`: profile has {expected}, \
                 binary has {actual}; skipping"
            ),
            Self::MissingBinaries => f.write_str(
                "some binary filenames not available; symbolization may be incomplete",
            ),
            Self::UnrecognizedOption { option } => write!(
                f,
                "ignoring unrecognized symbolization option `{option}`; \
                 expecting {DIRECTIVE_GRAMMAR}"
            ),
        }
    }
}


/// The outcome of one stage of a symbolization run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Stage {
    /// The stage did not run.
    #[default]
    Skipped,
    /// The stage ran to completion.
    Succeeded,
    /// The stage ran, but failed as a whole.
    Failed,
}


/// A summary of a successful symbolization run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    /// All warnings, in the order they were encountered.
    pub warnings: Vec<Warning>,
    /// The outcome of local symbolization.
    pub local: Stage,
    /// The outcome of remote symbolization.
    pub remote: Stage,
}


/// A builder for configurable construction of [`Symbolizer`] objects.
///
/// By default the builder uses an [`ElfInspector`][crate::ElfInspector]
/// for local symbolization (if the `elf` feature is enabled) and
/// creates an [`HttpTransport`][crate::HttpTransport] on demand for
/// talking to symbol services (if the `http` feature is enabled).
pub struct Builder {
    inspector: Option<Box<dyn Inspect>>,
    sources: MappingSources,
    transport: Option<Box<dyn Post>>,
}

impl Builder {
    /// Set the object inspector to use for local symbolization.
    pub fn set_inspector<I>(mut self, inspector: I) -> Self
    where
        I: Inspect + 'static,
    {
        self.inspector = Some(Box::new(inspector));
        self
    }

    /// Set the candidate symbol services for remote symbolization.
    pub fn set_sources(mut self, sources: MappingSources) -> Self {
        self.sources = sources;
        self
    }

    /// Set the transport used for talking to symbol services.
    pub fn set_transport<P>(mut self, transport: P) -> Self
    where
        P: Post + 'static,
    {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Create the [`Symbolizer`] object.
    pub fn build(self) -> Symbolizer {
        let Self {
            inspector,
            sources,
            transport,
        } = self;

        Symbolizer {
            inspector,
            sources,
            transport,
        }
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Builder")
            .field("inspector", &self.inspector)
            .field("sources", &self.sources)
            .field("transport", &self.transport.as_ref().map(|_| "<transport>"))
            .finish()
    }
}

impl Default for Builder {
    fn default() -> Self {
        #[cfg(feature = "elf")]
        let inspector = Some(Box::new(crate::ElfInspector::new()) as Box<dyn Inspect>);
        #[cfg(not(feature = "elf"))]
        let inspector = None;

        Self {
            inspector,
            sources: MappingSources::new(),
            transport: None,
        }
    }
}


#[cfg(feature = "http")]
fn default_transport() -> Result<Box<dyn Post>> {
    let transport = crate::HttpTransport::new()?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Result<Box<dyn Post>> {
    Err(Error::with_unsupported(
        "no transport for symbol services available",
    ))
}


/// The entry point to the symbolization pipeline.
///
/// A [`Symbolizer`] resolves the addresses of a [`Profile`] using local
/// binaries, falling back to remote symbol services, and normalizes
/// the resulting function names afterwards.
pub struct Symbolizer {
    inspector: Option<Box<dyn Inspect>>,
    sources: MappingSources,
    transport: Option<Box<dyn Post>>,
}

impl Symbolizer {
    /// Create a new [`Symbolizer`] with the default configuration.
    pub fn new() -> Self {
        Builder::default().build()
    }

    /// Retrieve a [`Builder`] object for configurable construction of a
    /// [`Symbolizer`].
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Symbolize `profile` as requested by `directive`.
    ///
    /// See [`Mode::parse`] for the directive syntax. Problems with the
    /// directive itself are reported as warnings.
    pub fn symbolize(&self, directive: &str, profile: &mut Profile) -> Result<Report> {
        let (mode, mut warnings) = Mode::parse(directive);
        let mut report = self.symbolize_with(&mode, profile)?;
        let () = warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }

    /// Symbolize `profile` according to `mode`.
    ///
    /// Local symbolization is best effort: problems with individual
    /// mappings are reported as warnings. Remote symbolization only
    /// happens if local symbolization is disabled or failed as a whole,
    /// and an error is reported if no symbol service could be reached.
    /// Function names are normalized in any case, as long as `mode` is
    /// enabled.
    pub fn symbolize_with(&self, mode: &Mode, profile: &mut Profile) -> Result<Report> {
        let mut report = Report::default();
        if !mode.enabled {
            debug!("symbolization disabled");
            return Ok(report)
        }

        let mut remote = mode.remote;
        if mode.local {
            report.local = match self.symbolize_local(mode, profile, &mut report.warnings) {
                Ok(()) => {
                    remote = false;
                    Stage::Succeeded
                }
                Err(err) => {
                    warn!("local symbolization failed: {err:#}");
                    Stage::Failed
                }
            };
        }

        if remote {
            if self.sources.is_empty() {
                debug!("no symbol services configured; skipping remote symbolization");
            } else {
                let () = self
                    .symbolize_remote(mode, profile)
                    .context("remote symbolization failed")?;
                report.remote = Stage::Succeeded;
            }
        }

        debug!("normalizing function names (demangle={})", mode.demangle);
        let () = demangle_profile(profile, mode.force, mode.demangle);
        Ok(report)
    }

    fn symbolize_local(
        &self,
        mode: &Mode,
        profile: &mut Profile,
        warnings: &mut Vec<Warning>,
    ) -> Result<()> {
        let inspector = self.inspector.as_deref().ok_or_else(|| {
            Error::with_unsupported("no object inspector for local symbolization available")
        })?;
        local::symbolize(profile, inspector, mode.fast, mode.force, warnings)
    }

    fn symbolize_remote(&self, mode: &Mode, profile: &mut Profile) -> Result<()> {
        let default;
        let transport: &dyn Post = match &self.transport {
            Some(transport) => &**transport,
            None => {
                default = default_transport()?;
                &*default
            }
        };
        remote::symbolize(profile, &self.sources, transport, mode.force)
    }
}

impl Debug for Symbolizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Symbolizer")
            .field("inspector", &self.inspector)
            .field("sources", &self.sources)
            .field("transport", &self.transport.as_ref().map(|_| "<transport>"))
            .finish()
    }
}

impl Default for Symbolizer {
    fn default() -> Self {
        Self::new()
    }
}
