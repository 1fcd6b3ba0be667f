//! **profsym** resolves the raw addresses of a sampled profile into
//! function names, source files, and line numbers.
//!
//! Symbolization happens in up to three stages:
//! 1. addresses are resolved using locally available binaries, by means
//!    of an [`Inspect`] implementation
//! 2. if local symbolization is disabled (or impossible), addresses are
//!    resolved by remote symbol services reachable via a [`Post`]
//!    transport
//! 3. the function names of the profile are demangled and simplified
//!
//! What exactly happens is controlled by a directive string, e.g.,
//! `local:force` or `remote:demangle=templates`:
//! ```
//! use profsym::DemangleMode;
//! use profsym::Mode;
//!
//! let (mode, warnings) = Mode::parse("fastlocal:demangle=full");
//! assert!(warnings.is_empty());
//! assert!(mode.local && mode.fast && !mode.remote);
//! assert_eq!(mode.demangle, DemangleMode::Full);
//! ```
//!
//! The [`Symbolizer`] type ties everything together.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod demangle;
mod error;
mod inspect;
mod local;
mod log;
mod mode;
mod normalize;
mod profile;
mod remote;
mod symbolizer;


/// A type representing addresses.
pub type Addr = u64;


pub use crate::demangle::filter;
pub use crate::demangle::DemangleOptions;
pub use crate::error::Error;
pub use crate::error::ErrorExt;
pub use crate::error::ErrorKind;
#[cfg(feature = "elf")]
#[cfg_attr(docsrs, doc(cfg(feature = "elf")))]
pub use crate::inspect::ElfInspector;
pub use crate::inspect::Frame;
pub use crate::inspect::Inspect;
pub use crate::inspect::Segment;
pub use crate::mode::DemangleMode;
pub use crate::mode::Mode;
pub use crate::mode::DIRECTIVE_GRAMMAR;
pub use crate::normalize::demangle_profile;
pub use crate::normalize::looks_like_demangled_cpp;
pub use crate::normalize::remove_matching;
pub use crate::profile::Function;
pub use crate::profile::Line;
pub use crate::profile::Location;
pub use crate::profile::Mapping;
pub use crate::profile::Profile;
#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub use crate::remote::HttpTransport;
pub use crate::remote::MappingSources;
pub use crate::remote::Post;
pub use crate::symbolizer::Builder;
pub use crate::symbolizer::Report;
pub use crate::symbolizer::Stage;
pub use crate::symbolizer::Symbolizer;
pub use crate::symbolizer::Warning;


/// A result type using our [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;
