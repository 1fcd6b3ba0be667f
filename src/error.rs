use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io;


/// An enum providing a rough classification of errors.
///
/// The variants of this type partly resemble those of
/// [`std::io::Error`], because these are the most common sources of
/// error that the crate concerns itself with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An entity was not found, often a file.
    NotFound,
    /// The operation lacked the necessary privileges to complete.
    PermissionDenied,
    /// Data not valid for the operation were encountered.
    InvalidData,
    /// A parameter was incorrect.
    InvalidInput,
    /// This operation is unsupported, possibly because the
    /// corresponding cargo feature is disabled.
    Unsupported,
    /// An operation could not be completed, because an "end of file"
    /// was reached prematurely.
    UnexpectedEof,
    /// The I/O operation's timeout expired, causing it to be canceled.
    TimedOut,
    /// A custom error that does not fall under any other kind.
    Other,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "entity not found",
            Self::PermissionDenied => "permission denied",
            Self::InvalidData => "invalid data",
            Self::InvalidInput => "invalid input parameter",
            Self::Unsupported => "unsupported",
            Self::UnexpectedEof => "unexpected end of file",
            Self::TimedOut => "timed out",
            Self::Other => "other error",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl From<io::ErrorKind> for ErrorKind {
    fn from(other: io::ErrorKind) -> Self {
        match other {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::InvalidData => Self::InvalidData,
            io::ErrorKind::InvalidInput => Self::InvalidInput,
            io::ErrorKind::Unsupported => Self::Unsupported,
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Other,
        }
    }
}


/// The "source" of an error: either an error of a different crate or
/// a plain message.
#[derive(Debug)]
enum Source {
    Msg(Cow<'static, str>),
    Error(Box<dyn StdError + Send + Sync + 'static>),
}


#[derive(Debug)]
struct ErrorImpl {
    kind: ErrorKind,
    source: Source,
    /// Context layers, innermost first.
    context: Vec<Cow<'static, str>>,
}


/// The error type used by the library.
///
/// Errors carry an [`ErrorKind`] as well as a chain of human readable
/// context messages that were attached while the error propagated.
/// The alternate `Display` representation (`{:#}`) includes the
/// complete chain.
pub struct Error {
    /// The boxed up error; kept small because `Error` is passed around
    /// by value a lot.
    error: Box<ErrorImpl>,
}

impl Error {
    fn with_source(kind: ErrorKind, source: Source) -> Self {
        Self {
            error: Box::new(ErrorImpl {
                kind,
                source,
                context: Vec::new(),
            }),
        }
    }

    /// Create an [`Error`] of the given kind with a message.
    pub fn new<M>(kind: ErrorKind, msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::with_source(kind, Source::Msg(msg.into()))
    }

    /// Create an [`Error`] of the given kind wrapping another error.
    pub fn from_error<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::with_source(kind, Source::Error(error.into()))
    }

    /// Create an [`Error`] of kind [`ErrorKind::NotFound`].
    pub fn with_not_found<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::new(ErrorKind::NotFound, msg)
    }

    /// Create an [`Error`] of kind [`ErrorKind::InvalidData`].
    pub fn with_invalid_data<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::new(ErrorKind::InvalidData, msg)
    }

    /// Create an [`Error`] of kind [`ErrorKind::InvalidInput`].
    pub fn with_invalid_input<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    /// Create an [`Error`] of kind [`ErrorKind::Unsupported`].
    pub fn with_unsupported<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::new(ErrorKind::Unsupported, msg)
    }

    /// Create an [`Error`] of kind [`ErrorKind::Other`].
    pub fn with_other<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self::new(ErrorKind::Other, msg)
    }

    /// Retrieve a rough error classification in the form of an
    /// [`ErrorKind`].
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    /// Layer another context message on top of this error.
    fn layer_context(mut self, context: Cow<'static, str>) -> Self {
        let () = self.error.context.push(context);
        self
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        // Debug output mirrors the alternate display, which is what
        // shows up when `main` returns an error.
        write!(f, "{self:#}")?;
        if f.alternate() {
            write!(f, " ({:?})", self.error.kind)?;
        }
        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let ErrorImpl {
            kind,
            source,
            context,
        } = &*self.error;

        if f.alternate() {
            for layer in context.iter().rev() {
                write!(f, "{layer}: ")?;
            }
        } else if let Some(layer) = context.last() {
            return f.write_str(layer)
        }

        match source {
            Source::Msg(msg) if msg.is_empty() => write!(f, "{kind}"),
            Source::Msg(msg) => f.write_str(msg),
            Source::Error(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.error.source {
            Source::Error(err) => Some(err.as_ref()),
            Source::Msg(..) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(other: io::Error) -> Self {
        Self::from_error(ErrorKind::from(other.kind()), other)
    }
}


/// A trait providing ergonomic chaining capabilities to [`Error`].
pub trait ErrorExt: private::Sealed {
    /// The output type produced by [`context`](Self::context) and
    /// [`with_context`](Self::with_context).
    type Output;

    /// Add context to this error.
    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>;

    /// Add context to this error, using a closure for lazy evaluation.
    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C;
}

impl ErrorExt for Error {
    type Output = Error;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        self.layer_context(context.into())
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        self.layer_context(f().into())
    }
}

impl<T, E> ErrorExt for Result<T, E>
where
    E: ErrorExt,
{
    type Output = Result<T, E::Output>;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(err.context(context)),
        }
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(err.with_context(f)),
        }
    }
}

impl ErrorExt for io::Error {
    type Output = Error;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        Error::from(self).context(context)
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        Error::from(self).with_context(f)
    }
}


mod private {
    use std::io;

    use super::Error;

    pub trait Sealed {}

    impl Sealed for Error {}
    impl Sealed for io::Error {}
    impl<T, E> Sealed for Result<T, E> where E: Sealed {}
}
