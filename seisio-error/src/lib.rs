#![deny(missing_docs)]

//! Error handling for the seisio crates.
//!
//! Every fallible operation returns a [`SeisResult`]. Errors are built with [`seis_err!`],
//! returned early with [`seis_bail!`], and invariant violations panic through [`seis_panic!`]
//! or [`SeisExpect`].

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("SEISIO_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}", msg.into())
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

// Alias so thiserror does not treat these fields as backtrace sources, which would emit a
// nightly-only `provide` method. It is the same type as `std::backtrace::Backtrace`.
type Bt = Backtrace;

/// The top-level error type for seisio.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum SeisError {
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Bt),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Bt),
    /// A metadata key was referenced that the governing rule does not hold.
    #[error("key not found: {0}\nBacktrace:\n{1}")]
    KeyNotFound(ErrString, Bt),
    /// A value was accessed through the wrong storage type.
    #[error("expected type: {0} but instead got {1}\nBacktrace:\n{2}")]
    MismatchedTypes(ErrString, ErrString, Bt),
    /// A rule entry is malformed.
    #[error("invalid rule: {0}\nBacktrace:\n{1}")]
    InvalidRule(ErrString, Bt),
    /// The requested operation is not supported for this configuration of the process group.
    #[error("unsupported configuration: {0}\nBacktrace:\n{1}")]
    Unsupported(ErrString, Bt),
    /// A collective operation failed or the ranks disagreed.
    #[error("collective failure: {0}\nBacktrace:\n{1}")]
    Collective(ErrString, Bt),
    /// A wrapped error with extra context.
    #[error("{0}: {1}")]
    Context(ErrString, Box<SeisError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
}

impl SeisError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        SeisError::Context(msg.into(), Box::new(self))
    }

    /// The message of the error without its backtrace.
    pub fn message(&self) -> String {
        match self {
            SeisError::OutOfBounds(idx, start, stop, _) => {
                format!("index {idx} out of bounds from {start} to {stop}")
            }
            SeisError::InvalidArgument(msg, _)
            | SeisError::KeyNotFound(msg, _)
            | SeisError::InvalidRule(msg, _)
            | SeisError::Unsupported(msg, _)
            | SeisError::Collective(msg, _) => msg.to_string(),
            SeisError::MismatchedTypes(expected, actual, _) => {
                format!("expected type: {expected} but instead got {actual}")
            }
            SeisError::Context(msg, inner) => format!("{msg}: {}", inner.message()),
            SeisError::IOError(err) => err.to_string(),
        }
    }
}

impl Debug for SeisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for results that return a [`SeisError`] as their error type.
pub type SeisResult<T> = Result<T, SeisError>;

/// Attaches context to the error of a fallible result.
pub trait ResultExt<T> {
    /// Wraps the error, if any, in [`SeisError::Context`].
    fn context<M: Into<ErrString>>(self, msg: M) -> SeisResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<SeisError>,
{
    fn context<M: Into<ErrString>>(self, msg: M) -> SeisResult<T> {
        self.map_err(|err| err.into().with_context(msg))
    }
}

/// A trait for unwrapping a value, panicking with a [`SeisError`] carrying the given message.
///
/// Use it where an invariant guarantees the value is present.
pub trait SeisExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value, or panics with the given message.
    fn seis_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> SeisExpect for Result<T, E>
where
    E: Into<SeisError>,
{
    type Output = T;

    #[inline(always)]
    fn seis_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| seis_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> SeisExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn seis_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = SeisError::InvalidArgument(msg.to_string().into(), Backtrace::capture());
            seis_panic!(err)
        })
    }
}

/// Builds a [`SeisError`] of the given variant.
///
/// Without a variant prefix the error is [`SeisError::InvalidArgument`].
#[macro_export]
macro_rules! seis_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SeisError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SeisError::MismatchedTypes(
                $expected.to_string().into(),
                $actual.to_string().into(),
                Backtrace::capture(),
            )
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::SeisError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SeisError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($variant:ident: $err:expr $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SeisError::$variant($err, Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::seis_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// Returns early with a [`SeisError`] built by [`seis_err!`].
#[macro_export]
macro_rules! seis_bail {
    ($($tt:tt)+) => {
        return Err($crate::seis_err!($($tt)+))
    };
}

/// Panics with a [`SeisError`].
#[macro_export]
macro_rules! seis_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::seis_panic!($crate::seis_err!(OutOfBounds: $idx, $start, $stop))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::seis_panic!($crate::seis_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::SeisError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::seis_panic!($crate::seis_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::SeisError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    use crate::SeisError;

    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use(error: SeisError) -> SeisError {
        error
    }
}
