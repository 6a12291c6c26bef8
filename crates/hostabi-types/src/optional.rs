//! Success-or-error results with a trailing error-code word.
//!
//! `Optional<T>` occupies T's stack shape followed by one `i32` word holding
//! an [`Errno`]. A zero code means the leading words are a valid `T`; any
//! other code means they are undefined. The encoder zeroes them, and the
//! decoder never reads them.

use std::error::Error as StdError;
use std::fmt;
use std::sync::OnceLock;

use crate::memory::Memory;
use crate::trap::Trap;
use crate::value::{decode_i32, encode_i32, Param, Return, Value, ValueType};

/// Boxed host error carried by a failed [`Optional`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ── Errno ────────────────────────────────────────────────────────────────────

/// Numeric error code exchanged with the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Errno(pub i32);

impl Errno {
    /// No error.
    pub const SUCCESS: Self = Self(0);
    /// An error with no known code.
    pub const UNKNOWN: Self = Self(-1);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

static ERROR_STRINGS: OnceLock<Vec<String>> = OnceLock::new();

/// Installs the table used to render error codes, indexed by code.
///
/// The table can be set once per process. Returns the rejected table if one
/// was already installed.
pub fn set_error_strings<I, S>(strings: I) -> Result<(), Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ERROR_STRINGS.set(strings.into_iter().map(Into::into).collect())
}

// Codes outside the table, or with an empty entry, have no name.
fn error_string(table: &[String], code: i32) -> Option<&str> {
    let name = table.get(usize::try_from(code).ok()?)?;
    (!name.is_empty()).then_some(name.as_str())
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ERROR_STRINGS.get().and_then(|table| error_string(table, self.0));
        match name {
            Some(name) => f.write_str(name),
            None => write!(f, "errno({})", self.0),
        }
    }
}

impl StdError for Errno {}

/// Maps a host error to the code reported to the guest.
///
/// The chain is walked from `err` itself: an [`Errno`] yields its code, an
/// [`std::io::Error`] yields its raw OS code (or is looked through to the
/// error it wraps), and anything else continues with its `source()`. A chain
/// without a code maps to [`Errno::UNKNOWN`]. Never returns
/// [`Errno::SUCCESS`].
pub fn errno_of(err: &(dyn StdError + 'static)) -> Errno {
    let mut next = Some(err);
    while let Some(e) = next {
        if let Some(&errno) = e.downcast_ref::<Errno>() {
            return if errno.is_success() { Errno::UNKNOWN } else { errno };
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(code) = io.raw_os_error().filter(|&c| c != 0) {
                return Errno(code);
            }
            if let Some(inner) = io.get_ref() {
                next = Some(inner as &(dyn StdError + 'static));
                continue;
            }
        }
        next = e.source();
    }
    Errno::UNKNOWN
}

// ── Optional ─────────────────────────────────────────────────────────────────

/// Either a result of type `T` or an error.
pub struct Optional<T> {
    result: Result<T, BoxError>,
}

/// An optional without payload: success or an error code.
pub type Error = Optional<()>;

/// The successful [`Error`].
pub const OK: Error = Optional { result: Ok(()) };

/// Successful optional holding `value`.
pub fn res<T>(value: T) -> Optional<T> {
    Optional::res(value)
}

/// Failed optional carrying `err`.
pub fn err<T>(err: impl Into<BoxError>) -> Optional<T> {
    Optional::err(err)
}

/// Converts a `Result` into an optional.
pub fn opt<T, E: Into<BoxError>>(result: Result<T, E>) -> Optional<T> {
    Optional::from(result)
}

/// Failed [`Error`] carrying `err`.
pub fn fail(err: impl Into<BoxError>) -> Error {
    Optional::err(err)
}

impl<T> Optional<T> {
    pub fn res(value: T) -> Self {
        Self { result: Ok(value) }
    }

    pub fn err(err: impl Into<BoxError>) -> Self {
        Self {
            result: Err(err.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.result.as_ref().err().map(|e| e.as_ref())
    }

    /// Code written to the trailing stack word.
    pub fn errno(&self) -> Errno {
        match &self.result {
            Ok(_) => Errno::SUCCESS,
            Err(e) => errno_of(e.as_ref()),
        }
    }

    pub fn into_result(self) -> Result<T, BoxError> {
        self.result
    }
}

impl<T, E: Into<BoxError>> From<Result<T, E>> for Optional<T> {
    fn from(result: Result<T, E>) -> Self {
        Self {
            result: result.map_err(Into::into),
        }
    }
}

/// Two optionals are equal when both hold equal values, or both hold
/// errors mapping to the same code.
impl<T: PartialEq> PartialEq for Optional<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.result, &other.result) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => self.errno() == other.errno(),
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Optional<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(v) => f.debug_tuple("Res").field(v).finish(),
            Err(e) => f.debug_tuple("Err").field(&e.to_string()).finish(),
        }
    }
}

impl<T: Value> Value for Optional<T> {
    fn value_types() -> Vec<ValueType> {
        let mut types = T::value_types();
        types.push(ValueType::I32);
        types
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        let n = T::stack_size();
        match Errno(decode_i32(stack[n])) {
            Errno::SUCCESS => T::format_value(w, memory, &stack[..n]),
            errno => write!(w, "ERROR: {errno}"),
        }
    }
}

impl<T: Param> Param for Optional<T> {
    fn decode(memory: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        let n = T::stack_size();
        match Errno(decode_i32(stack[n])) {
            Errno::SUCCESS => T::decode(memory, &stack[..n]).map(Self::res),
            errno => Ok(Self::err(errno)),
        }
    }
}

impl<T: Return> Return for Optional<T> {
    fn encode(self, memory: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
        let n = T::stack_size();
        match self.result {
            Ok(value) => {
                value.encode(memory, &mut stack[..n])?;
                stack[n] = encode_i32(Errno::SUCCESS.0);
            }
            Err(e) => {
                stack[..n].fill(0);
                stack[n] = encode_i32(errno_of(e.as_ref()).0);
            }
        }
        Ok(())
    }
}
