//! Small local traits used by the `code!` macro. `core::convert::TryFrom` is
//! avoided here since it would require an inherent `Code: TryFrom<Code>`
//! blanket that the standard trait's coherence rules don't allow us to skip.

/// Fallible conversion, mirroring `core::convert::TryFrom` but local so the
/// `code!` macro can implement it for unit-code enums without running into
/// coherence rules on the standard trait.
#[allow(dead_code)]
pub trait TryFrom<T>: Sized {
    /// The error produced when the conversion fails.
    type Error;

    /// Attempts the conversion.
    fn try_from(value: T) -> Result<Self, Self::Error>;
}
