//! Error types.
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The column buffer handed to pattern construction is too small.
    ///
    /// Nothing usable has been written. Reallocate the buffer with at least `required` entries
    /// and call again.
    InsufficientCapacity { required: usize },
    /// The isoparametric map of an element has a non-positive (or non-finite) Jacobian determinant
    /// at one of its quadrature points, i.e. the element is collapsed or inverted.
    GeometryDegenerate { element: usize, determinant: f64 },
    /// A small dense system could not be solved reliably.
    NumericallySingular(Singularity),
    /// The inputs do not satisfy the documented contract of the routine
    /// (mismatched lengths, out of range indices and so on).
    PreconditionViolation(String),
}

/// The source of a [`Error::NumericallySingular`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Singularity {
    /// The least-squares system of the recovery patch around `node` is singular or too
    /// ill-conditioned to be trusted.
    PatchSystem { node: usize },
    /// The von Mises stress vanishes at a quadrature point where its derivative was requested.
    VanishingStress { element: usize, point: usize },
}

impl Error {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCapacity { required } => {
                write!(
                    f,
                    "insufficient column capacity for sparsity pattern, {required} entries required"
                )
            }
            Self::GeometryDegenerate { element, determinant } => {
                write!(
                    f,
                    "element {element} is degenerate (Jacobian determinant {determinant:e})"
                )
            }
            Self::NumericallySingular(Singularity::PatchSystem { node }) => {
                write!(f, "recovery patch system for node {node} is numerically singular")
            }
            Self::NumericallySingular(Singularity::VanishingStress { element, point }) => {
                write!(
                    f,
                    "von Mises stress vanishes at quadrature point {point} of element {element}"
                )
            }
            Self::PreconditionViolation(message) => write!(f, "precondition violated: {message}"),
        }
    }
}

impl std::error::Error for Error {}

/// Checks that a caller-supplied array has the expected length.
pub(crate) fn check_len(name: &str, actual: usize, expected: usize) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::precondition(format!(
            "{name} has length {actual}, expected {expected}"
        )))
    }
}
