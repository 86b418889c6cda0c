use std::error::Error as StdError;
use std::fmt;

use crate::entity::Entity;

/// Failure of a world or entity operation.
/// All public methods keep strong exception safety: when one of these is
/// returned, no observable state has changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A duration argument was negative or NaN.
    InvalidDuration(f64),
    /// A position component was NaN.
    InvalidPosition(f64, f64),
    /// A radius below the minimum for the entity kind.
    InvalidRadius { radius: f64, min: f64 },
    /// The entity would stick out of the world boundaries.
    OutOfBounds,
    /// The entity would significantly overlap an existing member.
    Overlapping,
    /// The entity has been terminated and may no longer join a world.
    Terminated,
    /// The id does not name a live member of this world.
    UnknownEntity,
    /// A ship command was aimed at a non-ship.
    NotAShip,
    /// A magazine operation was given a non-bullet.
    NotABullet,
    /// A ship program failed; see [`ProgramError`].
    Program(ProgramError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidDuration(dt) => write!(f, "invalid duration: {}", dt),
            Error::InvalidPosition(x, y) => write!(f, "invalid position: ({}, {})", x, y),
            Error::InvalidRadius { radius, min } => {
                write!(f, "radius {} below the minimum {}", radius, min)
            }
            Error::OutOfBounds => write!(f, "entity not within the world boundaries"),
            Error::Overlapping => write!(f, "entity significantly overlaps a world member"),
            Error::Terminated => write!(f, "entity has been terminated"),
            Error::UnknownEntity => write!(f, "no such entity in this world"),
            Error::NotAShip => write!(f, "entity is not a ship"),
            Error::NotABullet => write!(f, "entity is not a bullet"),
            Error::Program(e) => write!(f, "program error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Program(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProgramError> for Error {
    fn from(e: ProgramError) -> Self {
        Error::Program(e)
    }
}

/// Semantic failure of a ship program.
/// Raised by the interpreter; physics state stays consistent, the program
/// halts and its environment is preserved for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A variable was re-bound to a value of a different type.
    TypeMismatch { name: String },
    /// An operand had the wrong type for the operator.
    ExpectedNumber,
    ExpectedBoolean,
    ExpectedEntity,
    /// An entity attribute was read through a null reference.
    NullEntity,
    /// An entity reference outlived the entity it named.
    DeadEntity,
    UndefinedVariable(String),
    UnknownFunction(String),
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    /// A function body completed without returning a value.
    MissingReturn(String),
    /// `break` escaped every enclosing loop.
    BreakOutsideLoop,
    /// `return` outside a function body.
    ReturnOutsideFunction,
    /// An action statement inside a function body.
    ActionInFunction,
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProgramError::TypeMismatch { name } => {
                write!(f, "variable '{}' re-bound to a different type", name)
            }
            ProgramError::ExpectedNumber => write!(f, "operand is not a number"),
            ProgramError::ExpectedBoolean => write!(f, "operand is not a boolean"),
            ProgramError::ExpectedEntity => write!(f, "operand is not an entity"),
            ProgramError::NullEntity => write!(f, "attribute read through a null entity"),
            ProgramError::DeadEntity => write!(f, "entity reference is no longer alive"),
            ProgramError::UndefinedVariable(name) => write!(f, "undefined variable '{}'", name),
            ProgramError::UnknownFunction(name) => write!(f, "unknown function '{}'", name),
            ProgramError::ArityMismatch {
                function,
                expected,
                got,
            } => write!(
                f,
                "function '{}' takes {} arguments, got {}",
                function, expected, got
            ),
            ProgramError::MissingReturn(name) => {
                write!(f, "function '{}' ended without a return", name)
            }
            ProgramError::BreakOutsideLoop => write!(f, "break outside of a loop"),
            ProgramError::ReturnOutsideFunction => write!(f, "return outside of a function"),
            ProgramError::ActionInFunction => {
                write!(f, "action statement inside a function body")
            }
        }
    }
}

impl StdError for ProgramError {}

/// An entity the world refused to take, handed back to the caller together
/// with the reason.
#[derive(Debug)]
pub struct RejectedEntity {
    pub error: Error,
    pub entity: Entity,
}

impl RejectedEntity {
    pub fn into_inner(self) -> Entity {
        self.entity
    }
}

impl fmt::Display for RejectedEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "entity rejected: {}", self.error)
    }
}

impl StdError for RejectedEntity {}
