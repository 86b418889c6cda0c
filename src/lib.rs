#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod entity;
pub mod error;
pub mod math;
pub mod program;
pub mod world;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::entity::{Entity, Kind};
    pub use crate::error::{Error, ProgramError, RejectedEntity};
    pub use crate::program::{
        Attribute, BinaryOp, EntityQuery, Expr, ExprKind, Function, Program, SourceLocation, Stmt,
        StmtKind, UnaryOp, Value,
    };
    pub use crate::world::{Collision, CollisionListener, EntityId, World};
}
