//! Ship program representation: the statement/expression trees produced by
//! an external parser, plus the mutable execution state the interpreter
//! works on.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::world::EntityId;

pub(crate) mod interp;

/// Simulated seconds consumed by each action statement.
pub const QUANTUM: f64 = 0.2;

/// Position of a statement in the program source. Resumption after a
/// suspension is keyed on these, ordered by line, then column.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl From<(u32, u32)> for SourceLocation {
    fn from((line, column): (u32, u32)) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Runtime value. Variables are monomorphic: once bound at one of these
/// three types a variable keeps it for the rest of the program.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Value {
    Number(f64),
    Boolean(bool),
    /// Possibly-null entity reference.
    Entity(Option<EntityId>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Entity(_) => "entity",
        }
    }

    pub(crate) fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Entity(None) => write!(f, "null"),
            Value::Entity(Some(id)) => write!(f, "entity {}", id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    Not,
    Negate,
    Sqrt,
    Sin,
    Cos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    Add,
    Mul,
    Lt,
    Eq,
    And,
}

/// World lookups available to a program, all relative to the executing ship.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EntityQuery {
    /// The executing ship itself.
    This,
    /// Closest other ship.
    Ship,
    /// Closest asteroid.
    Asteroid,
    /// Closest planetoid.
    Planetoid,
    /// Closest minor planet of either kind.
    Planet,
    /// First live bullet fired by the executing ship.
    Bullet,
    /// An arbitrary entity.
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Attribute {
    X,
    Y,
    Vx,
    Vy,
    Radius,
    Direction,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ExprKind {
    Number(f64),
    Boolean(bool),
    Null,
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Query(EntityQuery),
    Attribute(Attribute, Box<Expr>),
    /// Edge-to-edge distance from the executing ship to another entity.
    DistanceTo(Box<Expr>),
    Call { function: String, args: Vec<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, location: impl Into<SourceLocation>) -> Self {
        Self {
            location: location.into(),
            kind,
        }
    }

    pub fn number(value: f64, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Number(value), location)
    }

    pub fn boolean(value: bool, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Boolean(value), location)
    }

    pub fn null(location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Null, location)
    }

    pub fn variable(name: impl Into<String>, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Variable(name.into()), location)
    }

    pub fn unary(op: UnaryOp, operand: Expr, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Unary(op, Box::new(operand)), location)
    }

    pub fn binary(
        op: BinaryOp,
        left: Expr,
        right: Expr,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), location)
    }

    pub fn query(query: EntityQuery, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::Query(query), location)
    }

    pub fn attribute(
        attribute: Attribute,
        entity: Expr,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(ExprKind::Attribute(attribute, Box::new(entity)), location)
    }

    pub fn distance_to(entity: Expr, location: impl Into<SourceLocation>) -> Self {
        Self::new(ExprKind::DistanceTo(Box::new(entity)), location)
    }

    pub fn call(
        function: impl Into<String>,
        args: Vec<Expr>,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(
            ExprKind::Call {
                function: function.into(),
                args,
            },
            location,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Stmt {
    pub location: SourceLocation,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum StmtKind {
    Sequence(Vec<Stmt>),
    Assign { name: String, value: Expr },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { condition: Expr, body: Box<Stmt> },
    Break,
    Skip,
    ThrustOn,
    ThrustOff,
    Fire,
    Turn(Expr),
    Print(Expr),
    Return(Expr),
}

impl Stmt {
    pub fn new(kind: StmtKind, location: impl Into<SourceLocation>) -> Self {
        Self {
            location: location.into(),
            kind,
        }
    }

    pub fn sequence(statements: Vec<Stmt>, location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Sequence(statements), location)
    }

    pub fn assign(
        name: impl Into<String>,
        value: Expr,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(
            StmtKind::Assign {
                name: name.into(),
                value,
            },
            location,
        )
    }

    pub fn if_else(
        condition: Expr,
        then_branch: Stmt,
        else_branch: Option<Stmt>,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            location,
        )
    }

    pub fn while_loop(
        condition: Expr,
        body: Stmt,
        location: impl Into<SourceLocation>,
    ) -> Self {
        Self::new(
            StmtKind::While {
                condition,
                body: Box::new(body),
            },
            location,
        )
    }

    pub fn break_stmt(location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Break, location)
    }

    pub fn skip(location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Skip, location)
    }

    pub fn thrust_on(location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::ThrustOn, location)
    }

    pub fn thrust_off(location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::ThrustOff, location)
    }

    pub fn fire(location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Fire, location)
    }

    pub fn turn(angle: Expr, location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Turn(angle), location)
    }

    pub fn print(value: Expr, location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Print(value), location)
    }

    pub fn return_stmt(value: Expr, location: impl Into<SourceLocation>) -> Self {
        Self::new(StmtKind::Return(value), location)
    }
}

/// Named function. Bodies may not contain action statements, so calls never
/// consume simulated time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Stmt,
}

/// A program attached to a ship: the AST plus everything needed to stop at
/// a statement boundary and pick up there on the next tick.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Program {
    pub(crate) body: Stmt,
    pub(crate) functions: HashMap<String, Function>,
    pub(crate) globals: HashMap<String, Value>,
    /// Budget used within the current tick.
    pub(crate) consumed: f64,
    /// Budget left over from previous ticks.
    pub(crate) extra: f64,
    /// Statement to resume at, if suspended.
    pub(crate) checkpoint: Option<SourceLocation>,
    pub(crate) prints: Vec<Value>,
    pub(crate) finished: bool,
}

impl Program {
    pub fn new(body: Stmt) -> Self {
        Self::with_functions(body, Vec::new())
    }

    pub fn with_functions(body: Stmt, functions: Vec<Function>) -> Self {
        Self {
            body,
            functions: functions
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
            globals: HashMap::new(),
            consumed: 0.0,
            extra: 0.0,
            checkpoint: None,
            prints: Vec::new(),
            finished: false,
        }
    }

    /// Current value of a global variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Everything printed so far, in order.
    pub fn prints(&self) -> &[Value] {
        &self.prints
    }

    /// A finished program ran to the end (or failed) and will not run again.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Statement the program will resume at, if currently suspended.
    pub fn suspended_at(&self) -> Option<SourceLocation> {
        self.checkpoint
    }

    /// Unused budget carried into the next tick.
    pub fn extra_time(&self) -> f64 {
        self.extra
    }
}
