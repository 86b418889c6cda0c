//! Time-budgeted tree-walking evaluator.
//!
//! Control flow is a value, not an exception: every statement evaluates to
//! a [`Flow`] that loops and sequences propagate explicitly. Suspension is
//! just another flow: when the budget cannot cover the next action the
//! evaluator records the statement's source location and unwinds, and the
//! next run fast-forwards to that statement with side effects and time
//! consumption suppressed.

use std::collections::HashMap;

use crate::error::ProgramError;
use crate::world::{EntityId, World};

use super::{
    Attribute, BinaryOp, EntityQuery, Expr, ExprKind, Function, Program, SourceLocation, Stmt,
    StmtKind, UnaryOp, Value, QUANTUM,
};

/// Result of one statement.
pub(crate) enum Flow {
    Normal,
    /// Unwinding to the nearest enclosing `while`.
    Break,
    /// Unwinding to the enclosing function call.
    Return(Value),
    /// Out of budget; unwinding to the event loop.
    Suspend,
}

/// Run `program` on the ship for one tick of `dt` simulated seconds.
pub(crate) fn run(
    program: &mut Program,
    world: &mut World,
    ship: EntityId,
    dt: f64,
) -> Result<(), ProgramError> {
    if program.finished {
        return Ok(());
    }
    let budget = dt + program.extra;
    let Program {
        ref body,
        ref functions,
        ref mut globals,
        ref mut prints,
        ref mut consumed,
        ref mut extra,
        ref mut checkpoint,
        ref mut finished,
    } = *program;

    let mut evaluator = Evaluator {
        world,
        ship,
        functions,
        globals,
        prints,
        budget,
        consumed: *consumed,
        ffwd: *checkpoint,
        suspended: None,
        scopes: Vec::new(),
    };
    let result = evaluator.exec(body);
    let spent = evaluator.consumed;
    let suspended = evaluator.suspended;

    match result {
        Ok(Flow::Suspend) => {
            *checkpoint = suspended;
            *extra = budget - spent;
            *consumed = 0.0;
            log::debug!(
                "program suspended at {}, {:.3}s carried over",
                suspended.unwrap_or_default(),
                *extra
            );
            Ok(())
        }
        Ok(Flow::Normal) => {
            *finished = true;
            *checkpoint = None;
            *consumed = 0.0;
            *extra = 0.0;
            Ok(())
        }
        Ok(Flow::Break) => {
            *finished = true;
            Err(ProgramError::BreakOutsideLoop)
        }
        Ok(Flow::Return(_)) => {
            *finished = true;
            Err(ProgramError::ReturnOutsideFunction)
        }
        Err(e) => {
            *finished = true;
            log::debug!("program failed: {}", e);
            Err(e)
        }
    }
}

struct Evaluator<'a> {
    world: &'a mut World,
    ship: EntityId,
    functions: &'a HashMap<String, Function>,
    globals: &'a mut HashMap<String, Value>,
    prints: &'a mut Vec<Value>,
    budget: f64,
    consumed: f64,
    /// Fast-forward target while resuming; cleared once reached.
    ffwd: Option<SourceLocation>,
    /// Where the current run suspended.
    suspended: Option<SourceLocation>,
    /// One scope per active function call.
    scopes: Vec<HashMap<String, Value>>,
}

impl<'a> Evaluator<'a> {
    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ProgramError> {
        if let Some(target) = self.ffwd {
            if stmt.location == target {
                // resume point reached; it was never executed, so run it now
                self.ffwd = None;
            } else {
                return self.fast_forward(stmt);
            }
        }
        match &stmt.kind {
            StmtKind::Sequence(items) => self.exec_sequence(items),
            StmtKind::Assign { name, value } => {
                let value = self.eval(value)?;
                self.bind(name, value)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_boolean(condition)? {
                    self.exec(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { condition, body } => {
                self.exec_while(stmt.location, condition, body)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Skip => {
                if !self.take_time(stmt.location)? {
                    return Ok(Flow::Suspend);
                }
                Ok(Flow::Normal)
            }
            StmtKind::ThrustOn => {
                if !self.take_time(stmt.location)? {
                    return Ok(Flow::Suspend);
                }
                self.set_thruster(true)?;
                Ok(Flow::Normal)
            }
            StmtKind::ThrustOff => {
                if !self.take_time(stmt.location)? {
                    return Ok(Flow::Suspend);
                }
                self.set_thruster(false)?;
                Ok(Flow::Normal)
            }
            StmtKind::Fire => {
                if !self.take_time(stmt.location)? {
                    return Ok(Flow::Suspend);
                }
                self.world
                    .fire(self.ship)
                    .map_err(|_| ProgramError::DeadEntity)?;
                Ok(Flow::Normal)
            }
            StmtKind::Turn(angle) => {
                if !self.take_time(stmt.location)? {
                    return Ok(Flow::Suspend);
                }
                let delta = self.eval_number(angle)?;
                if !delta.is_finite() {
                    return Err(ProgramError::ExpectedNumber);
                }
                self.world
                    .turn_ship(self.ship, delta)
                    .map_err(|_| ProgramError::DeadEntity)?;
                Ok(Flow::Normal)
            }
            StmtKind::Print(value) => {
                let value = self.eval(value)?;
                log::debug!("program print: {}", value);
                self.prints.push(value);
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                if self.scopes.is_empty() {
                    return Err(ProgramError::ReturnOutsideFunction);
                }
                let value = self.eval(value)?;
                Ok(Flow::Return(value))
            }
        }
    }

    /// Traverse towards the resume point without side effects. Composite
    /// statements descend; everything else is a no-op.
    fn fast_forward(&mut self, stmt: &Stmt) -> Result<Flow, ProgramError> {
        match &stmt.kind {
            StmtKind::Sequence(items) => self.exec_sequence(items),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                let flow = self.exec(then_branch)?;
                if self.ffwd.is_none() {
                    return Ok(flow);
                }
                if let Some(else_branch) = else_branch {
                    let flow = self.exec(else_branch)?;
                    if self.ffwd.is_none() {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::While { condition, body } => {
                let flow = self.exec(body)?;
                if self.ffwd.is_some() {
                    // resume point is not inside this loop; skip it whole
                    return Ok(Flow::Normal);
                }
                match flow {
                    Flow::Normal => self.exec_while(stmt.location, condition, body),
                    Flow::Break => Ok(Flow::Normal),
                    other => Ok(other),
                }
            }
            _ => Ok(Flow::Normal),
        }
    }

    fn exec_sequence(&mut self, items: &[Stmt]) -> Result<Flow, ProgramError> {
        for stmt in items {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_while(
        &mut self,
        location: SourceLocation,
        condition: &Expr,
        body: &Stmt,
    ) -> Result<Flow, ProgramError> {
        loop {
            // Loops with entirely pure bodies would otherwise never yield.
            if self.scopes.is_empty() && self.budget - self.consumed < QUANTUM {
                self.suspended = Some(location);
                return Ok(Flow::Suspend);
            }
            if !self.eval_boolean(condition)? {
                return Ok(Flow::Normal);
            }
            match self.exec(body)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
    }

    /// Claim one quantum for an action statement. `Ok(false)` means the
    /// budget is exhausted and the statement becomes the resume point.
    fn take_time(&mut self, location: SourceLocation) -> Result<bool, ProgramError> {
        if !self.scopes.is_empty() {
            return Err(ProgramError::ActionInFunction);
        }
        if self.budget - self.consumed < QUANTUM {
            self.suspended = Some(location);
            return Ok(false);
        }
        self.consumed += QUANTUM;
        Ok(true)
    }

    fn set_thruster(&mut self, on: bool) -> Result<(), ProgramError> {
        self.world
            .set_thruster(self.ship, on)
            .map_err(|_| ProgramError::DeadEntity)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ProgramError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Null => Ok(Value::Entity(None)),
            ExprKind::Variable(name) => self.lookup(name),
            ExprKind::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!as_boolean(operand)?)),
                    UnaryOp::Negate => Ok(Value::Number(-as_number(operand)?)),
                    UnaryOp::Sqrt => Ok(Value::Number(as_number(operand)?.sqrt())),
                    UnaryOp::Sin => Ok(Value::Number(as_number(operand)?.sin())),
                    UnaryOp::Cos => Ok(Value::Number(as_number(operand)?.cos())),
                }
            }
            ExprKind::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                match op {
                    BinaryOp::Add => Ok(Value::Number(as_number(left)? + as_number(right)?)),
                    BinaryOp::Mul => Ok(Value::Number(as_number(left)? * as_number(right)?)),
                    BinaryOp::Lt => Ok(Value::Boolean(as_number(left)? < as_number(right)?)),
                    // values of different types are simply unequal
                    BinaryOp::Eq => Ok(Value::Boolean(left == right)),
                    BinaryOp::And => Ok(Value::Boolean(as_boolean(left)? && as_boolean(right)?)),
                }
            }
            ExprKind::Query(query) => Ok(Value::Entity(self.query(*query)?)),
            ExprKind::Attribute(attribute, entity) => {
                let id = self.eval_entity(entity)?.ok_or(ProgramError::NullEntity)?;
                let entity = self.world.get(id).ok_or(ProgramError::DeadEntity)?;
                let value = match attribute {
                    Attribute::X => entity.position().x,
                    Attribute::Y => entity.position().y,
                    Attribute::Vx => entity.velocity().x,
                    Attribute::Vy => entity.velocity().y,
                    Attribute::Radius => entity.radius(),
                    Attribute::Direction => entity.direction(),
                };
                Ok(Value::Number(value))
            }
            ExprKind::DistanceTo(entity) => {
                let id = self.eval_entity(entity)?.ok_or(ProgramError::NullEntity)?;
                if id == self.ship {
                    return Ok(Value::Number(0.0));
                }
                let target = self.world.get(id).ok_or(ProgramError::DeadEntity)?;
                let me = self.world.get(self.ship).ok_or(ProgramError::DeadEntity)?;
                let distance = me.distance_between(target) - me.radius() - target.radius();
                Ok(Value::Number(distance))
            }
            ExprKind::Call { function, args } => self.call(function, args),
        }
    }

    fn eval_boolean(&mut self, expr: &Expr) -> Result<bool, ProgramError> {
        as_boolean(self.eval(expr)?)
    }

    fn eval_number(&mut self, expr: &Expr) -> Result<f64, ProgramError> {
        as_number(self.eval(expr)?)
    }

    fn eval_entity(&mut self, expr: &Expr) -> Result<Option<EntityId>, ProgramError> {
        match self.eval(expr)? {
            Value::Entity(id) => Ok(id),
            _ => Err(ProgramError::ExpectedEntity),
        }
    }

    fn query(&self, query: EntityQuery) -> Result<Option<EntityId>, ProgramError> {
        let me = self.world.get(self.ship).ok_or(ProgramError::DeadEntity)?;
        let position = me.position();
        let ship = self.ship;
        Ok(match query {
            EntityQuery::This => Some(ship),
            EntityQuery::Ship => self.closest(position, |id, e| e.is_ship() && id != ship),
            EntityQuery::Asteroid => self.closest(position, |_, e| e.is_asteroid()),
            EntityQuery::Planetoid => self.closest(position, |_, e| e.is_planetoid()),
            EntityQuery::Planet => self.closest(position, |_, e| e.is_minor_planet()),
            EntityQuery::Bullet => self
                .world
                .entities()
                .find(|(_, e)| e.is_bullet() && e.bullet_source() == Some(ship))
                .map(|(id, _)| id),
            EntityQuery::Any => self.world.entities().next().map(|(id, _)| id),
        })
    }

    fn closest(
        &self,
        position: glam::DVec2,
        predicate: impl Fn(EntityId, &crate::entity::Entity) -> bool,
    ) -> Option<EntityId> {
        self.world
            .entities()
            .filter(|(id, e)| predicate(*id, e))
            .min_by(|(_, a), (_, b)| {
                a.position()
                    .distance_squared(position)
                    .total_cmp(&b.position().distance_squared(position))
            })
            .map(|(id, _)| id)
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value, ProgramError> {
        let functions = self.functions;
        let function = functions
            .get(name)
            .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))?;
        if function.params.len() != args.len() {
            return Err(ProgramError::ArityMismatch {
                function: name.to_string(),
                expected: function.params.len(),
                got: args.len(),
            });
        }
        let mut scope = HashMap::new();
        for (param, arg) in function.params.iter().zip(args) {
            let value = self.eval(arg)?;
            scope.insert(param.clone(), value);
        }
        self.scopes.push(scope);
        let flow = self.exec(&function.body);
        self.scopes.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Err(ProgramError::MissingReturn(name.to_string())),
            Flow::Break => Err(ProgramError::BreakOutsideLoop),
            // actions inside a function already fail before suspending
            Flow::Suspend => Err(ProgramError::ActionInFunction),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, ProgramError> {
        if let Some(scope) = self.scopes.last() {
            if let Some(value) = scope.get(name) {
                return Ok(*value);
            }
        }
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| ProgramError::UndefinedVariable(name.to_string()))
    }

    /// Bind in the innermost scope, keeping the variable's type pinned.
    fn bind(&mut self, name: &str, value: Value) -> Result<(), ProgramError> {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut *self.globals,
        };
        if let Some(existing) = scope.get(name) {
            if !existing.same_type(&value) {
                return Err(ProgramError::TypeMismatch {
                    name: name.to_string(),
                });
            }
        }
        scope.insert(name.to_string(), value);
        Ok(())
    }
}

fn as_number(value: Value) -> Result<f64, ProgramError> {
    match value {
        Value::Number(n) => Ok(n),
        _ => Err(ProgramError::ExpectedNumber),
    }
}

fn as_boolean(value: Value) -> Result<bool, ProgramError> {
    match value {
        Value::Boolean(b) => Ok(b),
        _ => Err(ProgramError::ExpectedBoolean),
    }
}
