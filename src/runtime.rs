use std::{
    io::{self, Write},
    rc::Rc,
    time::Instant,
};

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind, UnaryOp},
    config::InterpreterConfig,
    diagnostics::{Diagnostic, ManifastError, Result, SourceSpan},
    environment::{Environment, EnvironmentRef},
    parser,
    stack::ensure_sufficient_stack,
    stdlib,
    value::{ClassValue, InstanceValue, UserFunction, Value, ValueKind, format_number},
};

/// State shared with native functions: the output buffer and the clock.
pub struct ExecutionContext {
    output: String,
    echo: bool,
    clock_origin: Instant,
    last_nanos: u64,
}

impl ExecutionContext {
    pub fn new(echo: bool) -> Self {
        Self {
            output: String::new(),
            echo,
            clock_origin: Instant::now(),
            last_nanos: 0,
        }
    }

    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
        if self.echo {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Nanoseconds since this context was created; never decreases.
    pub fn monotonic_nanos(&mut self) -> u64 {
        let elapsed = u64::try_from(self.clock_origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_nanos = self.last_nanos.max(elapsed);
        self.last_nanos
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(false)
    }
}

pub struct Interpreter {
    globals: EnvironmentRef,
    env: EnvironmentRef,
    context: ExecutionContext,
    config: InterpreterConfig,
    modules: IndexMap<String, Value>,
    depth: usize,
    steps: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let globals = Environment::new();
        stdlib::install(&globals);
        Self {
            env: Rc::clone(&globals),
            globals,
            context: ExecutionContext::new(config.echo_output),
            config,
            modules: IndexMap::new(),
            depth: 0,
            steps: 0,
        }
    }

    pub fn output(&self) -> &str {
        self.context.output()
    }

    pub fn take_output(&mut self) -> String {
        self.context.take_output()
    }

    /// Looks up a global binding, e.g. to inspect state after a run.
    pub fn global(&self, name: &str) -> Option<Value> {
        Environment::get(&self.globals, name, SourceSpan::default()).ok()
    }

    /// Parses and runs `source` in the persistent global scope, returning the
    /// value of the last expression statement (or nil).
    #[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_program(source)?;
        tracing::debug!(statements = program.items.len(), "parsed program");
        self.eval_program(&program)
    }

    pub fn eval_program(&mut self, program: &Program) -> Result<Value> {
        self.steps = 0;
        self.depth = 0;
        let globals = Rc::clone(&self.globals);
        let flow = self.in_scope(globals, |this| this.run_statements(&program.items))?;
        match flow {
            FlowControl::Next => Ok(Value::nil()),
            FlowControl::NextValue(value) | FlowControl::Return(value) => Ok(value),
        }
    }

    fn in_scope<T>(
        &mut self,
        env: EnvironmentRef,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let prev = std::mem::replace(&mut self.env, env);
        let result = body(self);
        self.env = prev;
        result
    }

    fn run_statements(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let mut last_value = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::NextValue(value) => last_value = Some(value),
                FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
            }
        }
        Ok(match last_value {
            Some(value) => FlowControl::NextValue(value),
            None => FlowControl::Next,
        })
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        self.in_scope(child, |this| this.run_statements(statements))
    }

    /// Counts one unit of work against the configured step budget.
    fn tick(&mut self, span: SourceSpan) -> Result<()> {
        self.steps += 1;
        if let Some(budget) = self.config.step_budget {
            if self.steps > budget {
                return Err(ManifastError::runtime_at(
                    format!("step budget of {budget} exhausted"),
                    span,
                ));
            }
        }
        Ok(())
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        ensure_sufficient_stack(|| {
            self.tick(stmt.span)?;
            self.execute_statement_kind(stmt)
        })
    }

    fn execute_statement_kind(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Local { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::nil(),
                };
                self.env.borrow_mut().define(name.clone(), value);
                Ok(FlowControl::Next)
            }
            StmtKind::Function(decl) => {
                let function = self.closure(decl);
                if let Some(name) = &decl.name {
                    self.env.borrow_mut().define(name.clone(), function);
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Class { name, methods } => {
                let methods = methods
                    .iter()
                    .filter_map(|decl| {
                        let method_name = decl.name.clone()?;
                        Some((
                            method_name,
                            UserFunction {
                                decl: Rc::clone(decl),
                                env: Rc::clone(&self.env),
                                is_method: true,
                            },
                        ))
                    })
                    .collect();
                let class = ClassValue {
                    name: name.clone(),
                    methods,
                };
                self.env
                    .borrow_mut()
                    .define(name.clone(), Value::new(ValueKind::Class(Rc::new(class))));
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => {
                let value = self.evaluate(expr)?;
                Ok(FlowControl::NextValue(value))
            }
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    if self.evaluate(&branch.condition)?.is_truthy() {
                        return self.execute_block(&branch.body);
                    }
                }
                match else_branch {
                    Some(body) => self.execute_block(body),
                    None => Ok(FlowControl::Next),
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.tick(stmt.span)?;
                    if let FlowControl::Return(value) = self.execute_block(body)? {
                        return Ok(FlowControl::Return(value));
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::For {
                binding,
                start,
                end,
                step,
                body,
            } => {
                let first = self.evaluate_number(start, "`untuk` start")?;
                let last = self.evaluate_number(end, "`untuk` end")?;
                let step_by = match step {
                    Some(expr) => self.evaluate_number(expr, "`untuk` step")?,
                    None => 1.0,
                };
                if step_by == 0.0 {
                    let span = step.as_ref().map_or(stmt.span, |expr| expr.span);
                    return Err(ManifastError::runtime_at("`untuk` step must not be zero", span));
                }
                let mut current = first;
                while (step_by > 0.0 && current <= last) || (step_by < 0.0 && current >= last) {
                    self.tick(stmt.span)?;
                    let scope = Environment::with_parent(Rc::clone(&self.env));
                    scope
                        .borrow_mut()
                        .define(binding.clone(), Value::number(current));
                    let flow = self.in_scope(scope, |this| this.run_statements(body))?;
                    if let FlowControl::Return(value) = flow {
                        return Ok(FlowControl::Return(value));
                    }
                    current += step_by;
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::nil(),
                };
                Ok(FlowControl::Return(value))
            }
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_kind(expr))
    }

    fn evaluate_kind(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::SelfRef => Environment::get(&self.env, "self", expr.span).map_err(|_| {
                ManifastError::runtime_at("`self` used outside of a method", expr.span)
            }),
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let left_value = self.evaluate(left)?;
                if !left_value.is_truthy() {
                    return Ok(left_value);
                }
                self.evaluate(right)
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left_value = self.evaluate(left)?;
                if left_value.is_truthy() {
                    return Ok(left_value);
                }
                self.evaluate(right)
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                self.binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                unary(*op, value, expr.span)
            }
            ExprKind::Assign { target, value } => self.assign(target, value),
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg)?);
                }
                self.call(callee_value, arg_values, expr.span)
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::ObjectLiteral(entries) => {
                let mut fields = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.evaluate(value)?;
                    fields.insert(key.clone(), value);
                }
                Ok(Value::object(fields))
            }
            ExprKind::Group(inner) => self.evaluate(inner),
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                index_value_of(&target_value, &index_value, expr.span)
            }
            ExprKind::Slice { target, start, end } => {
                let target_value = self.evaluate(target)?;
                let start_value = match start {
                    Some(start) => Some(self.evaluate(start)?),
                    None => None,
                };
                let end_value = match end {
                    Some(end) => Some(self.evaluate(end)?),
                    None => None,
                };
                slice(&target_value, start_value, end_value, expr.span)
            }
            ExprKind::Member { target, name } => {
                let target_value = self.evaluate(target)?;
                member(&target_value, name, expr.span)
            }
            ExprKind::Function(decl) => Ok(self.closure(decl)),
            ExprKind::Import(name) => {
                let name_value = self.evaluate(name)?;
                match name_value.as_str() {
                    Some(module) => self.import(module, expr.span),
                    None => Err(ManifastError::runtime_at(
                        format!(
                            "`impor` expects a module name string, found {}",
                            name_value.type_name()
                        ),
                        name.span,
                    )),
                }
            }
        }
    }

    fn closure(&self, decl: &Rc<FunctionDecl>) -> Value {
        Value::function(UserFunction {
            decl: Rc::clone(decl),
            env: Rc::clone(&self.env),
            is_method: false,
        })
    }

    fn evaluate_number(&mut self, expr: &Expr, what: &str) -> Result<f64> {
        let value = self.evaluate(expr)?;
        value.as_number().ok_or_else(|| {
            ManifastError::runtime_at(
                format!("{what} must be a number, found {}", value.type_name()),
                expr.span,
            )
        })
    }

    #[tracing::instrument(level = "debug", skip(self, span))]
    fn import(&mut self, name: &str, span: SourceSpan) -> Result<Value> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let module = stdlib::resolve_module(name).ok_or_else(|| {
            ManifastError::from(
                Diagnostic::runtime(format!("unknown module `{name}`"))
                    .with_span(span)
                    .with_note("available modules: math, string, os"),
            )
        })?;
        tracing::debug!(module = name, "module loaded");
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> Result<Value> {
        match &target.kind {
            ExprKind::Variable(name) => {
                let value = self.evaluate(value)?;
                Environment::assign(&self.env, name, value.clone());
                Ok(value)
            }
            ExprKind::Member {
                target: owner,
                name,
            } => {
                let owner_value = self.evaluate(owner)?;
                let value = self.evaluate(value)?;
                set_member(&owner_value, name, value.clone(), target.span)?;
                Ok(value)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let owner_value = self.evaluate(owner)?;
                let index_value = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                set_index(&owner_value, &index_value, value.clone(), target.span)?;
                Ok(value)
            }
            _ => Err(ManifastError::runtime_at(
                "invalid assignment target",
                target.span,
            )),
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match callee.kind() {
            ValueKind::NativeFunction(native) => native
                .call(&mut self.context, &args)
                .map_err(|err| err.or_span(span)),
            ValueKind::Function(function) if function.is_method => {
                let mut args = args.into_iter();
                let receiver = args.next().ok_or_else(|| {
                    ManifastError::runtime_at(
                        format!(
                            "method `{}` called without a receiver; use `obj.{}(...)`",
                            function.name(),
                            function.name()
                        ),
                        span,
                    )
                })?;
                self.call_function(function, Some(receiver), args.collect(), span)
            }
            ValueKind::Function(function) => self.call_function(function, None, args, span),
            ValueKind::BoundMethod(bound) => {
                self.call_function(&bound.function, Some(bound.receiver.clone()), args, span)
            }
            ValueKind::Class(class) => self.instantiate(Rc::clone(class), args, span),
            _ => Err(ManifastError::runtime_at(
                format!("value of type {} is not callable", callee.type_name()),
                span,
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &UserFunction,
        receiver: Option<Value>,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        let decl = &function.decl;
        if args.len() != decl.params.len() {
            return Err(ManifastError::runtime_at(
                format!(
                    "function `{}` expected {} arguments but received {}",
                    function.name(),
                    decl.params.len(),
                    args.len()
                ),
                span,
            ));
        }
        if self.depth >= self.config.max_call_depth {
            return Err(ManifastError::from(
                Diagnostic::runtime(format!(
                    "maximum recursion depth exceeded in `{}`",
                    function.name()
                ))
                .with_span(span)
                .with_note(format!("limit is {} nested calls", self.config.max_call_depth)),
            ));
        }
        tracing::trace!(function = function.name(), depth = self.depth, "call");

        let frame = Environment::with_parent(Rc::clone(&function.env));
        {
            let mut scope = frame.borrow_mut();
            if let Some(receiver) = receiver {
                scope.define("self", receiver);
            }
            for (param, arg) in decl.params.iter().zip(args) {
                scope.define(param.clone(), arg);
            }
        }

        self.depth += 1;
        let result = self.in_scope(frame, |this| this.run_statements(&decl.body));
        self.depth -= 1;
        match result? {
            FlowControl::Return(value) => Ok(value),
            FlowControl::Next | FlowControl::NextValue(_) => Ok(Value::nil()),
        }
    }

    fn instantiate(
        &mut self,
        class: Rc<ClassValue>,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        let instance = Value::new(ValueKind::Instance(InstanceValue::new(Rc::clone(&class))));
        if let Some(constructor) = class.constructor() {
            self.call_function(constructor, Some(instance.clone()), args, span)?;
        }
        Ok(instance)
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Add => match (left.kind(), right.kind()) {
                (ValueKind::Number(a), ValueKind::Number(b)) => Ok(Value::number(a + b)),
                (ValueKind::String(_), _) | (_, ValueKind::String(_)) => {
                    Ok(Value::string(format!("{left}{right}")))
                }
                _ => self.overloaded(op, left, right, span),
            },
            Sub => self.arithmetic(op, left, right, span, |a, b| a - b),
            Mul => self.arithmetic(op, left, right, span, |a, b| a * b),
            Div => {
                if right.as_number() == Some(0.0) && left.as_number().is_some() {
                    return Err(ManifastError::runtime_at("division by zero", span));
                }
                self.arithmetic(op, left, right, span, |a, b| a / b)
            }
            Mod => {
                if right.as_number() == Some(0.0) && left.as_number().is_some() {
                    return Err(ManifastError::runtime_at("modulo by zero", span));
                }
                self.arithmetic(op, left, right, span, |a, b| a % b)
            }
            Equal => Ok(Value::bool(left.equals(&right))),
            NotEqual => Ok(Value::bool(!left.equals(&right))),
            Less => compare(op, &left, &right, span, |ord| ord.is_lt()),
            LessEqual => compare(op, &left, &right, span, |ord| ord.is_le()),
            Greater => compare(op, &left, &right, span, |ord| ord.is_gt()),
            GreaterEqual => compare(op, &left, &right, span, |ord| ord.is_ge()),
            And => Ok(if left.is_truthy() { right } else { left }),
            Or => Ok(if left.is_truthy() { left } else { right }),
            BitAnd => bitwise(op, &left, &right, span, |a, b| Some(a & b)),
            BitOr => bitwise(op, &left, &right, span, |a, b| Some(a | b)),
            BitXor => bitwise(op, &left, &right, span, |a, b| Some(a ^ b)),
            ShiftLeft => bitwise(op, &left, &right, span, |a, b| {
                u32::try_from(b).ok().and_then(|b| a.checked_shl(b))
            }),
            ShiftRight => bitwise(op, &left, &right, span, |a, b| {
                u32::try_from(b).ok().and_then(|b| a.checked_shr(b))
            }),
        }
    }

    fn arithmetic(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        span: SourceSpan,
        apply: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(Value::number(apply(a, b))),
            _ => self.overloaded(op, left, right, span),
        }
    }

    /// Arithmetic on instances dispatches to `__jumlah`, `__kurang`, `__kali`
    /// or `__bagi` on the instance operand, passing the other operand.
    fn overloaded(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        span: SourceSpan,
    ) -> Result<Value> {
        let hook = match op {
            BinaryOp::Add => Some("__jumlah"),
            BinaryOp::Sub => Some("__kurang"),
            BinaryOp::Mul => Some("__kali"),
            BinaryOp::Div => Some("__bagi"),
            _ => None,
        };
        let (receiver, other) = match (left.kind(), right.kind()) {
            (ValueKind::Instance(_), _) => (left.clone(), right.clone()),
            (_, ValueKind::Instance(_)) => (right.clone(), left.clone()),
            _ => return Err(operand_error(op, &left, &right, span)),
        };
        let method = match (hook, receiver.kind()) {
            (Some(hook), ValueKind::Instance(instance)) => instance.class.methods.get(hook).cloned(),
            _ => None,
        };
        match method {
            Some(method) => self.call_function(&method, Some(receiver), vec![other], span),
            None => Err(operand_error(op, &left, &right, span)),
        }
    }
}

enum FlowControl {
    Next,
    NextValue(Value),
    Return(Value),
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::number(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Nil => Value::nil(),
    }
}

fn unary(op: UnaryOp, value: Value, span: SourceSpan) -> Result<Value> {
    match op {
        UnaryOp::Negate => match value.as_number() {
            Some(n) => Ok(Value::number(-n)),
            None => Err(ManifastError::runtime_at(
                format!("cannot negate value of type {}", value.type_name()),
                span,
            )),
        },
        UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
        UnaryOp::BitNot => match value.as_number() {
            Some(n) => Ok(Value::number(!(n as i64) as f64)),
            None => Err(ManifastError::runtime_at(
                format!("cannot apply `~` to value of type {}", value.type_name()),
                span,
            )),
        },
    }
}

/// Integer operators truncate both operands to 64-bit integers.
fn bitwise(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    span: SourceSpan,
    apply: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Value> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(operand_error(op, left, right, span));
    };
    match apply(a as i64, b as i64) {
        Some(result) => Ok(Value::number(result as f64)),
        None => Err(ManifastError::runtime_at(
            format!("shift amount {} is outside 0..64", format_number(b)),
            span,
        )),
    }
}

fn operand_error(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> ManifastError {
    ManifastError::runtime_at(
        format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        span,
    )
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    span: SourceSpan,
    test: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let ordering = match (left.kind(), right.kind()) {
        (ValueKind::Number(a), ValueKind::Number(b)) => a.partial_cmp(b),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => return Err(operand_error(op, left, right, span)),
    };
    // NaN compares false against everything.
    Ok(Value::bool(ordering.is_some_and(test)))
}

/// Converts a 1-based script index to a checked integer.
fn integer_index(index: &Value, span: SourceSpan) -> Result<i64> {
    match index.as_number() {
        Some(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
        Some(n) => Err(ManifastError::runtime_at(
            format!("index {} is not an integer", crate::value::format_number(n)),
            span,
        )),
        None => Err(ManifastError::runtime_at(
            format!("index must be a number, found {}", index.type_name()),
            span,
        )),
    }
}

fn out_of_bounds(position: i64, len: usize, what: &str, span: SourceSpan) -> ManifastError {
    ManifastError::from(
        Diagnostic::runtime(format!(
            "index {position} out of bounds for {what} of length {len}"
        ))
        .with_span(span)
        .with_note("indices start at 1"),
    )
}

fn index_value_of(target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
    match target.kind() {
        ValueKind::Array(values) => {
            let position = integer_index(index, span)?;
            let values = values.borrow();
            if position < 1 || position as usize > values.len() {
                return Err(out_of_bounds(position, values.len(), "array", span));
            }
            Ok(values[position as usize - 1].clone())
        }
        ValueKind::String(text) => {
            let position = integer_index(index, span)?;
            let len = text.chars().count();
            if position < 1 || position as usize > len {
                return Err(out_of_bounds(position, len, "string", span));
            }
            let ch = text.chars().nth(position as usize - 1).unwrap_or_default();
            Ok(Value::string(ch.to_string()))
        }
        _ => Err(ManifastError::runtime_at(
            format!("value of type {} cannot be indexed", target.type_name()),
            span,
        )),
    }
}

fn set_index(target: &Value, index: &Value, value: Value, span: SourceSpan) -> Result<()> {
    match target.kind() {
        ValueKind::Array(values) => {
            let position = integer_index(index, span)?;
            let mut values = values.borrow_mut();
            let len = values.len();
            if position >= 1 && position as usize <= len {
                values[position as usize - 1] = value;
                Ok(())
            } else if position >= 1 && position as usize == len + 1 {
                values.push(value);
                Ok(())
            } else {
                Err(out_of_bounds(position, len, "array", span))
            }
        }
        _ => Err(ManifastError::runtime_at(
            format!(
                "index assignment expects an array, found {}",
                target.type_name()
            ),
            span,
        )),
    }
}

fn slice(
    target: &Value,
    start: Option<Value>,
    end: Option<Value>,
    span: SourceSpan,
) -> Result<Value> {
    let len = match target.kind() {
        ValueKind::Array(values) => values.borrow().len(),
        ValueKind::String(text) => text.chars().count(),
        _ => {
            return Err(ManifastError::runtime_at(
                format!("value of type {} cannot be sliced", target.type_name()),
                span,
            ));
        }
    };
    let lo = match start {
        Some(value) => integer_index(&value, span)?,
        None => 1,
    };
    let hi = match end {
        Some(value) => integer_index(&value, span)?,
        None => len as i64,
    };
    // `lo == hi + 1` is the empty slice.
    if lo < 1 || hi > len as i64 || lo > hi + 1 {
        return Err(ManifastError::from(
            Diagnostic::runtime(format!("slice {lo}:{hi} out of bounds for length {len}"))
                .with_span(span),
        ));
    }
    let from = (lo - 1) as usize;
    let to = hi.max(0) as usize;
    match target.kind() {
        ValueKind::String(text) => Ok(Value::string(
            text.chars().skip(from).take(to.saturating_sub(from)).collect::<String>(),
        )),
        ValueKind::Array(values) => Ok(Value::array(values.borrow()[from..to].to_vec())),
        _ => Ok(Value::nil()),
    }
}

fn member(target: &Value, name: &str, span: SourceSpan) -> Result<Value> {
    match target.kind() {
        ValueKind::Instance(instance) => instance.lookup(target, name).ok_or_else(|| {
            ManifastError::runtime_at(
                format!("{} instance has no member `{name}`", instance.class.name),
                span,
            )
        }),
        ValueKind::Class(class) => class
            .methods
            .get(name)
            .map(|method| Value::function(method.clone()))
            .ok_or_else(|| {
                ManifastError::runtime_at(
                    format!("class `{}` has no method `{name}`", class.name),
                    span,
                )
            }),
        ValueKind::Object(fields) => Ok(fields
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(Value::nil)),
        ValueKind::Module(module) => module.exports.get(name).cloned().ok_or_else(|| {
            ManifastError::runtime_at(
                format!("module `{}` has no member `{name}`", module.name),
                span,
            )
        }),
        _ => Err(ManifastError::runtime_at(
            format!(
                "cannot read member `{name}` of value of type {}",
                target.type_name()
            ),
            span,
        )),
    }
}

fn set_member(target: &Value, name: &str, value: Value, span: SourceSpan) -> Result<()> {
    match target.kind() {
        ValueKind::Instance(instance) => {
            instance.fields.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        ValueKind::Object(fields) => {
            fields.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        _ => Err(ManifastError::runtime_at(
            format!(
                "cannot set member `{name}` on value of type {}",
                target.type_name()
            ),
            span,
        )),
    }
}
