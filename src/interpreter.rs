//! Tree‑walking evaluator.
//!
//! Statements run for their effects and report how control left them through
//! [`Flow`]; expressions always produce a [`Value`].  `break` and `return` are
//! ordinary `Flow` values threaded back up the call chain, never errors, so
//! only genuine runtime failures ever reach the caller of [`Interpreter::interpret`].

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{
    Callable, Class, Function, Instance, NativeFn, NativeFunction, Value, INITIALIZER,
};

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,

    /// A `break` is unwinding to the nearest enclosing loop.
    Break,

    /// A `return` is unwinding to the nearest call boundary.
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    out: W,
}

impl Interpreter<io::Stdout> {
    /// An interpreter printing to stdout, with the native `clock` defined.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// An interpreter whose `print` statements write to `out`.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            out,
        };

        interpreter.register_global("clock", 0, clock);

        interpreter
    }

    /// Inject a host function into the global scope.
    pub fn register_global(&mut self, name: &str, arity: usize, func: NativeFn) {
        debug!("Defining native function '{}' with arity {}", name, arity);

        let native = NativeFunction {
            name: name.to_string(),
            arity,
            func,
        };

        self.globals
            .borrow_mut()
            .define(name, Callable::Native(Rc::new(native)).into());
    }

    /// Merge a resolver side table.  Entries accumulate so closures from
    /// earlier runs keep resolving.
    pub fn add_locals(&mut self, locals: Locals) {
        debug!("Adding {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Interprets a list of statements (a "program"), stopping at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Flow::Break | Flow::Return(_) = self.execute(stmt)? {
                // The resolver rejects top-level break/return.
                debug!("Ignoring control flow signal at top level");
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope: EnvRef = Environment::child(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => {
                            debug!("Break caught by while loop");
                            break;
                        }
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Callable::Function(Rc::new(function)).into());
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                // Predeclared so method bodies can refer to the class.
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Nil);

                let superclass: Option<Rc<Class>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Callable(Callable::Class(class)) => Some(class),
                        _ => {
                            let at: &Token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(at, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                // Mirrors the resolver's extra `super` scope.
                let closure: EnvRef = match &superclass {
                    Some(class) => {
                        let scope: EnvRef = Environment::child(&self.environment);
                        scope
                            .borrow_mut()
                            .define("super", Callable::Class(Rc::clone(class)).into());
                        scope
                    }
                    None => Rc::clone(&self.environment),
                };

                let table = methods
                    .iter()
                    .map(|decl| {
                        let is_initializer: bool = decl.name.lexeme == INITIALIZER;
                        let method =
                            Function::new(Rc::clone(decl), Rc::clone(&closure), is_initializer);

                        (decl.name.lexeme.clone(), Rc::new(method))
                    })
                    .collect();

                let class = Class::new(name.lexeme.clone(), superclass, table);

                self.environment
                    .borrow_mut()
                    .assign(name, Callable::Class(Rc::new(class)).into())?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` inside `scope`, restoring the current environment
    /// afterwards whether they finished, unwound, or failed.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, scope);

        let result: Result<Flow> = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                // The result is the last operand evaluated, not a boolean.
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let args: Vec<Value> = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<Value>>>()?;

                self.call(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| {
                    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
                }),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the superclass lives `distance` scopes up and the
    /// receiver one scope below it.
    fn super_method(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let unresolved = || LoxError::runtime(keyword, "Unresolved 'super'.");

        let distance: usize = *self.locals.get(&id).ok_or_else(unresolved)?;

        let Some(Value::Callable(Callable::Class(superclass))) =
            Environment::get_at(&self.environment, distance, "super")
        else {
            return Err(unresolved());
        };

        let Some(Value::Instance(instance)) = distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        else {
            return Err(unresolved());
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Callable::Function(Rc::new(found.bind(instance))).into()),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invokes a callable (native, user function or class).
    fn call(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        let Value::Callable(callable) = callee else {
            return Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            ));
        };

        if args.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        match callable {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(&args).map_err(|message| LoxError::runtime(paren, message))
            }

            Callable::Function(function) => self.call_function(&function, args),

            Callable::Class(class) => {
                debug!("Instantiating class '{}'", class.name);

                let instance: Rc<Instance> = Rc::new(Instance::new(Rc::clone(&class)));

                if let Some(init) = class.find_method(INITIALIZER) {
                    self.call_function(&init.bind(Rc::clone(&instance)), args)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    /// Bind parameters in a fresh scope under the function's closure (not the
    /// caller's scope) and run the body there.
    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", function.name());

        let scope: EnvRef = Environment::child(&function.closure);

        for (param, arg) in function.declaration.params.iter().zip(args) {
            scope.borrow_mut().define(&param.lexeme, arg);
        }

        let flow: Flow = self.execute_block(&function.declaration.body, scope)?;

        if function.is_initializer {
            return Environment::get_at(&function.closure, 0, "this").ok_or_else(|| {
                LoxError::runtime(&function.declaration.name, "Initializer has no 'this'.")
            });
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::String(a), n @ Value::Number(_)) => Ok(Value::String(format!("{}{}", a, n))),
            (n @ Value::Number(_), Value::String(b)) => Ok(Value::String(format!("{}{}", n, b))),
            (a, b) => Err(LoxError::runtime(
                operator,
                format!(
                    "Operands must be two numbers or a string and a string or number, got {} and {}.",
                    a.kind(),
                    b.kind()
                ),
            )),
        },

        TokenType::MINUS => numbers(operator, &left, &right).map(|(a, b)| Value::Number(a - b)),

        TokenType::STAR => numbers(operator, &left, &right).map(|(a, b)| Value::Number(a * b)),

        TokenType::SLASH => {
            let (a, b) = numbers(operator, &left, &right)?;

            if b == 0.0 {
                return Err(LoxError::runtime(operator, "Division by zero."));
            }

            Ok(Value::Number(a / b))
        }

        TokenType::GREATER => numbers(operator, &left, &right).map(|(a, b)| Value::Bool(a > b)),

        TokenType::GREATER_EQUAL => {
            numbers(operator, &left, &right).map(|(a, b)| Value::Bool(a >= b))
        }

        TokenType::LESS => numbers(operator, &left, &right).map(|(a, b)| Value::Bool(a < b)),

        TokenType::LESS_EQUAL => {
            numbers(operator, &left, &right).map(|(a, b)| Value::Bool(a <= b))
        }

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.is_equal(&right))),

        TokenType::BANG_EQUAL => Ok(Value::Bool(!left.is_equal(&right))),

        _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
    }
}

fn numbers(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

/// Native `clock()`: seconds since the Unix epoch.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    let micros: i64 = chrono::Utc::now().timestamp_micros();

    Ok(Value::Number(micros as f64 / 1_000_000.0))
}
