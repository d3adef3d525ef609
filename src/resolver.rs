//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (local redeclaration, reading a local in its own
//!    initializer, misplaced `return`/`break`/`this`/`super`, self‑inheritance).
//! 3. Record, for *each* variable‑like expression node, how many scopes lie
//!    between the use and its declaration.  Nodes left out of the table are
//!    globals and are looked up by name at run time.
//!
//! The scopes pushed here mirror, one for one, the environments the
//! interpreter creates: one per block, one per function call for the
//! parameters, one holding `super` around a subclass's methods and one
//! holding `this` around every class's methods.
//!
//! Errors are collected, never thrown: resolution continues best‑effort over
//! the rest of the tree.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::Token;
use crate::value::INITIALIZER;

/// Side table: scope distance for every resolved local reference.
pub type Locals = HashMap<ExprId, usize>;

/// What kind of function body encloses the current node?
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body encloses the current node?
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Ambient state handed down the walk.  Constructs that change it pass a
/// modified copy to their children, so restoring is implicit.
#[derive(Copy, Clone, Debug)]
struct Context {
    function: FunctionKind,
    class: ClassKind,
    in_loop: bool,
}

impl Context {
    const TOP_LEVEL: Context = Context {
        function: FunctionKind::None,
        class: ClassKind::None,
        in_loop: false,
    };
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    locals: Locals,
    errors: Vec<LoxError>,
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements, returning the side table and every
    /// static error found.
    pub fn resolve(mut self, statements: &'a [Stmt]) -> (Locals, Vec<LoxError>) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_block(statements, Context::TOP_LEVEL);

        info!(
            "Resolved {} local reference(s), {} error(s)",
            self.locals.len(),
            self.errors.len()
        );

        (self.locals, self.errors)
    }

    fn resolve_block(&mut self, statements: &'a [Stmt], ctx: Context) {
        for stmt in statements {
            self.resolve_stmt(stmt, ctx);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt, ctx: Context) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_block(statements, ctx);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so `var a = a;`
                // in a local scope is caught.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr, ctx);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // The name is visible inside its own body, enabling recursion.
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function, ctx);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods, ctx),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr, ctx),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition, ctx);
                self.resolve_stmt(then_branch, ctx);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb, ctx);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition, ctx);
                self.resolve_stmt(
                    body,
                    Context {
                        in_loop: true,
                        ..ctx
                    },
                );
            }

            Stmt::Break(keyword) => {
                if !ctx.in_loop {
                    self.error(keyword, "Can't use 'break' outside of a loop.");
                }
            }

            Stmt::Return { keyword, value } => {
                if ctx.function == FunctionKind::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if ctx.function == FunctionKind::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr, ctx);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &'a Token,
        superclass: Option<&'a Expr>,
        methods: &'a [Rc<FunctionDecl>],
        ctx: Context,
    ) {
        debug!("Resolving class '{}'", name.lexeme);

        self.declare(name);
        self.define(name);

        let mut class_kind: ClassKind = ClassKind::Class;

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            class_kind = ClassKind::Subclass;
            self.resolve_expr(superclass, ctx);

            self.begin_scope();
            self.bind_synthetic("super");
        }

        self.begin_scope();
        self.bind_synthetic("this");

        for method in methods {
            let kind: FunctionKind = if method.name.lexeme == INITIALIZER {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };

            self.resolve_function(
                method,
                kind,
                Context {
                    class: class_kind,
                    ..ctx
                },
            );
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr, ctx: Context) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner, ctx),

            Expr::Unary { right, .. } => self.resolve_expr(right, ctx),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left, ctx);
                self.resolve_expr(right, ctx);
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme.as_str()) == Some(&false) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value, ctx);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee, ctx);
                for arg in arguments {
                    self.resolve_expr(arg, ctx);
                }
            }

            // Property names are looked up dynamically; only the object and
            // value need resolving.
            Expr::Get { object, .. } => self.resolve_expr(object, ctx),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value, ctx);
                self.resolve_expr(object, ctx);
            }

            Expr::This { id, keyword } => {
                if ctx.class == ClassKind::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match ctx.class {
                    ClassKind::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassKind::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassKind::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters, then resolve the body
    /// inside it.  Loops outside the function do not extend into it.
    fn resolve_function(&mut self, decl: &'a FunctionDecl, kind: FunctionKind, ctx: Context) {
        let inner = Context {
            function: kind,
            class: ctx.class,
            in_loop: false,
        };

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_block(&decl.body, inner);
        self.end_scope();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// No-op at global scope: globals may be redeclared freely.
    fn declare(&mut self, name: &'a Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(name.lexeme.as_str()) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        scope.insert(name.lexeme.as_str(), false);
    }

    fn define(&mut self, name: &'a Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.as_str(), true);
        }
    }

    fn bind_synthetic(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of the
    /// table when no scope declares it (a global).
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme.as_str()) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
