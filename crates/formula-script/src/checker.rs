use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::functions::FunctionRegistry;
use crate::script::Fragment;
use crate::types::Type;

/// Type-check a fragment chain.
///
/// Parse diagnostics of every link are included first; semantic analysis
/// runs only when the whole chain parsed. Declarations are checked in chain
/// order and each one extends the scope seen by later statements.
pub fn check_chain(
    fragment: &Fragment,
    member_type: fn(&str) -> Option<Type>,
    functions: &FunctionRegistry,
) -> Vec<Diagnostic> {
    let links = fragment.links();

    let mut diagnostics: Vec<Diagnostic> = links
        .iter()
        .flat_map(|link| link.parse_diagnostics().iter().cloned())
        .collect();
    if !diagnostics.is_empty() {
        return diagnostics;
    }

    let mut checker = Checker {
        member_type,
        functions,
        scope: HashMap::new(),
        diagnostics: &mut diagnostics,
    };
    for link in links {
        if let Some(program) = link.program() {
            checker.check_program(program);
        }
    }
    diagnostics
}

struct Checker<'a> {
    member_type: fn(&str) -> Option<Type>,
    functions: &'a FunctionRegistry,
    scope: HashMap<String, Type>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Checker<'_> {
    fn check_program(&mut self, program: &Program) {
        for stmt in &program.stmts {
            match stmt {
                Stmt::Decl {
                    data_type,
                    name,
                    expr,
                } => {
                    let inferred = self.check_expr(expr);
                    if let Some(inferred) = inferred {
                        if !data_type.accepts(&inferred) {
                            self.error(format!(
                                "cannot assign a {inferred} value to {data_type} {name}"
                            ));
                        }
                    }
                    if self.scope.contains_key(name) {
                        self.error(format!("duplicate declaration of {name}"));
                        continue;
                    }
                    if (self.member_type)(name).is_some() {
                        self.diagnostics.push(Diagnostic::warning(format!(
                            "declaration of {name} shadows a context member"
                        )));
                    }
                    self.scope.insert(name.clone(), data_type.clone());
                }
                Stmt::Expr(expr) => {
                    self.check_expr(expr);
                }
            }
        }
    }

    /// Infer the type of `expr`, recording diagnostics along the way.
    ///
    /// `None` means the type could not be established; the failure has
    /// already been reported, so callers stay quiet to avoid cascades.
    fn check_expr(&mut self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Int(_) => Some(Type::Int),
            Expr::Decimal(_) => Some(Type::Decimal),
            Expr::Bool(_) => Some(Type::Bool),
            Expr::Text(_) => Some(Type::Text),
            Expr::Ident(name) => {
                if let Some(ty) = self.scope.get(name) {
                    return Some(ty.clone());
                }
                if let Some(ty) = (self.member_type)(name) {
                    return Some(ty);
                }
                self.error(format!("unknown identifier {name}"));
                None
            }
            Expr::Member { base, member } => {
                let base_type = self.check_expr(base)?;
                match &base_type {
                    Type::Record(record) => match record.field(member) {
                        Some(ty) => Some(ty.clone()),
                        None => {
                            self.error(format!("record has no member {member}"));
                            None
                        }
                    },
                    other => {
                        self.error(format!("type {other} has no member {member}"));
                        None
                    }
                }
            }
            Expr::Call { callee, args } => self.check_call(callee, args),
            Expr::Unary { op, expr } => {
                let ty = self.check_expr(expr)?;
                match op {
                    UnaryOp::Negate if ty.is_numeric() => Some(ty),
                    UnaryOp::Negate => {
                        self.error(format!("cannot negate a {ty} value"));
                        None
                    }
                    UnaryOp::Not if ty == Type::Bool => Some(Type::Bool),
                    UnaryOp::Not => {
                        self.error(format!("'!' expects a bool operand, got {ty}"));
                        None
                    }
                }
            }
            Expr::Binary { op, left, right } => self.check_binary(*op, left, right),
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr]) -> Option<Type> {
        let arg_types: Vec<Option<Type>> = args.iter().map(|arg| self.check_expr(arg)).collect();

        let name = match callee {
            Expr::Ident(name) => name,
            _ => {
                self.error("only named functions can be called".to_string());
                return None;
            }
        };
        let Some(function) = self.functions.get(name) else {
            self.error(format!("unknown function {name}"));
            return None;
        };

        // Skip signature checking when an argument already failed.
        let arg_types: Vec<Type> = arg_types.into_iter().collect::<Option<_>>()?;
        match function.check_call(&arg_types) {
            Ok(ty) => Some(ty),
            Err(message) => {
                self.error(format!("{message} (expected {})", function.signature()));
                None
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Option<Type> {
        if matches!(op, BinaryOp::Divide | BinaryOp::Remainder) && is_zero_literal(right) {
            self.diagnostics
                .push(Diagnostic::warning("division by a constant zero".to_string()));
        }

        let lt = self.check_expr(left);
        let rt = self.check_expr(right);
        let (lt, rt) = (lt?, rt?);

        match op {
            BinaryOp::Add if lt == Type::Text && rt == Type::Text => Some(Type::Text),
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Remainder => match Type::unify_numeric(&lt, &rt) {
                Some(ty) => Some(ty),
                None => {
                    self.error(format!(
                        "operator '{}' is not defined for {lt} and {rt}",
                        op.symbol()
                    ));
                    None
                }
            },
            BinaryOp::Equals | BinaryOp::NotEquals => {
                if lt == rt || Type::unify_numeric(&lt, &rt).is_some() {
                    Some(Type::Bool)
                } else {
                    self.error(format!("cannot compare {lt} and {rt}"));
                    None
                }
            }
            BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals => {
                if Type::unify_numeric(&lt, &rt).is_some() {
                    Some(Type::Bool)
                } else {
                    self.error(format!(
                        "operator '{}' expects numeric operands, got {lt} and {rt}",
                        op.symbol()
                    ));
                    None
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                if lt == Type::Bool && rt == Type::Bool {
                    Some(Type::Bool)
                } else {
                    self.error(format!(
                        "operator '{}' expects bool operands, got {lt} and {rt}",
                        op.symbol()
                    ));
                    None
                }
            }
        }
    }

    fn error(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::error(message));
    }
}

fn is_zero_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Int(0) => true,
        Expr::Decimal(d) => d.is_zero(),
        _ => false,
    }
}
