use rust_decimal::Decimal;

use crate::types::Type;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Text(String),
    Ident(String),
    Member {
        base: Box<Expr>,
        member: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `<type> <name> = <expr> ;` — a single-assignment declaration.
    Decl {
        data_type: Type,
        name: String,
        expr: Expr,
    },
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Expr {
    /// Pre-order, left-to-right traversal of this expression tree.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Int(_) | Expr::Decimal(_) | Expr::Bool(_) | Expr::Text(_) | Expr::Ident(_) => {}
            Expr::Member { base, .. } => base.walk(visit),
            Expr::Call { callee, args } => {
                callee.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Unary { expr, .. } => expr.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
        }
    }

    /// Dotted spelling of a pure member path (`a`, `a.b`, `a.b.c`).
    ///
    /// `None` when any link of the chain is not an identifier or member
    /// access (for example a call result).
    pub fn path_text(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Member { base, member } => {
                let mut path = base.path_text()?;
                path.push('.');
                path.push_str(member);
                Some(path)
            }
            _ => None,
        }
    }
}

impl Program {
    pub fn walk_exprs<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        for stmt in &self.stmts {
            match stmt {
                Stmt::Decl { expr, .. } | Stmt::Expr(expr) => expr.walk(visit),
            }
        }
    }

    /// Name declared by this program's first declaration statement, if any.
    pub fn declared_name(&self) -> Option<&str> {
        self.stmts.iter().find_map(|stmt| match stmt {
            Stmt::Decl { name, .. } => Some(name.as_str()),
            Stmt::Expr(_) => None,
        })
    }

    /// Identifiers appearing at reference position, deduplicated in
    /// first-occurrence order.
    ///
    /// Member names (the `b` of `a.b`) and declaration left-hand sides are
    /// never reference positions, so they are excluded by construction: both
    /// are stored as plain strings rather than identifier nodes.
    pub fn collect_identifier_references(&self, out: &mut Vec<String>) {
        self.walk_exprs(&mut |expr| {
            if let Expr::Ident(name) = expr {
                if !out.iter().any(|seen| seen == name) {
                    out.push(name.clone());
                }
            }
        });
    }

    /// Name spellings relevant to access control, in traversal order.
    ///
    /// Every pure member path contributes the spelling of each of its member
    /// nodes (`a.b.c` yields `a.b.c` and `a.b`); identifiers contribute their
    /// own spelling only when they stand alone, not as the base of a longer
    /// path.
    pub fn collect_name_spellings(&self, out: &mut Vec<String>) {
        for stmt in &self.stmts {
            match stmt {
                Stmt::Decl { expr, .. } | Stmt::Expr(expr) => collect_spellings(expr, out),
            }
        }
    }
}

fn collect_spellings(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => out.push(name.clone()),
        Expr::Member { base, .. } => {
            if let Some(path) = expr.path_text() {
                out.push(path);
            }
            collect_base_spellings(base, out);
        }
        Expr::Call { callee, args } => {
            collect_spellings(callee, out);
            for arg in args {
                collect_spellings(arg, out);
            }
        }
        Expr::Unary { expr, .. } => collect_spellings(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_spellings(left, out);
            collect_spellings(right, out);
        }
        Expr::Int(_) | Expr::Decimal(_) | Expr::Bool(_) | Expr::Text(_) => {}
    }
}

/// Like [`collect_spellings`], but for the base of a member access: the root
/// identifier of a pure path is part of the enclosing spelling and is not
/// reported on its own.
fn collect_base_spellings(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Ident(_) => {}
        Expr::Member { base, .. } => {
            if let Some(path) = expr.path_text() {
                out.push(path);
            }
            collect_base_spellings(base, out);
        }
        other => collect_spellings(other, out),
    }
}
