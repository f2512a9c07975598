use std::fmt;

use super::value::format_number;

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// The key of a member access.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// `object.name`
    Named(String),
    /// `object[expr]`
    Computed(Box<Expr>),
}

/// Expression AST produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: Property,
        /// `?.` access: yields `undefined` instead of failing on a nullish object.
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Arrow {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Delete(Box<Expr>),
}

impl Expr {
    /// Whether this expression can appear on the left of `=`.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { optional: false, .. })
    }

    /// Height of the tree rooted here; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((expr, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(expr.children().into_iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Ident(_) => Vec::new(),
            Expr::Array(items) => items.iter().collect(),
            Expr::Object(entries) => entries.iter().map(|(_, value)| value).collect(),
            Expr::Call { callee, args } => std::iter::once(callee.as_ref()).chain(args).collect(),
            Expr::Member {
                object, property, ..
            } => match property {
                Property::Named(_) => vec![object.as_ref()],
                Property::Computed(key) => vec![object.as_ref(), key.as_ref()],
            },
            Expr::Arrow { body: child, .. }
            | Expr::Unary { operand: child, .. }
            | Expr::Delete(child) => vec![child.as_ref()],
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => vec![test.as_ref(), consequent.as_ref(), alternate.as_ref()],
            Expr::Assign { target, value } => vec![target.as_ref(), value.as_ref()],
        }
    }
}

/// A parsed expression string: `;`-separated statements. Its value is the
/// value of the last statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    statements: Vec<Expr>,
}

impl Program {
    #[must_use]
    pub fn new(statements: Vec<Expr>) -> Self {
        Self { statements }
    }

    #[must_use]
    pub fn statements(&self) -> &[Expr] {
        &self.statements
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::TypeOf => write!(f, "typeof "),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNeq => "!==",
        };
        f.write_str(symbol)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Undefined => write!(f, "undefined"),
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => f.write_str(&format_number(*n)),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expr::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
            Expr::Ident(name) => f.write_str(name),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let dot = if *optional { "?." } else { "." };
                match property {
                    Property::Named(name) => write!(f, "{object}{dot}{name}"),
                    Property::Computed(key) if *optional => write!(f, "{object}?.[{key}]"),
                    Property::Computed(key) => write!(f, "{object}[{key}]"),
                }
            }
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Arrow { params, body } => write!(f, "({}) => {body}", params.join(", ")),
            Expr::Unary { op, operand } => write!(f, "({op}{operand})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Logical { op, lhs, rhs } => {
                let symbol = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "({lhs} {symbol} {rhs})")
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => write!(f, "({test} ? {consequent} : {alternate})"),
            Expr::Assign { target, value } => write!(f, "{target} = {value}"),
            Expr::Delete(target) => write!(f, "delete {target}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}
