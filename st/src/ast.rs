//! Template syntax tree
//!
//! The tree carries no references to an environment: filters, functions and
//! variables are plain names resolved at render time.

use serde_json::Value;

/// Position of a token in the template source (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal template text
    Text(String),
    /// `{{ expr }}`
    Output { expr: Expr, span: Span },
    /// `{% if %}` with any number of `elif` branches
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    /// `{% for %}`; `otherwise` renders when the iterable is empty
    For {
        target: LoopTarget,
        iter: Expr,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        span: Span,
    },
    /// `{% set name = expr %}` binds in the current scope only
    Set { name: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTarget {
    Single(String),
    Pair(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Var(String),
    Attr {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Filter {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Test {
        target: Box<Expr>,
        test: TestKind,
        negated: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
}

/// The fixed set of `is` tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Defined,
    Undefined,
    None,
    String,
    Number,
    Boolean,
    Mapping,
    Sequence,
    Even,
    Odd,
}

impl TestKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "defined" => Some(Self::Defined),
            "undefined" => Some(Self::Undefined),
            "none" => Some(Self::None),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "mapping" => Some(Self::Mapping),
            "sequence" => Some(Self::Sequence),
            "even" => Some(Self::Even),
            "odd" => Some(Self::Odd),
            _ => None,
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Short source-like description used in error messages
    pub fn describe(&self) -> String {
        match &self.kind {
            ExprKind::Var(name) => name.clone(),
            ExprKind::Attr { target, name } => format!("{}.{}", target.describe(), name),
            ExprKind::Index { target, .. } => format!("{}[...]", target.describe()),
            ExprKind::Call { name, .. } => format!("{}(...)", name),
            ExprKind::Filter { target, name, .. } => format!("{} | {}", target.describe(), name),
            ExprKind::Literal(value) => value.to_string(),
            _ => "expression".to_string(),
        }
    }

    /// Outermost filter name, if the expression is a filter application
    pub fn outer_filter(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Filter { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Var(name.to_string()), Span::default())
    }

    #[test]
    fn test_describe_attribute_chain() {
        let expr = Expr::new(
            ExprKind::Attr {
                target: Box::new(Expr::new(
                    ExprKind::Attr {
                        target: Box::new(var("user")),
                        name: "profile".to_string(),
                    },
                    Span::default(),
                )),
                name: "email".to_string(),
            },
            Span::default(),
        );
        assert_eq!(expr.describe(), "user.profile.email");
    }

    #[test]
    fn test_test_kind_from_name() {
        assert_eq!(TestKind::from_name("defined"), Some(TestKind::Defined));
        assert_eq!(TestKind::from_name("odd"), Some(TestKind::Odd));
        assert_eq!(TestKind::from_name("callable"), None);
    }

    #[test]
    fn test_outer_filter() {
        let expr = Expr::new(
            ExprKind::Filter {
                target: Box::new(var("x")),
                name: "safe".to_string(),
                args: vec![],
            },
            Span::default(),
        );
        assert_eq!(expr.outer_filter(), Some("safe"));
        assert_eq!(var("x").outer_filter(), None);
    }
}
