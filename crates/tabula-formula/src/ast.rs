//! Expression Abstract Syntax Tree types

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    Text(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Reference slot, bound per row by index into the formula's references
    Slot(usize),

    // === Operators ===
    /// Binary operation
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },

    // === Function call ===
    /// Call to a whitelisted function (name stored uppercase)
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Slot indices used by this expression, in visiting order
    pub fn slots(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_slots(&mut out);
        out
    }

    fn collect_slots(&self, out: &mut Vec<usize>) {
        match self {
            Expr::Slot(index) => out.push(*index),
            Expr::Binary { left, right, .. } => {
                left.collect_slots(out);
                right.collect_slots(out);
            }
            Expr::Unary { operand, .. } => operand.collect_slots(out),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_slots(out)),
            Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) => {}
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Boolean
    And,
    Or,
}

impl BinaryOperator {
    /// Whether the operator compares its operands
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqual
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}
