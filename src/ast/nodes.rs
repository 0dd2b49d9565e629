//! Pseudo-source syntax tree

use std::fmt;

/// A named storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// Argument or local slot
    Local(u16),
    /// Function-local static
    Static(u16),
    /// Image-wide static; numbered from 1
    GlobalStatic(u16),
    ClassVar(u16),
}

impl VarRef {
    /// Map a raw static operand; negative values name global statics
    pub fn from_static(raw: i16) -> Self {
        if raw < 0 {
            VarRef::GlobalStatic(raw.unsigned_abs())
        } else {
            VarRef::Static(raw as u16)
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRef::Local(n) => write!(f, "var{:04}", n),
            VarRef::Static(n) => write!(f, "svar{:04}", n),
            VarRef::GlobalStatic(n) => write!(f, "gvar{:04}", n),
            VarRef::ClassVar(n) => write!(f, "cvar{:04}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    /// Array append
    Append,
    /// U8 string concatenation
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Append => "&",
            BinaryOp::Concat => "+",
        }
    }

    /// Binding strength; higher binds tighter
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::In => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::Append => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
        }
    }

    /// Comparison with the opposite truth value
    fn inverse(self) -> Option<Self> {
        Some(match self {
            BinaryOp::Eq => BinaryOp::Ne,
            BinaryOp::Ne => BinaryOp::Eq,
            BinaryOp::Lt => BinaryOp::Ge,
            BinaryOp::Ge => BinaryOp::Lt,
            BinaryOp::Gt => BinaryOp::Le,
            BinaryOp::Le => BinaryOp::Gt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i32),
    Bool(bool),
    Str(String),
    Var(VarRef),
    Array(Vec<Expr>),
    Index {
        base: VarRef,
        index: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Global flag with a static index, already rendered as `NAME` or `0x....`
    Flag(String),
    /// Global flag addressed by a computed index
    FlagAt(Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `item->Func(args)`
    MemberCall {
        object: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// Call through a function id held in a value
    IndirectCall {
        object: Box<Expr>,
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        class: String,
        args: Vec<Expr>,
    },
    Item,
    Event,
    UserChoice,
    /// U8 process id
    Pid,
    /// Value left by the previous call
    ReturnValue,
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical negation, folding double negation and inverting comparisons
    pub fn negate(self) -> Self {
        match self {
            Expr::Not(inner) => *inner,
            Expr::Bool(b) => Expr::Bool(!b),
            Expr::Binary { op, left, right } => match op.inverse() {
                Some(inv) => Expr::Binary {
                    op: inv,
                    left,
                    right,
                },
                None => Expr::Not(Box::new(Expr::Binary { op, left, right })),
            },
            other => Expr::Not(Box::new(other)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Not(_) => 8,
            _ => 9,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Quote text the way the compiler reads string literals
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Str(s) => f.write_str(&quote(s)),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Expr::Index { base, index } => write!(f, "{}[{}]", base, index),
            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                left.fmt_operand(f, p)?;
                write!(f, " {} ", op.symbol())?;
                // Left-associative: an equal-precedence right operand needs parentheses
                right.fmt_operand(f, p + 1)
            }
            Expr::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f, 8)
            }
            Expr::Flag(name) => write!(f, "gflags[{}]", name),
            Expr::FlagAt(index) => write!(f, "gflags[{}]", index),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::MemberCall { object, name, args } => {
                object.fmt_operand(f, 9)?;
                write!(f, "->{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::IndirectCall {
                object,
                function,
                args,
            } => {
                object.fmt_operand(f, 9)?;
                write!(f, "->({})(", function)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::New { class, args } => {
                write!(f, "new {}(", class)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Item => f.write_str("item"),
            Expr::Event => f.write_str("event"),
            Expr::UserChoice => f.write_str("user_choice"),
            Expr::Pid => f.write_str("pid"),
            Expr::ReturnValue => f.write_str("retval"),
        }
    }
}

/// Assignment target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Var(VarRef),
    Element { base: VarRef, index: Expr },
    Flag(String),
    FlagAt(Expr),
    Event,
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var(v) => write!(f, "{}", v),
            Place::Element { base, index } => write!(f, "{}[{}]", base, index),
            Place::Flag(name) => write!(f, "gflags[{}]", name),
            Place::FlagAt(index) => write!(f, "gflags[{}]", index),
            Place::Event => f.write_str("event"),
        }
    }
}

/// Header of a `for (x in array)` loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachHeader {
    pub element: VarRef,
    pub array: VarRef,
    pub counter: VarRef,
    pub total: VarRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign { place: Place, value: Expr },
    Expr(Expr),
    Message(Expr),
    Say,
    Return(Option<Expr>),
    Abort,
    Throw(Expr),
    Delete(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    /// `while (true)`
    Loop(Vec<Stmt>),
    ForEach { header: ForEachHeader, body: Vec<Stmt> },
    Converse(Vec<Stmt>),
    Break,
    Continue,
    Comment(String),
}

impl Stmt {
    /// True when control never continues past this statement
    pub fn is_abrupt(&self) -> bool {
        matches!(
            self,
            Stmt::Return(_) | Stmt::Abort | Stmt::Throw(_) | Stmt::Break | Stmt::Continue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(n: u16) -> Expr {
        Expr::Var(VarRef::Local(n))
    }

    #[test]
    fn precedence_adds_parentheses_only_where_needed() {
        let sum = Expr::binary(BinaryOp::Add, var(0), var(1));
        let product = Expr::binary(BinaryOp::Mul, sum.clone(), Expr::Int(2));
        assert_eq!(product.to_string(), "(var0000 + var0001) * 2");
        let nested = Expr::binary(BinaryOp::Sub, var(0), sum);
        assert_eq!(nested.to_string(), "var0000 - (var0000 + var0001)");
        let cmp = Expr::binary(BinaryOp::Lt, Expr::binary(BinaryOp::Add, var(0), var(1)), Expr::Int(3));
        assert_eq!(cmp.to_string(), "var0000 + var0001 < 3");
    }

    #[test]
    fn negation_inverts_comparisons() {
        let cmp = Expr::binary(BinaryOp::Lt, var(0), Expr::Int(3));
        assert_eq!(cmp.negate().to_string(), "var0000 >= 3");
        assert_eq!(var(0).negate().negate(), var(0));
        let both = Expr::binary(BinaryOp::And, var(0), var(1));
        assert_eq!(both.negate().to_string(), "!(var0000 && var0001)");
    }

    #[test]
    fn statics_split_on_sign() {
        assert_eq!(VarRef::from_static(-2).to_string(), "gvar0002");
        assert_eq!(VarRef::from_static(5).to_string(), "svar0005");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(Expr::Str("say \"hi\"".into()).to_string(), r#""say \"hi\"""#);
    }

    #[test]
    fn member_calls() {
        let call = Expr::MemberCall {
            object: Box::new(Expr::Item),
            name: "Func0401".into(),
            args: vec![Expr::Int(1)],
        };
        assert_eq!(call.to_string(), "item->Func0401(1)");
    }
}
