//! Abstract Syntax Tree node types

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Source location span for error reporting and statement attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed, in characters)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed, in characters)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let (start, start_line, start_col) = if self.start <= other.start {
            (self.start, self.start_line, self.start_col)
        } else {
            (other.start, other.start_line, other.start_col)
        };
        let (end, end_line, end_col) = if self.end >= other.end {
            (self.end, self.end_line, self.end_col)
        } else {
            (other.end, other.end_line, other.end_col)
        };
        Span::new(start, end, start_line, start_col, end_line, end_col)
    }
}

/// A parsed fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Let,
    Const,
    Var,
}

impl VarKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, VarKind::Const)
    }
}

/// For loop kind (in vs of)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForLoopKind {
    /// for (const k in obj) - iterates over keys
    In,
    /// for (const v of arr) - iterates over values
    Of,
}

/// Binding target of a declaration, parameter or catch clause
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Pattern {
    Ident {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Object {
        props: Vec<PatternProp>,
        rest: Option<Box<Pattern>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Array {
        elements: Vec<PatternElem>,
        rest: Option<Box<Pattern>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternProp {
    pub key: String,
    pub value: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternElem {
    pub target: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FunctionBody {
    Block { body: Vec<Stmt> },
    Expr { expr: Box<Expr> },
}

/// Shared by declarations, expressions, arrows and object methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub is_async: bool,
    /// Arrows do not bind `this`
    pub is_arrow: bool,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Empty {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Block {
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Declare {
        var_kind: VarKind,
        declarators: Vec<Declarator>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Function {
        def: Arc<FunctionDef>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    If {
        test: Expr,
        then_s: Box<Stmt>,
        else_s: Option<Box<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    ForLoop {
        kind: ForLoopKind,
        var_kind: VarKind,
        binding: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Return {
        value: Option<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Throw {
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Try {
        body: Vec<Stmt>,
        catch_param: Option<Pattern>,
        catch_body: Option<Vec<Stmt>>,
        finally_body: Option<Vec<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Expr {
        expr: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Break {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Continue {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `import ... from '...'`; every name is already bound, so this is a no-op
    Import {
        source: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `interface` / `type` declarations; no runtime effect
    TypeDecl {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Empty { span }
            | Stmt::Block { span, .. }
            | Stmt::Declare { span, .. }
            | Stmt::Function { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::ForLoop { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Import { span, .. }
            | Stmt::TypeDecl { span } => *span,
        }
    }
}

/// Binary operator for short-circuit evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
}

/// Eagerly evaluated binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Nullish,
    Or,
    And,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum PropKey {
    Static { name: String },
    Computed { expr: Box<Expr> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Property {
    KeyValue { key: PropKey, value: Expr },
    Spread { expr: Expr },
}

/// Expression AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    LitUndefined {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitNull {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitBool {
        v: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitNum {
        v: f64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitStr {
        v: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Template {
        /// Always one more quasi than expressions
        quasis: Vec<String>,
        exprs: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Regex {
        pattern: String,
        flags: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitList {
        elements: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitObj {
        properties: Vec<Property>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Only valid inside list literals and call arguments
    Spread {
        inner: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Ident {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    This {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Function {
        def: Arc<FunctionDef>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        property_span: Span,
        optional: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasis: Vec<String>,
        exprs: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Await {
        inner: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::LitUndefined { span }
            | Expr::LitNull { span }
            | Expr::LitBool { span, .. }
            | Expr::LitNum { span, .. }
            | Expr::LitStr { span, .. }
            | Expr::Template { span, .. }
            | Expr::Regex { span, .. }
            | Expr::LitList { span, .. }
            | Expr::LitObj { span, .. }
            | Expr::Spread { span, .. }
            | Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Function { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::TaggedTemplate { span, .. }
            | Expr::Await { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Update { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Assign { span, .. } => *span,
        }
    }

    /// Whether the expression can appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Ident { .. } | Expr::Member { optional: false, .. } | Expr::Index { optional: false, .. }
        )
    }
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}
