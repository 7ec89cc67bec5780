//! The abstract syntax tree produced by the parser. Every statement and
//! expression node carries the source location it was parsed from.

use crate::error::Location;

#[derive(Debug, Clone)]
pub enum TypeRef {
    Void,
    Named(String),
    Unsigned(String),
    StructRef(String),
    EnumRef(String),
}

#[derive(Debug)]
pub struct Block(pub Vec<Stmt>);

#[derive(Debug)]
pub struct Stmt {
    pub loc: Location,
    pub kind: StmtKind,
}

#[derive(Debug)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug)]
pub struct SwitchCase {
    /// `None` marks the `default:` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub enum ForInit {
    Local(LocalVarDefn),
    Expr(Expr),
}

#[derive(Debug)]
pub struct VarTail {
    pub name: String,
    pub args: Vec<Expr>,
    pub array_len: Option<Expr>,
}

#[derive(Debug)]
pub enum StructDefnForm {
    /// `typedef struct ... NAME;` — registers a type alias, binds nothing.
    TypedefAlias(String),
    /// `struct ... { } NAME(args)[len]?;` or a bare declaration with no
    /// instance at all.
    Instance(Option<VarTail>),
}

#[derive(Debug)]
pub struct StructDefn {
    pub struct_name: Option<String>,
    pub params: Vec<(String, TypeRef)>,
    pub body: std::rc::Rc<Block>,
    pub form: StructDefnForm,
}

#[derive(Debug)]
pub enum EnumDefnForm {
    TypedefAlias(String),
    Instance(Option<String>),
}

#[derive(Debug)]
pub struct EnumDefnStmt {
    pub enum_name: Option<String>,
    pub underlying: Option<TypeRef>,
    pub members: Vec<(String, Option<Expr>)>,
    pub form: EnumDefnForm,
}

#[derive(Debug)]
pub struct FuncDefn {
    pub ret_type: TypeRef,
    pub name: String,
    pub params: Vec<(String, TypeRef)>,
    pub body: std::rc::Rc<Block>,
}

#[derive(Debug)]
pub struct VarDefn {
    pub type_ref: TypeRef,
    pub name: String,
    pub args: Vec<Expr>,
    pub array_len: Option<Expr>,
}

#[derive(Debug)]
pub struct LocalVarDefn {
    pub type_ref: TypeRef,
    pub name: String,
    pub args: Vec<Expr>,
    pub array_len: Option<Expr>,
    pub init: Option<Expr>,
}

#[derive(Debug)]
pub enum StmtKind {
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_ifs: Vec<ElseIf>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
    },
    StructDefn(StructDefn),
    EnumDefn(EnumDefnStmt),
    TypedefStmt {
        type_ref: TypeRef,
        name: String,
    },
    FuncDefn(std::rc::Rc<FuncDefn>),
    LocalVarDefn(LocalVarDefn),
    VarDefn(VarDefn),
    Return(Option<Expr>),
    Break,
    Continue,
    ExprStmt(Expr),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum PathSeg {
    Member(String),
    Index(Expr),
}

#[derive(Debug, Clone)]
pub struct Path {
    pub head: String,
    pub segs: Vec<PathSeg>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub loc: Location,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(i64),
    Str(String),
    Path(Path),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Cast {
        type_ref: TypeRef,
        expr: Box<Expr>,
    },
}
