use crate::lexer::{Identifier, IdentifierTable};

/// Indices into the flat arenas of [`Unit`]. The semantic model is fully
/// resolved: every name reference was replaced by one of these ids by the
/// parser, and the arenas are immutable once parsing finished. All derived
/// facts live outside the model, keyed by these ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Int,
    Bool,
    Str,
    Void,
    /// The type of the `null` literal, compatible with every reference type.
    Null,
    List(Box<Type>),
    Class(ClassId),
}

impl Type {
    /// Value types carry no object identity; they cannot be aliased,
    /// modified in place, or null.
    pub fn is_value_type(&self) -> bool {
        matches!(self, Type::Int | Type::Bool | Type::Str | Type::Void)
    }

    pub fn is_nullable(&self) -> bool {
        !self.is_value_type()
    }

    /// Structural compatibility for assignments, arguments, and equality
    /// comparisons. `null` unifies with any reference type; an empty list
    /// literal unifies with any list type.
    pub fn is_compatible_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Null, other) => other.is_nullable(),
            (this, Type::Null) => this.is_nullable(),
            (Type::List(a), Type::List(b)) => {
                **a == Type::Null || **b == Type::Null || a.is_compatible_with(b)
            }
            (a, b) => a == b,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(elem) => Some(elem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Identifier,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Identifier,
    pub ty: Type,
    pub owner: ClassId,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: Identifier,
    pub owner: ClassId,
    pub params: Vec<ParamId>,
    pub ret: Type,
    pub body: Block,
    pub is_constructor: bool,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Identifier,
    pub ty: Type,
    pub method: MethodId,
    pub index: usize,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: Identifier,
    pub ty: Type,
    pub method: MethodId,
    pub line: u32,
}

/// A statement list; blocks nest through the statements that own them.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local { local: LocalId, init: Option<ExprId> },
    Expr { expr: ExprId },
    If {
        cond: ExprId,
        then_block: Block,
        else_block: Option<Block>,
    },
    While { cond: ExprId, body: Block },
    ForEach {
        local: LocalId,
        iterable: ExprId,
        body: Block,
    },
    Return { value: Option<ExprId> },
    Throw { value: ExprId },
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct StmtNode {
    pub stmt: Stmt,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Intrinsic operations of the built-in `list` and `str` types. Their
/// behavioral contracts come from a fact table instead of analysed bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Builtin {
    ListAdd,
    ListGet,
    ListSize,
    ListIsEmpty,
    ListContains,
    StrLength,
    StrConcat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Callee {
    Method(MethodId),
    Builtin(Builtin),
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64),
    BoolLit(bool),
    StrLit(String),
    NullLit,
    ListLit(Vec<ExprId>),
    This,
    Local(LocalId),
    Param(ParamId),
    FieldGet { receiver: ExprId, field: FieldId },
    Call {
        receiver: Option<ExprId>,
        callee: Callee,
        args: Vec<ExprId>,
    },
    New {
        class: ClassId,
        ctor: MethodId,
        args: Vec<ExprId>,
    },
    Unary { op: UnOp, operand: ExprId },
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId },
    Cond {
        cond: ExprId,
        then_val: ExprId,
        else_val: ExprId,
    },
    Assign { target: ExprId, value: ExprId },
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    pub expr: Expr,
    pub ty: Type,
    pub line: u32,
}

/// The whole program: every class of the compilation, with all declarations
/// and bodies flattened into arenas.
#[derive(Debug, Clone, Default)]
pub struct Unit {
    pub classes: Vec<ClassDecl>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub params: Vec<ParamDecl>,
    pub locals: Vec<LocalDecl>,
    pub stmts: Vec<StmtNode>,
    pub exprs: Vec<ExprNode>,
    pub identifiers: IdentifierTable,
}

impl Unit {
    pub fn class(&self, id: ClassId) -> &ClassDecl {
        &self.classes[id.0]
    }

    pub fn field(&self, id: FieldId) -> &FieldDecl {
        &self.fields[id.0]
    }

    pub fn method(&self, id: MethodId) -> &MethodDecl {
        &self.methods[id.0]
    }

    pub fn param(&self, id: ParamId) -> &ParamDecl {
        &self.params[id.0]
    }

    pub fn local(&self, id: LocalId) -> &LocalDecl {
        &self.locals[id.0]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0]
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0]
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        self.identifiers.get_name(self.class(id).name)
    }

    pub fn field_name(&self, id: FieldId) -> &str {
        self.identifiers.get_name(self.field(id).name)
    }

    pub fn param_name(&self, id: ParamId) -> &str {
        self.identifiers.get_name(self.param(id).name)
    }

    pub fn local_name(&self, id: LocalId) -> &str {
        self.identifiers.get_name(self.local(id).name)
    }

    /// `Class.method` for diagnostics and summaries.
    pub fn method_name(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!(
            "{}.{}",
            self.class_name(method.owner),
            self.identifiers.get_name(method.name)
        )
    }

    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Int => "int".to_owned(),
            Type::Bool => "bool".to_owned(),
            Type::Str => "str".to_owned(),
            Type::Void => "void".to_owned(),
            Type::Null => "null".to_owned(),
            Type::List(elem) => format!("list<{}>", self.type_name(elem)),
            Type::Class(id) => self.class_name(*id).to_owned(),
        }
    }

    pub fn class_iter(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len()).map(ClassId)
    }

    pub fn method_iter(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId)
    }

    pub fn field_iter(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len()).map(FieldId)
    }

    pub fn param_iter(&self) -> impl Iterator<Item = ParamId> {
        (0..self.params.len()).map(ParamId)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.class_iter()
            .find(|&id| self.class_name(id) == name)
    }

    pub fn find_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        self.class(class)
            .methods
            .iter()
            .copied()
            .find(|&m| self.identifiers.get_name(self.method(m).name) == name)
    }

    pub fn find_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        self.class(class)
            .fields
            .iter()
            .copied()
            .find(|&f| self.field_name(f) == name)
    }

    pub fn constructors(&self, class: ClassId) -> impl Iterator<Item = MethodId> + '_ {
        self.class(class)
            .methods
            .iter()
            .copied()
            .filter(|&m| self.method(m).is_constructor)
    }

    /// Textual dump of the resolved model, one line per declaration and
    /// statement. Used by the driver's `--dump-model` and by parser tests.
    pub fn print(&self) -> String {
        let mut out = String::new();
        for class_id in self.class_iter() {
            let class = self.class(class_id);
            out.push_str(&format!("class {} {{\n", self.class_name(class_id)));
            for &field in &class.fields {
                out.push_str(&format!(
                    "  {} {};\n",
                    self.type_name(&self.field(field).ty),
                    self.field_name(field)
                ));
            }
            for &method_id in &class.methods {
                let method = self.method(method_id);
                let params = method
                    .params
                    .iter()
                    .map(|&p| {
                        format!(
                            "{} {}",
                            self.type_name(&self.param(p).ty),
                            self.param_name(p)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                if method.is_constructor {
                    out.push_str(&format!("  constructor({params}) {{\n"));
                } else {
                    out.push_str(&format!(
                        "  {} {}({params}) {{\n",
                        self.type_name(&method.ret),
                        self.identifiers.get_name(method.name)
                    ));
                }
                self.print_block(&method.body, 2, &mut out);
                out.push_str("  }\n");
            }
            out.push_str("}\n");
        }
        out
    }

    fn print_block(&self, block: &Block, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        for &stmt_id in &block.stmts {
            match &self.stmt(stmt_id).stmt {
                Stmt::Local { local, init } => {
                    let decl = self.local(*local);
                    match init {
                        Some(init) => out.push_str(&format!(
                            "{pad}{} {} = {};\n",
                            self.type_name(&decl.ty),
                            self.local_name(*local),
                            self.print_expr(*init)
                        )),
                        None => out.push_str(&format!(
                            "{pad}{} {};\n",
                            self.type_name(&decl.ty),
                            self.local_name(*local)
                        )),
                    }
                }
                Stmt::Expr { expr } => {
                    out.push_str(&format!("{pad}{};\n", self.print_expr(*expr)));
                }
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    out.push_str(&format!("{pad}if ({}) {{\n", self.print_expr(*cond)));
                    self.print_block(then_block, depth + 1, out);
                    if let Some(else_block) = else_block {
                        out.push_str(&format!("{pad}}} else {{\n"));
                        self.print_block(else_block, depth + 1, out);
                    }
                    out.push_str(&format!("{pad}}}\n"));
                }
                Stmt::While { cond, body } => {
                    out.push_str(&format!("{pad}while ({}) {{\n", self.print_expr(*cond)));
                    self.print_block(body, depth + 1, out);
                    out.push_str(&format!("{pad}}}\n"));
                }
                Stmt::ForEach {
                    local,
                    iterable,
                    body,
                } => {
                    out.push_str(&format!(
                        "{pad}for ({} {} : {}) {{\n",
                        self.type_name(&self.local(*local).ty),
                        self.local_name(*local),
                        self.print_expr(*iterable)
                    ));
                    self.print_block(body, depth + 1, out);
                    out.push_str(&format!("{pad}}}\n"));
                }
                Stmt::Return { value } => match value {
                    Some(value) => {
                        out.push_str(&format!("{pad}return {};\n", self.print_expr(*value)));
                    }
                    None => out.push_str(&format!("{pad}return;\n")),
                },
                Stmt::Throw { value } => {
                    out.push_str(&format!("{pad}throw {};\n", self.print_expr(*value)));
                }
                Stmt::Break => out.push_str(&format!("{pad}break;\n")),
                Stmt::Continue => out.push_str(&format!("{pad}continue;\n")),
            }
        }
    }

    pub fn print_expr(&self, id: ExprId) -> String {
        match &self.expr(id).expr {
            Expr::IntLit(value) => value.to_string(),
            Expr::BoolLit(value) => value.to_string(),
            Expr::StrLit(value) => format!("{value:?}"),
            Expr::NullLit => "null".to_owned(),
            Expr::ListLit(elems) => {
                let elems = elems
                    .iter()
                    .map(|&e| self.print_expr(e))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{elems}]")
            }
            Expr::This => "this".to_owned(),
            Expr::Local(local) => self.local_name(*local).to_owned(),
            Expr::Param(param) => self.param_name(*param).to_owned(),
            Expr::FieldGet { receiver, field } => {
                format!("{}.{}", self.print_expr(*receiver), self.field_name(*field))
            }
            Expr::Call {
                receiver,
                callee,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|&a| self.print_expr(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                let name = match callee {
                    Callee::Method(m) => self.identifiers.get_name(self.method(*m).name).to_owned(),
                    Callee::Builtin(b) => b.name().to_owned(),
                };
                match receiver {
                    Some(receiver) => format!("{}.{name}({args})", self.print_expr(*receiver)),
                    None => format!("{name}({args})"),
                }
            }
            Expr::New { class, args, .. } => {
                let args = args
                    .iter()
                    .map(|&a| self.print_expr(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("new {}({args})", self.class_name(*class))
            }
            Expr::Unary { op, operand } => {
                let op = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                };
                format!("{op}{}", self.print_expr(*operand))
            }
            Expr::Binary { op, lhs, rhs } => {
                format!(
                    "{} {} {}",
                    self.print_expr(*lhs),
                    bin_op_symbol(*op),
                    self.print_expr(*rhs)
                )
            }
            Expr::Cond {
                cond,
                then_val,
                else_val,
            } => format!(
                "{} ? {} : {}",
                self.print_expr(*cond),
                self.print_expr(*then_val),
                self.print_expr(*else_val)
            ),
            Expr::Assign { target, value } => {
                format!("{} = {}", self.print_expr(*target), self.print_expr(*value))
            }
        }
    }
}

impl Builtin {
    /// Number of explicit arguments, not counting the receiver.
    pub fn arity(&self) -> usize {
        match self {
            Builtin::ListAdd | Builtin::ListGet | Builtin::ListContains | Builtin::StrConcat => 1,
            Builtin::ListSize | Builtin::ListIsEmpty | Builtin::StrLength => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::ListAdd => "add",
            Builtin::ListGet => "get",
            Builtin::ListSize => "size",
            Builtin::ListIsEmpty => "isEmpty",
            Builtin::ListContains => "contains",
            Builtin::StrLength => "length",
            Builtin::StrConcat => "concat",
        }
    }
}

pub fn bin_op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}
