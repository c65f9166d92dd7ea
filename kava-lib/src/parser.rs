use std::collections::HashMap;

use utils::DiagnosticEmitter;

use crate::{
    lexer::{Identifier, LexResult, Token, TokenValue},
    sema::*,
};

/// Recursive descent parser producing the resolved semantic model. Parsing
/// happens in three passes over the token stream so that classes, fields,
/// and methods can reference each other regardless of declaration order:
/// first class names are registered, then member signatures, then bodies.
pub struct Parser<'src> {
    current_tok: usize,
    tokens: Vec<Token>,
    unit: Unit,
    current_class: ClassId,
    current_method: MethodId,
    scopes: Vec<HashMap<Identifier, VarSymbol>>,
    diag: &'src mut DiagnosticEmitter,
}

#[derive(Debug, Clone, Copy)]
enum VarSymbol {
    Local(LocalId),
    Param(ParamId),
}

use TokenValue::*;

impl<'src> Parser<'src> {
    pub fn new(lexed: LexResult, diag: &'src mut DiagnosticEmitter) -> Self {
        let LexResult {
            tokens,
            identifiers,
        } = lexed;

        Parser {
            current_tok: 0,
            tokens,
            unit: Unit {
                identifiers,
                ..Unit::default()
            },
            current_class: ClassId(0),
            current_method: MethodId(0),
            scopes: Vec::new(),
            diag,
        }
    }

    pub fn parse(mut self) -> Option<Unit> {
        self.register_classes()?;
        self.current_tok = 0;
        self.parse_signatures()?;
        self.current_tok = 0;
        self.parse_bodies()?;
        Some(self.unit)
    }

    //
    // Pass 1: class names.
    //

    fn register_classes(&mut self) -> Option<()> {
        while !self.is_at_end() {
            let tok = self.consume(Class, "")?;
            let name = self.consume_identifier()?;
            if self.lookup_class(name).is_some() {
                self.error(
                    tok,
                    &format!(
                        "Class '{}' is declared multiple times.",
                        self.unit.identifiers.get_name(name)
                    ),
                );
                return None;
            }
            let line = tok.line_num.0;
            self.unit.classes.push(ClassDecl {
                name,
                fields: Vec::new(),
                methods: Vec::new(),
                line,
            });
            self.consume(LeftBrace, "")?;
            self.skip_braced_block()?;
        }
        Some(())
    }

    //
    // Pass 2: field and method signatures.
    //

    fn parse_signatures(&mut self) -> Option<()> {
        let mut next_class = 0;
        while !self.is_at_end() {
            self.consume(Class, "")?;
            self.consume_identifier()?;
            self.current_class = ClassId(next_class);
            next_class += 1;
            self.consume(LeftBrace, "")?;
            while !self.check(RightBrace) {
                self.parse_member_signature()?;
            }
            self.consume(RightBrace, "")?;
        }
        Some(())
    }

    fn parse_member_signature(&mut self) -> Option<()> {
        if let Some(tok) = self.try_consume(Constructor) {
            let method_id = MethodId(self.unit.methods.len());
            let class_name = self.unit.class(self.current_class).name;
            self.unit.methods.push(MethodDecl {
                name: class_name,
                owner: self.current_class,
                params: Vec::new(),
                ret: Type::Void,
                body: Block::default(),
                is_constructor: true,
                line: tok.line_num.0,
            });
            self.consume(LeftParen, "")?;
            let params = self.parse_param_signatures(method_id)?;
            self.unit.methods[method_id.0].params = params;
            self.unit.classes[self.current_class.0].methods.push(method_id);
            self.consume(LeftBrace, "")?;
            return self.skip_braced_block();
        }

        let ty = self.parse_type()?;
        let name_tok = self.peek().clone();
        let name = self.consume_identifier()?;

        if self.try_consume(Semicolon).is_some() {
            if ty == Type::Void {
                self.error(name_tok, "Fields cannot have type 'void'.");
                return None;
            }
            if self.unit.find_field(self.current_class, self.unit.identifiers.get_name(name)).is_some() {
                self.error(name_tok, "Field is declared multiple times.");
                return None;
            }
            let field_id = FieldId(self.unit.fields.len());
            self.unit.fields.push(FieldDecl {
                name,
                ty,
                owner: self.current_class,
                line: name_tok.line_num.0,
            });
            self.unit.classes[self.current_class.0].fields.push(field_id);
            return Some(());
        }

        let method_id = MethodId(self.unit.methods.len());
        self.unit.methods.push(MethodDecl {
            name,
            owner: self.current_class,
            params: Vec::new(),
            ret: ty,
            body: Block::default(),
            is_constructor: false,
            line: name_tok.line_num.0,
        });
        self.consume(LeftParen, "")?;
        let params = self.parse_param_signatures(method_id)?;
        self.unit.methods[method_id.0].params = params;
        self.unit.classes[self.current_class.0].methods.push(method_id);
        self.consume(LeftBrace, "")?;
        self.skip_braced_block()
    }

    fn parse_param_signatures(&mut self, method: MethodId) -> Option<Vec<ParamId>> {
        let mut result = Vec::new();
        if !self.check(RightParen) {
            loop {
                let ty = self.parse_type()?;
                let tok = self.peek().clone();
                let name = self.consume_identifier()?;
                let param_id = ParamId(self.unit.params.len());
                self.unit.params.push(ParamDecl {
                    name,
                    ty,
                    method,
                    index: result.len(),
                    line: tok.line_num.0,
                });
                result.push(param_id);
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume(RightParen, "")?;
        Some(result)
    }

    //
    // Pass 3: bodies.
    //

    fn parse_bodies(&mut self) -> Option<()> {
        let mut next_class = 0;
        let mut next_method = 0;
        while !self.is_at_end() {
            self.consume(Class, "")?;
            self.consume_identifier()?;
            self.current_class = ClassId(next_class);
            next_class += 1;
            self.consume(LeftBrace, "")?;
            while !self.check(RightBrace) {
                if self.try_consume(Constructor).is_some() {
                    self.skip_param_list()?;
                    self.parse_method_body(MethodId(next_method))?;
                    next_method += 1;
                    continue;
                }
                self.parse_type()?;
                self.consume_identifier()?;
                if self.try_consume(Semicolon).is_some() {
                    continue;
                }
                self.skip_param_list()?;
                self.parse_method_body(MethodId(next_method))?;
                next_method += 1;
            }
            self.consume(RightBrace, "")?;
        }
        Some(())
    }

    fn parse_method_body(&mut self, method: MethodId) -> Option<()> {
        self.current_method = method;
        self.scopes.clear();
        let mut top = HashMap::new();
        for &param in &self.unit.method(method).params.clone() {
            top.insert(self.unit.param(param).name, VarSymbol::Param(param));
        }
        self.scopes.push(top);

        self.consume(LeftBrace, "")?;
        let body = self.parse_block()?;
        self.unit.methods[method.0].body = body;
        self.scopes.pop();
        Some(())
    }

    /// Opening brace already consumed.
    fn parse_block(&mut self) -> Option<Block> {
        self.scopes.push(HashMap::new());
        let mut stmts = Vec::new();
        while !self.check(RightBrace) {
            stmts.push(self.parse_statement()?);
        }
        self.consume(RightBrace, "")?;
        self.scopes.pop();
        Some(Block { stmts })
    }

    fn parse_statement(&mut self) -> Option<StmtId> {
        if let Some(tok) = self.try_consume(If) {
            self.consume(LeftParen, "")?;
            let cond = self.parse_expression()?;
            self.expect_expr_type(&tok, cond, &Type::Bool)?;
            self.consume(RightParen, "")?;
            self.consume(LeftBrace, "")?;
            let then_block = self.parse_block()?;
            let else_block = if self.try_consume(Else).is_some() {
                self.consume(LeftBrace, "")?;
                Some(self.parse_block()?)
            } else {
                None
            };
            return Some(self.add_stmt(
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                },
                tok.line_num.0,
            ));
        }

        if let Some(tok) = self.try_consume(While) {
            self.consume(LeftParen, "")?;
            let cond = self.parse_expression()?;
            self.expect_expr_type(&tok, cond, &Type::Bool)?;
            self.consume(RightParen, "")?;
            self.consume(LeftBrace, "")?;
            let body = self.parse_block()?;
            return Some(self.add_stmt(Stmt::While { cond, body }, tok.line_num.0));
        }

        if let Some(tok) = self.try_consume(For) {
            self.consume(LeftParen, "")?;
            let elem_ty = self.parse_type()?;
            let name = self.consume_identifier()?;
            self.consume(Colon, "")?;
            let iterable = self.parse_expression()?;
            let iter_ty = self.unit.expr(iterable).ty.clone();
            match iter_ty.element_type() {
                Some(elem) if elem.is_compatible_with(&elem_ty) || *elem == Type::Null => {}
                _ => {
                    self.error(
                        tok,
                        &format!(
                            "Cannot iterate a value of type '{}'.",
                            self.unit.type_name(&iter_ty)
                        ),
                    );
                    return None;
                }
            }
            self.consume(RightParen, "")?;
            let local = self.declare_local(name, elem_ty, tok.line_num.0)?;
            self.consume(LeftBrace, "")?;
            self.scopes
                .push(HashMap::from([(name, VarSymbol::Local(local))]));
            let body = self.parse_block()?;
            self.scopes.pop();
            return Some(self.add_stmt(
                Stmt::ForEach {
                    local,
                    iterable,
                    body,
                },
                tok.line_num.0,
            ));
        }

        if let Some(tok) = self.try_consume(Return) {
            let ret_ty = self.unit.method(self.current_method).ret.clone();
            if self.try_consume(Semicolon).is_some() {
                if ret_ty != Type::Void {
                    self.error(tok, "Non-void methods must return a value.");
                    return None;
                }
                return Some(self.add_stmt(Stmt::Return { value: None }, tok.line_num.0));
            }
            let value = self.parse_expression()?;
            if ret_ty == Type::Void {
                self.error(tok, "Void methods cannot return a value.");
                return None;
            }
            self.expect_expr_type(&tok, value, &ret_ty)?;
            self.consume(Semicolon, "")?;
            return Some(self.add_stmt(Stmt::Return { value: Some(value) }, tok.line_num.0));
        }

        if let Some(tok) = self.try_consume(Throw) {
            let value = self.parse_expression()?;
            self.consume(Semicolon, "")?;
            return Some(self.add_stmt(Stmt::Throw { value }, tok.line_num.0));
        }

        if let Some(tok) = self.try_consume(Break) {
            self.consume(Semicolon, "")?;
            return Some(self.add_stmt(Stmt::Break, tok.line_num.0));
        }

        if let Some(tok) = self.try_consume(Continue) {
            self.consume(Semicolon, "")?;
            return Some(self.add_stmt(Stmt::Continue, tok.line_num.0));
        }

        if self.starts_local_decl() {
            let ty = self.parse_type()?;
            let tok = self.peek().clone();
            let name = self.consume_identifier()?;
            let local = self.declare_local(name, ty.clone(), tok.line_num.0)?;
            let init = if self.try_consume(Define).is_some() {
                let init = self.parse_expression()?;
                self.expect_expr_type(&tok, init, &ty)?;
                Some(init)
            } else {
                None
            };
            self.consume(Semicolon, "")?;
            self.scopes
                .last_mut()?
                .insert(name, VarSymbol::Local(local));
            return Some(self.add_stmt(Stmt::Local { local, init }, tok.line_num.0));
        }

        let tok = self.peek().clone();
        let expr = self.parse_expression()?;
        self.consume(Semicolon, "")?;
        Some(self.add_stmt(Stmt::Expr { expr }, tok.line_num.0))
    }

    /// A statement starts a local declaration when it begins with a builtin
    /// type keyword, or with a class name followed by another identifier.
    fn starts_local_decl(&self) -> bool {
        match &self.peek().value {
            Int | Bool | Str | List => true,
            Id(name) => {
                let is_class = self
                    .lookup_class(*name)
                    .is_some();
                is_class && matches!(self.peek_next().map(|t| &t.value), Some(Id(_)))
            }
            _ => false,
        }
    }

    //
    // Expressions, by descending precedence.
    //

    fn parse_expression(&mut self) -> Option<ExprId> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<ExprId> {
        let target = self.parse_ternary()?;
        if let Some(tok) = self.try_consume(Define) {
            match self.unit.expr(target).expr {
                Expr::Local(_) | Expr::Param(_) | Expr::FieldGet { .. } => {}
                _ => {
                    self.error(tok, "Invalid assignment target.");
                    return None;
                }
            }
            let value = self.parse_assignment()?;
            let target_ty = self.unit.expr(target).ty.clone();
            self.expect_expr_type(&tok, value, &target_ty)?;
            return Some(self.add_expr(Expr::Assign { target, value }, target_ty, tok.line_num.0));
        }
        Some(target)
    }

    fn parse_ternary(&mut self) -> Option<ExprId> {
        let cond = self.parse_or()?;
        if let Some(tok) = self.try_consume(Question) {
            self.expect_expr_type(&tok, cond, &Type::Bool)?;
            let then_val = self.parse_expression()?;
            self.consume(Colon, "")?;
            let else_val = self.parse_ternary()?;
            let ty = self.unit.expr(then_val).ty.clone();
            self.expect_expr_type(&tok, else_val, &ty)?;
            return Some(self.add_expr(
                Expr::Cond {
                    cond,
                    then_val,
                    else_val,
                },
                ty,
                tok.line_num.0,
            ));
        }
        Some(cond)
    }

    fn parse_or(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_and()?;
        while let Some(tok) = self.try_consume(Or) {
            let rhs = self.parse_and()?;
            self.expect_expr_type(&tok, lhs, &Type::Bool)?;
            self.expect_expr_type(&tok, rhs, &Type::Bool)?;
            lhs = self.add_expr(
                Expr::Binary {
                    op: BinOp::Or,
                    lhs,
                    rhs,
                },
                Type::Bool,
                tok.line_num.0,
            );
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_equality()?;
        while let Some(tok) = self.try_consume(And) {
            let rhs = self.parse_equality()?;
            self.expect_expr_type(&tok, lhs, &Type::Bool)?;
            self.expect_expr_type(&tok, rhs, &Type::Bool)?;
            lhs = self.add_expr(
                Expr::Binary {
                    op: BinOp::And,
                    lhs,
                    rhs,
                },
                Type::Bool,
                tok.line_num.0,
            );
        }
        Some(lhs)
    }

    fn parse_equality(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_comparison()?;
        while let Some(tok) = self.match_tokens(&[Equal, NotEqual]) {
            let op = if tok.value == Equal { BinOp::Eq } else { BinOp::Ne };
            let rhs = self.parse_comparison()?;
            let lhs_ty = self.unit.expr(lhs).ty.clone();
            self.expect_expr_type(&tok, rhs, &lhs_ty)?;
            lhs = self.add_expr(Expr::Binary { op, lhs, rhs }, Type::Bool, tok.line_num.0);
        }
        Some(lhs)
    }

    fn parse_comparison(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_term()?;
        while let Some(tok) =
            self.match_tokens(&[LessThan, LessThanOrEq, GreaterThan, GreaterThanOrEq])
        {
            let op = match tok.value {
                LessThan => BinOp::Lt,
                LessThanOrEq => BinOp::Le,
                GreaterThan => BinOp::Gt,
                _ => BinOp::Ge,
            };
            let rhs = self.parse_term()?;
            self.expect_expr_type(&tok, lhs, &Type::Int)?;
            self.expect_expr_type(&tok, rhs, &Type::Int)?;
            lhs = self.add_expr(Expr::Binary { op, lhs, rhs }, Type::Bool, tok.line_num.0);
        }
        Some(lhs)
    }

    fn parse_term(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_factor()?;
        while let Some(tok) = self.match_tokens(&[Plus, Minus]) {
            let op = if tok.value == Plus { BinOp::Add } else { BinOp::Sub };
            let rhs = self.parse_factor()?;
            self.expect_expr_type(&tok, lhs, &Type::Int)?;
            self.expect_expr_type(&tok, rhs, &Type::Int)?;
            lhs = self.add_expr(Expr::Binary { op, lhs, rhs }, Type::Int, tok.line_num.0);
        }
        Some(lhs)
    }

    fn parse_factor(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_unary()?;
        while let Some(tok) = self.match_tokens(&[Star, Slash, Percent]) {
            let op = match tok.value {
                Star => BinOp::Mul,
                Slash => BinOp::Div,
                _ => BinOp::Mod,
            };
            let rhs = self.parse_unary()?;
            self.expect_expr_type(&tok, lhs, &Type::Int)?;
            self.expect_expr_type(&tok, rhs, &Type::Int)?;
            lhs = self.add_expr(Expr::Binary { op, lhs, rhs }, Type::Int, tok.line_num.0);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<ExprId> {
        if let Some(tok) = self.try_consume(Not) {
            let operand = self.parse_unary()?;
            self.expect_expr_type(&tok, operand, &Type::Bool)?;
            return Some(self.add_expr(
                Expr::Unary {
                    op: UnOp::Not,
                    operand,
                },
                Type::Bool,
                tok.line_num.0,
            ));
        }
        if let Some(tok) = self.try_consume(Minus) {
            let operand = self.parse_unary()?;
            self.expect_expr_type(&tok, operand, &Type::Int)?;
            return Some(self.add_expr(
                Expr::Unary {
                    op: UnOp::Neg,
                    operand,
                },
                Type::Int,
                tok.line_num.0,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<ExprId> {
        let mut expr = self.parse_primary()?;
        while let Some(tok) = self.try_consume(Dot) {
            let name = self.consume_identifier()?;
            if self.try_consume(LeftParen).is_some() {
                expr = self.parse_method_call(&tok, expr, name)?;
            } else {
                expr = self.parse_field_access(&tok, expr, name)?;
            }
        }
        Some(expr)
    }

    fn parse_method_call(
        &mut self,
        tok: &Token,
        receiver: ExprId,
        name: Identifier,
    ) -> Option<ExprId> {
        let args = self.parse_args()?;
        let receiver_ty = self.unit.expr(receiver).ty.clone();
        let name_str = self.unit.identifiers.get_name(name).to_owned();
        match &receiver_ty {
            Type::List(elem) => {
                let elem = elem.as_ref().clone();
                let (builtin, ret) = match name_str.as_str() {
                    "add" => (Builtin::ListAdd, Type::Void),
                    "get" => (Builtin::ListGet, elem),
                    "size" => (Builtin::ListSize, Type::Int),
                    "isEmpty" => (Builtin::ListIsEmpty, Type::Bool),
                    "contains" => (Builtin::ListContains, Type::Bool),
                    _ => {
                        self.error(tok.clone(), &format!("Unknown list method '{name_str}'."));
                        return None;
                    }
                };
                self.check_arity(tok, builtin.arity(), args.len())?;
                Some(self.add_expr(
                    Expr::Call {
                        receiver: Some(receiver),
                        callee: Callee::Builtin(builtin),
                        args,
                    },
                    ret,
                    tok.line_num.0,
                ))
            }
            Type::Str => {
                let (builtin, ret) = match name_str.as_str() {
                    "length" => (Builtin::StrLength, Type::Int),
                    "concat" => (Builtin::StrConcat, Type::Str),
                    _ => {
                        self.error(tok.clone(), &format!("Unknown str method '{name_str}'."));
                        return None;
                    }
                };
                self.check_arity(tok, builtin.arity(), args.len())?;
                Some(self.add_expr(
                    Expr::Call {
                        receiver: Some(receiver),
                        callee: Callee::Builtin(builtin),
                        args,
                    },
                    ret,
                    tok.line_num.0,
                ))
            }
            Type::Class(class) => {
                let Some(method) = self.unit.find_method(*class, &name_str) else {
                    self.error(
                        tok.clone(),
                        &format!(
                            "Class '{}' has no method '{name_str}'.",
                            self.unit.class_name(*class)
                        ),
                    );
                    return None;
                };
                self.check_call_args(tok, method, &args)?;
                let ret = self.unit.method(method).ret.clone();
                Some(self.add_expr(
                    Expr::Call {
                        receiver: Some(receiver),
                        callee: Callee::Method(method),
                        args,
                    },
                    ret,
                    tok.line_num.0,
                ))
            }
            _ => {
                self.error(
                    tok.clone(),
                    &format!(
                        "Cannot call a method on a value of type '{}'.",
                        self.unit.type_name(&receiver_ty)
                    ),
                );
                None
            }
        }
    }

    fn parse_field_access(
        &mut self,
        tok: &Token,
        receiver: ExprId,
        name: Identifier,
    ) -> Option<ExprId> {
        let receiver_ty = self.unit.expr(receiver).ty.clone();
        let Type::Class(class) = receiver_ty else {
            self.error(
                tok.clone(),
                &format!(
                    "Cannot access a field on a value of type '{}'.",
                    self.unit.type_name(&receiver_ty)
                ),
            );
            return None;
        };
        let name_str = self.unit.identifiers.get_name(name).to_owned();
        let Some(field) = self.unit.find_field(class, &name_str) else {
            self.error(
                tok.clone(),
                &format!(
                    "Class '{}' has no field '{name_str}'.",
                    self.unit.class_name(class)
                ),
            );
            return None;
        };
        let ty = self.unit.field(field).ty.clone();
        Some(self.add_expr(Expr::FieldGet { receiver, field }, ty, tok.line_num.0))
    }

    fn parse_primary(&mut self) -> Option<ExprId> {
        if let Some(tok) = self.try_consume(True) {
            return Some(self.add_expr(Expr::BoolLit(true), Type::Bool, tok.line_num.0));
        }
        if let Some(tok) = self.try_consume(False) {
            return Some(self.add_expr(Expr::BoolLit(false), Type::Bool, tok.line_num.0));
        }
        if let Some(tok) = self.try_consume(Null) {
            return Some(self.add_expr(Expr::NullLit, Type::Null, tok.line_num.0));
        }
        if let Some(tok) = self.try_consume(This) {
            let ty = Type::Class(self.current_class);
            return Some(self.add_expr(Expr::This, ty, tok.line_num.0));
        }
        if let Integer(value) = self.peek().value {
            let tok = self.advance();
            return Some(self.add_expr(Expr::IntLit(value), Type::Int, tok.line_num.0));
        }
        if let StrLiteral(value) = self.peek().value.clone() {
            let tok = self.advance();
            return Some(self.add_expr(Expr::StrLit(value), Type::Str, tok.line_num.0));
        }

        // List literals.
        if let Some(tok) = self.try_consume(LeftBracket) {
            let mut elems = Vec::new();
            if !self.check(RightBracket) {
                loop {
                    elems.push(self.parse_expression()?);
                    if self.try_consume(Comma).is_none() {
                        break;
                    }
                }
            }
            self.consume(RightBracket, "")?;
            let elem_ty = match elems.first() {
                Some(&first) => self.unit.expr(first).ty.clone(),
                None => Type::Null,
            };
            for &elem in elems.iter().skip(1) {
                self.expect_expr_type(&tok, elem, &elem_ty)?;
            }
            return Some(self.add_expr(
                Expr::ListLit(elems),
                Type::List(Box::new(elem_ty)),
                tok.line_num.0,
            ));
        }

        if let Some(tok) = self.try_consume(New) {
            let name = self.consume_identifier()?;
            let Some(class) = self.lookup_class(name) else {
                self.error(
                    tok,
                    &format!(
                        "Unknown class '{}'.",
                        self.unit.identifiers.get_name(name)
                    ),
                );
                return None;
            };
            self.consume(LeftParen, "")?;
            let args = self.parse_args()?;
            let Some(ctor) = self
                .unit
                .constructors(class)
                .find(|&c| self.unit.method(c).params.len() == args.len())
            else {
                self.error(
                    tok,
                    &format!(
                        "Class '{}' has no constructor taking {} arguments.",
                        self.unit.class_name(class),
                        args.len()
                    ),
                );
                return None;
            };
            self.check_call_args(&tok, ctor, &args)?;
            return Some(self.add_expr(
                Expr::New { class, ctor, args },
                Type::Class(class),
                tok.line_num.0,
            ));
        }

        if self.try_consume(LeftParen).is_some() {
            let expr = self.parse_expression()?;
            self.consume(RightParen, "")?;
            return Some(expr);
        }

        if let Id(name) = self.peek().value {
            let tok = self.advance();
            // A call without explicit receiver targets the current class.
            if self.try_consume(LeftParen).is_some() {
                let this_ty = Type::Class(self.current_class);
                let line = tok.line_num.0;
                let receiver = self.add_expr(Expr::This, this_ty, line);
                return self.parse_method_call(&tok, receiver, name);
            }
            match self.lookup_variable(name) {
                Some(VarSymbol::Local(local)) => {
                    let ty = self.unit.local(local).ty.clone();
                    return Some(self.add_expr(Expr::Local(local), ty, tok.line_num.0));
                }
                Some(VarSymbol::Param(param)) => {
                    let ty = self.unit.param(param).ty.clone();
                    return Some(self.add_expr(Expr::Param(param), ty, tok.line_num.0));
                }
                None => {
                    self.error(
                        tok.clone(),
                        &format!(
                            "Undefined variable '{}'.",
                            self.unit.identifiers.get_name(name)
                        ),
                    );
                    return None;
                }
            }
        }

        self.error(self.peek().clone(), "Expression expected.");
        None
    }

    fn parse_args(&mut self) -> Option<Vec<ExprId>> {
        let mut args = Vec::new();
        if !self.check(RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume(RightParen, "")?;
        Some(args)
    }

    fn parse_type(&mut self) -> Option<Type> {
        if self.try_consume(Int).is_some() {
            return Some(Type::Int);
        }
        if self.try_consume(Bool).is_some() {
            return Some(Type::Bool);
        }
        if self.try_consume(Str).is_some() {
            return Some(Type::Str);
        }
        if self.try_consume(Void).is_some() {
            return Some(Type::Void);
        }
        if self.try_consume(List).is_some() {
            self.consume(LessThan, "'<' expected after 'list'.")?;
            let elem = self.parse_type()?;
            self.consume(GreaterThan, "'>' expected after list element type.")?;
            return Some(Type::List(Box::new(elem)));
        }
        if let Id(name) = self.peek().value {
            let tok = self.advance();
            let Some(class) = self.lookup_class(name) else {
                self.error(
                    tok,
                    &format!(
                        "Unknown type '{}'.",
                        self.unit.identifiers.get_name(name)
                    ),
                );
                return None;
            };
            return Some(Type::Class(class));
        }
        self.error(self.peek().clone(), "Type expected.");
        None
    }

    //
    // Shared helpers.
    //

    fn add_stmt(&mut self, stmt: Stmt, line: u32) -> StmtId {
        self.unit.stmts.push(StmtNode { stmt, line });
        StmtId(self.unit.stmts.len() - 1)
    }

    fn add_expr(&mut self, expr: Expr, ty: Type, line: u32) -> ExprId {
        self.unit.exprs.push(ExprNode { expr, ty, line });
        ExprId(self.unit.exprs.len() - 1)
    }

    fn declare_local(&mut self, name: Identifier, ty: Type, line: u32) -> Option<LocalId> {
        if self.lookup_variable(name).is_some() {
            let tok = self.previous();
            self.error(
                tok,
                &format!(
                    "Variable '{}' shadows an existing variable.",
                    self.unit.identifiers.get_name(name)
                ),
            );
            return None;
        }
        let local = LocalId(self.unit.locals.len());
        self.unit.locals.push(LocalDecl {
            name,
            ty,
            method: self.current_method,
            line,
        });
        Some(local)
    }

    fn lookup_variable(&self, name: Identifier) -> Option<VarSymbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    fn lookup_class(&self, name: Identifier) -> Option<ClassId> {
        self.unit
            .class_iter()
            .find(|&id| self.unit.class(id).name == name)
    }

    fn check_arity(&mut self, tok: &Token, expected: usize, found: usize) -> Option<()> {
        if expected == found {
            return Some(());
        }
        self.error(
            tok.clone(),
            &format!("{expected} arguments expected, got {found}."),
        );
        None
    }

    fn check_call_args(&mut self, tok: &Token, method: MethodId, args: &[ExprId]) -> Option<()> {
        let params = self.unit.method(method).params.clone();
        self.check_arity(tok, params.len(), args.len())?;
        for (&param, &arg) in params.iter().zip(args.iter()) {
            let param_ty = self.unit.param(param).ty.clone();
            self.expect_expr_type(tok, arg, &param_ty)?;
        }
        Some(())
    }

    fn expect_expr_type(&mut self, tok: &Token, expr: ExprId, expected: &Type) -> Option<()> {
        let found = &self.unit.expr(expr).ty;
        if found.is_compatible_with(expected) {
            return Some(());
        }
        let msg = format!(
            "'{}' type expected; '{}' found.",
            self.unit.type_name(expected),
            self.unit.type_name(found)
        );
        self.error(tok.clone(), &msg);
        None
    }

    /// Skips tokens up to and including the brace matching an already
    /// consumed opening brace.
    fn skip_braced_block(&mut self) -> Option<()> {
        let mut depth = 1;
        while depth > 0 {
            if self.is_at_end() {
                self.error(self.peek().clone(), "'}' expected.");
                return None;
            }
            match self.advance().value {
                LeftBrace => depth += 1,
                RightBrace => depth -= 1,
                _ => {}
            }
        }
        Some(())
    }

    fn skip_param_list(&mut self) -> Option<()> {
        self.consume(LeftParen, "")?;
        while !self.check(RightParen) {
            if self.is_at_end() {
                self.error(self.peek().clone(), "')' expected.");
                return None;
            }
            self.advance();
        }
        self.consume(RightParen, "")?;
        Some(())
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current_tok]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current_tok + 1)
    }

    fn previous(&self) -> Token {
        self.tokens[self.current_tok - 1].clone()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().value, EndOfFile)
    }

    fn check(&self, tok_val: TokenValue) -> bool {
        if self.is_at_end() {
            false
        } else {
            core::mem::discriminant(&self.peek().value) == core::mem::discriminant(&tok_val)
        }
    }

    fn match_tokens(&mut self, tok_vals: &[TokenValue]) -> Option<Token> {
        if tok_vals.iter().any(|val| self.check(val.clone())) {
            let prev = self.advance();
            return Some(prev);
        }
        None
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current_tok += 1;
        }
        self.previous()
    }

    fn consume(&mut self, tok_val: TokenValue, s: &str) -> Option<Token> {
        if self.check(tok_val.clone()) {
            return Some(self.advance());
        }
        let msg = if s.is_empty() {
            format!("'{tok_val}' expected.")
        } else {
            s.to_owned()
        };
        self.error(self.peek().clone(), &msg);
        None
    }

    fn consume_identifier(&mut self) -> Option<Identifier> {
        if let Id(id) = self.peek().value {
            self.advance();
            return Some(id);
        }
        self.error(self.peek().clone(), "Identifier expected.");
        None
    }

    fn try_consume(&mut self, tok_val: TokenValue) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        None
    }

    fn error(&mut self, tok: Token, s: &str) {
        if tok.value == EndOfFile {
            self.diag.report(tok.line_num.0, "at end of file", s);
        } else {
            self.diag.report(tok.line_num.0, &format!("at '{tok}'"), s);
        }
    }
}
