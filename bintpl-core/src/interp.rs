//! The tree-walking interpreter: executes a parsed `Block` against an
//! `ExecutionContext` and a `Host`, advancing the cursor and emitting
//! annotations as buffer-bound variables are bound.

use crate::ast::*;
use crate::context::ExecutionContext;
use crate::error::{Location, TemplateError};
use crate::frame::{Flow, StackFrame};
use crate::host::Host;
use crate::types::{PrimitiveType, TypeBase, TypeDescriptor};
use crate::value::{Handle, Scalar, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn run(block: &Block, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<(), TemplateError> {
    let flow = exec_block(block, ctx, host)?;
    ctx.current_frame().resolve(flow)?;
    log::debug!("template run complete, cursor at byte {}", ctx.next_variable);
    Ok(())
}

fn exec_block(block: &Block, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<Flow, TemplateError> {
    for stmt in &block.0 {
        let flow = exec_stmt(stmt, ctx, host)?;
        if !matches!(flow, Flow::Normal) {
            return Ok(flow);
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(stmt: &Stmt, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<Flow, TemplateError> {
    ctx.tick(host)?;
    let loc = &stmt.loc;
    match &stmt.kind {
        StmtKind::Block(b) => {
            ctx.push_frame(StackFrame::transparent_scope());
            let flow = exec_block(b, ctx, host);
            ctx.pop_frame();
            flow
        }
        StmtKind::If {
            cond,
            then_branch,
            else_ifs,
            else_branch,
        } => {
            if eval_condition(cond, ctx, host)? {
                return exec_stmt(then_branch, ctx, host);
            }
            for clause in else_ifs {
                if eval_condition(&clause.cond, ctx, host)? {
                    return exec_stmt(&clause.body, ctx, host);
                }
            }
            match else_branch {
                Some(else_branch) => exec_stmt(else_branch, ctx, host),
                None => Ok(Flow::Normal),
            }
        }
        StmtKind::For { init, cond, step, body } => {
            exec_for_loop(init.as_ref(), cond.as_ref(), step.as_ref(), body, ctx, host)
        }
        StmtKind::Switch { scrutinee, cases } => exec_switch(scrutinee, cases, loc, ctx, host),
        StmtKind::StructDefn(d) => exec_struct_defn(d, loc, ctx, host).map(|()| Flow::Normal),
        StmtKind::EnumDefn(d) => exec_enum_defn(d, loc, ctx, host).map(|()| Flow::Normal),
        StmtKind::TypedefStmt { type_ref, name } => {
            let td = resolve_type_ref(type_ref, loc, ctx)?;
            register_type(ctx, name, td, loc)?;
            Ok(Flow::Normal)
        }
        StmtKind::FuncDefn(def) => {
            if ctx.functions.contains_key(&def.name) {
                return Err(TemplateError::RedefinedFunction {
                    name: def.name.clone(),
                    location: loc.clone(),
                });
            }
            ctx.functions.insert(def.name.clone(), def.clone());
            Ok(Flow::Normal)
        }
        StmtKind::LocalVarDefn(lv) => exec_local_var_defn(lv, loc, ctx, host).map(|()| Flow::Normal),
        StmtKind::VarDefn(v) => exec_var_defn(v, loc, ctx, host).map(|()| Flow::Normal),
        StmtKind::Return(expr) => {
            let payload = match expr {
                Some(e) => {
                    let (ty, scalar) = eval_typed_scalar(e, ctx, host)?;
                    Some((ty, scalar))
                }
                None => None,
            };
            Ok(Flow::Return(payload, loc.clone()))
        }
        StmtKind::Break => Ok(Flow::Break(loc.clone())),
        StmtKind::Continue => Ok(Flow::Continue(loc.clone())),
        StmtKind::ExprStmt(e) => {
            eval_expr(e, ctx, host)?;
            Ok(Flow::Normal)
        }
        StmtKind::Empty => Ok(Flow::Normal),
    }
}

fn exec_for_loop(
    init: Option<&ForInit>,
    cond: Option<&Expr>,
    step: Option<&Expr>,
    body: &Stmt,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<Flow, TemplateError> {
    ctx.push_frame(StackFrame::loop_scope());
    let result = exec_for_loop_inner(init, cond, step, body, ctx, host);
    ctx.pop_frame();
    result
}

fn exec_for_loop_inner(
    init: Option<&ForInit>,
    cond: Option<&Expr>,
    step: Option<&Expr>,
    body: &Stmt,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<Flow, TemplateError> {
    if let Some(init) = init {
        match init {
            ForInit::Local(lv) => exec_local_var_defn(lv, &body.loc, ctx, host)?,
            ForInit::Expr(e) => {
                eval_expr(e, ctx, host)?;
            }
        }
    }
    loop {
        if let Some(cond) = cond {
            if !eval_condition(cond, ctx, host)? {
                break;
            }
        }
        match exec_stmt(body, ctx, host)? {
            Flow::Normal | Flow::Continue(_) => {}
            Flow::Break(_) => break,
            r @ Flow::Return(..) => return Ok(r),
        }
        if let Some(step) = step {
            eval_expr(step, ctx, host)?;
        }
    }
    Ok(Flow::Normal)
}

fn exec_switch(
    scrutinee: &Expr,
    cases: &[SwitchCase],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<Flow, TemplateError> {
    let value = eval_scalar(scrutinee, ctx, host)?.as_i64(loc)?;

    ctx.push_frame(StackFrame::switch_scope());
    let result = exec_switch_inner(value, cases, loc, ctx, host);
    ctx.pop_frame();
    result
}

fn exec_switch_inner(
    value: i64,
    cases: &[SwitchCase],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<Flow, TemplateError> {
    // Every case's test is evaluated up front to locate the matching (or
    // `default`) clause, then execution falls through sequentially from
    // there -- matching C's "jump to label, then fall through" semantics
    // rather than a naive first-match-wins linear scan.
    let mut start = None;
    let mut default_idx = None;
    for (i, case) in cases.iter().enumerate() {
        match &case.test {
            Some(test) => {
                let tv = eval_scalar(test, ctx, host)?.as_i64(loc)?;
                if tv == value {
                    start = Some(i);
                    break;
                }
            }
            None if default_idx.is_none() => default_idx = Some(i),
            None => {}
        }
    }
    let Some(start) = start.or(default_idx) else {
        return Ok(Flow::Normal);
    };

    for case in &cases[start..] {
        for stmt in &case.body {
            match exec_stmt(stmt, ctx, host)? {
                Flow::Normal => {}
                Flow::Break(_) => return Ok(Flow::Normal),
                Flow::Continue(l) => return Ok(Flow::Continue(l)),
                r @ Flow::Return(..) => return Ok(r),
            }
        }
    }
    Ok(Flow::Normal)
}

fn eval_condition(expr: &Expr, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<bool, TemplateError> {
    eval_scalar(expr, ctx, host)?.truthy(&expr.loc)
}

/// Evaluate an expression down to its scalar value, discarding the type and
/// handle -- the common case everywhere but assignment targets and paths.
fn eval_scalar(expr: &Expr, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<Scalar, TemplateError> {
    let (_, handle) = eval_expr(expr, ctx, host)?;
    let scalar = handle.borrow().get(host, &expr.loc)?;
    Ok(scalar)
}

fn eval_typed_scalar(
    expr: &Expr,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Scalar), TemplateError> {
    let (ty, handle) = eval_expr(expr, ctx, host)?;
    let scalar = handle.borrow().get(host, &expr.loc)?;
    Ok((ty, scalar))
}

fn eval_expr(
    expr: &Expr,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    match &expr.kind {
        ExprKind::Number(n) => Ok(const_int(*n)),
        ExprKind::Str(s) => Ok(const_str(s.clone())),
        ExprKind::Path(path) => eval_path(path, &expr.loc, ctx, host),
        ExprKind::Call { name, args } => eval_call(name, args, &expr.loc, ctx, host),
        ExprKind::Unary { op, expr: inner } => eval_unary(*op, inner, &expr.loc, ctx, host),
        ExprKind::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, &expr.loc, ctx, host),
        ExprKind::Assign { target, value } => eval_assign(target, value, &expr.loc, ctx, host),
        // Casts are accepted syntactically but carry no runtime effect.
        ExprKind::Cast { expr: inner, .. } => eval_expr(inner, ctx, host),
    }
}

fn const_int(n: i64) -> (TypeDescriptor, Handle) {
    (int_type(), Rc::new(RefCell::new(Value::Constant(Scalar::Int(n)))))
}

fn const_str(s: String) -> (TypeDescriptor, Handle) {
    (
        TypeDescriptor::scalar(TypeBase::String),
        Rc::new(RefCell::new(Value::Constant(Scalar::Str(s)))),
    )
}

fn int_type() -> TypeDescriptor {
    TypeDescriptor::scalar(TypeBase::Primitive(PrimitiveType::int(4, true)))
}

/// Built-ins with no meaningful return value (`BigEndian`, `LittleEndian`,
/// `Printf`) still have to produce a `(TypeDescriptor, Handle)` pair, since
/// every `Call` expression does -- they're almost always used as bare
/// expression statements whose value is simply discarded.
fn void_result() -> (TypeDescriptor, Handle) {
    const_int(0)
}

fn eval_path(
    path: &Path,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    let (mut ty, mut handle) = ctx.find_var(&path.head).ok_or_else(|| TemplateError::UndefinedVariable {
        name: path.head.clone(),
        location: loc.clone(),
    })?;

    for seg in &path.segs {
        match seg {
            PathSeg::Member(name) => {
                let members = {
                    let v = handle.borrow();
                    let Some(members) = v.as_struct() else {
                        return Err(TemplateError::TypeMismatch {
                            message: format!("`{}` is not a struct", path.head),
                            location: loc.clone(),
                        });
                    };
                    members.to_vec()
                };
                let Some((_, mty, mhandle)) = members.into_iter().find(|(n, _, _)| n == name) else {
                    return Err(TemplateError::UndefinedMember {
                        struct_name: path.head.clone(),
                        member: name.clone(),
                        location: loc.clone(),
                    });
                };
                ty = mty;
                handle = mhandle;
            }
            PathSeg::Index(idx_expr) => {
                let idx = eval_scalar(idx_expr, ctx, host)?.as_i64(loc)?;
                let elems = {
                    let v = handle.borrow();
                    let Some(elems) = v.as_array() else {
                        return Err(TemplateError::TypeMismatch {
                            message: format!("`{}` is not an array", path.head),
                            location: loc.clone(),
                        });
                    };
                    elems.to_vec()
                };
                if idx < 0 || idx as usize >= elems.len() {
                    return Err(TemplateError::OutOfRangeIndex {
                        index: idx,
                        length: elems.len(),
                        location: loc.clone(),
                    });
                }
                handle = elems[idx as usize].clone();
                ty = TypeDescriptor {
                    base: ty.base.clone(),
                    is_array: false,
                };
            }
        }
    }
    Ok((ty, handle))
}

fn eval_call(
    name: &str,
    args: &[Expr],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    match name {
        "BigEndian" => {
            ctx.big_endian = true;
            Ok(void_result())
        }
        "LittleEndian" => {
            ctx.big_endian = false;
            Ok(void_result())
        }
        "Printf" => {
            let mut fmt = String::new();
            let mut rest = Vec::with_capacity(args.len().saturating_sub(1));
            for (i, a) in args.iter().enumerate() {
                let s = eval_scalar(a, ctx, host)?;
                if i == 0 {
                    fmt = s.to_string();
                } else {
                    rest.push(s);
                }
            }
            let text = crate::builtins::format_printf(&fmt, &rest, loc)?;
            host.print(&text);
            Ok(void_result())
        }
        _ => {
            let Some(def) = ctx.functions.get(name).cloned() else {
                return Err(TemplateError::UndefinedFunction {
                    name: name.to_owned(),
                    location: loc.clone(),
                });
            };
            call_user_function(&def, args, loc, ctx, host)
        }
    }
}

fn call_user_function(
    def: &FuncDefn,
    args: &[Expr],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    if args.len() != def.params.len() {
        return Err(TemplateError::TypeMismatch {
            message: format!(
                "`{}` expects {} argument(s), got {}",
                def.name,
                def.params.len(),
                args.len()
            ),
            location: loc.clone(),
        });
    }
    let mut arg_scalars = Vec::with_capacity(args.len());
    for arg in args {
        arg_scalars.push(eval_scalar(arg, ctx, host)?);
    }

    let ret_type = resolve_type_ref_opt(&def.ret_type, loc, ctx)?;
    let mut frame = StackFrame::function(ret_type.clone().unwrap_or_else(int_type));
    for ((pname, ptype_ref), scalar) in def.params.iter().zip(arg_scalars) {
        let ptype = resolve_type_ref(ptype_ref, loc, ctx)?;
        let handle = Rc::new(RefCell::new(Value::Mutable(scalar)));
        frame.vars.insert(pname.clone(), (ptype, handle));
    }

    ctx.push_frame_checked(frame, loc, &format!("function `{}`", def.name))?;
    let flow = exec_block(&def.body, ctx, host);
    ctx.pop_frame();
    let flow = flow?;

    match flow {
        Flow::Return(payload, ret_loc) => match (ret_type, payload) {
            (None, None) => Ok(void_result()),
            (None, Some(_)) => Err(TemplateError::TypeMismatch {
                message: format!("`{}` is declared void but returned a value", def.name),
                location: ret_loc,
            }),
            (Some(_), None) => Err(TemplateError::MissingReturn {
                name: def.name.clone(),
                ret_type: "non-void".into(),
                location: ret_loc,
            }),
            (Some(declared), Some((actual, scalar))) => {
                check_assignable(&actual, &declared, &ret_loc)?;
                Ok((declared, Rc::new(RefCell::new(Value::Constant(scalar)))))
            }
        },
        Flow::Normal => match ret_type {
            None => Ok(void_result()),
            Some(_) => Err(TemplateError::MissingReturn {
                name: def.name.clone(),
                ret_type: "non-void".into(),
                location: loc.clone(),
            }),
        },
        Flow::Break(l) => Err(TemplateError::BreakOutsideLoop { location: l }),
        Flow::Continue(l) => Err(TemplateError::ContinueOutsideLoop { location: l }),
    }
}

fn eval_unary(
    op: UnaryOp,
    inner: &Expr,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    let scalar = eval_scalar(inner, ctx, host)?;
    let result = match op {
        UnaryOp::Not => Scalar::Int(if scalar.truthy(loc)? { 0 } else { 1 }),
        UnaryOp::BitNot => Scalar::Int(!scalar.as_i64(loc)?),
    };
    Ok((int_type(), Rc::new(RefCell::new(Value::Constant(result)))))
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    if op == BinOp::And {
        if !eval_scalar(lhs, ctx, host)?.truthy(loc)? {
            return Ok(const_int(0));
        }
        let r = eval_scalar(rhs, ctx, host)?.truthy(loc)?;
        return Ok(const_int(r as i64));
    }
    if op == BinOp::Or {
        if eval_scalar(lhs, ctx, host)?.truthy(loc)? {
            return Ok(const_int(1));
        }
        let r = eval_scalar(rhs, ctx, host)?.truthy(loc)?;
        return Ok(const_int(r as i64));
    }

    let l = eval_scalar(lhs, ctx, host)?;
    let r = eval_scalar(rhs, ctx, host)?;

    if op == BinOp::Add {
        if let (Scalar::Str(a), Scalar::Str(b)) = (&l, &r) {
            return Ok((
                TypeDescriptor::scalar(TypeBase::String),
                Rc::new(RefCell::new(Value::Constant(Scalar::Str(format!("{a}{b}"))))),
            ));
        }
    }

    let (a, b) = (l.as_i64(loc)?, r.as_i64(loc)?);
    let value = match op {
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(TemplateError::DivisionByZero { location: loc.clone() });
            }
            a.wrapping_div(b)
        }
        BinOp::Rem => {
            if b == 0 {
                return Err(TemplateError::DivisionByZero { location: loc.clone() });
            }
            a.wrapping_rem(b)
        }
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Shl => a.wrapping_shl(b as u32),
        BinOp::Shr => a.wrapping_shr(b as u32),
        BinOp::Lt => (a < b) as i64,
        BinOp::Le => (a <= b) as i64,
        BinOp::Gt => (a > b) as i64,
        BinOp::Ge => (a >= b) as i64,
        BinOp::Eq => (a == b) as i64,
        BinOp::Ne => (a != b) as i64,
        BinOp::BitAnd => a & b,
        BinOp::BitXor => a ^ b,
        BinOp::BitOr => a | b,
        BinOp::And | BinOp::Or => unreachable!("short-circuit operators are handled above"),
    };
    Ok((int_type(), Rc::new(RefCell::new(Value::Constant(Scalar::Int(value))))))
}

fn eval_assign(
    target: &Expr,
    value: &Expr,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(TypeDescriptor, Handle), TemplateError> {
    let (target_ty, target_handle) = eval_expr(target, ctx, host)?;
    let (value_ty, value_scalar) = eval_typed_scalar(value, ctx, host)?;
    check_assignable(&value_ty, &target_ty, loc)?;
    target_handle.borrow_mut().set(value_scalar.clone(), loc)?;
    Ok((target_ty, Rc::new(RefCell::new(Value::Constant(value_scalar)))))
}

fn check_assignable(src: &TypeDescriptor, dst: &TypeDescriptor, loc: &Location) -> Result<(), TemplateError> {
    if src.is_array != dst.is_array {
        return Err(TemplateError::TypeMismatch {
            message: "cannot assign between an array and a scalar".into(),
            location: loc.clone(),
        });
    }
    let ok = matches!((&src.base, &dst.base), (TypeBase::String, TypeBase::String))
        || (src.is_numeric() && dst.is_numeric());
    if !ok {
        return Err(TemplateError::TypeMismatch {
            message: "incompatible types in assignment".into(),
            location: loc.clone(),
        });
    }
    Ok(())
}

fn resolve_type_ref(tref: &TypeRef, loc: &Location, ctx: &ExecutionContext) -> Result<TypeDescriptor, TemplateError> {
    resolve_type_ref_opt(tref, loc, ctx)?.ok_or_else(|| TemplateError::UndefinedType {
        name: "void".into(),
        location: loc.clone(),
    })
}

fn resolve_type_ref_opt(
    tref: &TypeRef,
    loc: &Location,
    ctx: &ExecutionContext,
) -> Result<Option<TypeDescriptor>, TemplateError> {
    match tref {
        TypeRef::Void => Ok(None),
        TypeRef::Named(name) => ctx
            .find_type(name)
            .map(Some)
            .ok_or_else(|| TemplateError::UndefinedType {
                name: name.clone(),
                location: loc.clone(),
            }),
        TypeRef::Unsigned(name) => {
            let base = ctx.find_type(name).ok_or_else(|| TemplateError::UndefinedType {
                name: name.clone(),
                location: loc.clone(),
            })?;
            match base.base {
                TypeBase::Primitive(p) => Ok(Some(TypeDescriptor::scalar(TypeBase::Primitive(p.unsigned())))),
                _ => Err(TemplateError::TypeMismatch {
                    message: format!("`unsigned {name}` requires a numeric primitive type"),
                    location: loc.clone(),
                }),
            }
        }
        TypeRef::StructRef(name) => {
            let td = ctx.find_type(name).ok_or_else(|| TemplateError::UndefinedType {
                name: name.clone(),
                location: loc.clone(),
            })?;
            if !td.is_struct() {
                return Err(TemplateError::TypeMismatch {
                    message: format!("`{name}` is not a struct type"),
                    location: loc.clone(),
                });
            }
            Ok(Some(td))
        }
        TypeRef::EnumRef(name) => {
            let td = ctx.find_type(name).ok_or_else(|| TemplateError::UndefinedType {
                name: name.clone(),
                location: loc.clone(),
            })?;
            if !matches!(td.base, TypeBase::Enum(_)) {
                return Err(TemplateError::TypeMismatch {
                    message: format!("`{name}` is not an enum type"),
                    location: loc.clone(),
                });
            }
            Ok(Some(td))
        }
    }
}

fn eval_length(expr: &Expr, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<usize, TemplateError> {
    let n = eval_scalar(expr, ctx, host)?.as_i64(&expr.loc)?;
    if n < 0 {
        return Err(TemplateError::TypeMismatch {
            message: format!("array length cannot be negative (got {n})"),
            location: expr.loc.clone(),
        });
    }
    Ok(n as usize)
}

/// Destination-routing shared by every declaration that binds a name into
/// scope (buffer-bound variables, struct instances): a struct body in
/// progress binds into its own frame (so the struct value sees it too),
/// everything else binds into the globals table.
fn bind_and_register(
    ctx: &mut ExecutionContext,
    name: &str,
    ty: TypeDescriptor,
    handle: Handle,
    loc: &Location,
) -> Result<(), TemplateError> {
    if ctx.in_struct() {
        let frame = ctx.current_frame_mut();
        if frame.vars.contains_key(name) {
            return Err(TemplateError::RedefinedVariable {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        frame.vars.insert(name.to_owned(), (ty.clone(), handle.clone()));
        frame.struct_members.push((name.to_owned(), ty, handle));
    } else {
        if ctx.globals.contains_key(name) {
            return Err(TemplateError::RedefinedVariable {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        ctx.globals.insert(name.to_owned(), (ty, handle));
    }
    Ok(())
}

/// Registers a plain in-memory named constant (enum members). Struct bodies
/// get their own frame-local binding same as `bind_and_register`; inside a
/// function body (but not a struct) the constant is scoped to that frame
/// instead of leaking into the globals table, since the function frame
/// already blocks outside code from seeing it regardless.
fn register_const(
    ctx: &mut ExecutionContext,
    name: &str,
    ty: TypeDescriptor,
    scalar: Scalar,
    loc: &Location,
) -> Result<(), TemplateError> {
    let handle = Rc::new(RefCell::new(Value::Constant(scalar)));
    if ctx.in_struct() {
        let frame = ctx.current_frame_mut();
        if frame.vars.contains_key(name) {
            return Err(TemplateError::RedefinedVariable {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        frame.vars.insert(name.to_owned(), (ty.clone(), handle.clone()));
        frame.struct_members.push((name.to_owned(), ty, handle));
    } else if ctx.in_function() {
        let frame = ctx.current_frame_mut();
        if frame.vars.contains_key(name) {
            return Err(TemplateError::RedefinedVariable {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        frame.vars.insert(name.to_owned(), (ty, handle));
    } else {
        if ctx.globals.contains_key(name) {
            return Err(TemplateError::RedefinedVariable {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        ctx.globals.insert(name.to_owned(), (ty, handle));
    }
    Ok(())
}

/// Same split as `register_const`, for type names (struct/enum tags,
/// typedef aliases): a struct or function body's own declarations stay
/// local to it, everything else is a template-scope type.
fn register_type(ctx: &mut ExecutionContext, name: &str, td: TypeDescriptor, loc: &Location) -> Result<(), TemplateError> {
    if ctx.in_struct() || ctx.in_function() {
        let frame = ctx.current_frame_mut();
        if frame.types.contains_key(name) {
            return Err(TemplateError::RedefinedType {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        frame.types.insert(name.to_owned(), td);
    } else {
        if ctx.global_types.contains_key(name) {
            return Err(TemplateError::RedefinedType {
                name: name.to_owned(),
                location: loc.clone(),
            });
        }
        ctx.global_types.insert(name.to_owned(), td);
    }
    Ok(())
}

/// Binds one scalar element of `name` (or its `index`-th element, inside an
/// array declaration): a file-backed primitive/enum slot at the cursor, or
/// a freshly instantiated struct.
fn bind_one(
    ty: &TypeDescriptor,
    name: &str,
    args: &[Expr],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
    index: Option<usize>,
) -> Result<Handle, TemplateError> {
    let label = match index {
        Some(i) => format!("{name}[{i}]"),
        None => name.to_owned(),
    };
    match &ty.base {
        TypeBase::Struct(_) => instantiate_struct(ty, name, args, loc, ctx, host, index),
        TypeBase::Primitive(_) | TypeBase::Enum(_) => {
            if !args.is_empty() {
                return Err(TemplateError::TypeMismatch {
                    message: format!("`{name}` is not a struct and takes no arguments"),
                    location: loc.clone(),
                });
            }
            let size = ty.fixed_element_size().expect("primitive/enum types have a fixed size");
            let prim = match &ty.base {
                TypeBase::Primitive(p) => *p,
                TypeBase::Enum(e) => e.underlying,
                _ => unreachable!(),
            };
            let offset = ctx.next_variable;
            ctx.next_variable += size as u64;
            let handle = Rc::new(RefCell::new(Value::FileBacked {
                offset,
                prim,
                big_endian: ctx.big_endian,
            }));
            if let Some(code) = ty.endian_code(ctx.big_endian) {
                host.set_data_type(offset, size as u64, code);
            }
            host.set_comment(offset, size as u64, &label);
            Ok(handle)
        }
        TypeBase::String => Err(TemplateError::TypeMismatch {
            message: format!("`{name}` cannot be bound to a buffer range (strings have no fixed size)"),
            location: loc.clone(),
        }),
    }
}

/// Binds either a single `name` or, when `array_len` is given, an array of
/// `name[i]` elements -- the shape shared by `var_defn` and a struct's own
/// trailing instance declaration.
fn bind_array_or_scalar(
    ty: &TypeDescriptor,
    name: &str,
    args: &[Expr],
    array_len: Option<&Expr>,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(), TemplateError> {
    match array_len {
        Some(len_expr) => {
            let len = eval_length(len_expr, ctx, host)?;
            let mut elems = Vec::with_capacity(len);
            for i in 0..len {
                elems.push(bind_one(ty, name, args, loc, ctx, host, Some(i))?);
            }
            let handle = Rc::new(RefCell::new(Value::Array(elems)));
            bind_and_register(ctx, name, ty.as_array(), handle, loc)
        }
        None => {
            let handle = bind_one(ty, name, args, loc, ctx, host, None)?;
            bind_and_register(ctx, name, ty.clone(), handle, loc)
        }
    }
}

fn instantiate_struct(
    struct_type: &TypeDescriptor,
    name: &str,
    args: &[Expr],
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
    index: Option<usize>,
) -> Result<Handle, TemplateError> {
    let TypeBase::Struct(def) = &struct_type.base else {
        unreachable!("instantiate_struct called on a non-struct type")
    };
    let def = def.clone();
    if args.len() != def.params.len() {
        return Err(TemplateError::TypeMismatch {
            message: format!(
                "struct `{}` expects {} argument(s), got {}",
                def.name.as_deref().unwrap_or(name),
                def.params.len(),
                args.len()
            ),
            location: loc.clone(),
        });
    }
    let mut arg_scalars = Vec::with_capacity(args.len());
    for arg in args {
        arg_scalars.push(eval_scalar(arg, ctx, host)?);
    }

    // Struct instantiation recurses with user data, unlike a scope/loop
    // frame whose depth is bounded by the AST alone -- tick once more here
    // so a self-referential struct with no base case still yields before
    // it finally trips the recursion limit.
    ctx.tick(host)?;
    let what = match index {
        Some(i) => format!("struct `{name}[{i}]`"),
        None => format!("struct `{name}`"),
    };
    let mut frame = StackFrame::struct_frame();
    for ((pname, ptype), scalar) in def.params.iter().zip(arg_scalars) {
        let handle = Rc::new(RefCell::new(Value::Mutable(scalar)));
        frame.vars.insert(pname.clone(), (ptype.clone(), handle));
    }
    ctx.push_frame_checked(frame, loc, &what)?;
    let flow = exec_block(&def.body, ctx, host);
    let frame = ctx.pop_frame();
    frame.resolve(flow?)?;
    Ok(Rc::new(RefCell::new(Value::Struct(frame.struct_members))))
}

fn exec_var_defn(v: &VarDefn, loc: &Location, ctx: &mut ExecutionContext, host: &mut dyn Host) -> Result<(), TemplateError> {
    if ctx.in_function() {
        return Err(TemplateError::GlobalInFunctionBody { location: loc.clone() });
    }
    let ty = resolve_type_ref(&v.type_ref, loc, ctx)?;
    bind_array_or_scalar(&ty, &v.name, &v.args, v.array_len.as_ref(), loc, ctx, host)
}

fn exec_struct_defn(
    defn: &StructDefn,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(), TemplateError> {
    let mut params = Vec::with_capacity(defn.params.len());
    for (pname, ptref) in &defn.params {
        params.push((pname.clone(), resolve_type_ref(ptref, loc, ctx)?));
    }
    let struct_def = Rc::new(crate::types::StructDef {
        name: defn.struct_name.clone(),
        params,
        body: defn.body.clone(),
    });
    let struct_type = TypeDescriptor::scalar(TypeBase::Struct(struct_def));

    if let Some(tag) = &defn.struct_name {
        register_type(ctx, tag, struct_type.clone(), loc)?;
    }

    match &defn.form {
        StructDefnForm::TypedefAlias(alias) => register_type(ctx, alias, struct_type, loc)?,
        StructDefnForm::Instance(None) => {}
        StructDefnForm::Instance(Some(tail)) => {
            if ctx.in_function() {
                return Err(TemplateError::GlobalInFunctionBody { location: loc.clone() });
            }
            bind_array_or_scalar(
                &struct_type,
                &tail.name,
                &tail.args,
                tail.array_len.as_ref(),
                loc,
                ctx,
                host,
            )?;
        }
    }
    Ok(())
}

fn exec_enum_defn(
    defn: &EnumDefnStmt,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(), TemplateError> {
    let underlying = match &defn.underlying {
        Some(tref) => {
            let td = resolve_type_ref(tref, loc, ctx)?;
            match td.base {
                TypeBase::Primitive(p) => p,
                _ => {
                    return Err(TemplateError::TypeMismatch {
                        message: "an enum's underlying type must be a numeric primitive".into(),
                        location: loc.clone(),
                    })
                }
            }
        }
        None => PrimitiveType::int(4, true),
    };
    // Members are plain int-typed constants, not tagged with the enum's own
    // type: nothing in the interpreter distinguishes an enum-typed numeric
    // from a primitive one (`is_numeric`/arithmetic treat them identically),
    // and registering them as we go lets a later initializer in the same
    // enum reference an earlier member by name.
    let member_type = TypeDescriptor::scalar(TypeBase::Primitive(underlying));
    let mut members = Vec::with_capacity(defn.members.len());
    let mut next = 0i64;
    for (name, init) in &defn.members {
        let value = match init {
            Some(e) => eval_scalar(e, ctx, host)?.as_i64(loc)?,
            None => next,
        };
        members.push((name.clone(), value));
        next = value + 1;
        register_const(ctx, name, member_type.clone(), Scalar::Int(value), loc)?;
    }

    let enum_def = Rc::new(crate::types::EnumDef {
        name: defn.enum_name.clone(),
        underlying,
        members,
    });
    let enum_type = TypeDescriptor::scalar(TypeBase::Enum(enum_def));

    if let Some(tag) = &defn.enum_name {
        register_type(ctx, tag, enum_type.clone(), loc)?;
    }
    match &defn.form {
        EnumDefnForm::TypedefAlias(alias) => register_type(ctx, alias, enum_type, loc)?,
        EnumDefnForm::Instance(Some(name)) => {
            if ctx.in_function() {
                return Err(TemplateError::GlobalInFunctionBody { location: loc.clone() });
            }
            bind_array_or_scalar(&enum_type, name, &[], None, loc, ctx, host)?;
        }
        EnumDefnForm::Instance(None) => {}
    }
    Ok(())
}

fn exec_local_var_defn(
    lv: &LocalVarDefn,
    loc: &Location,
    ctx: &mut ExecutionContext,
    host: &mut dyn Host,
) -> Result<(), TemplateError> {
    let ty = resolve_type_ref(&lv.type_ref, loc, ctx)?;
    if ty.is_struct() {
        return Err(TemplateError::TypeMismatch {
            message: format!("local variable `{}` cannot have a struct type", lv.name),
            location: loc.clone(),
        });
    }
    if ctx.current_frame().vars.contains_key(&lv.name) {
        return Err(TemplateError::RedefinedVariable {
            name: lv.name.clone(),
            location: loc.clone(),
        });
    }

    let (final_ty, handle) = match &lv.array_len {
        Some(len_expr) => {
            let len = eval_length(len_expr, ctx, host)?;
            let mut elems = Vec::with_capacity(len);
            for _ in 0..len {
                let scalar = match &lv.init {
                    Some(e) => eval_scalar(e, ctx, host)?,
                    None => default_scalar(&ty),
                };
                elems.push(Rc::new(RefCell::new(Value::Mutable(scalar))) as Handle);
            }
            (ty.as_array(), Rc::new(RefCell::new(Value::Array(elems))) as Handle)
        }
        None => {
            let scalar = match &lv.init {
                Some(e) => eval_scalar(e, ctx, host)?,
                None => default_scalar(&ty),
            };
            (ty, Rc::new(RefCell::new(Value::Mutable(scalar))) as Handle)
        }
    };
    ctx.current_frame_mut().vars.insert(lv.name.clone(), (final_ty, handle));
    Ok(())
}

fn default_scalar(ty: &TypeDescriptor) -> Scalar {
    match &ty.base {
        TypeBase::Primitive(p) => match p.kind {
            crate::types::NumKind::Float => Scalar::Float(0.0),
            crate::types::NumKind::Int => Scalar::Int(0),
        },
        TypeBase::Enum(_) => Scalar::Int(0),
        TypeBase::String => Scalar::Str(String::new()),
        TypeBase::Struct(_) => unreachable!("struct-typed locals are rejected before reaching default_scalar"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;
    use crate::host::testing::{HostCall, RecordingHost};
    use crate::{parse, preprocess};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn run_source(src: &str, buffer: &[u8]) -> Result<RecordingHost, TemplateError> {
        let dir = std::env::temp_dir().join(format!("bintpl-interp-{}-{}", std::process::id(), src.len()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.bt");
        fs::write(&path, src).unwrap();
        let pre = preprocess::process(&path).unwrap();
        let block = parse::parse(&pre).unwrap();
        let mut ctx = ExecutionContext::new(RunConfig::default());
        let mut host = RecordingHost::new(buffer.to_vec());
        run(&block, &mut ctx, &mut host)?;
        Ok(host)
    }

    #[test]
    fn scenario_one_single_int() {
        let host = run_source("int x;\n", &[0u8; 8]).unwrap();
        assert_eq!(
            host.calls,
            vec![
                HostCall::SetDataType { offset: 0, length: 4, code: "s32le".into() },
                HostCall::SetComment { offset: 0, length: 4, text: "x".into() },
            ]
        );
    }

    #[test]
    fn scenario_two_endian_toggle() {
        let host = run_source("BigEndian(); uint16 y; LittleEndian(); uint16 z;\n", &[0u8; 8]).unwrap();
        assert_eq!(
            host.calls,
            vec![
                HostCall::SetDataType { offset: 0, length: 2, code: "u16be".into() },
                HostCall::SetComment { offset: 0, length: 2, text: "y".into() },
                HostCall::SetDataType { offset: 2, length: 2, code: "u16le".into() },
                HostCall::SetComment { offset: 2, length: 2, text: "z".into() },
            ]
        );
    }

    #[test]
    fn scenario_three_struct_has_no_data_type_call() {
        let host = run_source("struct { int a; int b; } s;\n", &[0u8; 8]).unwrap();
        assert_eq!(
            host.calls,
            vec![
                HostCall::SetDataType { offset: 0, length: 4, code: "s32le".into() },
                HostCall::SetComment { offset: 0, length: 4, text: "a".into() },
                HostCall::SetDataType { offset: 4, length: 4, code: "s32le".into() },
                HostCall::SetComment { offset: 4, length: 4, text: "b".into() },
            ]
        );
    }

    #[test]
    fn scenario_four_length_prefixed_array() {
        let host = run_source("uint32 n; uchar data[n];\n", &[3, 0, 0, 0, 0xAA, 0xBB, 0xCC]).unwrap();
        let comments: Vec<_> = host
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::SetComment { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(comments, vec!["n", "data[0]", "data[1]", "data[2]"]);
    }

    #[test]
    fn scenario_five_conditional_printf() {
        let host = run_source("int x; if (x == 0) { Printf(\"z\"); }\n", &[0u8; 8]).unwrap();
        let prints: Vec<_> = host
            .calls
            .iter()
            .filter(|c| matches!(c, HostCall::Print(_)))
            .collect();
        assert_eq!(prints.len(), 1);
        assert_eq!(prints[0], &HostCall::Print("z".into()));
    }

    #[test]
    fn scenario_six_bare_return_is_an_error() {
        let err = run_source("return;\n", &[0u8; 8]).unwrap_err();
        assert!(matches!(err, TemplateError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn bare_break_at_template_scope_is_an_error() {
        let err = run_source("break;\n", &[0u8; 8]).unwrap_err();
        assert!(matches!(err, TemplateError::BreakOutsideLoop { .. }));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = run_source("local int x = 1 / 0;\n", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::DivisionByZero { .. }));
    }

    #[test]
    fn assigning_to_a_file_backed_variable_is_an_error() {
        let err = run_source("int x; local int y = (x = 5);\n", &[0u8; 8]).unwrap_err();
        assert!(matches!(err, TemplateError::AssignmentToFileVariable { .. }));
    }

    #[test]
    fn user_function_returns_a_value() {
        let host = run_source(
            "int add(int a, int b) { return a + b; } local int r = add(2, 3); if (r == 5) { Printf(\"ok\"); }\n",
            &[0u8; 8],
        )
        .unwrap();
        assert!(host.calls.iter().any(|c| c == &HostCall::Print("ok".into())));
    }

    #[test]
    fn for_loop_sums_with_break() {
        let host = run_source(
            "local int total = 0; for (local int i = 0; i < 10; i = i + 1) { if (i == 3) { break; } total = total + i; } if (total == 3) { Printf(\"done\"); }\n",
            &[0u8; 8],
        )
        .unwrap();
        assert!(host.calls.iter().any(|c| c == &HostCall::Print("done".into())));
    }

    #[test]
    fn switch_falls_through_to_default() {
        let host = run_source(
            "local int x = 2; switch (x) { case 1: break; default: Printf(\"fell\"); break; }\n",
            &[0u8; 8],
        )
        .unwrap();
        assert!(host.calls.iter().any(|c| c == &HostCall::Print("fell".into())));
    }

    #[test]
    fn enum_member_forward_reference_within_same_enum() {
        let host = run_source(
            "enum <int> E { A = 1, B = A + 1 } local int x = B; if (x == 2) { Printf(\"yes\"); }\n",
            &[0u8; 8],
        )
        .unwrap();
        assert!(host.calls.iter().any(|c| c == &HostCall::Print("yes".into())));
    }

    #[test]
    fn recursion_limit_trips_on_self_referential_struct() {
        let mut ctx = ExecutionContext::new(RunConfig {
            max_recursion_depth: 8,
            ..RunConfig::default()
        });
        let dir = std::env::temp_dir().join(format!("bintpl-interp-recur-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.bt");
        fs::write(&path, "struct Node { Node next; } n;\n").unwrap();
        let pre = preprocess::process(&path).unwrap();
        let block = parse::parse(&pre).unwrap();
        let mut host = RecordingHost::new(vec![0u8; 4096]);
        let err = run(&block, &mut ctx, &mut host).unwrap_err();
        assert!(matches!(err, TemplateError::RecursionLimit { .. }));
    }
}
