//! Builds the AST (`crate::ast`) from the pest parse tree produced by
//! `grammar.pest`. Expressions are first assembled as the flat token list
//! described in the design notes, then handed to `crate::expr::fold`.

use crate::ast::*;
use crate::error::{Location, ParseError};
use crate::expr::{self, Token};
use crate::preprocess::Preprocessed;
use pest::iterators::Pair;
use pest::Parser;
use std::rc::Rc;

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"]
struct TemplateParser;

pub fn parse(pre: &Preprocessed) -> Result<Block, ParseError> {
    let mut pairs =
        TemplateParser::parse(Rule::template, &pre.text).map_err(|e| to_parse_error(e, pre))?;
    let template_pair = pairs.next().expect("Rule::template always produces one pair");
    let mut stmts = Vec::new();
    for pair in template_pair.into_inner() {
        match pair.as_rule() {
            Rule::file_directive | Rule::EOI => {}
            Rule::statement => stmts.push(parse_statement(pair, pre)?),
            r => unreachable!("unexpected top-level rule {:?}", r),
        }
    }
    log::debug!("parsed {} top-level statement(s)", stmts.len());
    Ok(Block(stmts))
}

fn to_parse_error(e: pest::error::Error<Rule>, pre: &Preprocessed) -> ParseError {
    let pos = match e.location {
        pest::error::InputLocation::Pos(p) => p,
        pest::error::InputLocation::Span((s, _)) => s,
    };
    let location = pre.line_table.resolve(&pre.text, pos);
    ParseError {
        location,
        found: e.variant.message().into_owned(),
        near: String::new(),
    }
}

fn loc_of(pair: &Pair<Rule>, pre: &Preprocessed) -> Location {
    pre.line_table.resolve(&pre.text, pair.as_span().start())
}

fn parse_statement(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Stmt, ParseError> {
    let loc = loc_of(&pair, pre);
    let inner = pair
        .into_inner()
        .next()
        .expect("statement always wraps exactly one alternative");
    let kind = match inner.as_rule() {
        Rule::block => StmtKind::Block(parse_block(inner, pre)?),
        Rule::if_stmt => parse_if(inner, pre)?,
        Rule::for_stmt => parse_for(inner, pre)?,
        Rule::while_stmt => parse_while(inner, pre)?,
        Rule::switch_stmt => parse_switch(inner, pre)?,
        Rule::struct_defn => StmtKind::StructDefn(parse_struct_defn(inner, pre)?),
        Rule::enum_defn => StmtKind::EnumDefn(parse_enum_defn(inner, pre)?),
        Rule::typedef_stmt => parse_typedef(inner, pre)?,
        Rule::func_defn => StmtKind::FuncDefn(Rc::new(parse_func_defn(inner, pre)?)),
        Rule::local_var_defn => StmtKind::LocalVarDefn(parse_local_var_defn(inner, pre)?),
        Rule::var_defn => StmtKind::VarDefn(parse_var_defn(inner, pre)?),
        Rule::return_stmt => {
            let expr = inner.into_inner().next().map(|e| parse_expr(e, pre)).transpose()?;
            StmtKind::Return(expr)
        }
        Rule::break_stmt => StmtKind::Break,
        Rule::continue_stmt => StmtKind::Continue,
        Rule::expr_stmt => {
            let e = inner.into_inner().next().expect("expr_stmt wraps an expr");
            StmtKind::ExprStmt(parse_expr(e, pre)?)
        }
        Rule::empty_stmt => StmtKind::Empty,
        r => unreachable!("unexpected statement alternative {:?}", r),
    };
    Ok(Stmt { loc, kind })
}

fn parse_block(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Block, ParseError> {
    let mut stmts = Vec::new();
    for p in pair.into_inner() {
        if p.as_rule() == Rule::statement {
            stmts.push(parse_statement(p, pre)?);
        }
    }
    Ok(Block(stmts))
}

fn parse_if(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StmtKind, ParseError> {
    let mut inner = pair.into_inner();
    let cond = parse_expr(inner.next().expect("if_stmt: condition"), pre)?;
    let then_branch = Box::new(parse_statement(inner.next().expect("if_stmt: body"), pre)?);
    let mut else_ifs = Vec::new();
    let mut else_branch = None;
    for p in inner {
        match p.as_rule() {
            Rule::else_if_clause => {
                let mut ii = p.into_inner();
                let cond = parse_expr(ii.next().expect("else_if_clause: condition"), pre)?;
                let body = Box::new(parse_statement(ii.next().expect("else_if_clause: body"), pre)?);
                else_ifs.push(ElseIf { cond, body });
            }
            Rule::else_clause => {
                let mut ii = p.into_inner();
                else_branch = Some(Box::new(parse_statement(
                    ii.next().expect("else_clause: body"),
                    pre,
                )?));
            }
            r => unreachable!("unexpected if_stmt tail rule {:?}", r),
        }
    }
    Ok(StmtKind::If {
        cond,
        then_branch,
        else_ifs,
        else_branch,
    })
}

fn parse_for(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StmtKind, ParseError> {
    let mut inner = pair.into_inner().peekable();
    let init = if matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::for_init)) {
        Some(parse_for_init(inner.next().unwrap(), pre)?)
    } else {
        None
    };
    let cond_pair = inner.next().expect("for_stmt: for_cond");
    let cond = cond_pair
        .into_inner()
        .next()
        .map(|e| parse_expr(e, pre))
        .transpose()?;
    let step_pair = inner.next().expect("for_stmt: for_step");
    let step = step_pair
        .into_inner()
        .next()
        .map(|e| parse_expr(e, pre))
        .transpose()?;
    let body = Box::new(parse_statement(inner.next().expect("for_stmt: body"), pre)?);
    Ok(StmtKind::For {
        init,
        cond,
        step,
        body,
    })
}

fn parse_for_init(pair: Pair<Rule>, pre: &Preprocessed) -> Result<ForInit, ParseError> {
    let inner = pair.into_inner().next().expect("for_init wraps one alternative");
    match inner.as_rule() {
        Rule::local_var_decl_inner => Ok(ForInit::Local(parse_local_var_decl_inner(inner, pre)?)),
        Rule::expr => Ok(ForInit::Expr(parse_expr(inner, pre)?)),
        r => unreachable!("unexpected for_init alternative {:?}", r),
    }
}

fn parse_while(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StmtKind, ParseError> {
    let mut inner = pair.into_inner();
    let cond = parse_expr(inner.next().expect("while_stmt: condition"), pre)?;
    let body = Box::new(parse_statement(inner.next().expect("while_stmt: body"), pre)?);
    Ok(StmtKind::For {
        init: None,
        cond: Some(cond),
        step: None,
        body,
    })
}

fn parse_switch(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StmtKind, ParseError> {
    let mut inner = pair.into_inner();
    let scrutinee = parse_expr(inner.next().expect("switch_stmt: scrutinee"), pre)?;
    let mut cases = Vec::new();
    for p in inner {
        match p.as_rule() {
            Rule::case_clause => {
                let mut ci = p.into_inner();
                let test = Some(parse_expr(ci.next().expect("case_clause: test"), pre)?);
                let body = ci.map(|s| parse_statement(s, pre)).collect::<Result<Vec<_>, _>>()?;
                cases.push(SwitchCase { test, body });
            }
            Rule::default_clause => {
                let body = p
                    .into_inner()
                    .map(|s| parse_statement(s, pre))
                    .collect::<Result<Vec<_>, _>>()?;
                cases.push(SwitchCase { test: None, body });
            }
            r => unreachable!("unexpected switch_stmt child {:?}", r),
        }
    }
    Ok(StmtKind::Switch { scrutinee, cases })
}

fn parse_struct_defn(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StructDefn, ParseError> {
    let mut inner = pair.into_inner();
    let decl_pair = inner.next().expect("struct_defn: struct_decl_body");
    let (struct_name, params, body) = parse_struct_decl_body(decl_pair, pre)?;
    let form = match inner.next() {
        Some(p) if p.as_rule() == Rule::ident => StructDefnForm::TypedefAlias(p.as_str().to_owned()),
        Some(p) if p.as_rule() == Rule::var_tail => {
            StructDefnForm::Instance(Some(parse_var_tail(p, pre)?))
        }
        Some(p) => unreachable!("unexpected struct_defn tail {:?}", p.as_rule()),
        None => StructDefnForm::Instance(None),
    };
    Ok(StructDefn {
        struct_name,
        params,
        body,
        form,
    })
}

#[allow(clippy::type_complexity)]
fn parse_struct_decl_body(
    pair: Pair<Rule>,
    pre: &Preprocessed,
) -> Result<(Option<String>, Vec<(String, TypeRef)>, Rc<Block>), ParseError> {
    let mut name = None;
    let mut params = Vec::new();
    let mut body = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = Some(p.as_str().to_owned()),
            Rule::param_list => params = parse_param_list(p, pre),
            Rule::block => body = Some(Rc::new(parse_block(p, pre)?)),
            r => unreachable!("unexpected struct_decl_body child {:?}", r),
        }
    }
    Ok((name, params, body.expect("struct_decl_body always has a block")))
}

fn parse_var_tail(pair: Pair<Rule>, pre: &Preprocessed) -> Result<VarTail, ParseError> {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("var_tail: name").as_str().to_owned();
    let mut args = Vec::new();
    let mut array_len = None;
    for p in inner {
        match p.as_rule() {
            Rule::arg_list => args = parse_arg_list(p, pre)?,
            Rule::array_suffix => array_len = Some(parse_array_suffix(p, pre)?),
            r => unreachable!("unexpected var_tail child {:?}", r),
        }
    }
    Ok(VarTail {
        name,
        args,
        array_len,
    })
}

fn parse_enum_body(
    pair: Pair<Rule>,
    pre: &Preprocessed,
) -> Result<(Option<TypeRef>, Option<String>, Vec<(String, Option<Expr>)>), ParseError> {
    let mut underlying = None;
    let mut name = None;
    let mut members = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::type_ref => underlying = Some(parse_type_ref(p, pre)),
            Rule::ident => name = Some(p.as_str().to_owned()),
            Rule::enum_member => {
                let mut mi = p.into_inner();
                let mname = mi.next().expect("enum_member: name").as_str().to_owned();
                let mexpr = mi.next().map(|e| parse_expr(e, pre)).transpose()?;
                members.push((mname, mexpr));
            }
            r => unreachable!("unexpected enum_body child {:?}", r),
        }
    }
    Ok((underlying, name, members))
}

fn parse_enum_defn(pair: Pair<Rule>, pre: &Preprocessed) -> Result<EnumDefnStmt, ParseError> {
    // Both alternatives can leave a single trailing `ident` pair (alias
    // name vs. instance name), so the only reliable signal for which
    // alternative matched is the literal `typedef` keyword in the source.
    let is_typedef = pair.as_str().trim_start().starts_with("typedef");
    let mut inner = pair.into_inner();
    let body_pair = inner.next().expect("enum_defn: enum_body");
    let (underlying, enum_name, members) = parse_enum_body(body_pair, pre)?;
    let form = if is_typedef {
        let alias = inner.next().expect("typedef enum_defn: alias name").as_str().to_owned();
        EnumDefnForm::TypedefAlias(alias)
    } else {
        EnumDefnForm::Instance(inner.next().map(|p| p.as_str().to_owned()))
    };
    Ok(EnumDefnStmt {
        enum_name,
        underlying,
        members,
        form,
    })
}

fn parse_typedef(pair: Pair<Rule>, pre: &Preprocessed) -> Result<StmtKind, ParseError> {
    let mut inner = pair.into_inner();
    let type_ref = parse_type_ref(inner.next().expect("typedef_stmt: type"), pre);
    let name = inner.next().expect("typedef_stmt: name").as_str().to_owned();
    Ok(StmtKind::TypedefStmt { type_ref, name })
}

fn parse_func_defn(pair: Pair<Rule>, pre: &Preprocessed) -> Result<FuncDefn, ParseError> {
    let mut inner = pair.into_inner();
    let ret_type = parse_type_ref(inner.next().expect("func_defn: return type"), pre);
    let name = inner.next().expect("func_defn: name").as_str().to_owned();
    let params = parse_param_list(inner.next().expect("func_defn: params"), pre);
    let body = Rc::new(parse_block(inner.next().expect("func_defn: body"), pre)?);
    Ok(FuncDefn {
        ret_type,
        name,
        params,
        body,
    })
}

fn parse_var_defn(pair: Pair<Rule>, pre: &Preprocessed) -> Result<VarDefn, ParseError> {
    let mut inner = pair.into_inner();
    let type_ref = parse_type_ref(inner.next().expect("var_defn: type"), pre);
    let name = inner.next().expect("var_defn: name").as_str().to_owned();
    let mut args = Vec::new();
    let mut array_len = None;
    for p in inner {
        match p.as_rule() {
            Rule::arg_list => args = parse_arg_list(p, pre)?,
            Rule::array_suffix => array_len = Some(parse_array_suffix(p, pre)?),
            r => unreachable!("unexpected var_defn child {:?}", r),
        }
    }
    Ok(VarDefn {
        type_ref,
        name,
        args,
        array_len,
    })
}

fn parse_local_var_defn(pair: Pair<Rule>, pre: &Preprocessed) -> Result<LocalVarDefn, ParseError> {
    let inner_pair = pair.into_inner().next().expect("local_var_defn: decl");
    parse_local_var_decl_inner(inner_pair, pre)
}

fn parse_local_var_decl_inner(
    pair: Pair<Rule>,
    pre: &Preprocessed,
) -> Result<LocalVarDefn, ParseError> {
    let mut inner = pair.into_inner();
    let type_ref = parse_type_ref(inner.next().expect("local_var_decl_inner: type"), pre);
    let name = inner.next().expect("local_var_decl_inner: name").as_str().to_owned();
    let mut args = Vec::new();
    let mut array_len = None;
    let mut init = None;
    for p in inner {
        match p.as_rule() {
            Rule::arg_list => args = parse_arg_list(p, pre)?,
            Rule::array_suffix => array_len = Some(parse_array_suffix(p, pre)?),
            Rule::expr => init = Some(parse_expr(p, pre)?),
            r => unreachable!("unexpected local_var_decl_inner child {:?}", r),
        }
    }
    Ok(LocalVarDefn {
        type_ref,
        name,
        args,
        array_len,
        init,
    })
}

fn parse_param_list(pair: Pair<Rule>, pre: &Preprocessed) -> Vec<(String, TypeRef)> {
    pair.into_inner()
        .map(|p| {
            let mut ii = p.into_inner();
            let type_ref = parse_type_ref(ii.next().expect("param: type"), pre);
            let name = ii.next().expect("param: name").as_str().to_owned();
            (name, type_ref)
        })
        .collect()
}

fn parse_arg_list(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Vec<Expr>, ParseError> {
    pair.into_inner().map(|e| parse_expr(e, pre)).collect()
}

fn parse_array_suffix(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Expr, ParseError> {
    let e = pair.into_inner().next().expect("array_suffix: length expr");
    parse_expr(e, pre)
}

fn parse_call(pair: Pair<Rule>, pre: &Preprocessed) -> Result<(String, Vec<Expr>), ParseError> {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("call: name").as_str().to_owned();
    let args = match inner.next() {
        Some(p) => p.into_inner().map(|e| parse_expr(e, pre)).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok((name, args))
}

fn parse_path(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Path, ParseError> {
    let mut inner = pair.into_inner();
    let head = inner.next().expect("path: head ident").as_str().to_owned();
    let mut segs = Vec::new();
    for p in inner {
        let child = p.into_inner().next().expect("path_suffix always wraps one child");
        match child.as_rule() {
            Rule::ident => segs.push(PathSeg::Member(child.as_str().to_owned())),
            Rule::expr => segs.push(PathSeg::Index(parse_expr(child, pre)?)),
            r => unreachable!("unexpected path_suffix child {:?}", r),
        }
    }
    Ok(Path { head, segs })
}

/// `type_ref`'s keyword alternatives (`unsigned`/`struct`/`enum`) are
/// plain string literals in the grammar, so only their trailing `ident`
/// shows up as a child pair; the keyword itself is recovered from the
/// rule's own captured text.
fn parse_type_ref(pair: Pair<Rule>, _pre: &Preprocessed) -> TypeRef {
    let text = pair.as_str().trim();
    if text == "void" {
        return TypeRef::Void;
    }
    match pair.into_inner().next() {
        Some(ident_pair) => {
            let name = ident_pair.as_str().to_owned();
            if text.starts_with("unsigned") {
                TypeRef::Unsigned(name)
            } else if text.starts_with("struct") {
                TypeRef::StructRef(name)
            } else if text.starts_with("enum") {
                TypeRef::EnumRef(name)
            } else {
                TypeRef::Named(name)
            }
        }
        None => TypeRef::Void,
    }
}

fn parse_expr(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Expr, ParseError> {
    let mut inner = pair.into_inner();
    let mut tokens = vec![Token::Operand(parse_unary_atom(
        inner.next().expect("expr: first operand"),
        pre,
    )?)];
    while let Some(op_pair) = inner.next() {
        let op_loc = loc_of(&op_pair, pre);
        let op_str = op_pair.as_str();
        let operand = parse_unary_atom(inner.next().expect("expr: operand after operator"), pre)?;
        if op_str == "=" {
            tokens.push(Token::Assign(op_loc));
        } else {
            tokens.push(Token::Op(bin_op_from_str(op_str, &op_loc)?, op_loc));
        }
        tokens.push(Token::Operand(operand));
    }
    Ok(expr::fold(tokens))
}

fn bin_op_from_str(s: &str, loc: &Location) -> Result<BinOp, ParseError> {
    Ok(match s {
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "&" => BinOp::BitAnd,
        "^" => BinOp::BitXor,
        "|" => BinOp::BitOr,
        "&&" => BinOp::And,
        "||" => BinOp::Or,
        other => {
            return Err(ParseError {
                location: loc.clone(),
                found: other.to_owned(),
                near: " (unrecognized binary operator)".into(),
            })
        }
    })
}

fn parse_unary_atom(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Expr, ParseError> {
    let loc = loc_of(&pair, pre);
    let mut ops = Vec::new();
    let mut atom_pair = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::unary_op => ops.push(match p.as_str() {
                "!" => UnaryOp::Not,
                "~" => UnaryOp::BitNot,
                other => {
                    return Err(ParseError {
                        location: loc_of(&p, pre),
                        found: other.to_owned(),
                        near: " (unrecognized unary operator)".into(),
                    })
                }
            }),
            Rule::atom => atom_pair = Some(p),
            r => unreachable!("unexpected unary_atom child {:?}", r),
        }
    }
    let mut e = parse_atom(atom_pair.expect("unary_atom always wraps an atom"), pre)?;
    // Unary operators are right-associative and bind tightest to the atom,
    // so the operator closest to the atom (encountered last) wraps first.
    for op in ops.into_iter().rev() {
        e = Expr {
            loc: loc.clone(),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(e),
            },
        };
    }
    Ok(e)
}

fn parse_atom(pair: Pair<Rule>, pre: &Preprocessed) -> Result<Expr, ParseError> {
    let loc = loc_of(&pair, pre);
    let inner = pair.into_inner().next().expect("atom always wraps one alternative");
    let kind = match inner.as_rule() {
        Rule::cast => {
            let mut ii = inner.into_inner();
            let type_ref = parse_type_ref(ii.next().expect("cast: type"), pre);
            let operand = parse_unary_atom(ii.next().expect("cast: operand"), pre)?;
            ExprKind::Cast {
                type_ref,
                expr: Box::new(operand),
            }
        }
        // Parentheses are pure grouping; the inner expression's own
        // location and node stand in for this one, no wrapper needed.
        Rule::paren => {
            let e = inner.into_inner().next().expect("paren: inner expr");
            return parse_expr(e, pre);
        }
        Rule::call => {
            let (name, args) = parse_call(inner, pre)?;
            ExprKind::Call { name, args }
        }
        Rule::path => ExprKind::Path(parse_path(inner, pre)?),
        Rule::number => ExprKind::Number(parse_number(inner.as_str(), &loc)?),
        Rule::string => ExprKind::Str(parse_string_literal(inner.as_str())),
        r => unreachable!("unexpected atom alternative {:?}", r),
    };
    Ok(Expr { loc, kind })
}

fn parse_number(s: &str, loc: &Location) -> Result<i64, ParseError> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => s.parse::<i64>(),
    };
    parsed.map_err(|_| ParseError {
        location: loc.clone(),
        found: s.to_owned(),
        near: " (integer literal out of range)".into(),
    })
}

fn parse_string_literal(s: &str) -> String {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess;
    use std::fs;
    use std::path::PathBuf;

    fn parse_source(src: &str) -> Block {
        let dir = std::env::temp_dir().join(format!("bintpl-parse-{}-{}", std::process::id(), src.len()));
        fs::create_dir_all(&dir).unwrap();
        let path: PathBuf = dir.join("t.bt");
        fs::write(&path, src).unwrap();
        let pre = preprocess::process(&path).unwrap();
        parse(&pre).unwrap()
    }

    #[test]
    fn parses_a_primitive_declaration() {
        let block = parse_source("int x;\n");
        assert_eq!(block.0.len(), 1);
        match &block.0[0].kind {
            StmtKind::VarDefn(v) => {
                assert_eq!(v.name, "x");
                assert!(matches!(v.type_ref, TypeRef::Named(ref n) if n == "int"));
            }
            other => panic!("expected a VarDefn, got {:?}", other),
        }
    }

    #[test]
    fn precedence_survives_parsing() {
        let block = parse_source("local int r = 1 + 2 * 3;\n");
        match &block.0[0].kind {
            StmtKind::LocalVarDefn(lv) => {
                let init = lv.init.as_ref().unwrap();
                match &init.kind {
                    ExprKind::Binary { op: BinOp::Add, rhs, .. } => {
                        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
                    }
                    other => panic!("expected a top-level addition, got {:?}", other),
                }
            }
            other => panic!("expected a LocalVarDefn, got {:?}", other),
        }
    }

    #[test]
    fn if_else_if_else_chain() {
        let block = parse_source("if (1) { } else if (2) { } else { }\n");
        match &block.0[0].kind {
            StmtKind::If { else_ifs, else_branch, .. } => {
                assert_eq!(else_ifs.len(), 1);
                assert!(else_branch.is_some());
            }
            other => panic!("expected an If, got {:?}", other),
        }
    }

    #[test]
    fn for_loop_with_all_clauses() {
        let block = parse_source("for (local int i = 0; i < 10; i = i + 1) { }\n");
        match &block.0[0].kind {
            StmtKind::For { init, cond, step, .. } => {
                assert!(init.is_some());
                assert!(cond.is_some());
                assert!(step.is_some());
            }
            other => panic!("expected a For, got {:?}", other),
        }
    }

    #[test]
    fn while_loop_lowers_to_for() {
        let block = parse_source("while (1) { }\n");
        match &block.0[0].kind {
            StmtKind::For { init, step, .. } => {
                assert!(init.is_none());
                assert!(step.is_none());
            }
            other => panic!("expected a For, got {:?}", other),
        }
    }

    #[test]
    fn array_declaration() {
        let block = parse_source("uchar data[4];\n");
        match &block.0[0].kind {
            StmtKind::VarDefn(v) => assert!(v.array_len.is_some()),
            other => panic!("expected a VarDefn, got {:?}", other),
        }
    }

    #[test]
    fn cast_is_captured_as_a_node() {
        let block = parse_source("local int x = (int) 5;\n");
        match &block.0[0].kind {
            StmtKind::LocalVarDefn(lv) => {
                assert!(matches!(lv.init.as_ref().unwrap().kind, ExprKind::Cast { .. }));
            }
            other => panic!("expected a LocalVarDefn, got {:?}", other),
        }
    }
}
