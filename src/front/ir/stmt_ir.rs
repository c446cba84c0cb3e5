//! 语句的 IR 生成
//!
//! 每个语句返回它是否终结了当前控制流（return/break/continue 一定终结），
//! 块在第一个终结语句后停止迭代。只有在相应分支没有终结时才补 jump，
//! if/else 两边都终结时不再物化汇合块。
//! 循环外的 break/continue 是内部不变量一类的致命错误（InvariantError），
//! 与可诊断的作用域错误分开归类。

use koopa::ir::builder_traits::*;

use crate::front::ast::*;
use crate::front::ir::expr_ir::{element_ptr, lookup_symbol};
use crate::front::ir::scope::SymbolKind;
use crate::front::ir::{GenerateIR, IrContext};
use crate::CompilerError;

pub fn generate_return_stmt_ir(
    expr: &Option<Expr>,
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    let ret_ty = ctx.current_ret_ty.ok_or_else(|| {
        CompilerError::InvariantError("return statement outside of any function".to_string())
    })?;
    let ret_val = match (ret_ty, expr) {
        (BType::Int, Some(e)) => Some(e.generate_ir(ctx)?),
        // int 函数的裸 return 与落出函数末尾同样处理为 ret 0
        (BType::Int, None) => Some(ctx.dfg_mut()?.new_value().integer(0)),
        (BType::Void, None) => None,
        (BType::Void, Some(e)) => {
            return Err(CompilerError::ScopeError(format!(
                "returning a value from a void function{}",
                ctx.location(e.span())
            )));
        }
    };
    let ret = ctx.dfg_mut()?.new_value().ret(ret_val);
    ctx.push_inst(ret)?;
    Ok(true)
}

pub fn generate_assign_stmt_ir(
    lval: &LVal,
    expr: &Expr,
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    let rhs = expr.generate_ir(ctx)?;
    let sym = lookup_symbol(ctx, &lval.name, lval.span)?;
    if sym.kind == SymbolKind::Func {
        return Err(CompilerError::ScopeError(format!(
            "cannot assign to function `{}`{}",
            lval.name,
            ctx.location(lval.span)
        )));
    }
    if sym.is_const {
        return Err(CompilerError::ScopeError(format!(
            "cannot assign to constant `{}`{}",
            lval.name,
            ctx.location(lval.span)
        )));
    }
    let dest = if sym.is_array() {
        // 赋值目标必须是标量元素，下标个数要与维数一致
        if lval.indices.len() != sym.dims.len() {
            return Err(CompilerError::ScopeError(format!(
                "`{}` needs {} index(es) to name an element, got {}{}",
                lval.name,
                sym.dims.len(),
                lval.indices.len(),
                ctx.location(lval.span)
            )));
        }
        element_ptr(&sym, &lval.indices, ctx)?
    } else {
        if !lval.indices.is_empty() {
            return Err(CompilerError::ScopeError(format!(
                "`{}` is not an array{}",
                lval.name,
                ctx.location(lval.span)
            )));
        }
        sym.value.ok_or_else(|| {
            CompilerError::InvariantError(format!(
                "variable `{}` has no storage bound",
                lval.name
            ))
        })?
    };
    let store = ctx.dfg_mut()?.new_value().store(rhs, dest);
    ctx.push_inst(store)?;
    Ok(false)
}

pub fn generate_block_stmt_ir(block: &Block, ctx: &mut IrContext) -> Result<bool, CompilerError> {
    ctx.scopes.enter_scope();
    let terminated = generate_block_items_ir(block, ctx)?;
    ctx.scopes.exit_scope()?;
    Ok(terminated)
}

/// 依次生成块内条目；一旦有语句终结控制流就停止
pub fn generate_block_items_ir(
    items: &[BlockItem],
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    for item in items {
        match item {
            BlockItem::Decl(decl) => {
                decl.generate_ir(ctx)?;
            }
            BlockItem::Stmt(stmt) => {
                if stmt.generate_ir(ctx)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

pub fn generate_expr_stmt_ir(
    expr: &Option<Expr>,
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    if let Some(e) = expr {
        e.generate_ir(ctx)?;
    }
    Ok(false)
}

pub fn generate_if_stmt_ir(
    cond: &Expr,
    then_stmt: &Stmt,
    else_stmt: Option<&Stmt>,
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    let i = ctx.if_count;
    ctx.if_count += 1;
    let cond_val = cond.generate_ir(ctx)?;

    let then_bb = ctx.new_bb(&format!("then_{}", i))?;
    match else_stmt {
        None => {
            let end_bb = ctx.new_bb(&format!("if_end_{}", i))?;
            let br = ctx.dfg_mut()?.new_value().branch(cond_val, then_bb, end_bb);
            ctx.push_inst(br)?;

            ctx.enter_bb(then_bb)?;
            if !then_stmt.generate_ir(ctx)? {
                let tail = ctx.get_current_bb()?;
                let jump = ctx.dfg_mut()?.new_value().jump(end_bb);
                ctx.push_inst_to(tail, jump)?;
            }
            ctx.enter_bb(end_bb)?;
            Ok(false)
        }
        Some(else_stmt) => {
            let else_bb = ctx.new_bb(&format!("else_{}", i))?;
            let br = ctx.dfg_mut()?.new_value().branch(cond_val, then_bb, else_bb);
            ctx.push_inst(br)?;

            ctx.enter_bb(then_bb)?;
            let then_done = then_stmt.generate_ir(ctx)?;
            let then_tail = ctx.get_current_bb()?;

            ctx.enter_bb(else_bb)?;
            let else_done = else_stmt.generate_ir(ctx)?;
            let else_tail = ctx.get_current_bb()?;

            // 两边都终结时不物化汇合块，整个 if 语句就是终结的
            if then_done && else_done {
                return Ok(true);
            }
            let end_bb = ctx.new_bb(&format!("if_end_{}", i))?;
            if !then_done {
                let jump = ctx.dfg_mut()?.new_value().jump(end_bb);
                ctx.push_inst_to(then_tail, jump)?;
            }
            if !else_done {
                let jump = ctx.dfg_mut()?.new_value().jump(end_bb);
                ctx.push_inst_to(else_tail, jump)?;
            }
            ctx.enter_bb(end_bb)?;
            Ok(false)
        }
    }
}

pub fn generate_while_stmt_ir(
    cond: &Expr,
    body: &Stmt,
    ctx: &mut IrContext,
) -> Result<bool, CompilerError> {
    let i = ctx.while_count;
    ctx.while_count += 1;
    let entry_bb = ctx.new_bb(&format!("while_entry_{}", i))?;
    let body_bb = ctx.new_bb(&format!("while_body_{}", i))?;
    let end_bb = ctx.new_bb(&format!("while_end_{}", i))?;

    let jump = ctx.dfg_mut()?.new_value().jump(entry_bb);
    ctx.push_inst(jump)?;

    // 条件块：continue 也跳回这里
    ctx.enter_bb(entry_bb)?;
    let cond_val = cond.generate_ir(ctx)?;
    let br = ctx.dfg_mut()?.new_value().branch(cond_val, body_bb, end_bb);
    ctx.push_inst(br)?;

    ctx.enter_bb(body_bb)?;
    ctx.scopes.enter_loop(entry_bb, end_bb);
    let body_done = body.generate_ir(ctx)?;
    ctx.scopes.exit_loop()?;
    if !body_done {
        let tail = ctx.get_current_bb()?;
        let jump = ctx.dfg_mut()?.new_value().jump(entry_bb);
        ctx.push_inst_to(tail, jump)?;
    }

    ctx.enter_bb(end_bb)?;
    Ok(false)
}

pub fn generate_break_stmt_ir(span: &Span, ctx: &mut IrContext) -> Result<bool, CompilerError> {
    let target = ctx.scopes.current_break().ok_or_else(|| {
        CompilerError::InvariantError(format!(
            "`break` outside of a loop{}",
            ctx.location(*span)
        ))
    })?;
    let jump = ctx.dfg_mut()?.new_value().jump(target);
    ctx.push_inst(jump)?;
    Ok(true)
}

pub fn generate_continue_stmt_ir(span: &Span, ctx: &mut IrContext) -> Result<bool, CompilerError> {
    let target = ctx.scopes.current_continue().ok_or_else(|| {
        CompilerError::InvariantError(format!(
            "`continue` outside of a loop{}",
            ctx.location(*span)
        ))
    })?;
    let jump = ctx.dfg_mut()?.new_value().jump(target);
    ctx.push_inst(jump)?;
    Ok(true)
}
