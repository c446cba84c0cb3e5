//! 表达式的 IR 生成
//!
//! 整数字面量直接作为操作数，不产生指令；算术/比较各产生一条指令。
//! 数组访问走扁平寻址：数组在 IR 里是一维的 `[i32, n]`，
//! 前端用右累积步长算出扁平偏移，固定数组一条 getelemptr，
//! 数组形参先 load 出指针再一条 getptr。

use koopa::ir::builder_traits::*;
use koopa::ir::{BinaryOp as IrBinaryOp, Type, TypeKind, Value};

use crate::front::ast::*;
use crate::front::ir::scope::{Symbol, SymbolKind};
use crate::front::ir::{GenerateIR, IrContext};
use crate::CompilerError;

pub(crate) fn lookup_symbol(
    ctx: &IrContext,
    name: &str,
    span: Span,
) -> Result<Symbol, CompilerError> {
    ctx.scopes.lookup(name).cloned().ok_or_else(|| {
        CompilerError::ScopeError(format!("`{}` is undefined{}", name, ctx.location(span)))
    })
}

fn push_binary(
    op: IrBinaryOp,
    lhs: Value,
    rhs: Value,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let inst = ctx.dfg_mut()?.new_value().binary(op, lhs, rhs);
    ctx.push_inst(inst)?;
    Ok(inst)
}

/// 扁平偏移 = Σ idx_i * stride_i；stride 是右侧各维的乘积，
/// 为 1 时省掉乘法，多项用 add 累加。没有下标时偏移为字面量 0。
fn flat_offset(
    sym: &Symbol,
    indices: &[Expr],
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let mut acc: Option<Value> = None;
    for (i, idx_expr) in indices.iter().enumerate() {
        let idx = idx_expr.generate_ir(ctx)?;
        let stride: i32 = sym.dims[i + 1..].iter().product();
        let term = if stride > 1 {
            let s = ctx.dfg_mut()?.new_value().integer(stride);
            push_binary(IrBinaryOp::Mul, idx, s, ctx)?
        } else {
            idx
        };
        acc = Some(match acc {
            None => term,
            Some(prev) => push_binary(IrBinaryOp::Add, prev, term, ctx)?,
        });
    }
    match acc {
        Some(v) => Ok(v),
        None => Ok(ctx.dfg_mut()?.new_value().integer(0)),
    }
}

/// 数组元素/子数组的地址。下标数等于维数时指向标量元素，
/// 少于维数（部分索引、整体退化）时就是子数组首元素的指针。
pub(crate) fn element_ptr(
    sym: &Symbol,
    indices: &[Expr],
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let offset = flat_offset(sym, indices, ctx)?;
    let storage = sym.value.ok_or_else(|| {
        CompilerError::InvariantError(format!("array `{}` has no storage bound", sym.name))
    })?;
    if sym.is_array_param() {
        let base = ctx.dfg_mut()?.new_value().load(storage);
        ctx.push_inst(base)?;
        let ptr = ctx.dfg_mut()?.new_value().get_ptr(base, offset);
        ctx.push_inst(ptr)?;
        Ok(ptr)
    } else {
        let ptr = ctx.dfg_mut()?.new_value().get_elem_ptr(storage, offset);
        ctx.push_inst(ptr)?;
        Ok(ptr)
    }
}

/// 表达式位置的左值
pub fn generate_lval_ir(lval: &LVal, ctx: &mut IrContext) -> Result<Value, CompilerError> {
    let sym = lookup_symbol(ctx, &lval.name, lval.span)?;
    if sym.kind == SymbolKind::Func {
        return Err(CompilerError::ScopeError(format!(
            "function `{}` used as a value{}",
            lval.name,
            ctx.location(lval.span)
        )));
    }
    if !sym.is_array() {
        if !lval.indices.is_empty() {
            return Err(CompilerError::ScopeError(format!(
                "`{}` is not an array{}",
                lval.name,
                ctx.location(lval.span)
            )));
        }
        // 标量常量直接代入字面量，不产生指令
        if sym.is_const {
            let value = sym.const_value.ok_or_else(|| {
                CompilerError::InvariantError(format!(
                    "constant `{}` has no folded value",
                    lval.name
                ))
            })?;
            return Ok(ctx.dfg_mut()?.new_value().integer(value));
        }
        let storage = sym.value.ok_or_else(|| {
            CompilerError::InvariantError(format!(
                "variable `{}` has no storage bound",
                lval.name
            ))
        })?;
        let load = ctx.dfg_mut()?.new_value().load(storage);
        ctx.push_inst(load)?;
        return Ok(load);
    }
    if lval.indices.len() > sym.dims.len() {
        return Err(CompilerError::ScopeError(format!(
            "too many indices for `{}`: it has {} dimension(s){}",
            lval.name,
            sym.dims.len(),
            ctx.location(lval.span)
        )));
    }
    let ptr = element_ptr(&sym, &lval.indices, ctx)?;
    if lval.indices.len() == sym.dims.len() {
        let load = ctx.dfg_mut()?.new_value().load(ptr);
        ctx.push_inst(load)?;
        Ok(load)
    } else {
        Ok(ptr)
    }
}

pub fn generate_unary_op_ir(
    op: &UnaryOp,
    expr: &Expr,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let val = expr.generate_ir(ctx)?;
    match op {
        UnaryOp::Pos => Ok(val),
        UnaryOp::Neg => {
            let zero = ctx.dfg_mut()?.new_value().integer(0);
            push_binary(IrBinaryOp::Sub, zero, val, ctx)
        }
        UnaryOp::Not => {
            let zero = ctx.dfg_mut()?.new_value().integer(0);
            push_binary(IrBinaryOp::Eq, zero, val, ctx)
        }
    }
}

/// 算术、比较与相等都走这里；`&&`/`||` 由调用方分流到短路路径
pub fn generate_binary_op_ir(
    op: &BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let l = lhs.generate_ir(ctx)?;
    let r = rhs.generate_ir(ctx)?;
    let op = match op {
        BinOp::Add => IrBinaryOp::Add,
        BinOp::Sub => IrBinaryOp::Sub,
        BinOp::Mul => IrBinaryOp::Mul,
        BinOp::Div => IrBinaryOp::Div,
        BinOp::Mod => IrBinaryOp::Mod,
        BinOp::Lt => IrBinaryOp::Lt,
        BinOp::Gt => IrBinaryOp::Gt,
        BinOp::Le => IrBinaryOp::Le,
        BinOp::Ge => IrBinaryOp::Ge,
        BinOp::Eq => IrBinaryOp::Eq,
        BinOp::Ne => IrBinaryOp::NotEq,
        BinOp::And | BinOp::Or => {
            return Err(CompilerError::InvariantError(
                "short-circuit operator reached direct binary lowering".to_string(),
            ));
        }
    };
    push_binary(op, l, r, ctx)
}

/// 短路与：结果放在一个函数内的整型单元里。
/// 先把布尔化的左操作数存进去；左边为假直接到汇合块，
/// 否则再求右边并覆盖存入。汇合块里 load 单元得到结果。
pub fn generate_land_op_ir(
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let i = ctx.land_count;
    ctx.land_count += 1;
    let cell = ctx.alloc_in_entry(Type::get_i32(), Some(format!("@land_res_{}", i)))?;

    let lhs_val = lhs.generate_ir(ctx)?;
    let zero = ctx.dfg_mut()?.new_value().integer(0);
    let lhs_bool = push_binary(IrBinaryOp::NotEq, zero, lhs_val, ctx)?;
    let store = ctx.dfg_mut()?.new_value().store(lhs_bool, cell);
    ctx.push_inst(store)?;

    let rhs_bb = ctx.new_bb(&format!("land_rhs_{}", i))?;
    let end_bb = ctx.new_bb(&format!("land_end_{}", i))?;
    let br = ctx.dfg_mut()?.new_value().branch(lhs_bool, rhs_bb, end_bb);
    ctx.push_inst(br)?;

    ctx.enter_bb(rhs_bb)?;
    let rhs_val = rhs.generate_ir(ctx)?;
    let zero = ctx.dfg_mut()?.new_value().integer(0);
    let rhs_bool = push_binary(IrBinaryOp::NotEq, zero, rhs_val, ctx)?;
    let store = ctx.dfg_mut()?.new_value().store(rhs_bool, cell);
    ctx.push_inst(store)?;
    let jump = ctx.dfg_mut()?.new_value().jump(end_bb);
    ctx.push_inst(jump)?;

    ctx.enter_bb(end_bb)?;
    let load = ctx.dfg_mut()?.new_value().load(cell);
    ctx.push_inst(load)?;
    Ok(load)
}

/// 短路或：与 land 对称，分支方向相反
pub fn generate_lor_op_ir(
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let i = ctx.lor_count;
    ctx.lor_count += 1;
    let cell = ctx.alloc_in_entry(Type::get_i32(), Some(format!("@lor_res_{}", i)))?;

    let lhs_val = lhs.generate_ir(ctx)?;
    let zero = ctx.dfg_mut()?.new_value().integer(0);
    let lhs_bool = push_binary(IrBinaryOp::NotEq, zero, lhs_val, ctx)?;
    let store = ctx.dfg_mut()?.new_value().store(lhs_bool, cell);
    ctx.push_inst(store)?;

    let rhs_bb = ctx.new_bb(&format!("lor_rhs_{}", i))?;
    let end_bb = ctx.new_bb(&format!("lor_end_{}", i))?;
    let br = ctx.dfg_mut()?.new_value().branch(lhs_bool, end_bb, rhs_bb);
    ctx.push_inst(br)?;

    ctx.enter_bb(rhs_bb)?;
    let rhs_val = rhs.generate_ir(ctx)?;
    let zero = ctx.dfg_mut()?.new_value().integer(0);
    let rhs_bool = push_binary(IrBinaryOp::NotEq, zero, rhs_val, ctx)?;
    let store = ctx.dfg_mut()?.new_value().store(rhs_bool, cell);
    ctx.push_inst(store)?;
    let jump = ctx.dfg_mut()?.new_value().jump(end_bb);
    ctx.push_inst(jump)?;

    ctx.enter_bb(end_bb)?;
    let load = ctx.dfg_mut()?.new_value().load(cell);
    ctx.push_inst(load)?;
    Ok(load)
}

pub fn generate_call_ir(
    name: &str,
    args: &[Expr],
    span: Span,
    ctx: &mut IrContext,
) -> Result<Value, CompilerError> {
    let sym = lookup_symbol(ctx, name, span)?;
    if sym.kind != SymbolKind::Func {
        return Err(CompilerError::ScopeError(format!(
            "`{}` is not a function{}",
            name,
            ctx.location(span)
        )));
    }
    let func = sym.func.ok_or_else(|| {
        CompilerError::InvariantError(format!("function `{}` has no handle", name))
    })?;
    // 形参个数从函数类型上取：库函数声明没有形参 Value
    let param_count = match ctx.program.func(func).ty().kind() {
        TypeKind::Function(params, _) => params.len(),
        _ => {
            return Err(CompilerError::InvariantError(format!(
                "`{}` does not have a function type",
                name
            )));
        }
    };
    if args.len() != param_count {
        return Err(CompilerError::ScopeError(format!(
            "`{}` expects {} argument(s), got {}{}",
            name,
            param_count,
            args.len(),
            ctx.location(span)
        )));
    }
    // 实参从左到右求值
    let mut arg_values = Vec::with_capacity(args.len());
    for arg in args {
        arg_values.push(arg.generate_ir(ctx)?);
    }
    let call = ctx.dfg_mut()?.new_value().call(func, arg_values);
    ctx.push_inst(call)?;
    Ok(call)
}
