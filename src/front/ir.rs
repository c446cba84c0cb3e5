//! AST 到 Koopa IR 的下降
//!
//! 数组一律以扁平形式进入 IR：`int a[d0]..[dk-1]` 降为
//! `alloc [i32, d0*..*dk-1]`，数组形参降为 `*i32`，
//! 下标访问由前端折算成扁平偏移（见 expr_ir）。
//! 标量常量在编译期折叠，完全不占用 IR 存储。

pub mod const_eval;
pub mod context;
pub mod expr_ir;
pub mod init;
pub mod scope;
pub mod stmt_ir;

use koopa::ir::builder_traits::*;
use koopa::ir::{FunctionData, Type, Value};

use crate::front::ast::*;
use crate::front::ir::const_eval::{eval_const_expr, eval_dims};
use crate::front::ir::expr_ir::*;
use crate::front::ir::init::{flatten, total_len, InitLike};
use crate::front::ir::scope::{Symbol, SymbolType};
use crate::front::ir::stmt_ir::*;
use crate::CompilerError;

pub use crate::front::ir::context::IrContext;

pub trait GenerateIR {
    type Output;
    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError>;
}

impl GenerateIR for CompUnit {
    type Output = ();

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        declare_library_functions(ctx)?;
        // 顶层条目按源顺序处理，先用后声明是错误
        for item in &self.items {
            match item {
                TopItem::Decl(decl) => decl.generate_ir(ctx)?,
                TopItem::Func(func) => func.generate_ir(ctx)?,
            }
        }
        Ok(())
    }
}

/// SysY 库函数在 CompUnit 开头统一声明并注册进全局作用域
fn declare_library_functions(ctx: &mut IrContext) -> Result<(), CompilerError> {
    let i32_ty = Type::get_i32;
    let i32_ptr = || Type::get_pointer(Type::get_i32());
    let decls: [(&str, Vec<Type>, Type, BType); 8] = [
        ("getint", vec![], i32_ty(), BType::Int),
        ("getch", vec![], i32_ty(), BType::Int),
        ("getarray", vec![i32_ptr()], i32_ty(), BType::Int),
        ("putint", vec![i32_ty()], Type::get_unit(), BType::Void),
        ("putch", vec![i32_ty()], Type::get_unit(), BType::Void),
        (
            "putarray",
            vec![i32_ty(), i32_ptr()],
            Type::get_unit(),
            BType::Void,
        ),
        ("starttime", vec![], Type::get_unit(), BType::Void),
        ("stoptime", vec![], Type::get_unit(), BType::Void),
    ];
    for (name, param_tys, ret_ty, ret_data) in decls {
        let data = FunctionData::new_decl(format!("@{}", name), param_tys, ret_ty);
        let func = ctx.program.new_func(data);
        ctx.scopes.declare(Symbol::func(name, func, ret_data))?;
    }
    Ok(())
}

impl GenerateIR for FuncDef {
    type Output = ();

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        // 形参类型：标量是 i32，数组形参是 *i32（扁平表示），
        // 省略的首维在符号的维度表里记 0
        let mut param_tys = Vec::with_capacity(self.params.len());
        let mut param_dims = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match &param.dims {
                Some(sub_dims) => {
                    let mut dims = vec![0];
                    dims.extend(eval_dims(sub_dims, &ctx.scopes)?);
                    param_tys.push(Type::get_pointer(Type::get_i32()));
                    param_dims.push(dims);
                }
                None => {
                    param_tys.push(Type::get_i32());
                    param_dims.push(Vec::new());
                }
            }
        }
        let ret_ty = match self.ret_ty {
            BType::Int => Type::get_i32(),
            BType::Void => Type::get_unit(),
        };

        let data = FunctionData::new(format!("@{}", self.name), param_tys, ret_ty);
        let func = ctx.program.new_func(data);
        ctx.scopes.declare(Symbol::func(&self.name, func, self.ret_ty))?;

        ctx.current_func = Some(func);
        ctx.current_ret_ty = Some(self.ret_ty);
        ctx.reset_function_state();

        let entry = ctx.new_bb("entry")?;
        ctx.enter_bb(entry)?;
        ctx.entry_bb = Some(entry);

        // 形参与函数体共用一个作用域
        ctx.scopes.enter_scope();
        let param_values: Vec<Value> = ctx.program.func(func).params().to_vec();
        for ((param, dims), &value) in self.params.iter().zip(param_dims).zip(&param_values) {
            let (sym_ty, alloc_ty) = if param.dims.is_some() {
                (SymbolType::IntPtr, Type::get_pointer(Type::get_i32()))
            } else {
                (SymbolType::Int, Type::get_i32())
            };
            let unique = ctx
                .scopes
                .declare(Symbol::var(&param.name, sym_ty, dims, false))
                .map_err(|e| at_span(e, ctx, param.span))?;
            let alloc = ctx.dfg_mut()?.new_value().alloc(alloc_ty);
            ctx.dfg_mut()?
                .set_value_name(alloc, Some(format!("@{}", unique)));
            ctx.push_inst(alloc)?;
            let store = ctx.dfg_mut()?.new_value().store(value, alloc);
            ctx.push_inst(store)?;
            ctx.scopes.bind_value(&param.name, alloc)?;
        }

        let terminated = generate_block_items_ir(&self.body, ctx)?;
        // 控制流落出函数末尾时按返回类型补上 ret
        if !terminated {
            let ret = match self.ret_ty {
                BType::Int => {
                    let zero = ctx.dfg_mut()?.new_value().integer(0);
                    ctx.dfg_mut()?.new_value().ret(Some(zero))
                }
                BType::Void => ctx.dfg_mut()?.new_value().ret(None),
            };
            ctx.push_inst(ret)?;
        }

        ctx.scopes.exit_scope()?;
        ctx.current_func = None;
        ctx.current_bb = None;
        ctx.entry_bb = None;
        ctx.current_ret_ty = None;
        Ok(())
    }
}

/// 给作用域错误补上位置信息
fn at_span(err: CompilerError, ctx: &IrContext, span: Span) -> CompilerError {
    match err {
        CompilerError::ScopeError(msg) => {
            CompilerError::ScopeError(format!("{}{}", msg, ctx.location(span)))
        }
        other => other,
    }
}

impl GenerateIR for Decl {
    type Output = ();

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        match self {
            Decl::Const(decl) => decl.generate_ir(ctx),
            Decl::Var(decl) => decl.generate_ir(ctx),
        }
    }
}

impl GenerateIR for ConstDecl {
    type Output = ();

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        for def in &self.defs {
            if def.dims.is_empty() {
                // 标量常量：编译期折叠，只进符号表
                let expr = def.init.as_single().ok_or_else(|| {
                    CompilerError::ShapeError(format!(
                        "braces around scalar initializer for `{}`{}",
                        def.name,
                        ctx.location(def.span)
                    ))
                })?;
                let value = eval_const_expr(expr, &ctx.scopes)?;
                ctx.scopes
                    .declare(Symbol::const_int(&def.name, value))
                    .map_err(|e| at_span(e, ctx, def.span))?;
            } else {
                let dims = eval_dims(&def.dims, &ctx.scopes)?;
                let slots = flatten(&def.init, &dims)?;
                let mut values = Vec::with_capacity(slots.len());
                for slot in &slots {
                    values.push(match slot {
                        Some(expr) => eval_const_expr(expr, &ctx.scopes)?,
                        None => 0,
                    });
                }
                define_const_array(def, dims, values, ctx)?;
            }
        }
        Ok(())
    }
}

fn define_const_array(
    def: &ConstDef,
    dims: Vec<i32>,
    values: Vec<i32>,
    ctx: &mut IrContext,
) -> Result<(), CompilerError> {
    let total = total_len(&dims);
    let array_ty = Type::get_array(Type::get_i32(), total);
    let unique = ctx
        .scopes
        .declare(Symbol::var(&def.name, SymbolType::Int, dims, true))
        .map_err(|e| at_span(e, ctx, def.span))?;
    if ctx.scopes.is_global_scope() {
        let elems: Vec<Value> = values
            .iter()
            .map(|&v| ctx.program.new_value().integer(v))
            .collect();
        let init = ctx.program.new_value().aggregate(elems);
        let alloc = ctx.program.new_value().global_alloc(init);
        ctx.program
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.scopes.bind_value(&def.name, alloc)?;
    } else {
        let alloc = ctx.dfg_mut()?.new_value().alloc(array_ty);
        ctx.dfg_mut()?
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.push_inst(alloc)?;
        ctx.scopes.bind_value(&def.name, alloc)?;
        // 局部常量数组逐元素写入折叠好的值
        for (i, &v) in values.iter().enumerate() {
            let idx = ctx.dfg_mut()?.new_value().integer(i as i32);
            let ptr = ctx.dfg_mut()?.new_value().get_elem_ptr(alloc, idx);
            ctx.push_inst(ptr)?;
            let value = ctx.dfg_mut()?.new_value().integer(v);
            let store = ctx.dfg_mut()?.new_value().store(value, ptr);
            ctx.push_inst(store)?;
        }
    }
    Ok(())
}

impl GenerateIR for VarDecl {
    type Output = ();

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        // 文法接受 void 作为基础类型，这里统一拒绝
        if self.ty == BType::Void {
            return Err(CompilerError::ScopeError(format!(
                "variables cannot have type void{}",
                ctx.location(self.span)
            )));
        }
        for def in &self.defs {
            if def.dims.is_empty() {
                define_scalar_var(def, ctx)?;
            } else {
                define_array_var(def, ctx)?;
            }
        }
        Ok(())
    }
}

fn define_scalar_var(def: &VarDef, ctx: &mut IrContext) -> Result<(), CompilerError> {
    let init_expr = match &def.init {
        Some(InitVal::Expr(expr)) => Some(expr),
        Some(InitVal::List(_)) => {
            return Err(CompilerError::ShapeError(format!(
                "braces around scalar initializer for `{}`{}",
                def.name,
                ctx.location(def.span)
            )));
        }
        None => None,
    };
    let unique = ctx
        .scopes
        .declare(Symbol::var(&def.name, SymbolType::Int, Vec::new(), false))
        .map_err(|e| at_span(e, ctx, def.span))?;
    if ctx.scopes.is_global_scope() {
        // 全局变量的初始值必须是常量
        let init = match init_expr {
            Some(expr) => {
                let v = eval_const_expr(expr, &ctx.scopes)?;
                ctx.program.new_value().integer(v)
            }
            None => ctx.program.new_value().zero_init(Type::get_i32()),
        };
        let alloc = ctx.program.new_value().global_alloc(init);
        ctx.program
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.scopes.bind_value(&def.name, alloc)?;
    } else {
        let alloc = ctx.dfg_mut()?.new_value().alloc(Type::get_i32());
        ctx.dfg_mut()?
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.push_inst(alloc)?;
        ctx.scopes.bind_value(&def.name, alloc)?;
        if let Some(expr) = init_expr {
            let value = expr.generate_ir(ctx)?;
            let store = ctx.dfg_mut()?.new_value().store(value, alloc);
            ctx.push_inst(store)?;
        }
    }
    Ok(())
}

fn define_array_var(def: &VarDef, ctx: &mut IrContext) -> Result<(), CompilerError> {
    let dims = eval_dims(&def.dims, &ctx.scopes)?;
    let total = total_len(&dims);
    let array_ty = Type::get_array(Type::get_i32(), total);
    if ctx.scopes.is_global_scope() {
        // 全局数组：有初始化列表就折叠成聚合，否则 zeroinit
        let init = match &def.init {
            Some(init) => {
                let slots = flatten(init, &dims)?;
                let mut elems = Vec::with_capacity(slots.len());
                for slot in &slots {
                    let v = match slot {
                        Some(expr) => eval_const_expr(expr, &ctx.scopes)?,
                        None => 0,
                    };
                    elems.push(ctx.program.new_value().integer(v));
                }
                ctx.program.new_value().aggregate(elems)
            }
            None => ctx.program.new_value().zero_init(array_ty),
        };
        let unique = ctx
            .scopes
            .declare(Symbol::var(&def.name, SymbolType::Int, dims, false))
            .map_err(|e| at_span(e, ctx, def.span))?;
        let alloc = ctx.program.new_value().global_alloc(init);
        ctx.program
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.scopes.bind_value(&def.name, alloc)?;
    } else {
        let unique = ctx
            .scopes
            .declare(Symbol::var(&def.name, SymbolType::Int, dims.clone(), false))
            .map_err(|e| at_span(e, ctx, def.span))?;
        let alloc = ctx.dfg_mut()?.new_value().alloc(array_ty);
        ctx.dfg_mut()?
            .set_value_name(alloc, Some(format!("@{}", unique)));
        ctx.push_inst(alloc)?;
        ctx.scopes.bind_value(&def.name, alloc)?;
        if let Some(init) = &def.init {
            // 局部数组：逐元素 store，未提及的槽位补 0
            let slots = flatten(init, &dims)?;
            for (i, slot) in slots.iter().enumerate() {
                let idx = ctx.dfg_mut()?.new_value().integer(i as i32);
                let ptr = ctx.dfg_mut()?.new_value().get_elem_ptr(alloc, idx);
                ctx.push_inst(ptr)?;
                let value = match slot {
                    Some(expr) => expr.generate_ir(ctx)?,
                    None => ctx.dfg_mut()?.new_value().integer(0),
                };
                let store = ctx.dfg_mut()?.new_value().store(value, ptr);
                ctx.push_inst(store)?;
            }
        }
    }
    Ok(())
}

impl GenerateIR for Stmt {
    type Output = bool;

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        match self {
            Stmt::Return(expr) => generate_return_stmt_ir(expr, ctx),
            Stmt::Assign(lval, expr) => generate_assign_stmt_ir(lval, expr, ctx),
            Stmt::Block(block) => generate_block_stmt_ir(block, ctx),
            Stmt::Expr(expr) => generate_expr_stmt_ir(expr, ctx),
            Stmt::If(cond, then_stmt, else_stmt, _) => {
                generate_if_stmt_ir(cond, then_stmt, else_stmt.as_deref(), ctx)
            }
            Stmt::While(cond, body, _) => generate_while_stmt_ir(cond, body, ctx),
            Stmt::Break(span) => generate_break_stmt_ir(span, ctx),
            Stmt::Continue(span) => generate_continue_stmt_ir(span, ctx),
        }
    }
}

impl GenerateIR for Expr {
    type Output = Value;

    fn generate_ir(&self, ctx: &mut IrContext) -> Result<Self::Output, CompilerError> {
        match self {
            Expr::Number(n, _) => Ok(ctx.dfg_mut()?.new_value().integer(*n)),
            Expr::LVal(lval) => generate_lval_ir(lval, ctx),
            Expr::Unary(op, expr, _) => generate_unary_op_ir(op, expr, ctx),
            // && 和 || 走短路控制流，其余二元算符直接一条指令
            Expr::Binary(op, lhs, rhs, _) => match op {
                BinOp::And => generate_land_op_ir(lhs, rhs, ctx),
                BinOp::Or => generate_lor_op_ir(lhs, rhs, ctx),
                _ => generate_binary_op_ir(op, lhs, rhs, ctx),
            },
            Expr::Call(name, args, span) => generate_call_ir(name, args, *span, ctx),
        }
    }
}
