//! Koopa IR 指令到 RISC-V 的翻译
//!
//! 没有寄存器分配：每个值都落在栈上，计算时把操作数取进 t0/t1，
//! 结果写回栈槽，t2 只做寻址中转。函数只有一个出口，
//! `ret` 统一翻译成写 a0 后跳到 `<函数名>_end`，
//! 尾声（恢复 ra、回收栈帧）跟在这个标号后面。
//! 块标号形如 `<函数名>_<块名>`，入口块直接复用函数标号。

use koopa::ir::values::{Binary, Branch, Call, GetElemPtr, GetPtr, Jump, Load, Return, Store};
use koopa::ir::{BinaryOp, FunctionData, Program, Type, TypeKind, Value, ValueKind};

use crate::back::context::{Context, Home, ARG_REGS};
use crate::back::frame::plan_frame;
use crate::back::insts::{Instruction, Reg};
use crate::back::utils::{load_reg_with_offset, store_reg_with_offset};
use crate::CompilerError;

pub trait GenerateAsm {
    fn generate(&self, program: &Program, ctx: &mut Context) -> Result<(), CompilerError>;
}

impl GenerateAsm for Program {
    fn generate(&self, program: &Program, ctx: &mut Context) -> Result<(), CompilerError> {
        // 先生成全局变量的 .data 段
        for &value in self.inst_layout() {
            generate_global_alloc(value, program, ctx)?;
        }
        // 再按布局顺序生成函数；库函数声明没有基本块，跳过
        for &func in self.func_layout() {
            let func_data = self.func(func);
            if func_data.layout().entry_bb().is_none() {
                continue;
            }
            func_data.generate(program, ctx)?;
        }
        Ok(())
    }
}

fn generate_global_alloc(
    value: Value,
    program: &Program,
    ctx: &mut Context,
) -> Result<(), CompilerError> {
    let (name, init) = {
        let data = program.borrow_value(value);
        let init = match data.kind() {
            ValueKind::GlobalAlloc(alloc) => alloc.init(),
            _ => return Ok(()),
        };
        let name = data
            .name()
            .as_ref()
            .ok_or_else(|| {
                CompilerError::CodeGenError(format!("global value {:?} has no name", value))
            })?[1..]
            .to_string();
        (name, init)
    };
    ctx.globals.insert(value, name.clone());
    ctx.program.push(Instruction::Section(".data".to_string()));
    ctx.program.push(Instruction::Global(name.clone()));
    ctx.program.push(Instruction::Label(name));
    emit_global_init(init, program, ctx)
}

fn emit_global_init(
    value: Value,
    program: &Program,
    ctx: &mut Context,
) -> Result<(), CompilerError> {
    let data = program.borrow_value(value);
    match data.kind() {
        ValueKind::Integer(i) => {
            ctx.program.push(Instruction::Word(i.value()));
            Ok(())
        }
        ValueKind::ZeroInit(_) => {
            ctx.program.push(Instruction::Zero(data.ty().size() as i32));
            Ok(())
        }
        ValueKind::Aggregate(agg) => {
            for &elem in agg.elems() {
                emit_global_init(elem, program, ctx)?;
            }
            Ok(())
        }
        other => Err(CompilerError::CodeGenError(format!(
            "unsupported global initializer: {:?}",
            other
        ))),
    }
}

impl GenerateAsm for FunctionData {
    fn generate(&self, program: &Program, ctx: &mut Context) -> Result<(), CompilerError> {
        let name = &self.name()[1..];
        ctx.reset_for_function(name);
        ctx.program.push(Instruction::Section(".text".to_string()));
        ctx.program.push(Instruction::Global(name.to_string()));
        ctx.program.push(Instruction::Label(name.to_string()));

        plan_frame(self, ctx)?;

        // 基本块 -> 标号；入口块不再单发标号，复用函数标号
        let mut bb_index = 0;
        for (bb, _node) in self.layout().bbs() {
            let label = if bb_index == 0 {
                name.to_string()
            } else {
                match self.dfg().bb(*bb).name() {
                    Some(bb_name) => format!("{}_{}", name, &bb_name[1..]),
                    None => format!("{}_bb{}", name, bb_index),
                }
            };
            ctx.bb_labels.insert(*bb, label);
            bb_index += 1;
        }

        // 序言：开栈帧，有 call 再保存 ra
        if ctx.stack_size > 0 {
            ctx.update_stack_pointer(-ctx.stack_size);
        }
        if ctx.has_call {
            store_reg_with_offset(ctx, Reg::Ra, ctx.ra_offset, Reg::T0);
        }

        let mut bb_index = 0;
        for (bb, node) in self.layout().bbs() {
            if bb_index > 0 {
                let label = ctx.bb_label(*bb)?;
                ctx.program.push(Instruction::Label(label));
            }
            bb_index += 1;
            for &inst in node.insts().keys() {
                generate_inst(self, program, ctx, inst)?;
            }
        }

        // 尾声：唯一出口
        ctx.program.push(Instruction::Label(ctx.end_label()));
        if ctx.has_call {
            load_reg_with_offset(ctx, Reg::Ra, ctx.ra_offset, Reg::T0);
        }
        if ctx.stack_size > 0 {
            ctx.update_stack_pointer(ctx.stack_size);
        }
        ctx.program.push(Instruction::Ret);
        Ok(())
    }
}

fn generate_inst(
    func: &FunctionData,
    program: &Program,
    ctx: &mut Context,
    inst: Value,
) -> Result<(), CompilerError> {
    match func.dfg().value(inst).kind() {
        // 空间在栈帧规划时已经保留
        ValueKind::Alloc(_) => Ok(()),
        ValueKind::Load(load) => generate_load(func, ctx, load, inst),
        ValueKind::Store(store) => generate_store(func, ctx, store),
        ValueKind::Binary(binary) => generate_binary(func, ctx, binary, inst),
        ValueKind::Branch(branch) => generate_branch(func, ctx, branch),
        ValueKind::Jump(jump) => generate_jump(ctx, jump),
        ValueKind::Call(call) => generate_call(func, program, ctx, call, inst),
        ValueKind::GetElemPtr(gep) => generate_get_elem_ptr(func, program, ctx, gep, inst),
        ValueKind::GetPtr(gp) => generate_get_ptr(func, ctx, gp, inst),
        ValueKind::Return(ret) => generate_return(func, ctx, ret),
        other => Err(CompilerError::CodeGenError(format!(
            "unsupported instruction kind: {:?}",
            other
        ))),
    }
}

/// 把一个标量操作数取进 dest：
/// 立即数用 li，形参按惰性确定的 home 取 mv 或越帧 lw，其余从栈槽 lw。
fn load_operand(
    func: &FunctionData,
    ctx: &mut Context,
    value: Value,
    dest: Reg,
) -> Result<(), CompilerError> {
    if let ValueKind::Integer(i) = func.dfg().value(value).kind() {
        ctx.program.push(Instruction::Li(dest, i.value()));
        return Ok(());
    }
    match ctx.home_of(value, func)? {
        Home::Reg(src) => {
            if src != dest {
                ctx.program.push(Instruction::Mv(dest, src));
            }
        }
        Home::Stack(offset) => load_reg_with_offset(ctx, dest, offset, Reg::T2),
        Home::Global(name) => {
            ctx.program.push(Instruction::La(dest, name));
            ctx.program.push(Instruction::Lw(dest, 0, dest));
        }
    }
    Ok(())
}

/// 指令结果写回自己的栈槽
fn store_result(
    func: &FunctionData,
    ctx: &mut Context,
    inst: Value,
    src: Reg,
    temp: Reg,
) -> Result<(), CompilerError> {
    match ctx.home_of(inst, func)? {
        Home::Stack(offset) => {
            store_reg_with_offset(ctx, src, offset, temp);
            Ok(())
        }
        other => Err(CompilerError::CodeGenError(format!(
            "instruction result must live on the stack, got {:?}",
            other
        ))),
    }
}

fn generate_load(
    func: &FunctionData,
    ctx: &mut Context,
    load: &Load,
    inst: Value,
) -> Result<(), CompilerError> {
    let src = load.src();
    if let Some(name) = ctx.globals.get(&src).cloned() {
        ctx.program.push(Instruction::La(Reg::T0, name));
        ctx.program.push(Instruction::Lw(Reg::T0, 0, Reg::T0));
    } else if let ValueKind::Alloc(_) = func.dfg().value(src).kind() {
        // alloc 的栈槽就是变量本体
        match ctx.home_of(src, func)? {
            Home::Stack(offset) => load_reg_with_offset(ctx, Reg::T0, offset, Reg::T2),
            other => {
                return Err(CompilerError::CodeGenError(format!(
                    "alloc must live on the stack, got {:?}",
                    other
                )));
            }
        }
    } else {
        // 栈槽里存的是指针（getelemptr/getptr 的结果），先取指针再解引用
        load_operand(func, ctx, src, Reg::T0)?;
        ctx.program.push(Instruction::Lw(Reg::T0, 0, Reg::T0));
    }
    store_result(func, ctx, inst, Reg::T0, Reg::T1)
}

fn generate_store(
    func: &FunctionData,
    ctx: &mut Context,
    store: &Store,
) -> Result<(), CompilerError> {
    load_operand(func, ctx, store.value(), Reg::T0)?;
    let dest = store.dest();
    if let Some(name) = ctx.globals.get(&dest).cloned() {
        ctx.program.push(Instruction::La(Reg::T1, name));
        ctx.program.push(Instruction::Sw(Reg::T0, 0, Reg::T1));
    } else if let ValueKind::Alloc(_) = func.dfg().value(dest).kind() {
        match ctx.home_of(dest, func)? {
            Home::Stack(offset) => store_reg_with_offset(ctx, Reg::T0, offset, Reg::T1),
            other => {
                return Err(CompilerError::CodeGenError(format!(
                    "alloc must live on the stack, got {:?}",
                    other
                )));
            }
        }
    } else {
        load_operand(func, ctx, dest, Reg::T1)?;
        ctx.program.push(Instruction::Sw(Reg::T0, 0, Reg::T1));
    }
    Ok(())
}

fn generate_binary(
    func: &FunctionData,
    ctx: &mut Context,
    binary: &Binary,
    inst: Value,
) -> Result<(), CompilerError> {
    load_operand(func, ctx, binary.lhs(), Reg::T0)?;
    load_operand(func, ctx, binary.rhs(), Reg::T1)?;
    let (d, l, r) = (Reg::T0, Reg::T0, Reg::T1);
    match binary.op() {
        BinaryOp::Add => ctx.program.push(Instruction::Add(d, l, r)),
        BinaryOp::Sub => ctx.program.push(Instruction::Sub(d, l, r)),
        BinaryOp::Mul => ctx.program.push(Instruction::Mul(d, l, r)),
        BinaryOp::Div => ctx.program.push(Instruction::Div(d, l, r)),
        BinaryOp::Mod => ctx.program.push(Instruction::Rem(d, l, r)),
        BinaryOp::Eq => {
            ctx.program.push(Instruction::Xor(d, l, r));
            ctx.program.push(Instruction::Seqz(d, d));
        }
        BinaryOp::NotEq => {
            ctx.program.push(Instruction::Xor(d, l, r));
            ctx.program.push(Instruction::Snez(d, d));
        }
        BinaryOp::Lt => ctx.program.push(Instruction::Slt(d, l, r)),
        BinaryOp::Gt => ctx.program.push(Instruction::Sgt(d, l, r)),
        BinaryOp::Le => {
            ctx.program.push(Instruction::Sgt(d, l, r));
            ctx.program.push(Instruction::Seqz(d, d));
        }
        BinaryOp::Ge => {
            ctx.program.push(Instruction::Slt(d, l, r));
            ctx.program.push(Instruction::Seqz(d, d));
        }
        BinaryOp::And => {
            ctx.program.push(Instruction::Snez(d, l));
            ctx.program.push(Instruction::Snez(r, r));
            ctx.program.push(Instruction::And(d, d, r));
        }
        BinaryOp::Or => {
            ctx.program.push(Instruction::Or(d, l, r));
            ctx.program.push(Instruction::Snez(d, d));
        }
        other => {
            return Err(CompilerError::CodeGenError(format!(
                "unsupported binary op: {:?}",
                other
            )));
        }
    }
    store_result(func, ctx, inst, Reg::T0, Reg::T1)
}

fn generate_branch(
    func: &FunctionData,
    ctx: &mut Context,
    branch: &Branch,
) -> Result<(), CompilerError> {
    load_operand(func, ctx, branch.cond(), Reg::T0)?;
    let true_label = ctx.bb_label(branch.true_bb())?;
    let false_label = ctx.bb_label(branch.false_bb())?;
    ctx.program.push(Instruction::Bnez(Reg::T0, true_label));
    ctx.program.push(Instruction::J(false_label));
    Ok(())
}

fn generate_jump(ctx: &mut Context, jump: &Jump) -> Result<(), CompilerError> {
    let label = ctx.bb_label(jump.target())?;
    ctx.program.push(Instruction::J(label));
    Ok(())
}

fn generate_call(
    func: &FunctionData,
    program: &Program,
    ctx: &mut Context,
    call: &Call,
    inst: Value,
) -> Result<(), CompilerError> {
    // 前 8 个实参进 a0-a7，其余依次放进外溢实参区 0(sp), 4(sp), ...
    for (idx, &arg) in call.args().iter().enumerate() {
        if idx < 8 {
            load_operand(func, ctx, arg, ARG_REGS[idx])?;
        } else {
            load_operand(func, ctx, arg, Reg::T0)?;
            store_reg_with_offset(ctx, Reg::T0, ((idx - 8) * 4) as i32, Reg::T1);
        }
    }
    let callee_name = program.func(call.callee()).name()[1..].to_string();
    ctx.program.push(Instruction::Call(callee_name));
    // 有返回值时把 a0 收进结果槽
    if !func.dfg().value(inst).ty().is_unit() {
        store_result(func, ctx, inst, Reg::A0, Reg::T0)?;
    }
    Ok(())
}

fn generate_get_elem_ptr(
    func: &FunctionData,
    program: &Program,
    ctx: &mut Context,
    gep: &GetElemPtr,
    inst: Value,
) -> Result<(), CompilerError> {
    let src = gep.src();
    let elem_size;
    if let Some(name) = ctx.globals.get(&src).cloned() {
        ctx.program.push(Instruction::La(Reg::T0, name));
        let ty = program.borrow_value(src).ty().clone();
        elem_size = gep_elem_size(&ty)?;
    } else if let ValueKind::Alloc(_) = func.dfg().value(src).kind() {
        // 局部数组：基址是 sp + 槽偏移
        match ctx.home_of(src, func)? {
            Home::Stack(offset) => {
                if (-2048..=2047).contains(&offset) {
                    ctx.program.push(Instruction::Addi(Reg::T0, Reg::Sp, offset));
                } else {
                    ctx.program.push(Instruction::Li(Reg::T0, offset));
                    ctx.program.push(Instruction::Add(Reg::T0, Reg::Sp, Reg::T0));
                }
            }
            other => {
                return Err(CompilerError::CodeGenError(format!(
                    "alloc must live on the stack, got {:?}",
                    other
                )));
            }
        }
        elem_size = gep_elem_size(func.dfg().value(src).ty())?;
    } else {
        return Err(CompilerError::CodeGenError(
            "getelemptr source must be an alloc or a global".to_string(),
        ));
    }
    load_operand(func, ctx, gep.index(), Reg::T1)?;
    ctx.program.push(Instruction::Li(Reg::T2, elem_size));
    ctx.program.push(Instruction::Mul(Reg::T1, Reg::T1, Reg::T2));
    ctx.program.push(Instruction::Add(Reg::T0, Reg::T0, Reg::T1));
    store_result(func, ctx, inst, Reg::T0, Reg::T1)
}

fn generate_get_ptr(
    func: &FunctionData,
    ctx: &mut Context,
    gp: &GetPtr,
    inst: Value,
) -> Result<(), CompilerError> {
    // 基址本身是个指针值（从数组形参 load 出来的），先从栈上取出
    let src = gp.src();
    load_operand(func, ctx, src, Reg::T0)?;
    let elem_size = ptr_elem_size(func.dfg().value(src).ty())?;
    load_operand(func, ctx, gp.index(), Reg::T1)?;
    ctx.program.push(Instruction::Li(Reg::T2, elem_size));
    ctx.program.push(Instruction::Mul(Reg::T1, Reg::T1, Reg::T2));
    ctx.program.push(Instruction::Add(Reg::T0, Reg::T0, Reg::T1));
    store_result(func, ctx, inst, Reg::T0, Reg::T1)
}

fn generate_return(
    func: &FunctionData,
    ctx: &mut Context,
    ret: &Return,
) -> Result<(), CompilerError> {
    if let Some(value) = ret.value() {
        load_operand(func, ctx, value, Reg::A0)?;
    }
    ctx.program.push(Instruction::J(ctx.end_label()));
    Ok(())
}

/// getelemptr 的源是 *[T, n]，步长是元素 T 的大小
fn gep_elem_size(ty: &Type) -> Result<i32, CompilerError> {
    match ty.kind() {
        TypeKind::Pointer(base) => match base.kind() {
            TypeKind::Array(elem, _) => Ok(elem.size() as i32),
            _ => Err(CompilerError::CodeGenError(format!(
                "getelemptr source is not a pointer to array: {:?}",
                base
            ))),
        },
        _ => Err(CompilerError::CodeGenError(format!(
            "getelemptr source is not a pointer: {:?}",
            ty
        ))),
    }
}

/// getptr 的源是 *T，步长就是 T 的大小
fn ptr_elem_size(ty: &Type) -> Result<i32, CompilerError> {
    match ty.kind() {
        TypeKind::Pointer(base) => Ok(base.size() as i32),
        _ => Err(CompilerError::CodeGenError(format!(
            "getptr source is not a pointer: {:?}",
            ty
        ))),
    }
}
