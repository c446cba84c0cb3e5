//! 栈帧规划
//!
//! 对函数的基本块做两遍扫描：
//! 第一遍找 call 指令，决定要不要保存 ra，并统计外溢实参区的大小；
//! 第二遍按布局顺序给每个有结果的指令分配栈槽，
//! 偏移从外溢实参区之上开始，alloc 按指向类型的大小保留空间，
//! 其余指令的结果一律 4 字节。
//! 帧大小 = align16(槽位 + 实参区 + ra)，ra 存在 frame-4。

use koopa::ir::{FunctionData, TypeKind, ValueKind};

use crate::back::context::{Context, Home};
use crate::CompilerError;

pub fn plan_frame(func: &FunctionData, ctx: &mut Context) -> Result<(), CompilerError> {
    let mut has_call = false;
    let mut stack_param_num = 0usize;
    for (_bb, node) in func.layout().bbs() {
        for &inst in node.insts().keys() {
            if let ValueKind::Call(call) = func.dfg().value(inst).kind() {
                has_call = true;
                stack_param_num = stack_param_num.max(call.args().len().saturating_sub(8));
            }
        }
    }
    ctx.has_call = has_call;
    ctx.arg_area = (stack_param_num * 4) as i32;

    let mut offset = ctx.arg_area;
    for (_bb, node) in func.layout().bbs() {
        for &inst in node.insts().keys() {
            let data = func.dfg().value(inst);
            if let ValueKind::Alloc(_) = data.kind() {
                let size = match data.ty().kind() {
                    TypeKind::Pointer(base) => base.size() as i32,
                    _ => {
                        return Err(CompilerError::CodeGenError(format!(
                            "alloc has non-pointer type {:?}",
                            data.ty()
                        )));
                    }
                };
                ctx.homes.insert(inst, Home::Stack(offset));
                offset += size;
            } else if !data.ty().is_unit() {
                ctx.homes.insert(inst, Home::Stack(offset));
                offset += 4;
            }
        }
    }

    let total = offset + if has_call { 4 } else { 0 };
    ctx.stack_size = (total + 15) / 16 * 16;
    ctx.ra_offset = ctx.stack_size - 4;
    Ok(())
}
