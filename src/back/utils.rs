use crate::back::context::Context;
use crate::back::insts::{Instruction, Reg};

/// sp 相对存储：imm12 放不下时经由 temp 间接寻址，temp 必须不同于 reg
pub fn store_reg_with_offset(ctx: &mut Context, reg: Reg, offset: i32, temp: Reg) {
    if (-2048..=2047).contains(&offset) {
        ctx.program.push(Instruction::Sw(reg, offset, Reg::Sp));
    } else {
        ctx.program.push(Instruction::Li(temp, offset));
        ctx.program.push(Instruction::Add(temp, Reg::Sp, temp));
        ctx.program.push(Instruction::Sw(reg, 0, temp));
    }
}

/// sp 相对加载，溢出处理与 store 对称
pub fn load_reg_with_offset(ctx: &mut Context, reg: Reg, offset: i32, temp: Reg) {
    if (-2048..=2047).contains(&offset) {
        ctx.program.push(Instruction::Lw(reg, offset, Reg::Sp));
    } else {
        ctx.program.push(Instruction::Li(temp, offset));
        ctx.program.push(Instruction::Add(temp, Reg::Sp, temp));
        ctx.program.push(Instruction::Lw(reg, 0, temp));
    }
}
