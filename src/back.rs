//! 后端：把 Koopa IR 程序翻译成 RV32IM 汇编
//!
//! - `frame`: 栈帧规划（ra 保存、外溢实参区、逐值栈槽）
//! - `asm`: 逐指令翻译，处理大立即数与全局变量寻址
//! - `context`: 每函数的生成状态与值的安身处
//! - `insts`/`program`: 指令数据模型与文本输出

pub mod asm;
pub mod context;
pub mod frame;
pub mod insts;
pub mod program;
pub mod utils;

use koopa::ir::Program;

use crate::back::asm::GenerateAsm;
use crate::back::context::Context;
use crate::CompilerError;

/// 从 Koopa IR 程序生成 RISC-V 汇编文本
pub fn generate_asm(program: &Program) -> Result<String, CompilerError> {
    let mut ctx = Context::new();
    program.generate(program, &mut ctx)?;
    Ok(ctx.program.dump())
}
