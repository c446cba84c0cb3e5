use koopa::ir::{BasicBlock, FunctionData, Value, ValueKind};
use std::collections::HashMap;

use crate::back::insts::{Instruction, Reg};
use crate::back::program::AsmProgram;
use crate::CompilerError;

pub const ARG_REGS: [Reg; 8] = [
    Reg::A0, Reg::A1, Reg::A2, Reg::A3, Reg::A4, Reg::A5, Reg::A6, Reg::A7,
];

/// 一个 IR 值的运行时安身之处
#[derive(Debug, Clone, PartialEq)]
pub enum Home {
    /// sp 相对偏移；alloc 的槽就是变量本体，其余指令的槽存放结果
    Stack(i32),
    /// 只有前 8 个函数形参会落在 a0-a7
    Reg(Reg),
    /// 全局符号名
    Global(String),
}

/// 汇编生成上下文
///
/// 栈帧布局（S/R/A 三段，16 字节对齐）：
///
/// ```text
/// +--------------------+ <- sp + frame
/// |     saved ra (R)   |   有 call 时 4 字节，位于 frame-4
/// +--------------------+
/// |   value slots (S)  |
/// +--------------------+
/// |   arg area (A)     |   调用实参超过 8 个时的外溢区
/// +--------------------+ <- sp
/// ```
pub struct Context {
    pub program: AsmProgram,
    pub func_name: String,
    /// 值 -> 安身处；每个值只写入一次
    pub homes: HashMap<Value, Home>,
    /// 全局 alloc -> 符号名（程序级，不随函数重置）
    pub globals: HashMap<Value, String>,
    /// 基本块 -> 标号
    pub bb_labels: HashMap<BasicBlock, String>,
    /// 对齐后的栈帧大小
    pub stack_size: i32,
    pub has_call: bool,
    /// 外溢实参区大小（stack_param_num * 4）
    pub arg_area: i32,
    /// ra 的保存位置，恒为 stack_size - 4
    pub ra_offset: i32,
}

impl Context {
    pub fn new() -> Self {
        Self {
            program: AsmProgram::new(),
            func_name: String::new(),
            homes: HashMap::new(),
            globals: HashMap::new(),
            bb_labels: HashMap::new(),
            stack_size: 0,
            has_call: false,
            arg_area: 0,
            ra_offset: 0,
        }
    }

    pub fn reset_for_function(&mut self, name: &str) {
        self.func_name = name.to_string();
        self.homes.clear();
        self.bb_labels.clear();
        self.stack_size = 0;
        self.has_call = false;
        self.arg_area = 0;
        self.ra_offset = 0;
    }

    /// 函数统一的返回出口标号
    pub fn end_label(&self) -> String {
        format!("{}_end", self.func_name)
    }

    pub fn bb_label(&self, bb: BasicBlock) -> Result<String, CompilerError> {
        self.bb_labels.get(&bb).cloned().ok_or_else(|| {
            CompilerError::CodeGenError(format!("basic block {:?} has no label", bb))
        })
    }

    /// 查询值的安身处。
    /// 形参引用在第一次被用到时才定下来：前 8 个在 a0-a7，
    /// 之后的在调用者栈帧里（本帧之上）。
    pub fn home_of(
        &mut self,
        value: Value,
        func: &FunctionData,
    ) -> Result<Home, CompilerError> {
        if let Some(name) = self.globals.get(&value) {
            return Ok(Home::Global(name.clone()));
        }
        if let Some(home) = self.homes.get(&value) {
            return Ok(home.clone());
        }
        if let ValueKind::FuncArgRef(arg) = func.dfg().value(value).kind() {
            let home = if arg.index() < 8 {
                Home::Reg(ARG_REGS[arg.index()])
            } else {
                Home::Stack(self.stack_size + ((arg.index() - 8) * 4) as i32)
            };
            self.homes.insert(value, home.clone());
            return Ok(home);
        }
        Err(CompilerError::CodeGenError(format!(
            "value {:?} has no home",
            value
        )))
    }

    /// 调整栈指针，imm12 放不下时借 t0 中转
    pub fn update_stack_pointer(&mut self, offset: i32) {
        if (-2048..=2047).contains(&offset) {
            self.program.push(Instruction::Addi(Reg::Sp, Reg::Sp, offset));
        } else {
            self.program.push(Instruction::Li(Reg::T0, offset));
            self.program.push(Instruction::Add(Reg::Sp, Reg::Sp, Reg::T0));
        }
    }
}
