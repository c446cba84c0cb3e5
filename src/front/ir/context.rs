use koopa::ir::builder_traits::*;
use koopa::ir::dfg::DataFlowGraph;
use koopa::ir::layout::Layout;
use koopa::ir::*;

use crate::front::ast::{BType, Span};
use crate::front::ir::scope::Scopes;
use crate::utils::SourceMap;
use crate::CompilerError;

/// IR 生成上下文
///
/// 持有正在构建的 koopa 程序、作用域栈以及当前函数内的发射状态。
/// 标号计数器（if/while/短路）在每个函数定义开始时清零。
/// 函数内状态缺失（没有当前函数/当前块）说明发射器自身出错，
/// 按 InvariantError 上报。
pub struct IrContext {
    pub program: Program,
    pub scopes: Scopes,
    pub current_func: Option<Function>,
    pub current_bb: Option<BasicBlock>,
    /// 当前函数入口块，用于放置一次性 alloc
    pub entry_bb: Option<BasicBlock>,
    /// 当前函数的返回类型，return 语句和兜底 ret 需要它
    pub current_ret_ty: Option<BType>,
    pub source_map: Option<SourceMap>,
    // 每函数标号计数器
    pub if_count: u32,
    pub while_count: u32,
    pub land_count: u32,
    pub lor_count: u32,
}

impl IrContext {
    pub fn new(source_map: Option<SourceMap>) -> Self {
        Self {
            program: Program::new(),
            scopes: Scopes::new(),
            current_func: None,
            current_bb: None,
            entry_bb: None,
            current_ret_ty: None,
            source_map,
            if_count: 0,
            while_count: 0,
            land_count: 0,
            lor_count: 0,
        }
    }

    pub fn reset_function_state(&mut self) {
        self.if_count = 0;
        self.while_count = 0;
        self.land_count = 0;
        self.lor_count = 0;
        self.scopes.reset_function_counters();
    }

    /// 错误信息的位置后缀，形如 " at line 3, column 7"
    pub fn location(&self, span: Span) -> String {
        match &self.source_map {
            Some(sm) => format!(" at {}", sm.format_location(span.start)),
            None => String::new(),
        }
    }

    pub fn dfg_mut(&mut self) -> Result<&mut DataFlowGraph, CompilerError> {
        let f = self.current_func.ok_or_else(|| {
            CompilerError::InvariantError("no current function".to_string())
        })?;
        Ok(self.program.func_mut(f).dfg_mut())
    }

    pub fn layout_mut(&mut self) -> Result<&mut Layout, CompilerError> {
        let f = self.current_func.ok_or_else(|| {
            CompilerError::InvariantError("no current function".to_string())
        })?;
        Ok(self.program.func_mut(f).layout_mut())
    }

    /// 创建一个命名基本块，但先不放进函数布局
    pub fn new_bb(&mut self, name: &str) -> Result<BasicBlock, CompilerError> {
        let name = format!("%{}", name);
        Ok(self.dfg_mut()?.new_bb().basic_block(Some(name)))
    }

    /// 将基本块加入布局并设为当前块
    pub fn enter_bb(&mut self, bb: BasicBlock) -> Result<(), CompilerError> {
        self.layout_mut()?
            .bbs_mut()
            .push_key_back(bb)
            .map_err(|_| CompilerError::InvariantError("basic block added twice".to_string()))?;
        self.current_bb = Some(bb);
        Ok(())
    }

    pub fn get_current_bb(&self) -> Result<BasicBlock, CompilerError> {
        self.current_bb.ok_or_else(|| {
            CompilerError::InvariantError("no current basic block".to_string())
        })
    }

    /// 把指令追加到当前块
    pub fn push_inst(&mut self, inst: Value) -> Result<(), CompilerError> {
        let bb = self.get_current_bb()?;
        self.push_inst_to(bb, inst)
    }

    /// 把指令追加到指定块（if/else 汇合时需要回填 jump）
    pub fn push_inst_to(&mut self, bb: BasicBlock, inst: Value) -> Result<(), CompilerError> {
        self.layout_mut()?
            .bb_mut(bb)
            .insts_mut()
            .push_key_back(inst)
            .map_err(|_| CompilerError::InvariantError("instruction added twice".to_string()))
    }

    /// 在函数入口块最前插入 alloc，避免循环体内反复分配
    pub fn alloc_in_entry(&mut self, ty: Type, name: Option<String>) -> Result<Value, CompilerError> {
        let entry = self.entry_bb.ok_or_else(|| {
            CompilerError::InvariantError("no entry basic block".to_string())
        })?;
        let alloc = self.dfg_mut()?.new_value().alloc(ty);
        if let Some(name) = name {
            self.dfg_mut()?.set_value_name(alloc, Some(name));
        }
        self.layout_mut()?
            .bb_mut(entry)
            .insts_mut()
            .push_key_front(alloc)
            .map_err(|_| CompilerError::InvariantError("instruction added twice".to_string()))?;
        Ok(alloc)
    }
}
