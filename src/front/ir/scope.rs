//! 作用域与符号表
//!
//! 维护一个以全局作用域为底的作用域栈，以及 while 循环的标号栈。
//! 局部符号在声明时获得一个与所有全局名都不同的唯一名（`name_k` 形式），
//! 重命名计数器按源名称单调递增，并在每个函数开始时清零。
//! 栈配对出错（弹空栈等）属于内部不变量被破坏，以 InvariantError
//! 走统一的错误通道，由驱动打印后退出。

use koopa::ir::{BasicBlock, Function, Value};
use std::collections::HashMap;

use crate::front::ast::BType;
use crate::CompilerError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolKind {
    Var,
    Func,
}

/// 符号的基础类型；数组形参持有 i32 指针
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolType {
    Int,
    Void,
    IntPtr,
}

impl From<BType> for SymbolType {
    fn from(ty: BType) -> Self {
        match ty {
            BType::Int => SymbolType::Int,
            BType::Void => SymbolType::Void,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub unique_name: String,
    pub const_value: Option<i32>,
    pub is_const: bool,
    pub kind: SymbolKind,
    pub ty: SymbolType,
    /// 数组维度；空表示标量，数组形参首维记 0
    pub dims: Vec<i32>,
    /// 存储位置（alloc / global alloc）对应的 IR 句柄
    pub value: Option<Value>,
    /// kind 为 Func 时的函数句柄
    pub func: Option<Function>,
}

impl Symbol {
    /// 编译期已知的标量常量，不占用任何 IR 存储
    pub fn const_int(name: &str, value: i32) -> Self {
        Self {
            name: name.to_string(),
            unique_name: String::new(),
            const_value: Some(value),
            is_const: true,
            kind: SymbolKind::Var,
            ty: SymbolType::Int,
            dims: Vec::new(),
            value: None,
            func: None,
        }
    }

    /// 变量或数组；`value` 在 alloc 创建后再通过 `bind_value` 填入
    pub fn var(name: &str, ty: SymbolType, dims: Vec<i32>, is_const: bool) -> Self {
        Self {
            name: name.to_string(),
            unique_name: String::new(),
            const_value: None,
            is_const,
            kind: SymbolKind::Var,
            ty,
            dims,
            value: None,
            func: None,
        }
    }

    pub fn func(name: &str, func: Function, ret_ty: BType) -> Self {
        Self {
            name: name.to_string(),
            unique_name: String::new(),
            const_value: None,
            is_const: false,
            kind: SymbolKind::Func,
            ty: ret_ty.into(),
            dims: Vec::new(),
            value: None,
            func: Some(func),
        }
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    /// 数组形参的首维是省略的
    pub fn is_array_param(&self) -> bool {
        self.dims.first() == Some(&0)
    }
}

pub struct Scopes {
    /// 作用域栈，下标 0 是全局作用域
    scopes: Vec<HashMap<String, Symbol>>,
    /// 循环栈：(continue 目标, break 目标)
    loop_stack: Vec<(BasicBlock, BasicBlock)>,
    /// 局部重命名计数器，按源名称记录，函数开始时清零
    rename_counters: HashMap<String, u32>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            loop_stack: Vec::new(),
            rename_counters: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// 全局作用域必须始终留在栈底，把它弹掉说明配对出错
    pub fn exit_scope(&mut self) -> Result<(), CompilerError> {
        if self.scopes.len() <= 1 {
            return Err(CompilerError::InvariantError(
                "scope stack underflow".to_string(),
            ));
        }
        self.scopes.pop();
        Ok(())
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// 在当前作用域声明符号；同一作用域内重名即失败。
    /// 成功时计算并填入 unique_name，返回它的一份拷贝。
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<String, CompilerError> {
        let inner = self.scopes.last().ok_or_else(|| {
            CompilerError::InvariantError("scope stack is empty".to_string())
        })?;
        if inner.contains_key(&symbol.name) {
            return Err(CompilerError::ScopeError(format!(
                "`{}` is already defined in this scope",
                symbol.name
            )));
        }
        let unique = self.make_unique(&symbol.name);
        symbol.unique_name = unique.clone();
        self.scopes
            .last_mut()
            .ok_or_else(|| CompilerError::InvariantError("scope stack is empty".to_string()))?
            .insert(symbol.name.clone(), symbol);
        Ok(unique)
    }

    /// 全局符号沿用源名称；局部符号取 `name_k`，k 从 0 起单调递增，
    /// 并跳过与全局名撞车的候选
    fn make_unique(&mut self, name: &str) -> String {
        if self.is_global_scope() {
            return name.to_string();
        }
        let mut k = self.rename_counters.get(name).copied().unwrap_or(0);
        let unique = loop {
            let candidate = format!("{}_{}", name, k);
            k += 1;
            if !self.scopes[0].contains_key(&candidate) {
                break candidate;
            }
        };
        self.rename_counters.insert(name.to_string(), k);
        unique
    }

    /// 声明之后补上存储句柄（alloc 需要先知道唯一名才能创建）
    pub fn bind_value(&mut self, name: &str, value: Value) -> Result<(), CompilerError> {
        let entry = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(name))
            .ok_or_else(|| {
                CompilerError::InvariantError(format!(
                    "`{}` is not declared in the current scope",
                    name
                ))
            })?;
        entry.value = Some(value);
        Ok(())
    }

    /// 由内向外查找
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    pub fn enter_loop(&mut self, entry: BasicBlock, exit: BasicBlock) {
        self.loop_stack.push((entry, exit));
    }

    pub fn exit_loop(&mut self) -> Result<(), CompilerError> {
        self.loop_stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| CompilerError::InvariantError("loop stack underflow".to_string()))
    }

    /// break 跳转到循环的结束块
    pub fn current_break(&self) -> Option<BasicBlock> {
        self.loop_stack.last().map(|&(_, exit)| exit)
    }

    /// continue 跳转到循环的条件判断块
    pub fn current_continue(&self) -> Option<BasicBlock> {
        self.loop_stack.last().map(|&(entry, _)| entry)
    }

    /// 每个函数开始时重置局部重命名计数
    pub fn reset_function_counters(&mut self) {
        self.rename_counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_symbols_keep_their_name() {
        let mut scopes = Scopes::new();
        let unique = scopes.declare(Symbol::const_int("n", 5)).unwrap();
        assert_eq!(unique, "n");
        assert_eq!(scopes.lookup("n").unwrap().const_value, Some(5));
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let mut scopes = Scopes::new();
        scopes.declare(Symbol::const_int("x", 1)).unwrap();
        assert!(scopes.declare(Symbol::const_int("x", 2)).is_err());
    }

    #[test]
    fn locals_are_renamed_monotonically() {
        let mut scopes = Scopes::new();
        scopes.enter_scope();
        let a0 = scopes
            .declare(Symbol::var("a", SymbolType::Int, vec![], false))
            .unwrap();
        scopes.enter_scope();
        let a1 = scopes
            .declare(Symbol::var("a", SymbolType::Int, vec![], false))
            .unwrap();
        assert_eq!(a0, "a_0");
        assert_eq!(a1, "a_1");
        // 内层遮蔽外层
        assert_eq!(scopes.lookup("a").unwrap().unique_name, "a_1");
        scopes.exit_scope().unwrap();
        assert_eq!(scopes.lookup("a").unwrap().unique_name, "a_0");
        scopes.exit_scope().unwrap();
    }

    #[test]
    fn local_rename_skips_global_names() {
        let mut scopes = Scopes::new();
        scopes.declare(Symbol::const_int("a_0", 1)).unwrap();
        scopes.enter_scope();
        let unique = scopes
            .declare(Symbol::var("a", SymbolType::Int, vec![], false))
            .unwrap();
        assert_eq!(unique, "a_1");
        scopes.exit_scope().unwrap();
    }

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let mut scopes = Scopes::new();
        scopes.declare(Symbol::const_int("x", 1)).unwrap();
        scopes.enter_scope();
        assert!(scopes
            .declare(Symbol::var("x", SymbolType::Int, vec![], false))
            .is_ok());
        scopes.exit_scope().unwrap();
    }

    #[test]
    fn popping_the_global_scope_is_an_invariant_error() {
        let mut scopes = Scopes::new();
        assert!(matches!(
            scopes.exit_scope(),
            Err(CompilerError::InvariantError(_))
        ));
        assert!(matches!(
            scopes.exit_loop(),
            Err(CompilerError::InvariantError(_))
        ));
    }
}
