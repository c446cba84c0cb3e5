//! 初始化列表展开
//!
//! 把花括号初始化列表按行主序展开为长度等于各维乘积的稠密向量，
//! 槽位为 None 表示补零。花括号每深入一层正好下降一维：
//! 子列表必须落在当前游标对齐到的最大子数组边界上，
//! 处理完一个子列表后将它的区域补齐到整个子数组。

use crate::front::ast::{ConstInitVal, Expr, InitVal};
use crate::CompilerError;

/// ConstInitVal 与 InitVal 形状相同，用统一的视图来展开
pub trait InitLike: Sized {
    fn as_single(&self) -> Option<&Expr>;
    fn as_list(&self) -> Option<&[Self]>;
}

impl InitLike for InitVal {
    fn as_single(&self) -> Option<&Expr> {
        match self {
            InitVal::Expr(e) => Some(e),
            InitVal::List(_) => None,
        }
    }

    fn as_list(&self) -> Option<&[Self]> {
        match self {
            InitVal::Expr(_) => None,
            InitVal::List(elems) => Some(elems),
        }
    }
}

impl InitLike for ConstInitVal {
    fn as_single(&self) -> Option<&Expr> {
        match self {
            ConstInitVal::Expr(e) => Some(e),
            ConstInitVal::List(_) => None,
        }
    }

    fn as_list(&self) -> Option<&[Self]> {
        match self {
            ConstInitVal::Expr(_) => None,
            ConstInitVal::List(elems) => Some(elems),
        }
    }
}

pub fn total_len(dims: &[i32]) -> usize {
    dims.iter().map(|&d| d as usize).product()
}

/// 展开数组初始化列表；`dims` 的每一维都必须为正
pub fn flatten<'a, T: InitLike>(
    init: &'a T,
    dims: &[i32],
) -> Result<Vec<Option<&'a Expr>>, CompilerError> {
    let list = init.as_list().ok_or_else(|| {
        CompilerError::ShapeError("array initializer must be a brace list".to_string())
    })?;
    let mut out = Vec::with_capacity(total_len(dims));
    fill(list, dims, &mut out)?;
    Ok(out)
}

/// `list` 负责填满 `dims` 描述的子数组，进入时 `out` 已对齐到该子数组边界
fn fill<'a, T: InitLike>(
    list: &'a [T],
    dims: &[i32],
    out: &mut Vec<Option<&'a Expr>>,
) -> Result<(), CompilerError> {
    let base = out.len();
    let total = total_len(dims);
    for item in list {
        let written = out.len() - base;
        if written >= total {
            return Err(CompilerError::ShapeError(
                "too many initializers for array".to_string(),
            ));
        }
        if let Some(expr) = item.as_single() {
            out.push(Some(expr));
        } else {
            if dims.len() <= 1 {
                return Err(CompilerError::ShapeError(
                    "initializer braces nested deeper than the array rank".to_string(),
                ));
            }
            let sub_dims = aligned_sub_dims(written, dims).ok_or_else(|| {
                CompilerError::ShapeError(
                    "initializer list does not align with a sub-array boundary".to_string(),
                )
            })?;
            let sub = item.as_list().ok_or_else(|| {
                CompilerError::InvariantError(
                    "initializer item is neither an expression nor a list".to_string(),
                )
            })?;
            fill(sub, sub_dims, out)?;
        }
    }
    // 尾部补零到子数组末尾
    out.resize(base + total, None);
    Ok(())
}

/// 子列表占据游标当前对齐到的最大子数组
fn aligned_sub_dims(written: usize, dims: &[i32]) -> Option<&[i32]> {
    (1..dims.len()).find_map(|k| {
        let sub = &dims[k..];
        (written % total_len(sub) == 0).then_some(sub)
    })
}
