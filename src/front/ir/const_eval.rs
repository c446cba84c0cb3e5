//! 常量表达式求值
//!
//! 对 AST 表达式做递归折叠。算术按 32 位补码回绕；比较产生 0/1；
//! `&&`/`||` 在折叠时两侧都求值（编译期不需要短路）。
//! 引用了非常量、数组元素或函数调用即报 ConstEvalError。

use crate::front::ast::*;
use crate::front::ir::scope::{Scopes, SymbolKind};
use crate::CompilerError;

pub fn eval_const_expr(expr: &Expr, scopes: &Scopes) -> Result<i32, CompilerError> {
    match expr {
        Expr::Number(n, _) => Ok(*n),
        Expr::LVal(lval) => eval_const_lval(lval, scopes),
        Expr::Unary(op, sub, _) => {
            let val = eval_const_expr(sub, scopes)?;
            Ok(match op {
                UnaryOp::Pos => val,
                UnaryOp::Neg => val.wrapping_neg(),
                UnaryOp::Not => (val == 0) as i32,
            })
        }
        // 两个操作数都先求值再合成，&& 和 || 因此也是急切的
        Expr::Binary(op, lhs, rhs, _) => {
            let l = eval_const_expr(lhs, scopes)?;
            let r = eval_const_expr(rhs, scopes)?;
            match op {
                BinOp::Add => Ok(l.wrapping_add(r)),
                BinOp::Sub => Ok(l.wrapping_sub(r)),
                BinOp::Mul => Ok(l.wrapping_mul(r)),
                BinOp::Div => {
                    if r == 0 {
                        return Err(CompilerError::ConstEvalError(
                            "division by zero in a constant expression".to_string(),
                        ));
                    }
                    Ok(l.wrapping_div(r))
                }
                BinOp::Mod => {
                    if r == 0 {
                        return Err(CompilerError::ConstEvalError(
                            "modulo by zero in a constant expression".to_string(),
                        ));
                    }
                    Ok(l.wrapping_rem(r))
                }
                BinOp::Lt => Ok((l < r) as i32),
                BinOp::Gt => Ok((l > r) as i32),
                BinOp::Le => Ok((l <= r) as i32),
                BinOp::Ge => Ok((l >= r) as i32),
                BinOp::Eq => Ok((l == r) as i32),
                BinOp::Ne => Ok((l != r) as i32),
                BinOp::And => Ok((l != 0 && r != 0) as i32),
                BinOp::Or => Ok((l != 0 || r != 0) as i32),
            }
        }
        Expr::Call(name, _, _) => Err(CompilerError::ConstEvalError(format!(
            "call to `{}` is not allowed in a constant expression",
            name
        ))),
    }
}

fn eval_const_lval(lval: &LVal, scopes: &Scopes) -> Result<i32, CompilerError> {
    if !lval.indices.is_empty() {
        return Err(CompilerError::ConstEvalError(format!(
            "array element `{}` is not a constant",
            lval.name
        )));
    }
    let symbol = scopes.lookup(&lval.name).ok_or_else(|| {
        CompilerError::ScopeError(format!(
            "`{}` is undefined in a constant expression",
            lval.name
        ))
    })?;
    if symbol.kind != SymbolKind::Var || !symbol.is_const || symbol.is_array() {
        return Err(CompilerError::ConstEvalError(format!(
            "`{}` is not a constant",
            lval.name
        )));
    }
    symbol.const_value.ok_or_else(|| {
        CompilerError::ConstEvalError(format!("`{}` is not a constant", lval.name))
    })
}

/// 求值数组维度列表；每一维都必须是正的常量
pub fn eval_dims(dims: &[Expr], scopes: &Scopes) -> Result<Vec<i32>, CompilerError> {
    let mut out = Vec::with_capacity(dims.len());
    for dim_expr in dims {
        let dim = eval_const_expr(dim_expr, scopes)?;
        if dim <= 0 {
            return Err(CompilerError::ShapeError(format!(
                "array dimension must be positive, got {}",
                dim
            )));
        }
        out.push(dim);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::ir::scope::Symbol;

    fn lit(n: i32) -> Expr {
        Expr::Number(n, Span::default())
    }

    fn binop(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r), Span::default())
    }

    #[test]
    fn arithmetic_folds() {
        let scopes = Scopes::new();
        let e = binop(BinOp::Add, lit(1), binop(BinOp::Mul, lit(2), lit(3)));
        assert_eq!(eval_const_expr(&e, &scopes).unwrap(), 7);
    }

    #[test]
    fn arithmetic_wraps_modulo_two_pow_32() {
        let scopes = Scopes::new();
        let e = binop(BinOp::Add, lit(i32::MAX), lit(1));
        assert_eq!(eval_const_expr(&e, &scopes).unwrap(), i32::MIN);
        let e = binop(BinOp::Mul, lit(i32::MIN), lit(-1));
        assert_eq!(eval_const_expr(&e, &scopes).unwrap(), i32::MIN);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let scopes = Scopes::new();
        let e = binop(BinOp::Div, lit(1), lit(0));
        assert!(matches!(
            eval_const_expr(&e, &scopes),
            Err(CompilerError::ConstEvalError(_))
        ));
    }

    #[test]
    fn logic_is_eager_during_folding() {
        let scopes = Scopes::new();
        // 0 || (1/0)：折叠没有短路，右侧照样求值并报错
        let e = binop(BinOp::Or, lit(0), binop(BinOp::Div, lit(1), lit(0)));
        assert!(eval_const_expr(&e, &scopes).is_err());
        let e = binop(BinOp::Or, lit(0), lit(5));
        assert_eq!(eval_const_expr(&e, &scopes).unwrap(), 1);
    }

    #[test]
    fn const_symbols_resolve() {
        let mut scopes = Scopes::new();
        scopes.declare(Symbol::const_int("n", 5)).unwrap();
        let e = Expr::LVal(LVal {
            name: "n".to_string(),
            indices: vec![],
            span: Span::default(),
        });
        assert_eq!(eval_const_expr(&e, &scopes).unwrap(), 5);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let scopes = Scopes::new();
        assert_eq!(
            eval_const_expr(&binop(BinOp::Lt, lit(1), lit(2)), &scopes).unwrap(),
            1
        );
        assert_eq!(
            eval_const_expr(&binop(BinOp::Ne, lit(3), lit(3)), &scopes).unwrap(),
            0
        );
    }
}
