//! 语义错误检查：所有错误都应从下降过程里以对应的分类返回

use sysyc::front::generate_ir;
use sysyc::sysy;
use sysyc::CompilerError;

fn compile_err(src: &str) -> CompilerError {
    let ast = sysy::CompUnitParser::new().parse(src).unwrap();
    match generate_ir(&ast, None) {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    }
}

#[test]
fn undefined_identifier() {
    let err = compile_err("int main() { return x; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn redefinition_in_same_scope() {
    let err = compile_err("int main() { int a = 1; int a = 2; return a; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn shadowing_in_inner_scope_is_fine() {
    let ast = sysy::CompUnitParser::new()
        .parse("int main() { int a = 1; { int a = 2; } return a; }")
        .unwrap();
    assert!(generate_ir(&ast, None).is_ok());
}

#[test]
fn assignment_to_constant() {
    let err = compile_err("int main() { const int c = 1; c = 2; return c; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn calling_a_variable() {
    let err = compile_err("int main() { int f = 1; return f(); }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn indexing_a_scalar() {
    let err = compile_err("int main() { int a = 1; return a[0]; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn too_many_indices() {
    let err = compile_err("int a[2]; int main() { return a[0][1]; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn break_outside_of_loop_is_an_invariant_error() {
    let err = compile_err("int main() { break; return 0; }");
    assert!(matches!(err, CompilerError::InvariantError(_)), "{}", err);
}

#[test]
fn continue_outside_of_loop_is_an_invariant_error() {
    let err = compile_err("int main() { continue; return 0; }");
    assert!(matches!(err, CompilerError::InvariantError(_)), "{}", err);
}

#[test]
fn void_variable_is_rejected() {
    let err = compile_err("void x; int main() { return 0; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn wrong_argument_count() {
    let err = compile_err("int f(int a) { return a; } int main() { return f(); }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn non_constant_in_const_context() {
    let err = compile_err("int main() { int a = 1; const int c = a; return c; }");
    assert!(matches!(err, CompilerError::ConstEvalError(_)), "{}", err);
}

#[test]
fn call_in_const_context() {
    let err = compile_err("int main() { const int c = getint(); return c; }");
    assert!(matches!(err, CompilerError::ConstEvalError(_)), "{}", err);
}

#[test]
fn folding_is_eager_so_const_division_by_zero_fails() {
    // 运行期 0 || (1/0) 会短路，但常量上下文里折叠是急切的
    let err = compile_err("int main() { const int c = 0 || 1 / 0; return c; }");
    assert!(matches!(err, CompilerError::ConstEvalError(_)), "{}", err);
}

#[test]
fn misaligned_initializer_list() {
    let err = compile_err("int a[2][3] = {1, {2}}; int main() { return a[0][0]; }");
    assert!(matches!(err, CompilerError::ShapeError(_)), "{}", err);
}

#[test]
fn too_many_initializers() {
    let err = compile_err("int a[2] = {1, 2, 3}; int main() { return a[0]; }");
    assert!(matches!(err, CompilerError::ShapeError(_)), "{}", err);
}

#[test]
fn negative_array_dimension() {
    let err = compile_err("int a[0 - 1]; int main() { return 0; }");
    assert!(matches!(err, CompilerError::ShapeError(_)), "{}", err);
}

#[test]
fn returning_value_from_void_function() {
    let err = compile_err("void f() { return 1; } int main() { return 0; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}

#[test]
fn use_before_declaration_of_function() {
    let err = compile_err("int main() { return f(); } int f() { return 1; }");
    assert!(matches!(err, CompilerError::ScopeError(_)), "{}", err);
}
