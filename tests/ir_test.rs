//! 前端生成的 Koopa IR 文本检查，所有用例同时验证文本能被 koopa 重新解析

use koopa::back::KoopaGenerator;
use sysyc::front::generate_ir;
use sysyc::sysy;

fn compile_ir(src: &str) -> String {
    let ast = sysy::CompUnitParser::new().parse(src).unwrap();
    let program = generate_ir(&ast, None).unwrap();
    let mut gen = KoopaGenerator::new(Vec::new());
    gen.generate_on(&program).unwrap();
    let text = String::from_utf8(gen.writer()).unwrap();
    // 往返性质：发出的文本必须能被外部解析器接受
    koopa::front::Driver::from(text.clone())
        .generate_program()
        .unwrap_or_else(|e| panic!("emitted IR failed to re-parse: {:?}\n{}", e, text));
    text
}

#[test]
fn constant_expression_chain() {
    let ir = compile_ir("int main() { return 1 + 2 * 3; }");
    assert!(ir.contains("%0 = mul 2, 3"), "{}", ir);
    assert!(ir.contains("%1 = add 1, %0"), "{}", ir);
    assert!(ir.contains("ret %1"), "{}", ir);
}

#[test]
fn global_const_array_is_folded_and_flat() {
    let ir = compile_ir(
        r#"
const int N = 5;
int a[N] = {1, 2, 3};
int main() { return a[0]; }
"#,
    );
    // 常量 N 折叠进维度，数组以扁平的 [i32, 5] 形式出现
    assert!(ir.contains("global @a = alloc [i32, 5]"), "{}", ir);
    assert!(ir.contains("{1, 2, 3, 0, 0}"), "{}", ir);
}

#[test]
fn uninitialized_global_array_is_zeroinit() {
    let ir = compile_ir("int g[10]; int main() { return g[9]; }");
    assert!(ir.contains("global @g = alloc [i32, 10], zeroinit"), "{}", ir);
}

#[test]
fn local_shadowing_gets_unique_names() {
    let ir = compile_ir(
        r#"
int x = 5;
int main() {
    int x = 1;
    {
        int x = 2;
        x = 3;
    }
    return x;
}
"#,
    );
    assert!(ir.contains("global @x"), "{}", ir);
    assert!(ir.contains("@x_0 = alloc i32"), "{}", ir);
    assert!(ir.contains("@x_1 = alloc i32"), "{}", ir);
}

#[test]
fn while_with_break_builds_loop_blocks() {
    let ir = compile_ir(
        r#"
int main() {
    int i = 0;
    while (i < 3) {
        if (i == 1) break;
        i = i + 1;
    }
    return i;
}
"#,
    );
    assert!(ir.contains("%while_entry_0:"), "{}", ir);
    assert!(ir.contains("%while_body_0:"), "{}", ir);
    assert!(ir.contains("%while_end_0:"), "{}", ir);
    // break 翻译成直接跳到结束块
    assert!(ir.contains("jump %while_end_0"), "{}", ir);
}

#[test]
fn if_else_with_both_arms_returning_has_no_join_block() {
    let ir = compile_ir("int main() { if (1) return 1; else return 2; }");
    assert!(ir.contains("%then_0:"), "{}", ir);
    assert!(ir.contains("%else_0:"), "{}", ir);
    assert!(!ir.contains("if_end_0"), "{}", ir);
}

#[test]
fn if_without_else_joins_at_end_block() {
    let ir = compile_ir(
        r#"
int main() {
    int a = 0;
    if (a) a = 1;
    return a;
}
"#,
    );
    assert!(ir.contains("%then_0:"), "{}", ir);
    assert!(ir.contains("%if_end_0:"), "{}", ir);
}

#[test]
fn short_circuit_or_branches_before_rhs() {
    // 1/0 只出现在右操作数块里，短路让它不被执行
    let ir = compile_ir("int main() { return 0 || (1 / 0); }");
    assert!(ir.contains("@lor_res_0 = alloc i32"), "{}", ir);
    assert!(ir.contains("%lor_rhs_0:"), "{}", ir);
    assert!(ir.contains("%lor_end_0:"), "{}", ir);
    let rhs_pos = ir.find("%lor_rhs_0:").unwrap();
    let div_pos = ir.find(" div ").unwrap();
    assert!(div_pos > rhs_pos, "division must be inside the rhs block\n{}", ir);
}

#[test]
fn short_circuit_and_uses_its_own_cell() {
    let ir = compile_ir("int main() { return 1 && 2; }");
    assert!(ir.contains("@land_res_0 = alloc i32"), "{}", ir);
    assert!(ir.contains("%land_rhs_0:"), "{}", ir);
}

#[test]
fn array_param_uses_load_then_getptr() {
    let ir = compile_ir(
        r#"
int f(int a[][2], int n) {
    int s = 0;
    int i = 0;
    while (i < n) {
        s = s + a[i][0] + a[i][1];
        i = i + 1;
    }
    return s;
}
int main() {
    int m[3][2] = {};
    return f(m, 3);
}
"#,
    );
    // 数组形参是 *i32，访问先 load 指针再 getptr 扁平偏移
    assert!(ir.contains("fun @f("), "{}", ir);
    assert!(ir.contains(": *i32"), "{}", ir);
    assert!(ir.contains("getptr"), "{}", ir);
    // a[i][0] 的扁平偏移带一个 stride 为 2 的乘法
    assert!(ir.contains("mul"), "{}", ir);
    // 实参 m 整体传递时退化成首元素指针
    assert!(ir.contains("getelemptr @m_0, 0"), "{}", ir);
}

#[test]
fn full_rank_access_loads_a_scalar() {
    let ir = compile_ir(
        r#"
int a[2][3];
int main() { return a[1][2]; }
"#,
    );
    // 扁平偏移 1*3+2，最后以 load 结束
    assert!(ir.contains("global @a = alloc [i32, 6]"), "{}", ir);
    assert!(ir.contains("mul"), "{}", ir);
    assert!(ir.contains("getelemptr @a,"), "{}", ir);
}

#[test]
fn hex_and_octal_literals() {
    let ir = compile_ir("int main() { return 0x1F + 010; }");
    assert!(ir.contains("39"), "{}", ir);
}

#[test]
fn void_function_gets_trailing_ret() {
    let ir = compile_ir("void f() { } int main() { f(); return 0; }");
    assert!(ir.contains("fun @f()"), "{}", ir);
    assert!(ir.contains("call @f()"), "{}", ir);
}

#[test]
fn library_functions_are_declared() {
    let ir = compile_ir("int main() { putint(getint()); return 0; }");
    assert!(ir.contains("decl @getint(): i32"), "{}", ir);
    assert!(ir.contains("decl @putint(i32)"), "{}", ir);
    assert!(ir.contains("call @getint()"), "{}", ir);
}

#[test]
fn local_array_init_stores_every_slot() {
    let ir = compile_ir(
        r#"
int main() {
    int a[4] = {1, 2};
    return a[1];
}
"#,
    );
    // 两个显式元素加两个补零，一共 4 个 store
    assert_eq!(ir.matches("store").count(), 4, "{}", ir);
}

#[test]
fn value_numbering_restarts_per_function() {
    let ir = compile_ir(
        r#"
int f() { return 1 + 2; }
int main() { return 3 + 4; }
"#,
    );
    // 每个函数的临时值都从 %0 开始编号
    assert_eq!(ir.matches("%0 = add").count(), 2, "{}", ir);
}
