//! 后端汇编检查：走完整管线（IR 文本重新解析后再下降），
//! 覆盖立即数边界、寄存器/栈传参和全局数据段

use koopa::back::KoopaGenerator;
use koopa::ir::Type;
use sysyc::back::generate_asm;
use sysyc::front::generate_ir;
use sysyc::sysy;

fn compile_asm(src: &str) -> String {
    Type::set_ptr_size(4);
    let ast = sysy::CompUnitParser::new().parse(src).unwrap();
    let program = generate_ir(&ast, None).unwrap();
    let mut gen = KoopaGenerator::new(Vec::new());
    gen.generate_on(&program).unwrap();
    let text = String::from_utf8(gen.writer()).unwrap();
    let program = koopa::front::Driver::from(text)
        .generate_program()
        .unwrap();
    generate_asm(&program).unwrap()
}

#[test]
fn simple_expression_returns_through_end_label() {
    let asm = compile_asm("int main() { return 1 + 2 * 3; }");
    assert!(asm.contains("  .text"), "{}", asm);
    assert!(asm.contains("  .globl main"), "{}", asm);
    assert!(asm.contains("main:"), "{}", asm);
    // 返回值先进 a0，再跳到唯一出口
    assert!(asm.contains("lw a0,"), "{}", asm);
    assert!(asm.contains("  j main_end"), "{}", asm);
    assert!(asm.contains("main_end:"), "{}", asm);
    assert!(asm.contains("  ret"), "{}", asm);
    // 两个临时值的 16 字节对齐栈帧
    assert!(asm.contains("addi sp, sp, -16"), "{}", asm);
    assert!(asm.contains("addi sp, sp, 16"), "{}", asm);
}

#[test]
fn global_const_array_data_section() {
    let asm = compile_asm(
        r#"
const int N = 5;
int a[N] = {1, 2, 3};
int main() { return a[0]; }
"#,
    );
    assert!(asm.contains("  .data"), "{}", asm);
    assert!(asm.contains("  .globl a"), "{}", asm);
    assert!(asm.contains("a:"), "{}", asm);
    assert!(asm.contains("  .word 1"), "{}", asm);
    assert!(asm.contains("  .word 2"), "{}", asm);
    assert!(asm.contains("  .word 3"), "{}", asm);
    assert_eq!(asm.matches("  .word 0").count(), 2, "{}", asm);
}

#[test]
fn uninitialized_global_array_uses_zero_directive() {
    let asm = compile_asm("int g[10]; int main() { return g[0]; }");
    assert!(asm.contains("  .zero 40"), "{}", asm);
}

#[test]
fn global_scalar_load_and_store_via_la() {
    let asm = compile_asm("int g; int main() { g = 5; return g; }");
    assert!(asm.contains("la t1, g"), "{}", asm);
    assert!(asm.contains("sw t0, 0(t1)"), "{}", asm);
    assert!(asm.contains("la t0, g"), "{}", asm);
    assert!(asm.contains("lw t0, 0(t0)"), "{}", asm);
}

#[test]
fn frame_size_2048_takes_both_immediate_paths() {
    // 508*4 + 两个临时 = 2040，对齐到 2048：
    // 开栈 -2048 落在 imm12 内，回收 +2048 超界走 li+add
    let asm = compile_asm("int main() { int a[508]; return a[0]; }");
    assert!(asm.contains("addi sp, sp, -2048"), "{}", asm);
    assert!(asm.contains("li t0, 2048"), "{}", asm);
    assert!(asm.contains("add sp, sp, t0"), "{}", asm);
}

#[test]
fn oversized_frame_uses_li_add_on_both_ends() {
    let asm = compile_asm("int main() { int a[600]; return a[0]; }");
    assert!(asm.contains("li t0, -2416"), "{}", asm);
    assert!(asm.contains("li t0, 2416"), "{}", asm);
    assert!(asm.contains("add sp, sp, t0"), "{}", asm);
}

#[test]
fn nine_arguments_split_between_registers_and_stack() {
    let asm = compile_asm(
        r#"
int f(int p1, int p2, int p3, int p4, int p5, int p6, int p7, int p8, int p9) {
    return p1 + p9;
}
int main() {
    return f(1, 2, 3, 4, 5, 6, 7, 8, 9);
}
"#,
    );
    // 前 8 个实参进 a0-a7
    assert!(asm.contains("li a0, 1"), "{}", asm);
    assert!(asm.contains("li a7, 8"), "{}", asm);
    // 第 9 个放进外溢实参区 0(sp)
    assert!(asm.contains("sw t0, 0(sp)"), "{}", asm);
    assert!(asm.contains("  call f"), "{}", asm);
    // 被调方从自己的栈帧之上取第 9 个形参：f 的帧大小是 48
    assert!(asm.contains("lw t0, 48(sp)"), "{}", asm);
    // 有 call 的函数保存并恢复 ra
    assert!(asm.contains("sw ra,"), "{}", asm);
    assert!(asm.contains("lw ra,"), "{}", asm);
}

#[test]
fn tenth_argument_lands_at_4_sp() {
    let asm = compile_asm(
        r#"
int f(int p1, int p2, int p3, int p4, int p5, int p6, int p7, int p8, int p9, int p10) {
    return p9 + p10;
}
int main() {
    return f(1, 2, 3, 4, 5, 6, 7, 8, 9, 10);
}
"#,
    );
    assert!(asm.contains("sw t0, 0(sp)"), "{}", asm);
    assert!(asm.contains("sw t0, 4(sp)"), "{}", asm);
    // f 的帧大小是 64，FuncArgRef(8)/(9) 落在 frame+0 和 frame+4
    assert!(asm.contains("lw t0, 64(sp)"), "{}", asm);
    assert!(asm.contains("lw t0, 68(sp)"), "{}", asm);
}

#[test]
fn branches_use_bnez_then_jump() {
    let asm = compile_asm(
        r#"
int main() {
    int i = 0;
    while (i < 3) {
        i = i + 1;
    }
    return i;
}
"#,
    );
    assert!(asm.contains("main_while_entry_0:"), "{}", asm);
    assert!(asm.contains("bnez t0, main_while_body_0"), "{}", asm);
    assert!(asm.contains("  j main_while_end_0"), "{}", asm);
    assert!(asm.contains("  j main_while_entry_0"), "{}", asm);
}

#[test]
fn comparison_lowering_uses_sgt_and_seqz() {
    let asm = compile_asm("int main() { return 2 > 1; }");
    assert!(asm.contains("sgt t0, t0, t1"), "{}", asm);
    let asm = compile_asm("int main() { return 1 <= 2; }");
    assert!(asm.contains("sgt t0, t0, t1"), "{}", asm);
    assert!(asm.contains("seqz t0, t0"), "{}", asm);
}

#[test]
fn equality_lowering_uses_xor() {
    let asm = compile_asm("int main() { return 1 == 1; }");
    assert!(asm.contains("xor t0, t0, t1"), "{}", asm);
    assert!(asm.contains("seqz t0, t0"), "{}", asm);
}

#[test]
fn array_element_access_scales_index_by_four() {
    let asm = compile_asm(
        r#"
int main() {
    int a[2][3] = {{1, 2, 3}, {4, 5, 6}};
    return a[1][2];
}
"#,
    );
    // 基址 sp 相对，元素大小 4
    assert!(asm.contains("addi t0, sp,"), "{}", asm);
    assert!(asm.contains("li t2, 4"), "{}", asm);
    assert!(asm.contains("mul t1, t1, t2"), "{}", asm);
    assert!(asm.contains("add t0, t0, t1"), "{}", asm);
}

#[test]
fn void_function_call_discards_result() {
    let asm = compile_asm(
        r#"
void p(int x) { putint(x); }
int main() { p(42); return 0; }
"#,
    );
    assert!(asm.contains("  call p"), "{}", asm);
    assert!(asm.contains("  call putint"), "{}", asm);
    // p 自身也有 call，ra 两个函数都要保存
    assert_eq!(asm.matches("sw ra,").count(), 2, "{}", asm);
}

#[test]
fn frame_sizes_are_16_byte_aligned() {
    for src in [
        "int main() { return 0; }",
        "int main() { int a = 1; return a; }",
        "int main() { int a[7]; return a[0]; }",
    ] {
        let asm = compile_asm(src);
        for line in asm.lines() {
            if let Some(rest) = line.trim().strip_prefix("addi sp, sp, -") {
                let n: i32 = rest.parse().unwrap();
                assert_eq!(n % 16, 0, "unaligned frame in: {}", asm);
            }
        }
    }
}
