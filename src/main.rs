use lalrpop_util::lexer::Token;
use lalrpop_util::ParseError;
use std::fs::read_to_string;

use koopa::back::KoopaGenerator;
use koopa::ir::Type;

use sysyc::back::generate_asm;
use sysyc::front::generate_ir;
use sysyc::sysy;
use sysyc::utils::args::Params;
use sysyc::utils::logger::print_error_and_exit;
use sysyc::utils::SourceMap;
use sysyc::CompilerError;

fn main() {
    if let Err(e) = run() {
        print_error_and_exit(&e, 1);
    }
}

fn format_expected(expected: Vec<String>) -> String {
    if expected.is_empty() {
        "no expected tokens".to_string()
    } else {
        expected.join(", ")
    }
}

fn format_parse_error(source_map: &SourceMap, err: ParseError<usize, Token<'_>, &str>) -> String {
    match err {
        ParseError::InvalidToken { location } => {
            format!("Invalid token at {}", source_map.format_location(location))
        }
        ParseError::UnrecognizedEof { location, expected } => {
            format!(
                "Unexpected end of file at {}. Expected: {}",
                source_map.format_location(location),
                format_expected(expected)
            )
        }
        ParseError::UnrecognizedToken { token, expected } => {
            let (start, tok, _end) = token;
            format!(
                "Unrecognized token {:?} at {}. Expected: {}",
                tok,
                source_map.format_location(start),
                format_expected(expected)
            )
        }
        ParseError::ExtraToken { token } => {
            let (start, tok, _end) = token;
            format!(
                "Extra token {:?} at {}",
                tok,
                source_map.format_location(start)
            )
        }
        ParseError::User { error } => format!("Parse error: {}", error),
    }
}

fn run() -> Result<(), CompilerError> {
    let params = Params::from_args()?;

    // 目标为 riscv32，指针为 4 字节（影响 alloc 的栈空间计算）
    if params.riscv {
        Type::set_ptr_size(4);
    }

    let input = read_to_string(&params.input)?;
    let source_map = SourceMap::new(&input);

    let ast = sysy::CompUnitParser::new()
        .parse(&input)
        .map_err(|e| CompilerError::ParseError(format_parse_error(&source_map, e)))?;

    let program = generate_ir(&ast, Some(source_map))?;

    // 两种模式都先物化 Koopa IR 文本
    let mut text_gen = KoopaGenerator::new(Vec::new());
    text_gen.generate_on(&program)?;
    let ir_text = String::from_utf8(text_gen.writer())
        .map_err(|e| CompilerError::CodeGenError(format!("IR text is not UTF-8: {}", e)))?;

    if params.koopa {
        std::fs::write(&params.output, ir_text)?;
        return Ok(());
    }

    // -riscv：文本交回 koopa 的解析器，后端只面对重新类型化的程序
    let program = koopa::front::Driver::from(ir_text)
        .generate_program()
        .map_err(|e| CompilerError::CodeGenError(format!("emitted IR failed to re-parse: {:?}", e)))?;
    let asm = generate_asm(&program)?;
    std::fs::write(&params.output, asm)?;
    Ok(())
}
