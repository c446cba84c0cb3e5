use std::env::args;
use crate::CompilerError;

/// 命令行参数：`<prog> <mode> <input> -o <output>`，正好五个
#[derive(Debug, Clone)]
pub struct Params {
    pub input: String,
    pub output: String,
    pub koopa: bool,
    pub riscv: bool,
}

impl Params {
    pub fn from_args() -> Result<Self, CompilerError> {
        let args: Vec<String> = args().collect();
        if args.len() != 5 {
            return Err(CompilerError::ArgsError(format!(
                "expected `<mode> <input> -o <output>`, got {} argument(s)",
                args.len() - 1
            )));
        }
        let (koopa, riscv) = match args[1].as_str() {
            "-koopa" => (true, false),
            "-riscv" => (false, true),
            other => {
                return Err(CompilerError::ArgsError(format!(
                    "unknown mode `{}`, expected -koopa or -riscv",
                    other
                )));
            }
        };
        if args[3] != "-o" {
            return Err(CompilerError::ArgsError(format!(
                "expected `-o` before the output file, got `{}`",
                args[3]
            )));
        }
        Ok(Params {
            input: args[2].clone(),
            output: args[4].clone(),
            koopa,
            riscv,
        })
    }
}
