pub mod front;
pub mod back;
pub mod utils;

pub use utils::CompilerError;

use lalrpop_util::lalrpop_mod;

// 引用 lalrpop 生成的解析器（语法定义见 src/sysy.lalrpop）
lalrpop_mod!(pub sysy);
