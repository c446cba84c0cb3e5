use std::fmt;

/// 编译器错误分类
///
/// 所有错误都在检测点构造并用 `?` 一路传播到驱动，
/// 由驱动统一打印并以非零码退出；不做任何恢复。
/// 内部不变量被破坏时也走同一条通道（InvariantError），
/// 不直接 panic，保证退出路径可控。
#[derive(Debug)]
pub enum CompilerError {
    // I/O 错误
    IoError(std::io::Error),
    // 命令行参数错误
    ArgsError(String),
    // 解析错误
    ParseError(String),
    // 作用域/符号错误：未定义、重定义、种类误用、维数不符
    ScopeError(String),
    // 常量上下文中出现非常量表达式
    ConstEvalError(String),
    // 初始化列表与数组形状不符
    ShapeError(String),
    // 内部不变量被破坏：弹空栈、循环外的 break/continue 等
    InvariantError(String),
    // 后端代码生成错误
    CodeGenError(String),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::IoError(e) => write!(f, "I/O error: {}", e),
            CompilerError::ArgsError(msg) => write!(f, "Argument error: {}", msg),
            CompilerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CompilerError::ScopeError(msg) => write!(f, "Scope error: {}", msg),
            CompilerError::ConstEvalError(msg) => write!(f, "Constant evaluation error: {}", msg),
            CompilerError::ShapeError(msg) => write!(f, "Initializer shape error: {}", msg),
            CompilerError::InvariantError(msg) => write!(f, "Internal invariant violated: {}", msg),
            CompilerError::CodeGenError(msg) => write!(f, "Code generation error: {}", msg),
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError(err)
    }
}
