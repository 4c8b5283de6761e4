use thiserror::Error;

/// 编译过程中统一的错误类型，两种错误都携带 1 起始的源码行号。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CcssError {
    /// 结构或表达式语法错误。
    #[error("解析失败: {message} (第 {line} 行)")]
    Parse { line: usize, message: String },
    /// 求值阶段的类型、运算或查找错误。
    #[error("求值失败: {message} (第 {line} 行)")]
    Eval { line: usize, message: String },
}

pub type CcssResult<T> = Result<T, CcssError>;

impl CcssError {
    pub fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        CcssError::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn eval<S: Into<String>>(line: usize, message: S) -> Self {
        CcssError::Eval {
            line,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            CcssError::Parse { line, .. } | CcssError::Eval { line, .. } => *line,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CcssError::Parse { message, .. } | CcssError::Eval { message, .. } => message,
        }
    }
}
