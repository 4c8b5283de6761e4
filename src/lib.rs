//! ccss_oxide 库入口，提供面向 Rust 与 Node.js 的 CleverCSS 编译能力。
//! 内部主要分为四个阶段：结构解析（Parser）→ 规则扁平化（Flattener）
//! → 语义求值（Evaluator）→ CSS 序列化（Serializer）。

mod ast;
mod color;
mod error;
mod evaluator;
mod expr;
mod flatten;
mod importer;
mod lexer;
mod parser;
mod scanner;
mod serializer;
mod sprite;
mod units;
mod utils;
mod value;

pub use crate::error::{CcssError, CcssResult};
pub use crate::sprite::{
    FileSpriteSource, RecordingSpriteSource, SpriteBox, SpriteMap, SpriteSource,
};

use evaluator::Evaluator;
use importer::ImportResolver;
use indexmap::IndexMap;
use serializer::Serializer;
use std::fs;
use std::path::{Path, PathBuf};

/// CleverCSS 编译配置。
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// 是否输出压缩后的 CSS。
    pub minify: bool,
    /// 当前源文件所在目录，用于解析相对的 @import 与 spritemap() 路径。
    pub current_dir: Option<PathBuf>,
    /// 调用方注入的变量，值为表达式源码，优先于样式表中的同名变量。
    pub context: IndexMap<String, String>,
}

/// 编译 CleverCSS 源码为 CSS 文本。
///
/// # 参数
/// * `source` - 待编译的源码
/// * `options` - 编译配置
pub fn compile(source: &str, options: CompileOptions) -> CcssResult<String> {
    let mut sprites = FileSpriteSource::new();
    compile_with_sprites(source, options, &mut sprites)
}

/// 与 [`compile`] 相同，但由调用方提供精灵图解析器，
/// 例如用 [`RecordingSpriteSource`] 收集样式表用到的子图。
pub fn compile_with_sprites(
    source: &str,
    options: CompileOptions,
    sprites: &mut dyn SpriteSource,
) -> CcssResult<String> {
    run(source, &options, sprites, ImportResolver::new())
}

/// 从文件路径编译，自动处理 @import；入口文件被再次导入时报告循环导入。
pub fn compile_file<P: AsRef<Path>>(path: P, mut options: CompileOptions) -> CcssResult<String> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|err| {
        CcssError::parse(0, format!("cannot read \"{}\": {err}", path.display()))
    })?;
    if options.current_dir.is_none() {
        if let Some(parent) = path.parent() {
            options.current_dir = Some(parent.to_path_buf());
        }
    }
    let mut importer = ImportResolver::new();
    importer.register_root(path);
    let mut sprites = FileSpriteSource::new();
    run(&source, &options, &mut sprites, importer)
}

fn run(
    source: &str,
    options: &CompileOptions,
    sprites: &mut dyn SpriteSource,
    importer: ImportResolver,
) -> CcssResult<String> {
    log::debug!(
        "compiling {} bytes (minify: {})",
        source.len(),
        options.minify
    );
    let base_dir = options
        .current_dir
        .clone()
        .or_else(|| std::env::current_dir().ok());
    let mut evaluator = Evaluator::new(options.minify, sprites).with_importer(importer);
    evaluator.bind_context(&options.context, base_dir.as_deref())?;
    let rules = evaluator.evaluate_source(source, base_dir.as_deref())?;
    log::debug!(
        "evaluated {} rules, {} files loaded",
        rules.len(),
        evaluator.importer().imported_files().count()
    );
    Ok(Serializer::new(options.minify).to_css(&rules))
}

#[cfg(feature = "node")]
use napi::{Error, Result};
#[cfg(feature = "node")]
use napi_derive::napi;
#[cfg(feature = "node")]
use std::collections::HashMap;

/// Node.js 侧的编译选项对象。
#[cfg(feature = "node")]
#[napi(object)]
pub struct JsCompileOptions {
    /// 是否压缩输出 CSS。
    pub minify: Option<bool>,
    /// 源文件路径，用于解析 @import 与 spritemap()。
    pub filename: Option<String>,
    /// 注入的变量。
    pub context: Option<HashMap<String, String>>,
}

/// 暴露给 Node.js 的编译函数。
#[cfg(feature = "node")]
#[napi]
pub fn compile_ccss(source: String, options: Option<JsCompileOptions>) -> Result<String> {
    let opt = options.unwrap_or(JsCompileOptions {
        minify: None,
        filename: None,
        context: None,
    });
    let mut compile_options = CompileOptions {
        minify: opt.minify.unwrap_or(false),
        ..CompileOptions::default()
    };
    if let Some(filename) = opt.filename {
        let path = PathBuf::from(&filename);
        if let Some(parent) = path.parent() {
            compile_options.current_dir = Some(parent.to_path_buf());
        }
    }
    if let Some(context) = opt.context {
        compile_options.context.extend(context);
    }
    let result =
        compile(&source, compile_options).map_err(|err| Error::from_reason(err.to_string()))?;
    Ok(result)
}
