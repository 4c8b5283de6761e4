use crate::error::{CcssError, CcssResult};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 负责定位并读取 `@import` 的文件，记录导入顺序并检测循环导入。
#[derive(Debug, Default)]
pub struct ImportResolver {
    /// 已读取的源码，按绝对路径保存，保持导入顺序。
    loaded: IndexMap<PathBuf, String>,
    /// 正在处理中的文件链。
    stack: Vec<PathBuf>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把入口文件登记为“正在处理”，这样它被再次导入时会报告循环。
    pub fn register_root(&mut self, path: &Path) {
        let path = canonical(path);
        self.stack.push(path.clone());
        self.loaded.insert(path, String::new());
    }

    /// 读取导入目标并压栈；调用方处理完后必须调用 [`ImportResolver::finish`]。
    pub fn enter(
        &mut self,
        target: &str,
        current_dir: Option<&Path>,
        line: usize,
    ) -> CcssResult<(PathBuf, String)> {
        let path = self.resolve_path(target, current_dir, line)?;
        if self.stack.contains(&path) {
            return Err(CcssError::parse(
                line,
                format!("circular import of \"{}\"", path.display()),
            ));
        }
        if self.loaded.contains_key(&path) {
            return Err(CcssError::parse(
                line,
                format!("file \"{}\" was already imported", path.display()),
            ));
        }
        let content = fs::read_to_string(&path).map_err(|err| {
            CcssError::parse(line, format!("cannot read \"{}\": {err}", path.display()))
        })?;
        log::debug!("imported {} ({} bytes)", path.display(), content.len());
        self.loaded.insert(path.clone(), content.clone());
        self.stack.push(path.clone());
        Ok((path, content))
    }

    pub fn finish(&mut self) {
        self.stack.pop();
    }

    /// 按导入顺序列出已读取的文件。
    pub fn imported_files(&self) -> impl Iterator<Item = &Path> {
        self.loaded.keys().map(PathBuf::as_path)
    }

    fn resolve_path(
        &self,
        target: &str,
        current_dir: Option<&Path>,
        line: usize,
    ) -> CcssResult<PathBuf> {
        let raw = Path::new(target);
        let candidate = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            match current_dir {
                Some(dir) => dir.join(raw),
                None => std::env::current_dir()
                    .map(|cwd| cwd.join(raw))
                    .unwrap_or_else(|_| raw.to_path_buf()),
            }
        };
        if !candidate.is_file() {
            return Err(CcssError::parse(
                line,
                format!("file \"{target}\" does not exist"),
            ));
        }
        Ok(canonical(&candidate))
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    #[test]
    fn resolves_relative_to_current_dir() {
        let mut resolver = ImportResolver::new();
        let (path, content) = resolver
            .enter("partials/colors.ccss", Some(&fixtures()), 1)
            .unwrap();
        assert!(path.ends_with("partials/colors.ccss"));
        assert!(content.contains("primary"));
        resolver.finish();
        assert_eq!(resolver.imported_files().count(), 1);
    }

    #[test]
    fn missing_file_fails_with_line() {
        let mut resolver = ImportResolver::new();
        let err = resolver
            .enter("nope.ccss", Some(&fixtures()), 4)
            .unwrap_err();
        assert_eq!(err, CcssError::parse(4, "file \"nope.ccss\" does not exist"));
    }

    #[test]
    fn second_import_is_rejected() {
        let mut resolver = ImportResolver::new();
        resolver
            .enter("partials/colors.ccss", Some(&fixtures()), 1)
            .unwrap();
        resolver.finish();
        let err = resolver
            .enter("partials/colors.ccss", Some(&fixtures()), 2)
            .unwrap_err();
        assert!(err.message().contains("already imported"));
    }

    #[test]
    fn import_of_active_file_is_a_cycle() {
        let mut resolver = ImportResolver::new();
        resolver.register_root(&fixtures().join("import.ccss"));
        let err = resolver
            .enter("import.ccss", Some(&fixtures()), 3)
            .unwrap_err();
        assert!(err.message().starts_with("circular import"));
    }
}
