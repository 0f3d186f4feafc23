//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理的光谱文件。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（逗号分隔的多模式）
//! - 递归目录搜索
//! - 按自然顺序排序（`p2.txt` 排在 `p10.txt` 之前）
//!
//! ## 依赖关系
//! - 被 `commands/backsub.rs` 与 `commands/loading.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名，`regex` 切分数字段

use crate::error::{RamanError, Result};

use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<glob::Pattern>,
    recursive: bool,
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式），空串表示全部匹配
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                glob::Pattern::new(s).map_err(|e| {
                    RamanError::InvalidArgument(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件，按自然顺序返回
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }

        if !self.input.is_dir() {
            return Err(RamanError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        sort_natural(&mut files);
        log::debug!("collected {} file(s) under {}", files.len(), self.input.display());
        Ok(files)
    }

    fn matches_patterns(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.iter().any(|p| p.matches(filename))
    }
}

/// 文件名的片段：数字段按数值比较，其余按文本比较
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Number(u128),
    Text(String),
}

fn chunks(re: &Regex, name: &str) -> Vec<Chunk> {
    re.find_iter(name)
        .map(|m| {
            let s = m.as_str();
            match s.parse::<u128>() {
                Ok(n) => Chunk::Number(n),
                Err(_) => Chunk::Text(s.to_lowercase()),
            }
        })
        .collect()
}

/// 按路径的自然顺序排序
fn sort_natural(paths: &mut [PathBuf]) {
    let re = match Regex::new(r"\d+|\D+") {
        Ok(re) => re,
        Err(_) => {
            paths.sort();
            return;
        }
    };

    paths.sort_by(|a, b| {
        let ka = chunks(&re, &a.to_string_lossy());
        let kb = chunks(&re, &b.to_string_lossy());
        match ka.cmp(&kb) {
            Ordering::Equal => a.cmp(b),
            other => other,
        }
    });
}
