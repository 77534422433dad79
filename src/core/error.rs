//! 错误类型
//!
//! 加载期错误逐行收集、最后统一汇报；查询期错误直接返回给调用方。

use crate::core::models::CourseCode;
use thiserror::Error;

/// 目录加载期的单条问题
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// 需求结构无法识别，只影响所在课程
    #[error("课程 {course} 的需求树格式错误 ({path}): {reason}")]
    MalformedTree {
        course: String,
        path: String,
        reason: String,
    },

    /// 课程代码为空或不含字母数字
    #[error("无效的课程代码: {raw:?}")]
    InvalidCourseCode { raw: String },

    /// 两条记录规范化后代码相同
    #[error("课程代码重复: {0}")]
    DuplicateCourse(CourseCode),

    /// 嵌套层数超过上限
    #[error("课程 {course} 的需求树嵌套超过 {limit} 层")]
    TreeTooDeep { course: String, limit: usize },
}

impl CatalogError {
    /// 构造器内部使用：课程名稍后由调用方补上
    pub(crate) fn with_course(self, code: &str) -> Self {
        match self {
            CatalogError::MalformedTree { path, reason, .. } => CatalogError::MalformedTree {
                course: code.to_string(),
                path,
                reason,
            },
            CatalogError::TreeTooDeep { limit, .. } => CatalogError::TreeTooDeep {
                course: code.to_string(),
                limit,
            },
            other => other,
        }
    }

    /// 是否为必须中止加载的错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::DuplicateCourse(_))
    }
}

/// 目录加载失败，包含整轮加载发现的全部问题
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("目录加载失败，共 {} 个问题", .issues.len())]
pub struct LoadError {
    pub issues: Vec<CatalogError>,
}

/// 查询期错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// 目标课程不在目录中
    #[error("课程不存在: {0}")]
    UnknownCourse(String),

    /// 需求树过深，拒绝求值
    #[error("课程 {course} 的需求树嵌套超过 {limit} 层，无法求值")]
    TreeTooDeep { course: CourseCode, limit: usize },
}

impl ResolveError {
    /// 可以直接展示给外部调用方的信息，不暴露内部结构
    pub fn public_message(&self) -> &'static str {
        match self {
            ResolveError::UnknownCourse(_) => "course not found",
            ResolveError::TreeTooDeep { .. } => "course requirements cannot be resolved",
        }
    }

    /// 是否对应"未找到"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::UnknownCourse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_course_fills_name() {
        let err = CatalogError::MalformedTree {
            course: String::new(),
            path: "$.all[0]".to_string(),
            reason: "未知标签".to_string(),
        }
        .with_course("CS240");
        assert!(err.to_string().contains("CS240"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = ResolveError::UnknownCourse("CS999".to_string());
        assert!(err.is_not_found());
        assert!(!err.public_message().contains("CS999"));
    }
}
