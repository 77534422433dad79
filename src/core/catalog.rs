//! 目录快照与原子替换
//!
//! 课程图一旦构建就不再修改。目录刷新时构建新的快照，
//! 校验完成后再整体替换共享引用；正在进行的查询继续持有旧快照。

use crate::core::error::ResolveError;
use crate::core::graph::CourseGraph;
use crate::core::models::{Course, CourseCode, Verdict};
use crate::core::requirement::DEFAULT_MAX_DEPTH;
use crate::core::resolver::{code_set, Resolver};
use crate::core::validator::{validate, ValidationReport};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// 不可变的目录快照：课程图 + 校验报告
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    graph: CourseGraph,
    report: ValidationReport,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    max_depth: usize,
}

impl CatalogSnapshot {
    /// 校验课程图并生成快照
    pub fn new(graph: CourseGraph) -> Self {
        Self::with_max_depth(graph, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(graph: CourseGraph, max_depth: usize) -> Self {
        let report = validate(&graph);
        let fingerprint = graph.fingerprint();
        Self {
            graph,
            report,
            fingerprint,
            loaded_at: Utc::now(),
            max_depth,
        }
    }

    pub fn graph(&self) -> &CourseGraph {
        &self.graph
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// 查找课程，供展示使用
    pub fn get(&self, raw: &str) -> Result<&Course, ResolveError> {
        self.graph
            .get_raw(raw)
            .ok_or_else(|| ResolveError::UnknownCourse(CourseCode::normalize(raw)))
    }

    /// 求值，并标记位于先修环上的目标
    pub fn resolve(
        &self,
        target: &CourseCode,
        completed: &HashSet<CourseCode>,
        in_progress: &HashSet<CourseCode>,
    ) -> Result<Verdict, ResolveError> {
        let mut verdict = Resolver::new(&self.graph)
            .with_max_depth(self.max_depth)
            .resolve(target, completed, in_progress)?;
        verdict.cycle_flagged = self.report.is_cyclic(target);
        if verdict.cycle_flagged {
            tracing::warn!("{} 位于先修环上，结论仅供参考", target);
        }
        Ok(verdict)
    }

    /// 接收原始字符串的求值接口
    pub fn resolve_codes<S: AsRef<str>>(
        &self,
        target: &str,
        completed: &[S],
        in_progress: &[S],
    ) -> Result<Verdict, ResolveError> {
        let target_code = CourseCode::parse(target)
            .ok_or_else(|| ResolveError::UnknownCourse(target.to_string()))?;
        self.resolve(&target_code, &code_set(completed), &code_set(in_progress))
    }
}

/// 当前目录的共享句柄
///
/// 读方拿到的是某个完整快照的 `Arc`，不会看到新旧混合的状态。
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new(CatalogSnapshot::new(CourseGraph::default()))
    }
}

impl CatalogHandle {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// 用新课程图替换当前快照，返回旧快照
    ///
    /// 校验在拿写锁之前完成，写锁内只做指针替换。
    pub fn replace(&self, graph: CourseGraph) -> Arc<CatalogSnapshot> {
        self.publish(CatalogSnapshot::new(graph))
    }

    /// 发布已经构建好的快照，返回旧快照
    pub fn publish(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let next = Arc::new(snapshot);
        tracing::info!(
            "发布目录快照 {}（{} 门课程）",
            &next.fingerprint[..12.min(next.fingerprint.len())],
            next.graph.len()
        );
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
