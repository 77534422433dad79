//! 需求求值模块
//!
//! 针对一个课程图快照，把目标课程的先修、反修、同修树
//! 与调用方给出的完成集合比对，生成 `Verdict`。
//!
//! 每个节点求值后同时给出两份说明：
//! - blockers：为什么不满足
//! - support：为什么满足
//!
//! `Not` 直接交换两者，因此任意嵌套的取反都能给出正确解释。
//! 说明中的课程分两类：missing（未修，报告为未满足的先修）和
//! taken（已修但处于取反之下，报告为违反的反修）。
//! 目录中不存在的课程代码（悬空引用）永远不满足，与完成集合无关。

use crate::core::error::ResolveError;
use crate::core::graph::CourseGraph;
use crate::core::models::{CourseCode, RequirementNode, Verdict};
use crate::core::requirement::DEFAULT_MAX_DEPTH;
use std::collections::{HashMap, HashSet};

/// 求值说明
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    /// 未修的课程
    pub missing: Vec<CourseCode>,
    /// 已修的课程
    pub taken: Vec<CourseCode>,
    /// 未满足的多选一分组
    pub alternatives: Vec<Vec<CourseCode>>,
}

impl Explanation {
    fn extend(&mut self, other: &Explanation) {
        self.missing.extend(other.missing.iter().cloned());
        self.taken.extend(other.taken.iter().cloned());
        self.alternatives.extend(other.alternatives.iter().cloned());
    }
}

/// 单个节点的求值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub satisfied: bool,
    pub blockers: Explanation,
    pub support: Explanation,
}

impl Evaluation {
    fn satisfied(support: Explanation) -> Self {
        Self {
            satisfied: true,
            blockers: Explanation::default(),
            support,
        }
    }

    fn unsatisfied(blockers: Explanation) -> Self {
        Self {
            satisfied: false,
            blockers,
            support: Explanation::default(),
        }
    }
}

/// 需求求值器
///
/// 只读持有课程图，本身无状态，可以在多个线程中同时使用。
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'g> {
    graph: &'g CourseGraph,
    max_depth: usize,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g CourseGraph) -> Self {
        Self {
            graph,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 设置递归深度上限
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 求值目标课程
    ///
    /// 同修按 `completed ∪ in_progress` 求值，只作为建议，不影响 `satisfied`。
    pub fn resolve(
        &self,
        target: &CourseCode,
        completed: &HashSet<CourseCode>,
        in_progress: &HashSet<CourseCode>,
    ) -> Result<Verdict, ResolveError> {
        let course = self
            .graph
            .get(target)
            .ok_or_else(|| ResolveError::UnknownCourse(target.to_string()))?;

        let prereqs = self.evaluate(target, &course.prerequisites, completed)?;
        let antireqs = self.evaluate(target, &course.antirequisites, completed)?;

        let available: HashSet<CourseCode> = completed.union(in_progress).cloned().collect();
        let coreqs = self.evaluate(target, &course.corequisites, &available)?;

        let mut unmet = Vec::new();
        let mut violated = Vec::new();
        let mut alternative_groups = Vec::new();
        for evaluation in [&prereqs, &antireqs] {
            if evaluation.satisfied {
                continue;
            }
            push_unique(&mut unmet, &evaluation.blockers.missing);
            push_unique(&mut violated, &evaluation.blockers.taken);
            for group in &evaluation.blockers.alternatives {
                if !alternative_groups.contains(group) {
                    alternative_groups.push(group.clone());
                }
            }
        }

        let dangling = unmet
            .iter()
            .filter(|code| !self.graph.contains(code))
            .cloned()
            .collect();

        let mut recommended_coreqs = Vec::new();
        if !coreqs.satisfied {
            push_unique(&mut recommended_coreqs, &coreqs.blockers.missing);
        }

        let verdict = Verdict {
            target: target.clone(),
            satisfied: prereqs.satisfied && antireqs.satisfied,
            unmet_prerequisites: unmet,
            alternative_groups,
            dangling_prerequisites: dangling,
            violated_antirequisites: violated,
            recommended_coreqs,
            cycle_flagged: false,
        };
        tracing::debug!(
            "求值 {}: satisfied={}, 未满足 {} 门，违反反修 {} 门",
            target,
            verdict.satisfied,
            verdict.unmet_prerequisites.len(),
            verdict.violated_antirequisites.len()
        );
        Ok(verdict)
    }

    /// 只给出完成集合的简化接口
    pub fn resolve_completed(
        &self,
        target: &CourseCode,
        completed: &HashSet<CourseCode>,
    ) -> Result<Verdict, ResolveError> {
        self.resolve(target, completed, &HashSet::new())
    }

    /// 接收原始字符串的接口
    ///
    /// 代码在这里统一规范化一次；无法解析的完成记录直接忽略。
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

    /// 对单棵树求值，`course` 只用于错误信息
    pub fn evaluate(
        &self,
        course: &CourseCode,
        tree: &RequirementNode,
        completed: &HashSet<CourseCode>,
    ) -> Result<Evaluation, ResolveError> {
        let mut evaluator = Evaluator {
            graph: self.graph,
            completed,
            course,
            max_depth: self.max_depth,
            memo: HashMap::new(),
        };
        evaluator.eval(tree, 1).inspect_err(|e| {
            tracing::warn!("{}", e);
        })
    }
}

/// 把原始字符串转成代码集合，丢弃无效项
pub fn code_set<S: AsRef<str>>(raw: &[S]) -> HashSet<CourseCode> {
    raw.iter()
        .filter_map(|s| CourseCode::parse(s.as_ref()))
        .collect()
}

fn push_unique(out: &mut Vec<CourseCode>, codes: &[CourseCode]) {
    for code in codes {
        if !out.contains(code) {
            out.push(code.clone());
        }
    }
}

/// 单次求值的上下文，备忘表只在本次调用内有效
struct Evaluator<'a> {
    graph: &'a CourseGraph,
    completed: &'a HashSet<CourseCode>,
    course: &'a CourseCode,
    max_depth: usize,
    memo: HashMap<*const RequirementNode, Evaluation>,
}

impl Evaluator<'_> {
    fn eval(&mut self, node: &RequirementNode, depth: usize) -> Result<Evaluation, ResolveError> {
        if depth > self.max_depth {
            return Err(ResolveError::TreeTooDeep {
                course: self.course.clone(),
                limit: self.max_depth,
            });
        }

        let key: *const RequirementNode = node;
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.clone());
        }

        let result = match node {
            RequirementNode::Leaf(leaf) => {
                if self.graph.contains(&leaf.code) && self.completed.contains(&leaf.code) {
                    Evaluation::satisfied(Explanation {
                        taken: vec![leaf.code.clone()],
                        ..Default::default()
                    })
                } else {
                    Evaluation::unsatisfied(Explanation {
                        missing: vec![leaf.code.clone()],
                        ..Default::default()
                    })
                }
            }
            RequirementNode::All(children) => {
                // 不在第一个失败处停下，一次收集全部未满足项
                let mut satisfied = true;
                let mut blockers = Explanation::default();
                let mut support = Explanation::default();
                for child in children {
                    let e = self.eval(child, depth + 1)?;
                    if e.satisfied {
                        support.extend(&e.support);
                    } else {
                        satisfied = false;
                        blockers.extend(&e.blockers);
                    }
                }
                if satisfied {
                    Evaluation::satisfied(support)
                } else {
                    Evaluation::unsatisfied(blockers)
                }
            }
            RequirementNode::AnyOf(children) => {
                let mut satisfied = false;
                let mut blockers = Explanation::default();
                let mut support = Explanation::default();
                for child in children {
                    let e = self.eval(child, depth + 1)?;
                    if e.satisfied {
                        satisfied = true;
                        support.extend(&e.support);
                    } else {
                        blockers.extend(&e.blockers);
                    }
                }
                if satisfied {
                    Evaluation::satisfied(support)
                } else {
                    if children.len() > 1 {
                        let mut group = Vec::new();
                        push_unique(&mut group, &blockers.missing);
                        if group.len() > 1 {
                            blockers.alternatives.push(group);
                        }
                    }
                    Evaluation::unsatisfied(blockers)
                }
            }
            RequirementNode::Not(child) => {
                let e = self.eval(child, depth + 1)?;
                Evaluation {
                    satisfied: !e.satisfied,
                    blockers: e.support,
                    support: e.blockers,
                }
            }
        };

        self.memo.insert(key, result.clone());
        Ok(result)
    }
}
