//! 需求树校验模块
//!
//! 每次目录加载后执行一次，检查：
//! - 课程之间的先修环（A 需要 B，B 需要 A）
//! - 悬空引用：叶子指向目录中不存在的课程（只警告）
//! - 空的"多选一"分组（永远无法满足）
//!
//! 边 `X → Y` 表示 X 的先修树里有引用 Y 的叶子。
//! 遍历全部是迭代实现，代价 O(V+E)。

use crate::core::graph::CourseGraph;
use crate::core::models::{CourseCode, RequirementNode, RequirementRelation};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// 环检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationOutcome {
    Valid,
    /// 按遍历顺序给出的第一个环
    CycleDetected(Vec<CourseCode>),
}

/// 悬空引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// 引用方
    pub course: CourseCode,
    /// 不存在的课程
    pub code: CourseCode,
    pub relation: RequirementRelation,
}

/// 校验报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    /// 位于任意先修环上的课程
    pub cyclic_courses: BTreeSet<CourseCode>,
    pub dangling: Vec<DanglingReference>,
    /// 含有空 `AnyOf` 的需求树
    pub empty_alternatives: Vec<(CourseCode, RequirementRelation)>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.outcome == ValidationOutcome::Valid
    }

    pub fn cycle(&self) -> Option<&[CourseCode]> {
        match &self.outcome {
            ValidationOutcome::Valid => None,
            ValidationOutcome::CycleDetected(cycle) => Some(cycle),
        }
    }

    /// 该课程的可满足性是否无定义
    pub fn is_cyclic(&self, code: &CourseCode) -> bool {
        self.cyclic_courses.contains(code)
    }
}

const RELATIONS: [RequirementRelation; 3] = [
    RequirementRelation::Prerequisite,
    RequirementRelation::Antirequisite,
    RequirementRelation::Corequisite,
];

/// 校验整个课程图
pub fn validate(graph: &CourseGraph) -> ValidationReport {
    let nodes = graph.codes();
    let adj = build_adjacency(graph, &nodes);

    let outcome = match find_first_cycle(&nodes, &adj) {
        Some(cycle) => {
            let names: Vec<&str> = cycle.iter().map(CourseCode::as_str).collect();
            tracing::warn!("检测到先修环: {}", names.join(" -> "));
            ValidationOutcome::CycleDetected(cycle)
        }
        None => ValidationOutcome::Valid,
    };
    let cyclic_courses = cyclic_members(&nodes, &adj);

    let mut dangling = Vec::new();
    let mut empty_alternatives = Vec::new();
    for &code in &nodes {
        let Some(course) = graph.get(code) else {
            continue;
        };
        for relation in RELATIONS {
            let tree = course.requirement(relation);
            let mut seen = HashSet::new();
            for leaf in tree.leaves() {
                if !graph.contains(&leaf.code) && seen.insert(&leaf.code) {
                    tracing::debug!(
                        "悬空引用: {} 的{}课程 {} 不在目录中",
                        code,
                        relation,
                        leaf.code
                    );
                    dangling.push(DanglingReference {
                        course: code.clone(),
                        code: leaf.code.clone(),
                        relation,
                    });
                }
            }
            if has_empty_any_of(tree) {
                tracing::warn!("{} 的{}要求含有空的多选一分组，永远无法满足", code, relation);
                empty_alternatives.push((code.clone(), relation));
            }
        }
    }

    tracing::info!(
        "校验完成: {} 门课程，{} 门位于先修环上，{} 个悬空引用",
        nodes.len(),
        cyclic_courses.len(),
        dangling.len()
    );

    ValidationReport {
        outcome,
        cyclic_courses,
        dangling,
        empty_alternatives,
    }
}

type Adjacency<'a> = BTreeMap<&'a CourseCode, Vec<&'a CourseCode>>;

/// 先修邻接表，后继按字典序排列，只保留图中存在的课程
fn build_adjacency<'a>(graph: &'a CourseGraph, nodes: &[&'a CourseCode]) -> Adjacency<'a> {
    let mut adj = BTreeMap::new();
    for &code in nodes {
        let mut successors: Vec<&CourseCode> = graph
            .get(code)
            .map(|course| course.prerequisites.leaves())
            .unwrap_or_default()
            .into_iter()
            .map(|leaf| &leaf.code)
            .filter(|target| graph.contains(target))
            .collect();
        successors.sort();
        successors.dedup();
        adj.insert(code, successors);
    }
    adj
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// 三色 DFS，返回遇到的第一条回边所围成的环
fn find_first_cycle(nodes: &[&CourseCode], adj: &Adjacency<'_>) -> Option<Vec<CourseCode>> {
    let mut color: HashMap<&CourseCode, Color> = HashMap::new();

    for &start in nodes {
        if color.get(start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }
        color.insert(start, Color::Gray);
        let mut stack: Vec<(&CourseCode, usize)> = vec![(start, 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let next = adj.get(node).and_then(|s| s.get(top.1)).copied();
            top.1 += 1;

            match next {
                Some(next) => match color.get(next).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        let from = stack.iter().position(|(c, _)| *c == next).unwrap_or(0);
                        return Some(stack[from..].iter().map(|(c, _)| (*c).clone()).collect());
                    }
                    Color::White => {
                        color.insert(next, Color::Gray);
                        stack.push((next, 0));
                    }
                    Color::Black => {}
                },
                None => {
                    color.insert(node, Color::Black);
                    stack.pop();
                }
            }
        }
    }

    None
}

/// 求出位于环上的全部课程（Kosaraju 强连通分量）
fn cyclic_members(nodes: &[&CourseCode], adj: &Adjacency<'_>) -> BTreeSet<CourseCode> {
    // 第一遍：完成顺序
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(nodes.len());
    for &start in nodes {
        if !visited.insert(start) {
            continue;
        }
        let mut stack = vec![(start, 0usize)];
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let next = adj.get(node).and_then(|s| s.get(top.1)).copied();
            top.1 += 1;
            match next {
                Some(next) => {
                    if visited.insert(next) {
                        stack.push((next, 0));
                    }
                }
                None => {
                    order.push(node);
                    stack.pop();
                }
            }
        }
    }

    // 第二遍：在反向图上按完成顺序倒序收集分量
    let mut reverse: HashMap<&CourseCode, Vec<&CourseCode>> = HashMap::new();
    for (&from, successors) in adj {
        for &to in successors {
            reverse.entry(to).or_default().push(from);
        }
    }

    let mut assigned = HashSet::new();
    let mut cyclic = BTreeSet::new();
    for &root in order.iter().rev() {
        if !assigned.insert(root) {
            continue;
        }
        let mut component = vec![root];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &prev in reverse.get(node).into_iter().flatten() {
                if assigned.insert(prev) {
                    component.push(prev);
                    stack.push(prev);
                }
            }
        }
        let self_loop = adj.get(root).is_some_and(|s| s.contains(&root));
        if component.len() > 1 || self_loop {
            cyclic.extend(component.into_iter().cloned());
        }
    }
    cyclic
}

fn has_empty_any_of(tree: &RequirementNode) -> bool {
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        match node {
            RequirementNode::Leaf(_) => {}
            RequirementNode::AnyOf(children) if children.is_empty() => return true,
            RequirementNode::All(children) | RequirementNode::AnyOf(children) => {
                stack.extend(children.iter());
            }
            RequirementNode::Not(child) => stack.push(child),
        }
    }
    false
}
