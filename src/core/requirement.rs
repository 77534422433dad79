//! 需求树构造模块
//!
//! 把上游已经结构化的先修 JSON 转成 `RequirementNode`。
//! 纯函数：不做 I/O，也不访问课程图，叶子只保存课程代码。
//!
//! 支持的形状：
//! - `"CS136"` / `{"course": "cs136"}` → 叶子
//! - `{"min_grade": {"course": "cs136", "percent": 60}}` → 带成绩要求的叶子
//! - `{"all": [...]}` → 全部满足
//! - `{"one_of": [...]}`（别名 `any`、`any_of`）→ 任一满足
//! - `{"not": ...}` → 取反
//! - 顶层 `null`、`{}` 或只有 `programs` 的对象 → 无要求

use crate::core::error::CatalogError;
use crate::core::models::{CourseCode, Leaf, RequirementNode};
use serde_json::{Map, Value};

/// 默认的嵌套层数上限
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// 构造结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuiltRequirement {
    pub node: RequirementNode,
    /// 各层 `programs` 字段收集到的专业限制（去重，保持顺序）
    pub programs: Vec<String>,
}

/// 使用默认层数上限构造需求树
pub fn build_requirement(value: &Value) -> Result<BuiltRequirement, CatalogError> {
    RequirementBuilder::new(DEFAULT_MAX_DEPTH).build(value)
}

/// 构造反修树，见 [`RequirementBuilder::build_antirequisites`]
pub fn build_antirequisites(value: &Value) -> Result<BuiltRequirement, CatalogError> {
    RequirementBuilder::new(DEFAULT_MAX_DEPTH).build_antirequisites(value)
}

/// 需求树构造器
#[derive(Debug, Clone, Copy)]
pub struct RequirementBuilder {
    max_depth: usize,
}

impl Default for RequirementBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl RequirementBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// 构造一棵需求树
    pub fn build(&self, value: &Value) -> Result<BuiltRequirement, CatalogError> {
        let mut programs = Vec::new();
        let node = match value {
            Value::Null => RequirementNode::none(),
            other => self.node(other, "$", 1, &mut programs)?,
        };
        Ok(BuiltRequirement { node, programs })
    }

    /// 构造反修树
    ///
    /// 目录里的反修通常只是课程列表。若树中没有 `Not`，
    /// 把每个叶子改写成 `Not(叶子)` 并放进一个 `All`；已经带 `Not` 的树原样保留。
    pub fn build_antirequisites(&self, value: &Value) -> Result<BuiltRequirement, CatalogError> {
        let built = self.build(value)?;
        if built.node.contains_negation() {
            return Ok(built);
        }
        let exclusions = built
            .node
            .leaves()
            .into_iter()
            .map(|leaf| RequirementNode::negate(RequirementNode::Leaf(leaf.clone())))
            .collect();
        Ok(BuiltRequirement {
            node: RequirementNode::All(exclusions),
            programs: built.programs,
        })
    }

    fn node(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
        programs: &mut Vec<String>,
    ) -> Result<RequirementNode, CatalogError> {
        if depth > self.max_depth {
            return Err(CatalogError::TreeTooDeep {
                course: String::new(),
                limit: self.max_depth,
            });
        }

        match value {
            Value::String(raw) => leaf(raw, None, path),
            Value::Object(map) => self.object(map, path, depth, programs),
            Value::Null => Err(malformed(path, "嵌套位置不允许 null")),
            Value::Array(_) => Err(malformed(path, "缺少标签的数组")),
            Value::Bool(_) | Value::Number(_) => {
                Err(malformed(path, format!("无法识别的节点: {}", value)))
            }
        }
    }

    fn object(
        &self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
        programs: &mut Vec<String>,
    ) -> Result<RequirementNode, CatalogError> {
        if let Some(value) = map.get("programs") {
            collect_programs(value, &format!("{path}.programs"), programs)?;
        }

        let tags: Vec<(&String, &Value)> =
            map.iter().filter(|(key, _)| key.as_str() != "programs").collect();

        match tags.as_slice() {
            [] => Ok(RequirementNode::none()),
            [(key, inner)] => {
                let child_path = format!("{path}.{key}");
                match key.as_str() {
                    "all" => Ok(RequirementNode::All(
                        self.children(inner, &child_path, depth, programs)?,
                    )),
                    "one_of" | "any" | "any_of" => Ok(RequirementNode::AnyOf(
                        self.children(inner, &child_path, depth, programs)?,
                    )),
                    "not" => Ok(RequirementNode::negate(self.node(
                        inner,
                        &child_path,
                        depth + 1,
                        programs,
                    )?)),
                    "course" => match inner {
                        Value::String(raw) => leaf(raw, None, &child_path),
                        _ => Err(malformed(&child_path, "course 必须是字符串")),
                    },
                    "min_grade" => min_grade(inner, &child_path),
                    other => Err(malformed(path, format!("未知标签 {other:?}"))),
                }
            }
            many => {
                let keys: Vec<&str> = many.iter().map(|(key, _)| key.as_str()).collect();
                Err(malformed(
                    path,
                    format!("一个节点只能有一个标签，实际为 {}", keys.join(", ")),
                ))
            }
        }
    }

    fn children(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
        programs: &mut Vec<String>,
    ) -> Result<Vec<RequirementNode>, CatalogError> {
        let Value::Array(items) = value else {
            return Err(malformed(path, "子节点必须是数组"));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.node(item, &format!("{path}[{i}]"), depth + 1, programs))
            .collect()
    }
}

fn leaf(raw: &str, min_grade: Option<u8>, path: &str) -> Result<RequirementNode, CatalogError> {
    let code = CourseCode::parse(raw)
        .ok_or_else(|| malformed(path, format!("无效的课程代码 {raw:?}")))?;
    Ok(RequirementNode::Leaf(Leaf { code, min_grade }))
}

fn min_grade(value: &Value, path: &str) -> Result<RequirementNode, CatalogError> {
    let Value::Object(map) = value else {
        return Err(malformed(path, "min_grade 必须是对象"));
    };
    let Some(Value::String(raw)) = map.get("course") else {
        return Err(malformed(path, "min_grade 缺少 course"));
    };
    let percent = match map.get("percent") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(p) if p <= 100 => Some(p as u8),
            _ => return Err(malformed(path, format!("无效的成绩要求: {v}"))),
        },
    };
    leaf(raw, percent, path)
}

fn collect_programs(
    value: &Value,
    path: &str,
    programs: &mut Vec<String>,
) -> Result<(), CatalogError> {
    let Value::Array(items) = value else {
        return Err(malformed(path, "programs 必须是字符串数组"));
    };
    for item in items {
        let Value::String(name) = item else {
            return Err(malformed(path, "programs 必须是字符串数组"));
        };
        if !programs.contains(name) {
            programs.push(name.clone());
        }
    }
    Ok(())
}

fn malformed(path: &str, reason: impl Into<String>) -> CatalogError {
    CatalogError::MalformedTree {
        course: String::new(),
        path: path.to_string(),
        reason: reason.into(),
    }
}
