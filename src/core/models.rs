//! 核心数据模型定义
//!
//! 课程之间的引用一律使用课程代码（弱引用），通过 `CourseGraph` 查找，
//! 不在模型里保存对象指针。

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// 规范化后的课程代码
///
/// 去掉所有空白并转为大写，例如 `"cs 240"` → `"CS240"`。
/// 相等性只比较规范化后的形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseCode(String);

impl CourseCode {
    /// 规范化原始代码（幂等）
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// 解析原始代码，空串或不含字母数字的输入返回 `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = Self::normalize(raw);
        if normalized.chars().any(|c| c.is_ascii_alphanumeric()) {
            Some(Self(normalized))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CourseCode {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("无效的课程代码: {:?}", raw))
    }
}

impl From<CourseCode> for String {
    fn from(code: CourseCode) -> Self {
        code.0
    }
}

impl Borrow<str> for CourseCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 叶子节点：对单门课程的引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub code: CourseCode,
    /// 最低成绩要求（百分制），完成集合不带成绩，仅用于展示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<u8>,
}

/// 先修逻辑树节点
///
/// 节点集合是封闭的，求值和校验都对它做穷尽匹配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementNode {
    /// 已修该课程即满足
    Leaf(Leaf),
    /// 全部子节点满足；空序列视为满足
    All(Vec<RequirementNode>),
    /// 至少一个子节点满足；空序列永不满足
    AnyOf(Vec<RequirementNode>),
    /// 子节点不满足时满足（用于反修课程）
    Not(Box<RequirementNode>),
}

impl Default for RequirementNode {
    fn default() -> Self {
        Self::none()
    }
}

impl RequirementNode {
    /// 无要求（空的 `All`）
    pub fn none() -> Self {
        RequirementNode::All(Vec::new())
    }

    /// 单门课程叶子
    pub fn course(code: CourseCode) -> Self {
        RequirementNode::Leaf(Leaf {
            code,
            min_grade: None,
        })
    }

    /// 对子树取反
    pub fn negate(node: RequirementNode) -> Self {
        RequirementNode::Not(Box::new(node))
    }

    /// 是否为"无要求"
    pub fn is_empty_requirement(&self) -> bool {
        matches!(self, RequirementNode::All(children) if children.is_empty())
    }

    /// 深度优先顺序收集所有叶子
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                RequirementNode::Leaf(leaf) => out.push(leaf),
                RequirementNode::All(children) | RequirementNode::AnyOf(children) => {
                    stack.extend(children.iter().rev());
                }
                RequirementNode::Not(child) => stack.push(child),
            }
        }
        out
    }

    /// 树的深度，单个叶子为 1
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, level)) = stack.pop() {
            max = max.max(level);
            match node {
                RequirementNode::Leaf(_) => {}
                RequirementNode::All(children) | RequirementNode::AnyOf(children) => {
                    stack.extend(children.iter().map(|c| (c, level + 1)));
                }
                RequirementNode::Not(child) => stack.push((child, level + 1)),
            }
        }
        max
    }

    /// 树中是否出现 `Not`
    pub fn contains_negation(&self) -> bool {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                RequirementNode::Leaf(_) => {}
                RequirementNode::All(children) | RequirementNode::AnyOf(children) => {
                    stack.extend(children.iter());
                }
                RequirementNode::Not(_) => return true,
            }
        }
        false
    }
}

/// 需求关系种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementRelation {
    Prerequisite,
    Antirequisite,
    Corequisite,
}

impl fmt::Display for RequirementRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementRelation::Prerequisite => write!(f, "先修"),
            RequirementRelation::Antirequisite => write!(f, "反修"),
            RequirementRelation::Corequisite => write!(f, "同修"),
        }
    }
}

/// 目录自带的后续课程条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostrequisiteRef {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// 原始后续课程条目，兼容目录接口的嵌套格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPostrequisite {
    Flat(PostrequisiteRef),
    Nested { postrequisite: PostrequisiteRef },
}

impl RawPostrequisite {
    pub fn into_ref(self) -> PostrequisiteRef {
        match self {
            RawPostrequisite::Flat(r) => r,
            RawPostrequisite::Nested { postrequisite } => postrequisite,
        }
    }
}

/// 课程目录中的原始记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCourseRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub prereqs: serde_json::Value,
    #[serde(default)]
    pub antireqs: serde_json::Value,
    #[serde(default)]
    pub coreqs: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postrequisites: Vec<RawPostrequisite>,
}

/// 目录数据里缺省字段常写成 `null`，按默认值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawCourseRecord {
    /// 只有代码和先修树的记录，测试和脚本里常用
    pub fn new(code: impl Into<String>, prereqs: serde_json::Value) -> Self {
        Self {
            code: code.into(),
            prereqs,
            ..Default::default()
        }
    }

    pub fn with_antireqs(mut self, antireqs: serde_json::Value) -> Self {
        self.antireqs = antireqs;
        self
    }

    pub fn with_coreqs(mut self, coreqs: serde_json::Value) -> Self {
        self.coreqs = coreqs;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// 课程
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub code: CourseCode,
    pub name: String,
    pub description: String,
    pub prerequisites: RequirementNode,
    pub antirequisites: RequirementNode,
    pub corequisites: RequirementNode,
    /// 把本课程列为先修的课程（加载时反推）
    pub postrequisites: BTreeSet<CourseCode>,
    /// 专业限制，如 "Honours Computer Science"
    pub program_restrictions: Vec<String>,
    /// 目录原样给出的后续课程列表
    pub listed_postrequisites: Vec<PostrequisiteRef>,
}

impl Course {
    /// 按关系取需求树
    pub fn requirement(&self, relation: RequirementRelation) -> &RequirementNode {
        match relation {
            RequirementRelation::Prerequisite => &self.prerequisites,
            RequirementRelation::Antirequisite => &self.antirequisites,
            RequirementRelation::Corequisite => &self.corequisites,
        }
    }
}

/// 求值结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub target: CourseCode,
    /// 先修满足且没有违反反修
    pub satisfied: bool,
    /// 未满足的先修课程（去重，保持首次出现顺序）
    pub unmet_prerequisites: Vec<CourseCode>,
    /// 每个未满足的"多选一"分组
    pub alternative_groups: Vec<Vec<CourseCode>>,
    /// `unmet_prerequisites` 中目录里不存在的课程
    pub dangling_prerequisites: Vec<CourseCode>,
    /// 已修但属于反修的课程
    pub violated_antirequisites: Vec<CourseCode>,
    /// 尚未修也未在修的同修课程
    pub recommended_coreqs: Vec<CourseCode>,
    /// 目标课程位于先修环上，结论无意义
    pub cycle_flagged: bool,
}

impl Verdict {
    /// 某门未满足课程是否因目录缺失
    pub fn is_dangling(&self, code: &CourseCode) -> bool {
        self.dangling_prerequisites.contains(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> CourseCode {
        CourseCode::parse(raw).unwrap()
    }

    #[test]
    fn test_normalize_case_and_space() {
        assert_eq!(CourseCode::normalize("cs 240"), "CS240");
        assert_eq!(code("cs 240"), code("CS240"));
        assert_eq!(code(" Cs\t240 ").as_str(), "CS240");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["cs 240", "MATH135", " stat 230 ", "cs499t", "ß 1"] {
            let once = CourseCode::normalize(raw);
            assert_eq!(CourseCode::normalize(&once), once);
        }
    }

    #[test]
    fn test_parse_rejects_empty_and_symbols() {
        assert!(CourseCode::parse("").is_none());
        assert!(CourseCode::parse("   ").is_none());
        assert!(CourseCode::parse("--/").is_none());
    }

    #[test]
    fn test_code_serde_normalizes() {
        let parsed: CourseCode = serde_json::from_str("\"cs 136\"").unwrap();
        assert_eq!(parsed.as_str(), "CS136");
        assert!(serde_json::from_str::<CourseCode>("\"  \"").is_err());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"CS136\"");
    }

    #[test]
    fn test_leaves_and_depth() {
        let tree = RequirementNode::All(vec![
            RequirementNode::AnyOf(vec![
                RequirementNode::course(code("CS136")),
                RequirementNode::course(code("CS146")),
            ]),
            RequirementNode::course(code("MATH135")),
        ]);
        let leaves: Vec<_> = tree.leaves().iter().map(|l| l.code.as_str()).collect();
        assert_eq!(leaves, vec!["CS136", "CS146", "MATH135"]);
        assert_eq!(tree.depth(), 3);
        assert!(!tree.contains_negation());
        assert!(RequirementNode::none().is_empty_requirement());
    }

    #[test]
    fn test_raw_postrequisite_forms() {
        let json = r#"[{"code": "cs341", "name": "Algorithms"},
                       {"postrequisite": {"code": "cs343", "name": "Concurrency"}}]"#;
        let raw: Vec<RawPostrequisite> = serde_json::from_str(json).unwrap();
        let refs: Vec<_> = raw.into_iter().map(RawPostrequisite::into_ref).collect();
        assert_eq!(refs[0].code, "cs341");
        assert_eq!(refs[1].name, "Concurrency");
    }

    #[test]
    fn test_raw_record_tolerates_nulls() {
        let json = r#"{"code": "cs240", "name": null, "description": null,
                       "prereqs": null, "postrequisites": null}"#;
        let record: RawCourseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.code, "cs240");
        assert!(record.name.is_empty());
        assert!(record.prereqs.is_null());
        assert!(record.coreqs.is_null());
        assert!(record.postrequisites.is_empty());
    }
}
