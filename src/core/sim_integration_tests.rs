use crate::core::catalog::{CatalogHandle, CatalogSnapshot};
use crate::core::error::ResolveError;
use crate::core::graph::LoadOptions;
use crate::core::models::CourseCode;
use crate::core::validator::ValidationOutcome;
use crate::storage::config::{AppConfig, ConfigManager};
use crate::storage::database::{CatalogStore, ImportMode};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// 目录接口抓取、parse_prereq 处理之后的数据形状
const CATALOG_JSON: &str = r#"[
  {"code": "cs135", "name": "Designing Functional Programs", "description": "", "prereqs": null,
   "postrequisites": [{"code": "cs136", "name": "Elementary Algorithm Design and Data Abstraction"}]},
  {"code": "cs136", "name": "Elementary Algorithm Design and Data Abstraction",
   "prereqs": {"one_of": [{"course": "cs135"}, {"course": "cs145"}]}},
  {"code": "cs137", "name": "Programming Principles", "prereqs": null},
  {"code": "cs138", "name": "Introduction to Data Abstraction and Implementation",
   "prereqs": {"course": "cs137"}, "antireqs": {"all": [{"not": "cs136"}, {"not": "cs146"}]}},
  {"code": "cs146", "name": "Elementary Algorithm Design and Data Abstraction (Advanced)",
   "prereqs": {"min_grade": {"course": "cs145", "percent": 75}}},
  {"code": "math135", "name": "Algebra for Honours Mathematics", "prereqs": null},
  {"code": "cs246", "name": "Object-Oriented Software Development",
   "prereqs": {"all": [{"one_of": ["cs136", "cs146"]}, "math135"]},
   "antireqs": "cs137"},
  {"code": "cs240", "name": "Data Structures and Data Management",
   "prereqs": {"all": [{"course": "cs245"}, {"one_of": [{"course": "cs246"}, {"course": "cs247"}]},
                        {"one_of": [{"course": "stat206"}, {"course": "stat230"}]}],
               "programs": ["Honours Computer Science", "BSE"]},
   "coreqs": {"course": "stat231"}},
  {"code": "cs245", "name": "Logic and Computation", "prereqs": {"all": ["cs136", "math135"]}},
  {"code": "CS 245", "name": "duplicate row that should win", "prereqs": {"all": ["cs136", "math135"]}},
  {"code": "cs999", "name": "broken", "prereqs": {"both": ["cs135"]}},
  {"code": null, "name": "row without code"}
]"#;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn code(raw: &str) -> CourseCode {
    CourseCode::parse(raw).unwrap()
}

fn codes(raw: &[&str]) -> Vec<CourseCode> {
    raw.iter().map(|r| code(r)).collect()
}

fn seeded_store(dir: &Path) -> CatalogStore {
    let json_path = dir.join("courses_parsed.json");
    write_file(&json_path, CATALOG_JSON);

    let mut store = CatalogStore::open(&dir.join("catalog.db")).unwrap();
    let summary = store.import_json_file(&json_path, ImportMode::Replace).unwrap();
    assert_eq!(summary.imported, 10);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.duplicates, 1);
    store
}

#[test]
fn sim_seed_load_validate_resolve() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());

    // 严格模式因 cs999 失败，宽松模式跳过它
    assert!(store.load_graph(LoadOptions::default()).is_err());
    let report = store
        .load_graph(LoadOptions::default().skip_malformed())
        .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.graph.len(), 9);

    let snapshot = CatalogSnapshot::new(report.graph);
    let validation = snapshot.report();
    assert_eq!(validation.outcome, ValidationOutcome::Valid);
    let dangling: Vec<_> = validation.dangling.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(dangling, vec!["CS145", "CS145", "CS247", "STAT206", "STAT230", "STAT231"]);

    let cs245 = snapshot.get("cs 245").unwrap();
    assert_eq!(cs245.name, "duplicate row that should win");
    assert_eq!(cs245.postrequisites, [code("CS240")].into_iter().collect());

    let cs240 = snapshot.get("CS240").unwrap();
    assert_eq!(
        cs240.program_restrictions,
        vec!["Honours Computer Science", "BSE"]
    );

    // 第一个场景：通过替代课程满足
    let ok = snapshot
        .resolve_codes("CS246", &["CS146", "MATH135"], &[])
        .unwrap();
    assert!(ok.satisfied);
    assert!(ok.unmet_prerequisites.is_empty());

    // 第二个场景：两个替代项都报告
    let missing = snapshot.resolve_codes("cs246", &["math135"], &[]).unwrap();
    assert!(!missing.satisfied);
    assert_eq!(missing.unmet_prerequisites, codes(&["CS136", "CS146"]));

    // 反修：已修 CS137 的学生不能修 CS246（目录里只写了课程列表）
    let anti = snapshot
        .resolve_codes("CS246", &["CS137", "CS136", "MATH135"], &[])
        .unwrap();
    assert!(!anti.satisfied);
    assert_eq!(anti.violated_antirequisites, codes(&["CS137"]));
    assert!(anti.unmet_prerequisites.is_empty());

    // 显式 not 的反修树
    let cs138 = snapshot
        .resolve_codes("CS138", &["CS137", "CS146"], &[])
        .unwrap();
    assert!(!cs138.satisfied);
    assert_eq!(cs138.violated_antirequisites, codes(&["CS146"]));

    // 悬空引用与同修建议
    let cs240_verdict = snapshot
        .resolve_codes("CS240", &["CS245", "CS246"], &[])
        .unwrap();
    assert!(!cs240_verdict.satisfied);
    assert_eq!(
        cs240_verdict.unmet_prerequisites,
        codes(&["STAT206", "STAT230"])
    );
    assert_eq!(
        cs240_verdict.dangling_prerequisites,
        codes(&["STAT206", "STAT230"])
    );
    assert_eq!(cs240_verdict.recommended_coreqs, codes(&["STAT231"]));

    // 统计课不在目录中，写进完成集合也无法满足
    let with_stats = snapshot
        .resolve_codes("CS240", &["CS245", "CS246", "STAT230"], &["STAT231"])
        .unwrap();
    assert!(!with_stats.satisfied);
    assert_eq!(
        with_stats.dangling_prerequisites,
        codes(&["STAT206", "STAT230"])
    );
    assert_eq!(with_stats.recommended_coreqs, codes(&["STAT231"]));

    // 目录里没有的目标课程
    assert_eq!(
        snapshot.resolve_codes("CS999", &[] as &[&str], &[]).unwrap_err(),
        ResolveError::UnknownCourse("CS999".to_string())
    );
}

#[test]
fn sim_refresh_swaps_whole_catalog() {
    let dir = tempdir().unwrap();
    let mut store = seeded_store(dir.path());

    let first = store
        .load_graph(LoadOptions::default().skip_malformed())
        .unwrap();
    let handle = CatalogHandle::new(CatalogSnapshot::new(first.graph));
    let old = handle.snapshot();

    // 刷新：加入一个形成环的课程对
    let update = dir.path().join("update.json");
    write_file(
        &update,
        r#"[{"code": "cs341", "prereqs": "cs350"}, {"code": "cs350", "prereqs": "cs341"}]"#,
    );
    store.import_json_file(&update, ImportMode::Merge).unwrap();
    let second = store
        .load_graph(LoadOptions::default().skip_malformed())
        .unwrap();
    handle.replace(second.graph);

    let new = handle.snapshot();
    assert_eq!(old.graph().len(), 9);
    assert_eq!(new.graph().len(), 11);
    assert!(old.get("CS341").is_err());
    assert_eq!(
        new.report().cycle(),
        Some(&[code("CS341"), code("CS350")][..])
    );

    let verdict = new.resolve_codes("cs350", &["cs341"], &[]).unwrap();
    assert!(verdict.satisfied);
    assert!(verdict.cycle_flagged);

    // 旧快照上的查询不受影响
    let verdict = old.resolve_codes("CS246", &["CS136", "MATH135"], &[]).unwrap();
    assert!(verdict.satisfied);
    assert!(!verdict.cycle_flagged);
}

#[test]
fn sim_config_controls_loading() {
    let dir = tempdir().unwrap();
    seeded_store(dir.path());

    let config_path = dir.path().join("config").join("config.json");
    let manager = ConfigManager::new(config_path);
    manager
        .save(&AppConfig {
            database_path: Some(dir.path().join("catalog.db")),
            skip_malformed_courses: false,
            ..Default::default()
        })
        .unwrap();

    let config = manager.load().unwrap();
    let store = CatalogStore::open(&config.database_path()).unwrap();
    assert!(store.load_graph(config.load_options()).is_err());

    let lenient = AppConfig {
        skip_malformed_courses: true,
        max_tree_depth: 2,
        ..config
    };
    // 深度 2 时 CS240、CS246 的树超限，作为格式问题被跳过
    let report = store.load_graph(lenient.load_options()).unwrap();
    assert!(report.graph.get_raw("CS240").is_none());
    assert!(report.graph.get_raw("CS246").is_none());
    assert!(report.graph.get_raw("CS136").is_some());
}
