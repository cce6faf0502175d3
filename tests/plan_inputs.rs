// tests/plan_inputs.rs

use std::error::Error;
use std::fs;
use std::sync::Arc;

use buildwatch::dag::BuildPlan;
use buildwatch::fs::{FileSystem, RealFileSystem};
use buildwatch::watch::{InputCollector, WatchRoot};
use buildwatch_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn config_globs_resolve_to_watch_roots_outside_output() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = RealFileSystem.canonicalize(dir.path())?;
    fs::create_dir_all(root.join("src/net"))?;
    fs::create_dir_all(root.join("schema"))?;
    fs::create_dir_all(root.join("out/gen"))?;
    fs::write(root.join("src/main.c"), "")?;
    fs::write(root.join("src/net/tcp.c"), "")?;
    fs::write(root.join("src/net/tcp_test.c"), "")?;
    fs::write(root.join("out/gen/api.c"), "")?;
    fs::write(root.join("Makefile"), "")?;

    let cfg = ConfigFileBuilder::new()
        .output_root("out")
        .with_task("generate", TaskConfigBuilder::new("gen").dir("schema").build())
        .with_task(
            "compile",
            TaskConfigBuilder::new("make")
                .file("Makefile")
                .file("**/*.c")
                .exclude("**/*_test.c")
                .after("generate")
                .build(),
        )
        .build();

    let plan = BuildPlan::from_config(&cfg, &root)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut collector = InputCollector::new(Arc::clone(&fs));
    let mut excluded = 0;
    for task in plan.tasks() {
        let inputs = task.inputs.resolve(fs.as_ref(), &root)?;
        excluded += collector.append_task_inputs(&inputs, &task.output_root).excluded;
    }
    let roots: Vec<WatchRoot> = collector.into_watched().freeze().iter().cloned().collect();

    assert_eq!(
        roots,
        vec![
            WatchRoot::tree(root.join("schema")),
            WatchRoot::file(root.join("Makefile")),
            WatchRoot::file(root.join("src/main.c")),
            WatchRoot::file(root.join("src/net/tcp.c")),
        ]
    );
    assert_eq!(excluded, 1, "generated source under the output root");
    Ok(())
}
