//! Integration tests for running build scripts

mod common;

use buildtree::config::{build_target_tree, initial_properties, parse_script_file, BuildScript};
use buildtree::error::{BuildError, ExecutionError};
use buildtree::log::MemoryLogger;
use buildtree::runner::TaskContext;
use common::{create_test_script, memory_context};
use std::fs;
use std::path::Path;

fn context_for(dir: &Path, script: &BuildScript) -> (MemoryLogger, TaskContext) {
    let (logger, ctx) = memory_context();
    let ctx = ctx
        .with_working_dir(dir.to_path_buf())
        .with_properties(initial_properties(script));
    (logger, ctx)
}

#[cfg(unix)]
#[test]
fn test_dependencies_run_in_order() {
    let (temp_dir, script_path) = create_test_script(
        r#"
default: package
targets:
  restore:
    steps: echo restore >> order.txt
  compile:
    depends-on: restore
    steps: echo compile >> order.txt
  test:
    depends-on: [restore, compile]
    steps: echo test >> order.txt
  package:
    depends-on: [compile, test]
    steps: echo package >> order.txt
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (_logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_default(&mut ctx).unwrap();

    let order = fs::read_to_string(temp_dir.path().join("order.txt")).unwrap();
    assert_eq!(order, "restore\ncompile\ntest\npackage\n");
}

#[cfg(unix)]
#[test]
fn test_program_output_is_logged() {
    let (temp_dir, script_path) = create_test_script(
        r#"
properties:
  greeting: hello
targets:
  greet:
    steps:
      - run: echo
        args: ["${greeting}", "from buildtree"]
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_target(&mut ctx, "greet").unwrap();

    assert!(logger.contains("Run program 'echo hello \"from buildtree\"'"));
    assert!(logger.contains("hello from buildtree"));
}

#[cfg(unix)]
#[test]
fn test_property_overrides_reach_steps() {
    let (temp_dir, script_path) = create_test_script(
        r#"
properties:
  configuration: Debug
targets:
  build:
    steps: echo ${configuration} > configuration.txt
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (_logger, mut ctx) = context_for(temp_dir.path(), &script);
    ctx.properties_mut().set("configuration", "Release");

    tree.run_target(&mut ctx, "build").unwrap();

    let written = fs::read_to_string(temp_dir.path().join("configuration.txt")).unwrap();
    assert_eq!(written.trim(), "Release");
}

#[cfg(unix)]
#[test]
fn test_relative_tool_path_resolves_against_script_dir() {
    use std::os::unix::fs::PermissionsExt;

    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  stamp:
    steps:
      - run: ./tools/stamp.sh
        args: [stamped]
"#,
    );
    let tools = temp_dir.path().join("tools");
    fs::create_dir(&tools).unwrap();
    let tool = tools.join("stamp.sh");
    fs::write(&tool, "#!/bin/sh\necho \"$1\" > stamp.txt\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (_logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_target(&mut ctx, "stamp").unwrap();

    let stamp = fs::read_to_string(tools.join("stamp.txt")).unwrap();
    assert_eq!(stamp.trim(), "stamped");
}

#[cfg(unix)]
#[test]
fn test_ignored_exit_code_continues() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  lint:
    steps:
      - run: sh
        args: ["-c", "exit 4"]
        ignore-exit-code: true
      - log: lint done
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_target(&mut ctx, "lint").unwrap();

    assert!(logger.contains("Exit code 4 ignored"));
    assert!(logger.contains("lint done"));
}

#[cfg(unix)]
#[test]
fn test_failing_step_stops_the_build() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  compile:
    steps: exit 2
  package:
    depends-on: compile
    steps: touch package.zip
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (_logger, mut ctx) = context_for(temp_dir.path(), &script);

    let err = tree.run_target(&mut ctx, "package").unwrap_err();

    assert!(matches!(
        err,
        BuildError::Execution(ExecutionError::ProgramFailed { exit_code: 2, .. })
    ));
    assert!(!temp_dir.path().join("package.zip").exists());
    assert_eq!(ctx.depth(), 0);
}

#[cfg(unix)]
#[test]
fn test_timeout_fails_the_step() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  slow:
    steps:
      - run: sleep
        args: ["5"]
        timeout: 1
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (_logger, mut ctx) = context_for(temp_dir.path(), &script);

    let err = tree.run_target(&mut ctx, "slow").unwrap_err();

    assert!(err.to_string().contains("timed out"));
}

#[cfg(unix)]
#[test]
fn test_dry_run_skips_commands() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  clean:
    steps:
      - set:
          stage: cleaned
      - touch marker.txt
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (logger, ctx) = context_for(temp_dir.path(), &script);
    let mut ctx = ctx.with_dry_run(true);

    tree.run_target(&mut ctx, "clean").unwrap();

    assert!(!temp_dir.path().join("marker.txt").exists());
    assert_eq!(ctx.properties().get("stage"), Some("cleaned"));
    assert!(logger.contains("(dry run) skipped"));
}

#[test]
fn test_read_config_step_loads_properties() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  configure:
    steps:
      - read-config:
          file: settings.yml
          prefix: settings
      - log: "Deploying to ${settings/deploy/host}"
"#,
    );
    fs::write(
        temp_dir.path().join("settings.yml"),
        "deploy:\n  host: staging.local\n  port: 8080\n",
    )
    .unwrap();
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_target(&mut ctx, "configure").unwrap();

    assert_eq!(ctx.properties().get("settings/deploy/port"), Some("8080"));
    assert!(logger.contains("Deploying to staging.local"));
}

#[test]
fn test_unknown_placeholder_is_left_in_place() {
    let (temp_dir, script_path) = create_test_script(
        r#"
targets:
  publish:
    steps:
      - log: "Publishing to ${__buildtree_missing_feed__}"
"#,
    );
    let script = parse_script_file(&script_path).unwrap();
    let mut tree = build_target_tree(&script).unwrap();
    let (logger, mut ctx) = context_for(temp_dir.path(), &script);

    tree.run_target(&mut ctx, "publish").unwrap();

    assert!(logger.contains("Publishing to ${__buildtree_missing_feed__}"));
}
