mod support;

use predicates::str::contains;
use std::fs;
use support::TestEnv;

#[test]
fn nested_adds_get_child_paths() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;

    env.todo()
        .args(["add", "Groceries"])
        .assert()
        .success()
        .stdout(contains("Added 1 todo"))
        .stdout(contains("1 Groceries"));
    env.run(&["add", "Milk", "--to", "1"])?;
    env.run(&["add", "Bread", "--to", "1"])?;

    assert_eq!(env.list(&[])?, "1 Groceries\n  1.1 Milk\n  1.2 Bread\n");
    Ok(())
}

#[test]
fn completed_child_moves_to_done_namespace_and_back() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Groceries"])?;
    env.run(&["add", "Milk", "--to", "1"])?;
    env.run(&["add", "Bread", "--to", "1"])?;

    env.todo()
        .args(["complete", "1.2"])
        .assert()
        .success()
        .stdout(contains("Completed 1 todo"));
    assert_eq!(env.list(&["--all"])?, "1 Groceries\n  1.1 Milk\n  1.c1 Bread\n");
    assert_eq!(env.list(&["--done"])?, "  1.c1 Bread\n");

    env.todo()
        .args(["reopen", "1.c1"])
        .assert()
        .success()
        .stdout(contains("Reopened 1 todo"));
    assert_eq!(env.list(&[])?, "1 Groceries\n  1.1 Milk\n  1.2 Bread\n");
    Ok(())
}

#[test]
fn completing_roots_leaves_siblings_alone() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    for text in ["A", "B", "C"] {
        env.run(&["add", text])?;
    }

    env.todo()
        .args(["complete", "1", "2"])
        .assert()
        .success()
        .stdout(contains("Completed 2 todos"));

    assert_eq!(env.list(&[])?, "1 C\n");
    assert_eq!(env.list(&["--all"])?, "c1 A\nc2 B\n1 C\n");
    Ok(())
}

#[test]
fn parent_completes_with_its_last_child() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "P"])?;
    env.run(&["add", "X", "--to", "1"])?;
    env.run(&["add", "Y", "--to", "1"])?;

    env.run(&["complete", "1.1", "1.2"])?;

    assert_eq!(env.list(&[])?, "No todos\n");
    assert_eq!(env.list(&["-a"])?, "c1 P\n  c1.c1 X\n  c1.c2 Y\n");
    Ok(())
}

#[test]
fn paths_are_rederived_between_invocations() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "P"])?;
    env.run(&["add", "X", "--to", "1"])?;
    env.run(&["add", "Y", "--to", "1"])?;

    env.run(&["complete", "1.1"])?;
    assert_eq!(env.list(&[])?, "1 P\n  1.1 Y\n");
    env.run(&["complete", "1.1"])?;
    assert_eq!(env.list(&[])?, "No todos\n");
    Ok(())
}

#[test]
fn cycle_is_rejected_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "A"])?;
    env.run(&["add", "B", "--to", "1"])?;
    let before = fs::read(env.store())?;

    env.todo()
        .args(["move", "1", "1.1"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("cycle"));

    assert_eq!(fs::read(env.store())?, before);
    Ok(())
}

#[test]
fn ambiguous_text_is_rejected_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Write tests"])?;
    env.run(&["add", "Write docs"])?;
    let before = fs::read(env.store())?;

    env.todo()
        .args(["complete", "Write"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Ambiguous reference 'Write'"))
        .stderr(contains("\"Write tests\""))
        .stderr(contains("\"Write docs\""));
    assert_eq!(fs::read(env.store())?, before);

    env.run(&["complete", "Write tests"])?;
    assert_eq!(env.list(&[])?, "1 Write docs\n");
    Ok(())
}

#[test]
fn bullet_list_adds_a_tree() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;

    env.todo()
        .args(["add", "- A\n  - A1\n  - A2\n- B"])
        .assert()
        .success()
        .stdout(contains("Added 4 todos"));

    assert_eq!(env.list(&[])?, "1 A\n  1.1 A1\n  1.2 A2\n2 B\n");
    Ok(())
}

#[test]
fn bullet_list_goes_under_target() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Trip"])?;

    env.run(&["add", "--to", "1", "* Passport\n* Tickets"])?;

    assert_eq!(env.list(&[])?, "1 Trip\n  1.1 Passport\n  1.2 Tickets\n");
    Ok(())
}

#[test]
fn leading_path_word_picks_parent() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Groceries"])?;

    env.run(&["add", "1", "Oat", "milk"])?;
    env.run(&["add", "9.9", "bottles"])?;

    assert_eq!(env.list(&[])?, "1 Groceries\n  1.1 Oat milk\n2 9.9 bottles\n");
    Ok(())
}

#[test]
fn edit_and_move_update_the_tree() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Groceries"])?;
    env.run(&["add", "Milk"])?;

    env.todo()
        .args(["edit", "2", "Oat", "milk"])
        .assert()
        .success()
        .stdout(contains("Updated 1 todo"));
    env.todo()
        .args(["move", "2", "1"])
        .assert()
        .success()
        .stdout(contains("Moved 1 todo"));
    assert_eq!(env.list(&[])?, "1 Groceries\n  1.1 Oat milk\n");

    env.run(&["move", "1.1", ""])?;
    assert_eq!(env.list(&[])?, "1 Groceries\n2 Oat milk\n");
    Ok(())
}

#[test]
fn adding_under_done_parent_reopens_it() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Groceries"])?;
    env.run(&["complete", "1"])?;

    env.run(&["add", "Milk", "--to", "c1"])?;

    assert_eq!(env.list(&[])?, "1 Groceries\n  1.1 Milk\n");
    Ok(())
}

#[test]
fn clean_removes_done_subtrees() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "- Old\n  - Older\n- New"])?;
    env.run(&["complete", "1"])?;

    env.todo()
        .args(["clean"])
        .assert()
        .success()
        .stdout(contains("Removed 2 todos"));
    assert_eq!(env.list(&["--all"])?, "1 New\n");

    env.todo()
        .args(["clean"])
        .assert()
        .success()
        .stdout(contains("Removed 0 todos"));
    Ok(())
}

#[test]
fn search_matches_text_fragments() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "- Groceries\n  - Oat milk\n  - Bread\n- Call Milo"])?;
    env.run(&["complete", "1.2"])?;

    assert_eq!(env.run(&["search", "MIL"])?, "  1.1 Oat milk\n2 Call Milo\n");
    assert_eq!(env.run(&["search", "-s", "Mil"])?, "2 Call Milo\n");
    assert_eq!(env.run(&["search", "--all", "bread"])?, "  1.c1 Bread\n");
    assert_eq!(env.run(&["search", "cheese"])?, "No matches\n");
    Ok(())
}

#[test]
fn missing_reference_fails() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "Groceries"])?;

    env.todo()
        .args(["complete", "7.7"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("No todo matches '7.7'"));
    Ok(())
}

#[test]
fn empty_text_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;

    env.todo()
        .args(["add", "   "])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Invalid input"));
    assert!(!env.store().exists());
    Ok(())
}

#[test]
fn store_file_is_flat_and_versioned() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "- A\n  - A1"])?;

    let doc = env.store_json()?;
    assert_eq!(doc["schema_version"], 2);
    let todos = doc["todos"].as_array().ok_or("todos array")?;
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0]["parent_uid"], "");
    assert_eq!(todos[1]["parent_uid"], todos[0]["uid"]);
    assert_eq!(todos[1]["statuses"]["completion"], "pending");
    Ok(())
}

#[test]
fn editor_text_is_used_for_add_and_edit() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;

    // `true` leaves the pre-filled buffer as it is.
    env.todo()
        .env("VISUAL", "true")
        .args(["add", "-e", "Draft", "plan"])
        .assert()
        .success()
        .stdout(contains("1 Draft plan"));

    env.todo()
        .env("VISUAL", "true")
        .args(["edit", "-e", "1"])
        .assert()
        .success()
        .stdout(contains("Updated 1 todo"));
    assert_eq!(env.list(&[])?, "1 Draft plan\n");

    env.todo()
        .env("VISUAL", "false")
        .args(["add", "-e"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Editor error"));
    Ok(())
}

#[test]
fn usage_errors_exit_with_one() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new()?;
    env.run(&["add", "A"])?;

    env.todo()
        .args(["move", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("PARENT"));
    env.todo().args(["list", "--done", "--all"]).assert().failure().code(1);
    env.todo().args(["complete"]).assert().failure().code(1);

    env.todo().arg("--version").assert().success().code(0);
    Ok(())
}
