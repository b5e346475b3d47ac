#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

/// プロジェクトディレクトリで実行するコマンド
fn stack_in(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.current_dir(project.path())
        .env("NO_COLOR", "1")
        .env_remove("STACKFLOW_PROJECT_ROOT")
        .env_remove("STACKFLOW_REGION")
        .env_remove("AWS_PROFILE");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("そのままクラウドに"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("output"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

/// upコマンドのヘルプに --yes と共通オプションが含まれることを確認
#[test]
fn test_up_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("up")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--region"))
        .stdout(predicate::str::contains("--profile"));
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// プロジェクト外で validate を実行するとエラーになることを確認
#[test]
fn test_validate_without_project() {
    let project = TestProject::new();
    stack_in(&project)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack.kdl"));
}

/// init でテンプレートが展開されることを確認
#[test]
fn test_init_writes_template() {
    let project = TestProject::new();
    stack_in(&project)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("stack.kdl"));

    assert!(project.exists("stack.kdl"));
    assert!(project.exists("scripts/podinfo.sh"));
}

/// 既存ファイルがある場合は --force なしで失敗することを確認
#[test]
fn test_init_refuses_to_overwrite() {
    let project = TestProject::new();
    project.write_stack_kdl("stack \"mine\"\n");

    stack_in(&project)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    stack_in(&project).args(["init", "--force"]).assert().success();
    let content = std::fs::read_to_string(project.path().join("stack.kdl")).unwrap();
    assert!(content.contains("stack \"app\""));
}

/// 存在しないテンプレート名でエラーになることを確認
#[test]
fn test_init_unknown_template() {
    let project = TestProject::new();
    stack_in(&project)
        .args(["init", "--template", "wordpress"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("podinfo"));
}

/// テンプレートの検証が成功し、作成順が表示されることを確認
#[test]
fn test_validate_template() {
    let project = TestProject::with_template();
    stack_in(&project)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("スタック定義は正常です"))
        .stdout(predicate::str::contains("app-vpc (vpc)"))
        .stdout(predicate::str::contains("app-instance (instance)"))
        .stdout(predicate::str::contains("public_ip ← app-instance.public_ip"));
}

/// サブディレクトリからでもプロジェクトルートが見つかることを確認
#[test]
fn test_validate_from_subdirectory() {
    let project = TestProject::with_template();
    let mut cmd = stack_in(&project);
    cmd.current_dir(project.path().join("scripts"))
        .arg("validate")
        .assert()
        .success();
}

/// VPC 外のサブネットは検証エラーになることを確認
#[test]
fn test_validate_reports_subnet_outside_vpc() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "broken"
provider "aws" {
    region "eu-central-1"
}
vpc "app-vpc" {
    cidr-block "10.0.0.0/16"
}
subnet "app-subnet" {
    vpc "app-vpc"
    cidr-block "192.168.1.0/24"
    availability-zone "eu-central-1a"
}
"#,
    );

    stack_in(&project)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("定義エラー"))
        .stderr(predicate::str::contains("app-subnet"));
}

/// 未作成の出力はエラーになることを確認
#[test]
fn test_output_before_up() {
    let project = TestProject::with_template();
    stack_in(&project)
        .args(["output", "public_ip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("まだ作成されていません"));
}

/// 未定義の出力名はエラーになることを確認
#[test]
fn test_output_unknown_name() {
    let project = TestProject::with_template();
    stack_in(&project)
        .args(["output", "private_ip"])
        .assert()
        .failure();
}

/// 状態ファイルから出力値が読めることを確認
#[test]
fn test_output_from_state() {
    let project = TestProject::with_template();
    project.write_instance_state("203.0.113.10");

    stack_in(&project)
        .args(["output", "public_ip"])
        .assert()
        .success()
        .stdout("203.0.113.10\n");

    stack_in(&project)
        .args(["output", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"public_ip\": \"203.0.113.10\""));
}

/// 状態がない場合の state 表示
#[test]
fn test_state_empty() {
    let project = TestProject::with_template();
    stack_in(&project)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("記録されているリソースはありません"));
}

/// 記録済みリソースの state 表示
#[test]
fn test_state_lists_resources() {
    let project = TestProject::with_template();
    project.write_instance_state("203.0.113.10");

    stack_in(&project)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("app-instance"))
        .stdout(predicate::str::contains("i-0123456789abcdef0"))
        .stdout(predicate::str::contains("203.0.113.10"));
}

/// 状態がない場合の down は何もしない
#[test]
fn test_down_without_state() {
    let project = TestProject::with_template();
    stack_in(&project)
        .arg("down")
        .assert()
        .success()
        .stdout(predicate::str::contains("削除するリソースはありません"));
}

/// down の確認で拒否するとキャンセルされることを確認
#[test]
fn test_down_cancelled() {
    let project = TestProject::with_template();
    project.write_instance_state("203.0.113.10");

    stack_in(&project)
        .arg("down")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("app-instance"))
        .stdout(predicate::str::contains("キャンセルしました"));

    assert!(project.exists(".stackflow/state.json"));
}

/// 未対応プロバイダーはエラーになることを確認
#[test]
fn test_plan_rejects_unknown_provider() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "app"
provider "gcp"
vpc "app-vpc" {
    cidr-block "10.0.0.0/16"
}
"#,
    );

    stack_in(&project)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gcp"));
}
