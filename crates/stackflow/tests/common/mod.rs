use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// 組み込み podinfo テンプレートを展開したプロジェクト
    pub fn with_template() -> Self {
        let project = Self::new();
        for file in stackflow_core::templates::get_builtin_template("podinfo").unwrap() {
            project.write_file(file.path, file.content);
        }
        project
    }

    pub fn write_stack_kdl(&self, content: &str) {
        self.write_file("stack.kdl", content);
    }

    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// 作成済みインスタンス1台分の状態ファイルを書き込む
    #[allow(dead_code)]
    pub fn write_instance_state(&self, public_ip: &str) {
        let state = serde_json::json!({
            "version": 1,
            "updated_at": "2026-01-01T00:00:00Z",
            "stack": "app",
            "resources": {
                "app-instance": {
                    "id": "i-0123456789abcdef0",
                    "resource_type": "instance",
                    "status": "running",
                    "resource": {
                        "name": "app-instance",
                        "tags": { "Name": "app-instance" },
                        "spec": {
                            "kind": "instance",
                            "ami": "ami-0f673487d7e5f89ca",
                            "instance_type": "t2.micro",
                            "security_groups": ["app-sg"],
                            "subnet": "app-subnet",
                            "associate_public_ip_address": true,
                            "user_data": null
                        }
                    },
                    "depends_on": ["app-sg", "app-subnet"],
                    "attributes": { "public_ip": public_ip },
                    "created_at": "2026-01-01T00:00:00Z",
                    "updated_at": "2026-01-01T00:00:00Z"
                }
            },
            "outputs": { "public_ip": public_ip }
        });
        self.write_file(
            ".stackflow/state.json",
            &serde_json::to_string_pretty(&state).unwrap(),
        );
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.root.path().join(relative).exists()
    }
}
