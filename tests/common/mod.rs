#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Mapping configuration used across the integration suites.
pub const PATIENT_CONFIG: &str = r#"{
  "name": "patients",
  "module": "registration",
  "priority": 10,
  "source": {"database": "legacy", "table": "PATIENT"},
  "target": {"database": "his", "table": "patient"},
  "batchSize": 2,
  "dependencies": [],
  "mappings": [
    {"source": "HN", "target": "hn", "transformers": ["TRIM"], "validators": ["REQUIRED", "HN_FORMAT"]},
    {"source": "BIRTHDATE", "target": "birthDate", "transformers": ["BUDDHIST_TO_ISO"], "validators": ["VALID_DATE"]},
    {"source": "SEX", "target": "gender", "transformers": ["MAP_GENDER"]},
    {"source": "OLD_FLAG", "target": "oldFlag", "ignore": true}
  ]
}"#;

pub const PATIENT_ROWS: &str = "\
HN,BIRTHDATE,SEX,OLD_FLAG
 0001234 ,2566-05-15,1,x
0001235,2540-01-02,female,y
HN-99,,3,z
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
