#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

#[allow(deprecated)]
pub fn hukum_cmd() -> Command {
    let mut cmd = Command::cargo_bin("hukum").expect("Failed to find hukum binary");
    cmd.env_remove("HUKUM_CONFIG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Offline config under `root`: lexical-only, no reranker, generator on a closed port.
pub fn write_offline_config(root: &Path) -> PathBuf {
    let path = root.join("config.yaml");
    let yaml = format!(
        r#"lexical:
  indexPath: {index}
semantic:
  enabled: false
reranker:
  enabled: false
vectorStore:
  path: {vectors}
generation:
  baseUrl: http://127.0.0.1:9
  timeoutSecs: 2
"#,
        index = root.join("indices").display(),
        vectors = root.join("vectors").display(),
    );
    fs::write(&path, yaml).expect("write config");
    path
}

/// Two small legal documents under `root/docs`.
pub fn write_documents(root: &Path) -> PathBuf {
    let docs = root.join("docs");
    fs::create_dir_all(&docs).expect("create docs dir");
    fs::write(
        docs.join("kuhperdata.txt"),
        "Pasal 1365 KUHPerdata. Tiap perbuatan melanggar hukum yang membawa kerugian \
         kepada orang lain mewajibkan orang yang karena salahnya menerbitkan kerugian itu \
         mengganti kerugian tersebut.",
    )
    .expect("write document");
    fs::write(
        docs.join("uu_pt.txt"),
        "UU No. 40 Tahun 2007 tentang Perseroan Terbatas mengatur pendirian, \
         anggaran dasar dan organ perseroan.",
    )
    .expect("write document");
    docs
}
