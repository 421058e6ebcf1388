#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct TestContext {
    pub root: PathBuf,
    tmp: tempfile::TempDir,
}

impl TestContext {
    /// A command pointed at this context's isolated deployment root.
    pub fn new_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_zeppctl"));
        cmd.timeout(Duration::from_secs(30));
        cmd.arg("--root").arg(&self.root);
        cmd.arg("--system-env-file").arg(self.tmp.path().join("environment"));
        cmd.arg("--unit-file").arg(self.tmp.path().join("zeppelin.service"));
        cmd
    }

    pub fn scratch(&self) -> &Path {
        self.tmp.path()
    }

    /// Build a minimal distribution tarball next to the root.
    pub fn make_dist_tarball(&self) -> PathBuf {
        let path = self.tmp.path().join("zeppelin-0.7.0.tar.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::fast(),
        ));

        let mut add = |name: &str, content: &str| {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        };
        add("zeppelin-0.7.0/bin/zeppelin-daemon.sh", "#!/bin/sh\n");
        add("zeppelin-0.7.0/conf/zeppelin-env.sh.template", "# defaults\n");
        add(
            "zeppelin-0.7.0/conf/zeppelin-site.xml.template",
            "<?xml version=\"1.0\"?>\n<configuration>\n</configuration>\n",
        );
        add(
            "zeppelin-0.7.0/notebook/2A94M5J1Z/note.json",
            "{\"name\": \"tutorial\"}\n",
        );
        builder.into_inner().unwrap().finish().unwrap();
        path
    }
}

pub fn zeppctl() -> TestContext {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("deploy");
    TestContext { root, tmp }
}
