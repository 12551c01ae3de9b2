use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

pub const BIN: &str = "export-photos-to-nextcloud";

/// Paths used by one test run.
pub struct Sandbox {
    pub temp_dir: TempDir,
    pub export_dir: ChildPath,
    pub nc_dir: ChildPath,
    pub log_file: ChildPath,
    /// Written by the fake osxphotos with its export arguments.
    pub calls: ChildPath,
    pub osxphotos: PathBuf,
}

impl Sandbox {
    /// A sandbox whose fake osxphotos exits with `exit_code` after exporting.
    pub fn with_exit_code(exit_code: i32) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let export_dir = temp_dir.child("export");
        let nc_dir = temp_dir.child("nextcloud");
        let log_file = temp_dir.child("test.log");
        let calls = temp_dir.child("osxphotos-calls.txt");

        let script = temp_dir.child("bin/osxphotos");
        script
            .write_str(&format!(
                r#"#!/bin/sh
case "$1" in
  version)
    echo "osxphotos, version 0.72.1"
    ;;
  export)
    echo "$@" >> "{calls}"
    dest="$2"
    dry=0
    for arg in "$@"; do
      if [ "$arg" = "--dry-run" ]; then dry=1; fi
    done
    if [ "$dry" -eq 0 ]; then
      mkdir -p "$dest/2023/05" "$dest/2024/01"
      echo jpeg > "$dest/2023/05/IMG_0001.jpg"
      echo jpeg > "$dest/2024/01/IMG_0002.jpg"
    fi
    echo "Exporting 2 photos to $dest..."
    printf 'Exporting caf\351.jpg\n'
    printf 'exiftool: caf\351 has no date\n' >&2
    echo "exiftool warning: minor" >&2
    echo "Processed: 2 photos, exported: 2, updated: 0, skipped: 0, updated EXIF data: 0, missing: 0, error: 0, touched date: 0"
    exit {exit_code}
    ;;
  *)
    exit 64
    ;;
esac
"#,
                calls = calls.path().display(),
                exit_code = exit_code,
            ))
            .unwrap();
        let mut perms = std::fs::metadata(script.path()).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(script.path(), perms).unwrap();

        Sandbox {
            export_dir,
            nc_dir,
            log_file,
            calls,
            osxphotos: script.path().to_path_buf(),
            temp_dir,
        }
    }

    pub fn new() -> Self {
        Self::with_exit_code(0)
    }

    /// Command with the fake engine and all three required paths set.
    pub fn command(&self) -> Command {
        let mut cmd = self.bare_command();
        cmd.arg("-e")
            .arg(self.export_dir.path())
            .arg("-n")
            .arg(self.nc_dir.path())
            .arg("-l")
            .arg(self.log_file.path());
        cmd
    }

    /// Command with only the fake engine set.
    pub fn bare_command(&self) -> Command {
        let mut cmd = Command::cargo_bin(BIN).unwrap();
        cmd.arg("--osxphotos").arg(&self.osxphotos);
        cmd
    }

    pub fn log_content(&self) -> String {
        std::fs::read_to_string(self.log_file.path()).unwrap()
    }

    pub fn engine_calls(&self) -> String {
        std::fs::read_to_string(self.calls.path()).unwrap_or_default()
    }
}
