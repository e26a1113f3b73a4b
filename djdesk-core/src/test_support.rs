// djdesk-core/src/test_support.rs
//! Fixtures shared by unit tests: throwaway Django projects and shell
//! scripts standing in for a Python interpreter.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use djdesk_common::Config;

pub(crate) fn write_script(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Lays out a minimal project: `manage.py`, `pyproject.toml`, and a
/// `src/djdesk` package with a stray `__pycache__`.
pub(crate) fn scaffold_project(config: &Config, dependencies: &[&str]) {
    let app = config.app_source_dir();
    std::fs::create_dir_all(app.join("settings")).unwrap();
    std::fs::create_dir_all(app.join("__pycache__")).unwrap();
    std::fs::write(app.join("__init__.py"), "").unwrap();
    std::fs::write(app.join("settings/__init__.py"), "").unwrap();
    std::fs::write(app.join("settings/local.py"), "DEBUG = True\n").unwrap();
    std::fs::write(app.join("__pycache__/__init__.cpython-314.pyc"), b"\x00\x01").unwrap();
    std::fs::write(config.manage_py(), "import sys\n").unwrap();

    let deps = dependencies
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    std::fs::write(
        config.pyproject_path(),
        format!("[project]\nname = \"djdesk\"\ndependencies = [{deps}]\n"),
    )
    .unwrap();
}

/// A `sh` script answering the handful of interpreter invocations the
/// bundler makes. `-m venv DIR` copies the script into `DIR/bin/python3`;
/// the `-c` import check succeeds only when some `PYTHONPATH` entry holds a
/// `djdesk` package. Every invocation is appended to `$0.log` next to the
/// script's original location.
pub(crate) fn fake_python(path: &Path) {
    let log = path.with_extension("log");
    let body = format!(
        r#"LOG="{log}"
echo "$*" >> "$LOG"
case "$1" in
  --version)
    echo "Python 3.14.0"
    ;;
  -m)
    case "$2" in
      venv)
        mkdir -p "$3/bin"
        cp "$0" "$3/bin/python3"
        echo "home = /usr/bin" > "$3/pyvenv.cfg"
        ;;
      pip)
        echo "Successfully installed"
        ;;
    esac
    ;;
  -c)
    OLD_IFS="$IFS"; IFS=:
    for entry in $PYTHONPATH; do
      if [ -d "$entry/djdesk" ]; then
        printf "5.2.8"
        exit 0
      fi
    done
    IFS="$OLD_IFS"
    echo "ModuleNotFoundError: No module named 'djdesk'" >&2
    exit 1
    ;;
  *manage.py)
    if [ "$2" = "collectstatic" ]; then
      mkdir -p "$DJANGO_STATIC_ROOT/admin"
      echo "body {{}}" > "$DJANGO_STATIC_ROOT/admin/base.css"
      echo "1 static file copied to '$DJANGO_STATIC_ROOT'."
    fi
    ;;
esac
exit 0"#,
        log = log.display()
    );
    write_script(path, &body);
}

/// Lines the fake interpreter logged, one per invocation.
pub(crate) fn fake_python_calls(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path.with_extension("log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Whether `pid` is still executing. A zombie nobody has reaped yet counts
/// as gone.
pub(crate) fn process_running(pid: u32) -> bool {
    if unsafe { libc::kill(pid as libc::pid_t, 0) } != 0 {
        return false;
    }
    if Path::new("/proc/self").exists() {
        return std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                let (_, rest) = stat.rsplit_once(')')?;
                rest.split_whitespace().next().map(|state| state != "Z")
            })
            .unwrap_or(false);
    }
    std::process::Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output()
        .map(|out| {
            let state = String::from_utf8_lossy(&out.stdout);
            !state.trim().is_empty() && !state.trim_start().starts_with('Z')
        })
        .unwrap_or(false)
}

/// Polls for up to five seconds without needing a runtime.
pub(crate) fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..100 {
        if !process_running(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}
