// djdesk-core/src/bundle/launcher.rs
use std::path::Path;

use djdesk_aio::fs::{atomic_write_file, set_permissions};
use djdesk_common::config::{DEFAULT_DJANGO_ENV, DEFAULT_SETTINGS_MODULE};
use djdesk_common::error::Result;
use tracing::debug;

/// Entry point placed at the bundle root. It puts `src/` on the import path,
/// fills in the settings defaults and runs the development server without the
/// autoreloader.
pub fn launcher_script() -> String {
    format!(
        r#"#!/usr/bin/env python
"""Start the bundled Django project on the requested host and port."""

from __future__ import annotations

import argparse
import os
import sys
from pathlib import Path


def prepend_pythonpath(entry: Path) -> None:
    current = os.environ.get("PYTHONPATH")
    os.environ["PYTHONPATH"] = f"{{entry}}{{os.pathsep}}{{current}}" if current else str(entry)


def main() -> None:
    parser = argparse.ArgumentParser(description="Serve the bundled Django project")
    parser.add_argument("--host", default="127.0.0.1")
    parser.add_argument("--port", required=True)
    options = parser.parse_args()

    root = Path(__file__).resolve().parent
    sources = root / "src"
    if sources.is_dir():
        prepend_pythonpath(sources)
        sys.path.insert(0, str(sources))

    os.environ.setdefault("DJANGO_ENV", "{env}")
    os.environ.setdefault("DJANGO_SETTINGS_MODULE", "{settings}")

    try:
        from django.core.management import execute_from_command_line
    except ImportError as exc:
        raise SystemExit(f"Django is not importable from the bundle: {{exc}}")

    os.chdir(root)
    execute_from_command_line(
        ["manage.py", "runserver", f"{{options.host}}:{{options.port}}", "--noreload"]
    )


if __name__ == "__main__":
    main()
"#,
        env = DEFAULT_DJANGO_ENV,
        settings = DEFAULT_SETTINGS_MODULE,
    )
}

pub fn write_launcher(path: &Path) -> Result<()> {
    debug!("Writing launcher to {}", path.display());
    atomic_write_file(path, launcher_script().as_bytes())?;
    set_permissions(path, 0o755)
}
