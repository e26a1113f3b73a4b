// djdesk-common/src/model/bundle.rs
//! Support matrix for python-build-standalone interpreter archives.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{PYTHON_BUILD_RELEASE, PYTHON_DOWNLOAD_BASE, PYTHON_VERSION};
use crate::error::{DjdeskError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
}

impl Platform {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            "win32" | "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    pub fn host() -> Option<Self> {
        Self::parse(std::env::consts::OS)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "win32",
        }
    }

    /// Location of the interpreter inside an extracted standalone archive.
    pub fn standalone_python_relative(&self) -> &'static [&'static str] {
        match self {
            Self::Windows => &["python.exe"],
            _ => &["bin", "python3"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Some(Self::X64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }

    pub fn host() -> Option<Self> {
        Self::parse(std::env::consts::ARCH)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct TargetEntry {
    platform: Platform,
    arch: Arch,
    triple: &'static str,
    sha256: &'static str,
}

// One row per supported (platform, arch); anything else is unsupported.
static SUPPORTED_TARGETS: &[TargetEntry] = &[
    TargetEntry {
        platform: Platform::Darwin,
        arch: Arch::Arm64,
        triple: "aarch64-apple-darwin",
        sha256: "b4bcd3c6c24cab32ae99e1b05c89312b783b4d69431d702e5012fe1fdcad4087",
    },
    TargetEntry {
        platform: Platform::Darwin,
        arch: Arch::X64,
        triple: "x86_64-apple-darwin",
        sha256: "4e71a3ce973be377ef18637826648bb936e2f9490f64a9e4f33a49bcc431d344",
    },
    TargetEntry {
        platform: Platform::Linux,
        arch: Arch::X64,
        triple: "x86_64-unknown-linux-gnu",
        sha256: "3dec1ab70758a3467ac3313bbcdabf7a9b3016db5c072c4537e3cf0a9e6290f6",
    },
    TargetEntry {
        platform: Platform::Linux,
        arch: Arch::Arm64,
        triple: "aarch64-unknown-linux-gnu",
        sha256: "128a9cbfb9645d5237ec01704d9d1d2ac5f084464cc43c37a4cd96aa9c3b1ad5",
    },
    TargetEntry {
        platform: Platform::Windows,
        arch: Arch::X64,
        triple: "x86_64-pc-windows-msvc",
        sha256: "39acfcb3857d83eab054a3de11756ffc16b3d49c31393b9800dd2704d1f07fdf",
    },
    TargetEntry {
        platform: Platform::Windows,
        arch: Arch::Arm64,
        triple: "aarch64-pc-windows-msvc",
        sha256: "599a8b7e12439cd95a201dbdfe95cf363146b1ff91f379555dafd86b170caab9",
    },
];

/// A resolved standalone-interpreter download for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSpec {
    pub platform: Platform,
    pub arch: Arch,
    pub asset_name: String,
    pub sha256: String,
    pub python_relative: Vec<String>,
}

impl BundleSpec {
    /// Resolves raw platform/arch names. Unknown names and unsupported pairs
    /// both surface as `UnsupportedTarget`.
    pub fn resolve(platform: &str, arch: &str) -> Result<Self> {
        let unsupported = || DjdeskError::UnsupportedTarget {
            platform: platform.to_string(),
            arch: arch.to_string(),
        };
        let platform = Platform::parse(platform).ok_or_else(unsupported)?;
        let arch = Arch::parse(arch).ok_or_else(unsupported)?;
        Self::for_target(platform, arch)
    }

    pub fn for_target(platform: Platform, arch: Arch) -> Result<Self> {
        let entry = SUPPORTED_TARGETS
            .iter()
            .find(|e| e.platform == platform && e.arch == arch)
            .ok_or_else(|| DjdeskError::UnsupportedTarget {
                platform: platform.to_string(),
                arch: arch.to_string(),
            })?;

        Ok(Self {
            platform,
            arch,
            asset_name: format!(
                "cpython-{PYTHON_VERSION}+{PYTHON_BUILD_RELEASE}-{}-install_only.tar.gz",
                entry.triple
            ),
            sha256: entry.sha256.to_string(),
            python_relative: platform
                .standalone_python_relative()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    pub fn host() -> Result<Self> {
        match (Platform::host(), Arch::host()) {
            (Some(platform), Some(arch)) => Self::for_target(platform, arch),
            _ => Err(DjdeskError::UnsupportedTarget {
                platform: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            }),
        }
    }

    pub fn download_url(&self) -> String {
        format!(
            "{PYTHON_DOWNLOAD_BASE}/{PYTHON_BUILD_RELEASE}/{}",
            self.asset_name
        )
    }

    pub fn interpreter_in(&self, interpreter_root: &Path) -> PathBuf {
        self.python_relative
            .iter()
            .fold(interpreter_root.to_path_buf(), |acc, part| acc.join(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_pair_has_asset_and_full_length_digest() {
        for entry in SUPPORTED_TARGETS {
            let spec = BundleSpec::for_target(entry.platform, entry.arch).unwrap();
            assert!(!spec.asset_name.is_empty());
            assert_eq!(spec.sha256.len(), 64, "{}", spec.asset_name);
            assert!(spec.sha256.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(!spec.python_relative.is_empty());
        }
        assert_eq!(SUPPORTED_TARGETS.len(), 6);
    }

    #[test]
    fn linux_x64_maps_to_registered_asset() {
        let spec = BundleSpec::resolve("linux", "x64").unwrap();
        assert_eq!(
            spec.asset_name,
            "cpython-3.14.0+20251031-x86_64-unknown-linux-gnu-install_only.tar.gz"
        );
        assert_eq!(
            spec.sha256,
            "3dec1ab70758a3467ac3313bbcdabf7a9b3016db5c072c4537e3cf0a9e6290f6"
        );
        assert_eq!(spec.python_relative, vec!["bin", "python3"]);
        assert_eq!(
            spec.interpreter_in(Path::new("/b/python")),
            Path::new("/b/python/bin/python3")
        );
        assert!(spec.download_url().ends_with(
            "/20251031/cpython-3.14.0+20251031-x86_64-unknown-linux-gnu-install_only.tar.gz"
        ));
    }

    #[test]
    fn windows_uses_flat_interpreter_layout() {
        let spec = BundleSpec::resolve("windows", "aarch64").unwrap();
        assert_eq!(spec.python_relative, vec!["python.exe"]);
        assert!(spec.asset_name.contains("aarch64-pc-windows-msvc"));
    }

    #[test]
    fn unknown_names_are_unsupported() {
        for (platform, arch) in [("freebsd", "x64"), ("linux", "riscv64"), ("", "")] {
            match BundleSpec::resolve(platform, arch) {
                Err(DjdeskError::UnsupportedTarget { platform: p, arch: a }) => {
                    assert_eq!(p, platform);
                    assert_eq!(a, arch);
                }
                other => panic!("expected UnsupportedTarget, got {other:?}"),
            }
        }
    }
}
