//! Format version and object file section names.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde_::{Deserialize, Serialize};

use crate::error::UnsupportedFormatError;

/// The version of the coverage mapping format emitted by this crate.
///
/// The value is stored zero-based in the [`CovMapHeader`](crate::format::raw::CovMapHeader), so
/// `1` denotes the second revision of the format.
pub const COVMAP_VERSION: u32 = 1;

/// The alignment in bytes of the coverage map section and its variable.
pub const COVMAP_ALIGNMENT: usize = 8;

const COVMAP_SECTION: &str = "__llvm_covmap";
const COVMAP_SECTION_COFF: &str = ".lcovmap$M";
const COVMAP_SECTION_MACHO_SEGMENT: &str = "__LLVM_COV,__llvm_covmap";
const COVMAP_VAR_NAME: &str = "__llvm_coverage_mapping";

/// Returns the format version emitted by this crate.
pub fn current_version() -> u32 {
    COVMAP_VERSION
}

/// Returns the name of the global variable holding the coverage map.
pub fn mapping_var_name() -> &'static str {
    COVMAP_VAR_NAME
}

/// Returns the name of the coverage map section for the given object format.
pub fn section_name(format: ObjectFormat) -> Result<&'static str, UnsupportedFormatError> {
    match format {
        ObjectFormat::Elf | ObjectFormat::MachO | ObjectFormat::Wasm => Ok(COVMAP_SECTION),
        ObjectFormat::Coff => Ok(COVMAP_SECTION_COFF),
        _ => Err(UnsupportedFormatError { format }),
    }
}

/// Returns the section name including segment information where the object format uses it.
///
/// Mach-O places the section into the `__LLVM_COV` segment. All other formats return the same
/// name as [`section_name`].
pub fn section_name_with_segment(
    format: ObjectFormat,
) -> Result<&'static str, UnsupportedFormatError> {
    match format {
        ObjectFormat::MachO => Ok(COVMAP_SECTION_MACHO_SEGMENT),
        _ => section_name(format),
    }
}

/// The object file format of a compilation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
#[non_exhaustive]
pub enum ObjectFormat {
    /// Executable and Linkable Format, used on Linux and most Unix systems.
    Elf,
    /// Common Object File Format, used on Windows.
    Coff,
    /// Mach Object, used on Apple platforms.
    MachO,
    /// WebAssembly modules.
    Wasm,
    /// Extended COFF, used on AIX.
    XCoff,
    /// Generalized Object File Format, used on z/OS.
    Goff,
    /// An unknown object format.
    Unknown,
}

impl ObjectFormat {
    /// Derives the object format from a target triple such as `x86_64-unknown-linux-gnu`.
    ///
    /// Targets that name no special environment use ELF.
    pub fn from_target_triple(triple: &str) -> Self {
        let mut parts = triple.split('-');
        let arch = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        let has = |name: &str| rest.iter().any(|part| part.starts_with(name));

        if arch.is_empty() {
            ObjectFormat::Unknown
        } else if arch.starts_with("wasm") {
            ObjectFormat::Wasm
        } else if has("windows") || has("uefi") {
            ObjectFormat::Coff
        } else if has("apple") || has("darwin") || has("ios") || has("macos") || has("tvos") {
            ObjectFormat::MachO
        } else if has("aix") {
            ObjectFormat::XCoff
        } else if has("zos") {
            ObjectFormat::Goff
        } else {
            ObjectFormat::Elf
        }
    }

    /// The lowercase name of the format.
    pub fn name(self) -> &'static str {
        match self {
            ObjectFormat::Elf => "elf",
            ObjectFormat::Coff => "coff",
            ObjectFormat::MachO => "macho",
            ObjectFormat::Wasm => "wasm",
            ObjectFormat::XCoff => "xcoff",
            ObjectFormat::Goff => "goff",
            ObjectFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectFormat {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "elf" => ObjectFormat::Elf,
            "coff" | "pe" => ObjectFormat::Coff,
            "macho" | "mach-o" => ObjectFormat::MachO,
            "wasm" => ObjectFormat::Wasm,
            "xcoff" => ObjectFormat::XCoff,
            "goff" => ObjectFormat::Goff,
            _ => {
                return Err(UnsupportedFormatError {
                    format: ObjectFormat::Unknown,
                })
            }
        })
    }
}
