//! Build metadata stored in a target archive.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use crate::CompareError;
use crate::Result;

/// Archive member holding the system build properties.
pub const BUILD_PROP_MEMBER: &str = "SYSTEM/build.prop";

/// Properties reported when none are requested.
pub const DEFAULT_BUILD_PROPS: &[&str] = &["ro.system.build.date.utc"];

/// Parses `key=value` lines. Comments and blank lines are skipped, as are
/// lines without `=`.
///
/// # Examples
///
/// ```
/// use catf_core::buildinfo::parse_build_prop;
///
/// let props = parse_build_prop("# begin\nro.build.id=AP1A\n\nro.debuggable=0\n");
/// assert_eq!(props[0], ("ro.build.id".to_string(), "AP1A".to_string()));
/// assert_eq!(props.len(), 2);
/// ```
#[must_use]
pub fn parse_build_prop(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Reads the requested build properties from a target archive, in the order
/// they appear in the archive. Properties that are absent are left out.
///
/// # Errors
///
/// - [`CompareError::MissingArtifact`] if the archive does not exist
/// - [`CompareError::InvalidArchive`] if it is not a readable zip archive
/// - [`CompareError::BuildPropMissing`] if it has no build properties
pub fn read_build_info<S: AsRef<str>>(target: &Path, props: &[S]) -> Result<Vec<(String, String)>> {
    if !target.is_file() {
        return Err(CompareError::MissingArtifact {
            path: target.to_path_buf(),
        });
    }
    let invalid = |e: zip::result::ZipError| CompareError::InvalidArchive {
        path: target.to_path_buf(),
        reason: e.to_string(),
    };

    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(target)?)).map_err(invalid)?;
    let mut member = match archive.by_name(BUILD_PROP_MEMBER) {
        Ok(member) => member,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(CompareError::BuildPropMissing {
                path: target.to_path_buf(),
                member: BUILD_PROP_MEMBER.to_string(),
            });
        }
        Err(e) => return Err(invalid(e)),
    };
    let mut raw = Vec::new();
    member.read_to_end(&mut raw)?;

    let wanted = |key: &str| props.iter().any(|p| p.as_ref() == key);
    Ok(parse_build_prop(&String::from_utf8_lossy(&raw))
        .into_iter()
        .filter(|(key, _)| wanted(key))
        .collect())
}
