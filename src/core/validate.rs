// Root-set consistency: every requested plugin must share one machine and
// one buildtype. Transitive dependencies are exempt; a release dependency
// may legitimately back a debug plugin.
use std::path::PathBuf;

use crate::core::cache::ResolutionCache;
use crate::core::error::{Error, ErrorKind};
use crate::core::pe::{BuildType, Machine};

/// Validate the root binaries and return their common `(machine, buildtype)`.
/// The first binary fixes the expected values; the first disagreement fails,
/// naming the offending binary and both values.
pub fn validate_roots(
    cache: &mut ResolutionCache,
    roots: &[PathBuf],
) -> Result<(Machine, BuildType), Error> {
    let Some((first, rest)) = roots.split_first() else {
        return Err(Error::new(ErrorKind::Usage).with_message("no binaries specified"));
    };
    let expected = cache.binary(first)?;
    for path in rest {
        let info = cache.binary(path)?;
        if info.machine != expected.machine {
            return Err(Error::new(ErrorKind::InconsistentArch)
                .with_message(format!(
                    "machine of {} differs from {}",
                    info.path.display(),
                    expected.path.display()
                ))
                .with_path(&info.path)
                .with_expected(expected.machine.label())
                .with_actual(info.machine.label()));
        }
        if info.buildtype != expected.buildtype {
            return Err(Error::new(ErrorKind::InconsistentBuildType)
                .with_message(format!(
                    "buildtype of {} differs from {}",
                    info.path.display(),
                    expected.path.display()
                ))
                .with_path(&info.path)
                .with_expected(expected.buildtype.label())
                .with_actual(info.buildtype.label()));
        }
    }
    Ok((expected.machine, expected.buildtype))
}
