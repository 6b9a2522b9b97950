// Closed classification tables: OS-provided DLLs and runtime-loaded deps.
// Both tables are design decisions kept auditable in source, not computed;
// binary metadata cannot distinguish OS components from bundled ones.

/// Name prefixes (lowercase, extension stripped) of OS/runtime DLL families.
pub const SYSTEM_DLL_PREFIXES: &[&str] = &["api-ms-win-", "vcruntime", "msvc", "d3dcompiler_"];

/// Exact names (lowercase, extension stripped) of OS/runtime DLLs.
pub const SYSTEM_DLL_NAMES: &[&str] = &[
    "advapi32",
    "bcrypt",
    "d3d11",
    "d3d9",
    "dnsapi",
    "dsound",
    "dxgi",
    "gdi32",
    "iphlpapi",
    "kernel32",
    "ksuser",
    "mf",
    "mfplat",
    "mfreadwrite",
    "mmdevapi",
    "msimg32",
    "ole32",
    "oleaut32",
    "opengl32",
    "setupapi",
    "shell32",
    "shlwapi",
    "ucrtbase",
    "ucrtbased",
    "user32",
    "usp10",
    "winmm",
    "ws2_32",
    "wsock32",
];

// DLLs opened at runtime with g_module_open()/LoadLibrary by the named DLL.
// Invisible to import-table inspection, which is why the list exists at all.
const MODULE_DEPS: &[(&str, &[&str])] = &[("libEGL.dll", &["libGLESv2.dll"])];

/// Whether `name` is an OS/runtime DLL that is never bundled into a prefix.
pub fn is_system_dll(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".dll").unwrap_or(&lower);
    if SYSTEM_DLL_PREFIXES
        .iter()
        .any(|prefix| stem.starts_with(prefix))
    {
        return true;
    }
    SYSTEM_DLL_NAMES.iter().any(|known| *known == stem)
}

/// DLLs that `name` loads dynamically at runtime. Empty for unlisted names.
pub fn module_deps(name: &str) -> &'static [&'static str] {
    MODULE_DEPS
        .iter()
        .find(|(dll, _)| dll.eq_ignore_ascii_case(name))
        .map(|(_, deps)| *deps)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::{is_system_dll, module_deps};

    #[test]
    fn exact_names_are_system() {
        assert!(is_system_dll("kernel32.dll"));
        assert!(is_system_dll("ws2_32.dll"));
        assert!(is_system_dll("ucrtbased.dll"));
    }

    #[test]
    fn prefixes_are_system() {
        assert!(is_system_dll("api-ms-win-core-winrt-l1-1-0.dll"));
        assert!(is_system_dll("vcruntime140.dll"));
        assert!(is_system_dll("msvcp140.dll"));
        assert!(is_system_dll("d3dcompiler_47.dll"));
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert!(is_system_dll("KERNEL32.dll"));
        assert!(is_system_dll("VCRuntime140.DLL"));
    }

    #[test]
    fn bundled_names_are_not_system() {
        assert!(!is_system_dll("libglib-2.0-0.dll"));
        assert!(!is_system_dll("gstcoreelements.dll"));
        // `mf` is an exact rule, not a prefix rule
        assert!(!is_system_dll("mfx.dll"));
    }

    #[test]
    fn module_deps_known_entry() {
        assert_eq!(module_deps("libEGL.dll"), &["libGLESv2.dll"]);
    }

    #[test]
    fn module_deps_unknown_is_empty() {
        assert!(module_deps("libgstreamer-1.0-0.dll").is_empty());
    }
}
