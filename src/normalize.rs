//! Normalization of function names for display.

use crate::demangle::filter;
use crate::demangle::DemangleOptions;
use crate::log::trace;
use crate::DemangleMode;
use crate::Profile;


/// Retrieve the demangler options to use for the given mode, if
/// demangling is desired at all.
fn demangle_options(mode: DemangleMode) -> Option<DemangleOptions> {
    match mode {
        DemangleMode::Default => Some(DemangleOptions {
            params: false,
            template_params: false,
            clones: true,
        }),
        DemangleMode::Templates => Some(DemangleOptions {
            params: false,
            template_params: true,
            clones: true,
        }),
        DemangleMode::Full => Some(DemangleOptions {
            params: true,
            template_params: true,
            clones: false,
        }),
        DemangleMode::None => None,
    }
}


/// Heuristically decide whether `name` is the result of demangling a
/// C++ name, in which case it can be simplified further.
pub fn looks_like_demangled_cpp(name: &str) -> bool {
    // Java style names such as `java.lang.Object.<init>` are not C++.
    if name.contains(".<") {
        return false
    }
    name.contains(['<', '>', '[', ']']) || name.contains("::")
}


/// Remove all outermost groups delimited by `start` and `end`,
/// including any groups nested in them, from `name`.
///
/// Both delimiters are expected to be ASCII characters. If the
/// delimiters in `name` are not balanced, `name` is returned
/// unchanged.
///
/// ```
/// # use profsym::remove_matching;
/// assert_eq!(remove_matching("f(int, pair<int, int>)", b'(', b')'), "f");
/// assert_eq!(remove_matching("a<b<c>>::d<e>", b'<', b'>'), "a::d");
/// assert_eq!(remove_matching("f)(", b'(', b')'), "f)(");
/// ```
pub fn remove_matching(name: &str, start: u8, end: u8) -> String {
    let mut bytes = name.as_bytes().to_vec();
    let mut nesting = 0usize;
    let mut first = 0;
    let mut current = 0;

    while let Some(offset) = bytes[current..]
        .iter()
        .position(|byte| *byte == start || *byte == end)
    {
        current += offset;
        if bytes[current] == start {
            nesting += 1;
            if nesting == 1 {
                first = current;
            }
            current += 1;
        } else {
            if nesting == 0 {
                // Unbalanced; leave the input alone.
                return name.to_string()
            }
            nesting -= 1;
            if nesting == 0 {
                let _removed = bytes.drain(first..=current);
                current = first;
            } else {
                current += 1;
            }
        }
    }

    // We only ever remove ranges starting and ending with an ASCII
    // delimiter, so the result is valid UTF-8 again.
    String::from_utf8(bytes).unwrap_or_else(|_err| name.to_string())
}


/// Simplify a name that could not be demangled, if it looks like an
/// already demangled C++ name.
fn simplify(name: &str, mode: DemangleMode) -> String {
    if !looks_like_demangled_cpp(name) {
        return name.to_string()
    }

    let mut name = name.to_string();
    if matches!(mode, DemangleMode::Default | DemangleMode::Templates) {
        name = remove_matching(&name, b'(', b')');
    }
    if mode == DemangleMode::Default {
        name = remove_matching(&name, b'<', b'>');
    }
    name
}


/// Demangle and simplify the display names of all functions in
/// `profile`.
///
/// Functions whose display name differs from their system name are
/// considered normalized already and are skipped, unless `force` is
/// set, in which case all display names are reset to the system name
/// first. Functions without a system name keep their display name.
pub fn demangle_profile(profile: &mut Profile, force: bool, mode: DemangleMode) {
    if force {
        for function in &mut profile.functions {
            if !function.system_name.is_empty() {
                function.name.clone_from(&function.system_name);
            }
        }
    }

    let opts = match demangle_options(mode) {
        Some(opts) => opts,
        None => return,
    };

    for function in &mut profile.functions {
        if !function.name.is_empty() && function.name != function.system_name {
            continue
        }

        let demangled = filter(&function.system_name, &opts);
        let name = if demangled != function.system_name {
            demangled
        } else {
            simplify(&function.system_name, mode)
        };

        if name != function.name {
            trace!("normalized `{}` to `{name}`", function.system_name);
        }
        function.name = name;
    }
}
