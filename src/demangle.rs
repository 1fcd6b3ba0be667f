//! Demangling of C++ and Rust symbol names.

#[cfg(feature = "demangle")]
use crate::normalize::remove_matching;


/// Options controlling how much of a demangled name is retained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DemangleOptions {
    /// Keep function parameter lists (and return types).
    pub params: bool,
    /// Keep template argument lists.
    pub template_params: bool,
    /// Keep compiler generated clone suffixes such as
    /// ` [clone .constprop.0]`.
    pub clones: bool,
}

impl Default for DemangleOptions {
    fn default() -> Self {
        Self {
            params: true,
            template_params: true,
            clones: true,
        }
    }
}


#[cfg(feature = "demangle")]
fn demangle_cpp(name: &str, opts: &DemangleOptions) -> Option<String> {
    use cpp_demangle::DemangleOptions as CppOptions;
    use cpp_demangle::Symbol;

    // Only names using the Itanium encoding are considered; everything
    // else is either not mangled or a type name, which we leave alone.
    if !["_Z", "__Z", "_GLOBAL_"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        return None
    }

    let symbol = Symbol::new(name).ok()?;
    let cpp_opts = if opts.params {
        CppOptions::new()
    } else {
        CppOptions::new().no_params().no_return_type()
    };
    let mut demangled = symbol.demangle(&cpp_opts).ok()?;

    if !opts.clones || !opts.params {
        if let Some(idx) = demangled.find(" [clone ") {
            let () = demangled.truncate(idx);
        }
    }
    if !opts.template_params {
        demangled = remove_matching(&demangled, b'<', b'>');
    }
    Some(demangled)
}

#[cfg(feature = "demangle")]
fn closing_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in bytes.iter().enumerate().skip(open) {
        match byte {
            b'<' => depth += 1,
            // The arrow of a function pointer type is not a bracket.
            b'>' if idx > 0 && bytes[idx - 1] == b'-' => (),
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx)
                }
            }
            _ => (),
        }
    }
    None
}

/// Remove generic argument lists from a demangled Rust path, both in
/// turbofish (`foo::<T>`) and in type (`Foo<T>`) position. Qualified
/// paths such as `<Foo as Bar>::baz` are retained, with their own
/// generic arguments removed.
#[cfg(feature = "demangle")]
fn strip_generic_args(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut stripped = String::with_capacity(name.len());
    let mut idx = 0;

    while let Some(pos) = name[idx..].find('<') {
        let open = idx + pos;
        let () = stripped.push_str(&name[idx..open]);
        let close = match closing_bracket(bytes, open) {
            Some(close) => close,
            None => return name.to_string(),
        };

        let generic = stripped.ends_with("::")
            || stripped
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if generic {
            if stripped.ends_with("::") {
                let () = stripped.truncate(stripped.len() - 2);
            }
        } else {
            let () = stripped.push('<');
            let () = stripped.push_str(&strip_generic_args(&name[open + 1..close]));
            let () = stripped.push('>');
        }
        idx = close + 1;
    }
    let () = stripped.push_str(&name[idx..]);
    stripped
}

#[cfg(feature = "demangle")]
fn demangle_rust(name: &str, opts: &DemangleOptions) -> Option<String> {
    let demangled = rustc_demangle::try_demangle(name).ok()?;
    // The alternate format omits the trailing hash.
    let mut demangled = format!("{demangled:#}");

    // Suffixes such as `.llvm.123` or `.constprop.0` are reproduced
    // verbatim at the end of the demangled name.
    if !opts.clones || !opts.params {
        let suffix = name
            .match_indices('.')
            .map(|(idx, _)| &name[idx..])
            .find(|suffix| demangled.ends_with(suffix));
        if let Some(suffix) = suffix {
            let () = demangled.truncate(demangled.len() - suffix.len());
        }
    }
    if !opts.template_params {
        demangled = strip_generic_args(&demangled);
    }
    Some(demangled)
}


/// Demangle `name` according to `opts`.
///
/// Names that are not recognizably mangled are returned unchanged. If
/// the `demangle` feature is disabled, every name is returned
/// unchanged.
pub fn filter(name: &str, opts: &DemangleOptions) -> String {
    #[cfg(feature = "demangle")]
    {
        if let Some(demangled) = demangle_rust(name, opts) {
            return demangled
        }
        if let Some(demangled) = demangle_cpp(name, opts) {
            return demangled
        }
    }
    #[cfg(not(feature = "demangle"))]
    let _opts = opts;

    name.to_string()
}
