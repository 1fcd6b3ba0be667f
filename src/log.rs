#[cfg(feature = "tracing")]
#[allow(unused_imports)]
mod imp {
    pub(crate) use tracing::debug;
    pub(crate) use tracing::error;
    pub(crate) use tracing::info;
    pub(crate) use tracing::instrument;
    pub(crate) use tracing::trace;
    pub(crate) use tracing::warn;
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports, unused_macros)]
mod imp {
    /// A no-op replacement for the `tracing` logging macros. Arguments
    /// are still type checked so that enabling the feature cannot
    /// break the build.
    macro_rules! noop {
        ($($args:tt)*) => {{
            if false {
                let _args = format_args!($($args)*);
            }
        }};
    }

    pub(crate) use noop as debug;
    pub(crate) use noop as error;
    pub(crate) use noop as info;
    pub(crate) use noop as trace;
    pub(crate) use noop as warn;
}

#[allow(unused_imports)]
pub(crate) use imp::*;
