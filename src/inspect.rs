//! Access to the binaries backing profile mappings.
//!
//! An [`Inspect`] implementation opens the binary region of a mapping
//! and hands out a [`Segment`], which in turn answers queries for the
//! source frames at a given address. Segments are released when they
//! are dropped.

use std::fmt::Debug;
use std::path::Path;

use crate::Addr;
use crate::Result;


/// One (possibly inlined) source frame.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    /// The name of the function, as reported by the binary. Empty if
    /// unknown.
    pub func: String,
    /// The source file. Empty if unknown.
    pub file: String,
    /// The line number; zero if unknown.
    pub line: u32,
}


/// An opened, queryable binary region.
pub trait Segment: Debug {
    /// Retrieve the build identifier of the binary, hex encoded, if it
    /// has one.
    fn build_id(&self) -> Option<String>;

    /// Look up the frames at `addr`, innermost frame first.
    ///
    /// An empty result means that nothing is known about the address.
    fn source_line(&self, addr: Addr) -> Result<Vec<Frame>>;
}


/// A type capable of opening binaries for symbolization.
pub trait Inspect: Debug {
    /// Open the region `[start, limit)` of the binary at `path`, which
    /// was mapped from file offset `offset`.
    fn open(&self, path: &Path, start: Addr, limit: Addr, offset: u64) -> Result<Box<dyn Segment>>;

    /// Request faster, potentially less accurate, symbolization for
    /// segments opened subsequently.
    ///
    /// Implementations without such a mode ignore the request.
    fn set_fast_symbolization(&self, fast: bool) {
        let _fast = fast;
    }
}


#[cfg(feature = "elf")]
mod elf {
    use std::cell::Cell;
    use std::fmt::Debug;
    use std::fmt::Formatter;
    use std::fmt::Result as FmtResult;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;
    use std::path::PathBuf;

    use blazesym::helper::read_elf_build_id;
    use blazesym::symbolize::source::Elf;
    use blazesym::symbolize::source::Source;
    use blazesym::symbolize::CodeInfo;
    use blazesym::symbolize::Input;
    use blazesym::symbolize::Symbolized;
    use blazesym::symbolize::Symbolizer;

    use crate::log::debug;
    use crate::Addr;
    use crate::Error;
    use crate::ErrorExt as _;
    use crate::ErrorKind;
    use crate::Result;

    use super::Frame;
    use super::Inspect;
    use super::Segment;


    fn format_build_id(build_id: &[u8]) -> String {
        build_id
            .iter()
            .fold(String::with_capacity(build_id.len() * 2), |mut s, b| {
                let _result = write!(s, "{b:02x}");
                s
            })
    }

    fn to_frame(name: &str, code_info: Option<&CodeInfo>) -> Frame {
        let (file, line) = code_info
            .map(|info| {
                (
                    info.to_path().display().to_string(),
                    info.line.unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Frame {
            func: name.to_string(),
            file,
            line,
        }
    }


    /// An [`Inspect`] implementation working on ELF binaries, using
    /// their symbol tables and DWARF debug information.
    #[derive(Debug, Default)]
    pub struct ElfInspector {
        /// Whether to skip DWARF and only use ELF symbol tables.
        fast: Cell<bool>,
    }

    impl ElfInspector {
        /// Create a new [`ElfInspector`].
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Inspect for ElfInspector {
        fn open(
            &self,
            path: &Path,
            start: Addr,
            limit: Addr,
            offset: u64,
        ) -> Result<Box<dyn Segment>> {
            let meta = fs::metadata(path)
                .with_context(|| format!("failed to stat `{}`", path.display()))?;
            if !meta.is_file() {
                return Err(Error::with_invalid_input(format!(
                    "`{}` is not a regular file",
                    path.display()
                )))
            }
            if limit < start {
                return Err(Error::with_invalid_input(format!(
                    "invalid address range {start:#x}-{limit:#x}"
                )))
            }

            let build_id = read_elf_build_id(path)
                .map_err(|err| Error::from_error(ErrorKind::InvalidData, err))
                .with_context(|| format!("failed to read build ID of `{}`", path.display()))?
                .map(|build_id| format_build_id(&build_id));

            let mut elf = Elf::new(path);
            elf.debug_syms = !self.fast.get();
            debug!(
                "opened `{}` ({start:#x}-{limit:#x} @ {offset:#x}, debug symbols: {})",
                path.display(),
                elf.debug_syms
            );

            let segment = ElfSegment {
                path: path.to_path_buf(),
                src: Source::Elf(elf),
                symbolizer: Symbolizer::new(),
                start,
                limit,
                offset,
                build_id,
            };
            Ok(Box::new(segment))
        }

        fn set_fast_symbolization(&self, fast: bool) {
            self.fast.set(fast)
        }
    }


    /// A region of an ELF binary.
    struct ElfSegment {
        path: PathBuf,
        src: Source<'static>,
        symbolizer: Symbolizer,
        start: Addr,
        limit: Addr,
        offset: u64,
        build_id: Option<String>,
    }

    impl Debug for ElfSegment {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            f.debug_struct("ElfSegment")
                .field("path", &self.path)
                .field("start", &self.start)
                .field("limit", &self.limit)
                .field("offset", &self.offset)
                .field("build_id", &self.build_id)
                .finish_non_exhaustive()
        }
    }

    impl ElfSegment {
        /// Translate an address inside the segment into a file offset.
        fn file_offset(&self, addr: Addr) -> Option<u64> {
            if addr < self.start || addr >= self.limit {
                return None
            }
            (addr - self.start).checked_add(self.offset)
        }
    }

    impl Segment for ElfSegment {
        fn build_id(&self) -> Option<String> {
            self.build_id.clone()
        }

        fn source_line(&self, addr: Addr) -> Result<Vec<Frame>> {
            let file_offset = self.file_offset(addr).ok_or_else(|| {
                Error::with_invalid_input(format!(
                    "address {addr:#x} is outside of `{}` ({:#x}-{:#x})",
                    self.path.display(),
                    self.start,
                    self.limit
                ))
            })?;

            let sym = match self
                .symbolizer
                .symbolize_single(&self.src, Input::FileOffset(file_offset))
                .map_err(|err| Error::from_error(ErrorKind::InvalidData, err))?
            {
                Symbolized::Sym(sym) => sym,
                Symbolized::Unknown(..) => return Ok(Vec::new()),
            };

            // Inlined functions are reported outermost first, but we
            // want the innermost frame first.
            let mut frames = Vec::with_capacity(sym.inlined.len() + 1);
            for inlined in sym.inlined.iter().rev() {
                let () = frames.push(to_frame(&inlined.name, inlined.code_info.as_ref()));
            }
            let () = frames.push(to_frame(&sym.name, sym.code_info.as_ref()));
            Ok(frames)
        }
    }


}

#[cfg(feature = "elf")]
pub use elf::ElfInspector;
