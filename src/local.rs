//! Local symbolization of profile locations using the binaries
//! backing their mappings.

use std::collections::HashMap;
use std::path::Path;

use crate::inspect::Inspect;
use crate::inspect::Segment;
use crate::log::debug;
use crate::log::trace;
use crate::log::warn;
use crate::profile::FunctionInterner;
use crate::profile::FunctionKey;
use crate::profile::Line;
use crate::Profile;
use crate::Result;
use crate::Warning;


/// Check whether a mapping refers to a virtual system object that
/// never carries resolvable symbols.
fn is_virtual_system_mapping(file: &str) -> bool {
    let name = Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file);
    name == "[vdso]" || name.starts_with("linux-vdso")
}


/// The opened segments for the mappings of one profile, keyed by
/// mapping index.
///
/// The table owns all segments; they are released when it is dropped,
/// irrespective of how symbolization concluded.
#[derive(Debug, Default)]
pub(crate) struct MappingTable {
    segments: HashMap<usize, Box<dyn Segment>>,
}

impl MappingTable {
    /// Open a segment for every mapping of `profile` that is referenced
    /// by a location and in need of symbolization.
    ///
    /// Problems with individual mappings never fail the operation as a
    /// whole. Instead, the mapping in question is skipped and a warning
    /// is recorded.
    pub fn new(
        profile: &Profile,
        inspector: &dyn Inspect,
        force: bool,
        warnings: &mut Vec<Warning>,
    ) -> Self {
        let mut table = Self::default();
        let mut missing_binaries = false;
        let referenced = profile.referenced_mappings();

        for (idx, mapping) in profile.mappings.iter().enumerate() {
            if !referenced[idx] {
                continue
            }

            if !force && mapping.is_symbolized() {
                trace!("mapping {} is already symbolized; skipping", mapping.id);
                continue
            }

            if mapping.file.is_empty() {
                if idx == 0 {
                    let warning = Warning::MainBinaryUnavailable;
                    warn!("{warning}");
                    let () = warnings.push(warning);
                } else {
                    missing_binaries = true;
                }
                continue
            }

            if is_virtual_system_mapping(&mapping.file) {
                trace!("skipping virtual system mapping `{}`", mapping.file);
                continue
            }

            let segment = match inspector.open(
                Path::new(&mapping.file),
                mapping.start,
                mapping.limit,
                mapping.offset,
            ) {
                Ok(segment) => segment,
                Err(err) => {
                    let warning = Warning::OpenFailed {
                        path: mapping.file.clone(),
                        error: format!("{err:#}"),
                    };
                    warn!("{warning}");
                    let () = warnings.push(warning);
                    continue
                }
            };

            match segment.build_id() {
                Some(build_id) if !mapping.build_id.is_empty() && build_id != mapping.build_id => {
                    let warning = Warning::BuildIdMismatch {
                        path: mapping.file.clone(),
                        expected: mapping.build_id.clone(),
                        actual: build_id,
                    };
                    warn!("{warning}");
                    let () = warnings.push(warning);
                    // Dropping the segment releases it.
                    continue
                }
                _ => (),
            }

            debug!("using `{}` for mapping {}", mapping.file, mapping.id);
            let _prev = table.segments.insert(idx, segment);
        }

        if missing_binaries {
            let warning = Warning::MissingBinaries;
            warn!("{warning}");
            let () = warnings.push(warning);
        }
        table
    }

    /// Retrieve the segment for the mapping with index `idx`, if any.
    #[inline]
    pub fn segment(&self, idx: usize) -> Option<&dyn Segment> {
        self.segments.get(&idx).map(|segment| &**segment)
    }

    /// Retrieve the number of opened segments.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}


/// Resolve the locations of `profile` using the segments in `table`.
///
/// Locations whose address cannot be resolved are left untouched.
pub(crate) fn symbolize_locations(profile: &mut Profile, table: &MappingTable) {
    let mut interner = FunctionInterner::new(profile);

    for loc_idx in 0..profile.locations.len() {
        let (map_idx, address) = {
            let location = &profile.locations[loc_idx];
            match location.mapping {
                Some(map_idx) => (map_idx, location.address),
                None => continue,
            }
        };

        let segment = match table.segment(map_idx) {
            Some(segment) => segment,
            None => continue,
        };

        let stack = match segment.source_line(address) {
            Ok(stack) if !stack.is_empty() => stack,
            Ok(_) => continue,
            Err(err) => {
                trace!("failed to resolve address {address:#x}: {err:#}");
                continue
            }
        };

        let mut lines = Vec::with_capacity(stack.len());
        let mut has_functions = false;
        let mut has_filenames = false;
        let mut has_line_numbers = false;

        for frame in stack {
            has_functions |= !frame.func.is_empty();
            has_filenames |= !frame.file.is_empty();
            has_line_numbers |= frame.line != 0;

            let key = FunctionKey {
                name: frame.func.clone(),
                system_name: frame.func,
                filename: frame.file,
            };
            let function_id = interner.intern(&mut profile.functions, key);
            let () = lines.push(Line {
                function_id,
                line: i64::from(frame.line),
            });
        }

        profile.locations[loc_idx].lines = lines;

        let mapping = &mut profile.mappings[map_idx];
        mapping.has_functions |= has_functions;
        mapping.has_filenames |= has_filenames;
        mapping.has_line_numbers |= has_line_numbers;
        mapping.has_inline_frames = true;
    }
}


/// Symbolize `profile` using locally available binaries.
///
/// All segments opened as part of the operation are released before it
/// returns.
pub(crate) fn symbolize(
    profile: &mut Profile,
    inspector: &dyn Inspect,
    fast: bool,
    force: bool,
    warnings: &mut Vec<Warning>,
) -> Result<()> {
    let () = inspector.set_fast_symbolization(fast);

    let table = MappingTable::new(profile, inspector, force, warnings);
    let () = symbolize_locations(profile, &table);
    Ok(())
}
