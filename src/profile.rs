//! The profile data model the symbolization pipeline operates on.

use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::Addr;


/// One loaded binary region referenced by a profile.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mapping {
    /// The mapping's ID inside the profile.
    pub id: u64,
    /// The address at which the region starts.
    pub start: Addr,
    /// The address one past the end of the region.
    pub limit: Addr,
    /// The file offset the region was mapped from.
    pub offset: u64,
    /// The path of the backing binary. Empty if unknown.
    pub file: String,
    /// The build identifier of the backing binary, hex encoded. Empty
    /// if unknown.
    pub build_id: String,
    /// Whether at least one function name was resolved.
    pub has_functions: bool,
    /// Whether at least one source file name was resolved.
    pub has_filenames: bool,
    /// Whether at least one line number was resolved.
    pub has_line_numbers: bool,
    /// Whether addresses were resolved to (potentially multiple)
    /// inlined frames.
    pub has_inline_frames: bool,
}

impl Mapping {
    /// Check whether any symbol information has been attached to this
    /// mapping already.
    #[inline]
    pub fn is_symbolized(&self) -> bool {
        self.has_functions || self.has_filenames || self.has_line_numbers
    }
}


/// A single source line of a [`Location`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Line {
    /// The ID of the [`Function`] this line belongs to.
    pub function_id: u64,
    /// The line number in the function's source file; zero if unknown.
    pub line: i64,
}


/// One sampled address along with its resolved frames.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Location {
    /// The location's ID inside the profile.
    pub id: u64,
    /// Index of the owning mapping in [`Profile::mappings`], if any.
    pub mapping: Option<usize>,
    /// The sampled address.
    pub address: Addr,
    /// The frames at `address`, innermost (most deeply inlined) first.
    pub lines: Vec<Line>,
}


/// A function as referenced by [`Line`]s.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Function {
    /// The function's ID inside the profile.
    pub id: u64,
    /// The (possibly simplified) display name.
    pub name: String,
    /// The name as reported by the symbol source, typically mangled.
    pub system_name: String,
    /// The source file the function is defined in.
    pub filename: String,
}

impl Function {
    /// Retrieve the structural identity of this function.
    #[inline]
    pub(crate) fn key(&self) -> FunctionKey {
        FunctionKey {
            name: self.name.clone(),
            system_name: self.system_name.clone(),
            filename: self.filename.clone(),
        }
    }
}


/// A sampled profile.
///
/// The order of each collection is significant: IDs are handed out in
/// insertion order and mapping indices are positions in `mappings`.
/// The first mapping is the profile's main binary.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Profile {
    /// The binary regions referenced by the profile.
    pub mappings: Vec<Mapping>,
    /// The sampled locations.
    pub locations: Vec<Location>,
    /// The functions referenced by location lines.
    pub functions: Vec<Function>,
}

impl Profile {
    /// Create a new, empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping, assigning it the next sequential ID, and return
    /// its index.
    pub fn add_mapping(&mut self, mut mapping: Mapping) -> usize {
        mapping.id = self.mappings.len() as u64 + 1;
        let () = self.mappings.push(mapping);
        self.mappings.len() - 1
    }

    /// Add an unresolved location at `address` belonging to the mapping
    /// with index `mapping`, returning its index.
    pub fn add_location(&mut self, mapping: Option<usize>, address: Addr) -> usize {
        let location = Location {
            id: self.locations.len() as u64 + 1,
            mapping,
            address,
            lines: Vec::new(),
        };
        let () = self.locations.push(location);
        self.locations.len() - 1
    }

    /// Look up a function by its ID.
    pub fn function(&self, id: u64) -> Option<&Function> {
        self.functions.iter().find(|function| function.id == id)
    }

    /// Retrieve the set of indices of mappings referenced by at least
    /// one location, in profile order.
    pub(crate) fn referenced_mappings(&self) -> Vec<bool> {
        let mut used = vec![false; self.mappings.len()];
        for location in &self.locations {
            if let Some(used) = location.mapping.and_then(|idx| used.get_mut(idx)) {
                *used = true;
            }
        }
        used
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "Mappings")?;
        for mapping in &self.mappings {
            let Mapping {
                id,
                start,
                limit,
                offset,
                file,
                build_id,
                has_functions,
                has_filenames,
                has_line_numbers,
                has_inline_frames,
            } = mapping;

            write!(f, "{id}: {start:#x}/{limit:#x}/{offset:#x} {file} {build_id}")?;
            let flags = [
                (has_functions, "[FN]"),
                (has_filenames, "[FL]"),
                (has_line_numbers, "[LN]"),
                (has_inline_frames, "[IN]"),
            ];
            for (_, flag) in flags.iter().filter(|(set, _)| **set) {
                write!(f, "{flag}")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Locations")?;
        for location in &self.locations {
            let mapping_id = location
                .mapping
                .and_then(|idx| self.mappings.get(idx))
                .map(|mapping| mapping.id)
                .unwrap_or(0);
            write!(
                f,
                "{:>6}: {:#x} M={mapping_id}",
                location.id, location.address
            )?;

            for (i, line) in location.lines.iter().enumerate() {
                if i > 0 {
                    write!(f, "\n{:>6}  {:>18}", "", "")?;
                }
                match self.function(line.function_id) {
                    Some(function) => write!(
                        f,
                        " {} {}:{} s={}",
                        function.name, function.filename, line.line, function.system_name
                    )?,
                    None => write!(f, " ??:{}", line.line)?,
                }
            }
            writeln!(f)?;
        }

        writeln!(f, "Functions")?;
        for function in &self.functions {
            writeln!(
                f,
                "{:>6}: {} {} s={}",
                function.id, function.name, function.filename, function.system_name
            )?;
        }
        Ok(())
    }
}


/// The structural identity of a [`Function`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct FunctionKey {
    pub name: String,
    pub system_name: String,
    pub filename: String,
}


/// A pass-local table making sure that structurally identical
/// functions are represented by a single [`Function`] record.
#[derive(Debug)]
pub(crate) struct FunctionInterner {
    ids: HashMap<FunctionKey, u64>,
    next_id: u64,
}

impl FunctionInterner {
    /// Create an interner that knows about all functions already
    /// present in `profile`.
    ///
    /// Functions are registered under their system name as well, so
    /// that frames resolved anew map onto functions whose display name
    /// got simplified in the meantime.
    pub fn new(profile: &Profile) -> Self {
        let mut ids = HashMap::with_capacity(profile.functions.len() * 2);
        for function in &profile.functions {
            let _id = ids.entry(function.key()).or_insert(function.id);
            if !function.system_name.is_empty() {
                let key = FunctionKey {
                    name: function.system_name.clone(),
                    system_name: function.system_name.clone(),
                    filename: function.filename.clone(),
                };
                let _id = ids.entry(key).or_insert(function.id);
            }
        }
        let next_id = profile
            .functions
            .iter()
            .map(|function| function.id)
            .max()
            .unwrap_or(0)
            + 1;

        Self { ids, next_id }
    }

    /// Retrieve the ID of the function with the given identity,
    /// registering a new [`Function`] with the profile's `functions` if
    /// none exists yet.
    pub fn intern(&mut self, functions: &mut Vec<Function>, key: FunctionKey) -> u64 {
        if let Some(id) = self.ids.get(&key) {
            return *id
        }

        let id = self.next_id;
        self.next_id += 1;

        let function = Function {
            id,
            name: key.name.clone(),
            system_name: key.system_name.clone(),
            filename: key.filename.clone(),
        };
        let () = functions.push(function);
        let _prev = self.ids.insert(key, id);
        id
    }
}
