use std::cell::RefCell;
use std::rc::Rc;

use profsym::Error;
use profsym::ErrorKind;
use profsym::Function;
use profsym::Line;
use profsym::Mapping;
use profsym::MappingSources;
use profsym::Profile;
use profsym::Result;
use profsym::Stage;
use profsym::Symbolizer;
use profsym::Warning;

use test_log::test;

use crate::suite::common::frame;
use crate::suite::common::Binary;
use crate::suite::common::ScriptedInspector;


const MAIN: &str = "/usr/bin/server";
const LIB: &str = "/usr/lib/libfoo.so";


fn mapping(file: &str, build_id: &str) -> Mapping {
    Mapping {
        start: 0x400000,
        limit: 0x500000,
        file: file.to_string(),
        build_id: build_id.to_string(),
        ..Default::default()
    }
}

/// Create a profile with a main binary mapping and a location for each
/// of the provided addresses.
fn profile(addrs: &[u64]) -> Profile {
    let mut profile = Profile::new();
    let main = profile.add_mapping(mapping(MAIN, ""));
    for addr in addrs {
        let _idx = profile.add_location(Some(main), *addr);
    }
    profile
}

fn main_binary() -> ScriptedInspector {
    ScriptedInspector::new([(
        MAIN,
        Binary::with_frames([
            (0x401000, vec![frame("ns::Foo<int>(int)", "foo.cc", 10)]),
            (
                0x401010,
                vec![
                    frame("inlined", "foo.h", 3),
                    frame("ns::Foo<int>(int)", "foo.cc", 12),
                ],
            ),
        ]),
    )])
}

fn symbolizer(inspector: &ScriptedInspector) -> Symbolizer {
    Symbolizer::builder()
        .set_inspector(inspector.clone())
        .build()
}


/// Check that with the default directive names are resolved locally and
/// simplified, and that all capability flags are set.
#[test]
fn local_default_mode() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);

    let report = symbolizer(&inspector).symbolize("", &mut prof).unwrap();
    assert_eq!(report.local, Stage::Succeeded);
    assert_eq!(report.remote, Stage::Skipped);
    assert_eq!(report.warnings, Vec::new());

    assert_eq!(prof.functions.len(), 1);
    let function = &prof.functions[0];
    assert_eq!(function.name, "ns::Foo");
    assert_eq!(function.system_name, "ns::Foo<int>(int)");
    assert_eq!(function.filename, "foo.cc");
    assert_eq!(
        prof.locations[0].lines,
        vec![Line {
            function_id: function.id,
            line: 10,
        }]
    );

    let mapping = &prof.mappings[0];
    assert!(mapping.has_functions);
    assert!(mapping.has_filenames);
    assert!(mapping.has_line_numbers);
    assert!(mapping.has_inline_frames);

    // All segments got released again.
    let log = inspector.log.borrow();
    assert_eq!(log.opened, log.released);
}

/// Check that `demangle=full` keeps names as they are.
#[test]
fn local_full_demangling() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);

    let _report = symbolizer(&inspector)
        .symbolize("local:demangle=full", &mut prof)
        .unwrap();
    assert_eq!(prof.functions[0].name, "ns::Foo<int>(int)");

    let mut prof = profile(&[0x401000]);
    let _report = symbolizer(&inspector)
        .symbolize("LOCAL:Demangle=Templates", &mut prof)
        .unwrap();
    assert_eq!(prof.functions[0].name, "ns::Foo<int>");
}

/// Make sure that identical frames share a single function record
/// and that inlined frames are reported innermost first.
#[test]
fn function_deduplication() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000, 0x401010, 0x401000]);

    let _report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert_eq!(prof.functions.len(), 2);

    let foo = prof.locations[0].lines[0].function_id;
    assert_eq!(prof.locations[2].lines[0].function_id, foo);
    assert_eq!(prof.locations[1].lines.len(), 2);
    assert_eq!(prof.locations[1].lines[1].function_id, foo);
    assert_eq!(prof.locations[1].lines[1].line, 12);

    let inlined = prof.function(prof.locations[1].lines[0].function_id).unwrap();
    assert_eq!(inlined.name, "inlined");
    assert_eq!(inlined.filename, "foo.h");
}

/// Check that a binary that cannot be opened is reported, but does not
/// fail symbolization.
#[test]
fn open_failure() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);
    let lib = prof.add_mapping(mapping("/missing/libbar.so", ""));
    let _idx = prof.add_location(Some(lib), 0x7f0000001000);

    let report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert_eq!(report.local, Stage::Succeeded);
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        &report.warnings[0],
        Warning::OpenFailed { path, error }
            if path == "/missing/libbar.so" && error.contains("not found")
    ));

    assert_eq!(prof.locations[0].lines.len(), 1);
    assert_eq!(prof.locations[1].lines, Vec::new());
    assert!(!prof.mappings[lib].has_functions);
}

/// Make sure that a build ID mismatch only skips the affected mapping.
#[test]
fn build_id_mismatch() {
    let inspector = ScriptedInspector::new([
        (
            MAIN,
            Binary::with_frames([(0x401000, vec![frame("main", "main.c", 5)])]).build_id("aaaa"),
        ),
        (
            LIB,
            Binary::with_frames([(0x7f0000001000, vec![frame("foo", "foo.c", 7)])])
                .build_id("bbbb"),
        ),
    ]);

    let mut prof = Profile::new();
    let main = prof.add_mapping(mapping(MAIN, "aaaa"));
    let lib = prof.add_mapping(mapping(LIB, "cccc"));
    let _idx = prof.add_location(Some(main), 0x401000);
    let _idx = prof.add_location(Some(lib), 0x7f0000001000);

    let report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert_eq!(
        report.warnings,
        vec![Warning::BuildIdMismatch {
            path: LIB.to_string(),
            expected: "cccc".to_string(),
            actual: "bbbb".to_string(),
        }]
    );

    assert_eq!(prof.locations[0].lines.len(), 1);
    assert_eq!(prof.locations[1].lines, Vec::new());
    assert!(prof.mappings[main].has_functions);
    assert!(!prof.mappings[lib].has_functions);

    let log = inspector.log.borrow();
    assert_eq!(log.opened.len(), 2);
    assert_eq!(log.released.len(), 2);
}

/// Check the warnings emitted for mappings without file names.
#[test]
fn missing_file_names() {
    let inspector = main_binary();
    let mut prof = Profile::new();
    let main = prof.add_mapping(mapping("", ""));
    let lib = prof.add_mapping(mapping("", ""));
    let _idx = prof.add_location(Some(main), 0x401000);
    let _idx = prof.add_location(Some(lib), 0x7f0000001000);

    let report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert_eq!(
        report.warnings,
        vec![Warning::MainBinaryUnavailable, Warning::MissingBinaries]
    );
    assert!(inspector.log.borrow().opened.is_empty());
}

/// Check that already symbolized mappings are only revisited when
/// forced.
#[test]
fn forced_resymbolization() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);
    prof.mappings[0].has_functions = true;

    let _report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert!(inspector.log.borrow().opened.is_empty());
    assert_eq!(prof.locations[0].lines, Vec::new());

    let _report = symbolizer(&inspector)
        .symbolize("local:force", &mut prof)
        .unwrap();
    assert_eq!(inspector.log.borrow().opened.len(), 1);
    assert_eq!(prof.locations[0].lines.len(), 1);
}

/// Make sure that a forced run keeps the lines of locations that no
/// longer resolve, along with the mapping's capability flags.
#[test]
fn forced_resymbolization_keeps_stale_lines() {
    let inspector = ScriptedInspector::new([(
        MAIN,
        Binary::with_frames([(0x401000, vec![frame("main", "main.c", 5)])]).fail_at(0x401020),
    )]);

    let mut prof = profile(&[0x401010, 0x401020]);
    let () = prof.functions.push(Function {
        id: 1,
        name: "ns::Foo".to_string(),
        system_name: "ns::Foo<int>(int)".to_string(),
        filename: "foo.cc".to_string(),
    });
    let stale = vec![Line {
        function_id: 1,
        line: 10,
    }];
    prof.locations[0].lines = stale.clone();
    prof.locations[1].lines = stale.clone();
    prof.mappings[0].has_functions = true;
    prof.mappings[0].has_filenames = true;

    let report = symbolizer(&inspector)
        .symbolize("local:force", &mut prof)
        .unwrap();
    assert_eq!(report.local, Stage::Succeeded);
    assert_eq!(report.warnings, Vec::new());
    assert_eq!(inspector.log.borrow().opened.len(), 1);

    assert_eq!(prof.locations[0].lines, stale);
    assert_eq!(prof.locations[1].lines, stale);
    assert_eq!(prof.functions.len(), 1);

    let mapping = &prof.mappings[0];
    assert!(mapping.has_functions);
    assert!(mapping.has_filenames);
    assert!(!mapping.has_line_numbers);
    assert!(!mapping.has_inline_frames);
}

/// Check that `fastlocal` asks the inspector for fast symbolization.
#[test]
fn fast_local() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);

    let _report = symbolizer(&inspector)
        .symbolize("fastlocal", &mut prof)
        .unwrap();
    let _report = symbolizer(&inspector)
        .symbolize("local:force", &mut prof)
        .unwrap();
    assert_eq!(inspector.log.borrow().fast, vec![true, false]);
}

/// Make sure that disabling symbolization leaves the profile alone,
/// names included.
#[test]
fn disabled() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);
    let () = prof.functions.push(Function {
        id: 1,
        name: String::new(),
        system_name: "ns::Foo<int>(int)".to_string(),
        filename: String::new(),
    });
    let before = prof.clone();

    for directive in ["none", "NO", "local:none"] {
        let report = symbolizer(&inspector).symbolize(directive, &mut prof).unwrap();
        assert_eq!(report.local, Stage::Skipped);
        assert_eq!(prof, before);
    }
    assert!(inspector.log.borrow().opened.is_empty());
}

/// Check that repeated symbolization does not change the outcome.
#[test]
fn idempotence() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000, 0x401010]);

    let _report = symbolizer(&inspector).symbolize("", &mut prof).unwrap();
    let before = prof.clone();
    let _report = symbolizer(&inspector).symbolize("local", &mut prof).unwrap();
    assert_eq!(prof, before);
    let _report = symbolizer(&inspector).symbolize("", &mut prof).unwrap();
    assert_eq!(prof, before);
}

/// Check that unknown directive options are reported, but otherwise
/// ignored.
#[test]
fn unrecognized_option() {
    let inspector = main_binary();
    let mut prof = profile(&[0x401000]);

    let report = symbolizer(&inspector)
        .symbolize("local:bogus:demangle=weird", &mut prof)
        .unwrap();
    assert_eq!(
        report.warnings,
        vec![
            Warning::UnrecognizedOption {
                option: "bogus".to_string()
            },
            Warning::UnrecognizedOption {
                option: "demangle=weird".to_string()
            },
        ]
    );
    assert_eq!(prof.functions[0].name, "ns::Foo");
}

/// Check that remote symbolization is used when requested.
#[test]
fn remote_only() {
    let inspector = main_binary();
    let mut sources = MappingSources::new();
    let () = sources.add(MAIN, "http://symbols.example.com/symbolz");

    let requests = Rc::new(RefCell::new(Vec::new()));
    let requests_ = Rc::clone(&requests);
    let symbolizer = Symbolizer::builder()
        .set_inspector(inspector.clone())
        .set_sources(sources)
        .set_transport(move |url: &str, body: &[u8]| -> Result<Vec<u8>> {
            let () = requests_
                .borrow_mut()
                .push((url.to_string(), body.to_vec()));
            Ok(b"0x401000 _ZN2ns3FooIiEEvi\n".to_vec())
        })
        .build();

    let mut prof = profile(&[0x401000, 0x402000]);
    let report = symbolizer.symbolize("remote", &mut prof).unwrap();
    assert_eq!(report.local, Stage::Skipped);
    assert_eq!(report.remote, Stage::Succeeded);
    assert!(inspector.log.borrow().opened.is_empty());
    assert_eq!(
        *requests.borrow(),
        vec![(
            "http://symbols.example.com/symbolz".to_string(),
            b"0x401000+0x402000".to_vec()
        )]
    );

    assert_eq!(prof.functions.len(), 1);
    assert_eq!(prof.functions[0].system_name, "_ZN2ns3FooIiEEvi");
    #[cfg(feature = "demangle")]
    assert_eq!(prof.functions[0].name, "ns::Foo");
    assert_eq!(prof.locations[0].lines.len(), 1);
    assert_eq!(prof.locations[1].lines, Vec::new());
    assert!(prof.mappings[0].has_functions);
}

/// Make sure that running out of symbol services is an error.
#[test]
fn remote_exhaustion() {
    let mut sources = MappingSources::new();
    let () = sources.add(MAIN, "http://a.example.com/symbolz");
    let () = sources.add(MAIN, "http://b.example.com/symbolz");

    let attempts = Rc::new(RefCell::new(0));
    let attempts_ = Rc::clone(&attempts);
    let symbolizer = Symbolizer::builder()
        .set_inspector(main_binary())
        .set_sources(sources)
        .set_transport(move |_url: &str, _body: &[u8]| -> Result<Vec<u8>> {
            *attempts_.borrow_mut() += 1;
            Err(Error::with_not_found("server response: 404 Not Found"))
        })
        .build();

    let mut prof = profile(&[0x401000]);
    let err = symbolizer.symbolize("remote", &mut prof).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(*attempts.borrow(), 2);
    assert_eq!(prof.locations[0].lines, Vec::new());
}

/// Check that a successful local pass makes remote symbolization
/// unnecessary.
#[test]
fn local_before_remote() {
    let mut sources = MappingSources::new();
    let () = sources.add(MAIN, "http://symbols.example.com/symbolz");

    let symbolizer = Symbolizer::builder()
        .set_inspector(main_binary())
        .set_sources(sources)
        .set_transport(|_url: &str, _body: &[u8]| -> Result<Vec<u8>> {
            panic!("remote symbolization should not happen")
        })
        .build();

    let mut prof = profile(&[0x401000]);
    let report = symbolizer.symbolize("", &mut prof).unwrap();
    assert_eq!(report.local, Stage::Succeeded);
    assert_eq!(report.remote, Stage::Skipped);
}
