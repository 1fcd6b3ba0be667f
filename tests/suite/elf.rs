use std::env::current_exe;

use profsym::ElfInspector;
use profsym::Inspect as _;
use profsym::Mapping;
use profsym::Profile;
use profsym::Stage;
use profsym::Symbolizer;
use profsym::Warning;

use test_log::test;


fn profile(file: &str, build_id: &str) -> Profile {
    let mut profile = Profile::new();
    let main = profile.add_mapping(Mapping {
        start: 0,
        limit: u64::MAX,
        file: file.to_string(),
        build_id: build_id.to_string(),
        ..Default::default()
    });
    let _idx = profile.add_location(Some(main), 0x1000);
    profile
}


/// Make sure that a non-existent binary results in a warning and
/// otherwise leaves the profile alone.
#[test]
fn non_existent_binary() {
    let mut prof = profile("/does-not-exist/main", "");
    let report = Symbolizer::new().symbolize("local", &mut prof).unwrap();
    assert_eq!(report.local, Stage::Succeeded);
    assert!(matches!(
        &report.warnings[..],
        [Warning::OpenFailed { path, .. }] if path == "/does-not-exist/main"
    ));
    assert_eq!(prof.locations[0].lines, Vec::new());
    assert!(!prof.mappings[0].is_symbolized());
}

/// Check that build IDs read from an actual binary are compared
/// against the ones recorded in the profile.
#[test]
fn build_id_check() {
    let exe = current_exe().unwrap();
    let segment = ElfInspector::new().open(&exe, 0, u64::MAX, 0).unwrap();
    let build_id = match segment.build_id() {
        Some(build_id) => build_id,
        // Not every linker emits a build ID.
        None => return,
    };
    let exe = exe.display().to_string();

    let mut prof = profile(&exe, &build_id);
    let report = Symbolizer::new().symbolize("fastlocal", &mut prof).unwrap();
    assert_eq!(report.warnings, Vec::new());

    let mut prof = profile(&exe, "00");
    let report = Symbolizer::new().symbolize("fastlocal", &mut prof).unwrap();
    assert_eq!(
        report.warnings,
        vec![Warning::BuildIdMismatch {
            path: exe,
            expected: "00".to_string(),
            actual: build_id,
        }]
    );
    assert_eq!(prof.locations[0].lines, Vec::new());
}
