use scroll::Endian;

use symbolic_covmap::format::{parse_filenames, CovMap, CoverageMapping};
use symbolic_covmap::*;

fn region(file: &str, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> CodeRegion {
    CodeRegion::new(file, start_line, start_col, end_line, end_col)
}

#[test]
fn test_filenames_are_normalized_and_deduplicated() {
    let mut filenames = FilenameTable::with_working_dir("/src/project");
    assert_eq!(filenames.intern("a.rs").unwrap(), 0);
    assert_eq!(filenames.intern("./b/../b.rs").unwrap(), 1);
    assert_eq!(filenames.intern("/src/project/a.rs").unwrap(), 0);
    assert_eq!(filenames.len(), 2);

    let section = filenames.to_section_bytes();
    insta::assert_debug_snapshot!(parse_filenames(&section).unwrap(), @r###"
    [
        "/src/project/a.rs",
        "/src/project/b.rs",
    ]
    "###);
}

#[test]
fn test_single_region_round_trip() {
    let regions = [MappingRegion::code(
        Counter::CounterValueReference(0),
        0,
        1,
        1,
        3,
        2,
    )];
    let payload = CoverageMappingWriter::new(&[0], &[], &regions)
        .to_vec()
        .unwrap();
    assert_eq!(payload, [1, 0, 0, 0, 1, 8, 1, 1, 2, 2]);

    let mapping = CoverageMapping::parse(&payload).unwrap();
    assert_eq!(mapping.file_ids, [0]);
    assert!(mapping.expressions.is_empty());
    assert_eq!(mapping.regions, regions);
}

#[test]
fn test_expression_round_trip() {
    let mut expressions = ExpressionTable::new();
    let counter = expressions.add_counter(
        ExprKind::Add,
        Counter::CounterValueReference(1),
        Counter::Zero,
    );
    assert_eq!(counter, Counter::Expression(0));

    let regions = [
        MappingRegion::code(Counter::CounterValueReference(1), 0, 2, 1, 8, 2),
        MappingRegion::code(counter, 0, 4, 5, 4, 30),
    ];
    let payload = CoverageMappingWriter::new(&[0], expressions.as_slice(), &regions)
        .to_vec()
        .unwrap();

    let mapping = CoverageMapping::parse(&payload).unwrap();
    assert_eq!(mapping.expressions, expressions.as_slice());
    assert_eq!(mapping.regions, regions);
    assert_eq!(mapping.expressions[0].to_string(), "#1 + 0");
}

#[test]
fn test_all_region_kinds_round_trip() {
    let regions = [
        MappingRegion::code(Counter::CounterValueReference(0), 0, 1, 1, 20, 2),
        MappingRegion::code(Counter::CounterValueReference(0), 0, 3, 5, 3, 12).with_kind(
            RegionKind::Expansion {
                expanded_file_id: 1,
            },
        ),
        MappingRegion::code(Counter::CounterValueReference(1), 0, 5, 9, 5, 20).with_kind(
            RegionKind::Branch {
                false_counter: Counter::CounterValueReference(2),
            },
        ),
        MappingRegion::code(Counter::Zero, 0, 7, 1, 7, 40).with_kind(RegionKind::Gap),
        MappingRegion::code(Counter::Zero, 0, 9, 1, 11, 2).with_kind(RegionKind::Skipped),
        MappingRegion::code(Counter::CounterValueReference(0), 1, 1, 1, 4, 2),
    ];
    let payload = CoverageMappingWriter::new(&[0, 1], &[], &regions)
        .to_vec()
        .unwrap();
    assert_eq!(CoverageMapping::parse(&payload).unwrap().regions, regions);
}

#[test]
fn test_encoding_is_deterministic() {
    let build = || {
        let mut coverage = FunctionCoverage::new(7, 2, 1);
        coverage.add_counter(1, region("lib.rs", 1, 1, 9, 2)).unwrap();
        coverage.add_counter(2, region("util.rs", 3, 5, 3, 9)).unwrap();
        let expression_region = region("lib.rs", 4, 1, 4, 8);
        coverage
            .add_counter_expression(u32::MAX, 1, ExprKind::Subtract, 2, Some(expression_region))
            .unwrap();

        let mut filenames = FilenameTable::with_working_dir("/work");
        let record = coverage.into_record(99, &mut filenames, |_| {}).unwrap();
        let mut writer = CoverageMapWriter::new(Endian::Little);
        writer.add_function(&record).unwrap();
        writer.finish(&filenames).unwrap()
    };
    similar_asserts::assert_eq!(build(), build());
}

#[test]
fn test_unsorted_regions() {
    let regions = [
        MappingRegion::code(Counter::CounterValueReference(0), 0, 5, 1, 6, 1),
        MappingRegion::code(Counter::CounterValueReference(1), 0, 2, 1, 3, 1),
    ];
    assert_eq!(
        encode_regions(&regions, &[0]),
        Err(EncodingError::UnsortedRegions { index: 1 })
    );

    // the same regions in reverse counter order are sorted when collected per function
    let mut coverage = FunctionCoverage::new(1, 2, 0);
    coverage.add_counter(1, region("a.rs", 5, 1, 6, 1)).unwrap();
    coverage.add_counter(2, region("a.rs", 2, 1, 3, 1)).unwrap();
    let mut filenames = FilenameTable::with_working_dir("/");
    let record = coverage.into_record(1, &mut filenames, |_| {}).unwrap();

    let lines: Vec<_> = record.regions.iter().map(|r| r.line_start).collect();
    assert_eq!(lines, [2, 5]);
    assert!(record.payload().is_ok());
}

#[test]
fn test_module_section() {
    let mut filenames = FilenameTable::with_working_dir("/src/project");
    let mut writer = CoverageMapWriter::new(Endian::Little);

    let mut main = FunctionCoverage::new(0x1111, 2, 1);
    main.add_counter(1, region("main.rs", 1, 11, 6, 2)).unwrap();
    main.add_counter(2, region("main.rs", 2, 8, 4, 6)).unwrap();
    let expression_region = region("main.rs", 4, 6, 5, 6);
    main.add_counter_expression(u32::MAX, 1, ExprKind::Subtract, 2, Some(expression_region))
        .unwrap();
    main.add_unreachable_region(region("util.rs", 10, 1, 12, 2));
    let main = main.into_record(0xaaaa, &mut filenames, |_| {}).unwrap();
    writer.add_function(&main).unwrap();

    let mut helper = FunctionCoverage::new(0x2222, 1, 0);
    helper.add_counter(1, region("util.rs", 1, 1, 3, 2)).unwrap();
    let helper = helper.into_record(0xbbbb, &mut filenames, |_| {}).unwrap();
    assert_eq!(helper.file_ids, [1]);
    writer.add_function(&helper).unwrap();

    let section = writer.finish(&filenames).unwrap();
    assert_eq!(section.len() % COVMAP_ALIGNMENT, 0);

    let covmap = CovMap::parse(&section, Endian::Little).unwrap();
    assert_eq!(covmap.version(), current_version());
    assert_eq!(
        covmap.filenames(),
        ["/src/project/main.rs", "/src/project/util.rs"]
    );

    let functions = covmap
        .functions()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(functions.len(), 2);

    let first = &functions[0];
    assert_eq!(first.record.name_hash, 0xaaaa);
    assert_eq!(first.record.func_hash, 0x1111);
    let mapping = first.mapping().unwrap();
    similar_asserts::assert_eq!(mapping.file_ids, main.file_ids);
    similar_asserts::assert_eq!(mapping.expressions, main.expressions);
    similar_asserts::assert_eq!(mapping.regions, main.regions);

    let second = functions[1].mapping().unwrap();
    assert_eq!(second.file_ids, [1]);
    similar_asserts::assert_eq!(second.regions, helper.regions);
}

#[test]
fn test_shared_filenames_across_threads() {
    let table = SharedFilenameTable::new(FilenameTable::with_working_dir("/src"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let table = table.clone();
            std::thread::spawn(move || {
                let mut coverage = FunctionCoverage::new(0, 1, 0);
                coverage.add_counter(1, region("shared.rs", 1, 1, 2, 1)).unwrap();
                table.with(|filenames| coverage.into_record(0, filenames, |_| {}))
            })
        })
        .collect();

    for handle in handles {
        let record = handle.join().unwrap().unwrap();
        assert_eq!(record.file_ids, [0]);
    }
    assert_eq!(table.len(), 1);
}

#[test]
fn test_section_names() {
    assert_eq!(section_name(ObjectFormat::Elf).unwrap(), "__llvm_covmap");
    assert_eq!(section_name(ObjectFormat::Coff).unwrap(), ".lcovmap$M");
    assert_eq!(
        section_name_with_segment(ObjectFormat::MachO).unwrap(),
        "__LLVM_COV,__llvm_covmap"
    );
    assert_eq!(mapping_var_name(), "__llvm_coverage_mapping");

    let format = ObjectFormat::from_target_triple("powerpc64-ibm-aix");
    let error = section_name(format).unwrap_err();
    insta::assert_snapshot!(
        error.to_string(),
        @"object format xcoff does not support coverage mapping sections"
    );
}
