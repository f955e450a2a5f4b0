use gradebookd::cell::CellValue;
use gradebookd::codec;
use gradebookd::grid::TabularGrid;
use gradebookd::workbook::Workbook;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn cell() -> impl Strategy<Value = CellValue> {
    prop_oneof![
        3 => Just(CellValue::Empty),
        3 => (-1.0e6_f64..1.0e6).prop_map(CellValue::Number),
        1 => (-500_i64..500).prop_map(CellValue::from),
        3 => "[A-Za-z0-9]{1,8}".prop_map(CellValue::Text),
        // Padding, tabs, newlines and text that looks like an xlsx escape.
        2 => "[ \t\n]{0,2}[A-Za-z_]{1,4}(_x[0-9A-F]{4}_)?[ \t\n]{0,2}".prop_map(CellValue::Text),
    ]
}

fn grid() -> impl Strategy<Value = TabularGrid> {
    prop::collection::vec(prop::collection::vec(cell(), 0..6), 0..6).prop_map(TabularGrid::from_rows)
}

fn workbook() -> impl Strategy<Value = Workbook> {
    prop::collection::vec(grid(), 1..4).prop_map(|grids| {
        let mut wb = Workbook::new();
        for (i, g) in grids.into_iter().enumerate() {
            wb.add_sheet(&format!("Sheet {}", i + 1), g).expect("unique name");
        }
        wb
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn decode_of_encode_preserves_names_order_and_cells(wb in workbook()) {
        let bytes = codec::encode(&wb).expect("encode");
        let back = codec::decode(&bytes).expect("decode");

        prop_assert_eq!(back.sheet_names(), wb.sheet_names());
        for (a, b) in wb.sheets().iter().zip(back.sheets()) {
            // Trailing blank rows and columns have no representation in xlsx.
            prop_assert_eq!(a.grid.trimmed(), b.grid.trimmed());
        }
    }
}

#[test]
fn file_on_disk_roundtrips_with_unicode_sheet_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("grades.xlsx");

    let mut wb = Workbook::new();
    wb.add_sheet(
        "الفصل الأول",
        TabularGrid::from_rows(vec![
            vec!["الاسم".into(), "رياضيات".into(), "ملاحظات".into()],
            vec!["علي".into(), CellValue::Number(95.5), CellValue::Empty],
            vec!["سارة".into(), "غائب".into(), "متابعة".into()],
        ]),
    )
    .expect("sheet");
    wb.add_sheet("Empty", TabularGrid::create(3, 3).expect("blank"))
        .expect("sheet");

    std::fs::write(&path, codec::encode(&wb).expect("encode")).expect("write");
    let back = codec::decode(&std::fs::read(&path).expect("read")).expect("decode");

    assert_eq!(back.sheet_names(), vec!["الفصل الأول", "Empty"]);
    let first = back.sheet("الفصل الأول").expect("first sheet");
    assert_eq!(first.cell(1, 1), &CellValue::Number(95.5));
    assert!(first.cell(1, 2).is_empty());
    assert_eq!(first.cell(2, 2), &CellValue::from("متابعة"));
    assert!(back.sheet("Empty").expect("empty sheet").is_empty());
}
