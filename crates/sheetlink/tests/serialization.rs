//! Tests for the raw and display text forms

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sheetlink::prelude::*;
use sheetlink::{read_sheet_file, serialize, write_sheet_file};

fn profit_sheet() -> Sheet {
    let mut sheet = Sheet::new();
    for (address, raw) in [
        ("A1", "Revenue"),
        ("B1", "1000"),
        ("C1", "1500"),
        ("A2", "Expenses"),
        ("B2", "600"),
        ("C2", "800"),
        ("A3", "Profit"),
        ("B3", "=B1-B2"),
        ("C3", "=C1-C2"),
        ("A4", "Total Profit"),
        ("B4", "=B3+C3"),
    ] {
        sheet.set(address, raw).unwrap();
    }
    sheet
}

#[test]
fn test_snapshot_forms() {
    let sheet = profit_sheet();
    let result = sheet.evaluate("profit", &NullResolver);
    let serialized = serialize(&sheet, Some(&result), &SnapshotOptions::default());

    assert_eq!(
        serialized.raw,
        "# sheetlink rows=4 cols=3\n\
         A1=Revenue\nB1=1000\nC1=1500\n\
         A2=Expenses\nB2=600\nC2=800\n\
         A3=Profit\nB3==B1-B2\nC3==C1-C2\n\
         A4=Total Profit\nB4==B3+C3\n"
    );
    assert_eq!(
        serialized.display.as_deref(),
        Some(
            "# sheetlink rows=4 cols=3\n\
             A1=Revenue\nB1=1000\nC1=1500\n\
             A2=Expenses\nB2=600\nC2=800\n\
             A3=Profit\nB3=400\nC3=700\n\
             A4=Total Profit\nB4=1100\n"
        )
    );
}

#[test]
fn test_display_form_error_messages() {
    let mut sheet = Sheet::new();
    sheet.set("A1", "=1/0").unwrap();
    sheet.set("A2", "=@[Gone](gone):A1").unwrap();
    let result = sheet.evaluate("errors", &NullResolver);

    let with_messages = to_display_string(&sheet, &result, &SnapshotOptions::default());
    assert_eq!(
        with_messages,
        "# sheetlink rows=2 cols=1\n\
         A1=#DIV/0! (Division by zero)\n\
         A2=#ERROR (Page not found)\n"
    );

    let options = SnapshotOptions {
        include_error_messages: false,
    };
    let tokens_only = to_display_string(&sheet, &result, &options);
    assert_eq!(
        tokens_only,
        "# sheetlink rows=2 cols=1\nA1=#DIV/0!\nA2=#ERROR\n"
    );
}

#[test]
fn test_raw_round_trip_reproduces_results() {
    let sheet = profit_sheet();
    let parsed = parse_raw(&to_raw_string(&sheet)).unwrap();

    assert_eq!(parsed, sheet);
    assert_eq!(
        parsed.evaluate("profit", &NullResolver),
        sheet.evaluate("profit", &NullResolver)
    );
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profit.sheet");

    let sheet = profit_sheet();
    write_sheet_file(&sheet, &path).unwrap();
    assert_eq!(read_sheet_file(&path).unwrap(), sheet);

    assert!(read_sheet_file(dir.path().join("missing.sheet")).is_err());
}

fn raw_input() -> impl Strategy<Value = String> {
    prop_oneof![
        (-1000i32..1000).prop_map(|n| n.to_string()),
        r#"[a-zA-Z0-9 =+*/&()@:,"\\\n\r-]{0,12}"#,
        prop::sample::select(vec![
            "=A1+1",
            "=SUM(A1:C3)",
            "=IF(B2>3, A1, \"no\")",
            "=B1*C2-A3",
            "=A1&\" units\"",
            "=AVERAGE(A1:A5)",
            "=1/0",
            "=@[Other](other):A1",
        ])
        .prop_map(String::from),
    ]
}

fn arb_sheet() -> impl Strategy<Value = Sheet> {
    prop::collection::vec((0u32..6, 0u16..4, raw_input()), 0..20).prop_map(|cells| {
        let mut sheet = Sheet::new();
        for (row, col, raw) in cells {
            sheet.set_at(CellAddress::new(row, col), raw).unwrap();
        }
        sheet
    })
}

proptest! {
    #[test]
    fn prop_raw_form_round_trips(sheet in arb_sheet()) {
        let raw = to_raw_string(&sheet);
        let parsed = parse_raw(&raw).unwrap();
        prop_assert_eq!(&parsed, &sheet);
        prop_assert_eq!(to_raw_string(&parsed), raw);
    }

    #[test]
    fn prop_evaluation_is_pure(sheet in arb_sheet()) {
        let first = sheet.evaluate("page", &NullResolver);
        let second = sheet.evaluate("page", &NullResolver);
        prop_assert_eq!(&first, &second);

        let reparsed = parse_raw(&to_raw_string(&sheet)).unwrap();
        prop_assert_eq!(reparsed.evaluate("page", &NullResolver), first);
    }
}
