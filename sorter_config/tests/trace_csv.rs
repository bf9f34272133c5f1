use std::fs::File;
use std::io::Write;

use rstest::rstest;
use sorter_config::{SampleRow, load_sample_trace_csv, parse_sample_trace};
use tempfile::tempdir;

#[rstest]
fn loads_trace_from_file() {
    let dir = tempdir().unwrap();
    let p = dir.path().join("trace.csv");
    let mut f = File::create(&p).unwrap();
    writeln!(f, "clear,red,green,blue").unwrap();
    writeln!(f, "10,3,3,3").unwrap();
    writeln!(f, "60, 40, 20, 10").unwrap();
    drop(f);

    let rows = load_sample_trace_csv(&p).unwrap();
    assert_eq!(
        rows,
        vec![
            SampleRow {
                clear: 10,
                red: 3,
                green: 3,
                blue: 3
            },
            SampleRow {
                clear: 60,
                red: 40,
                green: 20,
                blue: 10
            },
        ]
    );
}

#[rstest]
#[case("red,clear,green,blue\n1,2,3,4\n", "must have headers")]
#[case("clear,red,green\n1,2,3\n", "must have headers")]
#[case("clear,red,green,blue\n1,2,3,x\n", "invalid CSV row 2")]
#[case("clear,red,green,blue\n1,2,3,70000\n", "invalid CSV row 2")]
#[case("clear,red,green,blue\n", "empty")]
fn rejects_bad_traces(#[case] text: &str, #[case] msg: &str) {
    let err = parse_sample_trace(text.as_bytes()).expect_err("should reject");
    assert!(format!("{err}").contains(msg), "expected '{msg}' in '{err}'");
}

#[test]
fn missing_file_reports_path() {
    let err = load_sample_trace_csv(std::path::Path::new("/nonexistent/trace.csv"))
        .expect_err("should fail");
    assert!(format!("{err}").contains("trace.csv"));
}
