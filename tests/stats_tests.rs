use dashboard::loader::{Table, from_csv};
use dashboard::stats::{SUMMARY_COLUMNS, Summary, describe, summary_columns};
use serde_json::json;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn parse(text: &str) -> Table {
    Table::from_reader(text.as_bytes()).expect("valid CSV")
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value should be present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_no_allow_listed_columns_gives_explicit_empty_result() {
    let table = from_csv(fixture("no_category.csv")).unwrap();
    let summary = describe(&table);

    assert_eq!(summary, Summary::NoMatchingColumns);
    assert!(summary.to_map().is_empty());
    assert!(summary.features().is_empty());
}

#[test]
fn test_subset_is_kept_in_allow_list_order() {
    // File order differs from allow-list order on purpose
    let table = parse("Weight,Name,Torque,Horsepower\n1000,a,200,100\n1200,b,250,150\n");

    assert_eq!(summary_columns(&table), vec!["Horsepower", "Torque", "Weight"]);

    let summary = describe(&table);
    assert_eq!(summary.features(), vec!["Horsepower", "Torque", "Weight"]);
    let keys: Vec<String> = summary.to_map().keys().cloned().collect();
    assert_eq!(keys, vec!["Horsepower", "Torque", "Weight"]);
}

#[test]
fn test_all_allow_listed_columns_present() {
    let header = SUMMARY_COLUMNS.join(",");
    let table = parse(&format!("{}\n1,2,3,4,5,6\n", header));
    assert_eq!(summary_columns(&table), SUMMARY_COLUMNS.to_vec());
}

#[test]
fn test_descriptive_statistics_of_a_column() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let Summary::Features(rows) = describe(&table) else {
        panic!("cars.csv has allow-listed columns");
    };

    let horsepower = rows.iter().find(|r| r.feature == "Horsepower").unwrap();
    assert_eq!(horsepower.count, 6);
    assert_close(horsepower.mean, 1310.0 / 6.0);
    assert_close(horsepower.std.map(|s| (s * 1e6).round() / 1e6), 135.265172);
    assert_close(horsepower.min, 90.0);
    assert_close(horsepower.q25, 127.5);
    assert_close(horsepower.q50, 175.0);
    assert_close(horsepower.q75, 275.0);
    assert_close(horsepower.max, 450.0);
}

#[test]
fn test_structured_form_uses_percentile_keys() {
    let table = parse("Torque\n100\n200\n300\n");
    let map = describe(&table).to_map();

    assert_eq!(
        map["Torque"],
        json!({
            "count": 3,
            "mean": 200.0,
            "std": 100.0,
            "min": 100.0,
            "25%": 150.0,
            "50%": 200.0,
            "75%": 250.0,
            "max": 300.0
        })
    );
}

#[test]
fn test_text_column_is_kept_without_numbers() {
    let table = parse("Weight,Torque\nheavy,100\nlight,200\n");
    let Summary::Features(rows) = describe(&table) else {
        panic!("both columns are allow-listed");
    };

    assert_eq!(rows[1].feature, "Weight");
    assert_eq!(rows[1].count, 0);
    assert_eq!(rows[1].mean, None);
    assert_eq!(rows[1].max, None);
}

#[test]
fn test_missing_cells_are_not_counted() {
    let table = parse("Top_Speed,x\n200,a\n,b\n220,c\n");
    let Summary::Features(rows) = describe(&table) else {
        panic!("Top_Speed is allow-listed");
    };
    assert_eq!(rows[0].count, 2);
    assert_close(rows[0].mean, 210.0);
}
