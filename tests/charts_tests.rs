#![cfg(feature = "web")]
use dashboard::charts::{
    ChartError, ChartKind, category_counts, category_sums, chart_columns, generate_charts,
    histogram_bins, render_chart, scatter_points,
};
use dashboard::loader::{Table, from_csv};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn parse(text: &str) -> Table {
    Table::from_reader(text.as_bytes()).expect("valid CSV")
}

#[test]
fn test_chart_columns_are_positional() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let (x, y) = chart_columns(&table).unwrap();
    assert_eq!(x.name(), "Model");
    assert_eq!(y.name(), "Horsepower");

    // Same data, columns swapped: the selection follows position, not meaning
    let swapped = parse("Horsepower,Model\n150,A\n300,B\n");
    let (x, y) = chart_columns(&swapped).unwrap();
    assert_eq!(x.name(), "Horsepower");
    assert_eq!(y.name(), "Model");
}

#[test]
fn test_single_column_table_gets_no_charts() {
    let table = from_csv(fixture("single_column.csv")).unwrap();
    assert!(chart_columns(&table).is_none());

    let charts = generate_charts(&table);
    assert!(charts.is_empty());
    for kind in ChartKind::ALL {
        assert!(charts.get(kind).is_none(), "{} chart should be absent", kind.label());
    }
}

#[test]
fn test_all_four_charts_render_as_svg() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let charts = generate_charts(&table);

    for kind in ChartKind::ALL {
        let svg = charts
            .get(kind)
            .unwrap_or_else(|| panic!("{} chart missing", kind.label()));
        assert!(svg.contains("<svg"), "{} chart is not SVG", kind.label());
    }
}

#[test]
fn test_failed_chart_leaves_others_in_place() {
    // Second column is text: bar, histogram and scatter need numbers, pie does not
    let table = parse("Category,Label\nSUV,big\nSedan,small\nSUV,huge\n");
    let charts = generate_charts(&table);

    assert!(charts.pie.is_some());
    assert!(charts.bar.is_none());
    assert!(charts.histogram.is_none());
    assert!(charts.scatter.is_none());
}

#[test]
fn test_render_reports_non_numeric_column() {
    let table = parse("a,b\nx,y\n");
    let (x, y) = chart_columns(&table).unwrap();
    let err = render_chart(ChartKind::Histogram, x, y).unwrap_err();
    assert!(matches!(err, ChartError::NotNumeric(ref name) if name == "b"));
}

#[test]
fn test_bar_data_sums_per_category_in_first_seen_order() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let category = table.column("Category").unwrap();
    let horsepower = table.column("Horsepower").unwrap();

    let sums = category_sums(category, horsepower).unwrap();
    assert_eq!(
        sums,
        vec![
            ("Sedan".to_string(), 270.0),
            ("SUV".to_string(), 500.0),
            ("Sports".to_string(), 450.0),
            ("Hatch".to_string(), 90.0),
        ]
    );
}

#[test]
fn test_pie_data_counts_categories() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let counts = category_counts(table.column("Category").unwrap()).unwrap();
    assert_eq!(
        counts,
        vec![
            ("Sedan".to_string(), 2),
            ("SUV".to_string(), 2),
            ("Sports".to_string(), 1),
            ("Hatch".to_string(), 1),
        ]
    );
}

#[test]
fn test_histogram_bins_cover_every_value() {
    let table = from_csv(fixture("cars.csv")).unwrap();
    let bins = histogram_bins(table.column("Horsepower").unwrap()).unwrap();

    // Sturges: ceil(log2(6)) + 1
    assert_eq!(bins.len(), 4);
    assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 6);
    assert_eq!(bins[0].start, 90.0);
    assert_eq!(bins[3].end, 450.0);
    // The maximum lands in the last bin
    assert!(bins[3].count >= 1);
}

#[test]
fn test_histogram_of_constant_column_has_one_bin() {
    let table = parse("v\n5\n5\n5\n");
    let bins = histogram_bins(table.column("v").unwrap()).unwrap();
    assert_eq!(bins.len(), 1);
    assert_eq!(bins[0].count, 3);
}

#[test]
fn test_scatter_places_text_categories_by_position() {
    let table = parse("Model,Horsepower\nA,150\nB,300\nA,120\n");
    let (x, y) = chart_columns(&table).unwrap();
    let (points, labels) = scatter_points(x, y).unwrap();

    assert_eq!(points, vec![(0.0, 150.0), (1.0, 300.0), (0.0, 120.0)]);
    assert_eq!(labels, Some(vec!["A".to_string(), "B".to_string()]));
}

#[test]
fn test_scatter_uses_numeric_x_directly() {
    let table = parse("Weight,Horsepower\n1000,150\n,300\n1500,120\n");
    let (x, y) = chart_columns(&table).unwrap();
    let (points, labels) = scatter_points(x, y).unwrap();

    assert_eq!(points, vec![(1000.0, 150.0), (1500.0, 120.0)]);
    assert_eq!(labels, None);
}
