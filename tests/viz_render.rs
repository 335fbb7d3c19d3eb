use ine_rs::Record;
use ine_rs::viz::{self, ChartKind, PlotOptions};
use std::fs;

fn sample_records() -> Vec<Record> {
    let mut out = Vec::new();
    for (geo, base) in [("Norte", 3_500_000.0), ("Centro", 2_200_000.0)] {
        for (i, year) in ["2019", "2020", "2021"].iter().enumerate() {
            out.push(
                Record::new(Some(base + 10_000.0 * i as f64))
                    .with_field("Period", *year)
                    .with_field("geodsg", geo),
            );
        }
    }
    out
}

#[test]
fn every_chart_kind_renders_svg() {
    let dir = tempfile::tempdir().unwrap();
    let records = sample_records();
    for kind in [ChartKind::Line, ChartKind::Bar, ChartKind::Area, ChartKind::Scatter] {
        let path = dir.path().join(format!("chart_{kind}.svg"));
        let opts = PlotOptions::default()
            .with_kind(kind)
            .with_color("geodsg")
            .with_title("Resident population")
            .with_size(800, 480);
        viz::plot(&records, &opts, &path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"), "{kind}: not an svg document");
        assert!(svg.contains("Resident population"), "{kind}: title missing");
    }
}

#[test]
fn png_output_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("charts/population.png");
    let opts = PlotOptions::default().with_kind(ChartKind::Bar).with_size(320, 200);
    viz::plot(&sample_records(), &opts, &path).unwrap();
    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn missing_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let opts = PlotOptions::default().with_color("region");
    let err = viz::plot(&sample_records(), &opts, dir.path().join("x.svg")).unwrap_err();
    assert!(err.to_string().contains("region"));
}

#[test]
fn chart_kind_parses_case_insensitively() {
    assert_eq!("Bar".parse::<ChartKind>().unwrap(), ChartKind::Bar);
    assert!("pie".parse::<ChartKind>().is_err());
}
