use ine_rs::analytics::{self, EMA_COLUMN, MOM_COLUMN, MOVING_AVG_COLUMN, YOY_COLUMN};
use ine_rs::{DataResponse, Language, Record};

fn response(values: &[f64], periods: &[&str]) -> DataResponse {
    let mut resp = DataResponse::new("0004167", Language::En);
    resp.title = "Resident population".into();
    resp.data = values
        .iter()
        .zip(periods)
        .map(|(v, p)| Record::new(Some(*v)).with_field("Period", *p))
        .collect();
    resp
}

fn rounded(records: &[Record], column: &str) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|r| r.numeric(column).map(|v| (v * 100.0).round() / 100.0))
        .collect()
}

#[test]
fn yoy_growth_matches_hand_computed_values() {
    // Deliberately out of order: results follow period order.
    let resp = response(&[120.0, 100.0, 132.0, 110.0], &["2022", "2020", "2023", "2021"]);
    let out = resp.calculate_yoy_growth().unwrap();
    assert_eq!(
        rounded(&out.data, YOY_COLUMN),
        vec![None, Some(10.0), Some(9.09), Some(10.0)]
    );
    let periods: Vec<_> = out
        .data
        .iter()
        .map(|r| r.field("Period").and_then(|p| p.as_str()).unwrap_or_default())
        .collect();
    assert_eq!(periods, vec!["2020", "2021", "2022", "2023"]);
}

#[test]
fn mom_change_matches_hand_computed_values() {
    let resp = response(
        &[100.0, 105.0, 110.0, 108.0, 115.0],
        &["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"],
    );
    let out = resp.calculate_mom_change().unwrap();
    assert_eq!(
        rounded(&out.data, MOM_COLUMN),
        vec![None, Some(5.0), Some(4.76), Some(-1.82), Some(6.48)]
    );
}

#[test]
fn moving_average_and_ema() {
    let resp = response(
        &[100.0, 105.0, 110.0, 108.0, 115.0],
        &["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"],
    );
    let ma = resp.calculate_moving_average(3).unwrap();
    let col = rounded(&ma.data, MOVING_AVG_COLUMN);
    assert_eq!(col[..2], [None, None]);
    assert_eq!(col[2], Some(105.0));
    assert_eq!(col[4], Some(111.0));

    let ema = resp.calculate_exponential_moving_average(3).unwrap();
    assert!(ema.data.iter().all(|r| r.numeric(EMA_COLUMN).is_some()));
    assert_eq!(ema.data[0].numeric(EMA_COLUMN), Some(100.0));
}

#[test]
fn transforms_chain_and_leave_input_untouched() {
    let resp = response(&[100.0, 110.0, 121.0], &["2020", "2021", "2022"]);
    let before = resp.clone();

    let out = resp
        .calculate_yoy_growth()
        .and_then(|r| r.calculate_moving_average(2))
        .unwrap();
    assert_eq!(resp, before);
    assert_eq!(out.title, "Resident population");
    assert!(out.data.iter().all(|r| r.has_field(YOY_COLUMN)));
    assert!(out.data.iter().all(|r| r.has_field(MOVING_AVG_COLUMN)));
    assert_eq!(out.data[2].numeric(YOY_COLUMN).map(f64::round), Some(10.0));
}

#[test]
fn empty_input_yields_empty_output() {
    let resp = response(&[], &[]);
    assert!(resp.calculate_yoy_growth().unwrap().is_empty());
    assert!(resp.calculate_moving_average(3).unwrap().is_empty());
    assert!(analytics::calculate_mom_change(&[], "value", "Period").unwrap().is_empty());
}

#[test]
fn custom_fields_are_honoured() {
    let records: Vec<Record> = [("2020", 10.0), ("2021", 20.0)]
        .iter()
        .map(|(p, v)| {
            Record::new(None)
                .with_field("Ano", *p)
                .with_field("total", *v)
        })
        .collect();
    let out = analytics::calculate_yoy_growth(&records, "total", "Ano").unwrap();
    assert_eq!(out[1].numeric(YOY_COLUMN), Some(100.0));
    assert!(analytics::calculate_yoy_growth(&records, "value", "Period").is_err());
}

#[test]
fn summary_groups_by_field() {
    let mut resp = response(&[1.0, 3.0, 5.0], &["2020", "2021", "2022"]);
    resp.data[2] = resp.data[2].clone().with_field("geo", "Norte");
    resp.data[0] = resp.data[0].clone().with_field("geo", "PT");
    resp.data[1] = resp.data[1].clone().with_field("geo", "PT");
    let summaries = resp.summary(Some("geo"));
    assert_eq!(summaries.len(), 2);
    let pt = summaries
        .iter()
        .find(|s| s.group.as_deref() == Some("PT"))
        .unwrap();
    assert_eq!(pt.count, 2);
    assert_eq!(pt.mean, Some(2.0));
    assert_eq!(pt.median, Some(2.0));

    let all = resp.summary(None);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].min, Some(1.0));
    assert_eq!(all[0].max, Some(5.0));
}
