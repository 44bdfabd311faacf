//! 规则引擎集成测试
//!
//! 使用内置规则目录，覆盖从地块校验、规则评估到失败解释的完整流程。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Days, Local, Months, NaiveDate};
use rule_engine::{
    Engine, FailureReport, Outcome, Rule, RuleCatalog, RuleError, RunOptions, ViolationKind,
    all_rules_pass, run_engine, run_rules, some_rules_pass,
};
use serde_json::{Value, json};

/// 所有字段取默认值的地块，`overrides` 中的字段覆盖默认值
fn parcel_with(overrides: Value) -> Value {
    let mut parcel = json!({
        "areaFeatures": [],
        "hasReintroducedGrazing": false,
        "inWaterPollutionZone": false,
        "landCoverClass": 0,
        "perimeterFeatures": [],
        "previousActions": [],
        "ref": "PR123",
        "sssi": false,
        "totalArea": 0,
        "totalPerimeter": 0
    });
    if let (Some(target), Value::Object(fields)) = (parcel.as_object_mut(), overrides) {
        target.extend(fields);
    }
    parcel
}

fn rules(names: &[&str]) -> Vec<Rule> {
    RuleCatalog::builtin().unwrap().select(names).unwrap()
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

async fn expect_pass(names: &[&str], options: RunOptions) {
    let failures = run_rules(&rules(names), options).await.unwrap();
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
}

async fn expect_fail(names: &[&str], options: RunOptions, expected: FailureReport) {
    let failures = run_rules(&rules(names), options).await.unwrap();
    assert_eq!(failures, vec![expected]);
}

fn report(name: &str, description: &str, hint: Option<&str>, bounds: Value) -> FailureReport {
    FailureReport {
        name: name.to_string(),
        description: Some(description.to_string()),
        expanded_hint: hint.map(str::to_string),
        input_bounds: bounds,
    }
}

// ==================== 周长与面积 ====================

#[tokio::test]
async fn test_perimeter_rule() {
    let parcel = parcel_with(json!({ "totalPerimeter": 75 }));

    expect_pass(&["perimeter"], RunOptions::new(parcel.clone()).with_quantity(50.0)).await;
    expect_pass(&["perimeter"], RunOptions::new(parcel.clone()).with_quantity(75.0)).await;
    expect_fail(
        &["perimeter"],
        RunOptions::new(parcel).with_quantity(150.0),
        report(
            "withinPerimeter",
            "Claimed perimeter should be less than the total perimeter",
            Some("The claimed perimeter of 150 should be within the range (0 to 75)"),
            json!({ "lower": 0, "upper": 75 }),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_zero_quantity_is_outside_range() {
    let parcel = parcel_with(json!({ "totalPerimeter": 75 }));
    let failures = run_rules(&rules(&["perimeter"]), RunOptions::new(parcel).with_quantity(0.0))
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].expanded_hint.as_deref(),
        Some("The claimed perimeter of 0 should be within the range (0 to 75)")
    );
}

#[tokio::test]
async fn test_adjusted_perimeter_rule() {
    let parcel = parcel_with(json!({
        "totalPerimeter": 75,
        "perimeterFeatures": [ { "type": "lake", "length": 15 } ]
    }));

    expect_pass(&["adjustedPerimeter"], RunOptions::new(parcel.clone()).with_quantity(40.0)).await;
    expect_pass(&["adjustedPerimeter"], RunOptions::new(parcel.clone()).with_quantity(60.0)).await;
    expect_fail(
        &["adjustedPerimeter"],
        RunOptions::new(parcel).with_quantity(61.0),
        report(
            "withinAdjustedPerimeter",
            "Claimed perimeter should be less than the perimeter adjusted for perimeter features",
            Some(
                "The claimed perimeter of 61 should be within the range adjusted for perimeter features (0 to 60)",
            ),
            json!({ "lower": 0, "upper": 60 }),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_area_rule() {
    let parcel = parcel_with(json!({ "totalArea": 75 }));

    expect_pass(&["area"], RunOptions::new(parcel.clone()).with_quantity(40.0)).await;
    expect_pass(&["area"], RunOptions::new(parcel.clone()).with_quantity(75.0)).await;
    expect_fail(
        &["area"],
        RunOptions::new(parcel).with_quantity(76.0),
        report(
            "withinArea",
            "Claimed area should be less than the total area",
            Some("The claimed area of 76 should be within the range (0 to 75)"),
            json!({ "lower": 0, "upper": 75 }),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_pondless_area_rule() {
    let no_features = parcel_with(json!({ "totalArea": 75 }));
    expect_pass(&["pondlessArea"], RunOptions::new(no_features).with_quantity(40.0)).await;

    let with_pond = parcel_with(json!({
        "totalArea": 75,
        "areaFeatures": [ { "type": "pond", "areaCovered": 3 } ]
    }));
    expect_pass(&["pondlessArea"], RunOptions::new(with_pond.clone()).with_quantity(40.0)).await;
    expect_pass(&["pondlessArea"], RunOptions::new(with_pond.clone()).with_quantity(72.0)).await;
    expect_fail(
        &["pondlessArea"],
        RunOptions::new(with_pond).with_quantity(74.0),
        report(
            "withinPondlessArea",
            "Claimed area should be less than the area adjusted for ponds",
            Some("The claimed area of 74 should be within the range adjusted for ponds (0 to 72)"),
            json!({ "lower": 0, "upper": 72 }),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_tolerance_perimeter_rule() {
    let parcel = parcel_with(json!({ "totalPerimeter": 75 }));
    let options = |quantity: f64| {
        RunOptions::new(parcel.clone())
            .with_quantity(quantity)
            .with_tolerance(2.0)
    };

    expect_pass(&["tolerancePerimeter"], options(76.0)).await;
    expect_pass(&["tolerancePerimeter"], options(50.0)).await;
    expect_pass(&["tolerancePerimeter"], options(77.0)).await;
    expect_fail(
        &["tolerancePerimeter"],
        options(78.0),
        report(
            "withinTolerancePerimeter",
            "Perimeter should be within tolerance",
            None,
            json!({}),
        ),
    )
    .await;
}

// ==================== 地块属性 ====================

#[tokio::test]
async fn test_boolean_attribute_rules() {
    expect_pass(&["notSSSI"], RunOptions::new(parcel_with(json!({})))).await;
    expect_fail(
        &["notSSSI"],
        RunOptions::new(parcel_with(json!({ "sssi": true }))),
        report("notSSSI", "Parcel should not be in an SSSI", None, json!({})),
    )
    .await;

    expect_pass(
        &["hasReintroducedGrazing"],
        RunOptions::new(parcel_with(json!({ "hasReintroducedGrazing": true }))),
    )
    .await;
    expect_fail(
        &["hasReintroducedGrazing"],
        RunOptions::new(parcel_with(json!({}))),
        report(
            "hasReintroducedGrazing",
            "Grazing has been reintroduced for the parcel",
            None,
            json!({}),
        ),
    )
    .await;

    expect_pass(
        &["inWaterPollutionZone"],
        RunOptions::new(parcel_with(json!({ "inWaterPollutionZone": true }))),
    )
    .await;
    expect_fail(
        &["inWaterPollutionZone"],
        RunOptions::new(parcel_with(json!({}))),
        report(
            "inWaterPollutionZone",
            "Parcel should be in a water pollution zone",
            None,
            json!({}),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_cultivated_rule() {
    for class in [110, 670] {
        expect_pass(
            &["cultivatedParcel"],
            RunOptions::new(parcel_with(json!({ "landCoverClass": class }))),
        )
        .await;
    }
    expect_fail(
        &["cultivatedParcel"],
        RunOptions::new(parcel_with(json!({ "landCoverClass": 0 }))),
        report("cultivated", "Parcel should be a cultivated parcel", None, json!({})),
    )
    .await;
}

// ==================== 历史操作 ====================

#[tokio::test]
async fn test_no_actions_in_time_period_rule() {
    let with_action = |date: &str, id: &str| {
        parcel_with(json!({ "previousActions": [ { "date": date, "identifier": id } ] }))
    };

    expect_pass(
        &["noActionsInTimePeriod"],
        RunOptions::new(parcel_with(json!({})))
            .with_action("FG1", 2.0)
            .with_reference_date(date("2020-01-25")),
    )
    .await;
    expect_pass(
        &["noActionsInTimePeriod"],
        RunOptions::new(with_action("2017-04-28", "FG1"))
            .with_action("FG1", 2.0)
            .with_reference_date(date("2020-01-25")),
    )
    .await;
    expect_pass(
        &["noActionsInTimePeriod"],
        RunOptions::new(with_action("2017-04-28", "XYZ"))
            .with_action("FG1", 5.0)
            .with_reference_date(date("2020-01-25")),
    )
    .await;
    expect_fail(
        &["noActionsInTimePeriod"],
        RunOptions::new(with_action("2018-01-25", "FG1"))
            .with_action("FG1", 5.0)
            .with_reference_date(date("2021-01-25")),
        report(
            "noActionsInTimePeriod",
            "Parcel should not have had any recent previous actions of this type",
            Some("Parcel rejected because there was an action of type FG1 in the last 5 years"),
            json!({}),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_action_exactly_at_threshold_fails() {
    let parcel = parcel_with(json!({
        "previousActions": [ { "date": "2016-01-25", "identifier": "FG1" } ]
    }));

    expect_fail(
        &["noActionsInTimePeriod"],
        RunOptions::new(parcel)
            .with_action("FG1", 5.0)
            .with_reference_date(date("2021-01-25")),
        report(
            "noActionsInTimePeriod",
            "Parcel should not have had any recent previous actions of this type",
            Some("Parcel rejected because there was an action of type FG1 in the last 5 years"),
            json!({}),
        ),
    )
    .await;
}

#[tokio::test]
async fn test_reference_date_defaults_to_today() {
    let recent = Local::now()
        .date_naive()
        .checked_sub_months(Months::new(24))
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .unwrap();
    let parcel = parcel_with(json!({
        "previousActions": [ { "date": recent.format("%Y-%m-%d").to_string(), "identifier": "FG1" } ]
    }));

    expect_fail(
        &["noActionsInTimePeriod"],
        RunOptions::new(parcel).with_action("FG1", 2.0),
        report(
            "noActionsInTimePeriod",
            "Parcel should not have had any recent previous actions of this type",
            Some("Parcel rejected because there was an action of type FG1 in the last 2 years"),
            json!({}),
        ),
    )
    .await;
}

// ==================== 事实回传 ====================

#[tokio::test]
async fn test_requested_facts_are_returned() {
    let parcel = parcel_with(json!({
        "totalPerimeter": 75,
        "perimeterFeatures": [ { "type": "lake", "length": 15 } ]
    }));
    let output = run_engine(
        &rules(&["adjustedPerimeter"]),
        RunOptions::new(parcel)
            .with_action("FG1", 2.0)
            .with_quantity(50.0)
            .with_reference_date(date("2020-01-25")),
        &["adjustedPerimeterBounds"],
    )
    .await
    .unwrap();

    assert_eq!(
        Value::Object(output.facts.clone()),
        json!({ "adjustedPerimeterBounds": { "lower": 0, "upper": 60 } })
    );
    assert_eq!(output.successes().count(), 1);
}

#[tokio::test]
async fn test_pondless_area_and_tolerance_facts() {
    let parcel = parcel_with(json!({
        "totalArea": 7.4,
        "areaFeatures": [ { "type": "pond", "areaCovered": 3 } ]
    }));
    let output = run_engine(
        &rules(&["pondlessArea"]),
        RunOptions::new(parcel)
            .with_action("SW6", 2.0)
            .with_quantity(2.0)
            .with_reference_date(date("2020-01-25")),
        &["pondlessAreaBounds"],
    )
    .await
    .unwrap();
    assert_eq!(
        Value::Object(output.facts),
        json!({ "pondlessAreaBounds": { "lower": 0, "upper": 7.4 - 3.0 } })
    );

    let output = run_engine(
        &rules(&["tolerancePerimeter"]),
        RunOptions::new(parcel_with(json!({ "totalPerimeter": 75 })))
            .with_action_id("FG1")
            .with_tolerance(2.0)
            .with_quantity(50.0),
        &["toleranceUpperLimit"],
    )
    .await
    .unwrap();
    assert_eq!(Value::Object(output.facts), json!({ "toleranceUpperLimit": 77 }));
}

#[tokio::test]
async fn test_years_since_last_action_fact() {
    let parcel = parcel_with(json!({
        "totalPerimeter": 75,
        "previousActions": [ { "date": "2011-04-28", "identifier": "FG1" } ]
    }));
    let output = run_engine(
        &rules(&["noActionsInTimePeriod"]),
        RunOptions::new(parcel)
            .with_action("FG1", 5.0)
            .with_reference_date(date("2020-01-25")),
        &["yearsSinceLastAction"],
    )
    .await
    .unwrap();

    let years = output.facts["yearsSinceLastAction"].as_f64().unwrap();
    assert!((8.74..8.75).contains(&years), "years = {}", years);
    assert_eq!(output.successes().count(), 1);
}

#[tokio::test]
async fn test_facts_returned_even_if_no_rules_pass() {
    let parcel = parcel_with(json!({
        "totalPerimeter": 75,
        "perimeterFeatures": [ { "type": "lake", "length": 15 } ],
        "previousActions": [ { "date": "2020-01-24", "identifier": "FG1" } ]
    }));
    let output = run_engine(
        &rules(&["adjustedPerimeter"]),
        RunOptions::new(parcel)
            .with_action_id("FG1")
            .with_quantity(150.0)
            .with_reference_date(date("2020-01-25")),
        &["adjustedPerimeterBounds", "yearsSinceLastAction"],
    )
    .await
    .unwrap();

    assert_eq!(output.successes().count(), 0);
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.events[0].outcome, Outcome::Failure);
    assert_eq!(
        output.facts["adjustedPerimeterBounds"],
        json!({ "lower": 0, "upper": 60 })
    );
    let years = output.facts["yearsSinceLastAction"].as_f64().unwrap();
    assert!(years > 0.0 && years < 0.01, "years = {}", years);
}

#[tokio::test]
async fn test_unknown_output_fact_is_an_error() {
    let result = run_engine(
        &rules(&["notSSSI"]),
        RunOptions::new(parcel_with(json!({}))),
        &["noSuchFact"],
    )
    .await;

    assert!(matches!(result, Err(RuleError::FactNotFound(ref name)) if name == "noSuchFact"));
}

// ==================== 汇总 ====================

#[tokio::test]
async fn test_combination_failures_in_evaluation_order() {
    let parcel = parcel_with(json!({ "totalPerimeter": 75, "sssi": true }));
    let failures = run_rules(
        &rules(&["perimeter", "notSSSI", "tolerancePerimeter", "inWaterPollutionZone"]),
        RunOptions::new(parcel).with_quantity(100.0).with_tolerance(2.0),
    )
    .await
    .unwrap();

    let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["withinPerimeter", "notSSSI", "withinTolerancePerimeter", "inWaterPollutionZone"]
    );
}

#[tokio::test]
async fn test_all_and_some_pass() {
    let selected = rules(&["notSSSI", "inWaterPollutionZone"]);
    let both = parcel_with(json!({ "inWaterPollutionZone": true }));
    let one = parcel_with(json!({}));
    let none = parcel_with(json!({ "sssi": true }));

    assert!(all_rules_pass(&selected, RunOptions::new(both.clone())).await.unwrap());
    assert!(!some_rules_pass(&selected, RunOptions::new(both)).await.unwrap());

    assert!(!all_rules_pass(&selected, RunOptions::new(one.clone())).await.unwrap());
    assert!(some_rules_pass(&selected, RunOptions::new(one)).await.unwrap());

    assert!(!all_rules_pass(&selected, RunOptions::new(none.clone())).await.unwrap());
    assert!(!some_rules_pass(&selected, RunOptions::new(none)).await.unwrap());
}

// ==================== 校验与监听 ====================

#[tokio::test]
async fn test_invalid_parcel_is_rejected() {
    let err = run_rules(&rules(&["perimeter"]), RunOptions::new(json!({})).with_quantity(1.0))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    let mut fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
    fields.sort();
    assert_eq!(
        fields,
        vec![
            "areaFeatures",
            "hasReintroducedGrazing",
            "inWaterPollutionZone",
            "landCoverClass",
            "perimeterFeatures",
            "previousActions",
            "ref",
            "sssi",
            "totalArea",
            "totalPerimeter",
        ]
    );
    assert!(err.violations().iter().all(|v| v.kind == ViolationKind::Missing));
}

#[tokio::test]
async fn test_impossible_action_date_is_rejected_before_evaluation() {
    let parcel = parcel_with(json!({
        "previousActions": [ { "date": "2019-02-30", "identifier": "FG1" } ]
    }));
    let err = run_rules(
        &rules(&["noActionsInTimePeriod"]),
        RunOptions::new(parcel)
            .with_action("FG1", 2.0)
            .with_reference_date(date("2020-01-25")),
    )
    .await
    .unwrap_err();

    assert!(err.is_validation(), "unexpected error: {}", err);
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].field, "previousActions");
    assert_eq!(err.violations()[0].kind, ViolationKind::Invalid);
}

#[tokio::test]
async fn test_float_land_cover_class_evaluates() {
    let parcel = parcel_with(json!({
        "totalPerimeter": 75,
        "totalArea": 75,
        "landCoverClass": 110.0,
        "perimeterFeatures": [ { "type": "lake", "length": 15 } ]
    }));

    expect_pass(
        &["adjustedPerimeter", "pondlessArea", "tolerancePerimeter", "cultivatedParcel"],
        RunOptions::new(parcel).with_quantity(50.0).with_tolerance(2.0),
    )
    .await;
}

#[tokio::test]
async fn test_real_parcel_is_accepted() {
    let parcel = json!({
        "areaFeatures": [ { "type": "pond", "areaCovered": 0.3 } ],
        "hasReintroducedGrazing": false,
        "inWaterPollutionZone": false,
        "landCoverClass": 0,
        "perimeterFeatures": [
            { "type": "barn", "length": 23.3 },
            { "type": "hedgerow", "length": 162.6 }
        ],
        "previousActions": [],
        "ref": "SD74445738",
        "sssi": false,
        "totalArea": 0.656,
        "totalPerimeter": 325.2
    });

    expect_pass(&["notSSSI", "perimeter"], RunOptions::new(parcel).with_quantity(300.0)).await;
}

#[tokio::test]
async fn test_listeners_receive_outcomes() {
    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::with_default_facts(rules(&["notSSSI", "hasReintroducedGrazing"])).unwrap();
    let counter = successes.clone();
    engine.on_success(move |event, _almanac, _result| {
        assert_eq!(event.event_type, "notSSSI");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let counter = failures.clone();
    engine.on_failure(move |_event, almanac, result| {
        assert!(!result.passed());
        assert!(almanac.cached("parcel").is_some());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let run = engine.run(RunOptions::new(parcel_with(json!({})))).await.unwrap();

    assert_eq!(run.success_count(), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_options_from_json_request() {
    let options: RunOptions = serde_json::from_value(json!({
        "parcel": parcel_with(json!({ "totalPerimeter": 75 })),
        "quantity": 80,
        "tolerance": 5,
        "referenceDate": "2020-01-25"
    }))
    .unwrap();

    assert!(
        all_rules_pass(&rules(&["tolerancePerimeter"]), options)
            .await
            .unwrap()
    );
}
