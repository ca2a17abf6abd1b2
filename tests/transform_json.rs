use serde_json::{json, Value};

use segment_dsl::{
    canonicalize, reverse_json, transform, SegmentError, TransformConfig, TransformError,
};

fn transform_to_value(definition: &str, name: &str) -> Value {
    let config = TransformConfig {
        segment_name: name.to_string(),
        ..Default::default()
    };
    let segment = transform(definition, config).unwrap();
    serde_json::to_value(&segment).unwrap()
}

#[test]
fn test_simple_dimension_segment() {
    let actual = transform_to_value("sessions::condition::ga:medium==referral", "segment_name");
    let expected = json!({
        "name": "segment_name",
        "sessionSegment": {
            "segmentFilters": [{
                "simpleSegment": {
                    "orFiltersForSegment": [{
                        "segmentFilterClauses": [{
                            "dimensionFilter": {
                                "dimensionName": "ga:medium",
                                "operator": "EXACT",
                                "expressions": ["referral"]
                            }
                        }]
                    }]
                }
            }]
        }
    });
    assert_eq!(actual, expected);
}

#[test]
fn test_metric_condition_and_sequence() {
    let actual = transform_to_value(
        "users::condition::ga:sessions>10;sequence::ga:deviceCategory==desktop;->>ga:deviceCategory==mobile",
        "segment_name",
    );
    let expected = json!({
        "name": "segment_name",
        "userSegment": {
            "segmentFilters": [
                {
                    "simpleSegment": {
                        "orFiltersForSegment": [{
                            "segmentFilterClauses": [{
                                "metricFilter": {
                                    "metricName": "ga:sessions",
                                    "operator": "GREATER_THAN",
                                    "comparisonValue": "10"
                                }
                            }]
                        }]
                    }
                },
                {
                    "sequenceSegment": {
                        "segmentSequenceSteps": [
                            {
                                "orFiltersForSegment": [{
                                    "segmentFilterClauses": [{
                                        "dimensionFilter": {
                                            "dimensionName": "ga:deviceCategory",
                                            "operator": "EXACT",
                                            "expressions": ["desktop"]
                                        }
                                    }]
                                }]
                            },
                            {
                                "matchType": "PRECEDES",
                                "orFiltersForSegment": [{
                                    "segmentFilterClauses": [{
                                        "dimensionFilter": {
                                            "dimensionName": "ga:deviceCategory",
                                            "operator": "EXACT",
                                            "expressions": ["mobile"]
                                        }
                                    }]
                                }]
                            }
                        ]
                    }
                }
            ]
        }
    });
    assert_eq!(actual, expected);
}

#[test]
fn test_negations_ranges_and_scopes() {
    let actual = transform_to_value(
        "sessions::condition::!perUser::ga:hits<=3,ga:sessionCount<>2_3;ga:medium[]cpc|ppc",
        "-",
    );
    let expected = json!({
        "name": "-",
        "sessionSegment": {
            "segmentFilters": [{
                "not": true,
                "simpleSegment": {
                    "orFiltersForSegment": [
                        {
                            "segmentFilterClauses": [
                                {
                                    "not": true,
                                    "metricFilter": {
                                        "metricName": "ga:hits",
                                        "operator": "GREATER_THAN",
                                        "scope": "USER",
                                        "comparisonValue": "3"
                                    }
                                },
                                {
                                    "dimensionFilter": {
                                        "dimensionName": "ga:sessionCount",
                                        "operator": "NUMERIC_BETWEEN",
                                        "minComparisonValue": "2",
                                        "maxComparisonValue": "3"
                                    }
                                }
                            ]
                        },
                        {
                            "segmentFilterClauses": [{
                                "dimensionFilter": {
                                    "dimensionName": "ga:medium",
                                    "operator": "IN_LIST",
                                    "expressions": ["cpc", "ppc"]
                                }
                            }]
                        }
                    ]
                }
            }]
        }
    });
    assert_eq!(actual, expected);
}

#[test]
fn test_reverse_from_json_document() {
    let document = r#"{
        "name": "from_api",
        "sessionSegment": {
            "segmentFilters": [{
                "sequenceSegment": {
                    "firstStepShouldMatchFirstHit": true,
                    "segmentSequenceSteps": [
                        { "orFiltersForSegment": [{ "segmentFilterClauses": [
                            { "dimensionFilter": { "dimensionName": "ga:pagePath", "operator": "BEGINS_WITH", "expressions": ["/blog"] } }
                        ] }] },
                        { "matchType": "IMMEDIATELY_PRECEDES", "orFiltersForSegment": [{ "segmentFilterClauses": [
                            { "metricFilter": { "metricName": "ga:hits", "operator": "BETWEEN", "comparisonValue": "1", "maxComparisonValue": "5" } }
                        ] }] }
                    ]
                }
            }]
        },
        "userSegment": {
            "segmentFilters": [{
                "not": true,
                "simpleSegment": { "orFiltersForSegment": [{ "segmentFilterClauses": [
                    { "not": true, "dimensionFilter": { "dimensionName": "ga:medium", "operator": "PARTIAL", "expressions": ["a;b,c"] } }
                ] }] }
            }]
        }
    }"#;
    assert_eq!(
        reverse_json(document).unwrap(),
        r"users::condition::!ga:medium!@a\;b\,c;sessions::sequence::^ga:pagePath=~^/blog;->ga:hits<>1_5"
    );
}

#[test]
fn test_failures_surface_as_errors() {
    let config = TransformConfig::default();
    assert!(matches!(
        transform("sessions::condition::ga:hits<>10", config.clone()),
        Err(SegmentError::Transform(TransformError::MalformedBetween { .. }))
    ));
    assert!(matches!(
        transform("sessions::condition::ga:hits!<>10_20", config.clone()),
        Err(SegmentError::Transform(TransformError::UnsupportedNegation { .. }))
    ));
    assert!(matches!(
        transform("sessions::condition::ga:pagePath", config),
        Err(SegmentError::Parse(_))
    ));
}

#[test]
fn test_reverse_rejects_value_ending_in_backslash() {
    let document = r#"{
        "sessionSegment": { "segmentFilters": [{ "simpleSegment": { "orFiltersForSegment": [{ "segmentFilterClauses": [
            { "dimensionFilter": { "dimensionName": "ga:source", "operator": "REGEXP", "expressions": ["b\\"] } }
        ] }] } }] },
        "userSegment": { "segmentFilters": [{ "simpleSegment": { "orFiltersForSegment": [{ "segmentFilterClauses": [
            { "dimensionFilter": { "dimensionName": "ga:medium", "operator": "EXACT", "expressions": ["a"] } }
        ] }] } }] }
    }"#;
    assert!(matches!(
        reverse_json(document),
        Err(SegmentError::Transform(TransformError::DanglingEscape(_)))
    ));
}

#[test]
fn test_canonicalize_rejects_trailing_backslash() {
    assert!(matches!(
        canonicalize(r"sessions::condition::ga:medium==a;users::condition::ga:source==b\"),
        Err(SegmentError::Parse(_))
    ));
}
