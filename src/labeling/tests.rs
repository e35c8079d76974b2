use super::engine::ContentMatch;
use super::rules::{ContextParams, IntervalParams};
use super::*;
use crate::dataset::Layer;
use crate::network::j1939::{PGN_CCVS1, PGN_TSC1};
use pretty_assertions::assert_eq;

const CCVS1_ID: u32 = 0x18FEF100;
const TSC1_ID: u32 = 0x0C000003;
const EEC1_ID: u32 = 0x0CF00400;

fn record(timestamp: f64, id: u32, data: &[u8]) -> Record {
    Record::from(Frame {
        id,
        data: data.to_vec(),
        timestamp,
        interface: "can0".into(),
    })
}

fn content_rule(name: &str, severity: &str, moi: MessageFilter) -> Rule {
    Rule {
        name: name.into(),
        label: Some(format!("{}_label", name)),
        semantics: "usage".into(),
        metadata: rules::RuleMetadata {
            severity: severity.into(),
            layer: "application".into(),
            description: format!("{} description", name),
        },
        moi,
        kind: RuleKind::Content,
    }
}

fn indices(hits: &[Hit]) -> Vec<usize> {
    hits.iter().map(|h| h.index).collect()
}

#[test]
fn test_records_start_normal() {
    let r = record(0.0, CCVS1_ID, &[0x01, 0xAB]);
    assert_eq!(r.label, NORMAL_LABEL);
    assert_eq!(r.pgn, PGN_CCVS1);
    assert_eq!(r.destination, None);
    assert_eq!(r.data_hex(), "01AB");
    assert!(r.rule_names().next().is_none());
}

#[test]
fn test_annotate_accumulates_names_and_promotes_by_severity() {
    let mut r = record(0.0, TSC1_ID, &[]);
    let low = content_rule("low_rule", "Low", MessageFilter::default());
    let high = content_rule("high_rule", "HIGH", MessageFilter::default());
    let medium = content_rule("medium_rule", "medium", MessageFilter::default());

    annotate(&mut r, &low, None, DEFAULT_ANOMALY_LABEL);
    assert_eq!(r.label, "low_rule_label");
    assert_eq!(r.rule_severity, "low");

    annotate(&mut r, &high, None, DEFAULT_ANOMALY_LABEL);
    annotate(&mut r, &medium, None, DEFAULT_ANOMALY_LABEL);
    assert_eq!(r.rule_name, "low_rule|high_rule|medium_rule");
    assert_eq!(r.label, "high_rule_label");
    assert_eq!(r.rule_severity, "high");
    assert_eq!(r.rule_type, "rule");
    assert_eq!(r.semantics, "usage");
    assert_eq!(r.rule_description, "high_rule description");
    assert_eq!(r.rule_names().collect::<Vec<_>>().len(), 3);
}

#[test]
fn test_annotate_unknown_severity_and_default_label() {
    let mut r = record(0.0, TSC1_ID, &[]);
    let mut rule = content_rule("plain", "", MessageFilter::default());
    rule.label = None;

    annotate(&mut r, &rule, None, DEFAULT_ANOMALY_LABEL);
    assert_eq!(r.label, DEFAULT_ANOMALY_LABEL);

    // Equal rank: the later rule takes over
    let mut other = content_rule("other", "critical", MessageFilter::default());
    other.label = Some("other".into());
    annotate(&mut r, &other, None, DEFAULT_ANOMALY_LABEL);
    assert_eq!(r.label, "other");

    // Once ranked, an unranked rule no longer replaces it
    let ranked = content_rule("ranked", "low", MessageFilter::default());
    annotate(&mut r, &ranked, None, DEFAULT_ANOMALY_LABEL);
    annotate(&mut r, &rule, None, DEFAULT_ANOMALY_LABEL);
    assert_eq!(r.label, "ranked_label");
    assert_eq!(r.rule_name, "plain|other|ranked|plain");
}

#[test]
fn test_severity_ranks() {
    assert!(Severity::rank("high") > Severity::rank("medium"));
    assert!(Severity::rank("medium") > Severity::rank("low"));
    assert!(Severity::rank("low") > Severity::rank(""));
    assert_eq!(Severity::parse(" Medium "), Some(Severity::Medium));
}

#[test]
fn test_moi_filter_keys() {
    let records = vec![
        record(0.0, TSC1_ID, &[]),    // pgn 0, da 0x00, sa 0x03, prio 3
        record(0.1, CCVS1_ID, &[]),   // broadcast, sa 0x00, prio 6
        record(0.2, 0x18000103, &[]), // pgn 0, da 0x01, sa 0x03, prio 6
    ];

    assert_eq!(MessageFilter::default().select(&records), vec![0, 1, 2]);
    assert!(MessageFilter::default().is_empty());

    let by_pgn = MessageFilter {
        pgn: Some(PGN_TSC1),
        ..Default::default()
    };
    assert_eq!(by_pgn.select(&records), vec![0, 2]);

    let by_da = MessageFilter {
        da: Some(0x00),
        ..Default::default()
    };
    assert_eq!(by_da.select(&records), vec![0]);

    let by_priority = MessageFilter {
        sa: Some(0x03),
        priority_min: Some(4),
        priority_max: Some(7),
        ..Default::default()
    };
    assert_eq!(by_priority.select(&records), vec![2]);
}

#[test]
fn test_content_match() {
    let records = vec![record(0.0, TSC1_ID, &[]), record(0.1, CCVS1_ID, &[])];
    let moi = MessageFilter {
        pgn: Some(PGN_CCVS1),
        ..Default::default()
    };
    let hits = ContentMatch.evaluate(&moi, &records);
    assert_eq!(indices(&hits), vec![1]);
    assert_eq!(hits[0].context_value, None);
}

#[test]
fn test_interval_rule_detects_bursts_per_can_id() {
    let records = vec![
        record(0.000, TSC1_ID, &[]),
        record(0.004, TSC1_ID, &[]),
        record(0.002, EEC1_ID, &[]), // other identifier, not part of the burst
        record(0.008, TSC1_ID, &[]),
        record(1.000, TSC1_ID, &[]), // gap resets the window
        record(1.500, TSC1_ID, &[]),
        record(0.003, EEC1_ID, &[]),
    ];
    let params = IntervalParams {
        interval: 0.005,
        threshold: 3,
    };
    let hits = params.evaluate(&MessageFilter::default(), &records);
    assert_eq!(indices(&hits), vec![0, 1, 3]);
}

#[test]
fn test_interval_rule_sorts_by_timestamp() {
    let records = vec![
        record(0.002, TSC1_ID, &[]),
        record(0.000, TSC1_ID, &[]),
        record(0.001, TSC1_ID, &[]),
    ];
    let params = IntervalParams {
        interval: 0.001,
        threshold: 3,
    };
    let hits = params.evaluate(&MessageFilter::default(), &records);
    assert_eq!(indices(&hits), vec![0, 1, 2]);

    let strict = IntervalParams {
        interval: 0.001,
        threshold: 4,
    };
    assert!(strict.evaluate(&MessageFilter::default(), &records).is_empty());
}

#[test]
fn test_interval_rule_low_thresholds_need_two_messages() {
    let records = vec![
        record(0.000, TSC1_ID, &[]),
        record(0.500, TSC1_ID, &[]),
        record(0.5005, TSC1_ID, &[]),
    ];
    for threshold in [1, 2] {
        let params = IntervalParams {
            interval: 0.001,
            threshold,
        };
        let hits = params.evaluate(&MessageFilter::default(), &records);
        assert_eq!(indices(&hits), vec![1, 2]);
    }
}

#[test]
fn test_interval_rule_long_flood_is_linear() {
    // 10 kHz flood of TSC1, interleaved with a quiet EEC1 stream
    let n = 200_000;
    let mut records = Vec::with_capacity(n + n / 1000);
    for i in 0..n {
        records.push(record(i as f64 * 0.0001, TSC1_ID, &[]));
        if i % 1000 == 0 {
            records.push(record(i as f64 * 0.0001, EEC1_ID, &[]));
        }
    }
    let params = IntervalParams {
        interval: 0.001,
        threshold: 5,
    };

    let started = std::time::Instant::now();
    let hits = params.evaluate(&MessageFilter::default(), &records);
    let elapsed = started.elapsed();

    assert_eq!(hits.len(), n);
    assert!(hits.iter().all(|h| records[h.index].can_id == TSC1_ID));
    assert!(
        elapsed < std::time::Duration::from_secs(10),
        "flood of {} messages took {:?}",
        n,
        elapsed
    );
}

fn speed_context(comparator: Comparator, threshold: f64) -> ContextParams {
    ContextParams {
        pgn: PGN_CCVS1,
        sa: Some(0x00),
        offset: 1,
        length: 2,
        scale: 0.5,
        comparator,
        threshold,
    }
}

#[test]
fn test_context_decode_little_endian() {
    let ctx = speed_context(Comparator::Greater, 0.0);
    assert_eq!(ctx.decode(&[0xFF, 0x10, 0x01]), 136.0);
    assert_eq!(ctx.decode(&[0xFF, 0x10, 0x01, 0x77]), 136.0);
}

#[test]
fn test_context_decode_short_payload() {
    let ctx = speed_context(Comparator::Greater, 0.0);
    // Truncated field uses the bytes present, a missing one reads as 0
    assert_eq!(ctx.decode(&[0xFF, 0x10]), 8.0);
    assert_eq!(ctx.decode(&[0xFF]), 0.0);
    assert_eq!(ctx.decode(&[]), 0.0);
}

#[test]
fn test_context_rule_short_context_payload() {
    let records = vec![
        record(1.0, CCVS1_ID, &[0, 100]), // 50.0 from a single byte
        record(2.0, TSC1_ID, &[]),
    ];
    let moi = MessageFilter {
        pgn: Some(PGN_TSC1),
        ..Default::default()
    };
    let hits = speed_context(Comparator::Greater, 20.0).evaluate(&moi, &records);
    assert_eq!(indices(&hits), vec![1]);
    assert_eq!(hits[0].context_value, Some(50.0));
}

#[test]
fn test_context_rule_uses_latest_value_at_or_before() {
    let records = vec![
        record(0.5, TSC1_ID, &[]),              // no context yet
        record(1.0, CCVS1_ID, &[0, 100, 0]),    // 50.0
        record(1.0, TSC1_ID, &[]),              // same instant counts
        record(2.0, TSC1_ID, &[]),
        record(3.0, CCVS1_ID, &[0, 10, 0]),     // 5.0
        record(4.0, TSC1_ID, &[]),
        record(4.5, 0x18FEF101, &[0, 200, 0]),  // other source, ignored
        record(5.0, TSC1_ID, &[]),
    ];
    let moi = MessageFilter {
        pgn: Some(PGN_TSC1),
        ..Default::default()
    };

    let hits = speed_context(Comparator::Greater, 20.0).evaluate(&moi, &records);
    assert_eq!(indices(&hits), vec![2, 3]);
    assert_eq!(hits[0].context_value, Some(50.0));

    let hits = speed_context(Comparator::LessOrEqual, 5.0).evaluate(&moi, &records);
    assert_eq!(indices(&hits), vec![5, 7]);
}

#[test]
fn test_context_rule_equal_timestamps_later_wins() {
    let records = vec![
        record(1.0, CCVS1_ID, &[0, 100, 0]),
        record(1.0, CCVS1_ID, &[0, 2, 0]),
        record(2.0, TSC1_ID, &[]),
    ];
    let moi = MessageFilter {
        pgn: Some(PGN_TSC1),
        ..Default::default()
    };
    let hits = speed_context(Comparator::Equal, 1.0).evaluate(&moi, &records);
    assert_eq!(indices(&hits), vec![2]);
}

#[test]
fn test_context_rule_without_context_values() {
    let records = vec![record(1.0, TSC1_ID, &[])];
    let hits = speed_context(Comparator::Greater, 0.0).evaluate(&MessageFilter::default(), &records);
    assert!(hits.is_empty());
}

#[test]
fn test_comparators() {
    assert!(Comparator::Greater.compare(2.0, 1.0));
    assert!(!Comparator::Less.compare(2.0, 1.0));
    assert!(Comparator::Equal.compare(1.0, 1.0));
    assert!(Comparator::GreaterOrEqual.compare(1.0, 1.0));
    assert!(Comparator::LessOrEqual.compare(0.5, 1.0));
    assert_eq!(" >= ".parse::<Comparator>().unwrap(), Comparator::GreaterOrEqual);
    assert!("=>".parse::<Comparator>().is_err());
}

const RULES_YAML: &str = r#"
rules:
  - name: speed_request
    type: crule
    label: unsafe_request
    semantics: " state "
    moi: { pgn: 0 }
    context:
      pgn: 0xFEF1
      sa: 0
      offset: 1
      length: 2
      scale: 0.00390625
      comparator: ">"
      threshold: 30
    metadata:
      severity: High
      layer: application
      description: Torque request while driving
  - name: tsc1_flood
    type: irule
    moi: { pgn: 0, priority_max: 3 }
    metadata: { severity: medium, layer: network }
  - name: mystery
    type: srule
  - name: half_context
    type: crule
    context: { pgn: 65265 }
  - name: rogue_source
    type: rule
    moi: { sa: 0x99 }
"#;

#[test]
fn test_parse_rules_document() {
    let rules = parse_rules(RULES_YAML).unwrap();
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["speed_request", "tsc1_flood", "rogue_source"]);

    let speed = &rules[0];
    assert_eq!(speed.semantics, "state");
    assert_eq!(speed.severity(), "high");
    assert_eq!(speed.layer(), Some(Layer::Application));
    match &speed.kind {
        RuleKind::Context(ctx) => {
            assert_eq!(ctx.pgn, PGN_CCVS1);
            assert_eq!(ctx.sa, Some(0));
            assert_eq!(ctx.comparator, Comparator::Greater);
            assert_eq!(ctx.threshold, 30.0);
        }
        other => panic!("unexpected kind {:?}", other),
    }

    match &rules[1].kind {
        RuleKind::Interval(params) => {
            assert_eq!(params.interval, 0.001);
            assert_eq!(params.threshold, 5);
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert_eq!(rules[1].moi.priority_max, Some(3));
    assert_eq!(rules[1].label, None);

    assert_eq!(rules[2].moi.sa, Some(0x99));
    assert_eq!(rules[2].layer(), None);
}

#[test]
fn test_parse_rules_empty_documents() {
    assert!(parse_rules("").unwrap().is_empty());
    assert!(parse_rules("rules:\n").unwrap().is_empty());
}

#[test]
fn test_parse_rules_rejects_invalid_parameters() {
    let yaml = "rules:\n  - name: zero\n    type: irule\n    threshold: 0\n";
    match parse_rules(yaml) {
        Err(LabelError::InvalidRule { name, .. }) => assert_eq!(name, "zero"),
        other => panic!("unexpected {:?}", other),
    }

    let yaml = "rules:\n  - name: wide\n    type: crule\n    moi: {pgn: 0}\n    context: {pgn: 1, length: 9}\n";
    assert!(matches!(parse_rules(yaml), Err(LabelError::InvalidRule { .. })));

    let yaml = "rules:\n  - name: cmp\n    type: crule\n    moi: {pgn: 0}\n    context: {pgn: 1, comparator: '=>'}\n";
    assert!(matches!(parse_rules(yaml), Err(LabelError::Rules(_))));
}

#[test]
fn test_labeler_applies_rules_in_order() {
    let mut records = vec![
        record(0.0, CCVS1_ID, &[0, 0x00, 0x28]), // 40 km/h
        record(0.1, TSC1_ID, &[]),
        record(0.2, 0x0C000099, &[]),
    ];
    let rules = parse_rules(RULES_YAML).unwrap();
    let labeler = Labeler::new(LabelerConfig::default(), rules).unwrap();
    let annotations = labeler.apply(&mut records);

    assert_eq!(annotations, 3);
    assert!(records[0].is_normal());
    assert_eq!(records[1].label, "unsafe_request");
    assert_eq!(records[1].rule_type, "crule");
    assert_eq!(records[1].context_pgn, Some(PGN_CCVS1));
    assert_eq!(records[1].context_value, Some(40.0));
    assert_eq!(records[2].rule_name, "speed_request|rogue_source");
    // rogue_source is unranked and keeps the high-severity label
    assert_eq!(records[2].label, "unsafe_request");
}

#[test]
fn test_labeler_layer_selection() {
    let mut records = vec![record(0.1, TSC1_ID, &[]), record(0.2, 0x0C000099, &[])];
    let rules = parse_rules(RULES_YAML).unwrap();
    let config = LabelerConfig {
        layers: LayerSet::NETWORK,
        ..Default::default()
    };
    let labeler = Labeler::new(config, rules).unwrap();
    assert_eq!(labeler.apply(&mut records), 0);
    assert!(records.iter().all(Record::is_normal));
}

#[test]
fn test_labeler_config_validation() {
    let config = LabelerConfig {
        layers: LayerSet::empty(),
        ..Default::default()
    };
    assert!(Labeler::new(config, Vec::new()).is_err());

    let config = LabelerConfig {
        default_label: NORMAL_LABEL.into(),
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_summary_counts() {
    let mut records = vec![
        record(0.0, CCVS1_ID, &[]),
        record(0.1, TSC1_ID, &[]),
        record(0.2, TSC1_ID, &[]),
    ];
    let moi = MessageFilter {
        pgn: Some(PGN_TSC1),
        ..Default::default()
    };
    let rule = content_rule("tsc1", "low", moi);
    for r in records.iter_mut().skip(1) {
        annotate(r, &rule, None, DEFAULT_ANOMALY_LABEL);
    }

    let summary = Summary::from_records(&records, 4);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.skipped_lines, 4);
    assert_eq!(summary.flagged(), 2);
    assert_eq!(summary.labels.get("normal"), Some(&1));
    assert_eq!(summary.labels.get("tsc1_label"), Some(&2));
    assert_eq!(summary.rules.get("tsc1"), Some(&2));
    assert_eq!(summary.flagged_pgns.get(&PGN_TSC1), Some(&2));

    let report = summary.to_string();
    assert!(report.contains("3 messages, 2 flagged, 4 unparsable lines"));
    assert!(report.contains("TSC1"));
}
