use signet_types::{parse_seconds, Duration};

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parse_full_spec() {
    let d = Duration::parse("1w1d1h1m1s1ms").unwrap();
    assert_eq!(d.as_secs_f64(), 694_861.001);
}

#[test]
fn parse_year_constant() {
    let d = Duration::parse("1y").unwrap();
    assert_eq!(d.as_micros(), 31_557_600 * 1_000_000);
}

#[test]
fn parse_long_unit_forms() {
    assert_eq!(
        Duration::parse("2 years 3 weeks").unwrap(),
        Duration::parse("2y3w").unwrap()
    );
    assert_eq!(
        Duration::parse("5 minutes 30 seconds").unwrap(),
        Duration::parse("5m30s").unwrap()
    );
    assert_eq!(
        Duration::parse("90 mins").unwrap(),
        Duration::parse("1h30m").unwrap()
    );
}

#[test]
fn parse_fractional_seconds() {
    assert_eq!(Duration::parse("6.007s").unwrap().as_micros(), 6_007_000);
    assert_eq!(Duration::parse("6,007s").unwrap().as_micros(), 6_007_000);
    assert_eq!(Duration::parse("0.5sec").unwrap().as_micros(), 500_000);
}

#[test]
fn parse_sub_second_units() {
    assert_eq!(Duration::parse("250ms").unwrap().as_micros(), 250_000);
    assert_eq!(Duration::parse("500us").unwrap().as_micros(), 500);
    assert_eq!(Duration::parse("1s5ms").unwrap().as_micros(), 1_005_000);
}

#[test]
fn parse_rejects_garbage() {
    for bad in ["", "years", "1x", "1.5m", "one year", "1y 2q"] {
        assert!(Duration::parse(bad).is_err(), "accepted {bad:?}");
    }
}

// ── Formatting ───────────────────────────────────────────────────

#[test]
fn format_mixed_resolution_uses_fraction() {
    let d = Duration::parse("1w1d1h1m1s1ms").unwrap();
    assert_eq!(d.to_string(), "1w1d1h1m1.001s");
}

#[test]
fn format_whole_units() {
    assert_eq!(Duration::parse("1y").unwrap().to_string(), "1y");
    assert_eq!(Duration::from_secs(0).to_string(), "0s");
    assert_eq!(
        Duration::from_secs(5 * 86_400 + 6 * 3_600 + 37 * 60 + 27).to_string(),
        "5d6h37m27s"
    );
}

#[test]
fn format_auto_scales_sub_seconds() {
    assert_eq!(Duration::from_micros(250_000).to_string(), "250ms");
    assert_eq!(Duration::from_micros(500).to_string(), "500us");
    // micros not divisible by 1000, no whole seconds: plain micros
    assert_eq!(
        Duration::parse("1y500us").unwrap().to_string(),
        "1y500us"
    );
}

#[test]
fn format_trims_fraction_zeros() {
    assert_eq!(Duration::from_micros(1_500_000).to_string(), "1.5s");
}

// ── Round-trips ──────────────────────────────────────────────────

#[test]
fn roundtrip_preserves_microseconds() {
    for spec in [
        "1y2w3d4h5m6.007s",
        "1w1d1h1m1.001s",
        "1y",
        "0s",
        "42us",
        "3ms",
        "-2d12h",
    ] {
        let parsed = Duration::parse(spec).unwrap();
        let reparsed = Duration::parse(&parsed.to_string()).unwrap();
        assert_eq!(parsed, reparsed, "spec {spec:?}");
    }
}

#[test]
fn serde_uses_string_form() {
    let d = Duration::parse("1w1d1h1m1.001s").unwrap();
    assert_eq!(
        serde_json::to_string(&d).unwrap(),
        "\"1w1d1h1m1.001s\""
    );
    let back: Duration = serde_json::from_str("\"1w1d1h1m1.001s\"").unwrap();
    assert_eq!(back, d);
}

// ── parse_seconds ────────────────────────────────────────────────

#[test]
fn parse_seconds_notations() {
    assert_eq!(parse_seconds("1.23").unwrap(), 1.23);
    assert_eq!(parse_seconds("01:30").unwrap(), 5_400.0);
    assert_eq!(parse_seconds("1:30:15").unwrap(), 5_415.0);
    assert_eq!(parse_seconds("1:30:15.5").unwrap(), 5_415.5);
    assert_eq!(parse_seconds("1m30s").unwrap(), 90.0);
}

#[test]
fn parse_seconds_rejects_garbage() {
    assert!(parse_seconds("ten past two").is_err());
}

// ── Arithmetic ───────────────────────────────────────────────────

#[test]
fn arithmetic() {
    let a = Duration::parse("1h").unwrap();
    let b = Duration::parse("30m").unwrap();
    assert_eq!(a + b, Duration::parse("1h30m").unwrap());
    assert_eq!(a - b, b);
    assert_eq!(-a, Duration::from_secs(-3_600));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn render_parse_is_identity(micros in -(10i64.pow(15))..10i64.pow(15)) {
            let d = Duration::from_micros(micros);
            let reparsed = Duration::parse(&d.to_string()).unwrap();
            prop_assert_eq!(d, reparsed);
        }
    }
}
