use rstest::rstest;
use sorter_config::{GateAction, load_toml};

#[test]
fn empty_file_is_a_valid_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.classifier.ambient_clear, 22);
    assert_eq!(cfg.classifier.high_band_clear, 30);
    assert_eq!(cfg.classifier.no_cap_clear, 300);
    assert_eq!(cfg.timing.tick_ms, 10);
    assert!(!cfg.timing.allow_reentry);
}

#[test]
fn full_config_parses() {
    let toml = r#"
[pins]
scl = 3
sda = 2
gate0 = 17
gate1 = 27
motor_en = 22
key_data = [5, 6, 13, 19]
key_da = 26

[bus]
half_period_us = 10
stretch_timeout_ms = 5

[classifier]
ambient_clear = 25
high_band_clear = 40
no_cap_clear = 320
top_ratio_high = 2.2
bottom_ratio_high = 3.0
ratio_low = 0.7
red_noise_floor = 8

[servo]
period_us = 20000
pass_us = 900
divert_us = 2100
tick_ns = 400

[timing]
tick_ms = 5
commit_debounce = 4
key_debounce_ms = 150
operation_timeout_s = 60
allow_reentry = true

[storage]
path = "counters.bin"
size = 64

[logging]
file = "sorter.log"
level = "debug"
rotation = "daily"

[routing]
cap_absent_variant = "gate0-divert"
cap_present = "gate1-divert"
no_cap = "gate0-pass"
other = "gate1-pass"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.routing.cap_absent_variant, GateAction::Gate0Divert);
    assert_eq!(cfg.routing.other, GateAction::Gate1Pass);
    assert_eq!(cfg.servo.tick_ns, 400);
    assert_eq!(cfg.storage.path.as_deref(), Some("counters.bin"));
    assert!(cfg.timing.allow_reentry);
}

#[rstest]
#[case("[classifier]\nambient_clear = 0", "ambient_clear must be > 0")]
#[case(
    "[classifier]\nambient_clear = 30\nhigh_band_clear = 30",
    "high_band_clear must be > classifier.ambient_clear"
)]
#[case("[classifier]\nno_cap_clear = 10", "no_cap_clear must be >")]
#[case("[classifier]\nratio_low = 2.5", "ratio_low must be below")]
#[case("[classifier]\ntop_ratio_high = -1.0", "top_ratio_high must be a finite value")]
#[case("[servo]\ntick_ns = 0", "servo.tick_ns must be >= 1")]
#[case("[servo]\nperiod_us = 1500", "period_us must exceed")]
#[case("[timing]\ntick_ms = 0", "timing.tick_ms must be >= 1")]
#[case("[timing]\ncommit_debounce = 0", "commit_debounce must be >= 1")]
#[case("[timing]\noperation_timeout_s = 0", "operation_timeout_s must be >= 1")]
#[case("[bus]\nstretch_timeout_ms = 0", "stretch_timeout_ms must be >= 1")]
#[case("[storage]\nsize = 8", "storage.size must be >= 26")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] msg: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(msg),
        "expected '{msg}' in '{err}'"
    );
}

#[test]
fn unknown_gate_action_is_a_parse_error() {
    let err = load_toml("[routing]\nother = \"gate2-pass\"").expect_err("should not parse");
    assert!(format!("{err}").contains("gate2-pass"));
}
