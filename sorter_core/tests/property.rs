use proptest::prelude::*;
use sorter_core::{Category, ClassifierCfg, ServoCfg, ServoPwm, ServoTiming, replay};
use sorter_traits::ColorSample;

const AMB: ColorSample = ColorSample::new(10, 3, 3, 3);

fn ambient_sample() -> impl Strategy<Value = ColorSample> {
    (0u16..=22, any::<u16>(), any::<u16>(), any::<u16>())
        .prop_map(|(c, r, g, b)| ColorSample::new(c, r, g, b))
}

fn bright_sample() -> impl Strategy<Value = ColorSample> {
    (23u16..=2000, 0u16..500, 0u16..500, 0u16..500)
        .prop_map(|(c, r, g, b)| ColorSample::new(c, r, g, b))
}

proptest! {
    #[test]
    fn ambient_only_traces_commit_nothing(trace in prop::collection::vec(ambient_sample(), 0..300)) {
        let r = replay(&ClassifierCfg::default(), trace);
        prop_assert!(r.commits.is_empty());
        prop_assert_eq!(r.counters.total(), 0);
    }

    #[test]
    fn one_bright_run_is_exactly_one_bottle(
        lead in 0usize..20,
        body in prop::collection::vec(bright_sample(), 1..60),
    ) {
        let mut trace = vec![AMB; lead];
        trace.extend(body);
        trace.extend([AMB; 3]);
        let r = replay(&ClassifierCfg::default(), trace);
        prop_assert_eq!(r.commits.len(), 1);
        prop_assert_eq!(r.counters.total(), 1);
        prop_assert!(!r.open_at_end);
    }

    #[test]
    fn separate_bottles_are_counted_separately(n in 1usize..10, top_red in 0u16..100) {
        let top = ColorSample::new(60, top_red, 20, 20);
        let mut trace = Vec::new();
        for _ in 0..n {
            trace.extend([AMB, AMB, top, top, AMB, AMB, AMB]);
        }
        let r = replay(&ClassifierCfg::default(), trace);
        prop_assert_eq!(usize::from(r.counters.total()), n);
        let per_cat: u16 = Category::ALL
            .into_iter()
            .map(|c| r.counters.get(sorter_core::Bin::Category(c)))
            .sum();
        prop_assert_eq!(per_cat, r.counters.total());
    }

    #[test]
    fn every_high_pulse_matches_the_selector(
        pass_us in 500u32..1500,
        extra_us in 1u32..1000,
        tick_ns in prop::sample::select(vec![500u32, 1_000, 2_000]),
        selectors in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let cfg = ServoCfg {
            period_us: 20_000,
            pass_us,
            divert_us: pass_us + extra_us,
            tick_ns,
        };
        let timing = ServoTiming::from_cfg(&cfg);
        let mut pwm = ServoPwm::new(timing);
        for divert in selectors {
            pwm.set_divert(divert);
            let high = pwm.on_overflow();
            prop_assert!(pwm.level());
            prop_assert_eq!(high, timing.high_counts(divert));
            // flipping mid-pulse must not change this cycle's low width
            pwm.set_divert(!divert);
            let low = pwm.on_overflow();
            prop_assert!(!pwm.level());
            prop_assert_eq!(high + low, timing.period);
        }
    }
}
