//! Bottle classification from the color sensor's clear and red/blue channels.
//!
//! A bottle pass is framed by the clear channel: it opens when `clear` rises
//! above the ambient threshold and closes once `commit_debounce` consecutive
//! readings are back at or below it. Inside a pass two band reads are taken:
//!
//! - top read: the first sample above the high-band threshold, judged against
//!   `top_ratio_high`;
//! - bottom read: when `clear` first falls to or below the high-band threshold,
//!   the sample *before* the drop (the last high sample) is judged against
//!   `bottom_ratio_high`. This holds for a drop straight to ambient as well.
//!
//! A band read is `CapAbsentVariant` when red/blue exceeds the band's high
//! ratio with red above the noise floor, `CapPresent` when red/blue is below
//! `ratio_low`, and `Indeterminate` otherwise. The committed category follows
//! `CapAbsentVariant (either band) > CapPresent (either band) > NoCap > Other`,
//! where `NoCap` means the pass was brighter than `no_cap_clear` at some point.
use std::fmt;

use sorter_traits::ColorSample;
use tracing::{debug, trace};

use crate::config::ClassifierCfg;

/// Committed bottle category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CapAbsentVariant,
    CapPresent,
    NoCap,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::CapAbsentVariant,
        Category::CapPresent,
        Category::NoCap,
        Category::Other,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::CapAbsentVariant => "cap_absent_variant",
            Category::CapPresent => "cap_present",
            Category::NoCap => "no_cap",
            Category::Other => "other",
        })
    }
}

/// Result of judging one band sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandRead {
    CapAbsentVariant,
    CapPresent,
    Indeterminate,
}

/// State of the pass currently in front of the sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassContext {
    pub bottle_present: bool,
    pub at_high_band: bool,
    pub top_classified: bool,
    pub no_cap_suspected: bool,
    pub top: Option<BandRead>,
    pub bottom: Option<BandRead>,
    /// Consecutive low readings seen while closing.
    pub low_count: u8,
}

impl PassContext {
    fn either(&self, r: BandRead) -> bool {
        self.top == Some(r) || self.bottom == Some(r)
    }

    /// Category the pass would commit as right now.
    pub fn decide(&self) -> Category {
        if self.either(BandRead::CapAbsentVariant) {
            Category::CapAbsentVariant
        } else if self.either(BandRead::CapPresent) {
            Category::CapPresent
        } else if self.no_cap_suspected {
            Category::NoCap
        } else {
            Category::Other
        }
    }
}

pub struct Classifier {
    cfg: ClassifierCfg,
    current: ColorSample,
    previous: ColorSample,
    ctx: PassContext,
}

impl Classifier {
    pub fn new(cfg: ClassifierCfg) -> Self {
        Self {
            cfg,
            current: ColorSample::default(),
            previous: ColorSample::default(),
            ctx: PassContext::default(),
        }
    }

    pub fn cfg(&self) -> &ClassifierCfg {
        &self.cfg
    }

    pub fn context(&self) -> &PassContext {
        &self.ctx
    }

    pub fn in_pass(&self) -> bool {
        self.ctx.bottle_present
    }

    pub fn current(&self) -> ColorSample {
        self.current
    }

    pub fn previous(&self) -> ColorSample {
        self.previous
    }

    /// Drop any open pass without committing it.
    pub fn reset(&mut self) {
        if self.ctx.bottle_present {
            debug!("open pass discarded");
        }
        self.ctx = PassContext::default();
    }

    /// Judge one sample against a band's high ratio.
    pub fn classify_band(&self, s: ColorSample, high_ratio: f32) -> BandRead {
        let ratio = s.red_blue_ratio();
        if ratio > high_ratio && s.red > self.cfg.red_noise_floor {
            BandRead::CapAbsentVariant
        } else if ratio < self.cfg.ratio_low {
            BandRead::CapPresent
        } else {
            BandRead::Indeterminate
        }
    }

    /// Consume the next sample. Returns the category when a pass commits.
    pub fn feed(&mut self, sample: ColorSample) -> Option<Category> {
        self.previous = self.current;
        self.current = sample;
        let clear = sample.clear;

        if self.ctx.at_high_band && clear <= self.cfg.high_band_clear {
            self.exit_high_band();
        }
        if clear <= self.cfg.ambient_clear {
            return self.on_low();
        }

        let mut committed = None;
        if !self.ctx.bottle_present {
            self.open();
        } else if self.ctx.low_count > 0 {
            if self.cfg.allow_reentry {
                // legacy: the dip is taken as the end of one bottle and the start of another
                committed = Some(self.commit());
                self.open();
            } else {
                trace!(low_count = self.ctx.low_count, "dip during close ignored");
                self.ctx.low_count = 0;
            }
        }

        if clear > self.cfg.high_band_clear {
            if !self.ctx.top_classified {
                let r = self.classify_band(self.current, self.cfg.top_ratio_high);
                trace!(?r, ratio = self.current.red_blue_ratio(), "top band read");
                self.ctx.top = Some(r);
                self.ctx.top_classified = true;
            }
            self.ctx.at_high_band = true;
        }

        if clear > self.cfg.no_cap_clear && !self.ctx.no_cap_suspected {
            trace!(clear, "pass flagged no-cap");
            self.ctx.no_cap_suspected = true;
        }
        committed
    }

    fn open(&mut self) {
        self.ctx = PassContext {
            bottle_present: true,
            ..PassContext::default()
        };
        trace!(clear = self.current.clear, "pass opened");
    }

    /// Bottom read on the last high sample. `previous` still holds it here.
    fn exit_high_band(&mut self) {
        let r = self.classify_band(self.previous, self.cfg.bottom_ratio_high);
        trace!(?r, ratio = self.previous.red_blue_ratio(), "bottom band read");
        self.ctx.bottom = Some(r);
        self.ctx.at_high_band = false;
    }

    fn on_low(&mut self) -> Option<Category> {
        if !self.ctx.bottle_present {
            return None;
        }
        self.ctx.low_count = self.ctx.low_count.saturating_add(1);
        if self.ctx.low_count < self.cfg.commit_debounce {
            return None;
        }
        Some(self.commit())
    }

    fn commit(&mut self) -> Category {
        let category = self.ctx.decide();
        debug!(
            %category,
            top = ?self.ctx.top,
            bottom = ?self.ctx.bottom,
            no_cap = self.ctx.no_cap_suspected,
            "pass committed"
        );
        self.ctx = PassContext::default();
        category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const AMB: ColorSample = ColorSample::new(10, 3, 3, 3);
    const MID: ColorSample = ColorSample::new(26, 8, 8, 8);

    fn run(c: &mut Classifier, samples: &[ColorSample]) -> Vec<Category> {
        samples.iter().filter_map(|&s| c.feed(s)).collect()
    }

    fn pass_with_top(top: ColorSample) -> Vec<ColorSample> {
        vec![AMB, MID, top, top, MID, AMB, AMB, AMB]
    }

    #[rstest]
    #[case(ColorSample::new(60, 40, 20, 10), Category::CapAbsentVariant)]
    #[case(ColorSample::new(60, 8, 12, 16), Category::CapPresent)]
    #[case(ColorSample::new(400, 100, 100, 100), Category::NoCap)]
    #[case(ColorSample::new(60, 20, 20, 20), Category::Other)]
    fn single_pass_commits_once(#[case] top: ColorSample, #[case] expected: Category) {
        let mut c = Classifier::new(ClassifierCfg::default());
        assert_eq!(run(&mut c, &pass_with_top(top)), vec![expected]);
        assert!(!c.in_pass());
    }

    #[test]
    fn high_ratio_below_noise_floor_is_not_cap_absent() {
        let mut c = Classifier::new(ClassifierCfg::default());
        // ratio 4.0 but red at the floor
        let top = ColorSample::new(60, 4, 4, 1);
        assert_eq!(run(&mut c, &pass_with_top(top)), vec![Category::Other]);
    }

    #[test]
    fn bottom_read_uses_sample_before_the_drop() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 20, 20, 20);
        // last high sample has ratio 4.0 > 3.2
        let last_high = ColorSample::new(60, 40, 10, 10);
        let out = run(&mut c, &[AMB, top, last_high, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::CapAbsentVariant]);
    }

    #[test]
    fn drop_straight_to_ambient_still_reads_bottom_band() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 20, 20, 20);
        let last_high = ColorSample::new(60, 40, 10, 10);
        let out = run(&mut c, &[AMB, top, last_high, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::CapAbsentVariant]);
    }

    #[test]
    fn ambient_dip_is_never_taken_as_the_bottom_sample() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 20, 20, 20);
        // red/blue 0.33 would read CapPresent if judged
        let dip = ColorSample::new(10, 1, 3, 3);
        let out = run(&mut c, &[AMB, top, dip, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::Other]);
    }

    #[test]
    fn bottom_threshold_is_stricter_than_top() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let neutral = ColorSample::new(60, 20, 20, 20);
        // ratio 3.0: above top_ratio_high but below bottom_ratio_high
        let last_high = ColorSample::new(60, 30, 10, 10);
        let out = run(&mut c, &[AMB, neutral, last_high, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::Other]);
        assert_eq!(c.context(), &PassContext::default());
    }

    #[test]
    fn cap_absent_outranks_cap_present_across_bands() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 8, 12, 16); // CapPresent
        let last_high = ColorSample::new(60, 40, 10, 10); // CapAbsentVariant at bottom
        let out = run(&mut c, &[AMB, top, last_high, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::CapAbsentVariant]);
    }

    #[test]
    fn single_dip_does_not_commit() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 20, 20, 20);
        let out = run(&mut c, &[AMB, top, AMB, top, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::Other]);
    }

    #[test]
    fn legacy_reentry_double_counts_a_dip() {
        let cfg = ClassifierCfg {
            allow_reentry: true,
            ..ClassifierCfg::default()
        };
        let mut c = Classifier::new(cfg);
        let top = ColorSample::new(60, 20, 20, 20);
        let out = run(&mut c, &[AMB, top, AMB, top, MID, AMB, AMB, AMB]);
        assert_eq!(out, vec![Category::Other, Category::Other]);
    }

    #[test]
    fn ambient_only_never_opens_a_pass() {
        let mut c = Classifier::new(ClassifierCfg::default());
        assert!(run(&mut c, &[AMB; 50]).is_empty());
        assert!(!c.in_pass());
    }

    #[test]
    fn reset_discards_open_pass() {
        let mut c = Classifier::new(ClassifierCfg::default());
        let top = ColorSample::new(60, 40, 20, 10);
        run(&mut c, &[AMB, MID, top]);
        assert!(c.in_pass());
        c.reset();
        assert!(run(&mut c, &[AMB, AMB, AMB]).is_empty());
    }
}
