/// Hysteretic auto-ranging of sensor gain and integration time
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::GainStep;
use crate::models::IntegrationMode::{Fast, Medium, Slow};

/// Name of the pseudo-profile that disables auto-ranging
pub const MANUAL_PROFILE: &str = "manual";

const ALL_STEPS: [GainStep; 6] = [
    GainStep::new(false, Fast),
    GainStep::new(false, Medium),
    GainStep::new(true, Fast),
    GainStep::new(false, Slow),
    GainStep::new(true, Medium),
    GainStep::new(true, Slow),
];

const FAST_STEPS: [GainStep; 4] = [
    GainStep::new(false, Fast),
    GainStep::new(true, Fast),
    GainStep::new(true, Medium),
    GainStep::new(true, Slow),
];

const LOGAIN_STEPS: [GainStep; 4] = [
    GainStep::new(false, Fast),
    GainStep::new(false, Medium),
    GainStep::new(false, Slow),
    GainStep::new(true, Slow),
];

/// The fixed catalogue of auto-ranging profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    All,
    Fast,
    LoGain,
}

impl ProfileKind {
    pub const CATALOGUE: [ProfileKind; 3] =
        [ProfileKind::All, ProfileKind::Fast, ProfileKind::LoGain];

    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::All => "all",
            ProfileKind::Fast => "fast",
            ProfileKind::LoGain => "logain",
        }
    }

    /// Steps ordered from least to most sensitive
    pub fn steps(self) -> &'static [GainStep] {
        match self {
            ProfileKind::All => &ALL_STEPS,
            ProfileKind::Fast => &FAST_STEPS,
            ProfileKind::LoGain => &LOGAIN_STEPS,
        }
    }
}

/// A profile resolved against the controller thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub kind: ProfileKind,
    pub low_threshold: u16,
    pub high_threshold: u16,
    pub steps: &'static [GainStep],
}

impl Profile {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Result of looking up a profile by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelection {
    /// Auto-ranging disabled, settings come from explicit commands
    Manual,
    Auto(ProfileKind),
    /// Name outside the catalogue, treated as disabled
    Unknown(String),
}

impl ProfileSelection {
    pub fn lookup(name: &str) -> Self {
        if name == MANUAL_PROFILE {
            return ProfileSelection::Manual;
        }
        ProfileKind::CATALOGUE
            .iter()
            .find(|kind| kind.name() == name)
            .map(|&kind| ProfileSelection::Auto(kind))
            .unwrap_or_else(|| ProfileSelection::Unknown(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            ProfileSelection::Manual => MANUAL_PROFILE,
            ProfileSelection::Auto(kind) => kind.name(),
            ProfileSelection::Unknown(name) => name,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, ProfileSelection::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Climb when both channels are below this count
    pub low_threshold: u16,
    /// Descend when either channel is above this count
    pub high_threshold: u16,
    /// Minimum wall time between two adjustments
    pub adjust_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            low_threshold: 100,
            high_threshold: 5000,
            adjust_interval: Duration::from_secs(1),
        }
    }
}

impl ControllerConfig {
    pub fn profile(&self, kind: ProfileKind) -> Profile {
        Profile {
            kind,
            low_threshold: self.low_threshold,
            high_threshold: self.high_threshold,
            steps: kind.steps(),
        }
    }
}

/// Auto-range state machine over (active profile, step index)
///
/// A profile is an ordered ladder of gain/integration steps from least to
/// most sensitive. The controller climbs the ladder while both channels sit
/// below the profile's low threshold and descends while either exceeds the
/// high threshold, at most one rung per adjustment interval.
#[derive(Debug, Clone)]
pub struct AutoRanger {
    config: ControllerConfig,
    active: ProfileSelection,
    step_index: usize,
    last_adjust: Option<Instant>,
    just_switched: bool,
}

impl AutoRanger {
    /// Start disabled, in the manual pseudo-profile
    pub fn new(config: ControllerConfig) -> Self {
        AutoRanger {
            config,
            active: ProfileSelection::Manual,
            step_index: 0,
            last_adjust: None,
            just_switched: true,
        }
    }

    pub fn active(&self) -> &ProfileSelection {
        &self.active
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// True while the active profile name is outside the catalogue
    pub fn is_faulted(&self) -> bool {
        matches!(self.active, ProfileSelection::Unknown(_))
    }

    /// Run one control cycle
    ///
    /// Returns the step to apply when the step changed or the profile was
    /// just switched. The caller supplies the integration time for custom
    /// mode from its manual settings.
    pub fn evaluate(
        &mut self,
        target: &ProfileSelection,
        ch0: u16,
        ch1: u16,
        now: Instant,
    ) -> Option<GainStep> {
        if *target != self.active {
            self.switch_to(target.clone(), now);
        }

        let profile = match self.active {
            ProfileSelection::Auto(kind) => self.config.profile(kind),
            ProfileSelection::Manual | ProfileSelection::Unknown(_) => return None,
        };

        let last = profile.steps.len() - 1;
        while self.step_index > last {
            self.step_index -= 1;
        }

        let mut changed = false;
        let interval = self.config.adjust_interval;
        let due = self
            .last_adjust
            .map_or(true, |at| now.saturating_duration_since(at) >= interval);
        if due {
            let low = ch0 < profile.low_threshold && ch1 < profile.low_threshold;
            // Increase is checked first, so it wins when both thresholds are violated
            if low && self.step_index < last {
                self.step_index += 1;
                changed = true;
            } else if (ch0 > profile.high_threshold || ch1 > profile.high_threshold)
                && self.step_index > 0
            {
                self.step_index -= 1;
                changed = true;
            }
            self.last_adjust = Some(now);
        }

        if !changed && !self.just_switched {
            return None;
        }
        self.just_switched = false;

        let step = profile.steps[self.step_index];
        debug!(
            "Profile {} step {}/{}: gain={} mode={} (ch0={}, ch1={})",
            profile.name(),
            self.step_index,
            last,
            if step.high_gain { "high" } else { "low" },
            step.mode.label(),
            ch0,
            ch1
        );
        Some(step)
    }

    /// The first step of the new profile holds for a full interval
    fn switch_to(&mut self, target: ProfileSelection, now: Instant) {
        match &target {
            ProfileSelection::Unknown(name) => {
                warn!("Unknown profile '{}', auto-ranging disabled", name)
            }
            other => info!("Switching to profile {}", other.name()),
        }
        self.active = target;
        self.step_index = 0;
        self.last_adjust = Some(now);
        self.just_switched = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntegrationMode;

    fn secs(start: Instant, s: f64) -> Instant {
        start + Duration::from_secs_f64(s)
    }

    #[test]
    fn test_lookup() {
        assert_eq!(ProfileSelection::lookup("manual"), ProfileSelection::Manual);
        assert_eq!(
            ProfileSelection::lookup("fast"),
            ProfileSelection::Auto(ProfileKind::Fast)
        );
        assert_eq!(
            ProfileSelection::lookup("logain"),
            ProfileSelection::Auto(ProfileKind::LoGain)
        );
        assert_eq!(
            ProfileSelection::lookup("bogus"),
            ProfileSelection::Unknown("bogus".to_string())
        );
    }

    #[test]
    fn test_catalogue_shape() {
        assert_eq!(ProfileKind::All.steps().len(), 6);
        assert_eq!(ProfileKind::Fast.steps().len(), 4);
        assert_eq!(ProfileKind::LoGain.steps().len(), 4);
        for kind in ProfileKind::CATALOGUE {
            let steps = kind.steps();
            assert_eq!(steps[0], GainStep::new(false, IntegrationMode::Fast));
            assert_eq!(
                steps[steps.len() - 1],
                GainStep::new(true, IntegrationMode::Slow)
            );
        }
    }

    #[test]
    fn test_manual_never_adjusts() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        for i in 0..5 {
            let now = secs(start, i as f64 * 2.0);
            assert_eq!(ranger.evaluate(&ProfileSelection::Manual, 1, 1, now), None);
        }
        assert_eq!(ranger.step_index(), 0);
    }

    #[test]
    fn test_switch_emits_first_step() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let fast = ProfileSelection::Auto(ProfileKind::Fast);

        let step = ranger.evaluate(&fast, 1000, 1000, start);
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Fast)));
        assert_eq!(ranger.step_index(), 0);

        // Same profile, in range: nothing to do
        assert_eq!(ranger.evaluate(&fast, 1000, 1000, secs(start, 2.0)), None);
    }

    #[test]
    fn test_climbs_one_step_per_interval() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let fast = ProfileSelection::Auto(ProfileKind::Fast);

        // The switch writes the least sensitive step even in dim light
        let step = ranger.evaluate(&fast, 50, 50, start);
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Fast)));
        assert_eq!(ranger.step_index(), 0);

        // Polled every 100 ms for several seconds
        let mut climbs = vec![];
        for i in 1..=60 {
            let now = secs(start, i as f64 * 0.1);
            let before = ranger.step_index();
            if ranger.evaluate(&fast, 50, 50, now).is_some() {
                assert_eq!(ranger.step_index(), before + 1);
                climbs.push(i);
            }
        }

        assert_eq!(ranger.step_index(), 3);
        assert_eq!(climbs, vec![10, 20, 30]);
    }

    #[test]
    fn test_switch_holds_first_step_for_an_interval() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let all = ProfileSelection::Auto(ProfileKind::All);
        let logain = ProfileSelection::Auto(ProfileKind::LoGain);

        for i in 0..3 {
            ranger.evaluate(&all, 10, 10, secs(start, i as f64));
        }
        assert_eq!(ranger.step_index(), 2);

        // Well past the last adjustment, still no climb on the switch cycle
        let step = ranger.evaluate(&logain, 10, 10, secs(start, 10.0));
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Fast)));
        assert_eq!(ranger.step_index(), 0);
        assert_eq!(ranger.evaluate(&logain, 10, 10, secs(start, 10.5)), None);

        let step = ranger.evaluate(&logain, 10, 10, secs(start, 11.0));
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Medium)));
    }

    #[test]
    fn test_descends_on_high_channel() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let all = ProfileSelection::Auto(ProfileKind::All);

        for i in 0..3 {
            ranger.evaluate(&all, 10, 10, secs(start, i as f64));
        }
        assert_eq!(ranger.step_index(), 2);

        // Only one channel saturating is enough
        let step = ranger.evaluate(&all, 6000, 10, secs(start, 3.0));
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Medium)));
        assert_eq!(ranger.step_index(), 1);

        // Rate limited
        assert_eq!(ranger.evaluate(&all, 6000, 10, secs(start, 3.5)), None);
        assert_eq!(ranger.step_index(), 1);
    }

    #[test]
    fn test_bounded_at_both_ends() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let logain = ProfileSelection::Auto(ProfileKind::LoGain);

        ranger.evaluate(&logain, 6000, 6000, start);
        assert_eq!(ranger.step_index(), 0);
        assert_eq!(ranger.evaluate(&logain, 6000, 6000, secs(start, 1.5)), None);

        for i in 0..10 {
            ranger.evaluate(&logain, 1, 1, secs(start, 3.0 + i as f64));
        }
        assert_eq!(ranger.step_index(), 3);
    }

    #[test]
    fn test_one_low_channel_does_not_climb() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let fast = ProfileSelection::Auto(ProfileKind::Fast);

        ranger.evaluate(&fast, 50, 1000, start);
        assert_eq!(ranger.step_index(), 0);
    }

    #[test]
    fn test_profile_switch_resets_regardless_of_rate_limit() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let all = ProfileSelection::Auto(ProfileKind::All);
        let fast = ProfileSelection::Auto(ProfileKind::Fast);

        for i in 0..=5 {
            ranger.evaluate(&all, 10, 10, secs(start, i as f64));
        }
        assert_eq!(ranger.step_index(), 5);

        // 100 ms after the last adjustment, inside the rate limit window
        let step = ranger.evaluate(&fast, 1000, 1000, secs(start, 5.1));
        assert_eq!(step, Some(GainStep::new(false, IntegrationMode::Fast)));
        assert_eq!(ranger.step_index(), 0);
    }

    #[test]
    fn test_increase_wins_over_decrease() {
        let config = ControllerConfig {
            low_threshold: 5000,
            high_threshold: 100,
            adjust_interval: Duration::from_secs(1),
        };
        let start = Instant::now();
        let mut ranger = AutoRanger::new(config);
        let all = ProfileSelection::Auto(ProfileKind::All);

        ranger.evaluate(&all, 1000, 1000, start);
        assert_eq!(ranger.step_index(), 0);
        ranger.evaluate(&all, 1000, 1000, secs(start, 1.0));
        assert_eq!(ranger.step_index(), 1);
    }

    #[test]
    fn test_unknown_profile_is_soft_fault() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let bogus = ProfileSelection::lookup("bogus");

        assert_eq!(ranger.evaluate(&bogus, 1, 1, start), None);
        assert!(ranger.is_faulted());

        // Recovering to a real profile emits its first step
        let fast = ProfileSelection::Auto(ProfileKind::Fast);
        assert!(ranger
            .evaluate(&fast, 1000, 1000, secs(start, 0.1))
            .is_some());
        assert!(!ranger.is_faulted());
    }

    #[test]
    fn test_returning_from_manual_reemits() {
        let start = Instant::now();
        let mut ranger = AutoRanger::new(ControllerConfig::default());
        let fast = ProfileSelection::Auto(ProfileKind::Fast);

        ranger.evaluate(&fast, 1000, 1000, start);
        ranger.evaluate(&ProfileSelection::Manual, 1000, 1000, secs(start, 0.1));
        assert!(ranger
            .evaluate(&fast, 1000, 1000, secs(start, 0.2))
            .is_some());
    }
}
