//! Owns one bounded run of the battery: initialization, the
//! iterate-until-timeout loop, finalization, and the optional notification.

use crate::driver::{run_case, Outcome};
use crate::error::BatteryError;
use crate::hooks::Collaborators;
use crate::record::{RecordKeeper, Report};
use crate::registry::{CaseContext, Registry, Suite};
use crate::sampler::Sampler;
use crate::sandbox::SandboxManager;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock budget in hours. Checked only at iteration boundaries, so
    /// one in-flight execution always completes; a zero budget still runs a
    /// single full iteration.
    pub hours: f64,
    /// Run the compile collaborator before the loop starts.
    pub compile: bool,
    /// Suppress the end-of-session notification (set when this session is a
    /// sub-task of a larger batch, to avoid duplicate alerts).
    pub background: bool,
    /// Directory holding the progress log, reports, and sandboxes.
    pub base_dir: PathBuf,
    /// Fixed sampler seed; `None` draws from entropy.
    pub sampler_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hours: 1.0,
            compile: false,
            background: false,
            base_dir: PathBuf::from(".battery"),
            sampler_seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Looping,
    Finalizing,
    Done,
}

/// Transient record of one execution attempt; consumed by the record keeper
/// and kept only for the caller's immediate inspection.
#[derive(Debug)]
pub struct IterationRecord {
    pub suite: String,
    pub case: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    registry: Registry,
    sampler: Sampler,
    sandboxes: SandboxManager,
    keeper: RecordKeeper,
    started: Instant,
    budget: Duration,
    phase: SessionPhase,
}

impl Session {
    /// Idle -> Initializing -> ready to loop. Compile and cleanup run before
    /// anything else; a failure in either aborts before any iteration.
    pub fn initialize<C: Collaborators>(
        config: SessionConfig,
        suites: Vec<Suite>,
        hooks: &C,
    ) -> Result<Self, BatteryError> {
        debug!(phase = ?SessionPhase::Initializing, "session initializing");
        if config.compile {
            hooks.compile(true)?;
        }
        hooks.cleanup()?;

        let registry = Registry::build(suites)?;
        let sandboxes = SandboxManager::new(&config.base_dir);
        sandboxes.reset_all()?;

        let started_at = Utc::now();
        let budget = Duration::from_secs_f64(config.hours.max(0.0) * 3600.0);
        let keeper = RecordKeeper::initialize(&registry, &config.base_dir, started_at, budget)?;
        info!(
            pairs = registry.pair_count(),
            budget_hours = config.hours,
            base_dir = %config.base_dir.display(),
            "session initialized"
        );
        let sampler = match config.sampler_seed {
            Some(seed) => Sampler::from_seed(seed),
            None => Sampler::from_entropy(),
        };
        Ok(Self {
            config,
            registry,
            sampler,
            sandboxes,
            keeper,
            started: Instant::now(),
            budget,
            phase: SessionPhase::Looping,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn keeper(&self) -> &RecordKeeper {
        &self.keeper
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// One full iteration: draw a seed, sample a pair, run it in a fresh
    /// sandbox, record the outcome, tear the sandbox down. Test failures are
    /// data; only environment errors propagate.
    pub fn run_iteration(&mut self) -> Result<IterationRecord, BatteryError> {
        let seed = self.sampler.next_seed();
        let (suite, case) = {
            let (s, c) = self.sampler.sample(&self.registry);
            (s.to_string(), c.to_string())
        };
        let started_at = Utc::now();

        let sandbox = self.sandboxes.enter()?;
        let outcome = {
            let resolved = self.registry.resolve(&suite, &case).ok_or_else(|| {
                BatteryError::Registry(format!("sampled pair '{}::{}' not in registry", suite, case))
            })?;
            let mut ctx = CaseContext {
                seed,
                rng: ChaCha20Rng::seed_from_u64(seed),
                sandbox: sandbox.path().to_path_buf(),
            };
            run_case(resolved, &mut ctx)
        };

        match &outcome {
            Outcome::Success => debug!(suite = %suite, case = %case, seed, "case passed"),
            Outcome::Failure(_) => {
                warn!(suite = %suite, case = %case, seed, "case failed; seed recorded")
            }
        }
        self.keeper.update(&suite, &case, seed, &outcome)?;
        self.sandboxes.exit(sandbox)?;

        Ok(IterationRecord {
            suite,
            case,
            seed,
            started_at,
            outcome,
        })
    }

    /// Drive the loop until the budget is spent, then finalize and notify.
    /// On a fatal error the statistics accumulated so far are flushed as a
    /// partial report before the error propagates.
    pub fn run<C: Collaborators>(mut self, hooks: &C) -> Result<Report, BatteryError> {
        match self.run_loop() {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "session aborted; flushing partial report");
                if let Err(flush_err) = self.keeper.flush_partial() {
                    warn!(error = %flush_err, "partial report could not be written");
                }
                return Err(e);
            }
        }

        self.phase = SessionPhase::Finalizing;
        let report = self.keeper.finalize()?;
        if !self.config.background {
            hooks.notify("property", self.config.hours);
        }
        self.phase = SessionPhase::Done;
        info!(iterations = report.iterations, "session done");
        Ok(report)
    }

    fn run_loop(&mut self) -> Result<(), BatteryError> {
        loop {
            self.run_iteration()?;
            if self.started.elapsed() >= self.budget {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopCollaborators;
    use crate::registry::Case;
    use crate::sampler::SEED_RANGE;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::fs;

    fn temp_base(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "battery_session_{}_{}_{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    fn passing(_ctx: &mut CaseContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn failing(_ctx: &mut CaseContext) -> anyhow::Result<()> {
        Err(anyhow!("always broken"))
    }

    fn writes_files(ctx: &mut CaseContext) -> anyhow::Result<()> {
        fs::write(ctx.sandbox.join("side_effect.dat"), ctx.seed.to_le_bytes())?;
        Ok(())
    }

    fn two_case_suite() -> Vec<Suite> {
        vec![Suite {
            name: "mod1",
            cases: vec![
                Case {
                    name: "t1",
                    run: passing,
                },
                Case {
                    name: "t2",
                    run: writes_files,
                },
            ],
        }]
    }

    fn config(base: &std::path::Path, hours: f64) -> SessionConfig {
        SessionConfig {
            hours,
            base_dir: base.to_path_buf(),
            sampler_seed: Some(99),
            ..SessionConfig::default()
        }
    }

    struct CountingCollaborators {
        notifies: RefCell<Vec<(String, f64)>>,
    }

    impl CountingCollaborators {
        fn new() -> Self {
            Self {
                notifies: RefCell::new(Vec::new()),
            }
        }
    }

    impl Collaborators for CountingCollaborators {
        fn compile(&self, _verbose: bool) -> Result<(), BatteryError> {
            Ok(())
        }

        fn cleanup(&self) -> Result<(), BatteryError> {
            Ok(())
        }

        fn notify(&self, category: &str, hours: f64) {
            self.notifies.borrow_mut().push((category.to_string(), hours));
        }
    }

    struct FailingCompile;

    impl Collaborators for FailingCompile {
        fn compile(&self, _verbose: bool) -> Result<(), BatteryError> {
            Err(BatteryError::Build("toolchain missing".to_string()))
        }

        fn cleanup(&self) -> Result<(), BatteryError> {
            Ok(())
        }

        fn notify(&self, _category: &str, _hours: f64) {}
    }

    #[test]
    fn zero_budget_runs_exactly_one_iteration() {
        let base = temp_base("scenario_a");
        let session =
            Session::initialize(config(&base, 0.0), two_case_suite(), &NoopCollaborators)
                .expect("init");
        let report = session.run(&NoopCollaborators).expect("run");
        assert_eq!(report.iterations, 1);
        let counted: u64 = report
            .entries
            .iter()
            .map(|e| e.successes + e.failures)
            .sum();
        assert_eq!(counted, 1);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn always_failing_case_accumulates_failures_and_log_entries() {
        let base = temp_base("scenario_b");
        let suites = vec![Suite {
            name: "broken",
            cases: vec![Case {
                name: "always",
                run: failing,
            }],
        }];
        let mut session =
            Session::initialize(config(&base, 0.0), suites, &NoopCollaborators).expect("init");
        let n = 25;
        let mut seeds = Vec::new();
        for _ in 0..n {
            let record = session.run_iteration().expect("iteration");
            assert!(!record.outcome.is_success());
            assert!(SEED_RANGE.contains(&record.seed));
            seeds.push(record.seed);
        }
        let counts = session.keeper().counts("broken", "always").expect("pair");
        assert_eq!(counts.failures, n as u64);
        assert_eq!(counts.successes, 0);
        let log = fs::read_to_string(session.keeper().log_path()).expect("log");
        assert_eq!(log.matches("FAIL broken::always").count(), n);
        for seed in seeds {
            assert!(log.contains(&format!("seed {}", seed)), "seed {} unlogged", seed);
        }
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn background_suppresses_notification() {
        let base = temp_base("scenario_c_bg");
        let hooks = CountingCollaborators::new();
        let mut cfg = config(&base, 0.0);
        cfg.background = true;
        let session = Session::initialize(cfg, two_case_suite(), &hooks).expect("init");
        session.run(&hooks).expect("run");
        assert!(hooks.notifies.borrow().is_empty());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn foreground_notifies_exactly_once_with_configured_hours() {
        let base = temp_base("scenario_c_fg");
        let hooks = CountingCollaborators::new();
        let session =
            Session::initialize(config(&base, 0.0), two_case_suite(), &hooks).expect("init");
        session.run(&hooks).expect("run");
        let notifies = hooks.notifies.borrow();
        assert_eq!(notifies.len(), 1);
        assert_eq!(notifies[0].0, "property");
        assert_eq!(notifies[0].1, 0.0);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn compile_failure_aborts_before_any_iteration() {
        let base = temp_base("compile_fail");
        let mut cfg = config(&base, 0.0);
        cfg.compile = true;
        let err = Session::initialize(cfg, two_case_suite(), &FailingCompile)
            .expect_err("compile must abort");
        assert!(matches!(err, BatteryError::Build(_)));
        assert!(!base.join("battery.log").exists());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn counts_are_conserved_across_many_iterations() {
        let base = temp_base("conservation");
        let mut session =
            Session::initialize(config(&base, 0.0), two_case_suite(), &NoopCollaborators)
                .expect("init");
        for _ in 0..100 {
            session.run_iteration().expect("iteration");
        }
        let total: u64 = session
            .registry()
            .pairs()
            .iter()
            .map(|(s, c)| {
                let counts = session.keeper().counts(s, c).expect("pair");
                counts.successes + counts.failures
            })
            .sum();
        assert_eq!(total, 100);
        assert_eq!(session.keeper().iterations(), 100);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn sandboxes_never_outlive_their_iteration() {
        let base = temp_base("no_leak");
        let mut session =
            Session::initialize(config(&base, 0.0), two_case_suite(), &NoopCollaborators)
                .expect("init");
        for _ in 0..20 {
            session.run_iteration().expect("iteration");
            let root = base.join("sandboxes");
            if root.exists() {
                let leftovers: Vec<_> = fs::read_dir(&root)
                    .expect("list")
                    .map(|e| e.expect("entry").path())
                    .collect();
                assert!(leftovers.is_empty(), "leaked: {:?}", leftovers);
            }
        }
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn logged_seed_reproduces_the_failure() {
        let base = temp_base("reproduce");
        let suites = vec![Suite {
            name: "flaky",
            cases: vec![Case {
                name: "coin",
                run: |ctx| {
                    use rand::Rng;
                    let draw: u64 = ctx.rng.gen_range(0..100);
                    if draw < 50 {
                        Err(anyhow!("draw {} below threshold", draw))
                    } else {
                        Ok(())
                    }
                },
            }],
        }];
        let mut session =
            Session::initialize(config(&base, 0.0), suites, &NoopCollaborators).expect("init");
        let mut failing_seed = None;
        for _ in 0..200 {
            let record = session.run_iteration().expect("iteration");
            if let Outcome::Failure(_) = record.outcome {
                failing_seed = Some(record.seed);
                break;
            }
        }
        let seed = failing_seed.expect("a failing seed appears within 200 draws");
        let case = session.registry().resolve("flaky", "coin").expect("case");
        let sandbox = temp_base("reproduce_sandbox");
        fs::create_dir_all(&sandbox).expect("sandbox dir");
        let mut ctx = CaseContext {
            seed,
            rng: ChaCha20Rng::seed_from_u64(seed),
            sandbox: sandbox.clone(),
        };
        let replayed = run_case(case, &mut ctx);
        assert!(!replayed.is_success(), "seed {} did not reproduce", seed);
        let _ = fs::remove_dir_all(base);
        let _ = fs::remove_dir_all(sandbox);
    }
}
