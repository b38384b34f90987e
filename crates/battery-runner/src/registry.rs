//! Static catalogue of runnable test suites and their cases.
//!
//! The original battery discovered test modules from the file tree at
//! runtime; here discovery is registration at build time, which is
//! deterministic by construction. The registry is built once at session start
//! and immutable afterwards.

use crate::error::BatteryError;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a test case gets from the harness: a reproducible random
/// source and the isolated directory it may scribble in. The sandbox path is
/// passed explicitly rather than set as the process working directory, so a
/// concurrent runner remains possible.
pub struct CaseContext {
    pub seed: u64,
    pub rng: ChaCha20Rng,
    pub sandbox: PathBuf,
}

pub type CaseFn = fn(&mut CaseContext) -> anyhow::Result<()>;

#[derive(Debug)]
pub struct Case {
    pub name: &'static str,
    pub run: CaseFn,
}

pub struct Suite {
    pub name: &'static str,
    pub cases: Vec<Case>,
}

/// Suite name -> cases, ordered for deterministic enumeration.
#[derive(Debug)]
pub struct Registry {
    suites: BTreeMap<String, Vec<Case>>,
}

impl Registry {
    pub fn build(suites: Vec<Suite>) -> Result<Self, BatteryError> {
        let mut map: BTreeMap<String, Vec<Case>> = BTreeMap::new();
        for suite in suites {
            if suite.cases.is_empty() {
                return Err(BatteryError::Registry(format!(
                    "suite '{}' has no cases",
                    suite.name
                )));
            }
            let mut seen: Vec<&str> = Vec::new();
            for case in &suite.cases {
                if seen.contains(&case.name) {
                    return Err(BatteryError::Registry(format!(
                        "suite '{}' registers case '{}' twice",
                        suite.name, case.name
                    )));
                }
                seen.push(case.name);
            }
            if map.insert(suite.name.to_string(), suite.cases).is_some() {
                return Err(BatteryError::Registry(format!(
                    "suite '{}' registered twice",
                    suite.name
                )));
            }
        }
        if map.is_empty() {
            return Err(BatteryError::Registry(
                "no test suites registered".to_string(),
            ));
        }
        Ok(Self { suites: map })
    }

    pub fn suite_names(&self) -> Vec<&str> {
        self.suites.keys().map(|s| s.as_str()).collect()
    }

    pub fn cases(&self, suite: &str) -> Option<&[Case]> {
        self.suites.get(suite).map(|v| v.as_slice())
    }

    pub fn resolve(&self, suite: &str, case: &str) -> Option<&Case> {
        self.suites
            .get(suite)
            .and_then(|cases| cases.iter().find(|c| c.name == case))
    }

    /// All (suite, case) pairs, in registry order. Used to zero the ledger.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (suite, cases) in &self.suites {
            for case in cases {
                out.push((suite.clone(), case.name.to_string()));
            }
        }
        out
    }

    pub fn pair_count(&self) -> usize {
        self.suites.values().map(|c| c.len()).sum()
    }
}
