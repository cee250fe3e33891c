//! Metadata and measurement records (spec §3 "Metadata record" / "Measurement
//! record" / "Deferral record").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buildid::BuildId;
use crate::request::{NetConfig, OperatingSystem, RunRequest};

/// `info.json`: build identity, machine identity, and run timestamp,
/// captured once per client worker invocation (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub version: String,
    pub revision: String,
    /// The netconfig under which this run was driven, stored as the "branch".
    pub branch: String,
    pub buildid: String,
    pub original_buildid: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub cpu_family: String,
    pub tstamp: i64,
}

impl MetadataRecord {
    pub fn new(
        name: String,
        version: String,
        revision: String,
        netconfig: NetConfig,
        os: OperatingSystem,
        os_version: String,
        hostname: String,
        cpu_family: String,
        tstamp: i64,
    ) -> Self {
        let build_id = BuildId::derive(&revision, os, netconfig);
        MetadataRecord {
            name,
            version,
            revision,
            branch: netconfig.as_str().to_string(),
            buildid: build_id.id,
            original_buildid: build_id.original,
            hostname,
            os: os.as_str().to_string(),
            os_version,
            cpu_family,
            tstamp,
        }
    }
}

/// One raw per-test timing triple, as emitted by the runner (spec §3
/// "Measurement record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingTriple {
    pub start: f64,
    pub stop: f64,
    pub total: f64,
}

/// Raw per-test output: a mapping from page key to timing triples, plus an
/// aggregate `total` list. This is the shape written to each `.out` file
/// under `out/` by the runner, one file per test suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(flatten)]
    pub pages: BTreeMap<String, Vec<TimingTriple>>,
}

/// The collator's output shape (spec §3): `results` keyed by page with just
/// the `total` values, `results_aux` carrying per-page start/stop lists plus
/// the aggregate totals — grounded on the upstream agent's
/// `stoneridge_collator`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollatedResult {
    pub results: BTreeMap<String, Vec<f64>>,
    pub results_aux: ResultsAux,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsAux {
    #[serde(flatten)]
    pub start_stop: BTreeMap<String, Vec<f64>>,
    pub totals: Vec<f64>,
}

impl CollatedResult {
    /// Flatten one suite's raw [`MeasurementRecord`] into `{results,
    /// results_aux}`, per the upstream `stoneridge_collator` agent: the
    /// `total` key's values go to `results_aux.totals`; every other key's
    /// `total` values go to `results[page]`; `start`/`stop` go to
    /// `results_aux["<page>_start"/"_stop"]`.
    pub fn from_measurement(record: &MeasurementRecord) -> CollatedResult {
        let mut out = CollatedResult::default();
        for (page, triples) in &record.pages {
            if page == "total" {
                for t in triples {
                    out.results_aux.totals.push(t.total);
                }
                continue;
            }
            let starts = out
                .results_aux
                .start_stop
                .entry(format!("{page}_start"))
                .or_default();
            for t in triples {
                starts.push(t.start);
            }
            let stops = out
                .results_aux
                .start_stop
                .entry(format!("{page}_stop"))
                .or_default();
            for t in triples {
                stops.push(t.stop);
            }
            let totals = out.results.entry(page.clone()).or_default();
            for t in triples {
                totals.push(t.total);
            }
        }
        out
    }
}

/// A run that the cloner could not satisfy; republished onto the intake
/// queue with `attempt` incremented (spec §3).
pub type DeferralRecord = RunRequest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buildid_matches_spec_example() {
        let meta = MetadataRecord::new(
            "Firefox".into(),
            "99.0a1".into(),
            "20200101120000".into(),
            NetConfig::Umts,
            OperatingSystem::Mac,
            "14.0".into(),
            "worker-1".into(),
            "x86_64".into(),
            1000,
        );
        assert_eq!(meta.buildid, "20200101120000m1");
        assert_eq!(meta.original_buildid, "20200101120000");
    }

    #[test]
    fn collator_separates_total_from_pages() {
        let mut record = MeasurementRecord::default();
        record.pages.insert(
            "total".into(),
            vec![TimingTriple {
                start: 0.0,
                stop: 1.0,
                total: 1.0,
            }],
        );
        record.pages.insert(
            "example.com".into(),
            vec![TimingTriple {
                start: 1.0,
                stop: 3.5,
                total: 2.5,
            }],
        );

        let collated = CollatedResult::from_measurement(&record);
        assert_eq!(collated.results_aux.totals, vec![1.0]);
        assert_eq!(collated.results["example.com"], vec![2.5]);
        assert_eq!(
            collated.results_aux.start_stop["example.com_start"],
            vec![1.0]
        );
        assert_eq!(
            collated.results_aux.start_stop["example.com_stop"],
            vec![3.5]
        );
    }

    #[test]
    fn empty_measurement_yields_empty_collated() {
        let record = MeasurementRecord::default();
        let collated = CollatedResult::from_measurement(&record);
        assert!(collated.results.is_empty());
        assert!(collated.results_aux.totals.is_empty());
    }
}
