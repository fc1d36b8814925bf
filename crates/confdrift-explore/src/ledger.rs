//! Run-scoped artifact directory: the violation ledger and range reports.
//!
//! The ledger is append-only CSV, one row per confirmed-novel violation,
//! so a run that dies mid-generation still leaves every finding up to that
//! point on disk.  Range reports are one file per generation and show how
//! far each option's admissible interval has narrowed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use confdrift_config::{ConfigModel, RangeTable};
use confdrift_oracle::Violation;
use itertools::Itertools;

const LEDGER_FILE: &str = "violations.csv";
const LEDGER_HEADER: &str = "record,kind,key,scenario_id,option_ids,generation";

/// Writer for one run's artifact directory.
pub struct RunLedger {
    root: PathBuf,
    violations: File,
}

impl RunLedger {
    /// Open (or create) the artifact directory and its violation ledger.
    ///
    /// Re-opening an existing directory appends; the CSV header is only
    /// written when the ledger file is fresh.
    pub fn new(root: &Path) -> Result<Self, io::Error> {
        fs::create_dir_all(root)?;
        let path = root.join(LEDGER_FILE);
        let mut violations = OpenOptions::new().create(true).append(true).open(&path)?;
        if violations.metadata()?.len() == 0 {
            writeln!(violations, "{LEDGER_HEADER}")?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            violations,
        })
    }

    /// The artifact directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one confirmed-novel violation.  `option_ids` are the options
    /// the candidate configuration actually changed.  The record name and
    /// scenario id are passed by value because the scenario itself may be
    /// swapped out between detection and this call.
    pub fn record_violation(
        &mut self,
        generation: u64,
        record: &str,
        scenario_id: u64,
        violation: &Violation,
        option_ids: &[usize],
    ) -> Result<(), io::Error> {
        writeln!(
            self.violations,
            "{},{},{},{},{},{}",
            record,
            violation.kind,
            violation.distinguishing_key,
            scenario_id,
            option_ids.iter().join(";"),
            generation
        )
    }

    /// Write the post-generation state of every option's range.
    pub fn write_range_report(
        &mut self,
        generation: u64,
        model: &ConfigModel,
        table: &RangeTable,
    ) -> Result<(), io::Error> {
        let path = self.root.join(format!("ranges-gen-{generation:04}.txt"));
        let mut out = File::create(path)?;
        writeln!(out, "option ranges after generation {generation}")?;
        for option in model.options() {
            let Some(range) = table.range(option.id) else {
                continue;
            };
            writeln!(
                out,
                "{:>4}  {:<56} {:<16} {}",
                option.id,
                option.dotted_path(),
                format!("{:?}", option.kind),
                range
            )?;
        }
        Ok(())
    }
}
