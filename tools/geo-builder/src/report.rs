//! Summary of a build run

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// What a build produced and what it could not find
///
/// Every mesh name appears in at most one set.
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    /// Levels that produced a geo file
    pub levels_written: usize,
    /// Records in `geo.mesh`
    pub mesh_records: usize,
    /// Names covered by those records
    pub mesh_names: usize,
    /// Decoded without any collision geometry
    pub empty: BTreeSet<String>,
    /// Demanded but never decoded
    pub missing: BTreeSet<String>,
    /// Demanded as optional and never decoded
    pub missing_optional: BTreeSet<String>,
    /// Decoded but excluded for exceeding the library limits
    pub over_limit: BTreeSet<String>,
    /// Level ids whose level pak could not be parsed or gave nothing to write
    pub levels_without_output: BTreeSet<String>,
    /// Level map entries without a matching folder or level pak
    pub mismatches: Vec<String>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// Record a failed or missing mesh unless it was already recorded
    pub fn add_missing(&mut self, name: String, optional: bool) {
        if self.empty.contains(&name) || self.over_limit.contains(&name) {
            return;
        }
        if optional {
            if !self.missing.contains(&name) {
                self.missing_optional.insert(name);
            }
        } else {
            self.missing_optional.remove(&name);
            self.missing.insert(name);
        }
    }

    /// Log every entry; optional names at info level, the rest as warnings
    pub fn log(&self) {
        for mismatch in &self.mismatches {
            tracing::warn!("{mismatch}");
        }
        for name in &self.empty {
            tracing::info!(mesh = %name, "empty mesh");
        }
        for name in &self.over_limit {
            tracing::warn!(mesh = %name, "mesh exceeds library limits");
        }
        for name in &self.missing_optional {
            tracing::info!(mesh = %name, "optional mesh not found");
        }
        for name in &self.missing {
            tracing::warn!(mesh = %name, "missing mesh");
        }
        for level in &self.levels_without_output {
            tracing::warn!(level = %level, "no geo file written");
        }
        tracing::info!("{self}");
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        write!(
            f,
            "{} levels, {} meshes ({} names), {} empty, {} missing ({} optional) in {}h {}m {}s",
            self.levels_written,
            self.mesh_records,
            self.mesh_names,
            self.empty.len(),
            self.missing.len(),
            self.missing_optional.len(),
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_recorded_once() {
        let mut report = BuildReport::default();
        report.add_missing("a.cgf".into(), false);
        report.add_missing("a.cgf".into(), false);
        report.add_missing("b.cgf".into(), true);
        report.add_missing("b.cgf".into(), false);
        report.add_missing("a.cgf".into(), true);

        assert_eq!(report.missing.iter().collect::<Vec<_>>(), ["a.cgf", "b.cgf"]);
        assert!(report.missing_optional.is_empty());
    }

    #[test]
    fn test_empty_is_not_missing() {
        let mut report = BuildReport::default();
        report.empty.insert("e.cgf".into());
        report.add_missing("e.cgf".into(), false);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_display() {
        let report = BuildReport {
            levels_written: 2,
            mesh_records: 10,
            mesh_names: 12,
            elapsed: Duration::from_secs(3725),
            ..BuildReport::default()
        };
        assert_eq!(
            report.to_string(),
            "2 levels, 10 meshes (12 names), 0 empty, 0 missing (0 optional) in 1h 2m 5s"
        );
    }
}
