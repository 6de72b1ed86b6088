use std::fs;

use anyhow::{Context, Result};
use roster_reconcile::{diff, EnrollmentRecord, SectionFilter, Snapshot};

fn load_snapshot(path: &str) -> Result<Snapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("read snapshot: {path}"))?;
    let snap: Snapshot =
        serde_json::from_str(&raw).with_context(|| format!("parse snapshot json: {path}"))?;
    // Hand-edited files may use lowercase codes.
    Ok(snap
        .into_records()
        .into_iter()
        .map(|r| EnrollmentRecord::new(r.student_id, r.semester.0, r.course, r.section))
        .collect())
}

pub fn run_diff(old: &str, new: &str, prefixes: &[String], all_sections: bool) -> Result<()> {
    let filter = if all_sections {
        SectionFilter::all()
    } else if prefixes.is_empty() {
        SectionFilter::labs()
    } else {
        SectionFilter::with_prefixes(prefixes)
    };

    let old = load_snapshot(old)?;
    let new = load_snapshot(new)?;
    let result = diff(&old, &new, &filter)?;

    for delta in result.deltas() {
        println!("{delta}");
    }
    println!(
        "drops={} adds={} swaps={} unchanged={}",
        result.drops.len(),
        result.adds.len(),
        result.swaps.len(),
        result.unchanged
    );
    Ok(())
}
