//! Prints phase reports to stdout.

use std::fmt;
use std::time::Duration;

use txbench_workload::measure::LabelSummary;
use yansi::Paint;

use crate::bench::PhaseReport;

/// Prints the totals of a phase followed by the latencies of every operation label.
pub fn print_phase(report: &PhaseReport) {
    println!();
    println!(
        "{} ({} ops, threads: {})",
        format!("## {}", report.phase).bold(),
        report.operations.bold().blue(),
        report.threads.bold()
    );
    print!("  {:.2} operations/s", report.throughput().bold());
    println!(" in {:.2?}", report.elapsed);
    if report.failed > 0 {
        println!("  {}", format!("{} FAILED", report.failed).bold().red());
    }

    for label in &report.labels {
        print_label(label);
    }
}

fn print_label(summary: &LabelSummary) {
    if summary.count == 0 {
        println!(
            "{}",
            format!("{} {} FAILURES", summary.label, summary.failed())
                .bold()
                .red()
        );
        print_failures(summary);
        return;
    }

    print!(
        "{} ({} ops",
        format!("{}:", summary.label).bold().green(),
        summary.count.bold()
    );
    if summary.failed() > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", summary.failed()).bold().red()
        );
    }
    println!(")");

    print_percentiles(summary, Duration::from_micros);
    print_failures(summary);
}

fn print_percentiles<T: fmt::Debug>(summary: &LabelSummary, map: impl Fn(u64) -> T) {
    let avg = map(summary.avg as u64);
    let p50 = map(summary.p50 as u64);
    let p90 = map(summary.p90 as u64);
    let p99 = map(summary.p99 as u64);
    let max = map(summary.max as u64);
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}; max: {max:.2?}",
        avg.bold()
    );
}

fn print_failures(summary: &LabelSummary) {
    for (code, count) in &summary.failures {
        println!("  status {code}: {}", count.red());
    }
}
