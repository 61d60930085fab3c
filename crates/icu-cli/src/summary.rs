use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use icu_core::FamilyOutcome;
use icu_ingest::SelectionSummary;
use icu_model::{CodeSet, FeatureFamily, ReductionKind};

use icu_cli::run::{ColumnCoverage, ExtractOutcome};

/// Code lists longer than this are shortened in the vocabulary listing.
const MAX_LISTED_CODES: usize = 8;

pub fn print_selection(summary: &SelectionSummary) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Step"), header_cell("Stays")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("ICU stays read"), Cell::new(summary.total_stays)]);
    table.add_row(vec![
        Cell::new("In an adult ICU"),
        Cell::new(summary.adult_icu_stays),
    ]);
    table.add_row(vec![
        Cell::new("Long enough stay"),
        Cell::new(summary.long_enough_stays),
    ]);
    table.add_row(vec![
        Cell::new("Selected patients")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(summary.selected).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

pub fn print_run_summary(outcome: &ExtractOutcome) {
    let report = &outcome.report;
    println!("Output: {}", outcome.output.display());
    println!(
        "Patients: {} ({} without admission time)",
        report.cohort_size, report.undated_patients
    );
    println!("Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Family"),
        header_cell("Source"),
        header_cell("Status"),
        header_cell("Patients"),
        header_cell("Batches"),
        header_cell("Failed"),
        header_cell("Rows kept"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for family in &report.families {
        table.add_row(vec![
            Cell::new(&family.family)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&family.source),
            outcome_cell(&family.outcome),
            Cell::new(family.patients_matched),
            Cell::new(family.stats.batches),
            count_cell(family.stats.failed_batches, Color::Yellow),
            Cell::new(family.stats.kept),
        ]);
    }
    println!("{table}");
    for family in &report.families {
        if let FamilyOutcome::Skipped { reason } = &family.outcome {
            eprintln!("- {} skipped: {reason}", family.family);
        }
    }
    print_coverage(&outcome.coverage, outcome.rows);
}

fn print_coverage(coverage: &[ColumnCoverage], rows: usize) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Patients"),
        header_cell("Coverage"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for column in coverage {
        let percent = if rows == 0 {
            0.0
        } else {
            column.covered as f64 * 100.0 / rows as f64
        };
        let percent_cell = Cell::new(format!("{percent:.1}%"));
        table.add_row(vec![
            Cell::new(&column.column),
            if column.covered == 0 {
                dim_cell(0)
            } else {
                Cell::new(column.covered)
            },
            if column.covered == 0 {
                percent_cell.fg(Color::DarkGrey)
            } else {
                percent_cell
            },
        ]);
    }
    println!();
    println!("Coverage:");
    println!("{table}");
}

pub fn print_vocabulary(families: &[FeatureFamily]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Family"),
        header_cell("Source"),
        header_cell("Feature"),
        header_cell("Reduction"),
        header_cell("Codes"),
    ]);
    apply_table_style(&mut table);
    for family in families {
        for feature in &family.features {
            table.add_row(vec![
                Cell::new(&family.name)
                    .fg(Color::Blue)
                    .add_attribute(Attribute::Bold),
                Cell::new(format!("{} ({})", family.source.path, family.source.code_column)),
                Cell::new(&feature.name),
                Cell::new(reduction_label(feature.reduction)),
                Cell::new(describe_codes(&feature.codes)),
            ]);
        }
    }
    println!("{table}");
}

fn reduction_label(kind: ReductionKind) -> &'static str {
    match kind {
        ReductionKind::MinMax => "min/max",
        ReductionKind::Presence => "presence",
        ReductionKind::MaxDose => "max dose",
    }
}

fn describe_codes(codes: &CodeSet) -> String {
    let listed: Vec<String> = match codes {
        CodeSet::Items(ids) => ids.iter().map(ToString::to_string).collect(),
        CodeSet::Prefixes(values) => values.iter().map(|v| format!("{v}*")).collect(),
        CodeSet::Names(values) => values.clone(),
        CodeSet::ItemLabels {
            dictionary,
            pattern,
        } => return format!("labels in {dictionary} matching /{pattern}/"),
    };
    if listed.len() > MAX_LISTED_CODES {
        let rest = listed.len() - MAX_LISTED_CODES;
        format!("{}, +{rest} more", listed[..MAX_LISTED_CODES].join(", "))
    } else {
        listed.join(", ")
    }
}

fn outcome_cell(outcome: &FamilyOutcome) -> Cell {
    let cell = Cell::new(outcome.label());
    match outcome {
        FamilyOutcome::Completed => cell.fg(Color::Green).add_attribute(Attribute::Bold),
        FamilyOutcome::Empty => cell.fg(Color::Yellow),
        FamilyOutcome::Skipped { .. } => cell.fg(Color::Red),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
