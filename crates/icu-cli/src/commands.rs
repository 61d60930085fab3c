use anyhow::{Context, Result};
use icu_ingest::SelectionSummary;
use icu_model::UpperBound;
use icu_standards::Vocabulary;

use icu_cli::config::PipelineConfig;
use icu_cli::run::{
    ExtractOutcome, ExtractSettings, SelectSettings, extract, select, write_report,
};

use crate::cli::{ExtractArgs, SelectArgs, VocabularyArgs};
use crate::summary::print_vocabulary;

const NO_DATA_ROOT: &str = "no data root given; pass --data-root or set data_root in the configuration";

pub fn run_select(config: &PipelineConfig, args: &SelectArgs) -> Result<SelectionSummary> {
    let data_root = args
        .data_root
        .clone()
        .or_else(|| config.data_root.clone())
        .context(NO_DATA_ROOT)?;
    let mut selection = config.selection.clone();
    if let Some(days) = args.min_los_days {
        selection = selection.with_min_los_days(days);
    }
    let settings = SelectSettings {
        data_root,
        output: args.output.clone().unwrap_or_else(|| config.cohort_path()),
        selection,
    };
    select(&settings)
}

pub fn extract_settings(config: &PipelineConfig, args: &ExtractArgs) -> Result<ExtractSettings> {
    let data_root = args
        .data_root
        .clone()
        .or_else(|| config.data_root.clone())
        .context(NO_DATA_ROOT)?;
    let mut options = config.extraction.clone();
    if let Some(hours) = args.window_hours {
        options = options.with_window_hours(hours);
    }
    if args.exclusive_window_end {
        options = options.with_upper_bound(UpperBound::Exclusive);
    }
    if let Some(size) = args.chunk_size {
        options = options.with_event_chunk_size(size);
    }
    if let Some(size) = args.therapy_chunk_size {
        options = options.with_therapy_chunk_size(size);
    }
    let intermediate = (args.save_intermediate || args.intermediate.is_some()).then(|| {
        args.intermediate
            .clone()
            .unwrap_or_else(|| config.intermediate_path())
    });
    Ok(ExtractSettings {
        data_root,
        cohort: args.cohort.clone().unwrap_or_else(|| config.cohort_path()),
        output: args.output.clone().unwrap_or_else(|| config.output_path()),
        intermediate,
        score_file: args.score_file.clone().or_else(|| config.score_file.clone()),
        vocabulary: args.vocabulary.clone().or_else(|| config.vocabulary.clone()),
        options,
    })
}

pub fn run_extract(config: &PipelineConfig, args: &ExtractArgs) -> Result<ExtractOutcome> {
    let settings = extract_settings(config, args)?;
    let outcome = extract(&settings)?;
    if let Some(path) = &args.report {
        write_report(path, &outcome.report)?;
    }
    Ok(outcome)
}

pub fn run_vocabulary(config: &PipelineConfig, args: &VocabularyArgs) -> Result<()> {
    let path = args.vocabulary.clone().or_else(|| config.vocabulary.clone());
    let vocabulary = Vocabulary::load(path.as_deref()).context("load feature vocabulary")?;
    if let Some(name) = &args.family {
        let family = vocabulary
            .family(name)
            .with_context(|| format!("unknown feature family {name}"))?;
        print_vocabulary(std::slice::from_ref(family));
    } else {
        print_vocabulary(vocabulary.families());
    }
    Ok(())
}
