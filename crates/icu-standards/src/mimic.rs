//! Built-in feature families for the MIMIC-IV (v3.x) table layout.
//!
//! Item ids cover both the MetaVision (2xxxxx) and legacy CareVue ids where
//! the latter still appear in extracts.

use icu_model::{
    CodeKind, CodeSet, ExposureSummary, FeatureDefinition, FeatureFamily, SourceTable,
    ValuePolicy, WindowPolicy,
};

/// Laboratory features read from `hosp/labevents.csv`.
pub const LAB_FEATURES: &[(&str, &[i64])] = &[
    ("Bilirubin", &[50885, 50884, 4948, 4949]),
    ("Lactate", &[50813, 818, 1531]),
    ("CRP", &[50889]),
    ("Leukocytes", &[51301, 51300, 51302, 51303]),
    ("Blood_Sugar", &[50809, 50931, 807, 811, 1529]),
    ("Platelets", &[51265, 51256, 52769]),
    ("Creatinine", &[50912, 791, 1525]),
];

/// Vital-sign, blood-gas and neurological features read from
/// `icu/chartevents.csv`.
pub const CHART_FEATURES: &[(&str, &[i64])] = &[
    ("PO2", &[220224, 490, 50821, 50816]),
    ("FiO2", &[223835, 3420, 3422, 189, 190]),
    ("SpO2", &[220277, 646, 834]),
    ("Systolic_BP", &[220050, 51, 455, 6701, 442]),
    ("Diastolic_BP", &[220051, 8368, 8441, 8555, 443, 8440]),
    ("MAP", &[220052, 456, 52, 6702, 444]),
    ("Respiratory_Rate", &[220210, 618, 615, 614, 651]),
    ("Heart_Rate", &[220045, 211, 220046]),
    ("Temperature", &[223762, 676, 677, 678, 223761, 679]),
    ("GCS_Total", &[198, 226755, 227013]),
    ("GCS_Eye", &[220739, 184]),
    ("GCS_Verbal", &[223900, 723]),
    ("GCS_Motor", &[223901, 454]),
];

pub const URINE_OUTPUT_ITEMS: &[i64] = &[226559, 226560, 227510, 227489];

/// ICD-10 prefixes per infection category. Categories may overlap; a
/// patient is flagged in every category one of their codes matches.
pub const INFECTION_PREFIXES: &[(&str, &[&str])] = &[
    (
        "Bile_infection",
        &["K80", "K81", "K82", "K83", "K85", "K86", "K87"],
    ),
    (
        "Urological_infection",
        &["N10", "N11", "N12", "N13", "N15", "N16", "N30", "N34", "N39"],
    ),
    (
        "Respiratory_infection",
        &["J09", "J10", "J11", "J12", "J13", "J14", "J15", "J16", "J18"],
    ),
    (
        "Skin_infection",
        &["L00", "L01", "L02", "L03", "L04", "L05", "L08"],
    ),
    ("Bone_joint_infection", &["M00", "M01", "M02", "M86"]),
    ("Colon_infection", &["A04", "K52", "A09"]),
    (
        "Catheter_infection",
        &["T80.2", "T82.7", "T83.5", "T84.5", "T85.7"],
    ),
    ("Abdominal_infection", &["K35", "K36", "K37", "K38", "K65"]),
    ("Unknown_infection", &["A49", "B99"]),
];

pub const DIABETES_PREFIXES: &[&str] = &["E10", "E11", "E12", "E13", "E14"];

pub const DIALYSIS_PREFIXES: &[&str] = &[
    "5A1D", "5A1D0", "5A1D1", "5A1D2", "5A1D5", "5A1D6", "5A1D7", "5A1D8", "5498",
];

pub const VENTILATION_DICTIONARY: &str = "icu/d_items.csv";
pub const VENTILATION_LABEL_PATTERN: &str = "ventilat|intubat";

/// Vasopressors counted by the cardiovascular sub-score, in column order.
pub const VASOPRESSORS: &[(&str, &[i64])] = &[
    ("Epinephrine", &[221289, 30047, 30120]),
    ("Norepinephrine", &[221906, 30051, 30128]),
    ("Dopamine", &[221662, 30043, 30119]),
    ("Dobutamine", &[221653, 30042, 30125]),
];

/// Antibiotic flags with their ICU input item id and the free-text targets
/// searched in hospital medication tables, in priority order.
pub const ANTIBIOTICS: &[(&str, i64, &[&str])] = &[
    ("Vancomycin", 225798, &["vancomycin"]),
    ("Cefepime", 225851, &["cefepime"]),
    (
        "Piperacillin_Tazobactam",
        225893,
        &["piperacillin-tazobactam", "piperacillin\u{2013}tazobactam"],
    ),
    ("Meropenem", 225883, &["meropenem"]),
    ("Cefazolin", 225850, &["cefazolin"]),
];

pub const ANTIBIOTIC_NAMES_COLUMN: &str = "Antibiotics";
pub const ANTIBIOTIC_SOURCES_COLUMN: &str = "Antibiotic_sources";

/// Hospital tables searched for antibiotic names: (source name, path, column).
pub const ANTIBIOTIC_TEXT_SOURCES: &[(&str, &str, &str)] = &[
    ("prescriptions", "hosp/prescriptions.csv", "drug"),
    ("pharmacy", "hosp/pharmacy.csv", "medication"),
    ("emar", "hosp/emar.csv", "medication"),
    ("microbiologyevents", "hosp/microbiologyevents.csv", "ab_name"),
];

pub fn dose_column(vasopressor: &str) -> String {
    format!("{vasopressor}_dose")
}

fn item_features(table: &[(&str, &[i64])]) -> Vec<FeatureDefinition> {
    table
        .iter()
        .map(|(name, ids)| FeatureDefinition::min_max(*name, CodeSet::items(ids.iter().copied())))
        .collect()
}

fn antibiotic_summary() -> ExposureSummary {
    ExposureSummary {
        names_column: ANTIBIOTIC_NAMES_COLUMN.to_string(),
        sources_column: ANTIBIOTIC_SOURCES_COLUMN.to_string(),
    }
}

pub fn lab_family() -> FeatureFamily {
    let source = SourceTable::new("labevents", "hosp/labevents.csv", "itemid")
        .with_time_column("charttime")
        .with_value_column("valuenum");
    FeatureFamily::new("labs", source, CodeKind::Item).with_features(item_features(LAB_FEATURES))
}

pub fn chart_family() -> FeatureFamily {
    let source = SourceTable::new("chartevents", "icu/chartevents.csv", "itemid")
        .with_time_column("charttime")
        .with_value_column("valuenum");
    FeatureFamily::new("vitals", source, CodeKind::Item)
        .with_features(item_features(CHART_FEATURES))
}

pub fn urine_output_family() -> FeatureFamily {
    let source = SourceTable::new("outputevents", "icu/outputevents.csv", "itemid")
        .with_time_column("charttime")
        .with_value_column("value");
    FeatureFamily::new("urine_output", source, CodeKind::Item).with_feature(
        FeatureDefinition::min_max("Urine_Output", CodeSet::items(URINE_OUTPUT_ITEMS.iter().copied())),
    )
}

pub fn diagnosis_family() -> FeatureFamily {
    let source = SourceTable::new("diagnoses_icd", "hosp/diagnoses_icd.csv", "icd_code");
    let mut family = FeatureFamily::new("diagnoses", source, CodeKind::Hierarchical)
        .with_window(WindowPolicy::Unbounded)
        .with_values(ValuePolicy::Ignore);
    for (name, prefixes) in INFECTION_PREFIXES {
        family = family.with_feature(FeatureDefinition::presence(
            *name,
            CodeSet::prefixes(prefixes.iter().copied()),
        ));
    }
    family.with_feature(FeatureDefinition::presence(
        "Diabetes",
        CodeSet::prefixes(DIABETES_PREFIXES.iter().copied()),
    ))
}

pub fn dialysis_family() -> FeatureFamily {
    let source = SourceTable::new("procedures_icd", "hosp/procedures_icd.csv", "icd_code");
    FeatureFamily::new("dialysis", source, CodeKind::Hierarchical)
        .with_window(WindowPolicy::Unbounded)
        .with_values(ValuePolicy::Ignore)
        .with_feature(FeatureDefinition::presence(
            "Dialysis",
            CodeSet::prefixes(DIALYSIS_PREFIXES.iter().copied()),
        ))
}

pub fn ventilation_family() -> FeatureFamily {
    let source = SourceTable::new("procedureevents", "icu/procedureevents.csv", "itemid");
    FeatureFamily::new("ventilation", source, CodeKind::Item)
        .with_window(WindowPolicy::Unbounded)
        .with_values(ValuePolicy::Ignore)
        .with_feature(FeatureDefinition::presence(
            "Mechanical_Ventilation",
            CodeSet::ItemLabels {
                dictionary: VENTILATION_DICTIONARY.to_string(),
                pattern: VENTILATION_LABEL_PATTERN.to_string(),
            },
        ))
}

fn input_events() -> SourceTable {
    SourceTable::new("inputevents", "icu/inputevents.csv", "itemid")
}

pub fn vasopressor_family() -> FeatureFamily {
    let mut family = FeatureFamily::new("vasopressors", input_events(), CodeKind::Item)
        .with_window(WindowPolicy::Unbounded)
        .with_values(ValuePolicy::Ignore);
    for (name, ids) in VASOPRESSORS {
        family = family.with_feature(FeatureDefinition::presence(
            *name,
            CodeSet::items(ids.iter().copied()),
        ));
    }
    family
}

pub fn vasopressor_dose_family() -> FeatureFamily {
    let mut family = FeatureFamily::new(
        "vasopressor_doses",
        input_events().with_value_column("rate"),
        CodeKind::Item,
    )
    .with_window(WindowPolicy::Unbounded)
    .with_values(ValuePolicy::RequirePositive);
    for (name, ids) in VASOPRESSORS {
        family = family.with_feature(FeatureDefinition::max_dose(
            dose_column(name),
            CodeSet::items(ids.iter().copied()),
        ));
    }
    family
}

pub fn icu_antibiotic_family() -> FeatureFamily {
    let mut family = FeatureFamily::new("icu_antibiotics", input_events(), CodeKind::Item)
        .with_window(WindowPolicy::Unbounded)
        .with_values(ValuePolicy::Ignore)
        .with_summary(antibiotic_summary());
    for (name, item, _) in ANTIBIOTICS {
        family = family.with_feature(FeatureDefinition::presence(*name, CodeSet::items([*item])));
    }
    family
}

pub fn antibiotic_text_families() -> Vec<FeatureFamily> {
    ANTIBIOTIC_TEXT_SOURCES
        .iter()
        .map(|(source_name, path, column)| {
            let mut family = FeatureFamily::new(
                format!("{source_name}_antibiotics"),
                SourceTable::new(*source_name, *path, *column),
                CodeKind::DrugName,
            )
            .with_window(WindowPolicy::Unbounded)
            .with_values(ValuePolicy::Ignore)
            .with_summary(antibiotic_summary());
            for (name, _, targets) in ANTIBIOTICS {
                family = family.with_feature(FeatureDefinition::presence(
                    *name,
                    CodeSet::names(targets.iter().copied()),
                ));
            }
            family
        })
        .collect()
}

/// Every built-in family in extraction order.
pub fn families() -> Vec<FeatureFamily> {
    let mut families = vec![
        lab_family(),
        chart_family(),
        urine_output_family(),
        diagnosis_family(),
        dialysis_family(),
        ventilation_family(),
        vasopressor_family(),
        vasopressor_dose_family(),
        icu_antibiotic_family(),
    ];
    families.extend(antibiotic_text_families());
    families
}
