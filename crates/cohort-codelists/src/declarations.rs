//! Codelists declared by the study.
//!
//! Each declaration names a codelist the way rules reference it and says
//! where its codes come from. CSV files are resolved against the codelist
//! directory at load time.

use std::fmt;
use std::path::{Path, PathBuf};

use cohort_model::{Codelist, CodingSystem};
use serde::Serialize;

use crate::csv_utils::codelist_from_csv;
use crate::error::{CodelistError, Result};

/// Where a declared codelist's codes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CodelistSource {
    Inline {
        codes: Vec<String>,
    },
    Csv {
        file: PathBuf,
        column: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category_column: Option<String>,
    },
}

impl fmt::Display for CodelistSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodelistSource::Inline { .. } => f.write_str("inline"),
            CodelistSource::Csv {
                file,
                column,
                category_column: Some(category),
            } => write!(f, "{} [{column}, {category}]", file.display()),
            CodelistSource::Csv { file, column, .. } => {
                write!(f, "{} [{column}]", file.display())
            }
        }
    }
}

/// A named codelist and its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodelistDeclaration {
    pub name: String,
    pub system: CodingSystem,
    #[serde(flatten)]
    pub source: CodelistSource,
}

impl CodelistDeclaration {
    pub fn inline(name: &str, system: CodingSystem, codes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            system,
            source: CodelistSource::Inline {
                codes: codes.iter().map(|code| (*code).to_string()).collect(),
            },
        }
    }

    pub fn csv(name: &str, file: &str, system: CodingSystem, column: &str) -> Self {
        Self {
            name: name.to_string(),
            system,
            source: CodelistSource::Csv {
                file: PathBuf::from(file),
                column: column.to_string(),
                category_column: None,
            },
        }
    }

    pub fn with_category_column(mut self, category_column: &str) -> Self {
        if let CodelistSource::Csv {
            category_column: slot,
            ..
        } = &mut self.source
        {
            *slot = Some(category_column.to_string());
        }
        self
    }

    /// Path of the backing CSV file under `dir`, if any.
    pub fn file_path(&self, dir: &Path) -> Option<PathBuf> {
        match &self.source {
            CodelistSource::Csv { file, .. } => Some(dir.join(file)),
            CodelistSource::Inline { .. } => None,
        }
    }

    /// Build the codelist, reading CSV sources relative to `dir`.
    pub fn load(&self, dir: &Path) -> Result<Codelist> {
        match &self.source {
            CodelistSource::Inline { codes } => {
                codelist(self.system, codes.as_slice()).map_err(|err| match err {
                    CodelistError::Invalid { source, .. } => CodelistError::Invalid {
                        name: self.name.clone(),
                        source,
                    },
                    other => other,
                })
            }
            CodelistSource::Csv {
                file,
                column,
                category_column,
            } => codelist_from_csv(
                &dir.join(file),
                self.system,
                column,
                category_column.as_deref(),
            ),
        }
    }
}

/// Build a codelist from inline codes.
pub fn codelist<S: AsRef<str>>(system: CodingSystem, codes: &[S]) -> Result<Codelist> {
    Codelist::new(system, codes).map_err(|source| CodelistError::Invalid {
        name: "inline".to_string(),
        source,
    })
}

/// Every codelist the study definitions reference, in declaration order.
pub fn study_codelists() -> Vec<CodelistDeclaration> {
    use CodingSystem::{Ctv3, Icd10, Snomed};

    vec![
        // Outcomes
        CodelistDeclaration::inline("covid_codelist", Icd10, &["U071", "U072"]),
        CodelistDeclaration::inline("covid_positive_test_codes", Ctv3, &["XaLTE", "Y20d1"]),
        // Demographics
        CodelistDeclaration::csv(
            "clear_smoking_codes",
            "opensafely-smoking-clear.csv",
            Ctv3,
            "CTV3Code",
        )
        .with_category_column("Category"),
        CodelistDeclaration::csv(
            "unclear_smoking_codes",
            "opensafely-smoking-unclear.csv",
            Ctv3,
            "CTV3Code",
        )
        .with_category_column("Category"),
        CodelistDeclaration::csv("ethnicity_codes", "opensafely-ethnicity.csv", Ctv3, "Code")
            .with_category_column("Grouping_6"),
        CodelistDeclaration::csv("ethnicity_codes_16", "opensafely-ethnicity.csv", Ctv3, "Code")
            .with_category_column("Grouping_16"),
        // Clinical measurements
        CodelistDeclaration::inline("systolic_blood_pressure_codes", Ctv3, &["2469."]),
        CodelistDeclaration::inline("diastolic_blood_pressure_codes", Ctv3, &["246A."]),
        CodelistDeclaration::inline("creatinine_codes", Ctv3, &["XE2q5"]),
        CodelistDeclaration::inline("hba1c_new_codes", Ctv3, &["XaPbt", "Xaeze", "Xaezd"]),
        CodelistDeclaration::inline("hba1c_old_codes", Ctv3, &["X772q", "XaERo", "XaERp"]),
        // Respiratory
        CodelistDeclaration::csv(
            "asthma_codes",
            "opensafely-asthma-diagnosis.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "pred_codes",
            "opensafely-asthma-oral-prednisolone-medication.csv",
            Snomed,
            "snomed_id",
        ),
        CodelistDeclaration::csv("cf_codes", "opensafely-cystic-fibrosis.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv(
            "other_respiratory_codes",
            "opensafely-other-chronic-respiratory-disease.csv",
            Ctv3,
            "CTV3ID",
        ),
        // Cardiac
        CodelistDeclaration::csv(
            "chronic_cardiac_disease_codes",
            "opensafely-chronic-cardiac-disease.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv("diabetes_codes", "opensafely-diabetes.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv(
            "hypertension_codes",
            "opensafely-hypertension.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "af_codes",
            "opensafely-atrial-fibrillation-or-flutter.csv",
            Ctv3,
            "CTV3Code",
        ),
        CodelistDeclaration::csv(
            "dvt_pe_codes",
            "opensafely-venous-thromboembolic-disease.csv",
            Ctv3,
            "CTV3Code",
        ),
        CodelistDeclaration::csv(
            "pad_surg_codes",
            "opensafely-surgery-for-peripheral-artery-disease.csv",
            Ctv3,
            "CTV3Code",
        ),
        CodelistDeclaration::csv(
            "amputate_codes",
            "opensafely-amputation-of-lower-limb.csv",
            Ctv3,
            "CTV3Code",
        ),
        // Neurological
        CodelistDeclaration::csv("stroke", "opensafely-stroke-updated.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv("dementia", "opensafely-dementia.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv(
            "other_neuro",
            "opensafely-other-neurological-conditions.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "tia",
            "opensafely-transient-ischaemic-attack.csv",
            Ctv3,
            "code",
        ),
        // Cancer
        CodelistDeclaration::csv(
            "lung_cancer_codes",
            "opensafely-lung-cancer.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "haem_cancer_codes",
            "opensafely-haematological-cancer.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "other_cancer_codes",
            "opensafely-cancer-excluding-lung-and-haematological.csv",
            Ctv3,
            "CTV3ID",
        ),
        // Liver, kidney and transplant
        CodelistDeclaration::csv(
            "chronic_liver_disease_codes",
            "opensafely-chronic-liver-disease.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "transplant_kidney_codes",
            "opensafely-kidney-transplant.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "transplant_notkidney_codes",
            "opensafely-other-organ-transplant.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv("dialysis_codes", "opensafely-dialysis.csv", Ctv3, "CTV3ID"),
        // Immunosuppression
        CodelistDeclaration::csv("hiv_codes", "opensafely-hiv.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv(
            "aplastic_codes",
            "opensafely-aplastic-anaemia.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "temp_immune_codes",
            "opensafely-temporary-immunosuppression.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "permanent_immune_codes",
            "opensafely-permanent-immunosuppression.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv("spleen_codes", "opensafely-asplenia.csv", Ctv3, "CTV3ID"),
        CodelistDeclaration::csv(
            "sickle_cell_codes",
            "opensafely-sickle-cell-disease.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "ra_sle_psoriasis_codes",
            "opensafely-ra-sle-psoriasis.csv",
            Ctv3,
            "CTV3ID",
        ),
        CodelistDeclaration::csv(
            "inflammatory_bowel_disease_codes",
            "opensafely-inflammatory-bowel-disease.csv",
            Ctv3,
            "CTV3ID",
        ),
        // Frailty
        CodelistDeclaration::csv("fracture_codes", "opensafely-fragility.csv", Ctv3, "CTV3Code"),
        // Mental illness, learning disability, Down's syndrome and cerebral palsy
        CodelistDeclaration::csv(
            "smi_codes",
            "opensafely-psychosis-schizophrenia-bipolar-affective-disease.csv",
            Ctv3,
            "CTV3Code",
        ),
        CodelistDeclaration::csv(
            "ldr_codes",
            "opensafely-learning-disabilities.csv",
            Ctv3,
            "CTV3Code",
        ),
        CodelistDeclaration::csv(
            "ld_profound_codes",
            "opensafely-severe-and-profound-learning-disability-flags.csv",
            Ctv3,
            "code",
        ),
        CodelistDeclaration::csv("ds_codes", "opensafely-down-syndrome.csv", Ctv3, "code"),
        CodelistDeclaration::csv("cp_codes", "opensafely-cerebral-palsy.csv", Ctv3, "code"),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn declaration_names_are_unique() {
        let declarations = study_codelists();
        let names: BTreeSet<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), declarations.len());
    }

    #[test]
    fn both_ethnicity_groupings_share_one_file() {
        let declarations = study_codelists();
        let dir = Path::new("codelists");
        let six = declarations.iter().find(|d| d.name == "ethnicity_codes").unwrap();
        let sixteen = declarations
            .iter()
            .find(|d| d.name == "ethnicity_codes_16")
            .unwrap();
        assert_eq!(six.file_path(dir), sixteen.file_path(dir));
        assert_ne!(six.source, sixteen.source);
    }

    #[test]
    fn inline_codelists_load_without_a_directory() {
        let covid = CodelistDeclaration::inline("covid_codelist", CodingSystem::Icd10, &["U071", "U072"]);
        let list = covid.load(Path::new("/nonexistent")).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.system(), CodingSystem::Icd10);
    }

    #[test]
    fn inline_duplicate_is_reported_by_name() {
        let broken = CodelistDeclaration::inline("hba1c_new_codes", CodingSystem::Ctv3, &["XaPbt", "XaPbt"]);
        let err = broken.load(Path::new(".")).unwrap_err();
        match err {
            CodelistError::Invalid { name, .. } => assert_eq!(name, "hba1c_new_codes"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn source_display_names_columns() {
        let smoking = CodelistDeclaration::csv(
            "clear_smoking_codes",
            "opensafely-smoking-clear.csv",
            CodingSystem::Ctv3,
            "CTV3Code",
        )
        .with_category_column("Category");
        assert_eq!(
            smoking.source.to_string(),
            "opensafely-smoking-clear.csv [CTV3Code, Category]"
        );
    }
}
