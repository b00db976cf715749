//! Study definitions: an index date, a population and ordered variables.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use cohort_expr::Expr;

use crate::categorise::serialize_expr;
use crate::codelist::CodelistRef;
use crate::error::{ModelError, Result};
use crate::expectations::Expectations;
use crate::query::{OutputShape, Query};
use crate::variable::{OutputColumn, Variable};

/// Name the population filter is known by in dependency checks.
pub const POPULATION: &str = "population";

/// Identifier column that leads every extract.
pub const PATIENT_ID: &str = "patient_id";

/// Inclusion predicate with its own sub-variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateFilter {
    #[serde(serialize_with = "serialize_expr")]
    condition: Expr,
    sub_variables: Vec<Variable>,
}

impl PredicateFilter {
    pub fn new(condition: &str) -> Result<Self> {
        let condition =
            cohort_expr::parse(condition).map_err(|source| ModelError::InvalidCondition {
                label: POPULATION.to_string(),
                source,
            })?;
        Ok(Self {
            condition,
            sub_variables: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_sub_variable(mut self, name: &str, query: impl Into<Query>) -> Self {
        self.sub_variables.push(Variable::new(name, query));
        self
    }

    pub fn sub_variables(&self) -> &[Variable] {
        &self.sub_variables
    }
}

/// Rows an extract is computed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Population {
    /// Every subject in the database.
    All,
    Satisfying(PredicateFilter),
}

impl Population {
    pub fn sub_variables(&self) -> &[Variable] {
        match self {
            Population::All => &[],
            Population::Satisfying(filter) => filter.sub_variables(),
        }
    }

    /// Names outside its own sub-variables the predicate reads.
    pub fn external_references(&self) -> BTreeSet<String> {
        let Population::Satisfying(filter) = self else {
            return BTreeSet::new();
        };
        let local: BTreeSet<&str> = filter
            .sub_variables
            .iter()
            .map(|sub| sub.name.as_str())
            .collect();
        filter
            .condition
            .variables()
            .into_iter()
            .filter(|name| !local.contains(name.as_str()))
            .collect()
    }
}

impl From<PredicateFilter> for Population {
    fn from(filter: PredicateFilter) -> Self {
        Population::Satisfying(filter)
    }
}

/// A rule together with where it sits in the definition.
#[derive(Debug, Clone, Copy)]
pub struct RuleRef<'a> {
    /// Owning entry for sub-variables; `None` at the top level.
    pub parent: Option<&'a str>,
    pub variable: &'a Variable,
}

impl RuleRef<'_> {
    /// Dotted path such as `smoking_status.ever_smoked`.
    pub fn path(&self) -> String {
        match self.parent {
            Some(parent) => format!("{parent}.{}", self.variable.name),
            None => self.variable.name.clone(),
        }
    }
}

/// Codelist reference together with the rule that uses it.
#[derive(Debug, Clone)]
pub struct CodelistUse<'a> {
    pub variable: String,
    pub reference: &'a CodelistRef,
}

/// One step of per-subject evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationStep {
    pub name: String,
    pub parent: Option<String>,
}

impl fmt::Display for EvaluationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{parent}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyDefinition {
    name: String,
    index_date: NaiveDate,
    default_expectations: Expectations,
    population: Population,
    variables: Vec<Variable>,
}

impl StudyDefinition {
    pub fn builder(name: &str, index_date: &str) -> StudyDefinitionBuilder {
        StudyDefinitionBuilder {
            name: name.to_string(),
            index_date: index_date.to_string(),
            default_expectations: Expectations::default(),
            population: None,
            variables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_date(&self) -> NaiveDate {
        self.index_date
    }

    pub fn default_expectations(&self) -> &Expectations {
        &self.default_expectations
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Top-level variables in declared order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// Every rule, sub-variables included: population sub-variables first,
    /// then each top-level variable followed by its sub-variables.
    pub fn rules(&self) -> Vec<RuleRef<'_>> {
        let mut rules: Vec<RuleRef<'_>> = self
            .population
            .sub_variables()
            .iter()
            .map(|variable| RuleRef {
                parent: Some(POPULATION),
                variable,
            })
            .collect();
        for variable in &self.variables {
            rules.push(RuleRef {
                parent: None,
                variable,
            });
            rules.extend(variable.sub_variables().iter().map(|sub| RuleRef {
                parent: Some(variable.name.as_str()),
                variable: sub,
            }));
        }
        rules
    }

    /// Every codelist reference with the path of the rule using it.
    pub fn codelist_refs(&self) -> Vec<CodelistUse<'_>> {
        self.rules()
            .into_iter()
            .flat_map(|rule| {
                let path = rule.path();
                rule.variable
                    .codelist_refs()
                    .into_iter()
                    .map(move |reference| CodelistUse {
                        variable: path.clone(),
                        reference,
                    })
            })
            .collect()
    }

    /// Extract columns: `patient_id`, then each variable in declared order.
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        let mut columns = vec![OutputColumn {
            name: PATIENT_ID.to_string(),
            shape: OutputShape::Numeric,
            date_format: None,
            variable: PATIENT_ID.to_string(),
        }];
        for variable in &self.variables {
            columns.extend(variable.output_columns());
        }
        columns
    }

    /// Order in which a subject's values are computed.
    ///
    /// The population and whatever it depends on come first. Each entry is
    /// preceded by its sub-variables and by the top-level variables its
    /// conditions read; otherwise declared order is kept.
    pub fn evaluation_order(&self) -> Result<Vec<EvaluationStep>> {
        let mut dependencies: HashMap<&str, Vec<String>> = HashMap::new();
        let top_level: HashSet<&str> = self.variables.iter().map(|v| v.name.as_str()).collect();
        let is_node = |name: &str| top_level.contains(name) || name == POPULATION;

        let population_deps = self.population.external_references();
        dependencies.insert(
            POPULATION,
            population_deps.into_iter().filter(|name| is_node(name)).collect(),
        );
        for variable in &self.variables {
            dependencies.insert(
                variable.name.as_str(),
                variable
                    .external_references()
                    .into_iter()
                    .filter(|name| is_node(name))
                    .collect(),
            );
        }

        let mut walk = OrderWalk {
            study: self,
            dependencies: &dependencies,
            done: HashSet::new(),
            stack: Vec::new(),
            steps: Vec::new(),
        };
        walk.visit(POPULATION)?;
        for variable in &self.variables {
            walk.visit(&variable.name)?;
        }
        Ok(walk.steps)
    }

    fn sub_variables_of(&self, name: &str) -> &[Variable] {
        if name == POPULATION {
            return self.population.sub_variables();
        }
        match self.variable(name) {
            Some(variable) => variable.sub_variables(),
            None => &[],
        }
    }
}

struct OrderWalk<'a> {
    study: &'a StudyDefinition,
    dependencies: &'a HashMap<&'a str, Vec<String>>,
    done: HashSet<String>,
    stack: Vec<String>,
    steps: Vec<EvaluationStep>,
}

impl OrderWalk<'_> {
    fn visit(&mut self, name: &str) -> Result<()> {
        if self.done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|entry| entry == name) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(ModelError::DependencyCycle { cycle });
        }
        self.stack.push(name.to_string());
        let dependencies = self.dependencies.get(name).cloned().unwrap_or_default();
        for dependency in &dependencies {
            self.visit(dependency)?;
        }
        self.stack.pop();

        let study = self.study;
        for sub in study.sub_variables_of(name) {
            self.steps.push(EvaluationStep {
                name: sub.name.clone(),
                parent: Some(name.to_string()),
            });
        }
        self.steps.push(EvaluationStep {
            name: name.to_string(),
            parent: None,
        });
        self.done.insert(name.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StudyDefinitionBuilder {
    name: String,
    index_date: String,
    default_expectations: Expectations,
    population: Option<Population>,
    variables: Vec<Variable>,
}

impl StudyDefinitionBuilder {
    #[must_use]
    pub fn default_expectations(mut self, expectations: Expectations) -> Self {
        self.default_expectations = expectations;
        self
    }

    #[must_use]
    pub fn population(mut self, population: impl Into<Population>) -> Self {
        self.population = Some(population.into());
        self
    }

    #[must_use]
    pub fn variable(mut self, name: &str, query: impl Into<Query>) -> Self {
        self.variables.push(Variable::new(name, query));
        self
    }

    /// Check the declarations and produce the definition.
    ///
    /// Reports the first problem found: a malformed index date, a missing
    /// population, a repeated variable name, or a sub-variable that is
    /// nested, repeated or shadows a top-level variable.
    pub fn build(self) -> Result<StudyDefinition> {
        let index_date = NaiveDate::parse_from_str(self.index_date.trim(), "%Y-%m-%d")
            .map_err(|_| ModelError::InvalidDateExpr {
                input: self.index_date.clone(),
            })?;
        let population = self.population.ok_or_else(|| ModelError::MissingPopulation {
            study: self.name.clone(),
        })?;

        let mut names = HashSet::new();
        for variable in &self.variables {
            if variable.name == POPULATION
                || variable.name == PATIENT_ID
                || !names.insert(variable.name.as_str())
            {
                return Err(ModelError::DuplicateVariable {
                    name: variable.name.clone(),
                });
            }
        }

        check_sub_variables(POPULATION, population.sub_variables(), &names)?;
        for variable in &self.variables {
            check_sub_variables(&variable.name, variable.sub_variables(), &names)?;
        }

        Ok(StudyDefinition {
            name: self.name,
            index_date,
            default_expectations: self.default_expectations,
            population,
            variables: self.variables,
        })
    }
}

fn check_sub_variables(parent: &str, subs: &[Variable], top_level: &HashSet<&str>) -> Result<()> {
    let mut local = HashSet::new();
    for sub in subs {
        if top_level.contains(sub.name.as_str()) {
            return Err(ModelError::SubVariableShadowsColumn {
                parent: parent.to_string(),
                name: sub.name.clone(),
            });
        }
        if matches!(sub.query, Query::Categorised(_)) {
            return Err(ModelError::NestedCategorisation {
                parent: parent.to_string(),
                name: sub.name.clone(),
            });
        }
        if !local.insert(sub.name.as_str()) {
            return Err(ModelError::in_variable(
                parent,
                ModelError::DuplicateVariable {
                    name: sub.name.clone(),
                },
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patients::{self, InWindow};

    fn flag(codelist: &str) -> Query {
        patients::with_these_clinical_events(codelist)
            .on_or_before("index_date")
            .unwrap()
            .into()
    }

    fn small_study() -> StudyDefinition {
        StudyDefinition::builder("small", "2020-03-01")
            .population(
                patients::satisfying("age >= 18 AND registered")
                    .unwrap()
                    .with_sub_variable(
                        "registered",
                        patients::registered_with_one_practice_between(
                            "index_date - 1 year",
                            "index_date",
                        )
                        .unwrap(),
                    ),
            )
            .variable(
                "status",
                patients::categorised_as(&[("A", "a_flag"), ("B", "DEFAULT")])
                    .unwrap()
                    .with_sub_variable("a_flag", flag("a_codes")),
            )
            .variable("age", patients::age_as_of("index_date").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn population_dependencies_come_first() {
        let order: Vec<String> = small_study()
            .evaluation_order()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        insta::assert_debug_snapshot!(order, @r#"
        [
            "age",
            "population.registered",
            "population",
            "status.a_flag",
            "status",
        ]
        "#);
    }

    #[test]
    fn cycles_are_reported() {
        let study = StudyDefinition::builder("cyclic", "2020-03-01")
            .population(patients::all())
            .variable(
                "a",
                patients::categorised_as(&[("1", "b = '1'"), ("0", "DEFAULT")]).unwrap(),
            )
            .variable(
                "b",
                patients::categorised_as(&[("1", "a = '1'"), ("0", "DEFAULT")]).unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(
            study.evaluation_order().unwrap_err(),
            ModelError::DependencyCycle {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn rejects_shadowing_and_nesting() {
        let shadowing = StudyDefinition::builder("s", "2020-03-01")
            .population(patients::all())
            .variable("a_flag", flag("a_codes"))
            .variable(
                "status",
                patients::categorised_as(&[("A", "a_flag"), ("B", "DEFAULT")])
                    .unwrap()
                    .with_sub_variable("a_flag", flag("a_codes")),
            )
            .build();
        assert!(matches!(
            shadowing,
            Err(ModelError::SubVariableShadowsColumn { .. })
        ));

        let nested = StudyDefinition::builder("s", "2020-03-01")
            .population(patients::all())
            .variable(
                "status",
                patients::categorised_as(&[("A", "inner = 'x'"), ("B", "DEFAULT")])
                    .unwrap()
                    .with_sub_variable(
                        "inner",
                        patients::categorised_as(&[("x", "DEFAULT")]).unwrap(),
                    ),
            )
            .build();
        assert!(matches!(nested, Err(ModelError::NestedCategorisation { .. })));
    }

    #[test]
    fn rejects_duplicates_and_missing_population() {
        let duplicate = StudyDefinition::builder("s", "2020-03-01")
            .population(patients::all())
            .variable("sex", patients::sex())
            .variable("sex", patients::sex())
            .build();
        assert_eq!(
            duplicate.unwrap_err(),
            ModelError::DuplicateVariable {
                name: "sex".to_string()
            }
        );

        let missing = StudyDefinition::builder("s", "2020-03-01")
            .variable("sex", patients::sex())
            .build();
        assert!(matches!(missing, Err(ModelError::MissingPopulation { .. })));

        let bad_date = StudyDefinition::builder("s", "2020-13-01")
            .population(patients::all())
            .build();
        assert!(matches!(bad_date, Err(ModelError::InvalidDateExpr { .. })));
    }

    #[test]
    fn rules_include_sub_variables_with_paths() {
        let study = small_study();
        let paths: Vec<String> = study.rules().iter().map(RuleRef::path).collect();
        assert_eq!(
            paths,
            vec!["population.registered", "status", "status.a_flag", "age"]
        );
        let uses = study.codelist_refs();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].variable, "status.a_flag");
    }
}
