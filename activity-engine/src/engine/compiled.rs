//! Activity schemas prepared for repeated computation

use log::warn;

use super::graph::DependencyGraph;
use crate::config::EngineConfig;
use crate::formula::{Formula, FormulaError, parse_formula};
use crate::schema::{Activity, FieldDefinition, FieldId, SchemaField};

/// How a calculated field is resolved in every period
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Evaluate(Formula),
    /// Known to fail before any value is seen (syntax, cycle)
    Fail(FormulaError),
}

/// A calculated field in evaluation order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedField {
    pub field: FieldId,
    pub step: Step,
}

/// An activity with formulas parsed and evaluation order fixed
///
/// Immutable once built, so one compiled schema can serve many records.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    activity: Activity,
    config: EngineConfig,
    /// Active fields in display order
    fields: Vec<FieldDefinition>,
    plan: Vec<PlannedField>,
    graph: DependencyGraph,
}

impl CompiledSchema {
    pub fn compile(activity: &Activity, config: &EngineConfig) -> Self {
        let fields: Vec<FieldDefinition> = activity.active_fields().into_iter().cloned().collect();

        let parsed: Vec<(FieldId, Result<Formula, FormulaError>)> = fields
            .iter()
            .filter_map(|f| f.formula().map(|source| (f.name.clone(), parse_limited(source, config))))
            .collect();

        let graph = DependencyGraph::build(
            parsed
                .iter()
                .map(|(id, formula)| {
                    let references = match formula {
                        Ok(formula) => formula.references().into_iter().cloned().collect(),
                        Err(_) => Vec::new(),
                    };
                    (id.clone(), references)
                })
                .collect(),
        );

        let (resolved, remaining) = match graph.topological_sort() {
            Ok(order) => (order, Vec::new()),
            Err(e) => {
                warn!("Activity '{}': {}", activity.name, e);
                (e.resolved, e.remaining)
            }
        };

        let mut plan: Vec<PlannedField> = resolved
            .into_iter()
            .filter_map(|id| {
                let (_, formula) = parsed.iter().find(|(p, _)| *p == id)?;
                let step = match formula {
                    Ok(formula) => Step::Evaluate(formula.clone()),
                    Err(e) => Step::Fail(e.clone()),
                };
                Some(PlannedField { field: id, step })
            })
            .collect();

        let cycles = graph.cycles();
        for id in &remaining {
            let step = match cycles.iter().find(|c| c.contains(id)) {
                Some(cycle) => Step::Fail(FormulaError::cycle(cycle)),
                None => {
                    let blocked_by = graph
                        .dependencies(id)
                        .into_iter()
                        .find(|d| remaining.contains(d))
                        .map(|d| d.to_string())
                        .unwrap_or_default();
                    Step::Fail(FormulaError::DependencyFailed { field: blocked_by })
                }
            };
            plan.push(PlannedField {
                field: id.clone(),
                step,
            });
        }

        CompiledSchema {
            activity: activity.clone(),
            config: config.clone(),
            fields,
            plan,
            graph,
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active fields in display order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| &f.name == id)
    }

    /// Calculated fields in evaluation order
    pub fn plan(&self) -> &[PlannedField] {
        &self.plan
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

fn parse_limited(source: &str, config: &EngineConfig) -> Result<Formula, FormulaError> {
    let length = source.chars().count();
    if length > config.max_formula_length {
        return Err(FormulaError::syntax(
            format!(
                "formula is {} characters long, the limit is {}",
                length, config.max_formula_length
            ),
            config.max_formula_length,
        ));
    }
    parse_formula(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn id(name: &str) -> FieldId {
        FieldId::parse(name).unwrap()
    }

    fn plan_of(schema: &CompiledSchema) -> Vec<(&str, &Step)> {
        schema
            .plan()
            .iter()
            .map(|p| (p.field.as_str(), &p.step))
            .collect()
    }

    #[test]
    fn test_plan_follows_references() {
        // Not a savable schema, but the engine must still order it
        let activity = Activity::plain(
            1,
            "Chain",
            vec![
                FieldDefinition::calculated(id("Total"), "[Net] + [Tax]").with_order(1),
                FieldDefinition::calculated(id("Tax"), "[Net] * 0,22").with_order(2),
                FieldDefinition::calculated(id("Net"), "[Gross] / 1,22").with_order(3),
                FieldDefinition::new(id("Gross"), DataType::Decimal),
            ],
        );
        let schema = CompiledSchema::compile(&activity, &EngineConfig::default());
        let order: Vec<&str> = schema.plan().iter().map(|p| p.field.as_str()).collect();
        assert_eq!(order, vec!["Net", "Tax", "Total"]);
        assert!(schema.plan().iter().all(|p| matches!(p.step, Step::Evaluate(_))));
        assert_eq!(schema.fields().len(), 4);
    }

    #[test]
    fn test_cycle_members_and_dependents_fail() {
        let activity = Activity::plain(
            1,
            "Cycle",
            vec![
                FieldDefinition::calculated(id("A"), "[B] + 1"),
                FieldDefinition::calculated(id("B"), "[A] + 1"),
                FieldDefinition::calculated(id("C"), "[A] * 2"),
                FieldDefinition::calculated(id("D"), "[X] * 2"),
                FieldDefinition::new(id("X"), DataType::Decimal),
            ],
        );
        let schema = CompiledSchema::compile(&activity, &EngineConfig::default());
        let plan = plan_of(&schema);

        assert_eq!(plan[0].0, "D");
        assert!(matches!(plan[0].1, Step::Evaluate(_)));

        let cycle = FormulaError::CyclicDependency {
            cycle: vec!["A".into(), "B".into()],
        };
        assert_eq!(plan[1], ("A", &Step::Fail(cycle.clone())));
        assert_eq!(plan[2], ("B", &Step::Fail(cycle)));
        assert_eq!(
            plan[3],
            (
                "C",
                &Step::Fail(FormulaError::DependencyFailed { field: "A".into() })
            )
        );
    }

    #[test]
    fn test_parse_errors_and_length_limit() {
        let activity = Activity::plain(
            1,
            "Broken",
            vec![
                FieldDefinition::calculated(id("Bad"), "[A] +"),
                FieldDefinition::calculated(id("Long"), "[A] + [A] + [A]"),
                FieldDefinition::new(id("A"), DataType::Decimal),
            ],
        );
        let config = EngineConfig::builder().max_formula_length(10).build();
        let schema = CompiledSchema::compile(&activity, &config);

        for planned in schema.plan() {
            assert!(matches!(planned.step, Step::Fail(FormulaError::Syntax { .. })));
        }
    }

    #[test]
    fn test_inactive_fields_excluded() {
        let mut hidden = FieldDefinition::calculated(id("Old"), "[A] * 3");
        hidden.is_active = false;
        let activity = Activity::plain(
            1,
            "Inactive",
            vec![hidden, FieldDefinition::new(id("A"), DataType::Decimal)],
        );
        let schema = CompiledSchema::compile(&activity, &EngineConfig::default());
        assert!(schema.plan().is_empty());
        assert!(schema.field(&id("old")).is_none());
        assert!(schema.graph().is_empty());
    }
}
