//! Key split planning
//!
//! Turns a reduced key expression into an ordered list of [`KeySplitStep`]s.
//! Steps that share a split ID are alternatives for one key share; steps with
//! distinct split IDs are independent shares, all of which are needed to
//! rebuild the key. An empty split ID only ever appears in a single-step plan.

use crate::error::Error;
use crate::expression::ReducedExpression;
use crate::granter::Granter;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// One `(kas, split_id)` directive of a key split plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySplitStep {
    pub kas: String,
    pub split_id: String,
}

impl KeySplitStep {
    pub fn new(kas: impl Into<String>, split_id: impl Into<String>) -> Self {
        Self {
            kas: kas.into(),
            split_id: split_id.into(),
        }
    }
}

/// Fresh random split ID
pub fn uuid_split_id() -> String {
    Uuid::new_v4().to_string()
}

/// Map a reduced expression onto split steps.
///
/// When the reduction is empty the key is split across `default_kas`
/// instead. `gen_split_id` is called once per share, in plan order.
pub fn plan_reduced<F>(
    reduced: &ReducedExpression,
    default_kas: &[String],
    mut gen_split_id: F,
) -> Result<Vec<KeySplitStep>, Error>
where
    F: FnMut() -> String,
{
    if reduced.is_empty() {
        return match default_kas {
            [] => Err(Error::MissingDefault),
            [only] => Ok(vec![KeySplitStep::new(only.clone(), "")]),
            defaults => Ok(defaults
                .iter()
                .map(|kas| KeySplitStep::new(kas.clone(), gen_split_id()))
                .collect()),
        };
    }

    let total = reduced.len();
    let mut steps = Vec::with_capacity(total);
    for disjunction in reduced.disjunctions() {
        let split_id = if total > 1 {
            gen_split_id()
        } else {
            String::new()
        };
        for kas in disjunction.kases() {
            steps.push(KeySplitStep::new(kas.clone(), split_id.clone()));
        }
    }
    Ok(steps)
}

impl Granter {
    /// Compute the key split plan for this granter's policy.
    pub fn plan<F>(&self, default_kas: &[String], gen_split_id: F) -> Result<Vec<KeySplitStep>, Error>
    where
        F: FnMut() -> String,
    {
        let attributes = self.attribute_boolean();
        let keyed = self.keyed_expression(&attributes)?;
        let reduced = keyed.reduce();
        debug!(
            attributes = %attributes,
            keyed = %keyed,
            reduced = %reduced,
            "reduced key expression"
        );

        let steps = plan_reduced(&reduced, default_kas, gen_split_id)?;
        debug!(steps = steps.len(), "planned key split");
        Ok(steps)
    }
}
