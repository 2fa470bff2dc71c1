use serde_json::Value;

/// Fastest expert observed on one (element types, problem sizes) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemWinner {
    pub element_types: String,
    pub bindings: String,
    pub expert: String,
    pub expert_index: Option<u64>,
    /// Lowering knobs of the winning expert as `key=value` pairs.
    pub lowering: Option<String>,
    pub min_s: f64,
}

fn types_label(value: &Value) -> String {
    let names: Vec<&str> = value
        .as_array()
        .map(|types| types.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    format!("[{}]", names.join(", "))
}

fn bindings_label(value: &Value) -> String {
    let entries: Vec<String> = value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, extent)| format!("{key}: {extent}"))
                .collect()
        })
        .unwrap_or_default();
    format!("{{{}}}", entries.join(", "))
}

fn lowering_label(value: &Value) -> Option<String> {
    let knobs: Vec<String> = value
        .as_object()?
        .iter()
        .map(|(key, knob)| match knob.as_str() {
            Some(text) => format!("{key}={text}"),
            None => format!("{key}={knob}"),
        })
        .collect();
    Some(knobs.join(" "))
}

fn min_elapsed(trial: &Value) -> Option<f64> {
    trial
        .get("timings")?
        .get("elapsed_s")?
        .as_array()?
        .iter()
        .filter_map(Value::as_f64)
        .reduce(f64::min)
}

/// Picks the expert with the smallest single-iteration time for every problem,
/// in the order problems first appear. Trials without timings (dry runs) are
/// ignored; `None` means the report is not a sweep report.
pub fn fastest_per_problem(report_json: &str) -> Option<Vec<ProblemWinner>> {
    let parsed: Value = serde_json::from_str(report_json).ok()?;
    let trials = parsed.get("trials")?.as_array()?;
    let mut winners: Vec<ProblemWinner> = Vec::new();

    for trial in trials {
        let Some(min_s) = min_elapsed(trial) else {
            continue;
        };
        let element_types = types_label(trial.get("element_types")?);
        let bindings = bindings_label(trial.get("bindings")?);
        let expert = trial.get("expert")?.as_str()?.to_string();
        let expert_index = trial.get("expert_index").and_then(Value::as_u64);
        let lowering = trial.get("lowering").and_then(lowering_label);

        match winners
            .iter_mut()
            .find(|w| w.element_types == element_types && w.bindings == bindings)
        {
            Some(winner) if min_s < winner.min_s => {
                winner.expert = expert;
                winner.expert_index = expert_index;
                winner.lowering = lowering;
                winner.min_s = min_s;
            }
            Some(_) => {}
            None => winners.push(ProblemWinner {
                element_types,
                bindings,
                expert,
                expert_index,
                lowering,
                min_s,
            }),
        }
    }

    Some(winners)
}

pub fn kernel_name(report_json: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(report_json).ok()?;
    Some(parsed.get("kernel")?.as_str()?.to_string())
}
