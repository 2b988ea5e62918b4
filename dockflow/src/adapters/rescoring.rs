//! Pose rescoring: a second scoring pass over docking's successful output.
//!
//! Runs an external rescoring model over each (receptor, docked pose) pair,
//! then combines the docking engine's own free-energy predictions (parsed
//! from the pose file's remark lines) with the rescorer's table into one CSV
//! per pair, 0.5-weighted the way the source pipeline combined them.
//! Docking is never recomputed here.

use crate::config::{DockTool, ToolPaths};
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use crate::registry::split_pair_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Adapter invoking the external rescorer per docked pose.
#[derive(Debug, Clone)]
pub struct RescoringAdapter {
    command: Vec<String>,
    model: Option<PathBuf>,
    engine: DockTool,
    receptors: HashMap<String, PathBuf>,
}

impl RescoringAdapter {
    /// Creates the adapter.
    ///
    /// `receptors` maps receptor keys to their docking-ready PDBQT paths -
    /// the rescorer needs the receptor alongside the pose, and pose
    /// artifacts alone do not carry it.
    #[must_use]
    pub fn new(
        tools: &ToolPaths,
        engine: DockTool,
        receptors: HashMap<String, PathBuf>,
    ) -> Self {
        Self {
            command: tools.rescorer.clone(),
            model: tools.rescorer_model.clone(),
            engine,
            receptors,
        }
    }
}

#[async_trait]
impl ProcessorAdapter for RescoringAdapter {
    fn name(&self) -> &str {
        "rescoring"
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("{key}.csv"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let pose = request
            .inputs
            .first()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "no docked pose"))?;
        let (receptor_key, _) = split_pair_key(&request.key)
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "not a pair key"))?;
        let receptor = self.receptors.get(receptor_key).ok_or_else(|| {
            ProcessorError::invalid_input(
                self.name(),
                format!("no prepared receptor for {receptor_key:?}"),
            )
        })?;
        let program = self
            .command
            .first()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "empty rescorer command"))?;

        let dat = request.output_dir.join(format!("{}.dat", request.key));
        let mut args: Vec<String> = self.command[1..].to_vec();
        args.extend([
            "-r".to_string(),
            receptor.display().to_string(),
            "-l".to_string(),
            pose.display().to_string(),
            "--stype".to_string(),
            "general".to_string(),
        ]);
        if let Some(model) = &self.model {
            args.extend(["--model".to_string(), model.display().to_string()]);
        }
        args.extend(["-o".to_string(), dat.display().to_string()]);
        run_tool(self.name(), &CommandSpec::new(program, args)).await?;

        let pose_text = std::fs::read_to_string(pose)
            .map_err(|e| ProcessorError::invalid_input(self.name(), e.to_string()))?;
        let engine_scores = parse_engine_scores(&pose_text, self.engine);
        let dat_text = std::fs::read_to_string(&dat)
            .map_err(|_| ProcessorError::missing_output(self.name(), dat.clone()))?;
        let rescores = parse_rescore_table(&dat_text);

        if engine_scores.is_empty() || rescores.is_empty() {
            return Err(ProcessorError::output_parse(
                self.name(),
                format!(
                    "no scores to combine ({} engine, {} rescored models)",
                    engine_scores.len(),
                    rescores.len()
                ),
            ));
        }

        let combined = combine_scores(&engine_scores, &rescores);
        let csv_path = request.output_dir.join(format!("{}.csv", request.key));
        std::fs::write(&csv_path, render_score_csv(&combined))
            .map_err(|e| ProcessorError::spawn(self.name(), e.to_string()))?;

        let best = |values: &[f64]| values.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(ProcessOutcome::with_outputs([csv_path])
            .with_entry("best_engine_score", serde_json::json!(best(&engine_scores)))
            .with_entry("best_rescore", serde_json::json!(best(&rescores)))
            .with_entry(
                "best_combined",
                serde_json::json!(best(
                    &combined.iter().map(|row| row.2).collect::<Vec<_>>()
                )),
            ))
    }
}

/// Extracts the docking engine's per-model free-energy predictions from the
/// pose file's remark lines.
fn parse_engine_scores(pose: &str, engine: DockTool) -> Vec<f64> {
    let mut scores = Vec::new();
    for line in pose.lines() {
        let parsed = match engine {
            DockTool::Vina => line
                .starts_with("REMARK VINA RESULT:")
                .then(|| line.split_whitespace().nth(3)?.parse().ok())
                .flatten(),
            DockTool::Idock => line
                .contains("NORMALIZED FREE ENERGY PREDICTED BY IDOCK")
                .then(|| {
                    line.rsplit(':')
                        .next()?
                        .replace("KCAL/MOL", "")
                        .trim()
                        .parse()
                        .ok()
                })
                .flatten(),
        };
        if let Some(score) = parsed {
            scores.push(score);
        }
    }
    scores
}

/// Parses the rescorer's whitespace-separated table: header line first, the
/// combined score in the fifth column.
fn parse_rescore_table(dat: &str) -> Vec<f64> {
    dat.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(4)?.parse().ok())
        .collect()
}

/// Zips per-model scores into `(engine, rescore, combined)` rows.
fn combine_scores(engine: &[f64], rescore: &[f64]) -> Vec<(f64, f64, f64)> {
    engine
        .iter()
        .zip(rescore)
        .map(|(&e, &r)| (e, r, (e + r) * 0.5))
        .collect()
}

fn render_score_csv(rows: &[(f64, f64, f64)]) -> String {
    let mut csv = String::from("MODEL,engine_score,rescore,combined\n");
    for (idx, (engine, rescore, combined)) in rows.iter().enumerate() {
        csv.push_str(&format!("MODEL_{},{engine},{rescore},{combined}\n", idx + 1));
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IDOCK_POSE: &str = "\
REMARK 901 NORMALIZED FREE ENERGY PREDICTED BY IDOCK:  -9.35 KCAL/MOL
ATOM      1  C   LIG A   1       0.000   0.000   0.000
REMARK 901 NORMALIZED FREE ENERGY PREDICTED BY IDOCK:  -8.10 KCAL/MOL
";

    const VINA_POSE: &str = "\
REMARK VINA RESULT:    -7.5      0.000      0.000
ATOM      1  C   LIG A   1       0.000   0.000   0.000
REMARK VINA RESULT:    -6.9      1.234      2.345
";

    #[test]
    fn test_parse_idock_scores() {
        assert_eq!(parse_engine_scores(IDOCK_POSE, DockTool::Idock), vec![-9.35, -8.10]);
    }

    #[test]
    fn test_parse_vina_scores() {
        assert_eq!(parse_engine_scores(VINA_POSE, DockTool::Vina), vec![-7.5, -6.9]);
    }

    #[test]
    fn test_engine_mismatch_yields_nothing() {
        assert!(parse_engine_scores(VINA_POSE, DockTool::Idock).is_empty());
    }

    #[test]
    fn test_parse_rescore_table_skips_header_and_junk() {
        let dat = "id pose a b score\nm1 p1 0 0 -1.5\nbad line\nm2 p2 0 0 -2.0\n";
        assert_eq!(parse_rescore_table(dat), vec![-1.5, -2.0]);
    }

    #[test]
    fn test_combine_scores_half_weighted() {
        let rows = combine_scores(&[-9.0, -8.0], &[-1.0]);
        assert_eq!(rows, vec![(-9.0, -1.0, -5.0)]);
    }

    #[test]
    fn test_render_score_csv() {
        let csv = render_score_csv(&[(-9.0, -1.0, -5.0)]);
        assert_eq!(csv, "MODEL,engine_score,rescore,combined\nMODEL_1,-9,-1,-5\n");
    }

    #[test]
    fn test_expected_outputs_keyed_by_pair() {
        let adapter =
            RescoringAdapter::new(&ToolPaths::default(), DockTool::Idock, HashMap::new());
        let outputs = adapter.expected_outputs("1abc__L1", Path::new("/run/rescoring"));
        assert_eq!(outputs, vec![PathBuf::from("/run/rescoring/1abc__L1.csv")]);
    }
}
