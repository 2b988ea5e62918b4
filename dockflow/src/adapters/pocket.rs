//! Binding-site prediction and box-center extraction.
//!
//! Runs P2Rank over a fixed structure, keeps the top three predicted
//! pockets, writes each pocket's residues out as a PDB subset, and averages
//! the top pocket's atom coordinates into the receptor's docking box center.
//! Each invocation writes a private `center_<key>.txt`; the coordinator
//! merges them into the stage's shared index after the stage commits, so
//! workers never append to a shared file.

use crate::config::ToolPaths;
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// How many predicted pockets to keep per receptor.
const POCKETS_KEPT: usize = 3;

/// Adapter invoking `prank predict` per fixed structure.
#[derive(Debug, Clone)]
pub struct PocketAdapter {
    prank: String,
}

/// One parsed pocket prediction.
#[derive(Debug, Clone, PartialEq)]
struct PocketPrediction {
    /// The score exactly as printed by the predictor, reused in file names.
    score_text: String,
    score: f64,
    /// Residues as `<chain>_<resseq>` tokens.
    residue_ids: String,
}

impl PocketAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            prank: tools.prank.clone(),
        }
    }

    async fn predict(
        &self,
        request: &ProcessRequest,
        input: &Path,
        tmp_dir: &Path,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let spec = CommandSpec::new(
            &self.prank,
            [
                "predict".to_string(),
                "-f".to_string(),
                input.display().to_string(),
                "-o".to_string(),
                tmp_dir.display().to_string(),
            ],
        );
        run_tool(self.name(), &spec).await?;

        let input_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let csv_path = tmp_dir.join(format!("{input_name}_predictions.csv"));
        let csv_text = std::fs::read_to_string(&csv_path)
            .map_err(|_| ProcessorError::missing_output(self.name(), csv_path.clone()))?;
        let pockets = parse_predictions(&csv_text)
            .map_err(|msg| ProcessorError::output_parse(self.name(), msg))?;
        if pockets.is_empty() {
            return Err(ProcessorError::output_parse(
                self.name(),
                "predictor reported no pockets",
            ));
        }

        let structure = std::fs::read_to_string(input)
            .map_err(|e| ProcessorError::invalid_input(self.name(), e.to_string()))?;

        let mut outputs = Vec::new();
        let mut top_center = None;
        for (rank, pocket) in pockets.iter().take(POCKETS_KEPT).enumerate() {
            let selection = parse_residue_selection(&pocket.residue_ids);
            let subset = extract_pocket(&structure, &selection);
            if subset.is_empty() {
                continue;
            }
            let pocket_path = request
                .output_dir
                .join(format!("pocket_{}_{}.pdb", pocket.score_text, request.key));
            std::fs::write(&pocket_path, &subset)
                .map_err(|e| ProcessorError::spawn(self.name(), e.to_string()))?;
            if rank == 0 {
                top_center = average_coords(&subset);
            }
            outputs.push(pocket_path);
        }

        let Some((x, y, z)) = top_center else {
            return Err(ProcessorError::output_parse(
                self.name(),
                "top pocket has no atoms to center a box on",
            ));
        };

        let center_path = request
            .output_dir
            .join(format!("center_{}.txt", request.key));
        std::fs::write(&center_path, format!("{},{x},{y},{z}\n", request.key))
            .map_err(|e| ProcessorError::spawn(self.name(), e.to_string()))?;
        outputs.insert(0, center_path);

        Ok(ProcessOutcome::with_outputs(outputs)
            .with_entry("pocket_score", serde_json::json!(pockets[0].score)))
    }
}

#[async_trait]
impl ProcessorAdapter for PocketAdapter {
    fn name(&self) -> &str {
        "pocket_prediction"
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("center_{key}.txt"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let input = request
            .inputs
            .first()
            .cloned()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "no fixed structure"))?;

        let tmp_dir = request.output_dir.join(format!(".tmp_{}", request.key));
        std::fs::create_dir_all(&tmp_dir)
            .map_err(|e| ProcessorError::spawn(self.name(), e.to_string()))?;

        let result = self.predict(request, &input, &tmp_dir).await;
        let _ = std::fs::remove_dir_all(&tmp_dir);
        result
    }
}

/// Parses the predictor's CSV: a padded header naming at least `score` and
/// `residue_ids`, one pocket per row, best first.
fn parse_predictions(csv: &str) -> Result<Vec<PocketPrediction>, String> {
    let mut lines = csv.lines();
    let header = lines.next().ok_or("empty predictions file")?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let score_col = columns
        .iter()
        .position(|c| *c == "score")
        .ok_or("no score column")?;
    let residues_col = columns
        .iter()
        .position(|c| *c == "residue_ids")
        .ok_or("no residue_ids column")?;

    let mut pockets = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let (Some(score_text), Some(residue_ids)) =
            (fields.get(score_col), fields.get(residues_col))
        else {
            continue;
        };
        let Ok(score) = score_text.parse::<f64>() else {
            continue;
        };
        pockets.push(PocketPrediction {
            score_text: (*score_text).to_string(),
            score,
            residue_ids: (*residue_ids).to_string(),
        });
    }
    Ok(pockets)
}

/// Splits `A_123 B_45` residue tokens into a per-chain residue-number set.
fn parse_residue_selection(residue_ids: &str) -> HashMap<String, HashSet<i64>> {
    let mut selection: HashMap<String, HashSet<i64>> = HashMap::new();
    for token in residue_ids.split_whitespace() {
        if let Some((chain, resseq)) = token.split_once('_') {
            if let Ok(resseq) = resseq.parse::<i64>() {
                selection.entry(chain.to_string()).or_default().insert(resseq);
            }
        }
    }
    selection
}

/// Keeps the ATOM records whose chain and residue number are selected.
fn extract_pocket(pdb: &str, selection: &HashMap<String, HashSet<i64>>) -> String {
    let mut subset = String::new();
    for line in pdb.lines() {
        if !line.starts_with("ATOM") || line.len() < 54 {
            continue;
        }
        let chain = line[21..22].trim();
        let Ok(resseq) = line[22..26].trim().parse::<i64>() else {
            continue;
        };
        if selection.get(chain).is_some_and(|set| set.contains(&resseq)) {
            subset.push_str(line);
            subset.push('\n');
        }
    }
    if !subset.is_empty() {
        subset.push_str("END\n");
    }
    subset
}

/// Averages ATOM coordinates (fixed PDB columns), rounded to 3 decimals.
fn average_coords(pdb: &str) -> Option<(f64, f64, f64)> {
    let mut sums = [0.0_f64; 3];
    let mut atoms = 0_usize;
    for line in pdb.lines() {
        if !line.starts_with("ATOM") || line.len() < 54 {
            continue;
        }
        let x = line[30..38].trim().parse::<f64>().ok()?;
        let y = line[38..46].trim().parse::<f64>().ok()?;
        let z = line[46..54].trim().parse::<f64>().ok()?;
        sums[0] += x;
        sums[1] += y;
        sums[2] += z;
        atoms += 1;
    }
    if atoms == 0 {
        return None;
    }
    let round3 = |v: f64| (v * 1000.0).round() / 1000.0;
    #[allow(clippy::cast_precision_loss)]
    let n = atoms as f64;
    Some((round3(sums[0] / n), round3(sums[1] / n), round3(sums[2] / n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_PDB: &str = "\
ATOM      1  N   ALA A   1      10.000  20.000  30.000  1.00  0.00           N
ATOM      2  CA  ALA A   1      12.000  22.000  32.000  1.00  0.00           C
ATOM      3  N   GLY B   7       1.000   2.000   3.000  1.00  0.00           N
HETATM    4  O   HOH A  99       0.000   0.000   0.000  1.00  0.00           O
";

    #[test]
    fn test_parse_predictions_padded_header() {
        let csv = "name,   rank,   score, probability, residue_ids\n\
                   pocket1,1,9.11,0.9,A_1 A_2\n\
                   pocket2,2,3.05,0.4,B_7\n";
        let pockets = parse_predictions(csv).unwrap();
        assert_eq!(pockets.len(), 2);
        assert_eq!(pockets[0].score_text, "9.11");
        assert_eq!(pockets[1].residue_ids, "B_7");
    }

    #[test]
    fn test_parse_predictions_missing_column() {
        assert!(parse_predictions("name,rank\npocket1,1\n").is_err());
    }

    #[test]
    fn test_residue_selection_grouped_by_chain() {
        let selection = parse_residue_selection("A_1 A_2 B_7 junk C_x");
        assert_eq!(selection["A"], HashSet::from([1, 2]));
        assert_eq!(selection["B"], HashSet::from([7]));
        assert!(!selection.contains_key("C"));
    }

    #[test]
    fn test_extract_pocket_filters_atoms() {
        let selection = parse_residue_selection("A_1");
        let subset = extract_pocket(SAMPLE_PDB, &selection);
        assert_eq!(subset.lines().count(), 3); // two atoms + END
        assert!(subset.contains("ALA A"));
        assert!(!subset.contains("GLY B"));
    }

    #[test]
    fn test_average_coords() {
        let selection = parse_residue_selection("A_1");
        let subset = extract_pocket(SAMPLE_PDB, &selection);
        assert_eq!(average_coords(&subset), Some((11.0, 21.0, 31.0)));
    }

    #[test]
    fn test_average_coords_empty() {
        assert_eq!(average_coords(""), None);
    }

    #[test]
    fn test_expected_outputs_is_center_file() {
        let adapter = PocketAdapter::new(&ToolPaths::default());
        let outputs = adapter.expected_outputs("1abc", Path::new("/run/pocket"));
        assert_eq!(outputs, vec![PathBuf::from("/run/pocket/center_1abc.txt")]);
    }
}
