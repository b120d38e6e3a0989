mod config;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use config::{ChamberConfig, Config, SourceKind};
use lineage_rs::{
    LedgerWriter, LineageBuilder, LineageOutput, LocalLabel, MaskCorrespondence, MaskRecord,
    RelabeledVolume, SegmentationStack, TableCorrespondence, Transition,
};
use ndarray::Array3;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "lineage.toml".to_string());
    let config = Config::load(&path).context("Failed to load configuration")?;
    info!("Configuration loaded from {}", path);

    run(&config)
}

/// Build every chamber, then write the volumes and the combined ledger.
/// Nothing reaches disk unless all chambers succeed.
fn run(config: &Config) -> Result<()> {
    if config.chambers.is_empty() {
        bail!("No chambers configured");
    }

    let builder = LineageBuilder::new(config.builder.clone());
    let mut outputs = Vec::with_capacity(config.chambers.len());
    for (index, chamber) in config.chambers.iter().enumerate() {
        info!("Tracking chamber {} from {}", index, chamber.segmentation.display());
        let output = build_chamber(&builder, config.source, chamber)
            .with_context(|| format!("Failed to reconstruct lineages for chamber {index}"))?;
        info!(
            "Chamber {}: {} occurrences, {} tracks, {} lineages",
            index,
            output.table.len(),
            output.table.num_tracks(),
            output.table.num_lineages()
        );
        outputs.push(output);
    }

    for (chamber, output) in config.chambers.iter().zip(&outputs) {
        write_volume(&chamber.volume, &output.volume)?;
    }

    let mut options = config.ledger_options.clone();
    options.chamber |= config.chambers.len() > 1;
    create_parent(&config.ledger)?;
    let mut ledger = LedgerWriter::from_path(&config.ledger, options)
        .with_context(|| format!("Failed to create {}", config.ledger.display()))?;
    for (index, output) in outputs.iter().enumerate() {
        ledger.write_chamber(index, &output.table)?;
    }
    ledger.flush()?;
    info!("Ledger written to {}", config.ledger.display());
    Ok(())
}

fn build_chamber(
    builder: &LineageBuilder,
    kind: SourceKind,
    chamber: &ChamberConfig,
) -> Result<LineageOutput> {
    let stack = load_stack(&chamber.segmentation)?;
    let output = match kind {
        SourceKind::Table => {
            let source = load_transitions(&chamber.correspondence)?;
            builder.build(&stack, &source)?
        }
        SourceKind::Masks => {
            let source = load_masks(&stack, &chamber.correspondence)?;
            builder.build(&stack, &source)?
        }
    };
    Ok(output)
}

fn load_stack(path: &Path) -> Result<SegmentationStack> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let labels: Array3<LocalLabel> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse segmentation {}", path.display()))?;
    Ok(SegmentationStack::new(labels))
}

fn load_transitions(path: &Path) -> Result<TableCorrespondence> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let transitions = reader
        .deserialize::<Transition>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse transitions {}", path.display()))?;
    Ok(TableCorrespondence::from_transitions(transitions)?)
}

fn load_masks<'a>(stack: &'a SegmentationStack, path: &Path) -> Result<MaskCorrespondence<'a>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records: Vec<MaskRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse daughter masks {}", path.display()))?;
    Ok(MaskCorrespondence::from_records(stack, records)?)
}

fn write_volume(path: &Path, volume: &RelabeledVolume) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, volume)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_rs::LedgerOptions;
    use ndarray::array;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn chamber(dir: &Path, name: &str, links: &str) -> ChamberConfig {
        let segmentation = dir.join(format!("{name}_seg.json"));
        let labels: Array3<LocalLabel> = array![[[1, 0]], [[1, 0]]];
        fs::write(&segmentation, serde_json::to_string(&labels).unwrap()).unwrap();
        let correspondence = dir.join(format!("{name}_links.csv"));
        fs::write(&correspondence, format!("frame,mother,child\n{links}\n")).unwrap();
        ChamberConfig {
            segmentation,
            correspondence,
            volume: dir.join("out").join(format!("{name}.json")),
        }
    }

    fn config(ledger: PathBuf, chambers: Vec<ChamberConfig>) -> Config {
        Config {
            source: SourceKind::Table,
            ledger,
            builder: Default::default(),
            ledger_options: LedgerOptions::default(),
            chambers,
        }
    }

    #[test]
    fn test_run_writes_combined_ledger() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("out").join("combined_lineages.csv");
        let chambers = vec![
            chamber(dir.path(), "c0", "0,1,1"),
            chamber(dir.path(), "c1", "0,1,1"),
        ];
        run(&config(ledger.clone(), chambers)).unwrap();

        let content = fs::read_to_string(&ledger).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with(",chamber"));
        assert!(lines[4].ends_with(",1"));

        let volume: RelabeledVolume =
            serde_json::from_str(&fs::read_to_string(dir.path().join("out/c1.json")).unwrap())
                .unwrap();
        assert_eq!(volume, array![[[1, 0]], [[1, 0]]]);
    }

    #[test]
    fn test_failed_chamber_writes_nothing() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("out").join("combined_lineages.csv");
        let chambers = vec![
            chamber(dir.path(), "c0", "0,1,1"),
            chamber(dir.path(), "c1", "0,1,9"),
        ];
        assert!(run(&config(ledger.clone(), chambers)).is_err());

        assert!(!ledger.exists());
        assert!(!dir.path().join("out/c0.json").exists());
        assert!(!dir.path().join("out/c1.json").exists());
    }
}
