use ddm::{DistMat, NewickInput};
use std::fs;
use std::path::Path;

#[cfg(feature = "cli")]
mod cli {
    use super::*;
    use clap::Parser;
    use ddm::{ComparisonOptions, DdmConfig, MatrixType, SortOrder};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about)]
    pub struct Args {
        /// Newick file of the first tree
        #[arg(value_name = "FIRST")]
        pub first: PathBuf,

        /// Newick file of the second tree, subtracted from the first
        #[arg(value_name = "SECOND")]
        pub second: PathBuf,

        /// Distance matrix to compare: basic, basic_distance, quadratic,
        /// quadratic_distance, min_PGM, max_PGM or average_PGM
        #[arg(short, long, default_value = "basic")]
        pub matrix_type: MatrixType,

        /// Row order: default, seriation, low-high or high-low
        #[arg(short, long, default_value = "default")]
        pub sort: SortOrder,

        /// Keep the sign of the differences
        #[arg(long)]
        pub signed: bool,

        /// Keep rows of leaves that only one of the trees has
        #[arg(long)]
        pub keep_null: bool,

        /// Write the matrix to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        pub output: Option<PathBuf>,
    }

    pub fn run() -> Result<(), String> {
        env_logger::init();
        let args = Args::parse();

        let conf = DdmConfig {
            first: read_newick(&args.first)?,
            second: read_newick(&args.second)?,
            options: ComparisonOptions {
                matrix_type: args.matrix_type,
                absolute: !args.signed,
                keep_null: args.keep_null,
                sort: args.sort,
            },
        };
        let diff = ddm::ddm(conf).map_err(|e| format!("comparison failed: {e}"))?;
        let table = format_tsv(&diff);

        if let Some(path) = args.output {
            fs::write(&path, table)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        } else {
            print!("{table}");
        }
        Ok(())
    }
}

fn main() -> Result<(), String> {
    #[cfg(feature = "cli")]
    {
        cli::run()
    }
    #[cfg(not(feature = "cli"))]
    {
        println!("CLI not enabled. Rebuild with --features cli");
        Ok(())
    }
}

/// Reads a Newick file; the tree is named after the file stem.
#[cfg_attr(not(feature = "cli"), allow(dead_code))]
fn read_newick(path: &Path) -> Result<NewickInput, String> {
    let newick = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(NewickInput {
        name,
        newick: newick.trim().to_string(),
    })
}

/// Tab-separated matrix with a header row of labels; empty cells are `NA`.
#[cfg_attr(not(feature = "cli"), allow(dead_code))]
fn format_tsv(matrix: &DistMat) -> String {
    let mut out = String::new();
    for label in matrix.labels() {
        out.push('\t');
        out.push_str(label);
    }
    out.push('\n');
    for (label, row) in matrix.labels().iter().zip(matrix.rows()) {
        out.push_str(label);
        for cell in row {
            out.push('\t');
            match cell {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str("NA"),
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddm::{ComparisonOptions, DdmConfig, MatrixType};

    #[test]
    fn test_format_tsv() {
        let m = DistMat::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec![Some(0.0), Some(1.5)], vec![Some(1.5), None]],
        )
        .unwrap();
        assert_eq!(format_tsv(&m), "\tA\tB\nA\t0\t1.5\nB\t1.5\tNA\n");
    }

    #[test]
    fn test_format_tsv_empty_matrix() {
        let m = DistMat::empty_with_labels(Vec::new());
        assert_eq!(format_tsv(&m), "\n");
    }

    #[test]
    fn test_read_newick_names_tree_after_file() {
        let dir = std::env::temp_dir().join(format!("ddm-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("species.nwk");
        fs::write(&path, "((A,B),C);\n").unwrap();

        let input = read_newick(&path).unwrap();
        assert_eq!(input.name, "species");
        assert_eq!(input.newick, "((A,B),C);");
        fs::remove_dir_all(&dir).unwrap();

        assert!(read_newick(&dir.join("missing.nwk")).is_err());
    }

    #[test]
    fn test_compare_files_end_to_end() {
        let conf = DdmConfig {
            first: NewickInput {
                name: "a".into(),
                newick: "((A,B),C);".into(),
            },
            second: NewickInput {
                name: "b".into(),
                newick: "((A,C),B);".into(),
            },
            options: ComparisonOptions {
                matrix_type: MatrixType::Basic,
                ..Default::default()
            },
        };
        let diff = ddm::ddm(conf).unwrap();
        assert_eq!(format_tsv(&diff), "\tA\tB\tC\nA\t0\t1\t1\nB\t1\t0\t0\nC\t1\t0\t0\n");
    }
}
