//! CPLEX LP-format serialization of the coverage model.
//!
//! The dump is for inspecting a model with external tools; nothing reads it
//! back. Label names are sanitized into LP identifiers and the original name
//! is kept in a comment above each row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExportError;

use super::Model;

/// Maximum number of terms written on one line.
const TERMS_PER_LINE: usize = 16;

fn var_name(index: usize) -> String {
    format!("x{}", index)
}

/// Turns a label into a valid LP row name.
fn row_name(name: &str, position: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("r{}_{}", position, cleaned)
}

fn write_sum<W: Write>(out: &mut W, indices: &[usize]) -> std::io::Result<()> {
    if indices.is_empty() {
        return write!(out, " 0");
    }
    for (n, &index) in indices.iter().enumerate() {
        if n > 0 && n % TERMS_PER_LINE == 0 {
            write!(out, "\n   ")?;
        }
        if n == 0 {
            write!(out, " {}", var_name(index))?;
        } else {
            write!(out, " + {}", var_name(index))?;
        }
    }
    Ok(())
}

/// Writes the model in LP format.
pub fn write_lp<W: Write>(model: &Model, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\\ coverforge coverage model")?;
    writeln!(
        out,
        "\\ {} variables, {} coverage rows, {} cuts",
        model.num_vars(),
        model.constraints().len(),
        model.cuts().len()
    )?;
    writeln!(out, "Minimize")?;
    write!(out, " obj:")?;
    let all: Vec<usize> = (0..model.num_vars()).collect();
    write_sum(out, &all)?;
    writeln!(out)?;

    writeln!(out, "Subject To")?;
    for (position, row) in model.rows().enumerate() {
        writeln!(out, "\\ {}", row.name.replace(['\n', '\r'], " "))?;
        write!(out, " {}:", row_name(&row.name, position))?;
        write_sum(out, &row.indices)?;
        writeln!(out, " >= {}", row.rhs)?;
    }

    writeln!(out, "Binary")?;
    for chunk in all.chunks(TERMS_PER_LINE) {
        let names: Vec<String> = chunk.iter().map(|&i| var_name(i)).collect();
        writeln!(out, " {}", names.join(" "))?;
    }
    writeln!(out, "End")?;
    Ok(())
}

/// Writes the model in LP format to a file.
pub fn write_lp_file(model: &Model, path: &Path) -> Result<(), ExportError> {
    let wrap = |source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(wrap)?;
    let mut out = BufWriter::new(file);
    write_lp(model, &mut out).map_err(wrap)?;
    out.flush().map_err(wrap)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageConstraint;

    fn render(model: &Model) -> String {
        let mut buf = Vec::new();
        write_lp(model, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_row_name_sanitizes() {
        assert_eq!(row_name("long hair", 3), "r3_long_hair");
        assert_eq!(row_name("1girl", 0), "r0_1girl");
        assert_eq!(row_name(":)", 1), "r1___");
    }

    #[test]
    fn test_write_lp_structure() {
        let mut model = Model::new(
            3,
            vec![
                CoverageConstraint::new("cat", vec![0, 1], 2),
                CoverageConstraint::new("dog", vec![0, 2], 2),
            ],
        );
        model.add_cut(CoverageConstraint::new("cut_1", vec![1, 2], 1));
        let text = render(&model);

        assert!(text.contains("Minimize\n obj: x0 + x1 + x2\n"));
        assert!(text.contains(" r0_cat: x0 + x1 >= 2\n"));
        assert!(text.contains(" r1_dog: x0 + x2 >= 2\n"));
        assert!(text.contains(" r2_cut_1: x1 + x2 >= 1\n"));
        assert!(text.contains("Binary\n x0 x1 x2\n"));
        assert!(text.trim_end().ends_with("End"));
    }

    #[test]
    fn test_write_lp_wraps_long_rows() {
        let model = Model::new(40, vec![CoverageConstraint::new("all", (0..40).collect(), 1)]);
        let text = render(&model);
        let row_line_count = text
            .lines()
            .skip_while(|l| !l.starts_with(" r0_all:"))
            .take_while(|l| !l.starts_with("Binary"))
            .count();
        assert_eq!(row_line_count, 3);
    }

    #[test]
    fn test_empty_model_objective() {
        let text = render(&Model::new(0, Vec::new()));
        assert!(text.contains("Minimize\n obj: 0\n"));
        assert!(!text.contains("x0"));
    }

    #[test]
    fn test_newline_label_stays_in_comment() {
        let model = Model::new(
            1,
            vec![CoverageConstraint::new("first\nsecond\r\nthird", vec![0], 1)],
        );
        let text = render(&model);
        assert!(text.contains("\\ first second  third\n"));
        assert!(text.lines().all(|l| !l.starts_with("second") && !l.starts_with("third")));
        assert!(text.contains(" r0_first_second__third: x0 >= 1\n"));
    }

    #[test]
    fn test_write_lp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.lp");
        let model = Model::new(1, vec![CoverageConstraint::new("a", vec![0], 1)]);
        write_lp_file(&model, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("r0_a: x0 >= 1"));
    }
}
