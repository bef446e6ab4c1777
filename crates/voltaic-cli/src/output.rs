//! Table formatting helpers.

const COL: usize = 14;

/// Print a header row followed by a dashed separator.
pub fn header(columns: &[&str]) {
    for c in columns {
        print!("{:>COL$}", c);
    }
    println!();
    println!("{}", "-".repeat(COL * columns.len()));
}

/// Print one row: an axis value in exponent form, then data columns.
pub fn row(axis: f64, values: impl Iterator<Item = f64>) {
    print!("{:>COL$.6e}", axis);
    for v in values {
        print!("{:>COL$.6}", v);
    }
    println!();
}
