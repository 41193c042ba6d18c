//! Exact linear-system solving over GF(2).
//!
//! Gauss–Jordan elimination on word-packed [`BitRow`]s. Each pivot step
//! XORs the pivot row into every other row holding the pivot bit, starting at
//! the pivot's chunk, so the cost is one block XOR per affected row rather
//! than one operation per bit.
//!
//! Several right-hand sides can share a single elimination pass
//! ([`solve_many`]); the right-hand sides of one row are themselves packed in
//! a `BitRow` and follow the row through swaps and XORs.

use std::fmt;
use std::time::Instant;

use crate::utils::bits::BitRow;

/// Columns eliminated between two deadline checks.
const DEADLINE_STRIDE: usize = 64;

/// Why an elimination produced no solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// Right-hand side `label` requires `0 = 1` at reduced row `row`.
    Inconsistent { label: usize, row: usize },
    /// The deadline passed after `pivots` pivots had been placed.
    DeadlineExceeded { pivots: usize },
    /// Rows, right-hand sides or widths do not line up.
    ShapeMismatch { reason: String },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Inconsistent { label, row } => {
                write!(f, "right-hand side {} is inconsistent at row {}", label, row)
            }
            SolveError::DeadlineExceeded { pivots } => {
                write!(f, "deadline exceeded after {} pivots", pivots)
            }
            SolveError::ShapeMismatch { reason } => write!(f, "shape mismatch: {}", reason),
        }
    }
}

impl std::error::Error for SolveError {}

/// Solves `rows · w = rhs` for one right-hand side.
///
/// Returns some `w` of width `columns` with `rows[i].dot(w) == rhs[i]` for
/// every `i`. Free variables are set to 0.
///
/// # Errors
/// [`SolveError::Inconsistent`] if no such `w` exists,
/// [`SolveError::ShapeMismatch`] if the inputs disagree in size.
pub fn solve(rows: &[BitRow], rhs: &[bool], columns: usize) -> Result<BitRow, SolveError> {
    if rows.len() != rhs.len() {
        return Err(SolveError::ShapeMismatch {
            reason: format!("{} rows but {} right-hand sides", rows.len(), rhs.len()),
        });
    }
    let labels = rhs.iter().map(|&b| BitRow::from_bits(&[b])).collect();
    let mut solutions = solve_many(rows.to_vec(), labels, columns, 1, None)?;
    Ok(solutions.swap_remove(0))
}

/// Solves `rows · w_k = labels[·][k]` for `label_count` right-hand sides at
/// once.
///
/// `labels[i]` holds bit `k` of right-hand side `k` for row `i`. Returns one
/// solution row of width `columns` per right-hand side.
///
/// # Errors
/// [`SolveError::Inconsistent`] names the first right-hand side without a
/// solution; [`SolveError::DeadlineExceeded`] if `deadline` passes mid-way.
pub fn solve_many(
    mut rows: Vec<BitRow>,
    mut labels: Vec<BitRow>,
    columns: usize,
    label_count: usize,
    deadline: Option<Instant>,
) -> Result<Vec<BitRow>, SolveError> {
    if rows.len() != labels.len() {
        return Err(SolveError::ShapeMismatch {
            reason: format!("{} rows but {} label rows", rows.len(), labels.len()),
        });
    }
    if let Some(row) = rows.iter().find(|r| r.width() != columns) {
        return Err(SolveError::ShapeMismatch {
            reason: format!("row width {} differs from {} columns", row.width(), columns),
        });
    }
    if let Some(label) = labels.iter().find(|l| l.width() != label_count) {
        return Err(SolveError::ShapeMismatch {
            reason: format!(
                "label width {} differs from {} right-hand sides",
                label.width(),
                label_count
            ),
        });
    }

    let pivots = reduce(&mut rows, &mut labels, columns, deadline)?;
    let rank = pivots.len();

    // Rows below the rank have no feature bits left; any label bit there is 0 = 1.
    for (offset, label) in labels[rank..].iter().enumerate() {
        if let Some(k) = label.first_one() {
            return Err(SolveError::Inconsistent {
                label: k,
                row: rank + offset,
            });
        }
    }

    let mut solutions = vec![BitRow::zeros(columns); label_count];
    for (row, &col) in pivots.iter().enumerate() {
        for k in labels[row].ones() {
            solutions[k].set(col, true);
        }
    }
    Ok(solutions)
}

/// Reduces `rows` to reduced row-echelon form in place.
///
/// Returns the pivot column of each leading row; rows `pivots.len()..` end up
/// all-zero. Columns with no available pivot are skipped.
fn reduce(
    rows: &mut [BitRow],
    labels: &mut [BitRow],
    columns: usize,
    deadline: Option<Instant>,
) -> Result<Vec<usize>, SolveError> {
    let mut pivots = Vec::new();
    let mut rank = 0;
    for col in 0..columns {
        if rank == rows.len() {
            break;
        }
        if col % DEADLINE_STRIDE == 0 {
            if let Some(limit) = deadline {
                if Instant::now() >= limit {
                    return Err(SolveError::DeadlineExceeded {
                        pivots: pivots.len(),
                    });
                }
            }
        }
        let Some(found) = (rank..rows.len()).find(|&r| rows[r].get(col)) else {
            continue;
        };
        rows.swap(rank, found);
        labels.swap(rank, found);

        // Every column left of `col` is already zero in the pivot row.
        let first_chunk = col / 64;
        let pivot_row = rows[rank].clone();
        let pivot_label = labels[rank].clone();
        for r in 0..rows.len() {
            if r != rank && rows[r].get(col) {
                rows[r].xor_from_chunk(&pivot_row, first_chunk);
                labels[r].xor_assign(&pivot_label);
            }
        }
        pivots.push(col);
        rank += 1;
    }
    Ok(pivots)
}

/// Rank of a set of rows over GF(2).
pub fn rank(rows: &[BitRow], columns: usize) -> usize {
    let mut rows = rows.to_vec();
    let mut labels = vec![BitRow::zeros(0); rows.len()];
    reduce(&mut rows, &mut labels, columns, None)
        .map(|p| p.len())
        .unwrap_or(0)
}
