//! Text encoding of right-hand sides as tables of elementary terms.
//!
//! A cell holds a single term `coef_kind_param`, for example `-2_1_3` for `-2 sin(3 x)`.
//! The parameter may be wrapped in parentheses, as in `1_4_(-1)`, and `0` (or an empty
//! cell) denotes a cell without a term.
use nalgebra::{DMatrix, DVector};
use std::str::FromStr;
use thiserror::Error;

use super::EvalResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermTableError {
    #[error("invalid term `{entry}`: {reason}")]
    InvalidTerm { entry: String, reason: String },
    #[error("{table} table must not be empty")]
    Empty { table: &'static str },
    #[error("{table} table has {actual} rows, expected {expected}")]
    RowCount {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} of the {table} table has {actual} cells, expected {expected}")]
    RowLength {
        table: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Elementary functions of a single variable `x` with parameter `p`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TermKind {
    /// sin(p x)
    Sin,
    /// cos(p x)
    Cos,
    /// exp(p x)
    Exp,
    /// x^p
    Power,
    /// ln(p x)
    Log,
    /// p x
    Linear,
    /// p
    Constant,
}

impl TermKind {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(TermKind::Sin),
            2 => Some(TermKind::Cos),
            3 => Some(TermKind::Exp),
            4 => Some(TermKind::Power),
            5 => Some(TermKind::Log),
            6 => Some(TermKind::Linear),
            7 => Some(TermKind::Constant),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub kind: TermKind,
    pub parameter: f64,
}

impl Term {
    pub fn evaluate(&self, x: f64) -> f64 {
        let p = self.parameter;
        let value = match self.kind {
            TermKind::Sin => (p * x).sin(),
            TermKind::Cos => (p * x).cos(),
            TermKind::Exp => (p * x).exp(),
            TermKind::Power => x.powf(p),
            TermKind::Log => (p * x).ln(),
            TermKind::Linear => p * x,
            TermKind::Constant => p,
        };
        self.coefficient * value
    }
}

impl FromStr for Term {
    type Err = TermTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TermTableError::InvalidTerm {
            entry: s.to_string(),
            reason: reason.to_string(),
        };
        // Plain decimals only: no exponents, infinities or NaN
        let parse_number = |part: &str| {
            let number = part.trim().trim_start_matches('(').trim_end_matches(')').trim();
            let is_decimal = number
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+');
            number
                .parse::<f64>()
                .ok()
                .filter(|value| is_decimal && value.is_finite())
                .ok_or_else(|| invalid(&format!("`{}` is not a decimal number", part)))
        };

        let parts: Vec<&str> = s.trim().split('_').collect();
        if parts.len() != 3 {
            return Err(invalid("expected the form `coef_kind_param`"));
        }

        let coefficient = parse_number(parts[0])?;
        let kind = parts[1]
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(TermKind::from_code)
            .ok_or_else(|| invalid("kind must be an integer between 1 and 7"))?;
        let parameter = parse_number(parts[2])?;

        Ok(Term {
            coefficient,
            kind,
            parameter,
        })
    }
}

fn parse_cell(cell: &str) -> Result<Option<Term>, TermTableError> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "0" {
        Ok(None)
    } else {
        cell.parse().map(Some)
    }
}

/// A parsed table of terms.
///
/// In a right-hand side table, row `i` defines component `i` of F as the sum of its cells:
/// cell 0 is a term in `t`, and cell `j >= 1` is a term in `y[j - 1]`. In a Jacobian table,
/// cell `(i, j)` is the entry dF_i/dy_j and is a term in `y[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermTable {
    rows: Vec<Vec<Option<Term>>>,
}

impl TermTable {
    pub fn parse_right_hand_side<S: AsRef<str>>(rows: &[Vec<S>]) -> Result<Self, TermTableError> {
        let table = "right-hand side";
        if rows.is_empty() {
            return Err(TermTableError::Empty { table });
        }
        Self::parse(rows, table, rows.len() + 1)
    }

    pub fn parse_jacobian<S: AsRef<str>>(rows: &[Vec<S>], dimension: usize) -> Result<Self, TermTableError> {
        let table = "Jacobian";
        if rows.len() != dimension {
            return Err(TermTableError::RowCount {
                table,
                expected: dimension,
                actual: rows.len(),
            });
        }
        Self::parse(rows, table, dimension)
    }

    fn parse<S: AsRef<str>>(rows: &[Vec<S>], table: &'static str, num_cells: usize) -> Result<Self, TermTableError> {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                if cells.len() != num_cells {
                    return Err(TermTableError::RowLength {
                        table,
                        row,
                        expected: num_cells,
                        actual: cells.len(),
                    });
                }
                cells
                    .iter()
                    .map(|cell| parse_cell(cell.as_ref()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn evaluate_right_hand_side(&self, t: f64, y: &DVector<f64>) -> EvalResult<DVector<f64>> {
        let mut f = DVector::zeros(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let mut value = 0.0;
            for (j, term) in row.iter().enumerate() {
                if let Some(term) = term {
                    let x = if j == 0 { t } else { y[j - 1] };
                    value += term.evaluate(x);
                }
            }
            f[i] = checked(value, i, 0)?;
        }
        Ok(f)
    }

    pub fn evaluate_jacobian(&self, y: &DVector<f64>) -> EvalResult<DMatrix<f64>> {
        let n = self.rows.len();
        let mut jacobian = DMatrix::zeros(n, n);
        for (i, row) in self.rows.iter().enumerate() {
            for (j, term) in row.iter().enumerate() {
                if let Some(term) = term {
                    jacobian[(i, j)] = checked(term.evaluate(y[j]), i, j)?;
                }
            }
        }
        Ok(jacobian)
    }
}

fn checked(value: f64, row: usize, column: usize) -> EvalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("term table produced a non-finite value in row {}, column {}", row, column).into())
    }
}
