//! Benchmark instances for the symmetric TSP.
//!
//! An instance is a square, symmetric, zero-diagonal matrix of non-negative
//! pairwise costs (kilometres or minutes). The matrices are read from CSV
//! files and the 12 benchmark problems select sub-instances of them by
//! city id.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Absolute tolerance used when checking matrix symmetry.
const SYMMETRY_EPS: f64 = 1e-6;

/// Errors raised while building or loading an instance.
///
/// All of these are detected before any optimization starts; the engines
/// themselves never see a malformed matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceError {
    /// The matrix has zero cities.
    EmptyInstance,
    /// The matrix is non-square, asymmetric, has a negative/non-finite entry
    /// or a non-zero diagonal.
    InvalidMatrix(String),
    /// Underlying file or CSV error.
    Io(String),
    /// Problem id outside 1..=12.
    UnknownProblem(usize),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::EmptyInstance => write!(f, "instance has no cities"),
            InstanceError::InvalidMatrix(msg) => write!(f, "invalid cost matrix: {}", msg),
            InstanceError::Io(msg) => write!(f, "failed to read instance: {}", msg),
            InstanceError::UnknownProblem(id) => {
                write!(f, "unknown problem {}: expected an id in 1..=12", id)
            }
        }
    }
}

impl std::error::Error for InstanceError {}

/// Which of the two benchmark matrices a problem uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixKind {
    /// Distance-weighted matrix (kilometres).
    Km,
    /// Time-weighted matrix (minutes).
    Min,
}

impl MatrixKind {
    /// Unit label used in reports.
    pub fn unit(&self) -> &'static str {
        match self {
            MatrixKind::Km => "Km",
            MatrixKind::Min => "Min",
        }
    }
}

/// Configuration of one of the 12 benchmark problems: the matrix it reads
/// and the 1-indexed city ids of its sub-instance.
#[derive(Debug, Clone)]
pub struct ProblemConfig {
    pub id: usize,
    pub kind: MatrixKind,
    pub city_ids: Vec<usize>,
}

/// Look up one of the 12 fixed benchmark problems.
///
/// Odd ids use the distance matrix, even ids the time matrix; each pair
/// shares the same city subset.
pub fn problem_config(id: usize) -> Result<ProblemConfig, InstanceError> {
    let (kind, city_ids) = match id {
        1 => (MatrixKind::Km, (1..=48).collect()),
        2 => (MatrixKind::Min, (1..=48).collect()),
        3 => (MatrixKind::Km, (1..=36).collect()),
        4 => (MatrixKind::Min, (1..=36).collect()),
        5 => (MatrixKind::Km, (1..=24).collect()),
        6 => (MatrixKind::Min, (1..=24).collect()),
        7 => (MatrixKind::Km, (1..=12).collect()),
        8 => (MatrixKind::Min, (1..=12).collect()),
        9 => (MatrixKind::Km, vec![1, 7, 8, 9, 10, 11, 12]),
        10 => (MatrixKind::Min, vec![1, 7, 8, 9, 10, 11, 12]),
        11 => (MatrixKind::Km, (1..=6).collect()),
        12 => (MatrixKind::Min, (1..=6).collect()),
        other => return Err(InstanceError::UnknownProblem(other)),
    };
    Ok(ProblemConfig { id, kind, city_ids })
}

/// A validated symmetric TSP instance.
///
/// The matrix is immutable after construction and shared read-only by every
/// algorithm, including parallel repetitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TspInstance {
    /// Name of the instance (for logs and reports).
    pub name: String,
    dimension: usize,
    matrix: Vec<Vec<f64>>,
}

impl TspInstance {
    /// Build an instance from an in-memory matrix, validating it.
    ///
    /// Rejects empty, non-square, asymmetric, negative, non-finite or
    /// non-zero-diagonal matrices before any heuristic can run on them.
    pub fn from_matrix(name: &str, matrix: Vec<Vec<f64>>) -> Result<Self, InstanceError> {
        let n = matrix.len();
        if n == 0 {
            return Err(InstanceError::EmptyInstance);
        }

        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(InstanceError::InvalidMatrix(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
        }

        for i in 0..n {
            if matrix[i][i] != 0.0 {
                return Err(InstanceError::InvalidMatrix(format!(
                    "non-zero diagonal entry at ({}, {}): {}",
                    i, i, matrix[i][i]
                )));
            }
            for j in 0..n {
                let d = matrix[i][j];
                if !d.is_finite() || d < 0.0 {
                    return Err(InstanceError::InvalidMatrix(format!(
                        "entry ({}, {}) is {}",
                        i, j, d
                    )));
                }
                if (d - matrix[j][i]).abs() > SYMMETRY_EPS {
                    return Err(InstanceError::InvalidMatrix(format!(
                        "asymmetric entries ({}, {}): {} vs {}",
                        i, j, d, matrix[j][i]
                    )));
                }
            }
        }

        Ok(TspInstance {
            name: name.to_string(),
            dimension: n,
            matrix,
        })
    }

    /// Parse a full benchmark matrix from a CSV file.
    pub fn from_csv_file<P: AsRef<Path>>(path: P, name: &str) -> Result<Self, InstanceError> {
        let file = File::open(&path)
            .map_err(|e| InstanceError::Io(format!("cannot open {:?}: {}", path.as_ref(), e)))?;
        Self::from_csv_reader(file, name)
    }

    /// Parse a full benchmark matrix from any CSV source.
    ///
    /// The file format carries a city id in the first column of each data
    /// row, values with decimal commas ("38,8") and empty cells on the
    /// diagonal. Rows whose first cell is not an integer (headers, blank
    /// lines) are skipped; any other cell that fails to parse is a hard
    /// error.
    pub fn from_csv_reader<R: Read>(reader: R, name: &str) -> Result<Self, InstanceError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows: HashMap<usize, Vec<f64>> = HashMap::new();
        let mut max_id = 0usize;

        for record in csv_reader.records() {
            let record = record.map_err(|e| InstanceError::Io(e.to_string()))?;
            let first = match record.get(0) {
                Some(cell) => cell.trim(),
                None => continue,
            };
            let row_id: usize = match first.parse() {
                Ok(id) => id,
                Err(_) => continue, // header or annotation row
            };

            let mut values = Vec::with_capacity(record.len().saturating_sub(1));
            for cell in record.iter().skip(1) {
                let cell = cell.trim();
                if cell.is_empty() {
                    // Empty cell on the diagonal.
                    values.push(0.0);
                    continue;
                }
                let normalized = cell.replace(',', ".");
                let value: f64 = normalized.parse().map_err(|_| {
                    InstanceError::InvalidMatrix(format!(
                        "row {}: cannot parse cell {:?} as a number",
                        row_id, cell
                    ))
                })?;
                values.push(value);
            }

            max_id = max_id.max(row_id);
            rows.insert(row_id, values);
        }

        if max_id == 0 {
            return Err(InstanceError::EmptyInstance);
        }

        let mut matrix = Vec::with_capacity(max_id);
        for id in 1..=max_id {
            let mut row = rows.remove(&id).ok_or_else(|| {
                InstanceError::InvalidMatrix(format!("missing row for city {}", id))
            })?;
            if row.len() < max_id {
                return Err(InstanceError::InvalidMatrix(format!(
                    "row for city {} has {} values, expected {}",
                    id,
                    row.len(),
                    max_id
                )));
            }
            row.truncate(max_id);
            matrix.push(row);
        }

        Self::from_matrix(name, matrix)
    }

    /// Number of cities.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Cost of travelling between cities `i` and `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    /// Total length of a cyclic tour: consecutive edges plus the closing
    /// edge back to the first city.
    pub fn tour_length(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }

        let mut length = 0.0;
        for i in 0..tour.len() - 1 {
            length += self.distance(tour[i], tour[i + 1]);
        }
        length += self.distance(tour[tour.len() - 1], tour[0]);

        length
    }

    /// Extract the sub-instance for a list of 1-indexed real city ids.
    ///
    /// The resulting instance uses local indices 0..k; position `p` of
    /// `city_ids` becomes local city `p`.
    pub fn submatrix(&self, name: &str, city_ids: &[usize]) -> Result<Self, InstanceError> {
        if city_ids.is_empty() {
            return Err(InstanceError::EmptyInstance);
        }
        for &id in city_ids {
            if id == 0 || id > self.dimension {
                return Err(InstanceError::InvalidMatrix(format!(
                    "city id {} outside matrix of dimension {}",
                    id, self.dimension
                )));
            }
        }

        let matrix: Vec<Vec<f64>> = city_ids
            .iter()
            .map(|&i| city_ids.iter().map(|&j| self.matrix[i - 1][j - 1]).collect())
            .collect();

        Self::from_matrix(name, matrix)
    }
}

/// Read the city-name file: rows of `id,name` pairs, possibly two pairs per
/// row (`id,name,id,name`).
pub fn load_city_names<P: AsRef<Path>>(path: P) -> Result<HashMap<usize, String>, InstanceError> {
    let file = File::open(&path)
        .map_err(|e| InstanceError::Io(format!("cannot open {:?}: {}", path.as_ref(), e)))?;
    load_city_names_from_reader(file)
}

/// Reader-based variant of [`load_city_names`].
pub fn load_city_names_from_reader<R: Read>(
    reader: R,
) -> Result<HashMap<usize, String>, InstanceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut names = HashMap::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| InstanceError::Io(e.to_string()))?;
        let cells: Vec<&str> = record.iter().map(|c| c.trim()).collect();

        for pair_start in [0, 2] {
            if cells.len() >= pair_start + 2 {
                if let Ok(id) = cells[pair_start].parse::<usize>() {
                    names.insert(id, cells[pair_start + 1].to_string());
                }
            }
        }
    }

    Ok(names)
}
